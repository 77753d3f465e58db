use std::{collections::BTreeSet, time::Duration};

use anyhow::Context as _;
use clap::Parser;
use senselink::{
    BrokerOptions, MqttConnection,
    board::sim::SimulatedBoard,
    publish::{EngineConfig, PublishEngine, Publisher},
};
use senselink_common::{SensorKind, SensorTopics};

const POLL_PERIOD: Duration = Duration::from_secs(1);

#[derive(Parser)]
#[command(about = "Publish sensor board readings to an MQTT broker")]
struct Args {
    /// MQTT broker host
    #[arg(long, default_value = "localhost")]
    host: String,

    /// MQTT broker port
    #[arg(long, default_value_t = 8883)]
    port: u16,

    #[arg(long, env = "SENSELINK_MQTT_USERNAME")]
    username: Option<String>,

    #[arg(long, env = "SENSELINK_MQTT_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Connect over plain TCP instead of TLS
    #[arg(long)]
    no_tls: bool,

    #[arg(long, default_value = "senselink-publisher")]
    client_id: String,

    /// Sensor ids are published as `<device>_<kind>`
    #[arg(long, default_value = "pi_shima")]
    device: String,

    /// Readings go to `<prefix>/temp`, `<prefix>/hum`, ...
    #[arg(long, default_value = "gridos/shima")]
    topic_prefix: String,

    /// Seconds between temperature, humidity and pressure readings
    #[arg(long, default_value_t = 300, value_parser = clap::value_parser!(u64).range(1..))]
    interval: u64,

    /// Raw colour channel level that counts as light
    #[arg(long, default_value_t = 5)]
    brightness_threshold: u16,

    /// Deviation from 1 g that counts as motion
    #[arg(long, default_value_t = 0.5)]
    motion_threshold: f64,

    /// Comma-separated sensors to publish
    #[arg(long, value_delimiter = ',', default_value = "temp,hum,pre,light,mov")]
    sensors: Vec<SensorKind>,
}

impl Args {
    fn broker(&self) -> BrokerOptions {
        BrokerOptions {
            host: self.host.clone(),
            port: self.port,
            client_id: self.client_id.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            tls: !self.no_tls,
        }
    }

    fn engine(&self) -> EngineConfig {
        EngineConfig {
            env_interval: Duration::from_secs(self.interval),
            brightness_threshold: self.brightness_threshold,
            motion_threshold: self.motion_threshold,
            kinds: self.sensors.iter().copied().collect(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    senselink::log::init();

    let args = Args::parse();

    let conn = MqttConnection::connect(&args.broker())
        .await
        .context("failed to connect to mqtt broker")?;

    let mut network = conn.spawn_network_loop();

    let mut publisher = Publisher::new(
        SimulatedBoard::new(),
        conn.clone(),
        PublishEngine::new(&args.device, args.engine()),
        SensorTopics::new(&args.topic_prefix),
    );

    tracing::info!(device = %args.device, sensors = ?args.sensors, "Publishing sensor readings");

    let outcome = publisher
        .run(POLL_PERIOD, async {
            tokio::select! {
                () = shutdown_signal() => Ok(()),
                _ = &mut network => Err(anyhow::anyhow!("connection to mqtt broker lost")),
            }
        })
        .await;

    network.abort();

    if let Err(err) = conn.disconnect().await {
        tracing::warn!("Failed to disconnect from mqtt broker: {err}");
    }

    outcome
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Cannot listen for interrupt, running until killed: {err}");
        std::future::pending::<()>().await;
    }
}
