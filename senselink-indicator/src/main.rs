use std::{sync::Arc, time::Duration};

use anyhow::Context as _;
use clap::Parser;
use senselink::{
    BrokerOptions, MqttConnection, PublishEvent,
    board::sim::ConsoleMatrix,
    indicator::{Indicator, IndicatorConfig, spawn_event_loop, spawn_render_loop},
};
use tokio::sync::{mpsc, watch};

#[derive(Parser)]
#[command(about = "Mirror a remote device's light state on the LED matrix")]
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

    #[arg(long, default_value = "senselink-indicator")]
    client_id: String,

    /// Shared topic all devices publish their events to
    #[arg(long, default_value = "gridos/discoverylab/pi/data")]
    topic: String,

    /// Device whose events are shown
    #[arg(long, default_value = "angela")]
    device: String,

    /// Scroll a message for temperature events
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    message_on_temperature: bool,

    /// Temperatures above this are reported as too high
    #[arg(long, default_value_t = 42.0)]
    temperature_threshold: f64,

    /// Seconds between one-column shifts of a scrolling message
    #[arg(long, default_value_t = 0.05)]
    scroll_speed: f32,

    /// How long the matrix stays green after the light turns on, in milliseconds
    #[arg(long, default_value_t = 2000)]
    flash_ms: u64,

    /// Milliseconds between repaints
    #[arg(long, default_value_t = 200, value_parser = clap::value_parser!(u64).range(1..))]
    render_ms: u64,
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

    fn indicator(&self) -> IndicatorConfig {
        IndicatorConfig {
            flash_duration: Duration::from_millis(self.flash_ms),
            temperature_threshold: self.temperature_threshold,
            message_on_temperature: self.message_on_temperature,
            scroll_speed: self.scroll_speed,
            ..IndicatorConfig::new(self.device.as_str())
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

    let (stop, stopped) = watch::channel(false);

    let result = run(&conn, &args, stopped).await;

    // render and event tasks are left to die with the runtime
    let _ = stop.send(true);

    if let Err(err) = conn.disconnect().await {
        tracing::warn!("Failed to disconnect from mqtt broker: {err}");
    }

    result
}

async fn run(
    conn: &Arc<MqttConnection>,
    args: &Args,
    stopped: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let indicator = Arc::new(Indicator::new(args.indicator(), ConsoleMatrix::new()));

    let (tx, rx) = mpsc::unbounded_channel();
    conn.subscribe_with_handler(&args.topic, move |event: PublishEvent| {
        tx.send(event.payload).is_ok()
    })
    .await
    .context("failed to subscribe to event topic")?;

    tracing::info!("Subscribed to device: {}", args.device);

    let mut network = conn.spawn_network_loop();
    spawn_event_loop(indicator.clone(), rx);
    spawn_render_loop(indicator, Duration::from_millis(args.render_ms), stopped);

    let outcome = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            tracing::info!("Stopping indicator");
            signal.context("failed to listen for interrupt")
        }
        _ = &mut network => Err(anyhow::anyhow!("connection to mqtt broker lost")),
    };

    network.abort();

    outcome
}
