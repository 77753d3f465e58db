use core::{convert::Infallible, future::Future, sync::atomic::AtomicU16};
use std::{collections::BTreeMap, sync::Arc};

use compact_str::{CompactString, ToCompactString as _};
use mqtt_endpoint_tokio::mqtt_ep::{
    self, Endpoint,
    packet::v5_0,
    role,
    transport::{TcpTransport, connect_helper},
};
use mqtt_protocol_core::mqtt::packet::{
    Property, Qos, SubEntry, SubOpts, SubscriptionIdentifier,
    v5_0::{Connack, Publish},
};
use serde::Serialize;
use tokio::{sync::Mutex, task::JoinHandle};

pub mod board;
pub mod indicator;
pub mod log;
pub mod publish;

pub use senselink_common as common;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("mqtt transport error: {0}")]
    MqttTransport(#[from] mqtt_ep::TransportError),
    #[error("mqtt connection error: {0}")]
    MqttConnection(#[from] mqtt_ep::ConnectionError),
    #[error("mqtt packet field error: {0}")]
    MqttPacketField(&'static str),
    #[error("mqtt packet error: {0}")]
    MqttPacket(mqtt_ep::result_code::MqttError),
    #[error("serde json error: {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("tls requested but senselink was built without the `tls` feature")]
    TlsUnavailable,
}

impl From<mqtt_ep::result_code::MqttError> for Error {
    fn from(e: mqtt_ep::result_code::MqttError) -> Self {
        Error::MqttPacket(e)
    }
}

const KEEP_ALIVE_SECS: u16 = 60;

/// Where and how to reach the broker.
#[derive(Debug, Clone)]
pub struct BrokerOptions {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub tls: bool,
}

impl BrokerOptions {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

pub(crate) type SubscriptionHandler = Box<dyn FnMut(PublishEvent) -> bool + Send + Sync>;

pub struct MqttConnection {
    endpoint: Endpoint<role::Client>,
    next_packet_id: AtomicU16,
    // key could be SubscriptionIdentifier if it implemented Ord
    sub_handlers: Mutex<BTreeMap<u32, SubscriptionHandler>>,
}

impl MqttConnection {
    pub async fn connect(opts: &BrokerOptions) -> Result<Arc<Self>> {
        let endpoint = mqtt_ep::endpoint::Endpoint::<role::Client>::new(mqtt_ep::Version::V5_0);
        let addr = opts.addr();

        if opts.tls {
            #[cfg(feature = "tls")]
            {
                use mqtt_endpoint_tokio::mqtt_ep::transport::TlsTransport;

                let tls_stream =
                    connect_helper::connect_tcp_tls(&addr, &opts.host, None, None).await?;
                endpoint
                    .attach(TlsTransport::from_stream(tls_stream), mqtt_ep::endpoint::Mode::Client)
                    .await?;
            }

            #[cfg(not(feature = "tls"))]
            return Err(Error::TlsUnavailable);
        } else {
            let tcp_stream = connect_helper::connect_tcp(&addr, None).await?;
            endpoint
                .attach(TcpTransport::from_stream(tcp_stream), mqtt_ep::endpoint::Mode::Client)
                .await?;
        }

        let mut connect = v5_0::Connect::builder()
            .client_id(opts.client_id.as_str())?
            .keep_alive(KEEP_ALIVE_SECS)
            .clean_start(true);

        if let Some(username) = &opts.username {
            connect = connect.user_name(username.as_str())?;
        }
        if let Some(password) = &opts.password {
            connect = connect.password(password.as_bytes())?;
        }

        endpoint.send(connect.build()?).await?;

        let packet = endpoint.recv().await?;
        let connack: Connack = packet.try_into().map_err(Error::MqttPacketField)?;
        tracing::debug!("Received CONNACK: {connack:?}");
        tracing::info!(%addr, tls = opts.tls, "Connected to MQTT broker");

        Ok(MqttConnection {
            endpoint,
            next_packet_id: AtomicU16::new(1),
            sub_handlers: Mutex::new(BTreeMap::new()),
        }
        .into())
    }

    fn next_packet_id(&self) -> u16 {
        loop {
            let id = self
                .next_packet_id
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);

            if id != 0 {
                break id;
            }
        }
    }

    fn next_subscription_id(&self) -> SubscriptionIdentifier {
        // max value is 2^28 - 1 (min value is also 1)
        SubscriptionIdentifier::new(self.next_packet_id() as u32).unwrap()
    }

    pub async fn recv_raw(&self) -> Result<mqtt_ep::packet::Packet> {
        let packet = self.endpoint.recv().await?;
        Ok(packet)
    }

    /// Waits for the next PUBLISH, skipping acks and pings.
    pub async fn recv(&self) -> Result<PublishEvent> {
        loop {
            let packet = self.recv_raw().await?;

            let publish: Result<Publish, _> = packet.try_into();
            if let Ok(publish) = publish {
                let sub_id = publish.props.iter().find_map(|p| {
                    if let Property::SubscriptionIdentifier(id) = p {
                        Some(id.clone())
                    } else {
                        None
                    }
                });

                break Ok(PublishEvent {
                    sub_id,
                    topic: publish.topic_name().to_compact_string(),
                    payload: publish.payload().as_slice().to_vec(),
                });
            }
        }
    }

    /// The network loop: dispatches inbound messages until the connection fails.
    pub async fn handle(&self) -> Result<Infallible> {
        loop {
            let event = self.recv().await?;

            tracing::debug!(topic = %event.topic, bytes = event.payload.len(), "Handling publish event");

            if let Some(sub_id) = event.sub_id.clone() {
                let mut handlers = self.sub_handlers.lock().await;

                if let Some(handler) = handlers.get_mut(&sub_id.val()) {
                    let retain = handler(event);

                    if !retain {
                        tracing::warn!("Removing subscription handler for ID {}", sub_id.val());
                        handlers.remove(&sub_id.val());
                    }
                }
            }
        }
    }

    pub fn spawn_network_loop(self: &Arc<Self>) -> JoinHandle<()> {
        let conn = self.clone();

        tokio::spawn(async move {
            let Err(err) = conn.handle().await;
            tracing::warn!("MQTT network loop stopped: {err}");
        })
    }

    pub async fn subscribe_with_handler(
        &self,
        topic: &str,
        handler: impl FnMut(PublishEvent) -> bool + Send + Sync + 'static,
    ) -> Result<()> {
        let sub_id = self.next_subscription_id();

        // registered before SUBSCRIBE goes out so an early PUBLISH has somewhere to go
        self.sub_handlers
            .lock()
            .await
            .insert(sub_id.val(), Box::new(handler));

        let subscribe = v5_0::Subscribe::builder()
            .packet_id(self.next_packet_id())
            .props(vec![Property::SubscriptionIdentifier(sub_id)])
            .entries(vec![SubEntry::new(
                topic.to_string(),
                SubOpts::new().set_qos(Qos::AtMostOnce),
            )?])
            .build()?;

        tracing::info!("Subscribing to topic '{topic}'");

        self.endpoint
            .register_packet_id(subscribe.packet_id())
            .await?;

        self.endpoint.send(subscribe).await?;

        Ok(())
    }

    pub async fn publish_raw(
        &self,
        topic: &str,
        payload: Vec<u8>,
        opts: PublishOpts,
    ) -> Result<()> {
        let mut publish = v5_0::Publish::builder()
            .topic_name(topic.to_string())?
            .payload(payload)
            .qos(opts.qos)
            .retain(opts.retain);

        if !matches!(opts.qos, Qos::AtMostOnce) {
            let packet_id = self.next_packet_id();
            self.endpoint.register_packet_id(packet_id).await?;
            publish = publish.packet_id(packet_id);
        }

        let publish = publish.build()?;

        tracing::trace!("Publishing MQTT message: {publish:#?}");

        self.endpoint.send(publish).await?;

        Ok(())
    }

    /// Publishes `payload` as JSON.
    pub async fn publish(
        &self,
        topic: &str,
        payload: impl Serialize,
        opts: PublishOpts,
    ) -> Result<()> {
        let payload = serde_json::to_vec(&payload)?;

        tracing::debug!("Publishing to topic {topic}: {}", String::from_utf8_lossy(&payload));

        self.publish_raw(topic, payload, opts).await
    }

    /// Sends DISCONNECT and closes the endpoint.
    pub async fn disconnect(&self) -> Result<()> {
        let disconnect = v5_0::Disconnect::builder().build()?;
        self.endpoint.send(disconnect).await?;
        self.endpoint.close().await?;

        tracing::info!("Disconnected from MQTT broker");

        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PublishEvent {
    pub sub_id: Option<SubscriptionIdentifier>,
    pub topic: CompactString,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, Copy)]
pub struct PublishOpts {
    pub qos: Qos,
    pub retain: bool,
}

impl PublishOpts {
    /// At-most-once; a lost reading is superseded by the next one.
    pub const fn telemetry() -> Self {
        Self { qos: Qos::AtMostOnce, retain: false }
    }
}

/// Outbound half of the messaging capability, fire-and-forget.
pub trait Transport: Send + Sync {
    fn send<P: Serialize + Sync>(
        &self,
        topic: &str,
        payload: &P,
    ) -> impl Future<Output = Result<()>> + Send;
}

impl Transport for MqttConnection {
    async fn send<P: Serialize + Sync>(&self, topic: &str, payload: &P) -> Result<()> {
        self.publish(topic, payload, PublishOpts::telemetry()).await
    }
}

impl<T: Transport> Transport for Arc<T> {
    fn send<P: Serialize + Sync>(
        &self,
        topic: &str,
        payload: &P,
    ) -> impl Future<Output = Result<()>> + Send {
        (**self).send(topic, payload)
    }
}
