//! 数据接入：HTTP 设备数据包与 broker 订阅源。

pub mod debounce;
pub mod packet;

pub use debounce::DebounceCache;
pub use packet::PacketIngestor;

use async_trait::async_trait;
use domain::{RawEvent, ROOT_TOPIC};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// 接入错误。
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("invalid packet: {0}")]
    InvalidPacket(String),
    #[error("exceeded dos protection threshold for device {0}")]
    RateLimited(String),
    #[error("registry error: {0}")]
    Registry(String),
    #[error("handler error: {0}")]
    Handler(String),
    #[error("source error: {0}")]
    Source(String),
}

/// RawEvent 处理器。
#[async_trait]
pub trait RawEventHandler: Send + Sync {
    async fn handle(&self, event: RawEvent) -> Result<(), IngestError>;
}

/// 订阅源抽象。
#[async_trait]
pub trait Source: Send + Sync {
    async fn run(&self, handler: Arc<dyn RawEventHandler>) -> Result<(), IngestError>;
}

/// 占位源（不订阅 broker 时使用）。
#[derive(Debug, Default)]
pub struct NoopSource;

#[async_trait]
impl Source for NoopSource {
    async fn run(&self, _handler: Arc<dyn RawEventHandler>) -> Result<(), IngestError> {
        Ok(())
    }
}

/// MQTT 订阅源配置。
#[derive(Debug, Clone)]
pub struct MqttSourceConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_id: String,
}

/// MQTT 订阅源：订阅 `org/#`，每次连上 broker 都重新订阅。
#[derive(Debug, Clone)]
pub struct MqttSource {
    config: MqttSourceConfig,
}

impl MqttSource {
    pub fn new(config: MqttSourceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MqttSourceConfig {
        &self.config
    }
}

#[async_trait]
impl Source for MqttSource {
    async fn run(&self, handler: Arc<dyn RawEventHandler>) -> Result<(), IngestError> {
        let mut options = rumqttc::MqttOptions::new(
            self.config.client_id.clone(),
            self.config.host.clone(),
            self.config.port,
        );
        options.set_keep_alive(Duration::from_secs(30));
        if let (Some(username), Some(password)) =
            (self.config.username.as_ref(), self.config.password.as_ref())
        {
            options.set_credentials(username, password);
        }

        let (client, mut eventloop) = rumqttc::AsyncClient::new(options, 10);
        let topic = format!("{ROOT_TOPIC}/#");

        loop {
            match eventloop.poll().await {
                Ok(rumqttc::Event::Incoming(rumqttc::Packet::ConnAck(_))) => {
                    client
                        .subscribe(topic.clone(), rumqttc::QoS::AtMostOnce)
                        .await
                        .map_err(|err| IngestError::Source(err.to_string()))?;
                    info!(target: "piot.ingest", topic = %topic, "mqtt_subscribed");
                }
                Ok(rumqttc::Event::Incoming(rumqttc::Packet::Publish(publish))) => {
                    let event = RawEvent {
                        topic: publish.topic.clone(),
                        payload: publish.payload.to_vec(),
                        received_at_ms: now_epoch_ms(),
                    };
                    if let Err(err) = handler.handle(event).await {
                        warn!(target: "piot.ingest", topic = %publish.topic, error = %err, "raw_event_handler_failed");
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(target: "piot.ingest", error = %err, "mqtt_source_eventloop_error");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }
}

pub fn now_epoch_ms() -> i64 {
    let now = std::time::SystemTime::now();
    let duration = now
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    duration.as_millis() as i64
}

pub fn now_epoch_secs() -> i64 {
    now_epoch_ms() / 1000
}
