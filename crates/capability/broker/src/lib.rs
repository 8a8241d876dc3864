//! 向 broker 发布 Thing 数据。
//!
//! 主题格式：`org/<orgName>/<thingName>/<subtopic>`。未分配组织的 Thing 不发布。

use async_trait::async_trait;
use domain::{ROOT_TOPIC, Thing};
use piot_storage::OrgStore;
use piot_telemetry::{record_publish_failure, record_publish_success};
use rumqttc::{AsyncClient, MqttOptions, QoS};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

/// 发布链路错误。
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("thing {0} has no org assigned")]
    NoOrg(String),
    #[error("org not found: {0}")]
    UnknownOrg(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("transport error: {0}")]
    Transport(String),
}

/// broker 客户端抽象。
#[async_trait]
pub trait BrokerClient: Send + Sync {
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), PublishError>;
}

/// 空客户端（不连接 broker 时占位）。
#[derive(Debug, Default)]
pub struct NoopBrokerClient;

#[async_trait]
impl BrokerClient for NoopBrokerClient {
    async fn publish(&self, _topic: &str, _payload: &str) -> Result<(), PublishError> {
        Ok(())
    }
}

/// 记录全部发布内容的内存客户端。
#[derive(Debug, Default)]
pub struct MemoryBrokerClient {
    published: Mutex<Vec<(String, String)>>,
}

impl MemoryBrokerClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已发布的 (topic, payload)，按发布顺序。
    pub fn published(&self) -> Vec<(String, String)> {
        self.published
            .lock()
            .map(|items| items.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl BrokerClient for MemoryBrokerClient {
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), PublishError> {
        self.published
            .lock()
            .map_err(|_| PublishError::Transport("lock failed".to_string()))?
            .push((topic.to_string(), payload.to_string()));
        Ok(())
    }
}

/// MQTT 连接配置。
#[derive(Debug, Clone)]
pub struct MqttBrokerConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_id: String,
}

/// MQTT 发布客户端（QoS 0，不保留）。
#[derive(Clone)]
pub struct MqttBrokerClient {
    client: AsyncClient,
}

impl MqttBrokerClient {
    /// 建立连接并在后台驱动事件循环。
    pub fn connect(config: MqttBrokerConfig) -> (Self, tokio::task::JoinHandle<()>) {
        let mut options = MqttOptions::new(config.client_id, config.host, config.port);
        options.set_keep_alive(Duration::from_secs(30));
        if let (Some(username), Some(password)) = (config.username, config.password) {
            options.set_credentials(username, password);
        }
        let (client, mut eventloop) = AsyncClient::new(options, 10);
        let handle = tokio::spawn(async move {
            loop {
                if let Err(err) = eventloop.poll().await {
                    warn!(target: "piot.broker", error = %err, "mqtt_publisher_eventloop_error");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        });
        (Self { client }, handle)
    }
}

#[async_trait]
impl BrokerClient for MqttBrokerClient {
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), PublishError> {
        self.client
            .publish(topic, QoS::AtMostOnce, false, payload.as_bytes().to_vec())
            .await
            .map_err(|err| PublishError::Transport(err.to_string()))
    }
}

/// Thing 级发布器：解析组织并拼接主题。
#[derive(Clone)]
pub struct ThingPublisher {
    client: Arc<dyn BrokerClient>,
    orgs: Arc<dyn OrgStore>,
}

impl ThingPublisher {
    pub fn new(client: Arc<dyn BrokerClient>, orgs: Arc<dyn OrgStore>) -> Self {
        Self { client, orgs }
    }

    /// 计算 Thing 某个子主题的完整主题。
    pub async fn thing_topic(&self, thing: &Thing, subtopic: &str) -> Result<String, PublishError> {
        let org_id = thing
            .org_id
            .as_deref()
            .ok_or_else(|| PublishError::NoOrg(thing.name.clone()))?;
        let org = self
            .orgs
            .get(org_id)
            .await
            .map_err(|err| PublishError::Storage(err.to_string()))?
            .ok_or_else(|| PublishError::UnknownOrg(org_id.to_string()))?;
        Ok(format!("{ROOT_TOPIC}/{}/{}/{}", org.name, thing.name, subtopic))
    }

    /// 发布一条 Thing 数据。
    pub async fn push(&self, thing: &Thing, subtopic: &str, value: &str) -> Result<(), PublishError> {
        let topic = self.thing_topic(thing, subtopic).await?;
        match self.client.publish(&topic, value).await {
            Ok(()) => {
                record_publish_success();
                debug!(target: "piot.broker", topic = %topic, value = %value, "thing_data_published");
                Ok(())
            }
            Err(err) => {
                record_publish_failure();
                Err(err)
            }
        }
    }
}
