//! broker 订阅链路装配：MQTT 订阅源 → 主题路由 → 注册表与落库。

use piot_config::AppConfig;
use piot_ingest::{MqttSource, MqttSourceConfig, NoopSource, RawEventHandler, Source};
use piot_router::TopicRouter;
use piot_sinks::{RelationalSink, TimeSeriesSink};
use piot_storage::{OrgStore, ThingStore};
use std::sync::Arc;
use tracing::{info, warn};

/// 启动主题路由任务；`PIOT_MQTT_ROUTER_ENABLED=false` 时使用空订阅源。
pub fn spawn_router(
    config: &AppConfig,
    things: Arc<dyn ThingStore>,
    orgs: Arc<dyn OrgStore>,
    timeseries: Arc<dyn TimeSeriesSink>,
    relational: Arc<dyn RelationalSink>,
) -> tokio::task::JoinHandle<()> {
    let handler: Arc<dyn RawEventHandler> =
        Arc::new(TopicRouter::new(things, orgs, timeseries, relational));

    let source: Arc<dyn Source> = if config.router_enabled {
        let mqtt_config = MqttSourceConfig {
            host: config.mqtt_host.clone(),
            port: config.mqtt_port,
            username: config.mqtt_username.clone(),
            password: config.mqtt_password.clone(),
            client_id: format!("{}-sub", config.mqtt_client_id),
        };
        info!(
            target: "piot.router",
            host = %mqtt_config.host,
            port = mqtt_config.port,
            "router_source_mqtt"
        );
        Arc::new(MqttSource::new(mqtt_config))
    } else {
        info!(target: "piot.router", "router_source_noop");
        Arc::new(NoopSource)
    };

    tokio::spawn(async move {
        if let Err(err) = source.run(handler).await {
            warn!(target: "piot.router", error = %err, "router_stopped");
        }
    })
}
