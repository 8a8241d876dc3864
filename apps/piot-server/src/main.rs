//! PIOT 服务进程：设备接入 HTTP 适配器、mosquitto 认证回调、broker 主题路由。

mod handlers;
mod ingest;
mod middleware;
mod monitor;
mod routes;
mod utils;

use piot_auth::{AccessGate, AuthProvider, RegistryAccounts, StaticAccounts};
use piot_broker::{BrokerClient, MqttBrokerClient, MqttBrokerConfig, ThingPublisher};
use piot_config::AppConfig;
use piot_ingest::{DebounceCache, PacketIngestor};
use piot_sinks::{
    InfluxDbConfig, InfluxDbSink, MySqlSink, NoopRelationalSink, NoopTimeSeriesSink,
    RelationalSink, TimeSeriesSink,
};
use piot_storage::{OrgStore, PgOrgStore, PgThingStore, PgUserStore, ThingStore, connect_pool};
use piot_telemetry::init_tracing;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// 请求处理共享状态。
#[derive(Clone)]
pub struct AppState {
    pub ingestor: Arc<PacketIngestor>,
    pub gate: Arc<AccessGate>,
    /// 未配置时不接受加密请求体。
    pub adapter_password: Option<Arc<str>>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;
    init_tracing();

    // 注册表（需先执行 migrations）
    let pool = connect_pool(&config.database_url).await?;
    let thing_store: Arc<dyn ThingStore> = Arc::new(PgThingStore::new(pool.clone()));
    let org_store: Arc<dyn OrgStore> = Arc::new(PgOrgStore::new(pool.clone()));
    let user_store = Arc::new(PgUserStore::new(pool));

    // broker 发布连接
    let (broker, _broker_loop) = MqttBrokerClient::connect(MqttBrokerConfig {
        host: config.mqtt_host.clone(),
        port: config.mqtt_port,
        username: config.mqtt_username.clone(),
        password: config.mqtt_password.clone(),
        client_id: format!("{}-pub", config.mqtt_client_id),
    });
    let broker: Arc<dyn BrokerClient> = Arc::new(broker);
    let publisher = ThingPublisher::new(broker, org_store.clone());

    let debounce = Arc::new(DebounceCache::new(config.dos_interval()));
    let ingestor = Arc::new(PacketIngestor::new(
        thing_store.clone(),
        publisher,
        debounce,
    ));

    let providers: Vec<Arc<dyn AuthProvider>> = vec![
        Arc::new(StaticAccounts::service_accounts(
            config.static_accounts.test.clone(),
            config.static_accounts.mon.clone(),
            config.static_accounts.piot.clone(),
        )),
        Arc::new(RegistryAccounts::new(user_store)),
    ];
    let gate = Arc::new(AccessGate::new(providers));

    let (timeseries, relational) = connect_sinks(&config).await?;
    let _router = ingest::spawn_router(&config, thing_store.clone(), org_store, timeseries, relational);
    let _monitor = monitor::spawn_monitor(
        thing_store,
        Duration::from_secs(config.monitor_interval_seconds),
    );

    let app = routes::create_router(AppState {
        ingestor,
        gate,
        adapter_password: config.adapter_password.as_deref().map(Arc::from),
    });
    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    info!(target: "piot.http", addr = %config.http_addr, "http_listening");
    axum::serve(listener, app).await?;
    Ok(())
}

/// 按配置选择落库目标，未配置时使用空实现。
async fn connect_sinks(
    config: &AppConfig,
) -> Result<(Arc<dyn TimeSeriesSink>, Arc<dyn RelationalSink>), Box<dyn std::error::Error>> {
    let timeseries: Arc<dyn TimeSeriesSink> = match &config.influxdb_uri {
        Some(uri) => {
            info!(target: "piot.sinks", uri = %uri, "influxdb_sink_enabled");
            Arc::new(InfluxDbSink::new(InfluxDbConfig {
                uri: uri.clone(),
                username: config.influxdb_username.clone(),
                password: config.influxdb_password.clone(),
            })?)
        }
        None => Arc::new(NoopTimeSeriesSink),
    };
    let relational: Arc<dyn RelationalSink> = match &config.mysqldb_url {
        Some(url) => {
            info!(target: "piot.sinks", "mysql_sink_enabled");
            Arc::new(MySqlSink::connect(url).await?)
        }
        None => Arc::new(NoopRelationalSink),
    };
    Ok((timeseries, relational))
}
