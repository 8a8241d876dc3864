//! 应用运行配置加载。

use std::env;
use std::time::Duration;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env: {0}")]
    Missing(String),
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

/// 应用运行配置。
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http_addr: String,
    pub database_url: String,
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_username: Option<String>,
    pub mqtt_password: Option<String>,
    pub mqtt_client_id: String,
    pub router_enabled: bool,
    pub dos_interval_ms: u64,
    pub influxdb_uri: Option<String>,
    pub influxdb_username: Option<String>,
    pub influxdb_password: Option<String>,
    pub mysqldb_url: Option<String>,
    /// `/adapter` 加密请求体的 AES-128 口令（16 字节）。
    pub adapter_password: Option<String>,
    pub static_accounts: StaticAccountPasswords,
    pub monitor_interval_seconds: u64,
}

/// 内置服务账号口令，空串表示该账号始终拒绝。
#[derive(Debug, Clone, Default)]
pub struct StaticAccountPasswords {
    pub test: String,
    pub mon: String,
    pub piot: String,
}

impl AppConfig {
    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = env::var("PIOT_DATABASE_URL")
            .map_err(|_| ConfigError::Missing("PIOT_DATABASE_URL".to_string()))?;
        let http_addr = env::var("PIOT_HTTP_ADDR").unwrap_or_else(|_| "0.0.0.0:9096".to_string());
        let mqtt_host = env::var("PIOT_MQTT_HOST").unwrap_or_else(|_| "localhost".to_string());
        let mqtt_port = read_u16_with_default("PIOT_MQTT_PORT", 1883)?;
        let mqtt_username = read_optional("PIOT_MQTT_USERNAME");
        let mqtt_password = read_optional("PIOT_MQTT_PASSWORD");
        let mqtt_client_id =
            env::var("PIOT_MQTT_CLIENT_ID").unwrap_or_else(|_| "piot-server".to_string());
        let router_enabled = read_bool_with_default("PIOT_MQTT_ROUTER_ENABLED", true)?;
        let dos_interval_ms = read_u64_with_default("PIOT_DOS_INTERVAL_MS", 1000)?;
        let influxdb_uri = read_optional("PIOT_INFLUXDB_URI");
        let influxdb_username = read_optional("PIOT_INFLUXDB_USERNAME");
        let influxdb_password = read_optional("PIOT_INFLUXDB_PASSWORD");
        let mysqldb_url = read_optional("PIOT_MYSQLDB_URL");
        let adapter_password = read_optional("PIOT_ADAPTER_PASSWORD");
        let static_accounts = StaticAccountPasswords {
            test: env::var("PIOT_AUTH_TEST_PASSWORD").unwrap_or_default(),
            mon: env::var("PIOT_AUTH_MON_PASSWORD").unwrap_or_default(),
            piot: env::var("PIOT_AUTH_PIOT_PASSWORD").unwrap_or_default(),
        };
        let monitor_interval_seconds = read_u64_with_default("PIOT_MONITOR_INTERVAL_SECONDS", 0)?;

        Ok(Self {
            http_addr,
            database_url,
            mqtt_host,
            mqtt_port,
            mqtt_username,
            mqtt_password,
            mqtt_client_id,
            router_enabled,
            dos_interval_ms,
            influxdb_uri,
            influxdb_username,
            influxdb_password,
            mysqldb_url,
            adapter_password,
            static_accounts,
            monitor_interval_seconds,
        })
    }

    /// 同一设备两次数据包之间的最小间隔。
    pub fn dos_interval(&self) -> Duration {
        Duration::from_millis(self.dos_interval_ms)
    }
}

fn read_u16_with_default(key: &str, default: u16) -> Result<u16, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u16>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_u64_with_default(key: &str, default: u64) -> Result<u64, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u64>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.is_empty() => Some(value),
        _ => None,
    }
}

fn read_bool_with_default(key: &str, default: bool) -> Result<bool, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "on" => Ok(true),
        "0" | "false" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid(key.to_string(), value)),
    }
}
