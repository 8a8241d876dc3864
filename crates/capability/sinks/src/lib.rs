//! 落库目标：时序库（InfluxDB）与关系库（MySQL）。
//!
//! 调用方按 Thing 的落库开关决定是否调用；组织未配置库名时直接跳过。
//! 不做重试，失败交由调用方记日志。

pub mod influx;
pub mod metric;
pub mod mysql;

pub use influx::{InfluxDbConfig, InfluxDbSink};
pub use metric::{FieldValue, Metric};
pub use mysql::{MySqlSink, bucket_timestamp};

use async_trait::async_trait;
use domain::{Location, Org, Thing};

/// 落库错误。
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("invalid value for {thing}: {value}")]
    InvalidValue { thing: String, value: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for SinkError {
    fn from(err: sqlx::Error) -> Self {
        SinkError::Database(err.to_string())
    }
}

/// 时序落库接口。
#[async_trait]
pub trait TimeSeriesSink: Send + Sync {
    async fn post_measurement(&self, org: &Org, thing: &Thing, value: &str)
    -> Result<(), SinkError>;

    async fn post_switch_state(
        &self,
        org: &Org,
        thing: &Thing,
        value: &str,
    ) -> Result<(), SinkError>;

    async fn post_location(
        &self,
        org: &Org,
        thing: &Thing,
        location: &Location,
    ) -> Result<(), SinkError>;

    async fn post_battery_level(&self, org: &Org, thing: &Thing, level: i32)
    -> Result<(), SinkError>;
}

/// 关系落库接口。
#[async_trait]
pub trait RelationalSink: Send + Sync {
    async fn store_measurement(
        &self,
        org: &Org,
        thing: &Thing,
        value: &str,
    ) -> Result<(), SinkError>;

    async fn store_switch_state(
        &self,
        org: &Org,
        thing: &Thing,
        value: &str,
    ) -> Result<(), SinkError>;
}

/// 空时序落库（未配置 InfluxDB 时使用）。
#[derive(Debug, Default)]
pub struct NoopTimeSeriesSink;

#[async_trait]
impl TimeSeriesSink for NoopTimeSeriesSink {
    async fn post_measurement(&self, _: &Org, _: &Thing, _: &str) -> Result<(), SinkError> {
        Ok(())
    }

    async fn post_switch_state(&self, _: &Org, _: &Thing, _: &str) -> Result<(), SinkError> {
        Ok(())
    }

    async fn post_location(&self, _: &Org, _: &Thing, _: &Location) -> Result<(), SinkError> {
        Ok(())
    }

    async fn post_battery_level(&self, _: &Org, _: &Thing, _: i32) -> Result<(), SinkError> {
        Ok(())
    }
}

/// 空关系落库（未配置 MySQL 时使用）。
#[derive(Debug, Default)]
pub struct NoopRelationalSink;

#[async_trait]
impl RelationalSink for NoopRelationalSink {
    async fn store_measurement(&self, _: &Org, _: &Thing, _: &str) -> Result<(), SinkError> {
        Ok(())
    }

    async fn store_switch_state(&self, _: &Org, _: &Thing, _: &str) -> Result<(), SinkError> {
        Ok(())
    }
}
