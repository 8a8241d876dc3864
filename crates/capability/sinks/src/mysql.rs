//! MySQL 关系落库。
//!
//! 表结构由外部维护：
//! - `piot_sensors (id, org, class, value, time)`
//! - `piot_switches (id, org, value, time)`
//!
//! 写入时间按 Thing 的 `relational_interval` 向下取整，同一区间内的重复写入被
//! `INSERT IGNORE` 丢弃。

use crate::{RelationalSink, SinkError};
use async_trait::async_trait;
use domain::{Org, Thing};
use sqlx::MySqlPool;
use sqlx::mysql::MySqlPoolOptions;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

pub struct MySqlSink {
    pool: MySqlPool,
}

impl MySqlSink {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, SinkError> {
        let pool = MySqlPoolOptions::new()
            .max_connections(8)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }
}

/// 把 unix 秒向下取整到 `interval` 的整数倍，`interval <= 0` 时原样返回。
pub fn bucket_timestamp(ts_secs: i64, interval: i64) -> i64 {
    if interval <= 0 {
        return ts_secs;
    }
    ts_secs - ts_secs.rem_euclid(interval)
}

fn now_epoch_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_secs() as i64)
        .unwrap_or(0)
}

fn parse_number(thing: &Thing, value: &str) -> Result<f64, SinkError> {
    value.trim().parse().map_err(|_| SinkError::InvalidValue {
        thing: thing.name.clone(),
        value: value.to_string(),
    })
}

#[async_trait]
impl RelationalSink for MySqlSink {
    async fn store_measurement(&self, org: &Org, thing: &Thing, value: &str) -> Result<(), SinkError> {
        if org.relational_db.is_empty() {
            debug!(target: "piot.sinks", org = %org.name, "relational_db_not_configured");
            return Ok(());
        }
        let value = parse_number(thing, value)?;
        let class = thing
            .as_sensor()
            .map(|sensor| sensor.class.as_str())
            .unwrap_or_default();
        let ts = bucket_timestamp(now_epoch_secs(), thing.persistence.relational_interval);
        sqlx::query(
            "INSERT IGNORE INTO piot_sensors (id, org, class, value, time) \
             VALUES (?, ?, ?, ?, FROM_UNIXTIME(?))",
        )
        .bind(&thing.id)
        .bind(&org.relational_db)
        .bind(class)
        .bind(value)
        .bind(ts)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn store_switch_state(&self, org: &Org, thing: &Thing, value: &str) -> Result<(), SinkError> {
        if org.relational_db.is_empty() {
            debug!(target: "piot.sinks", org = %org.name, "relational_db_not_configured");
            return Ok(());
        }
        let value = parse_number(thing, value)?;
        let ts = bucket_timestamp(now_epoch_secs(), thing.persistence.relational_interval);
        sqlx::query(
            "INSERT IGNORE INTO piot_switches (id, org, value, time) \
             VALUES (?, ?, ?, FROM_UNIXTIME(?))",
        )
        .bind(&thing.id)
        .bind(&org.relational_db)
        .bind(value)
        .bind(ts)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::bucket_timestamp;

    #[test]
    fn timestamps_floor_to_interval() {
        assert_eq!(bucket_timestamp(1_700_000_123, 60), 1_700_000_100);
        assert_eq!(bucket_timestamp(1_700_000_123, 0), 1_700_000_123);
        assert_eq!(bucket_timestamp(1_700_000_100, 100), 1_700_000_100);
    }
}
