//! InfluxDB 时序落库：`POST <uri>/write?db=<org.timeseries_db>&precision=s`。

use crate::metric::{FieldValue, Metric};
use crate::{SinkError, TimeSeriesSink};
use async_trait::async_trait;
use domain::{Location, Org, Thing};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct InfluxDbConfig {
    pub uri: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

pub struct InfluxDbSink {
    http: reqwest::Client,
    config: InfluxDbConfig,
}

impl InfluxDbSink {
    pub fn new(config: InfluxDbConfig) -> Result<Self, SinkError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|err| SinkError::Transport(err.to_string()))?;
        Ok(Self { http, config })
    }

    /// 写入单条记录；组织未配置时序库名时跳过。
    pub async fn write(&self, org: &Org, metric: &Metric) -> Result<(), SinkError> {
        if org.timeseries_db.is_empty() {
            debug!(target: "piot.sinks", org = %org.name, "timeseries_db_not_configured");
            return Ok(());
        }
        let url = format!("{}/write", self.config.uri.trim_end_matches('/'));
        let mut request = self
            .http
            .post(url)
            .query(&[("db", org.timeseries_db.as_str()), ("precision", "s")])
            .body(metric.encode());
        if let Some(username) = self.config.username.as_deref() {
            request = request.basic_auth(username, self.config.password.as_deref());
        }
        let response = request
            .send()
            .await
            .map_err(|err| SinkError::Transport(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SinkError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl TimeSeriesSink for InfluxDbSink {
    async fn post_measurement(&self, org: &Org, thing: &Thing, value: &str) -> Result<(), SinkError> {
        let parsed: f64 = value.trim().parse().map_err(|_| SinkError::InvalidValue {
            thing: thing.name.clone(),
            value: value.to_string(),
        })?;
        let class = thing
            .as_sensor()
            .map(|sensor| sensor.class.clone())
            .unwrap_or_default();
        let metric = Metric::new("sensor")
            .tag("id", &thing.id)
            .tag("name", thing.display_name())
            .tag("class", class)
            .field("value", FieldValue::Float(parsed));
        self.write(org, &metric).await
    }

    async fn post_switch_state(&self, org: &Org, thing: &Thing, value: &str) -> Result<(), SinkError> {
        let field = match value.trim().parse::<i64>() {
            Ok(state) => FieldValue::Integer(state),
            Err(_) => FieldValue::Text(value.to_string()),
        };
        let metric = Metric::new("switch")
            .tag("id", &thing.id)
            .tag("name", thing.display_name())
            .field("value", field);
        self.write(org, &metric).await
    }

    async fn post_location(
        &self,
        org: &Org,
        thing: &Thing,
        location: &Location,
    ) -> Result<(), SinkError> {
        let metric = Metric::new("location")
            .tag("id", &thing.id)
            .tag("name", thing.display_name())
            .field("lat", FieldValue::Float(location.lat))
            .field("lng", FieldValue::Float(location.lng))
            .field("sat", FieldValue::Integer(i64::from(location.sat)))
            .timestamp(location.ts);
        self.write(org, &metric).await
    }

    async fn post_battery_level(&self, org: &Org, thing: &Thing, level: i32) -> Result<(), SinkError> {
        let metric = Metric::new("battery")
            .tag("id", &thing.id)
            .tag("name", thing.display_name())
            .field("level", FieldValue::Integer(i64::from(level)));
        self.write(org, &metric).await
    }
}
