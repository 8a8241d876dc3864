//! 主题路由：把 `org/<orgName>/<subtopic...>` 上的消息分发给订阅了该子主题的 Thing。
//!
//! 每条消息依次经过电量、设备、传感器、开关四类规则，同一主题可同时命中多类规则
//! 与多个 Thing。单个 Thing 的存储或落库失败只记日志，不影响其余匹配项。

pub mod rules;
pub mod template;

use async_trait::async_trait;
use domain::{Org, ROOT_TOPIC, RawEvent, Thing, ThingFilter, ThingType, TopicField};
use piot_ingest::{IngestError, RawEventHandler, now_epoch_secs};
use piot_sinks::{RelationalSink, SinkError, TimeSeriesSink};
use piot_storage::{OrgStore, StorageError, ThingStore};
use piot_telemetry::{
    record_message_dropped, record_message_routed, record_sink_write_failure,
    record_sink_write_latency_ms, record_sink_write_success,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// 路由错误。
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),
    #[error("missing {0} template")]
    MissingTemplate(&'static str),
    #[error("invalid {field} value: {value:?}")]
    InvalidValue { field: &'static str, value: String },
    #[error("unknown switch state: {0:?}")]
    UnknownSwitchState(String),
}

/// 拆分主题：返回组织名与 Thing 相对子主题；不属于根主题或段数不足时返回 `None`。
pub fn split_topic(topic: &str) -> Option<(&str, &str)> {
    let (root, rest) = topic.split_once('/')?;
    if root != ROOT_TOPIC {
        return None;
    }
    let (org, subtopic) = rest.split_once('/')?;
    Some((org, subtopic))
}

pub struct TopicRouter {
    things: Arc<dyn ThingStore>,
    orgs: Arc<dyn OrgStore>,
    timeseries: Arc<dyn TimeSeriesSink>,
    relational: Arc<dyn RelationalSink>,
}

impl TopicRouter {
    pub fn new(
        things: Arc<dyn ThingStore>,
        orgs: Arc<dyn OrgStore>,
        timeseries: Arc<dyn TimeSeriesSink>,
        relational: Arc<dyn RelationalSink>,
    ) -> Self {
        Self {
            things,
            orgs,
            timeseries,
            relational,
        }
    }

    /// 处理一条 broker 消息。无法归属的消息被丢弃并返回 `Ok`。
    pub async fn route(&self, topic: &str, payload: &str) -> Result<(), RouterError> {
        let Some((org_name, subtopic)) = split_topic(topic) else {
            record_message_dropped();
            debug!(target: "piot.router", topic = %topic, "message_outside_org_tree");
            return Ok(());
        };
        let Some(org) = self.orgs.find_by_name(org_name).await? else {
            record_message_dropped();
            warn!(target: "piot.router", topic = %topic, org = %org_name, "unknown_org");
            return Ok(());
        };
        record_message_routed();
        debug!(target: "piot.router", org = %org.name, subtopic = %subtopic, "message_routed");

        self.route_battery(&org, subtopic, payload).await;
        self.route_devices(&org, subtopic, payload).await;
        self.route_sensors(&org, subtopic, payload).await;
        self.route_switches(&org, subtopic, payload).await;
        Ok(())
    }

    async fn matching(&self, filter: ThingFilter, rule: &'static str) -> Vec<Thing> {
        match self.things.list(&filter).await {
            Ok(things) => things,
            Err(err) => {
                warn!(target: "piot.router", rule, error = %err, "thing_lookup_failed");
                Vec::new()
            }
        }
    }

    async fn route_battery(&self, org: &Org, subtopic: &str, payload: &str) {
        let filter = ThingFilter::org(&org.id).with_topic(TopicField::Battery, subtopic);
        for thing in self.matching(filter, "battery").await {
            let result = self.apply_battery(org, &thing, payload).await;
            log_failure("battery", &thing, result);
        }
    }

    async fn route_devices(&self, org: &Org, subtopic: &str, payload: &str) {
        let devices = ThingFilter::org(&org.id).with_type(ThingType::Device);

        let filter = devices.clone().with_topic(TopicField::Availability, subtopic);
        for thing in self.matching(filter, "availability").await {
            let result = self.touch(&thing).await;
            log_failure("availability", &thing, result);
        }

        let filter = devices.clone().with_topic(TopicField::Telemetry, subtopic);
        for thing in self.matching(filter, "telemetry").await {
            let result = self.apply_telemetry(&thing, payload).await;
            log_failure("telemetry", &thing, result);
        }

        let filter = devices.with_topic(TopicField::Location, subtopic);
        for thing in self.matching(filter, "location").await {
            let result = self.apply_location(org, &thing, payload).await;
            log_failure("location", &thing, result);
        }
    }

    async fn route_sensors(&self, org: &Org, subtopic: &str, payload: &str) {
        let filter = ThingFilter::org(&org.id)
            .with_type(ThingType::Sensor)
            .with_topic(TopicField::Measurement, subtopic);
        for thing in self.matching(filter, "sensor").await {
            let result = self.apply_sensor(org, &thing, payload).await;
            log_failure("sensor", &thing, result);
        }
    }

    async fn route_switches(&self, org: &Org, subtopic: &str, payload: &str) {
        let filter = ThingFilter::org(&org.id)
            .with_type(ThingType::Switch)
            .with_topic(TopicField::SwitchState, subtopic);
        for thing in self.matching(filter, "switch").await {
            let result = self.apply_switch(org, &thing, payload).await;
            log_failure("switch", &thing, result);
        }
    }

    async fn touch(&self, thing: &Thing) -> Result<(), RouterError> {
        self.things.touch(&thing.id, now_epoch_secs()).await?;
        Ok(())
    }

    async fn apply_battery(&self, org: &Org, thing: &Thing, payload: &str) -> Result<(), RouterError> {
        self.touch(thing).await?;
        let level = rules::battery_level(&thing.battery, payload)?;
        self.things.set_battery_level(&thing.id, level).await?;
        if thing.battery.tracking {
            timed_write(self.timeseries.post_battery_level(org, thing, level)).await?;
        }
        Ok(())
    }

    async fn apply_telemetry(&self, thing: &Thing, payload: &str) -> Result<(), RouterError> {
        self.touch(thing).await?;
        self.things.set_telemetry(&thing.id, payload).await?;
        Ok(())
    }

    async fn apply_location(&self, org: &Org, thing: &Thing, payload: &str) -> Result<(), RouterError> {
        self.touch(thing).await?;
        let Some(device) = thing.as_device() else {
            return Ok(());
        };
        let location = rules::device_location(&device.location_source, payload, now_epoch_secs())?;
        if !self.things.set_location(&thing.id, location).await? {
            debug!(target: "piot.router", thing_id = %thing.id, ts = location.ts, "stale_location_kept");
        }
        if device.location_source.tracking {
            timed_write(self.timeseries.post_location(org, thing, &location)).await?;
        }
        Ok(())
    }

    async fn apply_sensor(&self, org: &Org, thing: &Thing, payload: &str) -> Result<(), RouterError> {
        let Some(sensor) = thing.as_sensor() else {
            return Ok(());
        };
        let value = rules::sensor_value(sensor, payload);
        self.touch(thing).await?;
        self.things.set_sensor_value(&thing.id, &value).await?;

        // 两个落库目标互不影响
        let timeseries = if thing.persistence.timeseries {
            timed_write(self.timeseries.post_measurement(org, thing, &value)).await
        } else {
            Ok(())
        };
        let relational = if thing.persistence.relational {
            timed_write(self.relational.store_measurement(org, thing, &value)).await
        } else {
            Ok(())
        };
        timeseries.and(relational)
    }

    async fn apply_switch(&self, org: &Org, thing: &Thing, payload: &str) -> Result<(), RouterError> {
        let Some(switch) = thing.as_switch() else {
            return Ok(());
        };
        self.touch(thing).await?;
        let state = rules::switch_state(switch, payload)?;
        self.things.set_switch_state(&thing.id, state).await?;

        let value = rules::switch_value(state);
        let timeseries = if thing.persistence.timeseries {
            timed_write(self.timeseries.post_switch_state(org, thing, value)).await
        } else {
            Ok(())
        };
        let relational = if thing.persistence.relational {
            timed_write(self.relational.store_switch_state(org, thing, value)).await
        } else {
            Ok(())
        };
        timeseries.and(relational)
    }
}

#[async_trait]
impl RawEventHandler for TopicRouter {
    async fn handle(&self, event: RawEvent) -> Result<(), IngestError> {
        let payload = event.payload_str();
        self.route(&event.topic, &payload)
            .await
            .map_err(|err| IngestError::Handler(err.to_string()))
    }
}

async fn timed_write<F>(write: F) -> Result<(), RouterError>
where
    F: Future<Output = Result<(), SinkError>>,
{
    let started_at = Instant::now();
    match write.await {
        Ok(()) => {
            record_sink_write_success();
            record_sink_write_latency_ms(started_at.elapsed().as_millis() as u64);
            Ok(())
        }
        Err(err) => {
            record_sink_write_failure();
            Err(err.into())
        }
    }
}

fn log_failure(rule: &'static str, thing: &Thing, result: Result<(), RouterError>) {
    if let Err(err) = result {
        warn!(
            target: "piot.router",
            rule,
            thing_id = %thing.id,
            thing = %thing.name,
            error = %err,
            "rule_failed"
        );
    }
}
