//! 设备数据包处理。
//!
//! 流程：校验设备标识 → 防抖 → 解析或注册设备 → 发布设备状态 →
//! 逐个读数解析或注册传感器并发布测量值。
//! 单个读数失败只记日志；设备本身解析失败则整个数据包失败。

use crate::{DebounceCache, IngestError};
use domain::{DevicePacket, SensorClass, Thing, ThingKind, ThingType};
use piot_broker::ThingPublisher;
use piot_storage::{StorageError, ThingStore};
use piot_telemetry::{
    record_packet_accepted, record_packet_rate_limited, record_packet_rejected,
    record_thing_registered,
};
use std::sync::Arc;
use tracing::{info, warn};

const AVAILABILITY_TOPIC: &str = "available";
const AVAILABLE_YES: &str = "yes";
const AVAILABLE_NO: &str = "no";
const MEASUREMENT_TOPIC: &str = "value";
const UNIT_TOPIC: &str = "value/unit";

pub struct PacketIngestor {
    things: Arc<dyn ThingStore>,
    publisher: ThingPublisher,
    debounce: Arc<DebounceCache>,
}

impl PacketIngestor {
    pub fn new(
        things: Arc<dyn ThingStore>,
        publisher: ThingPublisher,
        debounce: Arc<DebounceCache>,
    ) -> Self {
        Self {
            things,
            publisher,
            debounce,
        }
    }

    pub async fn process(&self, packet: &DevicePacket) -> Result<(), IngestError> {
        if packet.device_id.is_empty() {
            record_packet_rejected();
            return Err(IngestError::InvalidPacket(
                "device name cannot be empty".to_string(),
            ));
        }

        if let Err(err) = self.debounce.check_and_record(&packet.device_id) {
            if matches!(err, IngestError::RateLimited(_)) {
                record_packet_rate_limited();
                warn!(target: "piot.ingest", device_id = %packet.device_id, "device_packet_rate_limited");
            }
            return Err(err);
        }

        let device = self.resolve_device(&packet.device_id).await?;
        info!(
            target: "piot.ingest",
            device_id = %packet.device_id,
            thing_id = %device.id,
            readings = packet.readings.len(),
            "device_packet_received"
        );

        if device.org_id.is_some() && device.enabled {
            self.publish_device_state(&device, packet).await;
        }

        for reading in &packet.readings {
            for (class, value) in reading.measurements() {
                if let Err(err) = self
                    .process_measurement(&device, &reading.address, class, value)
                    .await
                {
                    warn!(
                        target: "piot.ingest",
                        device_id = %packet.device_id,
                        address = %reading.address,
                        class = class.as_str(),
                        error = %err,
                        "sensor_reading_failed"
                    );
                }
            }
        }

        record_packet_accepted();
        Ok(())
    }

    /// 按原生标识查找设备，不存在时注册并写入可用性主题。
    async fn resolve_device(&self, device_id: &str) -> Result<Thing, IngestError> {
        if let Some(device) = self
            .things
            .find_by_piot_id(device_id)
            .await
            .map_err(registry_error)?
        {
            return ensure_device(device_id, device);
        }

        let mut device = match self
            .things
            .register(device_id, ThingType::Device, Some(device_id))
            .await
        {
            Ok(device) => device,
            Err(err) if err.is_conflict() => {
                let existing = self
                    .things
                    .find(device_id)
                    .await
                    .map_err(registry_error)?
                    .ok_or_else(|| IngestError::Registry(err.to_string()))?;
                return ensure_device(device_id, existing);
            }
            Err(err) => return Err(registry_error(err)),
        };
        record_thing_registered();
        info!(target: "piot.ingest", device_id = %device_id, thing_id = %device.id, "device_registered");

        self.things
            .set_availability_topic(&device.id, AVAILABILITY_TOPIC)
            .await
            .map_err(registry_error)?;
        self.things
            .set_availability_values(&device.id, AVAILABLE_YES, AVAILABLE_NO)
            .await
            .map_err(registry_error)?;
        device.availability.topic = AVAILABILITY_TOPIC.to_string();
        device.availability.yes = AVAILABLE_YES.to_string();
        device.availability.no = AVAILABLE_NO.to_string();
        Ok(device)
    }

    async fn publish_device_state(&self, device: &Thing, packet: &DevicePacket) {
        self.push_or_log(device, AVAILABILITY_TOPIC, AVAILABLE_YES)
            .await;
        if let Some(ip) = packet.ip.as_deref() {
            self.push_or_log(device, "net/ip", ip).await;
        }
        if let Some(ssid) = packet.wifi_ssid.as_deref() {
            self.push_or_log(device, "net/wifi/ssid", ssid).await;
        }
        if let Some(strength) = packet.wifi_strength {
            self.push_or_log(device, "net/wifi/strength", &format!("{strength:.6}"))
                .await;
        }
    }

    async fn process_measurement(
        &self,
        device: &Thing,
        raw_address: &str,
        class: SensorClass,
        value: f32,
    ) -> Result<(), IngestError> {
        let address = class.sensor_address(raw_address);
        let sensor = self.resolve_sensor(&address, class).await?;

        if sensor.parent_id.as_deref() != Some(device.id.as_str()) {
            self.things
                .set_parent(&sensor.id, &device.id)
                .await
                .map_err(registry_error)?;
            info!(
                target: "piot.ingest",
                sensor = %sensor.name,
                parent_id = %device.id,
                "sensor_reparented"
            );
        }

        if sensor.org_id.is_none() {
            return Ok(());
        }
        // 上报设备被禁用时只做登记，不发布
        if !device.enabled {
            return Ok(());
        }

        let unit = sensor
            .as_sensor()
            .map(|data| data.unit.as_str())
            .filter(|unit| !unit.is_empty())
            .unwrap_or(class.unit());
        self.push_or_log(&sensor, AVAILABILITY_TOPIC, AVAILABLE_YES)
            .await;
        self.push_or_log(&sensor, MEASUREMENT_TOPIC, &value.to_string())
            .await;
        self.push_or_log(&sensor, UNIT_TOPIC, unit).await;
        Ok(())
    }

    /// 按带类别前缀的地址查找传感器，不存在时注册并写入测量主题与类别。
    async fn resolve_sensor(&self, address: &str, class: SensorClass) -> Result<Thing, IngestError> {
        if let Some(sensor) = self.things.find(address).await.map_err(registry_error)? {
            if sensor.thing_type() != ThingType::Sensor {
                return Err(IngestError::Registry(format!(
                    "name {address} is taken by a {}",
                    sensor.thing_type().as_str()
                )));
            }
            return Ok(sensor);
        }

        let mut sensor = match self
            .things
            .register(address, ThingType::Sensor, Some(address))
            .await
        {
            Ok(sensor) => sensor,
            Err(err) if err.is_conflict() => {
                return self
                    .things
                    .find(address)
                    .await
                    .map_err(registry_error)?
                    .ok_or_else(|| IngestError::Registry(err.to_string()));
            }
            Err(err) => return Err(registry_error(err)),
        };
        record_thing_registered();
        info!(target: "piot.ingest", sensor = %address, class = class.as_str(), "sensor_registered");

        self.things
            .set_sensor_measurement_topic(&sensor.id, MEASUREMENT_TOPIC)
            .await
            .map_err(registry_error)?;
        self.things
            .set_sensor_class(&sensor.id, class.as_str(), class.unit())
            .await
            .map_err(registry_error)?;
        if let ThingKind::Sensor(data) = &mut sensor.kind {
            data.measurement_topic = MEASUREMENT_TOPIC.to_string();
            data.class = class.as_str().to_string();
            data.unit = class.unit().to_string();
        }
        Ok(sensor)
    }

    async fn push_or_log(&self, thing: &Thing, subtopic: &str, value: &str) {
        if let Err(err) = self.publisher.push(thing, subtopic, value).await {
            warn!(
                target: "piot.ingest",
                thing = %thing.name,
                subtopic = %subtopic,
                error = %err,
                "thing_publish_failed"
            );
        }
    }
}

/// 设备标识被传感器或开关占用时整个数据包失败。
fn ensure_device(device_id: &str, thing: Thing) -> Result<Thing, IngestError> {
    if thing.thing_type() != ThingType::Device {
        return Err(IngestError::Registry(format!(
            "device {device_id} resolves to a {}",
            thing.thing_type().as_str()
        )));
    }
    Ok(thing)
}

fn registry_error(err: StorageError) -> IngestError {
    IngestError::Registry(err.to_string())
}
