//! Thing 内存存储实现
//!
//! 注册在写锁内完成“查重 + 插入”，同名并发注册只有一个成功。

use crate::error::StorageError;
use crate::traits::ThingStore;
use crate::validation::{ensure_thing_name, location_is_newer};
use domain::{Location, SensorData, Thing, ThingFilter, ThingKind, ThingType};
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{SystemTime, UNIX_EPOCH};

/// Thing 内存存储
///
/// 使用 RwLock + HashMap（id → Thing）提供线程安全的内存存储。
pub struct InMemoryThingStore {
    things: RwLock<HashMap<String, Thing>>,
}

impl InMemoryThingStore {
    pub fn new() -> Self {
        Self {
            things: RwLock::new(HashMap::new()),
        }
    }

    fn find_where<F>(&self, predicate: F) -> Result<Option<Thing>, StorageError>
    where
        F: Fn(&Thing) -> bool,
    {
        let things = self
            .things
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(things.values().find(|thing| predicate(thing)).cloned())
    }

    /// 对单条记录执行原子修改。
    fn update<F>(&self, id: &str, apply: F) -> Result<(), StorageError>
    where
        F: FnOnce(&mut Thing) -> Result<(), StorageError>,
    {
        let mut things = self
            .things
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        let thing = things.get_mut(id).ok_or_else(|| StorageError::not_found(id))?;
        apply(thing)
    }

    fn update_sensor<F>(&self, id: &str, apply: F) -> Result<(), StorageError>
    where
        F: FnOnce(&mut SensorData),
    {
        self.update(id, |thing| {
            if let ThingKind::Sensor(sensor) = &mut thing.kind {
                apply(sensor);
                return Ok(());
            }
            Err(not_a(thing, ThingType::Sensor))
        })
    }
}

impl Default for InMemoryThingStore {
    fn default() -> Self {
        Self::new()
    }
}

fn not_a(thing: &Thing, expected: ThingType) -> StorageError {
    StorageError::new(format!(
        "thing {} is a {}, not a {}",
        thing.id,
        thing.thing_type().as_str(),
        expected.as_str()
    ))
}

fn now_epoch_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_secs() as i64)
        .unwrap_or(0)
}

#[async_trait::async_trait]
impl ThingStore for InMemoryThingStore {
    async fn get(&self, id: &str) -> Result<Option<Thing>, StorageError> {
        let things = self
            .things
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(things.get(id).cloned())
    }

    async fn find(&self, name: &str) -> Result<Option<Thing>, StorageError> {
        self.find_where(|thing| thing.name == name)
    }

    async fn find_by_piot_id(&self, piot_id: &str) -> Result<Option<Thing>, StorageError> {
        self.find_where(|thing| thing.piot_id.as_deref() == Some(piot_id))
    }

    async fn register(
        &self,
        name: &str,
        thing_type: ThingType,
        piot_id: Option<&str>,
    ) -> Result<Thing, StorageError> {
        ensure_thing_name(name)?;
        let mut things = self
            .things
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        if things.values().any(|thing| thing.name == name) {
            return Err(StorageError::conflict(format!(
                "thing already exists: {name}"
            )));
        }
        let mut thing = Thing::new(uuid::Uuid::new_v4().to_string(), name, thing_type);
        thing.piot_id = piot_id.map(str::to_string);
        thing.created_at = now_epoch_secs();
        things.insert(thing.id.clone(), thing.clone());
        Ok(thing)
    }

    async fn save(&self, thing: &Thing) -> Result<(), StorageError> {
        ensure_thing_name(&thing.name)?;
        let mut things = self
            .things
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        let taken = things
            .values()
            .any(|other| other.name == thing.name && other.id != thing.id);
        if taken {
            return Err(StorageError::conflict(format!(
                "thing already exists: {}",
                thing.name
            )));
        }
        things.insert(thing.id.clone(), thing.clone());
        Ok(())
    }

    async fn set_availability_topic(&self, id: &str, topic: &str) -> Result<(), StorageError> {
        self.update(id, |thing| {
            thing.availability.topic = topic.to_string();
            Ok(())
        })
    }

    async fn set_availability_values(
        &self,
        id: &str,
        yes: &str,
        no: &str,
    ) -> Result<(), StorageError> {
        self.update(id, |thing| {
            thing.availability.yes = yes.to_string();
            thing.availability.no = no.to_string();
            Ok(())
        })
    }

    async fn set_telemetry(&self, id: &str, payload: &str) -> Result<(), StorageError> {
        self.update(id, |thing| {
            thing.telemetry.payload = Some(payload.to_string());
            Ok(())
        })
    }

    async fn set_sensor_measurement_topic(
        &self,
        id: &str,
        topic: &str,
    ) -> Result<(), StorageError> {
        self.update_sensor(id, |sensor| sensor.measurement_topic = topic.to_string())
    }

    async fn set_sensor_class(
        &self,
        id: &str,
        class: &str,
        unit: &str,
    ) -> Result<(), StorageError> {
        self.update_sensor(id, |sensor| {
            sensor.class = class.to_string();
            sensor.unit = unit.to_string();
        })
    }

    async fn set_sensor_value(&self, id: &str, value: &str) -> Result<(), StorageError> {
        self.update_sensor(id, |sensor| sensor.value = Some(value.to_string()))
    }

    async fn set_switch_state(&self, id: &str, state: bool) -> Result<(), StorageError> {
        self.update(id, |thing| {
            if let ThingKind::Switch(switch) = &mut thing.kind {
                switch.state = state;
                return Ok(());
            }
            Err(not_a(thing, ThingType::Switch))
        })
    }

    async fn set_location(&self, id: &str, location: Location) -> Result<bool, StorageError> {
        let mut applied = false;
        self.update(id, |thing| {
            if let ThingKind::Device(device) = &mut thing.kind {
                let stored_ts = device.location.map(|stored| stored.ts);
                if location_is_newer(stored_ts, location.ts) {
                    device.location = Some(location);
                    applied = true;
                }
                return Ok(());
            }
            Err(not_a(thing, ThingType::Device))
        })?;
        Ok(applied)
    }

    async fn set_parent(&self, id: &str, parent_id: &str) -> Result<(), StorageError> {
        self.update(id, |thing| {
            thing.parent_id = Some(parent_id.to_string());
            Ok(())
        })
    }

    async fn touch(&self, id: &str, ts: i64) -> Result<(), StorageError> {
        self.update(id, |thing| {
            thing.last_seen = ts;
            Ok(())
        })
    }

    async fn set_battery_level(&self, id: &str, level: i32) -> Result<(), StorageError> {
        self.update(id, |thing| {
            thing.battery.level = Some(level);
            Ok(())
        })
    }

    async fn list(&self, filter: &ThingFilter) -> Result<Vec<Thing>, StorageError> {
        let things = self
            .things
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        let mut items: Vec<Thing> = things
            .values()
            .filter(|thing| filter.matches(thing))
            .cloned()
            .collect();
        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(items)
    }
}
