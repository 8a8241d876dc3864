//! Thing 模型：设备、传感器、开关的统一记录。
//!
//! 公共字段（命名、组织归属、可用性、遥测、电量、落库开关）放在 `Thing` 上，
//! 各类型特有的负载放在 `ThingKind` 变体里。

use serde::{Deserialize, Serialize};

use crate::data::Location;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thing {
    pub id: String,
    /// 设备侧原生标识，数据包按它做幂等查找。
    #[serde(default)]
    pub piot_id: Option<String>,
    /// 全局唯一的显示名，同时作为主题中的 thing 段。
    pub name: String,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub org_id: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub created_at: i64,
    /// 最近一次收到数据的 unix 秒。
    #[serde(default)]
    pub last_seen: i64,
    /// 超过该秒数未见视为不可用，0 表示不监控。
    #[serde(default)]
    pub last_seen_interval: i64,
    #[serde(default)]
    pub availability: Availability,
    #[serde(default)]
    pub telemetry: Telemetry,
    #[serde(default)]
    pub persistence: Persistence,
    #[serde(default)]
    pub battery: Battery,
    pub kind: ThingKind,
}

impl Thing {
    /// 以类型默认负载构造一条新记录。
    pub fn new(id: impl Into<String>, name: impl Into<String>, thing_type: ThingType) -> Self {
        Self {
            id: id.into(),
            piot_id: None,
            name: name.into(),
            alias: None,
            description: String::new(),
            enabled: false,
            org_id: None,
            parent_id: None,
            created_at: 0,
            last_seen: 0,
            last_seen_interval: 0,
            availability: Availability::default(),
            telemetry: Telemetry::default(),
            persistence: Persistence::default(),
            battery: Battery::default(),
            kind: ThingKind::empty(thing_type),
        }
    }

    pub fn thing_type(&self) -> ThingType {
        self.kind.thing_type()
    }

    /// 写入时序库时使用的名称：有别名用别名。
    pub fn display_name(&self) -> &str {
        match self.alias.as_deref() {
            Some(alias) if !alias.is_empty() => alias,
            _ => &self.name,
        }
    }

    pub fn as_sensor(&self) -> Option<&SensorData> {
        match &self.kind {
            ThingKind::Sensor(sensor) => Some(sensor),
            _ => None,
        }
    }

    pub fn as_switch(&self) -> Option<&SwitchData> {
        match &self.kind {
            ThingKind::Switch(switch) => Some(switch),
            _ => None,
        }
    }

    pub fn as_device(&self) -> Option<&DeviceData> {
        match &self.kind {
            ThingKind::Device(device) => Some(device),
            _ => None,
        }
    }

    /// 读取某个主题字段当前配置的子主题，未配置返回 `None`。
    pub fn topic(&self, field: TopicField) -> Option<&str> {
        let topic = match field {
            TopicField::Availability => self.availability.topic.as_str(),
            TopicField::Telemetry => self.telemetry.topic.as_str(),
            TopicField::Battery => self.battery.topic.as_str(),
            TopicField::Location => self.as_device()?.location_source.topic.as_str(),
            TopicField::Measurement => self.as_sensor()?.measurement_topic.as_str(),
            TopicField::SwitchState => self.as_switch()?.state_topic.as_str(),
        };
        if topic.is_empty() { None } else { Some(topic) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThingType {
    Device,
    Sensor,
    Switch,
}

impl ThingType {
    pub fn as_str(self) -> &'static str {
        match self {
            ThingType::Device => "device",
            ThingType::Sensor => "sensor",
            ThingType::Switch => "switch",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "device" => Some(ThingType::Device),
            "sensor" => Some(ThingType::Sensor),
            "switch" => Some(ThingType::Switch),
            _ => None,
        }
    }
}

/// 类型特有负载。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum ThingKind {
    Device(DeviceData),
    Sensor(SensorData),
    Switch(SwitchData),
}

impl ThingKind {
    pub fn empty(thing_type: ThingType) -> Self {
        match thing_type {
            ThingType::Device => ThingKind::Device(DeviceData::default()),
            ThingType::Sensor => ThingKind::Sensor(SensorData::default()),
            ThingType::Switch => ThingKind::Switch(SwitchData::default()),
        }
    }

    pub fn thing_type(&self) -> ThingType {
        match self {
            ThingKind::Device(_) => ThingType::Device,
            ThingKind::Sensor(_) => ThingType::Sensor,
            ThingKind::Switch(_) => ThingType::Switch,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Availability {
    pub topic: String,
    pub yes: String,
    pub no: String,
    pub available: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Telemetry {
    pub topic: String,
    pub payload: Option<String>,
}

/// 各落库目标的开关。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Persistence {
    pub timeseries: bool,
    pub relational: bool,
    /// 关系库写入时间向下取整的粒度（秒），0 不取整。
    pub relational_interval: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Battery {
    pub topic: String,
    /// 可选 JSON 路径模板，为空时负载本身即电量。
    pub level_template: String,
    pub level: Option<i32>,
    pub tracking: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceData {
    pub location_source: LocationSource,
    pub location: Option<Location>,
}

/// 位置消息的主题与各字段的 JSON 路径模板。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationSource {
    pub topic: String,
    pub lat_template: String,
    pub lng_template: String,
    pub sat_template: String,
    pub ts_template: String,
    pub tracking: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorData {
    pub measurement_topic: String,
    pub measurement_template: String,
    pub class: String,
    pub value: Option<String>,
    pub unit: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwitchData {
    pub state: bool,
    pub command_topic: String,
    pub command_on: String,
    pub command_off: String,
    pub state_topic: String,
    pub state_on: String,
    pub state_off: String,
}

/// 可按主题匹配的字段。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicField {
    Availability,
    Telemetry,
    Battery,
    Location,
    Measurement,
    SwitchState,
}

/// 批量查询条件，各项为 `None` 时不参与过滤。
#[derive(Debug, Clone, Default)]
pub struct ThingFilter {
    pub org_id: Option<String>,
    pub thing_type: Option<ThingType>,
    pub topic: Option<(TopicField, String)>,
    pub enabled: Option<bool>,
}

impl ThingFilter {
    pub fn org(org_id: impl Into<String>) -> Self {
        Self {
            org_id: Some(org_id.into()),
            ..Self::default()
        }
    }

    pub fn with_type(mut self, thing_type: ThingType) -> Self {
        self.thing_type = Some(thing_type);
        self
    }

    pub fn with_topic(mut self, field: TopicField, topic: impl Into<String>) -> Self {
        self.topic = Some((field, topic.into()));
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    pub fn matches(&self, thing: &Thing) -> bool {
        if let Some(org_id) = &self.org_id {
            if thing.org_id.as_deref() != Some(org_id.as_str()) {
                return false;
            }
        }
        if let Some(thing_type) = self.thing_type {
            if thing.thing_type() != thing_type {
                return false;
            }
        }
        if let Some(enabled) = self.enabled {
            if thing.enabled != enabled {
                return false;
            }
        }
        if let Some((field, topic)) = &self.topic {
            if thing.topic(*field) != Some(topic.as_str()) {
                return false;
            }
        }
        true
    }
}
