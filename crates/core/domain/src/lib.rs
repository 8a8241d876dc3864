pub mod data;
pub mod thing;

pub use data::{DevicePacket, Location, RawEvent, SensorClass, SensorReading};
pub use thing::{
    Availability, Battery, DeviceData, LocationSource, Persistence, SensorData, SwitchData,
    Telemetry, Thing, ThingFilter, ThingKind, ThingType, TopicField,
};

use serde::{Deserialize, Serialize};

/// 所有租户流量所在的根主题段。
pub const ROOT_TOPIC: &str = "org";

/// 组织：租户边界，持有主题命名空间与落库目标。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Org {
    pub id: String,
    pub name: String,
    /// 时序库名称（InfluxDB database），为空表示不写时序。
    pub timeseries_db: String,
    /// 关系库名称（写入 `org` 列），为空表示不写关系库。
    pub relational_db: String,
    pub mqtt_username: String,
    pub mqtt_password: String,
}

impl Org {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Self::default()
        }
    }
}
