use serde::{Deserialize, Serialize};

/// 订阅源收到的原始消息。
#[derive(Debug, Clone)]
pub struct RawEvent {
    pub topic: String,
    pub payload: Vec<u8>,
    pub received_at_ms: i64,
}

impl RawEvent {
    /// 负载按 UTF-8 解释，非法字节做替换。
    pub fn payload_str(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

/// 设备自报数据包（长/短字段别名已归一）。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DevicePacket {
    pub device_id: String,
    pub ip: Option<String>,
    pub wifi_ssid: Option<String>,
    pub wifi_strength: Option<f32>,
    pub readings: Vec<SensorReading>,
}

/// 单个传感器地址上的一次读数，每类测量值独立可选。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensorReading {
    pub address: String,
    pub temperature: Option<f32>,
    pub humidity: Option<f32>,
    pub pressure: Option<f32>,
}

impl SensorReading {
    /// 按固定顺序列出本读数中出现的测量值。
    pub fn measurements(&self) -> Vec<(SensorClass, f32)> {
        [
            (SensorClass::Temperature, self.temperature),
            (SensorClass::Humidity, self.humidity),
            (SensorClass::Pressure, self.pressure),
        ]
        .into_iter()
        .filter_map(|(class, value)| value.map(|value| (class, value)))
        .collect()
    }
}

/// 设备数据包可携带的测量类别。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorClass {
    Temperature,
    Humidity,
    Pressure,
}

impl SensorClass {
    pub fn as_str(self) -> &'static str {
        match self {
            SensorClass::Temperature => "temperature",
            SensorClass::Humidity => "humidity",
            SensorClass::Pressure => "pressure",
        }
    }

    /// 传感器地址前缀：同一物理地址上的不同类别落到不同 Thing。
    pub fn address_prefix(self) -> &'static str {
        match self {
            SensorClass::Temperature => "T",
            SensorClass::Humidity => "H",
            SensorClass::Pressure => "P",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            SensorClass::Temperature => "C",
            SensorClass::Humidity => "%",
            SensorClass::Pressure => "mPa",
        }
    }

    pub fn sensor_address(self, raw_address: &str) -> String {
        format!("{}{}", self.address_prefix(), raw_address)
    }
}

/// 位置读数，`ts` 为 unix 秒。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
    pub sat: i32,
    pub ts: i64,
}
