//! 稳定的线上 DTO：设备数据包、mosquitto 认证回调、运维接口响应。

use domain::{DevicePacket, SensorReading};
use serde::{Deserialize, Serialize};

/// 标准 JSON 响应封装（运维接口使用）。
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

/// 失败响应的错误体。
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                code: code.into(),
                message: message.into(),
            }),
        }
    }
}

/// `/adapter` 请求体。
///
/// 设备固件有两套字段名：长名（`device`、`readings`、`address`）与
/// 短名（`d`、`r`、`a`），两者同时出现时非空的短名优先。
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DevicePacketDto {
    pub device: String,
    pub d: String,
    pub readings: Vec<ReadingDto>,
    pub r: Vec<ReadingDto>,
    pub ip: Option<String>,
    #[serde(rename = "wifi-ssid")]
    pub wifi_ssid: Option<String>,
    #[serde(rename = "wifi-strength")]
    pub wifi_strength: Option<f32>,
}

/// 单个读数，`t`/`h`/`p` 分别为温度、湿度、气压。
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ReadingDto {
    pub address: String,
    pub a: String,
    pub t: Option<f32>,
    pub h: Option<f32>,
    pub p: Option<f32>,
}

impl DevicePacketDto {
    /// 归一为领域数据包。
    pub fn into_packet(self) -> DevicePacket {
        let device_id = prefer_short(self.device, self.d);
        let readings = if self.r.is_empty() {
            self.readings
        } else {
            self.r
        };
        DevicePacket {
            device_id,
            ip: self.ip.filter(|ip| !ip.is_empty()),
            wifi_ssid: self.wifi_ssid.filter(|ssid| !ssid.is_empty()),
            wifi_strength: self.wifi_strength,
            readings: readings.into_iter().map(ReadingDto::into_reading).collect(),
        }
    }
}

impl ReadingDto {
    fn into_reading(self) -> SensorReading {
        SensorReading {
            address: prefer_short(self.address, self.a),
            temperature: self.t,
            humidity: self.h,
            pressure: self.p,
        }
    }
}

fn prefer_short(long: String, short: String) -> String {
    if short.is_empty() { long } else { short }
}

/// `/mosquitto-auth-user` 与 `/mosquitto-auth-superuser` 请求体。
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MosquittoAuthUserRequest {
    pub username: String,
    pub password: String,
}

/// `/mosquitto-auth-acl` 请求体，`acc` 为 mosquitto 访问位掩码。
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MosquittoAclRequest {
    pub username: String,
    pub clientid: String,
    pub topic: String,
    pub acc: i32,
}

/// 运行指标快照。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshotDto {
    pub packets_accepted: u64,
    pub packets_rejected: u64,
    pub packets_rate_limited: u64,
    pub things_registered: u64,
    pub publish_success: u64,
    pub publish_failure: u64,
    pub messages_routed: u64,
    pub messages_dropped: u64,
    pub sink_write_success: u64,
    pub sink_write_failure: u64,
    pub sink_write_latency_ms_total: u64,
    pub sink_write_latency_ms_count: u64,
    pub auth_accepted: u64,
    pub auth_denied: u64,
}

/// 健康检查响应。
#[derive(Debug, Serialize)]
pub struct HealthDto {
    pub status: &'static str,
}
