//! 四类路由规则的取值部分，只依赖匹配到的 Thing 字段与消息负载。

use crate::RouterError;
use crate::template::{extract, extract_or_payload};
use domain::{Battery, Location, LocationSource, SensorData, SwitchData};

/// 电量：有模板且路径存在时取模板值，否则把整个负载当作整数。
pub fn battery_level(battery: &Battery, payload: &str) -> Result<i32, RouterError> {
    let raw = if battery.level_template.is_empty() {
        payload.to_string()
    } else {
        extract(payload, &battery.level_template).unwrap_or_else(|| payload.to_string())
    };
    raw.trim().parse().map_err(|_| RouterError::InvalidValue {
        field: "battery level",
        value: raw,
    })
}

/// 位置：经纬度模板必须配置且能解析；卫星数与时间戳可选，时间戳缺省或为 0 时取 `now`。
pub fn device_location(
    source: &LocationSource,
    payload: &str,
    now: i64,
) -> Result<Location, RouterError> {
    if source.lat_template.is_empty() || source.lng_template.is_empty() {
        return Err(RouterError::MissingTemplate("location lat/lng"));
    }
    let lat = required_float(payload, &source.lat_template, "lat")?;
    let lng = required_float(payload, &source.lng_template, "lng")?;
    let sat = optional_int(payload, &source.sat_template).unwrap_or(0) as i32;
    let ts = match optional_int(payload, &source.ts_template) {
        Some(ts) if ts != 0 => ts,
        _ => now,
    };
    Ok(Location { lat, lng, sat, ts })
}

/// 传感器值：无模板时取整个负载，模板路径缺失时为空串。
pub fn sensor_value(sensor: &SensorData, payload: &str) -> String {
    extract_or_payload(payload, &sensor.measurement_template).unwrap_or_default()
}

/// 开关状态：负载需与配置的开/关值完全相等。
pub fn switch_state(switch: &SwitchData, payload: &str) -> Result<bool, RouterError> {
    if payload == switch.state_on {
        Ok(true)
    } else if payload == switch.state_off {
        Ok(false)
    } else {
        Err(RouterError::UnknownSwitchState(payload.to_string()))
    }
}

/// 落库用的开关值。
pub fn switch_value(state: bool) -> &'static str {
    if state { "1" } else { "0" }
}

fn required_float(payload: &str, template: &str, field: &'static str) -> Result<f64, RouterError> {
    let raw = extract(payload, template).ok_or(RouterError::InvalidValue {
        field,
        value: String::new(),
    })?;
    raw.trim()
        .parse()
        .map_err(|_| RouterError::InvalidValue { field, value: raw })
}

fn optional_int(payload: &str, template: &str) -> Option<i64> {
    if template.is_empty() {
        return None;
    }
    extract(payload, template)?.trim().parse().ok()
}
