//! 负载模板：用点分路径从 JSON 负载里取值，如 `data.sensors.0.t`。

use serde_json::Value;

/// 按路径取值；负载不是 JSON、路径不存在或值为 null 时返回 `None`。
///
/// 字符串去掉引号返回，数字与布尔返回 JSON 文本，对象与数组返回原始 JSON。
pub fn extract(payload: &str, template: &str) -> Option<String> {
    let root: Value = serde_json::from_str(payload).ok()?;
    let mut current = &root;
    for segment in template.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    match current {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

/// 模板为空时取整个负载，否则取模板路径；路径缺失返回 `None`。
pub fn extract_or_payload(payload: &str, template: &str) -> Option<String> {
    if template.is_empty() {
        return Some(payload.to_string());
    }
    extract(payload, template)
}
