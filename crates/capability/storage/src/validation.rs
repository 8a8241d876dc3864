//! 验证辅助函数

use crate::error::StorageError;

/// 验证 Thing 名称可作为单个主题段使用。
pub fn ensure_thing_name(name: &str) -> Result<(), StorageError> {
    if name.is_empty() {
        return Err(StorageError::new("thing name required"));
    }
    if name.contains(['/', '+', '#']) {
        return Err(StorageError::new(format!(
            "thing name must not contain topic separators or wildcards: {name}"
        )));
    }
    Ok(())
}

/// 对旧值做单调性判断：无旧值或旧时间戳不晚于新值时才允许写入。
pub fn location_is_newer(stored_ts: Option<i64>, incoming_ts: i64) -> bool {
    match stored_ts {
        Some(stored) => stored <= incoming_ts,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_topic_separators() {
        assert!(ensure_thing_name("d1").is_ok());
        assert!(ensure_thing_name("").is_err());
        assert!(ensure_thing_name("a/b").is_err());
        assert!(ensure_thing_name("a+").is_err());
        assert!(ensure_thing_name("#").is_err());
    }

    #[test]
    fn equal_timestamp_is_accepted() {
        assert!(location_is_newer(None, 0));
        assert!(location_is_newer(Some(100), 100));
        assert!(location_is_newer(Some(100), 150));
        assert!(!location_is_newer(Some(100), 50));
    }
}
