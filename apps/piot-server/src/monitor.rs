//! 最近可见时间巡检：超过各自 `last_seen_interval` 未上报的启用 Thing 按组织汇总记警告日志。
//!
//! 未分配组织的 Thing 不参与巡检。

use domain::{Thing, ThingFilter};
use piot_ingest::now_epoch_secs;
use piot_storage::ThingStore;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// 超时未上报的 Thing。
pub fn overdue(things: &[Thing], now: i64) -> Vec<&Thing> {
    things
        .iter()
        .filter(|thing| thing.enabled && thing.last_seen_interval > 0)
        .filter(|thing| now - thing.last_seen > thing.last_seen_interval)
        .collect()
}

/// 按组织归集超时 Thing。
pub fn overdue_by_org(things: &[Thing], now: i64) -> BTreeMap<&str, Vec<&Thing>> {
    let mut groups: BTreeMap<&str, Vec<&Thing>> = BTreeMap::new();
    for thing in overdue(things, now) {
        if let Some(org_id) = thing.org_id.as_deref() {
            groups.entry(org_id).or_default().push(thing);
        }
    }
    groups
}

/// 周期为 0 时不启动。
pub fn spawn_monitor(
    things: Arc<dyn ThingStore>,
    period: Duration,
) -> Option<tokio::task::JoinHandle<()>> {
    if period.is_zero() {
        info!(target: "piot.monitor", "monitor_disabled");
        return None;
    }
    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            check(things.as_ref()).await;
        }
    }))
}

async fn check(store: &dyn ThingStore) {
    let things = match store.list(&ThingFilter::default().with_enabled(true)).await {
        Ok(things) => things,
        Err(err) => {
            warn!(target: "piot.monitor", error = %err, "monitor_list_failed");
            return;
        }
    };
    let now = now_epoch_secs();
    for (org_id, late) in overdue_by_org(&things, now) {
        for thing in &late {
            warn!(
                target: "piot.monitor",
                org_id = %org_id,
                thing_id = %thing.id,
                thing = %thing.name,
                last_seen = thing.last_seen,
                interval = thing.last_seen_interval,
                "thing_unavailable"
            );
        }
        let names: Vec<&str> = late.iter().map(|thing| thing.name.as_str()).collect();
        warn!(
            target: "piot.monitor",
            org_id = %org_id,
            count = late.len(),
            things = %names.join(","),
            "org_things_unavailable"
        );
    }
}
