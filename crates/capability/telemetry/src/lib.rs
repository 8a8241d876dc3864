//! 追踪初始化、请求 ID 与进程级计数器。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 请求级追踪标识。
#[derive(Debug, Clone)]
pub struct RequestIds {
    pub request_id: String,
    pub trace_id: String,
}

/// 计数器快照。
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
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

/// 进程级计数器。
pub struct TelemetryMetrics {
    packets_accepted: AtomicU64,
    packets_rejected: AtomicU64,
    packets_rate_limited: AtomicU64,
    things_registered: AtomicU64,
    publish_success: AtomicU64,
    publish_failure: AtomicU64,
    messages_routed: AtomicU64,
    messages_dropped: AtomicU64,
    sink_write_success: AtomicU64,
    sink_write_failure: AtomicU64,
    sink_write_latency_ms_total: AtomicU64,
    sink_write_latency_ms_count: AtomicU64,
    auth_accepted: AtomicU64,
    auth_denied: AtomicU64,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self {
            packets_accepted: AtomicU64::new(0),
            packets_rejected: AtomicU64::new(0),
            packets_rate_limited: AtomicU64::new(0),
            things_registered: AtomicU64::new(0),
            publish_success: AtomicU64::new(0),
            publish_failure: AtomicU64::new(0),
            messages_routed: AtomicU64::new(0),
            messages_dropped: AtomicU64::new(0),
            sink_write_success: AtomicU64::new(0),
            sink_write_failure: AtomicU64::new(0),
            sink_write_latency_ms_total: AtomicU64::new(0),
            sink_write_latency_ms_count: AtomicU64::new(0),
            auth_accepted: AtomicU64::new(0),
            auth_denied: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            packets_accepted: self.packets_accepted.load(Ordering::Relaxed),
            packets_rejected: self.packets_rejected.load(Ordering::Relaxed),
            packets_rate_limited: self.packets_rate_limited.load(Ordering::Relaxed),
            things_registered: self.things_registered.load(Ordering::Relaxed),
            publish_success: self.publish_success.load(Ordering::Relaxed),
            publish_failure: self.publish_failure.load(Ordering::Relaxed),
            messages_routed: self.messages_routed.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
            sink_write_success: self.sink_write_success.load(Ordering::Relaxed),
            sink_write_failure: self.sink_write_failure.load(Ordering::Relaxed),
            sink_write_latency_ms_total: self.sink_write_latency_ms_total.load(Ordering::Relaxed),
            sink_write_latency_ms_count: self.sink_write_latency_ms_count.load(Ordering::Relaxed),
            auth_accepted: self.auth_accepted.load(Ordering::Relaxed),
            auth_denied: self.auth_denied.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

static METRICS: OnceLock<TelemetryMetrics> = OnceLock::new();

/// 获取全局计数器实例。
pub fn metrics() -> &'static TelemetryMetrics {
    METRICS.get_or_init(TelemetryMetrics::new)
}

/// 初始化 tracing（默认 info）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 生成新的 request_id 与 trace_id。
pub fn new_request_ids() -> RequestIds {
    RequestIds {
        request_id: uuid::Uuid::new_v4().to_string(),
        trace_id: uuid::Uuid::new_v4().to_string(),
    }
}

/// 记录处理完成的设备数据包。
pub fn record_packet_accepted() {
    metrics().packets_accepted.fetch_add(1, Ordering::Relaxed);
}

/// 记录校验失败的设备数据包。
pub fn record_packet_rejected() {
    metrics().packets_rejected.fetch_add(1, Ordering::Relaxed);
}

/// 记录被防抖拒绝的设备数据包。
pub fn record_packet_rate_limited() {
    metrics()
        .packets_rate_limited
        .fetch_add(1, Ordering::Relaxed);
}

/// 记录自动注册的 Thing。
pub fn record_thing_registered() {
    metrics().things_registered.fetch_add(1, Ordering::Relaxed);
}

pub fn record_publish_success() {
    metrics().publish_success.fetch_add(1, Ordering::Relaxed);
}

pub fn record_publish_failure() {
    metrics().publish_failure.fetch_add(1, Ordering::Relaxed);
}

/// 记录进入路由规则的消息。
pub fn record_message_routed() {
    metrics().messages_routed.fetch_add(1, Ordering::Relaxed);
}

/// 记录主题不合法或组织未知而丢弃的消息。
pub fn record_message_dropped() {
    metrics().messages_dropped.fetch_add(1, Ordering::Relaxed);
}

pub fn record_sink_write_success() {
    metrics().sink_write_success.fetch_add(1, Ordering::Relaxed);
}

pub fn record_sink_write_failure() {
    metrics().sink_write_failure.fetch_add(1, Ordering::Relaxed);
}

/// 记录单次落库耗时（毫秒）。
pub fn record_sink_write_latency_ms(latency_ms: u64) {
    let metrics = metrics();
    metrics
        .sink_write_latency_ms_total
        .fetch_add(latency_ms, Ordering::Relaxed);
    metrics
        .sink_write_latency_ms_count
        .fetch_add(1, Ordering::Relaxed);
}

/// 记录认证/授权结果。
pub fn record_auth_decision(accepted: bool) {
    let counter = if accepted {
        &metrics().auth_accepted
    } else {
        &metrics().auth_denied
    };
    counter.fetch_add(1, Ordering::Relaxed);
}
