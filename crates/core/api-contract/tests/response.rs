use api_contract::{ApiResponse, HealthDto, MetricsSnapshotDto};

fn snapshot() -> MetricsSnapshotDto {
    MetricsSnapshotDto {
        packets_accepted: 3,
        packets_rejected: 1,
        packets_rate_limited: 2,
        things_registered: 4,
        publish_success: 9,
        publish_failure: 0,
        messages_routed: 5,
        messages_dropped: 1,
        sink_write_success: 7,
        sink_write_failure: 1,
        sink_write_latency_ms_total: 40,
        sink_write_latency_ms_count: 8,
        auth_accepted: 6,
        auth_denied: 2,
    }
}

#[test]
fn metrics_envelope_uses_camel_case() {
    let json = serde_json::to_value(ApiResponse::success(snapshot())).expect("json");
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["packetsRateLimited"], 2);
    assert_eq!(json["data"]["sinkWriteLatencyMsCount"], 8);
    assert!(json["error"].is_null());
}

#[test]
fn error_envelope_carries_code() {
    let json = serde_json::to_value(ApiResponse::<()>::error("INTERNAL.ERROR", "store down"))
        .expect("json");
    assert_eq!(json["success"], false);
    assert!(json["data"].is_null());
    assert_eq!(json["error"]["code"], "INTERNAL.ERROR");
}

#[test]
fn health_body() {
    let json = serde_json::to_string(&HealthDto { status: "ok" }).expect("json");
    assert_eq!(json, r#"{"status":"ok"}"#);
}
