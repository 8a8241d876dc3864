//! 运维接口。
//!
//! - GET /health
//! - GET /metrics

use api_contract::{ApiResponse, HealthDto, MetricsSnapshotDto};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use piot_telemetry::metrics;

pub async fn health() -> Response {
    (StatusCode::OK, Json(HealthDto { status: "ok" })).into_response()
}

pub async fn get_metrics() -> Response {
    let snapshot = metrics().snapshot();
    (
        StatusCode::OK,
        Json(ApiResponse::success(MetricsSnapshotDto {
            packets_accepted: snapshot.packets_accepted,
            packets_rejected: snapshot.packets_rejected,
            packets_rate_limited: snapshot.packets_rate_limited,
            things_registered: snapshot.things_registered,
            publish_success: snapshot.publish_success,
            publish_failure: snapshot.publish_failure,
            messages_routed: snapshot.messages_routed,
            messages_dropped: snapshot.messages_dropped,
            sink_write_success: snapshot.sink_write_success,
            sink_write_failure: snapshot.sink_write_failure,
            sink_write_latency_ms_total: snapshot.sink_write_latency_ms_total,
            sink_write_latency_ms_count: snapshot.sink_write_latency_ms_count,
            auth_accepted: snapshot.auth_accepted,
            auth_denied: snapshot.auth_denied,
        })),
    )
        .into_response()
}
