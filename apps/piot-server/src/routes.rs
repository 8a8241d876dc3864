//! 路由定义
//!
//! - 运维：/health, /metrics
//! - 设备接入：/adapter
//! - mosquitto 回调：/mosquitto-auth-user, /mosquitto-auth-superuser, /mosquitto-auth-acl
//!
//! 只注册 POST 的路径对其他方法返回 405 与纯文本错误。

use crate::AppState;
use crate::handlers::*;
use crate::middleware::request_context;
use axum::{
    Router,
    handler::Handler,
    http::StatusCode,
    middleware,
    routing::{MethodRouter, get, post},
};
use tower_http::trace::TraceLayer;

fn post_only<H, T>(handler: H) -> MethodRouter<AppState>
where
    H: Handler<T, AppState>,
    T: 'static,
{
    post(handler).fallback(|| async {
        (StatusCode::METHOD_NOT_ALLOWED, "only POST method is allowed")
    })
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(get_metrics))
        .route("/adapter", post_only(post_adapter))
        .route("/mosquitto-auth-user", post_only(auth_user))
        .route("/mosquitto-auth-superuser", post_only(auth_superuser))
        .route("/mosquitto-auth-acl", post_only(auth_acl))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(request_context))
}
