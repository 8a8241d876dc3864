//! mosquitto 认证插件回调。
//!
//! - POST /mosquitto-auth-user
//! - POST /mosquitto-auth-superuser
//! - POST /mosquitto-auth-acl
//!
//! 200 表示放行，其余状态码 broker 一律视为拒绝。

use api_contract::{MosquittoAclRequest, MosquittoAuthUserRequest};
use axum::{body::Bytes, extract::State, response::Response};
use piot_auth::Access;
use tracing::{debug, warn};

use crate::AppState;
use crate::utils::response::{internal_error, ok_empty, parse_json, unauthorized};

pub async fn auth_user(State(state): State<AppState>, body: Bytes) -> Response {
    let req: MosquittoAuthUserRequest = match parse_json(&body) {
        Ok(req) => req,
        Err(response) => return response,
    };
    match state.gate.authenticate(&req.username, &req.password).await {
        Ok(true) => ok_empty(),
        Ok(false) => unauthorized(format!(
            "user {} does not exist or provided credentials are wrong",
            req.username
        )),
        Err(err) => {
            warn!(target: "piot.http", username = %req.username, error = %err, "auth_user_failed");
            internal_error(err.to_string())
        }
    }
}

/// 不支持超级用户。
pub async fn auth_superuser(body: Bytes) -> Response {
    if let Ok(req) = parse_json::<MosquittoAuthUserRequest>(&body) {
        debug!(target: "piot.http", username = %req.username, "superuser_denied");
    }
    unauthorized("superuser role is not supported")
}

pub async fn auth_acl(State(state): State<AppState>, body: Bytes) -> Response {
    let req: MosquittoAclRequest = match parse_json(&body) {
        Ok(req) => req,
        Err(response) => return response,
    };
    debug!(
        target: "piot.http",
        username = %req.username,
        client_id = %req.clientid,
        topic = %req.topic,
        acc = req.acc,
        "acl_requested"
    );
    match state
        .gate
        .authorize(&req.username, &req.topic, Access(req.acc))
        .await
    {
        Ok(true) => ok_empty(),
        Ok(false) => unauthorized(format!(
            "authorization rejected for user {} and topic {}",
            req.username, req.topic
        )),
        Err(err) => {
            warn!(target: "piot.http", username = %req.username, error = %err, "auth_acl_failed");
            internal_error(err.to_string())
        }
    }
}
