//! 设备数据包接入。
//!
//! - POST /adapter
//!
//! 请求体先按 JSON 解析；失败且配置了口令时，按 AES-128 加密体解密后再解析。

use api_contract::DevicePacketDto;
use axum::{body::Bytes, extract::State, response::Response};
use piot_ingest::IngestError;
use tracing::{debug, error, warn};

use crate::AppState;
use crate::utils::cipher::{DecryptError, decrypt_body};
use crate::utils::response::{bad_request, internal_error, ok_empty, parse_json};

pub async fn post_adapter(State(state): State<AppState>, body: Bytes) -> Response {
    let dto = match decode_packet(state.adapter_password.as_deref(), &body) {
        Ok(dto) => dto,
        Err(response) => return response,
    };
    let packet = dto.into_packet();
    match state.ingestor.process(&packet).await {
        Ok(()) => ok_empty(),
        Err(IngestError::InvalidPacket(message)) => bad_request(message),
        Err(err) => {
            warn!(target: "piot.http", device_id = %packet.device_id, error = %err, "adapter_failed");
            internal_error(err.to_string())
        }
    }
}

fn decode_packet(password: Option<&str>, body: &Bytes) -> Result<DevicePacketDto, Response> {
    let plain_err = match serde_json::from_slice(body) {
        Ok(dto) => return Ok(dto),
        Err(err) => err,
    };
    let Some(password) = password else {
        return Err(bad_request(plain_err.to_string()));
    };

    debug!(target: "piot.http", len = body.len(), "adapter_body_decrypting");
    match decrypt_body(password, body) {
        Ok(decrypted) => parse_json(&Bytes::from(decrypted)),
        Err(err @ DecryptError::Config) => {
            error!(target: "piot.http", "adapter_password_invalid");
            Err(internal_error(err.to_string()))
        }
        Err(err) => {
            warn!(target: "piot.http", error = %err, "adapter_decrypt_failed");
            Err(bad_request(err.to_string()))
        }
    }
}
