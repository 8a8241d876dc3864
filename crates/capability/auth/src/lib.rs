//! 访问控制：mosquitto 认证插件回调的认证与授权决策。
//!
//! 决策由有序的 `AuthProvider` 列表给出，第一个认领该用户名的提供者说了算；
//! 无人认领时拒绝。所有决策都是只读的。

mod password;
mod registry;
mod static_accounts;

use async_trait::async_trait;
use domain::ROOT_TOPIC;
use piot_storage::StorageError;
use piot_telemetry::record_auth_decision;
use std::fmt;
use std::sync::Arc;
use tracing::info;

pub use password::{hash_password, verify_password};
pub use registry::RegistryAccounts;
pub use static_accounts::{StaticAccount, StaticAccounts};

/// 访问控制错误。
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("store error: {0}")]
    Store(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StorageError> for AuthError {
    fn from(err: StorageError) -> Self {
        AuthError::Store(err.to_string())
    }
}

/// mosquitto 的访问类型位掩码：1 读，2 写，4 订阅。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Access(pub i32);

impl Access {
    pub const READ: i32 = 1;
    pub const WRITE: i32 = 2;
    pub const SUBSCRIBE: i32 = 4;

    pub fn contains(self, bit: i32) -> bool {
        self.0 & bit != 0
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = [
            (Self::READ, "read"),
            (Self::WRITE, "write"),
            (Self::SUBSCRIBE, "subscribe"),
        ]
        .into_iter()
        .filter(|(bit, _)| self.contains(*bit))
        .map(|(_, name)| name)
        .collect();
        if names.is_empty() {
            write!(f, "none({})", self.0)
        } else {
            write!(f, "{}", names.join("|"))
        }
    }
}

/// 认证/授权策略。返回 `None` 表示不认领该用户名，交给下一个提供者。
#[async_trait]
pub trait AuthProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn authenticate(&self, username: &str, password: &str) -> Result<Option<bool>, AuthError>;

    async fn authorize(
        &self,
        username: &str,
        topic: &str,
        access: Access,
    ) -> Result<Option<bool>, AuthError>;
}

pub struct AccessGate {
    providers: Vec<Arc<dyn AuthProvider>>,
}

impl AccessGate {
    pub fn new(providers: Vec<Arc<dyn AuthProvider>>) -> Self {
        Self { providers }
    }

    pub async fn authenticate(&self, username: &str, password: &str) -> Result<bool, AuthError> {
        for provider in &self.providers {
            if let Some(accepted) = provider.authenticate(username, password).await? {
                record_auth_decision(accepted);
                info!(
                    target: "piot.auth",
                    username = %username,
                    provider = provider.name(),
                    accepted,
                    "authenticate_decided"
                );
                return Ok(accepted);
            }
        }
        record_auth_decision(false);
        info!(target: "piot.auth", username = %username, "authenticate_unclaimed");
        Ok(false)
    }

    pub async fn authorize(
        &self,
        username: &str,
        topic: &str,
        access: Access,
    ) -> Result<bool, AuthError> {
        for provider in &self.providers {
            if let Some(accepted) = provider.authorize(username, topic, access).await? {
                record_auth_decision(accepted);
                info!(
                    target: "piot.auth",
                    username = %username,
                    topic = %topic,
                    access = %access,
                    provider = provider.name(),
                    accepted,
                    "authorize_decided"
                );
                return Ok(accepted);
            }
        }
        record_auth_decision(false);
        info!(target: "piot.auth", username = %username, topic = %topic, "authorize_unclaimed");
        Ok(false)
    }
}

/// 主题首段；没有 `/` 时为整个主题。
pub fn topic_root(topic: &str) -> &str {
    topic.split('/').next().unwrap_or(topic)
}

/// `org/<orgName>/...` 中的组织名。
pub fn topic_org(topic: &str) -> Option<&str> {
    let mut segments = topic.split('/');
    if segments.next()? != ROOT_TOPIC {
        return None;
    }
    segments.next().filter(|org| !org.is_empty())
}
