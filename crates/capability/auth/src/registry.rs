//! 注册表用户：argon2 口令校验，按组织成员关系授权。

use crate::password::verify_password;
use crate::{Access, AuthError, AuthProvider, topic_org};
use async_trait::async_trait;
use piot_storage::UserStore;
use std::sync::Arc;
use tracing::debug;

/// 兜底提供者：对任何用户名都给出结论。
pub struct RegistryAccounts {
    users: Arc<dyn UserStore>,
}

impl RegistryAccounts {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }
}

#[async_trait]
impl AuthProvider for RegistryAccounts {
    fn name(&self) -> &'static str {
        "registry"
    }

    async fn authenticate(&self, username: &str, password: &str) -> Result<Option<bool>, AuthError> {
        let Some(user) = self.users.find_by_username(username).await? else {
            debug!(target: "piot.auth", username = %username, "user_not_found");
            return Ok(Some(false));
        };
        verify_password(&user.password_hash, password).map(Some)
    }

    async fn authorize(
        &self,
        username: &str,
        topic: &str,
        _access: Access,
    ) -> Result<Option<bool>, AuthError> {
        let Some(user) = self.users.find_by_username(username).await? else {
            debug!(target: "piot.auth", username = %username, "user_not_found");
            return Ok(Some(false));
        };
        let Some(org_name) = topic_org(topic) else {
            return Ok(Some(false));
        };
        let orgs = self.users.list_user_orgs(&user.user_id).await?;
        Ok(Some(orgs.iter().any(|org| org.name == org_name)))
    }
}
