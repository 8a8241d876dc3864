//! 内置服务账号：用户名精确匹配，口令来自配置，授权只看主题首段。

use crate::{Access, AuthError, AuthProvider, topic_root};
use async_trait::async_trait;
use subtle::ConstantTimeEq;

#[derive(Debug, Clone)]
pub struct StaticAccount {
    pub username: String,
    /// 配置口令，为空时该账号永远认证失败。
    pub password: String,
    /// 允许访问的主题首段。
    pub topic_root: String,
}

impl StaticAccount {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        topic_root: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            topic_root: topic_root.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StaticAccounts {
    accounts: Vec<StaticAccount>,
}

impl StaticAccounts {
    pub fn new(accounts: Vec<StaticAccount>) -> Self {
        Self { accounts }
    }

    /// `test` 限 `test/...`，`mon` 限 `$SYS/...`，`piot`（服务端自身）限 `org/...`。
    pub fn service_accounts(
        test_password: impl Into<String>,
        mon_password: impl Into<String>,
        piot_password: impl Into<String>,
    ) -> Self {
        Self::new(vec![
            StaticAccount::new("test", test_password, "test"),
            StaticAccount::new("mon", mon_password, "$SYS"),
            StaticAccount::new("piot", piot_password, domain::ROOT_TOPIC),
        ])
    }

    fn account(&self, username: &str) -> Option<&StaticAccount> {
        self.accounts
            .iter()
            .find(|account| account.username == username)
    }
}

#[async_trait]
impl AuthProvider for StaticAccounts {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn authenticate(&self, username: &str, password: &str) -> Result<Option<bool>, AuthError> {
        let Some(account) = self.account(username) else {
            return Ok(None);
        };
        if account.password.is_empty() {
            return Ok(Some(false));
        }
        let matches: bool = account
            .password
            .as_bytes()
            .ct_eq(password.as_bytes())
            .into();
        Ok(Some(matches))
    }

    async fn authorize(
        &self,
        username: &str,
        topic: &str,
        _access: Access,
    ) -> Result<Option<bool>, AuthError> {
        Ok(self
            .account(username)
            .map(|account| topic_root(topic) == account.topic_root))
    }
}
