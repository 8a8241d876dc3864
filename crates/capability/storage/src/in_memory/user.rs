//! 用户内存存储实现
//!
//! 同时保存用户所属组织，组织记录本身从 `InMemoryOrgStore` 之外单独写入。

use crate::error::StorageError;
use crate::models::UserRecord;
use crate::traits::UserStore;
use domain::Org;
use std::collections::HashMap;
use std::sync::RwLock;

struct UserEntry {
    record: UserRecord,
    orgs: Vec<Org>,
}

pub struct InMemoryUserStore {
    users: RwLock<HashMap<String, UserEntry>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
        }
    }

    /// 写入用户及其所属组织。
    pub fn insert(&self, record: UserRecord, orgs: Vec<Org>) -> Result<(), StorageError> {
        let mut users = self
            .users
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        users.insert(record.username.clone(), UserEntry { record, orgs });
        Ok(())
    }
}

impl Default for InMemoryUserStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StorageError> {
        let users = self
            .users
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(users.get(username).map(|entry| entry.record.clone()))
    }

    async fn list_user_orgs(&self, user_id: &str) -> Result<Vec<Org>, StorageError> {
        let users = self
            .users
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(users
            .values()
            .find(|entry| entry.record.user_id == user_id)
            .map(|entry| entry.orgs.clone())
            .unwrap_or_default())
    }
}
