//! 组织内存存储实现

use crate::error::StorageError;
use crate::traits::OrgStore;
use domain::Org;
use std::collections::HashMap;
use std::sync::RwLock;

pub struct InMemoryOrgStore {
    orgs: RwLock<HashMap<String, Org>>,
}

impl InMemoryOrgStore {
    pub fn new() -> Self {
        Self {
            orgs: RwLock::new(HashMap::new()),
        }
    }

    /// 写入或覆盖组织（测试与本地运行时预置数据）。
    pub fn insert(&self, org: Org) -> Result<(), StorageError> {
        let mut orgs = self
            .orgs
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        orgs.insert(org.id.clone(), org);
        Ok(())
    }
}

impl Default for InMemoryOrgStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl OrgStore for InMemoryOrgStore {
    async fn get(&self, org_id: &str) -> Result<Option<Org>, StorageError> {
        let orgs = self
            .orgs
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(orgs.get(org_id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Org>, StorageError> {
        let orgs = self
            .orgs
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(orgs.values().find(|org| org.name == name).cloned())
    }
}
