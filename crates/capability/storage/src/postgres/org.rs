//! Postgres 组织存储实现

use crate::error::StorageError;
use crate::traits::OrgStore;
use domain::Org;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

pub struct PgOrgStore {
    pub pool: PgPool,
}

impl PgOrgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub(crate) fn org_from_row(row: &PgRow) -> Result<Org, StorageError> {
    Ok(Org {
        id: row.try_get("org_id")?,
        name: row.try_get("name")?,
        timeseries_db: row.try_get("timeseries_db")?,
        relational_db: row.try_get("relational_db")?,
        mqtt_username: row.try_get("mqtt_username")?,
        mqtt_password: row.try_get("mqtt_password")?,
    })
}

#[async_trait::async_trait]
impl OrgStore for PgOrgStore {
    async fn get(&self, org_id: &str) -> Result<Option<Org>, StorageError> {
        let row = sqlx::query(
            "select org_id, name, timeseries_db, relational_db, mqtt_username, mqtt_password \
             from orgs where org_id = $1",
        )
        .bind(org_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(org_from_row).transpose()
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Org>, StorageError> {
        let row = sqlx::query(
            "select org_id, name, timeseries_db, relational_db, mqtt_username, mqtt_password \
             from orgs where name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(org_from_row).transpose()
    }
}
