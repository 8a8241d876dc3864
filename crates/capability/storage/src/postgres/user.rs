//! Postgres 用户存储实现

use crate::error::StorageError;
use crate::models::UserRecord;
use crate::postgres::org::org_from_row;
use crate::traits::UserStore;
use domain::Org;
use sqlx::{PgPool, Row};

pub struct PgUserStore {
    pub pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl UserStore for PgUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StorageError> {
        let row = sqlx::query(
            "select user_id, username, password_hash from users where username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(UserRecord {
            user_id: row.try_get("user_id")?,
            username: row.try_get("username")?,
            password_hash: row.try_get("password_hash")?,
        }))
    }

    async fn list_user_orgs(&self, user_id: &str) -> Result<Vec<Org>, StorageError> {
        let rows = sqlx::query(
            "select o.org_id, o.name, o.timeseries_db, o.relational_db, \
             o.mqtt_username, o.mqtt_password \
             from orgs o join org_users ou on ou.org_id = o.org_id \
             where ou.user_id = $1 order by o.name",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        let mut orgs = Vec::with_capacity(rows.len());
        for row in rows {
            orgs.push(org_from_row(&row)?);
        }
        Ok(orgs)
    }
}
