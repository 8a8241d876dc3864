//! Postgres Thing 存储实现

use crate::error::StorageError;
use crate::traits::ThingStore;
use crate::validation::ensure_thing_name;
use domain::{Location, Thing, ThingFilter, ThingType, TopicField};
use serde_json::{Value, json};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::time::{SystemTime, UNIX_EPOCH};

const UNIQUE_VIOLATION: &str = "23505";

pub struct PgThingStore {
    pub pool: PgPool,
}

impl PgThingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = crate::connection::connect_pool(database_url).await?;
        Ok(Self { pool })
    }

    async fn fetch_by(&self, column: &str, value: &str) -> Result<Option<Thing>, StorageError> {
        let sql = format!("select document::text as document from things where {column} = $1");
        let row = sqlx::query(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(decode_row).transpose()
    }

    /// 在一条语句内按 JSON 路径（`{a,b}` 形式）更新若干字段，`thing_type` 非空时同时校验类型。
    async fn set_fields(
        &self,
        id: &str,
        thing_type: Option<ThingType>,
        fields: &[(&str, Value)],
    ) -> Result<(), StorageError> {
        let mut expr = String::from("document");
        for index in 0..fields.len() {
            let path_param = 3 + index * 2;
            expr = format!(
                "jsonb_set({expr}, ${path_param}::text[], ${}::jsonb, true)",
                path_param + 1
            );
        }
        let sql = format!(
            "update things set document = {expr} \
             where id = $1 and ($2::text is null or thing_type = $2)"
        );
        let mut query = sqlx::query(&sql)
            .bind(id)
            .bind(thing_type.map(ThingType::as_str));
        for (path, value) in fields {
            query = query.bind(*path).bind(value.to_string());
        }
        let result = query.execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(self.explain_miss(id, thing_type).await);
        }
        Ok(())
    }

    /// 更新未命中时区分“记录不存在”与“类型不符”。
    async fn explain_miss(&self, id: &str, expected: Option<ThingType>) -> StorageError {
        match self.get(id).await {
            Ok(Some(thing)) => match expected {
                Some(expected) => StorageError::new(format!(
                    "thing {id} is a {}, not a {}",
                    thing.thing_type().as_str(),
                    expected.as_str()
                )),
                None => StorageError::new(format!("thing {id} was not updated")),
            },
            Ok(None) => StorageError::not_found(id),
            Err(err) => err,
        }
    }
}

/// 主题字段在 jsonb 文档中的路径。
fn topic_path(field: TopicField) -> &'static str {
    match field {
        TopicField::Availability => "{availability,topic}",
        TopicField::Telemetry => "{telemetry,topic}",
        TopicField::Battery => "{battery,topic}",
        TopicField::Location => "{kind,data,location_source,topic}",
        TopicField::Measurement => "{kind,data,measurement_topic}",
        TopicField::SwitchState => "{kind,data,state_topic}",
    }
}

fn decode_row(row: &PgRow) -> Result<Thing, StorageError> {
    let document: String = row.try_get("document")?;
    Ok(serde_json::from_str(&document)?)
}

fn map_write_error(err: sqlx::Error, name: &str) -> StorageError {
    let unique = err
        .as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == UNIQUE_VIOLATION);
    if unique {
        StorageError::conflict(format!("thing already exists: {name}"))
    } else {
        StorageError::from(err)
    }
}

fn now_epoch_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_secs() as i64)
        .unwrap_or(0)
}

#[async_trait::async_trait]
impl ThingStore for PgThingStore {
    async fn get(&self, id: &str) -> Result<Option<Thing>, StorageError> {
        self.fetch_by("id", id).await
    }

    async fn find(&self, name: &str) -> Result<Option<Thing>, StorageError> {
        self.fetch_by("name", name).await
    }

    async fn find_by_piot_id(&self, piot_id: &str) -> Result<Option<Thing>, StorageError> {
        self.fetch_by("piot_id", piot_id).await
    }

    async fn register(
        &self,
        name: &str,
        thing_type: ThingType,
        piot_id: Option<&str>,
    ) -> Result<Thing, StorageError> {
        ensure_thing_name(name)?;
        if self.find(name).await?.is_some() {
            return Err(StorageError::conflict(format!(
                "thing already exists: {name}"
            )));
        }
        let mut thing = Thing::new(uuid::Uuid::new_v4().to_string(), name, thing_type);
        thing.piot_id = piot_id.map(str::to_string);
        thing.created_at = now_epoch_secs();
        let document = serde_json::to_string(&thing)?;

        let result = sqlx::query(
            "insert into things (id, piot_id, name, thing_type, org_id, document) \
             values ($1, $2, $3, $4, $5, $6::jsonb) on conflict (name) do nothing",
        )
        .bind(&thing.id)
        .bind(&thing.piot_id)
        .bind(&thing.name)
        .bind(thing_type.as_str())
        .bind(&thing.org_id)
        .bind(document)
        .execute(&self.pool)
        .await
        .map_err(|err| map_write_error(err, name))?;
        if result.rows_affected() == 0 {
            return Err(StorageError::conflict(format!(
                "thing already exists: {name}"
            )));
        }
        Ok(thing)
    }

    async fn save(&self, thing: &Thing) -> Result<(), StorageError> {
        ensure_thing_name(&thing.name)?;
        let document = serde_json::to_string(thing)?;
        sqlx::query(
            "insert into things (id, piot_id, name, thing_type, org_id, document) \
             values ($1, $2, $3, $4, $5, $6::jsonb) \
             on conflict (id) do update set piot_id = excluded.piot_id, name = excluded.name, \
             thing_type = excluded.thing_type, org_id = excluded.org_id, \
             document = excluded.document",
        )
        .bind(&thing.id)
        .bind(&thing.piot_id)
        .bind(&thing.name)
        .bind(thing.thing_type().as_str())
        .bind(&thing.org_id)
        .bind(document)
        .execute(&self.pool)
        .await
        .map_err(|err| map_write_error(err, &thing.name))?;
        Ok(())
    }

    async fn set_availability_topic(&self, id: &str, topic: &str) -> Result<(), StorageError> {
        self.set_fields(id, None, &[("{availability,topic}", json!(topic))])
            .await
    }

    async fn set_availability_values(
        &self,
        id: &str,
        yes: &str,
        no: &str,
    ) -> Result<(), StorageError> {
        self.set_fields(
            id,
            None,
            &[
                ("{availability,yes}", json!(yes)),
                ("{availability,no}", json!(no)),
            ],
        )
        .await
    }

    async fn set_telemetry(&self, id: &str, payload: &str) -> Result<(), StorageError> {
        self.set_fields(id, None, &[("{telemetry,payload}", json!(payload))])
            .await
    }

    async fn set_sensor_measurement_topic(
        &self,
        id: &str,
        topic: &str,
    ) -> Result<(), StorageError> {
        self.set_fields(
            id,
            Some(ThingType::Sensor),
            &[("{kind,data,measurement_topic}", json!(topic))],
        )
        .await
    }

    async fn set_sensor_class(
        &self,
        id: &str,
        class: &str,
        unit: &str,
    ) -> Result<(), StorageError> {
        self.set_fields(
            id,
            Some(ThingType::Sensor),
            &[
                ("{kind,data,class}", json!(class)),
                ("{kind,data,unit}", json!(unit)),
            ],
        )
        .await
    }

    async fn set_sensor_value(&self, id: &str, value: &str) -> Result<(), StorageError> {
        self.set_fields(
            id,
            Some(ThingType::Sensor),
            &[("{kind,data,value}", json!(value))],
        )
        .await
    }

    async fn set_switch_state(&self, id: &str, state: bool) -> Result<(), StorageError> {
        self.set_fields(
            id,
            Some(ThingType::Switch),
            &[("{kind,data,state}", json!(state))],
        )
        .await
    }

    async fn set_location(&self, id: &str, location: Location) -> Result<bool, StorageError> {
        let document = serde_json::to_string(&location)?;
        let result = sqlx::query(
            "update things \
             set document = jsonb_set(document, '{kind,data,location}', $2::jsonb, true) \
             where id = $1 and thing_type = 'device' \
             and coalesce((document #>> '{kind,data,location,ts}')::bigint, $3) <= $3",
        )
        .bind(id)
        .bind(document)
        .bind(location.ts)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() > 0 {
            return Ok(true);
        }
        match self.get(id).await? {
            None => Err(StorageError::not_found(id)),
            Some(thing) if thing.thing_type() != ThingType::Device => Err(StorageError::new(
                format!("thing {id} is a {}, not a device", thing.thing_type().as_str()),
            )),
            Some(_) => Ok(false),
        }
    }

    async fn set_parent(&self, id: &str, parent_id: &str) -> Result<(), StorageError> {
        self.set_fields(id, None, &[("{parent_id}", json!(parent_id))])
            .await
    }

    async fn touch(&self, id: &str, ts: i64) -> Result<(), StorageError> {
        self.set_fields(id, None, &[("{last_seen}", json!(ts))]).await
    }

    async fn set_battery_level(&self, id: &str, level: i32) -> Result<(), StorageError> {
        self.set_fields(id, None, &[("{battery,level}", json!(level))])
            .await
    }

    async fn list(&self, filter: &ThingFilter) -> Result<Vec<Thing>, StorageError> {
        let (topic_path, topic) = match &filter.topic {
            Some((field, topic)) => (Some(topic_path(*field)), Some(topic.as_str())),
            None => (None, None),
        };
        let rows = sqlx::query(
            "select document::text as document from things \
             where ($1::text is null or org_id = $1) \
             and ($2::text is null or thing_type = $2) \
             and ($3::text[] is null or document #>> $3::text[] = $4) \
             and ($5::boolean is null or (document ->> 'enabled')::boolean = $5) \
             order by name",
        )
        .bind(&filter.org_id)
        .bind(filter.thing_type.map(ThingType::as_str))
        .bind(topic_path)
        .bind(topic)
        .bind(filter.enabled)
        .fetch_all(&self.pool)
        .await?;
        let mut things = Vec::with_capacity(rows.len());
        for row in rows {
            let thing = decode_row(&row)?;
            // 空主题在 SQL 中会匹配未配置的字段
            if filter.matches(&thing) {
                things.push(thing);
            }
        }
        Ok(things)
    }
}
