//! 存储接口 Trait 定义
//!
//! - ThingStore：Thing 注册表（查找、注册、字段级更新、批量过滤）
//! - OrgStore：组织只读查询
//! - UserStore：用户与组织成员关系只读查询
//!
//! 所有变更在解析出唯一 id 之后按 id 执行；名称唯一性只在注册时校验。

use crate::error::StorageError;
use crate::models::UserRecord;
use async_trait::async_trait;
use domain::{Location, Org, Thing, ThingFilter, ThingType};

#[async_trait]
pub trait ThingStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<Thing>, StorageError>;

    /// 按显示名查找。
    async fn find(&self, name: &str) -> Result<Option<Thing>, StorageError>;

    /// 按设备侧原生标识查找。
    async fn find_by_piot_id(&self, piot_id: &str) -> Result<Option<Thing>, StorageError>;

    /// 注册新 Thing，名称已存在时返回冲突错误。
    async fn register(
        &self,
        name: &str,
        thing_type: ThingType,
        piot_id: Option<&str>,
    ) -> Result<Thing, StorageError>;

    /// 整条记录写回（由外部管理面维护组织归属、开关等配置）。
    async fn save(&self, thing: &Thing) -> Result<(), StorageError>;

    async fn set_availability_topic(&self, id: &str, topic: &str) -> Result<(), StorageError>;

    async fn set_availability_values(
        &self,
        id: &str,
        yes: &str,
        no: &str,
    ) -> Result<(), StorageError>;

    async fn set_telemetry(&self, id: &str, payload: &str) -> Result<(), StorageError>;

    async fn set_sensor_measurement_topic(&self, id: &str, topic: &str)
    -> Result<(), StorageError>;

    async fn set_sensor_class(&self, id: &str, class: &str, unit: &str)
    -> Result<(), StorageError>;

    async fn set_sensor_value(&self, id: &str, value: &str) -> Result<(), StorageError>;

    async fn set_switch_state(&self, id: &str, state: bool) -> Result<(), StorageError>;

    /// 写入位置；旧时间戳晚于新值时不写并返回 `false`。
    async fn set_location(&self, id: &str, location: Location) -> Result<bool, StorageError>;

    async fn set_parent(&self, id: &str, parent_id: &str) -> Result<(), StorageError>;

    /// 更新最近可见时间（unix 秒）。
    async fn touch(&self, id: &str, ts: i64) -> Result<(), StorageError>;

    async fn set_battery_level(&self, id: &str, level: i32) -> Result<(), StorageError>;

    async fn list(&self, filter: &ThingFilter) -> Result<Vec<Thing>, StorageError>;
}

#[async_trait]
pub trait OrgStore: Send + Sync {
    async fn get(&self, org_id: &str) -> Result<Option<Org>, StorageError>;

    async fn find_by_name(&self, name: &str) -> Result<Option<Org>, StorageError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StorageError>;

    /// 用户所属的全部组织。
    async fn list_user_orgs(&self, user_id: &str) -> Result<Vec<Org>, StorageError>;
}
