//! # PostgreSQL 存储实现模块
//!
//! ## 包含的实现
//!
//! - **ThingStore** (`thing.rs`)：Thing 注册表
//! - **OrgStore** (`org.rs`)：组织查询
//! - **UserStore** (`user.rs`)：用户与组织成员关系查询
//!
//! ## 数据库模式要求
//!
//! - `orgs`：组织表（org_id, name, timeseries_db, relational_db, mqtt_username, mqtt_password）
//! - `users`：用户表（user_id, username, password_hash）
//! - `org_users`：组织成员关系（org_id, user_id）
//! - `things`：Thing 表，查找列（id, piot_id, name, thing_type, org_id）加整条记录的
//!   `document jsonb`
//!
//! 字段级更新都是单条 `jsonb_set` 语句，位置更新把单调性条件放在 `WHERE` 中，
//! 并发写入无需额外事务。

pub mod org;
pub mod thing;
pub mod user;

pub use org::*;
pub use thing::*;
pub use user::*;
