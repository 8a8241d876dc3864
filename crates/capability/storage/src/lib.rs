//! # PIOT Storage 模块
//!
//! Thing 注册表、组织与用户的存储抽象层。
//!
//! ## 架构设计
//!
//! 1. **接口抽象层** (`traits.rs`)：`ThingStore`、`OrgStore`、`UserStore`
//! 2. **数据模型层** (`models.rs`)：存储专用记录（Thing/Org 模型在 `domain`）
//! 3. **错误处理层** (`error.rs`)：统一的存储错误类型，区分命名冲突
//! 4. **验证辅助层** (`validation.rs`)：名称合法性与位置单调性判断
//! 5. **连接管理层** (`connection.rs`)：数据库连接池管理
//! 6. **实现层**：
//!    - `in_memory/`：内存存储实现（测试与本地运行）
//!    - `postgres/`：PostgreSQL 存储实现（生产环境）
//!
//! ## 注册表约定
//!
//! - 名称全局唯一，只在 `register` 时校验，调用方先查找再注册
//! - 解析出 id 之后的所有变更都按 id 执行
//! - 位置写入带单调性保护：新时间戳早于已存值时不覆盖
//! - 存储层只做单条记录的原子更新，不提供跨记录事务
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! use piot_storage::{InMemoryThingStore, ThingStore};
//! use domain::ThingType;
//!
//! let store = InMemoryThingStore::new();
//! let device = store.register("d1", ThingType::Device, Some("d1")).await?;
//! store.touch(&device.id, 1_700_000_000).await?;
//! ```

pub mod connection;
pub mod error;
pub mod in_memory;
pub mod models;
pub mod postgres;
pub mod traits;
pub mod validation;

pub use connection::*;
pub use error::*;
pub use models::*;
pub use traits::*;
pub use validation::*;

pub use in_memory::{InMemoryOrgStore, InMemoryThingStore, InMemoryUserStore};

pub use postgres::{PgOrgStore, PgThingStore, PgUserStore};
