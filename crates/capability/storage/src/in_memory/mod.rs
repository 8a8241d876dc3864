//! 内存存储实现模块
//!
//! 用于测试与无数据库的本地运行。
//!
//! - ThingStore: InMemoryThingStore
//! - OrgStore: InMemoryOrgStore
//! - UserStore: InMemoryUserStore

pub mod org;
pub mod thing;
pub mod user;

pub use org::*;
pub use thing::*;
pub use user::*;
