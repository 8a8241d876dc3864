//! Handlers 模块

pub mod adapter;
pub mod metrics;
pub mod mosquitto;

pub use adapter::*;
pub use metrics::*;
pub use mosquitto::*;
