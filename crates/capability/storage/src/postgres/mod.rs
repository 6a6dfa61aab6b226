//! # PostgreSQL 存储实现模块
//!
//! - **ConfigStore** (`config.rs`)：配置快照读取、状态写回、拓扑导入
//! - **SampleStore** (`sample.rs`)：样本写入与保留裁剪
//!
//! 表结构见 `schema/gateway.sql`，由 [`crate::apply_schema`] 创建。
//! 所有查询使用参数绑定。

pub mod config;
pub mod sample;

pub use config::*;
pub use sample::*;
