//! # Gateway Storage 模块
//!
//! 数据面的存储抽象层：
//!
//! 1. **接口抽象层** (`traits.rs`)：`ConfigStore`（配置快照 + 状态写回）、
//!    `SampleStore`（有界样本保留）
//! 2. **错误处理层** (`error.rs`)：统一的存储错误类型
//! 3. **连接管理层** (`connection.rs`)：连接池与建表
//! 4. **实现层**：
//!    - `in_memory/`：内存实现（测试、无数据库运行）
//!    - `postgres/`：PostgreSQL 实现
//!
//! ## 保留策略
//!
//! 每次 `append` 在同一操作内插入并删除排名超出上限的最旧样本，
//! 排序为时间戳降序。寄存器轮询样本按连接器共享上限，总线样本按设备共享上限。
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! use gw_storage::{InMemorySampleStore, RetentionScope, SampleStore};
//!
//! let store = InMemorySampleStore::new();
//! let scope = RetentionScope::Connector("c1".to_string());
//! let pruned = store.append(&sample, &scope, 100).await?;
//! ```

pub mod connection;
pub mod error;
pub mod in_memory;
pub mod postgres;
pub mod traits;

pub use connection::*;
pub use error::*;
pub use traits::*;

pub use in_memory::{InMemoryConfigStore, InMemorySampleStore};
pub use postgres::{PgConfigStore, PgSampleStore};
