//! 内存存储实现模块
//!
//! 用于测试和无数据库运行。
//!
//! - ConfigStore: InMemoryConfigStore
//! - SampleStore: InMemorySampleStore

pub mod config;
pub mod sample;

pub use config::*;
pub use sample::*;
