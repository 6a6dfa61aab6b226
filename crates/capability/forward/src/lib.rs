//! 出站转发能力
//!
//! - [`sink`]：`Sink` 接口及 HTTP / 总线实现
//! - [`forwarder`]：设备同步推送、缓存通道转发与转发任务

pub mod error;
pub mod forwarder;
pub mod sink;

pub use error::ForwardError;
pub use forwarder::{DevicePush, ForwardOutcome, Forwarder, spawn_forwarder};
pub use sink::{BusSink, HttpSink, Sink, query_pairs};
