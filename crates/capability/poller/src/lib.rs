//! 源轮询能力（寄存器轮询连接器）
//!
//! - [`schedule`]：按连接器的到期表，与时钟解耦
//! - [`poller`]：轮询周期与长期循环

pub mod error;
pub mod poller;
pub mod schedule;

pub use error::PollError;
pub use poller::{ConnectorReport, CycleReport, SourcePoller, spawn_poller};
pub use schedule::DueTable;
