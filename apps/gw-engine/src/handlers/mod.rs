//! Handlers 模块（只读监控接口）

pub mod devices;
pub mod gateways;
pub mod health;
pub mod metrics;

pub use devices::*;
pub use gateways::*;
pub use health::*;
pub use metrics::*;
