//! # 寄存器协议能力模块
//!
//! 提供寄存器轮询所需的协议能力：
//! - **RegisterReader / RegisterSession**：连接设备、读取保持寄存器的能力接口
//! - **ModbusTcpReader**：基于 `tokio-modbus` 的 Modbus TCP 实现，连接与读取均有超时
//! - **decode**：按数据类型与字节序把寄存器序列解码为数值
//!
//! ## 架构设计
//!
//! ```text
//! DeviceRecord (host, port, unit_id)
//!       │
//!       ▼
//! RegisterReader::connect ──► RegisterSession::read_holding(address, count)
//!                                   │
//!                                   ▼
//!                     decode(registers, data_type, byte_order) × scale
//! ```
//!
//! 一次会话对应一台设备的一个轮询周期，会话被丢弃时连接关闭。

mod decode;
mod error;
mod modbus_tcp;
mod types;

pub use decode::decode;
pub use error::ProtocolError;
pub use modbus_tcp::{ModbusTcpConfig, ModbusTcpReader};
pub use types::*;

use async_trait::async_trait;

/// 寄存器协议读取能力（每台设备每周期建立一次会话）。
#[async_trait]
pub trait RegisterReader: Send + Sync {
    async fn connect(
        &self,
        endpoint: &RegisterEndpoint,
    ) -> Result<Box<dyn RegisterSession>, ProtocolError>;
}

/// 已建立的设备会话。
#[async_trait]
pub trait RegisterSession: Send {
    /// 从 `address` 起读取 `count` 个保持寄存器。
    async fn read_holding(&mut self, address: u16, count: u16) -> Result<Vec<u16>, ProtocolError>;
}
