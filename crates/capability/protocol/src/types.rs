//! 协议相关类型定义

use domain::DeviceRecord;

/// 寄存器设备端点
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterEndpoint {
    pub host: String,
    pub port: u16,
    /// 从站 ID
    pub unit_id: u8,
}

impl RegisterEndpoint {
    pub fn new(host: impl Into<String>, port: u16, unit_id: u8) -> Self {
        Self {
            host: host.into(),
            port,
            unit_id,
        }
    }
}

impl From<&DeviceRecord> for RegisterEndpoint {
    fn from(device: &DeviceRecord) -> Self {
        Self::new(device.host.clone(), device.port, device.unit_id)
    }
}

impl std::fmt::Display for RegisterEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}#{}", self.host, self.port, self.unit_id)
    }
}

/// 单次 Modbus 请求最多可读取的保持寄存器数量
pub const MAX_READ_REGISTERS: u16 = 125;
