//! 协议错误类型定义

/// 协议通信错误
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// 连接错误（地址解析失败、拒绝连接等）
    #[error("connection error: {0}")]
    Connection(String),

    /// IO 错误
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 设备返回的 Modbus 异常码
    #[error("modbus exception: {0}")]
    Exception(String),

    /// 配置错误（寄存器数量非法等）
    #[error("config error: {0}")]
    Config(String),

    /// 寄存器解码错误
    #[error("decode error: {0}")]
    Decode(String),

    /// 超时错误
    #[error("timeout: {0}")]
    Timeout(String),
}

impl ProtocolError {
    /// 是否属于连接类失败（连接/超时/IO）。
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Timeout(_) | Self::Io(_))
    }
}
