use gw_ingest::BridgeError;

/// 出站转发错误。
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    /// 目标不可达、超时或总线未连接
    #[error("connection error: {0}")]
    Connection(String),
    /// HTTP 目标返回非 2xx
    #[error("unexpected status: {0}")]
    Status(u16),
    #[error("payload error: {0}")]
    Payload(String),
    /// 缺少发布目标或连接器类型不匹配
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl ForwardError {
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Status(_))
    }
}

impl From<BridgeError> for ForwardError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::Configuration(message) => Self::Configuration(message),
            BridgeError::Decode(message) => Self::Payload(message),
            BridgeError::Connection(message) | BridgeError::Publish(message) => {
                Self::Connection(message)
            }
        }
    }
}

impl From<reqwest::Error> for ForwardError {
    fn from(err: reqwest::Error) -> Self {
        Self::Connection(err.to_string())
    }
}
