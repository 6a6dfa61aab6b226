/// 总线桥接错误。
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// 连接不可用（未连接、断开、超时）
    #[error("connection error: {0}")]
    Connection(String),
    #[error("publish error: {0}")]
    Publish(String),
    /// 消息不是合法 JSON 或缺少必需字段
    #[error("decode error: {0}")]
    Decode(String),
    /// 配置不一致（缺少发布目标等）
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl BridgeError {
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}
