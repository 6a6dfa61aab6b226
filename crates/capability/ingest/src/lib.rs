//! 消息总线桥接（MQTT）
//!
//! - [`topic`]：单层通配主题匹配与订阅查找
//! - [`envelope`]：入站 JSON 信封解码
//! - [`bridge`]：白名单过滤，写入聚合缓存与样本存储
//! - [`link`]：每个总线连接器的长期会话任务（订阅、重连、状态）
//! - [`publisher`]：出站发布器及其注册表

pub mod backoff;
pub mod bridge;
pub mod envelope;
pub mod error;
pub mod link;
pub mod publisher;
pub mod topic;

pub use backoff::ReconnectBackoff;
pub use bridge::{BusMessageHandler, MessageOutcome};
pub use envelope::{InboundEnvelope, numeric_value};
pub use error::BridgeError;
pub use link::{BusLinkConfig, BusLinkContext, spawn_bus_link};
pub use publisher::{BusPublisher, MqttPublisher, PublisherRegistry};
pub use topic::{TopicMatch, match_subscription, topic_matches};
