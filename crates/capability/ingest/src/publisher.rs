//! 出站总线发布
//!
//! 每条总线链路注册一个发布器；出站转发按连接器 ID 查找。

use crate::error::BridgeError;
use async_trait::async_trait;
use rumqttc::{AsyncClient, QoS};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::time::timeout;

/// 总线发布接口
#[async_trait]
pub trait BusPublisher: Send + Sync {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), BridgeError>;

    fn is_connected(&self) -> bool;
}

/// 基于 rumqttc 客户端的发布器，连接标志由链路事件循环维护
#[derive(Clone)]
pub struct MqttPublisher {
    client: AsyncClient,
    connected: Arc<AtomicBool>,
    publish_timeout: Duration,
}

impl MqttPublisher {
    pub fn new(client: AsyncClient, connected: Arc<AtomicBool>, publish_timeout: Duration) -> Self {
        Self {
            client,
            connected,
            publish_timeout,
        }
    }
}

#[async_trait]
impl BusPublisher for MqttPublisher {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), BridgeError> {
        if !self.is_connected() {
            return Err(BridgeError::Connection("bus link not connected".to_string()));
        }
        timeout(
            self.publish_timeout,
            self.client.publish(topic, QoS::AtMostOnce, false, payload),
        )
        .await
        .map_err(|_| BridgeError::Connection(format!("publish to {topic} timed out")))?
        .map_err(|err| BridgeError::Publish(err.to_string()))
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

/// 连接器 ID → 发布器
#[derive(Clone, Default)]
pub struct PublisherRegistry {
    inner: Arc<RwLock<HashMap<String, Arc<dyn BusPublisher>>>>,
}

impl PublisherRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, connector_id: &str, publisher: Arc<dyn BusPublisher>) {
        if let Ok(mut guard) = self.inner.write() {
            guard.insert(connector_id.to_string(), publisher);
        }
    }

    pub fn remove(&self, connector_id: &str) {
        if let Ok(mut guard) = self.inner.write() {
            guard.remove(connector_id);
        }
    }

    pub fn get(&self, connector_id: &str) -> Option<Arc<dyn BusPublisher>> {
        self.inner
            .read()
            .ok()
            .and_then(|guard| guard.get(connector_id).cloned())
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
