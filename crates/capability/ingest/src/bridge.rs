//! 入站总线消息处理
//!
//! 主题 + 设备名 + key 三级白名单过滤后，被允许的值同时写入聚合缓存
//! 和样本存储（保留范围为总线设备）。

use crate::envelope::{InboundEnvelope, numeric_value};
use crate::topic::{TopicMatch, match_subscription};
use domain::{ConnectorRecord, DeviceValues, SampleRecord, now_epoch_ms};
use gw_pipeline::AggregateCache;
use gw_storage::{RetentionScope, SampleStore};
use std::sync::Arc;
use tracing::{debug, warn};

/// 单条消息的处理结果
#[derive(Debug, Clone, PartialEq)]
pub enum MessageOutcome {
    Accepted {
        device_id: String,
        accepted: usize,
        rejected: usize,
        decode_failures: usize,
    },
    DroppedUnmatchedTopic,
    DroppedUndeclaredDevice,
    DecodeFailed,
}

/// 入站总线消息处理器
#[derive(Clone)]
pub struct BusMessageHandler {
    samples: Arc<dyn SampleStore>,
    cache: AggregateCache,
}

impl BusMessageHandler {
    pub fn new(samples: Arc<dyn SampleStore>, cache: AggregateCache) -> Self {
        Self { samples, cache }
    }

    pub async fn handle(
        &self,
        connector: &ConnectorRecord,
        topic: &str,
        payload: &[u8],
    ) -> MessageOutcome {
        gw_telemetry::record_bus_message();
        let Some(settings) = connector.bus_settings() else {
            return MessageOutcome::DroppedUnmatchedTopic;
        };
        let envelope = match InboundEnvelope::decode(payload) {
            Ok(envelope) => envelope,
            Err(err) => {
                gw_telemetry::record_decode_failure();
                warn!(
                    target: "gw.bridge",
                    connector_id = %connector.connector_id,
                    topic,
                    error = %err,
                    "bus_message_decode_failed"
                );
                return MessageOutcome::DecodeFailed;
            }
        };

        let device = match match_subscription(&settings.subscriptions, topic, &envelope.node) {
            TopicMatch::Matched { device, .. } => device,
            TopicMatch::UnmatchedTopic => {
                gw_telemetry::record_bus_dropped_unmatched();
                debug!(
                    target: "gw.bridge",
                    connector_id = %connector.connector_id,
                    topic,
                    "bus_message_dropped_unmatched_topic"
                );
                return MessageOutcome::DroppedUnmatchedTopic;
            }
            TopicMatch::UndeclaredDevice => {
                gw_telemetry::record_bus_dropped_undeclared();
                debug!(
                    target: "gw.bridge",
                    connector_id = %connector.connector_id,
                    topic,
                    node = %envelope.node,
                    "bus_message_dropped_undeclared_device"
                );
                return MessageOutcome::DroppedUndeclaredDevice;
            }
        };

        let ts_ms = envelope.timestamp.unwrap_or_else(now_epoch_ms);
        let scope = RetentionScope::Device(device.device_id.clone());
        let max_samples = connector.max_samples();
        let mut accepted = DeviceValues::new();
        let mut rejected = 0usize;
        let mut decode_failures = 0usize;

        for (key, raw) in &envelope.values {
            let Some(declared) = device.find_key(key) else {
                rejected += 1;
                continue;
            };
            let Some(value) = numeric_value(raw) else {
                decode_failures += 1;
                gw_telemetry::record_decode_failure();
                continue;
            };
            let sample = SampleRecord {
                series_id: declared.series_id.clone(),
                device_id: device.device_id.clone(),
                key: key.clone(),
                value,
                ts_ms,
            };
            match self.samples.append(&sample, &scope, max_samples).await {
                Ok(pruned) => {
                    gw_telemetry::record_sample_written();
                    gw_telemetry::record_samples_pruned(pruned);
                }
                Err(err) => {
                    warn!(
                        target: "gw.bridge",
                        device_id = %device.device_id,
                        key = %key,
                        error = %err,
                        "bus_sample_write_failed"
                    );
                }
            }
            accepted.insert(key.clone(), value);
        }
        gw_telemetry::record_bus_keys_rejected(rejected as u64);

        if !accepted.is_empty() {
            let lanes = self
                .cache
                .merge(&connector.connector_id, &device.device_name, &accepted)
                .await;
            debug!(
                target: "gw.bridge",
                connector_id = %connector.connector_id,
                device = %device.device_name,
                keys = accepted.len(),
                lanes,
                "bus_message_accepted"
            );
        }

        MessageOutcome::Accepted {
            device_id: device.device_id.clone(),
            accepted: accepted.len(),
            rejected,
            decode_failures,
        }
    }
}
