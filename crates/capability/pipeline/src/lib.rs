//! 聚合缓存（Aggregate Cache）
//!
//! 进程内的最新值缓存：入站写入 (来源连接器, 设备) → key → 最新值，
//! 出站转发每个周期原子地读取并清空。
//!
//! 每个出站连接器持有一条独立通道（lane），订阅若干来源连接器；
//! 一次写入在同一把锁内落到所有订阅了该来源的通道，
//! 因此多个出站连接器互不抢占数据，且读取并清空与写入互斥。

use domain::{DeviceValues, now_epoch_ms};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

/// 一次转发的负载：`{"timestamp": <epoch-ms>, "data": {device: {key: value}}}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForwardPayload {
    pub timestamp: i64,
    pub data: BTreeMap<String, DeviceValues>,
}

impl ForwardPayload {
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// 负载中的值总数
    pub fn value_count(&self) -> usize {
        self.data.values().map(BTreeMap::len).sum()
    }
}

#[derive(Default)]
struct Lane {
    sources: HashSet<String>,
    /// (来源连接器, 设备名) → 最新值
    entries: HashMap<(String, String), DeviceValues>,
}

#[derive(Default)]
struct CacheState {
    lanes: HashMap<String, Lane>,
}

/// 聚合缓存（可克隆，共享同一状态）
#[derive(Clone, Default)]
pub struct AggregateCache {
    inner: Arc<Mutex<CacheState>>,
}

impl AggregateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 为出站连接器登记来源；已存在的通道保留仍在订阅范围内的条目。
    pub async fn subscribe<I>(&self, sink_id: &str, sources: I)
    where
        I: IntoIterator<Item = String>,
    {
        let sources: HashSet<String> = sources.into_iter().collect();
        let mut state = self.inner.lock().await;
        let lane = state.lanes.entry(sink_id.to_string()).or_default();
        lane.entries
            .retain(|(source, _), _| sources.contains(source));
        lane.sources = sources;
    }

    /// 移除出站连接器的通道（未转发的数据一并丢弃）。
    pub async fn unsubscribe(&self, sink_id: &str) {
        let mut state = self.inner.lock().await;
        state.lanes.remove(sink_id);
    }

    /// 合并一台设备的值到所有订阅该来源的通道，返回写入的通道数。
    pub async fn merge(&self, source_id: &str, device: &str, values: &DeviceValues) -> usize {
        if values.is_empty() {
            return 0;
        }
        let mut state = self.inner.lock().await;
        let mut written = 0;
        for lane in state.lanes.values_mut() {
            if !lane.sources.contains(source_id) {
                continue;
            }
            let entry = lane
                .entries
                .entry((source_id.to_string(), device.to_string()))
                .or_default();
            entry.extend(values.iter().map(|(key, value)| (key.clone(), *value)));
            written += 1;
        }
        written
    }

    /// 原子地读取并清空通道；为空时返回 `None`。
    pub async fn drain(&self, sink_id: &str) -> Option<ForwardPayload> {
        let entries = {
            let mut state = self.inner.lock().await;
            let lane = state.lanes.get_mut(sink_id)?;
            if lane.entries.is_empty() {
                return None;
            }
            std::mem::take(&mut lane.entries)
        };

        let mut data: BTreeMap<String, DeviceValues> = BTreeMap::new();
        for ((_, device), values) in entries {
            data.entry(device).or_default().extend(values);
        }
        Some(ForwardPayload {
            timestamp: now_epoch_ms(),
            data,
        })
    }

    /// 通道内待转发的 (来源, 设备) 条目数
    pub async fn pending(&self, sink_id: &str) -> usize {
        let state = self.inner.lock().await;
        state
            .lanes
            .get(sink_id)
            .map(|lane| lane.entries.len())
            .unwrap_or(0)
    }
}
