//! 追踪、请求 ID 与数据面计数指标。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 请求级追踪标识。
#[derive(Debug, Clone)]
pub struct RequestIds {
    pub request_id: String,
    pub trace_id: String,
}

/// 指标快照。
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub poll_cycles: u64,
    pub connectors_polled: u64,
    pub device_connect_failures: u64,
    pub register_read_failures: u64,
    pub samples_written: u64,
    pub samples_pruned: u64,
    pub bus_messages: u64,
    pub bus_dropped_unmatched: u64,
    pub bus_dropped_undeclared: u64,
    pub bus_keys_rejected: u64,
    pub decode_failures: u64,
    pub forward_success: u64,
    pub forward_failure: u64,
    pub bus_reconnects: u64,
}

/// 数据面计数指标（进程级）。
pub struct TelemetryMetrics {
    poll_cycles: AtomicU64,
    connectors_polled: AtomicU64,
    device_connect_failures: AtomicU64,
    register_read_failures: AtomicU64,
    samples_written: AtomicU64,
    samples_pruned: AtomicU64,
    bus_messages: AtomicU64,
    bus_dropped_unmatched: AtomicU64,
    bus_dropped_undeclared: AtomicU64,
    bus_keys_rejected: AtomicU64,
    decode_failures: AtomicU64,
    forward_success: AtomicU64,
    forward_failure: AtomicU64,
    bus_reconnects: AtomicU64,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self {
            poll_cycles: AtomicU64::new(0),
            connectors_polled: AtomicU64::new(0),
            device_connect_failures: AtomicU64::new(0),
            register_read_failures: AtomicU64::new(0),
            samples_written: AtomicU64::new(0),
            samples_pruned: AtomicU64::new(0),
            bus_messages: AtomicU64::new(0),
            bus_dropped_unmatched: AtomicU64::new(0),
            bus_dropped_undeclared: AtomicU64::new(0),
            bus_keys_rejected: AtomicU64::new(0),
            decode_failures: AtomicU64::new(0),
            forward_success: AtomicU64::new(0),
            forward_failure: AtomicU64::new(0),
            bus_reconnects: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            poll_cycles: self.poll_cycles.load(Ordering::Relaxed),
            connectors_polled: self.connectors_polled.load(Ordering::Relaxed),
            device_connect_failures: self.device_connect_failures.load(Ordering::Relaxed),
            register_read_failures: self.register_read_failures.load(Ordering::Relaxed),
            samples_written: self.samples_written.load(Ordering::Relaxed),
            samples_pruned: self.samples_pruned.load(Ordering::Relaxed),
            bus_messages: self.bus_messages.load(Ordering::Relaxed),
            bus_dropped_unmatched: self.bus_dropped_unmatched.load(Ordering::Relaxed),
            bus_dropped_undeclared: self.bus_dropped_undeclared.load(Ordering::Relaxed),
            bus_keys_rejected: self.bus_keys_rejected.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            forward_success: self.forward_success.load(Ordering::Relaxed),
            forward_failure: self.forward_failure.load(Ordering::Relaxed),
            bus_reconnects: self.bus_reconnects.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

static METRICS: OnceLock<TelemetryMetrics> = OnceLock::new();

/// 获取全局指标实例。
pub fn metrics() -> &'static TelemetryMetrics {
    METRICS.get_or_init(TelemetryMetrics::new)
}

/// 初始化 tracing（默认 info）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 生成新的 request_id 与 trace_id。
pub fn new_request_ids() -> RequestIds {
    RequestIds {
        request_id: uuid::Uuid::new_v4().to_string(),
        trace_id: uuid::Uuid::new_v4().to_string(),
    }
}

/// 记录轮询调度周期次数。
pub fn record_poll_cycle() {
    metrics().poll_cycles.fetch_add(1, Ordering::Relaxed);
}

/// 记录被轮询的连接器次数。
pub fn record_connector_polled() {
    metrics().connectors_polled.fetch_add(1, Ordering::Relaxed);
}

/// 记录设备连接失败次数。
pub fn record_device_connect_failure() {
    metrics()
        .device_connect_failures
        .fetch_add(1, Ordering::Relaxed);
}

/// 记录寄存器读取失败次数。
pub fn record_register_read_failure() {
    metrics()
        .register_read_failures
        .fetch_add(1, Ordering::Relaxed);
}

/// 记录样本写入次数。
pub fn record_sample_written() {
    metrics().samples_written.fetch_add(1, Ordering::Relaxed);
}

/// 记录保留裁剪删除的样本数。
pub fn record_samples_pruned(count: u64) {
    if count > 0 {
        metrics().samples_pruned.fetch_add(count, Ordering::Relaxed);
    }
}

/// 记录收到的总线消息次数。
pub fn record_bus_message() {
    metrics().bus_messages.fetch_add(1, Ordering::Relaxed);
}

/// 记录主题未匹配的丢弃次数。
pub fn record_bus_dropped_unmatched() {
    metrics()
        .bus_dropped_unmatched
        .fetch_add(1, Ordering::Relaxed);
}

/// 记录设备未声明的丢弃次数。
pub fn record_bus_dropped_undeclared() {
    metrics()
        .bus_dropped_undeclared
        .fetch_add(1, Ordering::Relaxed);
}

/// 记录白名单拒绝的 key 数。
pub fn record_bus_keys_rejected(count: u64) {
    if count > 0 {
        metrics()
            .bus_keys_rejected
            .fetch_add(count, Ordering::Relaxed);
    }
}

/// 记录解码失败次数（寄存器响应或总线负载）。
pub fn record_decode_failure() {
    metrics().decode_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录出站推送成功次数。
pub fn record_forward_success() {
    metrics().forward_success.fetch_add(1, Ordering::Relaxed);
}

/// 记录出站推送失败次数。
pub fn record_forward_failure() {
    metrics().forward_failure.fetch_add(1, Ordering::Relaxed);
}

/// 记录总线重连次数。
pub fn record_bus_reconnect() {
    metrics().bus_reconnects.fetch_add(1, Ordering::Relaxed);
}
