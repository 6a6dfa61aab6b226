use std::collections::BTreeMap;

/// 单个设备一次采集得到的值（key → value）。
pub type DeviceValues = BTreeMap<String, f64>;

/// 样本：某个序列的一个带时间戳的值。
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRecord {
    /// 序列 ID（寄存器序列 ID，或总线设备下的 key 序列 ID）
    pub series_id: String,
    pub device_id: String,
    /// 序列名 / 总线 key
    pub key: String,
    pub value: f64,
    pub ts_ms: i64,
}

/// 获取当前时间戳（毫秒）
pub fn now_epoch_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
