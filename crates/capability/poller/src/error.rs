use gw_storage::StorageError;

/// 轮询错误：只有配置读取失败会中止一个周期，设备与寄存器错误在周期内消化。
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error("config read failed: {0}")]
    Storage(#[from] StorageError),
}
