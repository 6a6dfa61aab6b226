//! 网关数据面共享的领域模型。
//!
//! 定义由外部配置存储持有、数据面只读快照的实体（网关、连接器、设备、序列、主题订阅），
//! 以及数据面自行产生的记录（样本、状态）。

pub mod data;
pub mod model;
pub mod register;
pub mod status;

pub use data::{DeviceValues, SampleRecord, now_epoch_ms};
pub use model::{
    BusDevice, BusKey, BusSettings, ConnectorKind, ConnectorRecord, ConnectorSettings,
    DEFAULT_INTERVAL_SECS, DEFAULT_MAX_RETAINED_SAMPLES, DeviceRecord, Direction, GatewayRecord,
    HttpMethod, HttpSettings, SeriesRecord, TopicSubscription, ValueType, parse_interval_secs,
    parse_max_samples,
};
pub use register::{ByteOrder, DataType};
pub use status::{Status, connector_status, gateway_status};
