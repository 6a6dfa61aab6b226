//! 配置实体
//!
//! 网关 / 连接器 / 设备 / 序列 / 主题订阅由外部 CRUD 层维护，
//! 数据面每个调度周期重新读取快照，只修改 `status` 字段。

use crate::register::{ByteOrder, DataType};
use crate::status::Status;

/// 轮询间隔非法时的默认值（秒）
pub const DEFAULT_INTERVAL_SECS: u64 = 60;

/// 每个保留范围的默认最大样本数
pub const DEFAULT_MAX_RETAINED_SAMPLES: i64 = 100;

/// 网关记录
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayRecord {
    pub gateway_id: String,
    pub name: String,
    pub status: Status,
}

/// 连接器方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// 入站：拉取或接收数据
    Inbound,
    /// 出站：推送数据
    Outbound,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
        }
    }
}

/// 连接器类型（不含配置）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectorKind {
    RegisterPoll,
    Bus,
    Http,
}

impl ConnectorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RegisterPoll => "register_poll",
            Self::Bus => "bus",
            Self::Http => "http",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "register_poll" | "modbus" => Some(Self::RegisterPoll),
            "bus" | "mqtt" => Some(Self::Bus),
            "http" | "rest" => Some(Self::Http),
            _ => None,
        }
    }
}

/// HTTP 请求方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HttpMethod {
    Get,
    #[default]
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }

    /// 解析方法名，未知值回退为 POST。
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("GET") {
            Self::Get
        } else {
            Self::Post
        }
    }
}

/// HTTP 出站目标
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HttpSettings {
    pub url: String,
    pub method: HttpMethod,
}

/// 总线 key 声明的值类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ValueType {
    String,
    Integer,
    #[default]
    Double,
    Boolean,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "String",
            Self::Integer => "Integer",
            Self::Double => "Double",
            Self::Boolean => "Boolean",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "string" => Self::String,
            "integer" | "int" => Self::Integer,
            "boolean" | "bool" => Self::Boolean,
            _ => Self::Double,
        }
    }
}

/// 白名单中的一个 key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BusKey {
    pub series_id: String,
    pub key: String,
    pub value_type: ValueType,
}

/// 主题订阅下声明的设备（逻辑名）
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BusDevice {
    pub device_id: String,
    pub device_name: String,
    pub keys: Vec<BusKey>,
}

impl BusDevice {
    pub fn find_key(&self, key: &str) -> Option<&BusKey> {
        self.keys.iter().find(|item| item.key == key)
    }
}

/// 主题订阅：带单层通配符（`+`）的模式 + 允许的（设备, key）集合。
///
/// 出站总线连接器的订阅名即发布主题（字面值）。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicSubscription {
    pub subscription_id: String,
    pub pattern: String,
    pub devices: Vec<BusDevice>,
}

impl TopicSubscription {
    pub fn find_device(&self, device_name: &str) -> Option<&BusDevice> {
        self.devices
            .iter()
            .find(|item| item.device_name == device_name)
    }
}

/// 总线端点配置
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BusSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub keepalive_secs: Option<u64>,
    pub subscriptions: Vec<TopicSubscription>,
}

/// 按连接器类型区分的强类型配置
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConnectorSettings {
    /// 寄存器轮询：设备与序列单独存放
    RegisterPoll,
    Bus(BusSettings),
    Http(HttpSettings),
}

impl ConnectorSettings {
    pub fn kind(&self) -> ConnectorKind {
        match self {
            Self::RegisterPoll => ConnectorKind::RegisterPoll,
            Self::Bus(_) => ConnectorKind::Bus,
            Self::Http(_) => ConnectorKind::Http,
        }
    }
}

/// 连接器记录
///
/// `interval` 与 `max_retained_samples` 保持配置存储中的原始字符串，
/// 通过 [`ConnectorRecord::interval_secs`] / [`ConnectorRecord::max_samples`] 解析。
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectorRecord {
    pub connector_id: String,
    pub gateway_id: String,
    pub name: String,
    pub direction: Direction,
    pub interval: String,
    pub max_retained_samples: String,
    pub status: Status,
    pub settings: ConnectorSettings,
}

impl ConnectorRecord {
    pub fn kind(&self) -> ConnectorKind {
        self.settings.kind()
    }

    pub fn is_inbound(&self) -> bool {
        self.direction == Direction::Inbound
    }

    pub fn interval_secs(&self) -> u64 {
        parse_interval_secs(&self.interval)
    }

    pub fn max_samples(&self) -> i64 {
        parse_max_samples(&self.max_retained_samples)
    }

    pub fn bus_settings(&self) -> Option<&BusSettings> {
        match &self.settings {
            ConnectorSettings::Bus(settings) => Some(settings),
            _ => None,
        }
    }
}

/// 解析轮询间隔（秒）。
///
/// 接受 `"60"` 或 `"60s"`；空值、非数字或 0 返回 [`DEFAULT_INTERVAL_SECS`]。
pub fn parse_interval_secs(raw: &str) -> u64 {
    let trimmed = raw.trim();
    let digits = trimmed.strip_suffix('s').unwrap_or(trimmed);
    match digits.parse::<u64>() {
        Ok(value) if value > 0 => value,
        _ => DEFAULT_INTERVAL_SECS,
    }
}

/// 解析最大保留样本数；`<= 0` 表示不裁剪，非数字回退为默认值。
pub fn parse_max_samples(raw: &str) -> i64 {
    raw.trim()
        .parse::<i64>()
        .unwrap_or(DEFAULT_MAX_RETAINED_SAMPLES)
}

/// 寄存器轮询设备
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceRecord {
    pub device_id: String,
    pub connector_id: String,
    pub name: String,
    pub host: String,
    pub port: u16,
    /// 从站 ID
    pub unit_id: u8,
    pub status: Status,
}

/// 寄存器序列
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesRecord {
    pub series_id: String,
    pub device_id: String,
    pub name: String,
    pub scale: f64,
    /// 寄存器地址列表，首个地址为读取起点
    pub addresses: Vec<u16>,
    pub data_type: DataType,
    pub byte_order: ByteOrder,
}

impl SeriesRecord {
    pub fn start_address(&self) -> Option<u16> {
        self.addresses.first().copied()
    }

    /// 需要读取的寄存器数量
    pub fn register_count(&self) -> u16 {
        self.data_type
            .register_count()
            .unwrap_or_else(|| self.addresses.len().clamp(1, 4) as u16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_defaults_when_invalid() {
        assert_eq!(parse_interval_secs("30"), 30);
        assert_eq!(parse_interval_secs(" 15s "), 15);
        assert_eq!(parse_interval_secs("abc"), 60);
        assert_eq!(parse_interval_secs(""), 60);
        assert_eq!(parse_interval_secs("0"), 60);
        assert_eq!(parse_interval_secs("-5"), 60);
    }

    #[test]
    fn max_samples_parses() {
        assert_eq!(parse_max_samples("250"), 250);
        assert_eq!(parse_max_samples("0"), 0);
        assert_eq!(parse_max_samples("x"), DEFAULT_MAX_RETAINED_SAMPLES);
    }

    #[test]
    fn fixed_point_width_follows_addresses() {
        let series = SeriesRecord {
            series_id: "s1".to_string(),
            device_id: "d1".to_string(),
            name: "energy".to_string(),
            scale: 1.0,
            addresses: vec![10, 11],
            data_type: DataType::Ufixed,
            byte_order: ByteOrder::default(),
        };
        assert_eq!(series.register_count(), 2);
        assert_eq!(series.start_address(), Some(10));
    }
}
