//! 状态与纯聚合规则
//!
//! - 设备：最近一次连接成功即 active
//! - 连接器：本周期至少一个设备 active（入站），或总线/HTTP 连接当前可用
//! - 网关：至少一个入站或出站连接器 active
//!
//! 无迟滞：状态只反映最近一次评估。

/// 活跃状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Status {
    Active,
    #[default]
    Inactive,
}

impl Status {
    pub fn from_active(active: bool) -> Self {
        if active { Self::Active } else { Self::Inactive }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }

    /// 解析存储中的状态字符串，未知值视为 inactive。
    pub fn parse(value: &str) -> Self {
        Self::from_active(value.trim().eq_ignore_ascii_case("active"))
    }
}

/// 由设备结果推导连接器状态。
pub fn connector_status(devices: &[Status]) -> Status {
    Status::from_active(devices.iter().any(Status::is_active))
}

/// 由入站、出站连接器状态推导网关状态。
pub fn gateway_status(inbound: &[Status], outbound: &[Status]) -> Status {
    Status::from_active(inbound.iter().chain(outbound.iter()).any(Status::is_active))
}
