//! 引擎运行配置加载（环境变量）与拓扑文件导入。

use std::env;

pub mod topology;

pub use topology::{Topology, TopologyError};

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env: {0}")]
    Missing(String),
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

/// 引擎运行配置。
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http_addr: String,
    /// 未设置时使用内存存储
    pub database_url: Option<String>,
    /// 内存配置存储的拓扑种子文件
    pub topology_file: Option<String>,
    pub gateway_name: String,
    pub engine_enabled: bool,
    pub poll_tick_seconds: u64,
    pub modbus_connect_timeout_ms: u64,
    pub modbus_read_timeout_ms: u64,
    pub http_timeout_ms: u64,
    pub mqtt_keepalive_seconds: u64,
    pub mqtt_backoff_initial_ms: u64,
    pub mqtt_backoff_max_ms: u64,
    pub mqtt_alert_after_failures: u32,
    pub supervise_seconds: u64,
}

impl AppConfig {
    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        let http_addr = env::var("GW_HTTP_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let database_url = read_optional("GW_DATABASE_URL");
        let topology_file = read_optional("GW_TOPOLOGY_FILE");
        let gateway_name = read_optional("GW_GATEWAY_NAME").unwrap_or_else(|| "gateway".to_string());
        let engine_enabled = read_bool_with_default("GW_ENGINE", true);
        let poll_tick_seconds = read_positive_u64("GW_POLL_TICK_SECONDS", 5)?;
        let modbus_connect_timeout_ms = read_positive_u64("GW_MODBUS_CONNECT_TIMEOUT_MS", 3000)?;
        let modbus_read_timeout_ms = read_positive_u64("GW_MODBUS_READ_TIMEOUT_MS", 3000)?;
        let http_timeout_ms = read_positive_u64("GW_HTTP_TIMEOUT_MS", 10_000)?;
        let mqtt_keepalive_seconds = read_positive_u64("GW_MQTT_KEEPALIVE_SECONDS", 60)?;
        let mqtt_backoff_initial_ms = read_positive_u64("GW_MQTT_BACKOFF_INITIAL_MS", 1000)?;
        let mqtt_backoff_max_ms = read_positive_u64("GW_MQTT_BACKOFF_MAX_MS", 60_000)?;
        if mqtt_backoff_max_ms < mqtt_backoff_initial_ms {
            return Err(ConfigError::Invalid(
                "GW_MQTT_BACKOFF_MAX_MS".to_string(),
                mqtt_backoff_max_ms.to_string(),
            ));
        }
        let mqtt_alert_after_failures = read_u32_with_default("GW_MQTT_ALERT_AFTER_FAILURES", 10)?;
        let supervise_seconds = read_positive_u64("GW_SUPERVISE_SECONDS", 30)?;

        Ok(Self {
            http_addr,
            database_url,
            topology_file,
            gateway_name,
            engine_enabled,
            poll_tick_seconds,
            modbus_connect_timeout_ms,
            modbus_read_timeout_ms,
            http_timeout_ms,
            mqtt_keepalive_seconds,
            mqtt_backoff_initial_ms,
            mqtt_backoff_max_ms,
            mqtt_alert_after_failures,
            supervise_seconds,
        })
    }
}

fn read_u64_with_default(key: &str, default: u64) -> Result<u64, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

/// 读取正整数；0 视为非法（定时器周期不能为 0）。
fn read_positive_u64(key: &str, default: u64) -> Result<u64, ConfigError> {
    let value = read_u64_with_default(key, default)?;
    if value == 0 {
        return Err(ConfigError::Invalid(key.to_string(), "0".to_string()));
    }
    Ok(value)
}

fn read_u32_with_default(key: &str, default: u32) -> Result<u32, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .trim()
        .parse::<u32>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => None,
    }
}

fn read_bool_with_default(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(value) => matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "on"),
        Err(_) => default,
    }
}
