//! 拓扑文件导入
//!
//! 接受类 Telegraf 的 JSON（`inputs.modbus` / `inputs.mqtt` / `outputs.mqtt` / `outputs.rest`），
//! 生成一个网关下的连接器、设备与序列记录。
//!
//! 同名的 modbus 输入合并为一个连接器下的多个设备。
//! 所有 ID 为由名称派生的 UUID v5，重复导入保持不变。

use std::collections::BTreeMap;
use std::path::Path;

use domain::{
    BusDevice, BusKey, BusSettings, ByteOrder, ConnectorRecord, ConnectorSettings, DataType,
    DEFAULT_MAX_RETAINED_SAMPLES, DeviceRecord, Direction, GatewayRecord, HttpMethod, HttpSettings,
    SeriesRecord, Status, TopicSubscription, ValueType,
};
use serde::Deserialize;
use uuid::Uuid;

const DEFAULT_MODBUS_PORT: u16 = 502;
const DEFAULT_MQTT_PORT: u16 = 1883;
const DEFAULT_INTERVAL: &str = "60";

/// 拓扑导入错误。
#[derive(Debug, thiserror::Error)]
pub enum TopologyError {
    #[error("topology io error: {0}")]
    Io(String),
    #[error("topology json error: {0}")]
    Json(String),
    #[error("invalid topology field {field}: {message}")]
    Invalid { field: String, message: String },
}

impl TopologyError {
    fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// 一个网关的完整拓扑快照。
#[derive(Debug, Clone)]
pub struct Topology {
    pub gateway: GatewayRecord,
    pub connectors: Vec<ConnectorRecord>,
    pub devices: Vec<DeviceRecord>,
    pub series: Vec<SeriesRecord>,
}

impl Topology {
    /// 读取并解析拓扑文件。
    pub fn from_file(gateway_name: &str, path: impl AsRef<Path>) -> Result<Self, TopologyError> {
        let raw = std::fs::read_to_string(path.as_ref())
            .map_err(|err| TopologyError::Io(format!("{}: {err}", path.as_ref().display())))?;
        Self::from_json(gateway_name, &raw)
    }

    /// 解析拓扑 JSON。
    pub fn from_json(gateway_name: &str, raw: &str) -> Result<Self, TopologyError> {
        let document: RawDocument =
            serde_json::from_str(raw).map_err(|err| TopologyError::Json(err.to_string()))?;
        let gateway_name = gateway_name.trim();
        if gateway_name.is_empty() {
            return Err(TopologyError::invalid("gateway", "name is empty"));
        }
        let gateway_id = derive_id(&format!("gateway/{gateway_name}"));
        let mut builder = Builder {
            gateway_id: gateway_id.clone(),
            connectors: Vec::new(),
            devices: Vec::new(),
            series: Vec::new(),
        };

        builder.modbus_inputs(&document.inputs.modbus)?;
        for (index, input) in document.inputs.mqtt.iter().enumerate() {
            builder.mqtt(input, Direction::Inbound, index)?;
        }
        for (index, output) in document.outputs.mqtt.iter().enumerate() {
            builder.mqtt(output, Direction::Outbound, index)?;
        }
        for (index, output) in document.outputs.rest.iter().enumerate() {
            builder.rest(output, index)?;
        }

        Ok(Self {
            gateway: GatewayRecord {
                gateway_id,
                name: gateway_name.to_string(),
                status: Status::Inactive,
            },
            connectors: builder.connectors,
            devices: builder.devices,
            series: builder.series,
        })
    }
}

struct Builder {
    gateway_id: String,
    connectors: Vec<ConnectorRecord>,
    devices: Vec<DeviceRecord>,
    series: Vec<SeriesRecord>,
}

impl Builder {
    fn connector_id(&self, direction: Direction, kind: &str, name: &str) -> String {
        derive_id(&format!(
            "{}/{}/{kind}/{name}",
            self.gateway_id,
            direction.as_str()
        ))
    }

    fn modbus_inputs(&mut self, inputs: &[RawModbusInput]) -> Result<(), TopologyError> {
        // 按名称分组，保持首次出现的顺序
        let mut order: Vec<String> = Vec::new();
        let mut groups: BTreeMap<String, Vec<&RawModbusInput>> = BTreeMap::new();
        for (index, input) in inputs.iter().enumerate() {
            let name = non_empty(input.name.as_deref())
                .map(str::to_string)
                .unwrap_or_else(|| format!("modbus-{index}"));
            if !groups.contains_key(&name) {
                order.push(name.clone());
            }
            groups.entry(name).or_default().push(input);
        }

        for name in order {
            let Some(group) = groups.get(&name) else {
                continue;
            };
            let connector_id = self.connector_id(Direction::Inbound, "register_poll", &name);
            let interval = group
                .iter()
                .find_map(|input| input.interval.as_ref().map(RawScalar::render))
                .unwrap_or_else(|| DEFAULT_INTERVAL.to_string());
            let max_retained_samples = group
                .iter()
                .find_map(|input| input.max_retained_samples.as_ref().map(RawScalar::render))
                .unwrap_or_else(|| DEFAULT_MAX_RETAINED_SAMPLES.to_string());

            for input in group {
                self.modbus_device(&connector_id, &name, input)?;
            }

            self.connectors.push(ConnectorRecord {
                connector_id,
                gateway_id: self.gateway_id.clone(),
                name,
                direction: Direction::Inbound,
                interval,
                max_retained_samples,
                status: Status::Inactive,
                settings: ConnectorSettings::RegisterPoll,
            });
        }
        Ok(())
    }

    fn modbus_device(
        &mut self,
        connector_id: &str,
        connector_name: &str,
        input: &RawModbusInput,
    ) -> Result<(), TopologyError> {
        let (Some(tag_id), Some(device_name)) = (
            non_empty(input.tags.device_id.as_deref()),
            non_empty(input.tags.device_name.as_deref()),
        ) else {
            // 缺少设备标签的输入只生成连接器
            return Ok(());
        };
        let field = format!("inputs.modbus[{connector_name}].controller");
        let (host, port) = parse_endpoint(input.controller.as_deref(), DEFAULT_MODBUS_PORT, &field)?;
        let device_id = derive_id(&format!("{connector_id}/device/{tag_id}"));
        if self.devices.iter().any(|device| device.device_id == device_id) {
            return Err(TopologyError::invalid(
                format!("inputs.modbus[{connector_name}].tags.device_id"),
                format!("duplicate device {tag_id}"),
            ));
        }
        let unit_id = match input.slave_id {
            None => 1,
            Some(value) => u8::try_from(value).map_err(|_| {
                TopologyError::invalid(
                    format!("inputs.modbus[{connector_name}].slave_id"),
                    format!("{value} out of range"),
                )
            })?,
        };

        for register in &input.holding_registers {
            let series_field = format!("inputs.modbus[{connector_name}].holding_registers");
            let name = non_empty(register.name.as_deref())
                .ok_or_else(|| TopologyError::invalid(&series_field, "name is empty"))?;
            let data_type = match non_empty(register.data_type.as_deref()) {
                None => DataType::default(),
                Some(raw) => DataType::parse(raw).ok_or_else(|| {
                    TopologyError::invalid(
                        format!("{series_field}[{name}].data_type"),
                        format!("unsupported {raw}"),
                    )
                })?,
            };
            let byte_order = match non_empty(register.byte_order.as_deref()) {
                None => ByteOrder::big_endian(),
                Some(raw) => ByteOrder::parse(raw).ok_or_else(|| {
                    TopologyError::invalid(
                        format!("{series_field}[{name}].byte_order"),
                        format!("unsupported {raw}"),
                    )
                })?,
            };
            if register.address.is_empty() {
                return Err(TopologyError::invalid(
                    format!("{series_field}[{name}].address"),
                    "no register address",
                ));
            }
            self.series.push(SeriesRecord {
                series_id: derive_id(&format!("{device_id}/series/{name}")),
                device_id: device_id.clone(),
                name: name.to_string(),
                scale: register.scale.unwrap_or(1.0),
                addresses: register.address.clone(),
                data_type,
                byte_order,
            });
        }

        self.devices.push(DeviceRecord {
            device_id,
            connector_id: connector_id.to_string(),
            name: device_name.to_string(),
            host,
            port,
            unit_id,
            status: Status::Inactive,
        });
        Ok(())
    }

    fn mqtt(
        &mut self,
        raw: &RawMqtt,
        direction: Direction,
        index: usize,
    ) -> Result<(), TopologyError> {
        let name = non_empty(raw.name.as_deref())
            .map(str::to_string)
            .unwrap_or_else(|| format!("mqtt-{}-{index}", direction.as_str()));
        let connector_id = self.connector_id(direction, "bus", &name);
        let field = format!("{}.mqtt[{name}].servers", section(direction));
        let (host, port) = parse_endpoint(
            raw.servers.first().map(String::as_str),
            DEFAULT_MQTT_PORT,
            &field,
        )?;

        let mut subscriptions = Vec::new();
        let mut patterns: Vec<(String, Vec<RawBusDevice>)> = Vec::new();
        if let Some(topic) = non_empty(raw.topic.as_deref()) {
            patterns.push((topic.to_string(), Vec::new()));
        }
        for topic in &raw.topics {
            match topic {
                RawTopic::Name(pattern) => {
                    if let Some(pattern) = non_empty(Some(pattern)) {
                        patterns.push((pattern.to_string(), Vec::new()));
                    }
                }
                RawTopic::Detailed { name, devices } => {
                    let pattern = non_empty(Some(name)).ok_or_else(|| {
                        TopologyError::invalid(
                            format!("{}.mqtt[{name}].topics", section(direction)),
                            "topic name is empty",
                        )
                    })?;
                    patterns.push((pattern.to_string(), devices.clone()));
                }
            }
        }
        for (pattern, devices) in patterns {
            let subscription_id = derive_id(&format!("{connector_id}/topic/{pattern}"));
            let devices = devices
                .iter()
                .filter_map(|device| {
                    let device_name = non_empty(Some(&device.device_name))?;
                    let device_id = non_empty(device.device_id.as_deref())
                        .map(str::to_string)
                        .unwrap_or_else(|| {
                            derive_id(&format!("{subscription_id}/device/{device_name}"))
                        });
                    let keys = device
                        .keys
                        .iter()
                        .filter_map(|key| {
                            let name = non_empty(Some(&key.key))?;
                            Some(BusKey {
                                series_id: derive_id(&format!("{device_id}/key/{name}")),
                                key: name.to_string(),
                                value_type: key
                                    .value_type
                                    .as_deref()
                                    .map(ValueType::parse)
                                    .unwrap_or_default(),
                            })
                        })
                        .collect();
                    Some(BusDevice {
                        device_id,
                        device_name: device_name.to_string(),
                        keys,
                    })
                })
                .collect();
            subscriptions.push(TopicSubscription {
                subscription_id,
                pattern,
                devices,
            });
        }

        self.connectors.push(ConnectorRecord {
            connector_id,
            gateway_id: self.gateway_id.clone(),
            name,
            direction,
            interval: raw
                .interval
                .as_ref()
                .map(RawScalar::render)
                .unwrap_or_else(|| DEFAULT_INTERVAL.to_string()),
            max_retained_samples: raw
                .max_retained_samples
                .as_ref()
                .map(RawScalar::render)
                .unwrap_or_else(|| DEFAULT_MAX_RETAINED_SAMPLES.to_string()),
            status: Status::Inactive,
            settings: ConnectorSettings::Bus(BusSettings {
                host,
                port,
                username: non_empty(raw.username.as_deref()).map(str::to_string),
                password: non_empty(raw.password.as_deref()).map(str::to_string),
                keepalive_secs: raw.keepalive,
                subscriptions,
            }),
        });
        Ok(())
    }

    fn rest(&mut self, raw: &RawRest, index: usize) -> Result<(), TopologyError> {
        let name = non_empty(raw.name.as_deref())
            .map(str::to_string)
            .unwrap_or_else(|| format!("rest-{index}"));
        let url = non_empty(raw.url.as_deref()).ok_or_else(|| {
            TopologyError::invalid(format!("outputs.rest[{name}].url"), "url is empty")
        })?;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(TopologyError::invalid(
                format!("outputs.rest[{name}].url"),
                format!("unsupported scheme in {url}"),
            ));
        }
        let connector_id = self.connector_id(Direction::Outbound, "http", &name);
        self.connectors.push(ConnectorRecord {
            connector_id,
            gateway_id: self.gateway_id.clone(),
            name,
            direction: Direction::Outbound,
            interval: raw
                .interval
                .as_ref()
                .map(RawScalar::render)
                .unwrap_or_else(|| DEFAULT_INTERVAL.to_string()),
            max_retained_samples: DEFAULT_MAX_RETAINED_SAMPLES.to_string(),
            status: Status::Inactive,
            settings: ConnectorSettings::Http(HttpSettings {
                url: url.to_string(),
                method: raw
                    .method
                    .as_deref()
                    .map(HttpMethod::parse)
                    .unwrap_or_default(),
            }),
        });
        Ok(())
    }
}

fn section(direction: Direction) -> &'static str {
    match direction {
        Direction::Inbound => "inputs",
        Direction::Outbound => "outputs",
    }
}

/// 由名称路径派生确定性 ID。
fn derive_id(path: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, path.as_bytes()).to_string()
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

/// 解析 `tcp://host:port`；缺省端口取 `default_port`，缺省地址取 127.0.0.1。
fn parse_endpoint(
    raw: Option<&str>,
    default_port: u16,
    field: &str,
) -> Result<(String, u16), TopologyError> {
    let Some(raw) = non_empty(raw) else {
        return Ok(("127.0.0.1".to_string(), default_port));
    };
    let Some(rest) = raw.strip_prefix("tcp://") else {
        return Ok(("127.0.0.1".to_string(), default_port));
    };
    let rest = rest.trim_end_matches('/');
    match rest.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse::<u16>()
                .map_err(|_| TopologyError::invalid(field, format!("invalid port in {raw}")))?;
            if host.is_empty() {
                return Err(TopologyError::invalid(field, format!("missing host in {raw}")));
            }
            Ok((host.to_string(), port))
        }
        None if rest.is_empty() => Err(TopologyError::invalid(field, format!("missing host in {raw}"))),
        None => Ok((rest.to_string(), default_port)),
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawDocument {
    #[serde(default)]
    inputs: RawInputs,
    #[serde(default)]
    outputs: RawOutputs,
}

#[derive(Debug, Default, Deserialize)]
struct RawInputs {
    #[serde(default)]
    modbus: Vec<RawModbusInput>,
    #[serde(default)]
    mqtt: Vec<RawMqtt>,
}

#[derive(Debug, Default, Deserialize)]
struct RawOutputs {
    #[serde(default)]
    mqtt: Vec<RawMqtt>,
    #[serde(default)]
    rest: Vec<RawRest>,
}

/// 配置中既可能是字符串也可能是数字的字段（`"60s"` / `60`）。
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawScalar {
    Text(String),
    Number(serde_json::Number),
}

impl RawScalar {
    fn render(&self) -> String {
        match self {
            Self::Text(value) => value.clone(),
            Self::Number(value) => value.to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawModbusInput {
    name: Option<String>,
    controller: Option<String>,
    slave_id: Option<u32>,
    interval: Option<RawScalar>,
    max_retained_samples: Option<RawScalar>,
    #[serde(default)]
    tags: RawTags,
    #[serde(default)]
    holding_registers: Vec<RawRegister>,
}

#[derive(Debug, Default, Deserialize)]
struct RawTags {
    device_id: Option<String>,
    device_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawRegister {
    name: Option<String>,
    scale: Option<f64>,
    #[serde(default)]
    address: Vec<u16>,
    byte_order: Option<String>,
    data_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawMqtt {
    name: Option<String>,
    #[serde(default)]
    servers: Vec<String>,
    username: Option<String>,
    password: Option<String>,
    keepalive: Option<u64>,
    interval: Option<RawScalar>,
    max_retained_samples: Option<RawScalar>,
    topic: Option<String>,
    #[serde(default)]
    topics: Vec<RawTopic>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawTopic {
    Name(String),
    Detailed {
        name: String,
        #[serde(default)]
        devices: Vec<RawBusDevice>,
    },
}

#[derive(Debug, Clone, Deserialize)]
struct RawBusDevice {
    device_name: String,
    device_id: Option<String>,
    #[serde(default)]
    keys: Vec<RawBusKey>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawBusKey {
    key: String,
    #[serde(rename = "type")]
    value_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawRest {
    name: Option<String>,
    url: Option<String>,
    method: Option<String>,
    interval: Option<RawScalar>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_defaults() {
        assert_eq!(
            parse_endpoint(Some("tcp://10.0.0.5:1502"), 502, "f").expect("endpoint"),
            ("10.0.0.5".to_string(), 1502)
        );
        assert_eq!(
            parse_endpoint(Some("tcp://plc.local"), 502, "f").expect("endpoint"),
            ("plc.local".to_string(), 502)
        );
        assert_eq!(
            parse_endpoint(None, 1883, "f").expect("endpoint"),
            ("127.0.0.1".to_string(), 1883)
        );
        assert!(parse_endpoint(Some("tcp://host:notaport"), 502, "f").is_err());
    }

    #[test]
    fn derived_ids_are_stable() {
        assert_eq!(derive_id("gateway/a"), derive_id("gateway/a"));
        assert_ne!(derive_id("gateway/a"), derive_id("gateway/b"));
    }
}
