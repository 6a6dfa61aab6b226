//! 入站消息信封：`{"node": <设备名>, "timestamp": <epoch-ms>, "values": {<key>: <number>}}`

use crate::error::BridgeError;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// 解码后的入站消息
#[derive(Debug, Clone)]
pub struct InboundEnvelope {
    pub node: String,
    /// 缺省或无法表示为毫秒时由接收时间补齐
    pub timestamp: Option<i64>,
    pub values: BTreeMap<String, Value>,
}

/// 线上格式；时间戳字段按 `timestamp`、`timestamp_ms`、`ts` 顺序取第一个
#[derive(Deserialize)]
struct WireEnvelope {
    node: String,
    #[serde(default)]
    timestamp: Option<Value>,
    #[serde(default)]
    timestamp_ms: Option<Value>,
    #[serde(default)]
    ts: Option<Value>,
    #[serde(default)]
    values: BTreeMap<String, Value>,
}

impl InboundEnvelope {
    pub fn decode(payload: &[u8]) -> Result<Self, BridgeError> {
        let wire: WireEnvelope =
            serde_json::from_slice(payload).map_err(|err| BridgeError::Decode(err.to_string()))?;
        if wire.node.trim().is_empty() {
            return Err(BridgeError::Decode("node is empty".to_string()));
        }
        let timestamp = [wire.timestamp, wire.timestamp_ms, wire.ts]
            .into_iter()
            .flatten()
            .find(|value| !value.is_null())
            .and_then(|value| epoch_ms(&value));
        Ok(Self {
            node: wire.node,
            timestamp,
            values: wire.values,
        })
    }
}

/// 整数原样；浮点向零截断，非有限或超出 i64 范围返回 `None`。
fn epoch_ms(value: &Value) -> Option<i64> {
    let Value::Number(number) = value else {
        return None;
    };
    if let Some(ms) = number.as_i64() {
        return Some(ms);
    }
    let ms = number.as_f64()?.trunc();
    (ms.is_finite() && ms >= i64::MIN as f64 && ms < i64::MAX as f64).then_some(ms as i64)
}

/// 把 JSON 值转为数值：数字原样，布尔为 1/0，数字字符串解析；其余返回 `None`。
pub fn numeric_value(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(number) => number.as_f64()?,
        Value::Bool(flag) => {
            if *flag {
                1.0
            } else {
                0.0
            }
        }
        Value::String(text) => text.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    number.is_finite().then_some(number)
}
