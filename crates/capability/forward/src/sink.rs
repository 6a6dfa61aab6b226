//! 出站目标
//!
//! 负载一律是 JSON 对象；HTTP 目标按方法发送 body 或查询参数，
//! 总线目标发布到连接器每个订阅的字面主题。

use crate::error::ForwardError;
use async_trait::async_trait;
use domain::{BusSettings, HttpMethod, HttpSettings};
use gw_ingest::PublisherRegistry;
use serde_json::Value;
use tracing::debug;

/// 出站目标接口
#[async_trait]
pub trait Sink: Send + Sync {
    async fn deliver(&self, payload: &Value) -> Result<(), ForwardError>;
}

/// HTTP 目标
pub struct HttpSink {
    client: reqwest::Client,
    settings: HttpSettings,
}

impl HttpSink {
    pub fn new(client: reqwest::Client, settings: HttpSettings) -> Self {
        Self { client, settings }
    }
}

#[async_trait]
impl Sink for HttpSink {
    async fn deliver(&self, payload: &Value) -> Result<(), ForwardError> {
        let request = match self.settings.method {
            HttpMethod::Post => self.client.post(&self.settings.url).json(payload),
            HttpMethod::Get => self.client.get(&self.settings.url).query(&query_pairs(payload)?),
        };
        let response = request.send().await?;
        let status = response.status();
        debug!(
            target: "gw.forward",
            url = %self.settings.url,
            method = self.settings.method.as_str(),
            status = status.as_u16(),
            "http_sink_response"
        );
        if status.is_success() {
            Ok(())
        } else {
            Err(ForwardError::Status(status.as_u16()))
        }
    }
}

/// 顶层字段转为查询参数：标量原样，嵌套对象/数组编码为 JSON 字符串。
pub fn query_pairs(payload: &Value) -> Result<Vec<(String, String)>, ForwardError> {
    let Value::Object(fields) = payload else {
        return Err(ForwardError::Payload("payload must be a JSON object".to_string()));
    };
    let pairs = fields
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| {
            let text = match value {
                Value::String(text) => text.clone(),
                Value::Number(number) => number.to_string(),
                Value::Bool(flag) => flag.to_string(),
                nested => nested.to_string(),
            };
            (key.clone(), text)
        })
        .collect();
    Ok(pairs)
}

/// 总线目标：通过链路注册的发布器发布
pub struct BusSink {
    connector_id: String,
    topics: Vec<String>,
    publishers: PublisherRegistry,
}

impl BusSink {
    pub fn new(connector_id: &str, settings: &BusSettings, publishers: PublisherRegistry) -> Self {
        Self {
            connector_id: connector_id.to_string(),
            topics: settings
                .subscriptions
                .iter()
                .map(|item| item.pattern.clone())
                .collect(),
            publishers,
        }
    }
}

#[async_trait]
impl Sink for BusSink {
    async fn deliver(&self, payload: &Value) -> Result<(), ForwardError> {
        if self.topics.is_empty() {
            return Err(ForwardError::Configuration(format!(
                "bus sink {} has no topics",
                self.connector_id
            )));
        }
        let publisher = self.publishers.get(&self.connector_id).ok_or_else(|| {
            ForwardError::Connection(format!("no bus link for {}", self.connector_id))
        })?;
        let body =
            serde_json::to_vec(payload).map_err(|err| ForwardError::Payload(err.to_string()))?;
        for topic in &self.topics {
            publisher.publish(topic, body.clone()).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_fields_are_json_encoded() {
        let mut pairs = query_pairs(&json!({
            "gateway": "gw",
            "count": 3,
            "values": {"t": 1.5},
            "skip": null,
        }))
        .expect("pairs");
        pairs.sort();
        assert_eq!(
            pairs,
            vec![
                ("count".to_string(), "3".to_string()),
                ("gateway".to_string(), "gw".to_string()),
                ("values".to_string(), r#"{"t":1.5}"#.to_string()),
            ]
        );
        assert!(query_pairs(&json!([1, 2])).is_err());
    }
}
