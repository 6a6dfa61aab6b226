//! 总线链路：每个总线连接器一个长期任务
//!
//! 维护 MQTT 会话，入站连接器在每次 ConnAck 后重新订阅全部模式；
//! 连接错误按指数退避重试，连续失败达到阈值时告警一次，之后继续重试。

use crate::backoff::ReconnectBackoff;
use crate::bridge::BusMessageHandler;
use crate::error::BridgeError;
use crate::publisher::{MqttPublisher, PublisherRegistry};
use domain::{BusSettings, ConnectorRecord};
use gw_status::StatusTracker;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS, SubscribeFilter, SubscribeReasonCode};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// 链路参数
#[derive(Debug, Clone)]
pub struct BusLinkConfig {
    /// 连接器未配置 keepalive 时使用
    pub default_keepalive_secs: u64,
    pub backoff_initial: Duration,
    pub backoff_max: Duration,
    /// 连续失败多少次后告警（0 表示不告警）
    pub alert_after_failures: u32,
    pub publish_timeout: Duration,
}

impl Default for BusLinkConfig {
    fn default() -> Self {
        Self {
            default_keepalive_secs: 60,
            backoff_initial: Duration::from_millis(1000),
            backoff_max: Duration::from_millis(60_000),
            alert_after_failures: 10,
            publish_timeout: Duration::from_secs(5),
        }
    }
}

/// 链路共享依赖
#[derive(Clone)]
pub struct BusLinkContext {
    pub handler: BusMessageHandler,
    pub tracker: StatusTracker,
    pub publishers: PublisherRegistry,
}

const MIN_KEEPALIVE_SECS: u64 = 5;
const REQUEST_CAPACITY: usize = 10;

/// 启动总线链路任务；连接器不是总线类型时返回配置错误。
pub fn spawn_bus_link(
    connector: ConnectorRecord,
    context: BusLinkContext,
    config: BusLinkConfig,
    cancel: CancellationToken,
) -> Result<JoinHandle<()>, BridgeError> {
    let settings = connector.bus_settings().cloned().ok_or_else(|| {
        BridgeError::Configuration(format!(
            "connector {} is not a bus connector",
            connector.connector_id
        ))
    })?;

    let client_id = format!("gw-{}", &uuid::Uuid::new_v4().simple().to_string()[..16]);
    let mut options = MqttOptions::new(client_id.clone(), settings.host.clone(), settings.port);
    let keepalive = settings
        .keepalive_secs
        .unwrap_or(config.default_keepalive_secs)
        .max(MIN_KEEPALIVE_SECS);
    options.set_keep_alive(Duration::from_secs(keepalive));
    options.set_clean_session(true);
    if let Some((username, password)) = credentials(&settings) {
        options.set_credentials(username, password);
    }

    let (client, mut eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
    let connected = Arc::new(AtomicBool::new(false));
    context.publishers.register(
        &connector.connector_id,
        Arc::new(MqttPublisher::new(
            client.clone(),
            connected.clone(),
            config.publish_timeout,
        )),
    );

    let filters: Vec<SubscribeFilter> = if connector.is_inbound() {
        settings
            .subscriptions
            .iter()
            .map(|item| SubscribeFilter::new(item.pattern.clone(), QoS::AtMostOnce))
            .collect()
    } else {
        Vec::new()
    };

    info!(
        target: "gw.bridge",
        connector_id = %connector.connector_id,
        host = %settings.host,
        port = settings.port,
        client_id = %client_id,
        subscriptions = filters.len(),
        "bus_link_start"
    );

    let handle = tokio::spawn(async move {
        let mut backoff = ReconnectBackoff::new(
            config.backoff_initial,
            config.backoff_max,
            config.alert_after_failures,
        );
        let mut last_state: Option<bool> = None;

        loop {
            let event = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                event = eventloop.poll() => event,
            };
            match event {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    connected.store(true, Ordering::Release);
                    backoff.reset();
                    info!(
                        target: "gw.bridge",
                        connector_id = %connector.connector_id,
                        "bus_link_connected"
                    );
                    if !filters.is_empty() {
                        if let Err(err) = client.try_subscribe_many(filters.clone()) {
                            warn!(
                                target: "gw.bridge",
                                connector_id = %connector.connector_id,
                                error = %err,
                                "bus_subscribe_failed"
                            );
                        }
                    }
                    update_state(&context.tracker, &connector, &mut last_state, true).await;
                }
                Ok(Event::Incoming(Packet::SubAck(ack))) => {
                    let failed = ack
                        .return_codes
                        .iter()
                        .filter(|code| matches!(code, SubscribeReasonCode::Failure))
                        .count();
                    if failed > 0 {
                        warn!(
                            target: "gw.bridge",
                            connector_id = %connector.connector_id,
                            failed,
                            "bus_subscribe_rejected"
                        );
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    if connector.is_inbound() {
                        context
                            .handler
                            .handle(&connector, &publish.topic, &publish.payload)
                            .await;
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    connected.store(false, Ordering::Release);
                    gw_telemetry::record_bus_reconnect();
                    let delay = backoff.on_failure();
                    warn!(
                        target: "gw.bridge",
                        connector_id = %connector.connector_id,
                        error = %err,
                        failures = backoff.failures(),
                        retry_in_ms = delay.as_millis() as u64,
                        "bus_link_error"
                    );
                    if backoff.should_alert() {
                        error!(
                            target: "gw.bridge",
                            connector_id = %connector.connector_id,
                            host = %settings.host,
                            port = settings.port,
                            failures = backoff.failures(),
                            "bus_link_unreachable"
                        );
                    }
                    update_state(&context.tracker, &connector, &mut last_state, false).await;
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => break,
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        connected.store(false, Ordering::Release);
        context.publishers.remove(&connector.connector_id);
        if let Err(err) = client.try_disconnect() {
            debug!(target: "gw.bridge", error = %err, "bus_disconnect_skipped");
        }
        update_state(&context.tracker, &connector, &mut last_state, false).await;
        info!(
            target: "gw.bridge",
            connector_id = %connector.connector_id,
            "bus_link_stopped"
        );
    });
    Ok(handle)
}

/// 配置了用户名就发送凭据，缺省密码为空串。
fn credentials(settings: &BusSettings) -> Option<(String, String)> {
    let username = settings.username.clone()?;
    Some((username, settings.password.clone().unwrap_or_default()))
}

/// 只在连接状态变化时写回连接器与网关状态。
async fn update_state(
    tracker: &StatusTracker,
    connector: &ConnectorRecord,
    last_state: &mut Option<bool>,
    open: bool,
) {
    if *last_state == Some(open) {
        return;
    }
    *last_state = Some(open);
    tracker
        .connection_state(&connector.connector_id, open)
        .await;
    tracker.refresh_gateway(&connector.gateway_id).await;
}
