//! Postgres 配置存储实现
//!
//! 连接器的强类型配置拆分在 gw_connectors 的 bus_* / http_* 列，
//! 主题订阅及其白名单存放在 gw_topics / gw_topic_devices / gw_topic_keys。

use crate::error::StorageError;
use crate::traits::ConfigStore;
use domain::{
    BusDevice, BusKey, BusSettings, ByteOrder, ConnectorKind, ConnectorRecord, ConnectorSettings,
    DataType, DeviceRecord, Direction, GatewayRecord, HttpMethod, HttpSettings, SeriesRecord,
    Status, TopicSubscription, ValueType,
};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::collections::HashMap;

pub struct PgConfigStore {
    pub pool: PgPool,
}

impl PgConfigStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 通过数据库 URL 建立连接池
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = crate::connection::connect_pool(database_url).await?;
        Ok(Self { pool })
    }

    /// 在一个事务内替换网关的完整定义（拓扑导入）。
    pub async fn replace_gateway(
        &self,
        gateway: &GatewayRecord,
        connectors: &[ConnectorRecord],
        devices: &[DeviceRecord],
        series: &[SeriesRecord],
    ) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "insert into gw_gateways (gateway_id, name, status) values ($1, $2, $3) \
             on conflict (gateway_id) do update set name = excluded.name",
        )
        .bind(&gateway.gateway_id)
        .bind(&gateway.name)
        .bind(gateway.status.as_str())
        .execute(&mut *tx)
        .await?;
        sqlx::query("delete from gw_connectors where gateway_id = $1")
            .bind(&gateway.gateway_id)
            .execute(&mut *tx)
            .await?;

        for (position, connector) in connectors.iter().enumerate() {
            let (bus, http) = match &connector.settings {
                ConnectorSettings::RegisterPoll => (None, None),
                ConnectorSettings::Bus(settings) => (Some(settings), None),
                ConnectorSettings::Http(settings) => (None, Some(settings)),
            };
            sqlx::query(
                "insert into gw_connectors (connector_id, gateway_id, position, name, direction, \
                 kind, interval, max_retained_samples, status, bus_host, bus_port, bus_username, \
                 bus_password, bus_keepalive_secs, http_url, http_method) \
                 values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)",
            )
            .bind(&connector.connector_id)
            .bind(&connector.gateway_id)
            .bind(position as i32)
            .bind(&connector.name)
            .bind(connector.direction.as_str())
            .bind(connector.kind().as_str())
            .bind(&connector.interval)
            .bind(&connector.max_retained_samples)
            .bind(connector.status.as_str())
            .bind(bus.map(|b| b.host.clone()))
            .bind(bus.map(|b| i32::from(b.port)))
            .bind(bus.and_then(|b| b.username.clone()))
            .bind(bus.and_then(|b| b.password.clone()))
            .bind(bus.and_then(|b| b.keepalive_secs).map(|v| v as i64))
            .bind(http.map(|h| h.url.clone()))
            .bind(http.map(|h| h.method.as_str()))
            .execute(&mut *tx)
            .await?;

            let Some(bus) = bus else { continue };
            for (topic_position, subscription) in bus.subscriptions.iter().enumerate() {
                sqlx::query(
                    "insert into gw_topics (subscription_id, connector_id, position, pattern) \
                     values ($1, $2, $3, $4)",
                )
                .bind(&subscription.subscription_id)
                .bind(&connector.connector_id)
                .bind(topic_position as i32)
                .bind(&subscription.pattern)
                .execute(&mut *tx)
                .await?;
                for (device_position, device) in subscription.devices.iter().enumerate() {
                    sqlx::query(
                        "insert into gw_topic_devices (subscription_id, device_id, position, device_name) \
                         values ($1, $2, $3, $4)",
                    )
                    .bind(&subscription.subscription_id)
                    .bind(&device.device_id)
                    .bind(device_position as i32)
                    .bind(&device.device_name)
                    .execute(&mut *tx)
                    .await?;
                    for (key_position, key) in device.keys.iter().enumerate() {
                        sqlx::query(
                            "insert into gw_topic_keys (subscription_id, device_id, series_id, \
                             position, key, value_type) values ($1, $2, $3, $4, $5, $6)",
                        )
                        .bind(&subscription.subscription_id)
                        .bind(&device.device_id)
                        .bind(&key.series_id)
                        .bind(key_position as i32)
                        .bind(&key.key)
                        .bind(key.value_type.as_str())
                        .execute(&mut *tx)
                        .await?;
                    }
                }
            }
        }

        for (position, device) in devices.iter().enumerate() {
            sqlx::query(
                "insert into gw_devices (device_id, connector_id, position, name, host, port, \
                 unit_id, status) values ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(&device.device_id)
            .bind(&device.connector_id)
            .bind(position as i32)
            .bind(&device.name)
            .bind(&device.host)
            .bind(i32::from(device.port))
            .bind(i32::from(device.unit_id))
            .bind(device.status.as_str())
            .execute(&mut *tx)
            .await?;
        }

        for (position, item) in series.iter().enumerate() {
            let addresses = item
                .addresses
                .iter()
                .map(u16::to_string)
                .collect::<Vec<_>>()
                .join(",");
            sqlx::query(
                "insert into gw_series (series_id, device_id, position, name, scale, addresses, \
                 data_type, byte_order) values ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(&item.series_id)
            .bind(&item.device_id)
            .bind(position as i32)
            .bind(&item.name)
            .bind(item.scale)
            .bind(addresses)
            .bind(item.data_type.as_str())
            .bind(item.byte_order.letters())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn fetch_connectors(
        &self,
        gateway_id: Option<&str>,
        connector_id: Option<&str>,
    ) -> Result<Vec<ConnectorRecord>, StorageError> {
        let rows = sqlx::query(
            "select connector_id, gateway_id, name, direction, kind, interval, \
             max_retained_samples, status, bus_host, bus_port, bus_username, bus_password, \
             bus_keepalive_secs, http_url, http_method \
             from gw_connectors \
             where ($1::text is null or gateway_id = $1) \
             and ($2::text is null or connector_id = $2) \
             order by gateway_id, position, connector_id",
        )
        .bind(gateway_id)
        .bind(connector_id)
        .fetch_all(&self.pool)
        .await?;

        let mut subscriptions = self.fetch_subscriptions(gateway_id, connector_id).await?;
        let mut connectors = Vec::with_capacity(rows.len());
        for row in rows {
            let connector_id: String = row.try_get("connector_id")?;
            let settings = connector_settings(&row, subscriptions.remove(&connector_id))?;
            let direction: String = row.try_get("direction")?;
            let status: String = row.try_get("status")?;
            connectors.push(ConnectorRecord {
                connector_id,
                gateway_id: row.try_get("gateway_id")?,
                name: row.try_get("name")?,
                direction: if direction == Direction::Outbound.as_str() {
                    Direction::Outbound
                } else {
                    Direction::Inbound
                },
                interval: row.try_get("interval")?,
                max_retained_samples: row.try_get("max_retained_samples")?,
                status: Status::parse(&status),
                settings,
            });
        }
        Ok(connectors)
    }

    /// 读取主题订阅并按连接器分组（保持 position 顺序）。
    async fn fetch_subscriptions(
        &self,
        gateway_id: Option<&str>,
        connector_id: Option<&str>,
    ) -> Result<HashMap<String, Vec<TopicSubscription>>, StorageError> {
        let rows = sqlx::query(
            "select t.connector_id, t.subscription_id, t.pattern, \
             d.device_id, d.device_name, k.series_id, k.key, k.value_type \
             from gw_topics t \
             join gw_connectors c on c.connector_id = t.connector_id \
             left join gw_topic_devices d on d.subscription_id = t.subscription_id \
             left join gw_topic_keys k on k.subscription_id = d.subscription_id \
               and k.device_id = d.device_id \
             where ($1::text is null or c.gateway_id = $1) \
             and ($2::text is null or c.connector_id = $2) \
             order by t.connector_id, t.position, d.position, k.position",
        )
        .bind(gateway_id)
        .bind(connector_id)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<String, Vec<TopicSubscription>> = HashMap::new();
        for row in rows {
            let connector_id: String = row.try_get("connector_id")?;
            let subscription_id: String = row.try_get("subscription_id")?;
            let list = grouped.entry(connector_id).or_default();
            if list
                .last()
                .map(|item| item.subscription_id != subscription_id)
                .unwrap_or(true)
            {
                list.push(TopicSubscription {
                    subscription_id: subscription_id.clone(),
                    pattern: row.try_get("pattern")?,
                    devices: Vec::new(),
                });
            }
            let Some(subscription) = list.last_mut() else {
                continue;
            };

            let device_id: Option<String> = row.try_get("device_id")?;
            let Some(device_id) = device_id else { continue };
            if subscription
                .devices
                .last()
                .map(|item| item.device_id != device_id)
                .unwrap_or(true)
            {
                subscription.devices.push(BusDevice {
                    device_id: device_id.clone(),
                    device_name: row.try_get("device_name")?,
                    keys: Vec::new(),
                });
            }
            let Some(device) = subscription.devices.last_mut() else {
                continue;
            };

            let key: Option<String> = row.try_get("key")?;
            let Some(key) = key else { continue };
            let value_type: Option<String> = row.try_get("value_type")?;
            device.keys.push(BusKey {
                series_id: row.try_get::<Option<String>, _>("series_id")?.unwrap_or_default(),
                key,
                value_type: value_type.as_deref().map(ValueType::parse).unwrap_or_default(),
            });
        }
        Ok(grouped)
    }
}

fn connector_settings(
    row: &PgRow,
    subscriptions: Option<Vec<TopicSubscription>>,
) -> Result<ConnectorSettings, StorageError> {
    let kind: String = row.try_get("kind")?;
    let settings = match ConnectorKind::parse(&kind) {
        Some(ConnectorKind::RegisterPoll) => ConnectorSettings::RegisterPoll,
        Some(ConnectorKind::Bus) => {
            let port: Option<i32> = row.try_get("bus_port")?;
            let keepalive: Option<i64> = row.try_get("bus_keepalive_secs")?;
            ConnectorSettings::Bus(BusSettings {
                host: row
                    .try_get::<Option<String>, _>("bus_host")?
                    .unwrap_or_else(|| "127.0.0.1".to_string()),
                port: port.and_then(|p| u16::try_from(p).ok()).unwrap_or(1883),
                username: row.try_get("bus_username")?,
                password: row.try_get("bus_password")?,
                keepalive_secs: keepalive.and_then(|v| u64::try_from(v).ok()),
                subscriptions: subscriptions.unwrap_or_default(),
            })
        }
        Some(ConnectorKind::Http) => {
            let method: Option<String> = row.try_get("http_method")?;
            ConnectorSettings::Http(HttpSettings {
                url: row
                    .try_get::<Option<String>, _>("http_url")?
                    .unwrap_or_default(),
                method: method.as_deref().map(HttpMethod::parse).unwrap_or_default(),
            })
        }
        None => return Err(StorageError::new(format!("unknown connector kind: {kind}"))),
    };
    Ok(settings)
}

fn gateway_from_row(row: &PgRow) -> Result<GatewayRecord, StorageError> {
    let status: String = row.try_get("status")?;
    Ok(GatewayRecord {
        gateway_id: row.try_get("gateway_id")?,
        name: row.try_get("name")?,
        status: Status::parse(&status),
    })
}

#[async_trait::async_trait]
impl ConfigStore for PgConfigStore {
    async fn list_gateways(&self) -> Result<Vec<GatewayRecord>, StorageError> {
        let rows = sqlx::query("select gateway_id, name, status from gw_gateways order by name")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(gateway_from_row).collect()
    }

    async fn find_gateway(&self, gateway_id: &str) -> Result<Option<GatewayRecord>, StorageError> {
        let row = sqlx::query("select gateway_id, name, status from gw_gateways where gateway_id = $1")
            .bind(gateway_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(gateway_from_row).transpose()
    }

    async fn list_connectors(&self) -> Result<Vec<ConnectorRecord>, StorageError> {
        self.fetch_connectors(None, None).await
    }

    async fn list_gateway_connectors(
        &self,
        gateway_id: &str,
    ) -> Result<Vec<ConnectorRecord>, StorageError> {
        self.fetch_connectors(Some(gateway_id), None).await
    }

    async fn find_connector(
        &self,
        connector_id: &str,
    ) -> Result<Option<ConnectorRecord>, StorageError> {
        let mut items = self.fetch_connectors(None, Some(connector_id)).await?;
        Ok(items.pop())
    }

    async fn list_devices(&self, connector_id: &str) -> Result<Vec<DeviceRecord>, StorageError> {
        let rows = sqlx::query(
            "select device_id, connector_id, name, host, port, unit_id, status \
             from gw_devices where connector_id = $1 order by position, device_id",
        )
        .bind(connector_id)
        .fetch_all(&self.pool)
        .await?;
        let mut devices = Vec::with_capacity(rows.len());
        for row in rows {
            let port: i32 = row.try_get("port")?;
            let unit_id: i32 = row.try_get("unit_id")?;
            let status: String = row.try_get("status")?;
            devices.push(DeviceRecord {
                device_id: row.try_get("device_id")?,
                connector_id: row.try_get("connector_id")?,
                name: row.try_get("name")?,
                host: row.try_get("host")?,
                port: u16::try_from(port)
                    .map_err(|_| StorageError::new(format!("invalid device port: {port}")))?,
                unit_id: u8::try_from(unit_id)
                    .map_err(|_| StorageError::new(format!("invalid unit id: {unit_id}")))?,
                status: Status::parse(&status),
            });
        }
        Ok(devices)
    }

    async fn list_series(&self, device_id: &str) -> Result<Vec<SeriesRecord>, StorageError> {
        let rows = sqlx::query(
            "select series_id, device_id, name, scale, addresses, data_type, byte_order \
             from gw_series where device_id = $1 order by position, series_id",
        )
        .bind(device_id)
        .fetch_all(&self.pool)
        .await?;
        let mut series = Vec::with_capacity(rows.len());
        for row in rows {
            let addresses: String = row.try_get("addresses")?;
            let data_type: String = row.try_get("data_type")?;
            let byte_order: String = row.try_get("byte_order")?;
            series.push(SeriesRecord {
                series_id: row.try_get("series_id")?,
                device_id: row.try_get("device_id")?,
                name: row.try_get("name")?,
                scale: row.try_get("scale")?,
                addresses: addresses
                    .split(',')
                    .filter_map(|item| item.trim().parse::<u16>().ok())
                    .collect(),
                data_type: DataType::parse(&data_type).unwrap_or_default(),
                byte_order: ByteOrder::parse(&byte_order).unwrap_or_default(),
            });
        }
        Ok(series)
    }

    async fn set_gateway_status(
        &self,
        gateway_id: &str,
        status: Status,
    ) -> Result<bool, StorageError> {
        let result = sqlx::query("update gw_gateways set status = $2 where gateway_id = $1")
            .bind(gateway_id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_connector_status(
        &self,
        connector_id: &str,
        status: Status,
    ) -> Result<bool, StorageError> {
        let result = sqlx::query("update gw_connectors set status = $2 where connector_id = $1")
            .bind(connector_id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_device_status(
        &self,
        device_id: &str,
        status: Status,
    ) -> Result<bool, StorageError> {
        let result = sqlx::query("update gw_devices set status = $2 where device_id = $1")
            .bind(device_id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
