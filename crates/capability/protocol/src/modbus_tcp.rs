//! Modbus TCP 客户端实现
//!
//! 按设备建立连接，读取保持寄存器。连接与读取都受超时约束，
//! 单台设备无响应不会阻塞整个轮询周期。
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! let reader = ModbusTcpReader::new(ModbusTcpConfig::default());
//! let mut session = reader.connect(&RegisterEndpoint::new("192.168.1.100", 502, 1)).await?;
//! let registers = session.read_holding(0, 2).await?;
//! ```

use crate::error::ProtocolError;
use crate::types::{MAX_READ_REGISTERS, RegisterEndpoint};
use crate::{RegisterReader, RegisterSession};
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::timeout;
use tokio_modbus::prelude::*;
use tracing::debug;

/// Modbus TCP 超时配置
#[derive(Debug, Clone, Copy)]
pub struct ModbusTcpConfig {
    /// 连接超时（毫秒）
    pub connect_timeout_ms: u64,
    /// 读取超时（毫秒）
    pub read_timeout_ms: u64,
}

impl Default for ModbusTcpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 3000,
            read_timeout_ms: 3000,
        }
    }
}

/// Modbus TCP 读取器
#[derive(Debug, Clone, Default)]
pub struct ModbusTcpReader {
    config: ModbusTcpConfig,
}

impl ModbusTcpReader {
    pub fn new(config: ModbusTcpConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl RegisterReader for ModbusTcpReader {
    async fn connect(
        &self,
        endpoint: &RegisterEndpoint,
    ) -> Result<Box<dyn RegisterSession>, ProtocolError> {
        let connect_timeout = Duration::from_millis(self.config.connect_timeout_ms);
        let connect = async {
            // 主机名需要先解析，tokio-modbus 只接受 SocketAddr
            let addr = tokio::net::lookup_host((endpoint.host.as_str(), endpoint.port))
                .await
                .map_err(|e| ProtocolError::Connection(format!("resolve {endpoint}: {e}")))?
                .next()
                .ok_or_else(|| {
                    ProtocolError::Connection(format!("no address for {endpoint}"))
                })?;
            tcp::connect_slave(addr, Slave(endpoint.unit_id))
                .await
                .map_err(|e| ProtocolError::Connection(format!("{endpoint}: {e}")))
        };
        let ctx = timeout(connect_timeout, connect)
            .await
            .map_err(|_| ProtocolError::Timeout(format!("connect {endpoint}")))??;

        debug!(endpoint = %endpoint, "modbus_connected");
        Ok(Box::new(ModbusTcpSession {
            ctx,
            endpoint: endpoint.clone(),
            read_timeout: Duration::from_millis(self.config.read_timeout_ms),
        }))
    }
}

/// 单台设备的 Modbus TCP 会话（丢弃即断开）
struct ModbusTcpSession {
    ctx: tokio_modbus::client::Context,
    endpoint: RegisterEndpoint,
    read_timeout: Duration,
}

#[async_trait]
impl RegisterSession for ModbusTcpSession {
    async fn read_holding(&mut self, address: u16, count: u16) -> Result<Vec<u16>, ProtocolError> {
        if count == 0 || count > MAX_READ_REGISTERS {
            return Err(ProtocolError::Config(format!(
                "invalid register count: {count}"
            )));
        }
        let registers = timeout(
            self.read_timeout,
            self.ctx.read_holding_registers(address, count),
        )
        .await
        .map_err(|_| ProtocolError::Timeout(format!("read {} @{address}", self.endpoint)))?
        .map_err(|e| ProtocolError::Connection(e.to_string()))?
        .map_err(|e| ProtocolError::Exception(format!("{e:?}")))?;

        debug!(
            endpoint = %self.endpoint,
            register = address,
            count,
            values = ?registers,
            "read_modbus_registers"
        );
        if registers.len() < usize::from(count) {
            return Err(ProtocolError::Decode(format!(
                "short response: expected {count} registers, got {}",
                registers.len()
            )));
        }
        Ok(registers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_to_closed_port_fails_fast() {
        // 绑定后立即释放，得到一个大概率无人监听的端口
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();
        drop(listener);

        let reader = ModbusTcpReader::new(ModbusTcpConfig {
            connect_timeout_ms: 500,
            read_timeout_ms: 500,
        });
        let result = reader
            .connect(&RegisterEndpoint::new("127.0.0.1", port, 1))
            .await;
        let err = result.err().expect("connect should fail");
        assert!(err.is_connection_failure());
    }
}
