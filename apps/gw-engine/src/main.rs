//! 网关数据面引擎：加载配置与存储，启动编排器与只读监控 API。

mod handlers;
mod middleware;
mod orchestrator;
mod routes;
mod utils;

use gw_config::{AppConfig, Topology};
use gw_protocol::{ModbusTcpConfig, ModbusTcpReader};
use gw_storage::{
    ConfigStore, InMemoryConfigStore, InMemorySampleStore, PgConfigStore, PgSampleStore,
    SampleStore, apply_schema, connect_pool,
};
use gw_telemetry::init_tracing;
use orchestrator::{EngineSettings, Orchestrator, join_task};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub config_store: Arc<dyn ConfigStore>,
    pub sample_store: Arc<dyn SampleStore>,
    pub orchestrator: Arc<Orchestrator>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;
    init_tracing();

    let (config_store, sample_store) = build_stores(&config).await?;
    let reader = Arc::new(ModbusTcpReader::new(ModbusTcpConfig {
        connect_timeout_ms: config.modbus_connect_timeout_ms,
        read_timeout_ms: config.modbus_read_timeout_ms,
    }));
    let orchestrator = Arc::new(Orchestrator::new(
        config_store.clone(),
        sample_store.clone(),
        reader,
        EngineSettings::from(&config),
    )?);

    let shutdown = CancellationToken::new();
    let supervisor = if config.engine_enabled {
        let loops = orchestrator.start().await?;
        info!(target: "gw.engine", loops, "engine_enabled");
        Some(
            orchestrator
                .clone()
                .supervise(Duration::from_secs(config.supervise_seconds), shutdown.clone()),
        )
    } else {
        info!(target: "gw.engine", "engine_disabled");
        None
    };

    let state = AppState {
        config_store,
        sample_store,
        orchestrator: orchestrator.clone(),
    };
    let app = routes::create_api_router(state);
    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    info!(target: "gw.engine", addr = %config.http_addr, "http_listening");

    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(target: "gw.engine", error = %err, "signal_listen_failed");
            }
            signal.cancel();
        })
        .await?;

    shutdown.cancel();
    if let Some(handle) = supervisor {
        join_task("supervisor", handle).await;
    }
    let joined = orchestrator.stop().await;
    info!(target: "gw.engine", joined, "shutdown_complete");
    Ok(())
}

/// 按配置选择存储：有数据库地址时使用 Postgres，否则使用内存存储；
/// 指定拓扑文件时导入到配置存储。
async fn build_stores(
    config: &AppConfig,
) -> Result<(Arc<dyn ConfigStore>, Arc<dyn SampleStore>), Box<dyn std::error::Error>> {
    let topology = match &config.topology_file {
        Some(path) => Some(Topology::from_file(&config.gateway_name, path)?),
        None => None,
    };

    if let Some(database_url) = &config.database_url {
        let pool = connect_pool(database_url).await?;
        apply_schema(&pool).await?;
        let config_store = PgConfigStore::new(pool.clone());
        if let Some(topology) = &topology {
            config_store
                .replace_gateway(
                    &topology.gateway,
                    &topology.connectors,
                    &topology.devices,
                    &topology.series,
                )
                .await?;
            log_import(topology);
        }
        return Ok((Arc::new(config_store), Arc::new(PgSampleStore::new(pool))));
    }

    let config_store = InMemoryConfigStore::new();
    match topology {
        Some(topology) => {
            log_import(&topology);
            config_store.replace_gateway(
                topology.gateway,
                topology.connectors,
                topology.devices,
                topology.series,
            )?;
        }
        None => warn!(target: "gw.engine", "in_memory_store_without_topology"),
    }
    Ok((
        Arc::new(config_store),
        Arc::new(InMemorySampleStore::new()),
    ))
}

fn log_import(topology: &Topology) {
    info!(
        target: "gw.engine",
        gateway = %topology.gateway.name,
        connectors = topology.connectors.len(),
        devices = topology.devices.len(),
        series = topology.series.len(),
        "topology_imported"
    );
}
