//! 数据库连接管理
//!
//! - connect_pool：建立 Postgres 连接池
//! - apply_schema：创建数据面依赖的表（幂等）

use crate::error::StorageError;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// 数据面依赖的表结构
pub const SCHEMA_SQL: &str = include_str!("../schema/gateway.sql");

/// 建立 Postgres 连接池（最大连接数 8）
pub async fn connect_pool(database_url: &str) -> Result<PgPool, StorageError> {
    let pool = PgPoolOptions::new()
        .max_connections(8)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// 执行建表语句（`create ... if not exists`，可重复执行）
pub async fn apply_schema(pool: &PgPool) -> Result<(), StorageError> {
    sqlx::raw_sql(SCHEMA_SQL).execute(pool).await?;
    Ok(())
}
