//! Postgres 样本存储实现
//!
//! 插入与裁剪在同一事务内执行，并以保留范围为键取事务级 advisory lock，
//! 并发写入同一范围时上限依然成立。

use crate::error::StorageError;
use crate::traits::{RetentionScope, SampleStore};
use domain::SampleRecord;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

pub struct PgSampleStore {
    pub pool: PgPool,
}

impl PgSampleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = crate::connection::connect_pool(database_url).await?;
        Ok(Self { pool })
    }
}

fn sample_from_row(row: &PgRow) -> Result<SampleRecord, StorageError> {
    Ok(SampleRecord {
        series_id: row.try_get("series_id")?,
        device_id: row.try_get("device_id")?,
        key: row.try_get("key")?,
        value: row.try_get("value")?,
        ts_ms: row.try_get("ts_ms")?,
    })
}

#[async_trait::async_trait]
impl SampleStore for PgSampleStore {
    async fn append(
        &self,
        sample: &SampleRecord,
        scope: &RetentionScope,
        max_samples: i64,
    ) -> Result<u64, StorageError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("select pg_advisory_xact_lock(hashtext($1 || ':' || $2))")
            .bind(scope.kind())
            .bind(scope.id())
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "insert into gw_samples (scope_kind, scope_id, series_id, device_id, key, value, ts_ms) \
             values ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(scope.kind())
        .bind(scope.id())
        .bind(&sample.series_id)
        .bind(&sample.device_id)
        .bind(&sample.key)
        .bind(sample.value)
        .bind(sample.ts_ms)
        .execute(&mut *tx)
        .await?;

        let mut pruned = 0;
        if max_samples > 0 {
            let result = sqlx::query(
                "delete from gw_samples where id in ( \
                   select id from gw_samples \
                   where scope_kind = $1 and scope_id = $2 \
                   order by ts_ms desc, id desc \
                   offset $3)",
            )
            .bind(scope.kind())
            .bind(scope.id())
            .bind(max_samples)
            .execute(&mut *tx)
            .await?;
            pruned = result.rows_affected();
        }
        tx.commit().await?;
        Ok(pruned)
    }

    async fn list_samples(
        &self,
        scope: &RetentionScope,
        limit: i64,
    ) -> Result<Vec<SampleRecord>, StorageError> {
        let rows = sqlx::query(
            "select series_id, device_id, key, value, ts_ms from gw_samples \
             where scope_kind = $1 and scope_id = $2 \
             order by ts_ms desc, id desc \
             limit case when $3 > 0 then $3 else null end",
        )
        .bind(scope.kind())
        .bind(scope.id())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(sample_from_row).collect()
    }

    async fn latest_by_device(&self, device_id: &str) -> Result<Vec<SampleRecord>, StorageError> {
        let rows = sqlx::query(
            "select distinct on (key) series_id, device_id, key, value, ts_ms \
             from gw_samples where device_id = $1 \
             order by key, ts_ms desc, id desc",
        )
        .bind(device_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(sample_from_row).collect()
    }
}
