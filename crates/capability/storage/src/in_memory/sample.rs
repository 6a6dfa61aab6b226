//! 样本内存存储实现
//!
//! 每个保留范围一个按（时间戳降序, 写入序号降序）排列的向量，
//! 写入与裁剪在同一把写锁内完成。

use crate::error::StorageError;
use crate::traits::{RetentionScope, SampleStore};
use domain::SampleRecord;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

struct StoredSample {
    seq: u64,
    sample: SampleRecord,
}

#[derive(Default)]
struct SampleState {
    next_seq: u64,
    scopes: HashMap<RetentionScope, Vec<StoredSample>>,
}

/// 样本内存存储
#[derive(Default)]
pub struct InMemorySampleStore {
    state: RwLock<SampleState>,
}

impl InMemorySampleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 保留范围内的样本数（用于测试）
    pub fn count(&self, scope: &RetentionScope) -> usize {
        self.state
            .read()
            .map(|state| state.scopes.get(scope).map(Vec::len).unwrap_or(0))
            .unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl SampleStore for InMemorySampleStore {
    async fn append(
        &self,
        sample: &SampleRecord,
        scope: &RetentionScope,
        max_samples: i64,
    ) -> Result<u64, StorageError> {
        let mut state = self.state.write().map_err(|_| StorageError::lock_failed())?;
        let seq = state.next_seq;
        state.next_seq += 1;
        let rows = state.scopes.entry(scope.clone()).or_default();

        // 新行的序号最大，同时间戳时排在最前
        let position = rows
            .iter()
            .position(|row| row.sample.ts_ms <= sample.ts_ms)
            .unwrap_or(rows.len());
        rows.insert(
            position,
            StoredSample {
                seq,
                sample: sample.clone(),
            },
        );

        if max_samples <= 0 {
            return Ok(0);
        }
        let max = usize::try_from(max_samples).unwrap_or(usize::MAX);
        if rows.len() <= max {
            return Ok(0);
        }
        let pruned = rows.len() - max;
        rows.truncate(max);
        Ok(pruned as u64)
    }

    async fn list_samples(
        &self,
        scope: &RetentionScope,
        limit: i64,
    ) -> Result<Vec<SampleRecord>, StorageError> {
        let state = self.state.read().map_err(|_| StorageError::lock_failed())?;
        let Some(rows) = state.scopes.get(scope) else {
            return Ok(Vec::new());
        };
        let take = if limit <= 0 {
            rows.len()
        } else {
            usize::try_from(limit).unwrap_or(usize::MAX)
        };
        Ok(rows.iter().take(take).map(|row| row.sample.clone()).collect())
    }

    async fn latest_by_device(&self, device_id: &str) -> Result<Vec<SampleRecord>, StorageError> {
        let state = self.state.read().map_err(|_| StorageError::lock_failed())?;
        let mut latest: BTreeMap<&str, &StoredSample> = BTreeMap::new();
        for row in state.scopes.values().flatten() {
            if row.sample.device_id != device_id {
                continue;
            }
            let newer = match latest.get(row.sample.key.as_str()) {
                None => true,
                Some(current) => {
                    (row.sample.ts_ms, row.seq) > (current.sample.ts_ms, current.seq)
                }
            };
            if newer {
                latest.insert(row.sample.key.as_str(), row);
            }
        }
        Ok(latest.into_values().map(|row| row.sample.clone()).collect())
    }
}
