use domain::SampleRecord;
use gw_storage::{InMemorySampleStore, RetentionScope, SampleStore};
use std::sync::Arc;

fn sample(series_id: &str, device_id: &str, key: &str, value: f64, ts_ms: i64) -> SampleRecord {
    SampleRecord {
        series_id: series_id.to_string(),
        device_id: device_id.to_string(),
        key: key.to_string(),
        value,
        ts_ms,
    }
}

#[tokio::test]
async fn retention_keeps_most_recent_by_timestamp() {
    let store = InMemorySampleStore::new();
    let scope = RetentionScope::Connector("connector-1".to_string());
    // 时间戳乱序写入
    let timestamps = [50, 10, 40, 20, 60, 30, 70, 5];
    let mut pruned_total = 0;
    for (index, ts) in timestamps.iter().enumerate() {
        pruned_total += store
            .append(&sample("s1", "d1", "v", index as f64, *ts), &scope, 3)
            .await
            .expect("append");
        assert!(store.count(&scope) <= 3);
    }
    assert_eq!(pruned_total, 5);

    let kept = store.list_samples(&scope, 0).await.expect("list");
    let kept_ts: Vec<i64> = kept.iter().map(|item| item.ts_ms).collect();
    assert_eq!(kept_ts, vec![70, 60, 50]);
}

#[tokio::test]
async fn retention_bound_holds_for_arbitrary_sequences() {
    let store = InMemorySampleStore::new();
    for max in [1i64, 2, 5, 17] {
        let scope = RetentionScope::Device(format!("device-{max}"));
        let mut all: Vec<i64> = Vec::new();
        // 线性同余序列生成伪随机时间戳
        let mut seed: i64 = 7 + max;
        for _ in 0..60 {
            seed = (seed * 1_103_515_245 + 12_345) % 2_147_483_648;
            let ts = seed % 1000;
            all.push(ts);
            store
                .append(&sample("s", "d", "k", 0.0, ts), &scope, max)
                .await
                .expect("append");
            assert!(store.count(&scope) as i64 <= max);
        }
        let mut expected = all.clone();
        expected.sort_unstable_by(|a, b| b.cmp(a));
        expected.truncate(max as usize);
        let kept: Vec<i64> = store
            .list_samples(&scope, 0)
            .await
            .expect("list")
            .iter()
            .map(|item| item.ts_ms)
            .collect();
        assert_eq!(kept, expected);
    }
}

#[tokio::test]
async fn equal_timestamps_prune_oldest_insert() {
    let store = InMemorySampleStore::new();
    let scope = RetentionScope::Device("d1".to_string());
    for value in 0..4 {
        store
            .append(&sample("s", "d1", "k", value as f64, 100), &scope, 2)
            .await
            .expect("append");
    }
    let kept: Vec<f64> = store
        .list_samples(&scope, 0)
        .await
        .expect("list")
        .iter()
        .map(|item| item.value)
        .collect();
    assert_eq!(kept, vec![3.0, 2.0]);
}

#[tokio::test]
async fn non_positive_max_disables_pruning() {
    let store = InMemorySampleStore::new();
    let scope = RetentionScope::Connector("c".to_string());
    for ts in 0..10 {
        let pruned = store
            .append(&sample("s", "d", "k", 1.0, ts), &scope, 0)
            .await
            .expect("append");
        assert_eq!(pruned, 0);
    }
    assert_eq!(store.count(&scope), 10);
}

#[tokio::test]
async fn scopes_are_bounded_independently() {
    let store = InMemorySampleStore::new();
    let a = RetentionScope::Connector("a".to_string());
    let b = RetentionScope::Connector("b".to_string());
    for ts in 0..5 {
        store.append(&sample("s", "d1", "k", 1.0, ts), &a, 2).await.expect("a");
        store.append(&sample("s", "d2", "k", 1.0, ts), &b, 4).await.expect("b");
    }
    assert_eq!(store.count(&a), 2);
    assert_eq!(store.count(&b), 4);
    assert_eq!(store.list_samples(&b, 1).await.expect("limit").len(), 1);
}

#[tokio::test]
async fn concurrent_appends_respect_bound() {
    let store = Arc::new(InMemorySampleStore::new());
    let scope = RetentionScope::Connector("shared".to_string());
    let mut handles = Vec::new();
    for writer in 0..8i64 {
        let store = store.clone();
        let scope = scope.clone();
        handles.push(tokio::spawn(async move {
            for index in 0..50i64 {
                store
                    .append(&sample("s", "d", "k", 0.0, writer * 1000 + index), &scope, 25)
                    .await
                    .expect("append");
            }
        }));
    }
    for handle in handles {
        handle.await.expect("join");
    }
    assert_eq!(store.count(&scope), 25);
}

#[tokio::test]
async fn latest_by_device_returns_newest_per_key() {
    let store = InMemorySampleStore::new();
    let scope = RetentionScope::Connector("c".to_string());
    store.append(&sample("s1", "d1", "voltage", 220.0, 10), &scope, 0).await.expect("1");
    store.append(&sample("s1", "d1", "voltage", 221.0, 20), &scope, 0).await.expect("2");
    store.append(&sample("s2", "d1", "current", 5.0, 15), &scope, 0).await.expect("3");
    store.append(&sample("s3", "d2", "voltage", 1.0, 30), &scope, 0).await.expect("4");

    let latest = store.latest_by_device("d1").await.expect("latest");
    assert_eq!(latest.len(), 2);
    let voltage = latest.iter().find(|item| item.key == "voltage").expect("voltage");
    assert_eq!(voltage.value, 221.0);
}
