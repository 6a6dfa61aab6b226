//! 到期表：连接器 ID → 下次可运行时间（毫秒）
//!
//! 调度与时钟解耦，由调用方传入当前时间。

use std::collections::{HashMap, HashSet};

#[derive(Debug, Default, Clone)]
pub struct DueTable {
    next_due: HashMap<String, i64>,
}

impl DueTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从未运行或已到期
    pub fn is_due(&self, connector_id: &str, now_ms: i64) -> bool {
        self.next_due
            .get(connector_id)
            .is_none_or(|due| now_ms >= *due)
    }

    /// 记录一次运行，下次到期时间 = 本次开始时间 + 间隔。
    pub fn mark_run(&mut self, connector_id: &str, now_ms: i64, interval_secs: u64) {
        let interval_ms = i64::try_from(interval_secs.saturating_mul(1000)).unwrap_or(i64::MAX);
        self.next_due
            .insert(connector_id.to_string(), now_ms.saturating_add(interval_ms));
    }

    pub fn next_due(&self, connector_id: &str) -> Option<i64> {
        self.next_due.get(connector_id).copied()
    }

    /// 删除已不存在的连接器
    pub fn retain(&mut self, live: &HashSet<String>) {
        self.next_due.retain(|id, _| live.contains(id));
    }

    pub fn len(&self) -> usize {
        self.next_due.len()
    }

    pub fn is_empty(&self) -> bool {
        self.next_due.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sixty_second_interval() {
        let mut table = DueTable::new();
        assert!(table.is_due("c1", 0));
        table.mark_run("c1", 0, 60);
        assert_eq!(table.next_due("c1"), Some(60_000));
        assert!(!table.is_due("c1", 30_000));
        assert!(table.is_due("c1", 60_000));
        assert!(table.is_due("c1", 61_000));
    }

    #[test]
    fn retain_drops_removed_connectors() {
        let mut table = DueTable::new();
        table.mark_run("c1", 0, 10);
        table.mark_run("c2", 0, 10);
        let live: HashSet<String> = ["c2".to_string()].into_iter().collect();
        table.retain(&live);
        assert_eq!(table.len(), 1);
        assert!(table.is_due("c1", 1));
        assert!(!table.is_due("c2", 1));
    }
}
