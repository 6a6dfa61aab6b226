//! 重连退避：指数增长到上限，连续失败达到阈值时告警一次。

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ReconnectBackoff {
    initial: Duration,
    max: Duration,
    alert_after: u32,
    current: Duration,
    failures: u32,
}

impl ReconnectBackoff {
    pub fn new(initial: Duration, max: Duration, alert_after: u32) -> Self {
        let initial = initial.max(Duration::from_millis(1));
        Self {
            initial,
            max: max.max(initial),
            alert_after,
            current: initial,
            failures: 0,
        }
    }

    /// 记录一次失败，返回下一次重试前的等待时间。
    pub fn on_failure(&mut self) -> Duration {
        self.failures = self.failures.saturating_add(1);
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        delay
    }

    /// 恰好在连续失败次数达到阈值时返回 true（阈值为 0 时从不告警）。
    pub fn should_alert(&self) -> bool {
        self.alert_after > 0 && self.failures == self.alert_after
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
        self.failures = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_until_cap_and_resets() {
        let mut backoff =
            ReconnectBackoff::new(Duration::from_millis(100), Duration::from_millis(350), 3);
        assert_eq!(backoff.on_failure(), Duration::from_millis(100));
        assert_eq!(backoff.on_failure(), Duration::from_millis(200));
        assert!(!backoff.should_alert());
        assert_eq!(backoff.on_failure(), Duration::from_millis(350));
        assert!(backoff.should_alert());
        assert_eq!(backoff.on_failure(), Duration::from_millis(350));
        assert!(!backoff.should_alert());

        backoff.reset();
        assert_eq!(backoff.failures(), 0);
        assert_eq!(backoff.on_failure(), Duration::from_millis(100));
    }
}
