//! 主题匹配
//!
//! 单层通配：模式与主题按 `/` 切分后段数必须相等，
//! `+` 段匹配任意单段，其余段逐字相等。

use domain::{BusDevice, TopicSubscription};

/// 判断主题是否匹配模式。
pub fn topic_matches(pattern: &str, topic: &str) -> bool {
    let mut pattern_segments = pattern.split('/');
    let mut topic_segments = topic.split('/');
    loop {
        match (pattern_segments.next(), topic_segments.next()) {
            (None, None) => return true,
            (Some("+"), Some(_)) => {}
            (Some(expected), Some(actual)) if expected == actual => {}
            _ => return false,
        }
    }
}

/// 主题 + 设备名在订阅列表中的匹配结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TopicMatch<'a> {
    /// 首个匹配主题且声明了该设备的订阅
    Matched {
        subscription: &'a TopicSubscription,
        device: &'a BusDevice,
    },
    /// 没有订阅匹配该主题
    UnmatchedTopic,
    /// 主题匹配，但没有任何匹配订阅声明该设备
    UndeclaredDevice,
}

/// 按声明顺序查找匹配主题且声明了 `node` 的订阅。
pub fn match_subscription<'a>(
    subscriptions: &'a [TopicSubscription],
    topic: &str,
    node: &str,
) -> TopicMatch<'a> {
    let mut topic_matched = false;
    for subscription in subscriptions {
        if !topic_matches(&subscription.pattern, topic) {
            continue;
        }
        topic_matched = true;
        if let Some(device) = subscription.find_device(node) {
            return TopicMatch::Matched {
                subscription,
                device,
            };
        }
    }
    if topic_matched {
        TopicMatch::UndeclaredDevice
    } else {
        TopicMatch::UnmatchedTopic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{BusKey, ValueType};

    #[test]
    fn single_level_wildcard() {
        assert!(topic_matches("sensor/+/data", "sensor/7/data"));
        assert!(!topic_matches("sensor/+/data", "sensor/7/8/data"));
        assert!(!topic_matches("sensor/+/data", "sensors/7/data"));
        assert!(!topic_matches("sensor/+/data", "sensor/7"));
        assert!(topic_matches("plant/line1", "plant/line1"));
        assert!(!topic_matches("plant/line1", "plant/line2"));
        assert!(topic_matches("+/+", "a/b"));
        assert!(topic_matches("+", ""));
        // `#` 不是通配符
        assert!(!topic_matches("sensor/#", "sensor/7/data"));
    }

    fn subscription(id: &str, pattern: &str, devices: &[&str]) -> TopicSubscription {
        TopicSubscription {
            subscription_id: id.to_string(),
            pattern: pattern.to_string(),
            devices: devices
                .iter()
                .map(|name| BusDevice {
                    device_id: format!("{id}-{name}"),
                    device_name: name.to_string(),
                    keys: vec![BusKey {
                        series_id: format!("{id}-{name}-temp"),
                        key: "temp".to_string(),
                        value_type: ValueType::Double,
                    }],
                })
                .collect(),
        }
    }

    #[test]
    fn first_declaring_subscription_wins() {
        let subscriptions = vec![
            subscription("s1", "site/+/data", &["pump"]),
            subscription("s2", "site/+/data", &["pump", "fan"]),
            subscription("s3", "site/a/data", &["fan"]),
        ];
        match match_subscription(&subscriptions, "site/a/data", "pump") {
            TopicMatch::Matched { subscription, .. } => assert_eq!(subscription.subscription_id, "s1"),
            other => panic!("unexpected {other:?}"),
        }
        match match_subscription(&subscriptions, "site/a/data", "fan") {
            TopicMatch::Matched { subscription, device } => {
                assert_eq!(subscription.subscription_id, "s2");
                assert_eq!(device.device_id, "s2-fan");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(
            match_subscription(&subscriptions, "site/a/data", "valve"),
            TopicMatch::UndeclaredDevice
        );
        assert_eq!(
            match_subscription(&subscriptions, "other/a/data", "pump"),
            TopicMatch::UnmatchedTopic
        );
    }
}
