use gw_config::AppConfig;

#[test]
fn load_config_from_env() {
    // Rust 2024 中 set_var 需要显式标注 unsafe（测试进程内可控）。
    unsafe {
        std::env::set_var("GW_HTTP_ADDR", "127.0.0.1:8081");
        std::env::set_var("GW_POLL_TICK_SECONDS", "2");
        std::env::set_var("GW_HTTP_TIMEOUT_MS", "2500");
        std::env::set_var("GW_ENGINE", "off");
    }

    let config = AppConfig::from_env().expect("config");
    assert_eq!(config.http_addr, "127.0.0.1:8081");
    assert_eq!(config.poll_tick_seconds, 2);
    assert_eq!(config.http_timeout_ms, 2500);
    assert!(!config.engine_enabled);
    assert_eq!(config.mqtt_backoff_initial_ms, 1000);
    assert_eq!(config.mqtt_backoff_max_ms, 60_000);
    assert_eq!(config.mqtt_alert_after_failures, 10);
    assert_eq!(config.gateway_name, "gateway");
    assert!(config.database_url.is_none());
}
