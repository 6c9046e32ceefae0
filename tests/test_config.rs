use std::collections::HashMap;
use std::time::Duration;

use feedback_aggregator::config::{Config, ConfigError, SinkConfig};

fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| vars.get(key).cloned()
}

const SINK_VARS: [(&str, &str); 3] = [
    ("FLUENTD_HOST", "fluentd.logging"),
    ("FLUENTD_PORT", "24224"),
    ("FLUENTD_TAG", "feedback"),
];

#[test]
fn test_config_default_address() {
    let cfg = Config::from_lookup(lookup(&SINK_VARS)).unwrap();

    assert_eq!(cfg.listen_addr, "0.0.0.0:8080");
    assert_eq!(cfg.sink, SinkConfig::new("fluentd.logging", 24224, "feedback"));
    assert_eq!(cfg.sink.address(), "fluentd.logging:24224");
    assert_eq!(cfg.sink.max_retry, 5);
}

#[test]
fn test_config_custom_address_and_retry() {
    let mut vars = SINK_VARS.to_vec();
    vars.push(("LISTEN", "127.0.0.1:3000"));
    vars.push(("FLUENTD_MAX_RETRY", "2"));

    let cfg = Config::from_lookup(lookup(&vars)).unwrap();

    assert_eq!(cfg.listen_addr, "127.0.0.1:3000");
    assert_eq!(cfg.sink.max_retry, 2);
}

#[test]
fn test_config_missing_sink_settings() {
    for missing in ["FLUENTD_HOST", "FLUENTD_PORT", "FLUENTD_TAG"] {
        let vars: Vec<_> = SINK_VARS.iter().copied().filter(|(k, _)| *k != missing).collect();

        match Config::from_lookup(lookup(&vars)) {
            Err(ConfigError::Missing(key)) => assert_eq!(key, missing),
            other => panic!("expected Missing({}), got {:?}", missing, other),
        }
    }
}

#[test]
fn test_config_empty_value_counts_as_missing() {
    let vars = [("FLUENTD_HOST", "  "), ("FLUENTD_PORT", "24224"), ("FLUENTD_TAG", "feedback")];

    assert!(matches!(
        Config::from_lookup(lookup(&vars)),
        Err(ConfigError::Missing("FLUENTD_HOST"))
    ));
}

#[test]
fn test_config_invalid_port() {
    for port in ["abc", "70000", "0", "-1"] {
        let vars = [("FLUENTD_HOST", "h"), ("FLUENTD_PORT", port), ("FLUENTD_TAG", "t")];

        assert!(
            matches!(
                Config::from_lookup(lookup(&vars)),
                Err(ConfigError::Invalid { key: "FLUENTD_PORT", .. })
            ),
            "port {:?} should be rejected",
            port
        );
    }
}

#[test]
fn test_config_from_yaml() {
    let cfg = Config::from_yaml_str(
        "listen_addr: 127.0.0.1:9000\n\
         sink:\n  host: collector\n  port: 24224\n  tag: model.feedback\n  max_retry: 1\n  write_timeout_ms: 250\n",
    )
    .unwrap();

    assert_eq!(cfg.listen_addr, "127.0.0.1:9000");
    assert_eq!(cfg.sink.tag, "model.feedback");
    assert_eq!(cfg.sink.max_retry, 1);
    assert_eq!(cfg.sink.write_timeout(), Duration::from_millis(250));
    assert_eq!(cfg.sink.retry_wait(), Duration::from_millis(500));
}

#[test]
fn test_config_yaml_is_validated() {
    let err = Config::from_yaml_str("sink:\n  host: collector\n  port: 24224\n").unwrap_err();

    assert!(matches!(err, ConfigError::Missing("FLUENTD_TAG")));
}

#[test]
fn test_config_yaml_syntax_error() {
    assert!(matches!(Config::from_yaml_str("sink: [unclosed"), Err(ConfigError::Yaml(_))));
}

#[test]
fn test_config_missing_file() {
    let err = Config::from_file("/nonexistent/feedback.yaml").unwrap_err();

    assert!(matches!(err, ConfigError::Io { .. }));
    assert!(err.to_string().contains("/nonexistent/feedback.yaml"));
}

#[test]
fn test_config_clone() {
    let cfg1 = Config::from_lookup(lookup(&SINK_VARS)).unwrap();
    let cfg2 = cfg1.clone();
    assert_eq!(cfg1, cfg2);
}
