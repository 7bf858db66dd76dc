#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use wslink_client::config;

#[test]
fn deny_unknown_fields_nested() {
    let bad = r#"
version: 1
endpoint:
  url: "wss://backend.example/v1/link"
batching:
  batch_sise: 20 # typo should fail
"#;

    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.code().as_str(), "INVALID_CONFIG");
}

#[test]
fn ok_minimal_config() {
    let ok = r#"
version: 1
endpoint:
  url: "wss://backend.example/v1/link"
"#;
    let cfg = config::load_from_str(ok).expect("must parse");
    assert_eq!(cfg.version, 1);
    assert_eq!(cfg.batching.batch_size, 10);
    assert_eq!(cfg.batching.burst_or_default(), 100);
    assert_eq!(cfg.queue.capacity, 1000);
    assert_eq!(cfg.health.interval_ms, 30_000);
    assert!(!cfg.delivery.require_ack);
    assert!(cfg.diagnostics.listen.is_none());
}

#[test]
fn full_config() {
    let ok = r#"
version: 1
endpoint:
  url: "ws://127.0.0.1:9000/link"
  connect_timeout_ms: 2000
batching:
  batch_size: 25
  interval_ms: 20
  rate_limit_per_sec: 0
  burst: 50
queue:
  capacity: 64
  max_attempts: 5
health:
  interval_ms: 5000
  timeout_ms: 1000
reconnect:
  base_ms: 250
  max_ms: 10000
  jitter: 0.5
  max_retries: 4
delivery:
  require_ack: true
diagnostics:
  listen: "127.0.0.1:9100"
"#;
    let cfg = config::load_from_str(ok).expect("must parse");
    assert_eq!(cfg.batching.burst_or_default(), 50);
    assert_eq!(cfg.reconnect.max_retries, 4);
    assert!(cfg.delivery.require_ack);
    assert_eq!(cfg.diagnostics.listen.as_deref(), Some("127.0.0.1:9100"));
}

#[test]
fn rejects_out_of_range_values() {
    let cases = [
        "version: 2\nendpoint: { url: \"ws://x\" }\n",
        "version: 1\nendpoint: { url: \"http://x\" }\n",
        "version: 1\nendpoint: { url: \"ws://x\" }\nbatching: { batch_size: 0 }\n",
        "version: 1\nendpoint: { url: \"ws://x\" }\nhealth: { interval_ms: 10 }\n",
        "version: 1\nendpoint: { url: \"ws://x\" }\nreconnect: { base_ms: 5000, max_ms: 100 }\n",
        "version: 1\nendpoint: { url: \"ws://x\" }\nqueue: { max_attempts: 0 }\n",
    ];
    for case in cases {
        let err = config::load_from_str(case).expect_err(case);
        assert_eq!(err.code().as_str(), "INVALID_CONFIG", "{case}");
    }
}

#[test]
fn missing_endpoint_fails() {
    let err = config::load_from_str("version: 1\n").expect_err("must fail");
    assert_eq!(err.code().as_str(), "INVALID_CONFIG");
}
