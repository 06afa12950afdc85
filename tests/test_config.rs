use std::collections::HashMap;
use std::time::Duration;

use porthole::config::{DEFAULT_PORT, ServerOptions};
use porthole::http::response::OverridePolicy;

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key: &str| vars.get(key).cloned()
}

#[test]
fn test_config_defaults() {
    let options = ServerOptions::default();

    assert_eq!(options.port, DEFAULT_PORT);
    assert!(!options.bind_to_localhost);
    assert!(!options.ipv6);
    assert_eq!(options.override_policy, OverridePolicy::HeaderOnly);
    assert_eq!(options.request_timeout(), None);
}

#[cfg(not(any(target_os = "ios", target_os = "android")))]
#[test]
fn test_config_desktop_default_port() {
    assert_eq!(DEFAULT_PORT, 8080);
}

#[test]
fn test_config_load_without_variables_uses_defaults() {
    let options = ServerOptions::load_from(lookup(&[])).unwrap();
    assert_eq!(options, ServerOptions::default());
}

#[test]
fn test_config_port_and_localhost_from_env() {
    let options = ServerOptions::load_from(lookup(&[
        ("PORTHOLE_PORT", "3000"),
        ("PORTHOLE_BIND_LOCALHOST", "true"),
    ]))
    .unwrap();

    assert_eq!(options.port, 3000);
    assert!(options.bind_to_localhost);
}

#[test]
fn test_config_invalid_port_is_an_error() {
    let result = ServerOptions::load_from(lookup(&[("PORTHOLE_PORT", "eighty")]));
    assert!(result.is_err());
}

#[test]
fn test_config_from_yaml() {
    let yaml = r#"
port: 9000
bind_to_localhost: true
override_policy: pass_through
request_timeout_ms: 1500
"#;
    let options = ServerOptions::from_yaml_str(yaml).unwrap();

    assert_eq!(options.port, 9000);
    assert!(options.bind_to_localhost);
    assert_eq!(options.override_policy, OverridePolicy::PassThrough);
    assert_eq!(options.request_timeout(), Some(Duration::from_millis(1500)));
    // Unset keys keep their defaults.
    assert_eq!(options.body_chunk_size, ServerOptions::default().body_chunk_size);
}

#[test]
fn test_config_rejects_unknown_policy() {
    assert!(ServerOptions::from_yaml_str("override_policy: sometimes").is_err());
}

#[test]
fn test_config_rejects_zero_chunk_size() {
    assert!(ServerOptions::from_yaml_str("body_chunk_size: 0").is_err());
}

#[test]
fn test_config_file_then_env_override() {
    let path = std::env::temp_dir().join(format!("porthole-test-{}.yaml", std::process::id()));
    std::fs::write(&path, "port: 7000\nipv6: true\n").unwrap();

    let options = ServerOptions::load_from(lookup(&[
        ("PORTHOLE_CONFIG", path.to_str().unwrap()),
        ("PORTHOLE_PORT", "7001"),
    ]))
    .unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(options.port, 7001);
    assert!(options.ipv6);
}

#[test]
fn test_config_missing_file_is_an_error() {
    let result = ServerOptions::load_from(lookup(&[(
        "PORTHOLE_CONFIG",
        "/nonexistent/porthole.yaml",
    )]));
    assert!(result.is_err());
}

#[test]
fn test_config_load_reads_process_environment() {
    unsafe {
        std::env::set_var("PORTHOLE_PORT", "5000");
    }
    let options = ServerOptions::load().unwrap();
    unsafe {
        std::env::remove_var("PORTHOLE_PORT");
    }
    assert_eq!(options.port, 5000);
}

#[test]
fn test_config_clone() {
    let cfg1 = ServerOptions::with_port(1234);
    let cfg2 = cfg1.clone();
    assert_eq!(cfg1, cfg2);
}
