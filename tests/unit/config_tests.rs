use std::io::Write;
use std::net::IpAddr;

use field_dispatch::{config::GlobalConfig, AppError};

fn sample_toml() -> &'static str {
    r#"
db_path = "dispatch.db"
http_host = "0.0.0.0"
http_port = 9000
recent_assignments_limit = 25

[realtime]
max_message_bytes = 4096

[routing]
average_speed_kmh = 45.0
"#
}

#[test]
fn parses_valid_config() {
    let config = GlobalConfig::from_toml_str(sample_toml()).expect("config parses");

    assert_eq!(config.db_path.to_str(), Some("dispatch.db"));
    assert_eq!(config.http_host, "0.0.0.0".parse::<IpAddr>().unwrap());
    assert_eq!(config.http_port, 9000);
    assert_eq!(config.recent_assignments_limit, 25);
    assert_eq!(config.realtime.max_message_bytes, 4096);
    assert!((config.routing.average_speed_kmh - 45.0).abs() < f64::EPSILON);
    assert!(config.api_token.is_none(), "api_token is never read from TOML");
    assert!(!config.uses_memory_db());
    assert_eq!(config.bind_addr().to_string(), "0.0.0.0:9000");
}

#[test]
fn minimal_config_uses_defaults() {
    let config = GlobalConfig::from_toml_str("db_path = \":memory:\"").expect("config parses");

    assert!(config.uses_memory_db());
    assert_eq!(config.bind_addr().to_string(), "127.0.0.1:8000");
    assert_eq!(config.recent_assignments_limit, 10);
    assert_eq!(config.realtime.max_message_bytes, 64 * 1024);
    assert!((config.routing.average_speed_kmh - 30.0).abs() < f64::EPSILON);
}

#[test]
fn api_token_in_toml_is_ignored() {
    let config = GlobalConfig::from_toml_str("db_path = \":memory:\"\napi_token = \"leak\"")
        .expect("config parses");
    assert!(config.api_token.is_none());
}

#[test]
fn missing_db_path_is_rejected() {
    let result = GlobalConfig::from_toml_str("http_port = 8000");
    assert!(matches!(result, Err(AppError::Config(_))));
}

#[test]
fn empty_db_path_is_rejected() {
    let result = GlobalConfig::from_toml_str("db_path = \"\"");
    assert!(matches!(result, Err(AppError::Config(msg)) if msg.contains("db_path")));
}

#[test]
fn zero_recent_limit_is_rejected() {
    let result =
        GlobalConfig::from_toml_str("db_path = \":memory:\"\nrecent_assignments_limit = 0");
    assert!(matches!(result, Err(AppError::Config(msg)) if msg.contains("recent_assignments_limit")));
}

#[test]
fn tiny_message_limit_is_rejected() {
    let result = GlobalConfig::from_toml_str(
        "db_path = \":memory:\"\n[realtime]\nmax_message_bytes = 16",
    );
    assert!(matches!(result, Err(AppError::Config(msg)) if msg.contains("max_message_bytes")));
}

#[test]
fn non_positive_speed_is_rejected() {
    for speed in ["0.0", "-5.0"] {
        let raw = format!("db_path = \":memory:\"\n[routing]\naverage_speed_kmh = {speed}");
        let result = GlobalConfig::from_toml_str(&raw);
        assert!(
            matches!(result, Err(AppError::Config(ref msg)) if msg.contains("average_speed_kmh")),
            "speed {speed} should be rejected"
        );
    }
}

#[test]
fn invalid_toml_is_a_config_error() {
    let result = GlobalConfig::from_toml_str("db_path = [");
    assert!(matches!(result, Err(AppError::Config(msg)) if msg.starts_with("invalid config")));
}

#[test]
fn loads_from_file() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(sample_toml().as_bytes()).expect("write config");

    let config = GlobalConfig::load_from_path(file.path()).expect("config loads");
    assert_eq!(config.http_port, 9000);
}

#[test]
fn missing_file_is_a_config_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let result = GlobalConfig::load_from_path(dir.path().join("absent.toml"));
    assert!(matches!(result, Err(AppError::Config(msg)) if msg.contains("failed to read config")));
}
