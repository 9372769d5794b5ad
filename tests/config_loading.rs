use std::io::Write;

use lobbyflow_core::config::AppConfig;
use lobbyflow_core::error::LobbyflowError;

#[test]
fn test_load_full_config_from_file() {
    let toml_content = r#"
[backend]
server_url = "https://visitors.example.com/api"
auth_token = "dev-token-1"
timeout_secs = 10

[engine]
max_node_visits = 8
save_executions = false
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");

    let backend = config.backend.expect("backend present");
    assert_eq!(backend.server_url, "https://visitors.example.com/api");
    assert_eq!(backend.auth_token, Some("dev-token-1".to_string()));
    assert_eq!(backend.timeout_secs, 10);
    assert_eq!(config.engine.max_node_visits, 8);
    assert!(!config.engine.save_executions);
}

#[test]
fn test_env_var_token() {
    std::env::set_var("LOBBYFLOW_IT_DEVICE_TOKEN", "from-env");
    let toml_content = r#"
[backend]
server_url = "http://localhost:8000"
auth_token = "${LOBBYFLOW_IT_DEVICE_TOKEN}"
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");
    let backend = config.backend.expect("backend present");
    assert_eq!(backend.auth_token.as_deref(), Some("from-env"));
    assert_eq!(backend.timeout_secs, 30);
}

#[test]
fn test_engine_defaults_without_section() {
    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(b"[backend]\nserver_url = \"http://localhost:8000\"\n")
        .expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");
    assert_eq!(config.engine.max_node_visits, 5);
    assert!(config.engine.save_executions);
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let err = AppConfig::load(&dir.path().join("nope.toml")).unwrap_err();
    assert!(matches!(err, LobbyflowError::ConfigNotFound(_)));
}

#[test]
fn test_backend_requires_server_url() {
    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(b"[backend]\nauth_token = \"x\"\n").expect("write toml");

    let err = AppConfig::load(tmp.path()).unwrap_err();
    assert!(matches!(err, LobbyflowError::Config(_)));
}
