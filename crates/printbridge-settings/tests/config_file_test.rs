use printbridge_settings::{Config, ConfigError, SettingsError};
use tempfile::TempDir;

fn customized() -> Config {
    let mut config = Config::new();
    config.connection.port = "/dev/ttyUSB1".to_string();
    config.connection.baud_rate = 250_000;
    config.streaming.numbering.max_line_number = 99;
    config.streaming.link.error_completes_immediately = true;
    config.streaming.flow_control.enabled = false;
    config.upload.print_after_upload = true;
    config.upload.chunk_size = 1024;
    config
}

#[test]
fn test_toml_file_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");

    let config = customized();
    config.save_to_file(&path).unwrap();
    let loaded = Config::load_from_file(&path).unwrap();
    assert_eq!(loaded, config);

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("[streaming.numbering]"));
}

#[test]
fn test_json_file_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");

    let config = customized();
    config.save_to_file(&path).unwrap();
    assert_eq!(Config::load_from_file(&path).unwrap(), config);
}

#[test]
fn test_save_creates_parent_directories() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("printbridge").join("nested").join("config.toml");

    Config::new().save_to_file(&path).unwrap();
    assert!(path.exists());
}

#[test]
fn test_load_or_default_without_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("missing.toml");
    assert_eq!(Config::load_or_default(&path).unwrap(), Config::default());
}

#[test]
fn test_load_rejects_invalid_values() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[connection]\nbaud_rate = 0\n").unwrap();

    assert!(matches!(
        Config::load_from_file(&path),
        Err(SettingsError::InvalidSetting { ref key, .. }) if key == "connection.baud_rate"
    ));
}

#[test]
fn test_load_reports_malformed_files() {
    let dir = TempDir::new().unwrap();

    let toml_path = dir.path().join("config.toml");
    std::fs::write(&toml_path, "[connection\nport = ").unwrap();
    assert!(matches!(
        Config::load_from_file(&toml_path),
        Err(SettingsError::TomlError(_))
    ));

    let json_path = dir.path().join("config.json");
    std::fs::write(&json_path, "{ \"connection\": ").unwrap();
    assert!(matches!(
        Config::load_from_file(&json_path),
        Err(SettingsError::JsonError(_))
    ));
}

#[test]
fn test_unsupported_format_is_refused() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.yaml");

    assert!(matches!(
        Config::new().save_to_file(&path),
        Err(SettingsError::Config(ConfigError::UnsupportedFormat(_)))
    ));
    assert!(!path.exists());
}

#[test]
fn test_invalid_config_is_not_saved() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");

    let mut config = Config::new();
    config.upload.chunk_size = 0;
    assert!(config.save_to_file(&path).is_err());
    assert!(!path.exists());
}
