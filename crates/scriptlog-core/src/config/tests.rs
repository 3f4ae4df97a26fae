use super::*;
use crate::errors::ConfigError;
use serial_test::serial;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::NamedTempFile;

fn clear_overrides() {
    std::env::remove_var(ENV_ENGINE_PATH);
    std::env::remove_var(ENV_TIMEOUT_SECS);
    std::env::remove_var(ENV_SETTINGS_PATH);
}

#[test]
#[serial]
fn test_empty_document_yields_defaults() {
    clear_overrides();
    let config = ConfigLoader::from_str("").unwrap();

    assert_eq!(config.bot.command_prefix, "!");
    assert_eq!(config.bot.log_command, "log");
    assert_eq!(config.engine.binary, "lune");
    assert_eq!(config.engine.args, vec!["run".to_string()]);
    assert_eq!(
        config.engine.entry_script,
        PathBuf::from("src").join("code_reconstructor_advanced.lua")
    );
    assert_eq!(config.engine.timeout(), Duration::from_secs(30));
    assert_eq!(config.output.inline_threshold, 1900);
    assert_eq!(config.settings.path, PathBuf::from("bot_settings.json"));
    assert_eq!(config.gateway.token_env, "SCRIPTLOG_TOKEN");
}

#[test]
#[serial]
fn test_partial_sections_keep_other_defaults() {
    clear_overrides();
    let config = ConfigLoader::from_str(
        r#"
engine:
  timeout_secs: 10
  path: /opt/lune/lune
output:
  inline_threshold: 500
"#,
    )
    .unwrap();

    assert_eq!(config.engine.timeout_secs, 10);
    assert_eq!(config.engine.file_extension, "lua");
    assert_eq!(config.output.inline_threshold, 500);
    assert_eq!(config.output.file_name, "reconstructed.lua");
    assert_eq!(
        config.engine.locator().candidates()[0],
        crate::executors::EngineLocation::Explicit(PathBuf::from("/opt/lune/lune"))
    );
}

#[test]
#[serial]
fn test_zero_timeout_is_rejected() {
    clear_overrides();
    let err = ConfigLoader::from_str("engine:\n  timeout_secs: 0\n").unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(msg) if msg.contains("timeout_secs")));
}

#[test]
#[serial]
fn test_dotted_extension_is_rejected() {
    clear_overrides();
    let err = ConfigLoader::from_str("engine:\n  file_extension: .lua\n").unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
}

#[test]
#[serial]
fn test_clashing_commands_are_rejected() {
    clear_overrides();
    let err = ConfigLoader::from_str("bot:\n  log_command: settings\n").unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(msg) if msg.contains("differ")));
}

#[test]
#[serial]
fn test_malformed_yaml_is_a_parse_error() {
    clear_overrides();
    let err = ConfigLoader::from_str("engine: [not, a, map").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
#[serial]
fn test_environment_overrides_apply() {
    clear_overrides();
    std::env::set_var(ENV_TIMEOUT_SECS, "12");
    std::env::set_var(ENV_SETTINGS_PATH, "/var/lib/scriptlog/settings.json");
    std::env::set_var(ENV_ENGINE_PATH, "/usr/local/bin/lune");

    let config = ConfigLoader::from_str("engine:\n  timeout_secs: 45\n");
    clear_overrides();
    let config = config.unwrap();

    assert_eq!(config.engine.timeout_secs, 12);
    assert_eq!(
        config.settings.path,
        PathBuf::from("/var/lib/scriptlog/settings.json")
    );
    assert_eq!(config.engine.path, Some(PathBuf::from("/usr/local/bin/lune")));
}

#[test]
#[serial]
fn test_bad_timeout_override_is_reported() {
    clear_overrides();
    std::env::set_var(ENV_TIMEOUT_SECS, "soon");
    let result = ConfigLoader::from_str("");
    clear_overrides();
    assert!(matches!(result, Err(ConfigError::Invalid(msg)) if msg.contains(ENV_TIMEOUT_SECS)));
}

#[tokio::test]
#[serial]
async fn test_loads_from_file_and_falls_back_when_missing() {
    clear_overrides();
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "bot:\n  command_prefix: \"?\"").unwrap();

    let config = ConfigLoader::from_file(file.path()).await.unwrap();
    assert_eq!(config.bot.command_prefix, "?");

    let dir = tempfile::tempdir().unwrap();
    let config = ConfigLoader::load_or_default(dir.path().join("absent.yaml"))
        .await
        .unwrap();
    assert_eq!(config.bot.command_prefix, "!");

    let err = ConfigLoader::from_file(dir.path().join("absent.yaml"))
        .await
        .unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}
