/*!
 * Tests for configuration loading, saving and validation
 */

use anyhow::Result;

use sheet_translator::app_config::{BackendConfig, BackendKind, Config, LogLevel};
use sheet_translator::language_utils::Direction;

use crate::common;

/// A missing config file is created with the defaults
#[test]
fn test_load_or_create_withMissingFile_shouldWriteDefaults() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = temp_dir.path().join("conf.json");

    let config = Config::load_or_create(&path)?;

    assert!(path.exists());
    assert_eq!(config.direction, Direction::KoToZh);
    assert!(config.preserve_latin);
    assert!(!config.add_new_sheet);
    assert_eq!(config.result_retention_secs, 300);
    assert_eq!(config.archive_retention_secs, 7 * 24 * 60 * 60);
    Ok(())
}

/// Saved settings survive a reload
#[test]
fn test_save_thenLoad_shouldKeepSettings() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = temp_dir.path().join("conf.json");

    let mut config = Config::default();
    config.direction = Direction::ZhToKo;
    config.add_new_sheet = true;
    config.log_level = LogLevel::Debug;
    config.translation.backends = vec![
        BackendConfig::new(BackendKind::Ollama),
        BackendConfig::new(BackendKind::LibreTranslate).with_endpoint("http://localhost:5000/translate"),
    ];
    config.save(&path)?;

    let loaded = Config::load_or_create(&path)?;
    assert_eq!(loaded.direction, Direction::ZhToKo);
    assert!(loaded.add_new_sheet);
    assert_eq!(loaded.log_level, LogLevel::Debug);
    assert_eq!(loaded.translation.backends.len(), 2);
    assert_eq!(loaded.translation.backends[0].backend_type, BackendKind::Ollama);
    assert_eq!(loaded.translation.backends[1].endpoint, "http://localhost:5000/translate");
    Ok(())
}

/// Backend types serialize under the `type` key in lowercase
#[test]
fn test_backend_config_serialization_shouldUseLowercaseType() -> Result<()> {
    let json = serde_json::to_string(&BackendConfig::new(BackendKind::HuggingFace))?;
    assert!(json.contains(r#""type":"huggingface""#));
    Ok(())
}

/// Disabled backends are left out of the cascade
#[test]
fn test_enabled_backends_withDisabledEntry_shouldSkipIt() {
    let mut config = Config::default();
    config.translation.backends[0].enabled = false;

    let kinds: Vec<BackendKind> = config.translation.enabled_backends().map(|b| b.backend_type).collect();
    assert_eq!(kinds.first(), Some(&BackendKind::LibreTranslate));
    assert!(!kinds.contains(&BackendKind::Google));
}

/// Zero timeouts and retention are rejected
#[test]
fn test_validate_withZeroDurations_shouldFail() {
    let mut config = Config::default();
    config.result_retention_secs = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.archive_retention_secs = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.translation.call_timeout_secs = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.translation.backends[0].timeout_secs = 0;
    assert!(config.validate().is_err());
}

/// Model-based backends need a model name
#[test]
fn test_validate_withEmptyOllamaModel_shouldFail() {
    let mut config = Config::default();
    let mut ollama = BackendConfig::new(BackendKind::Ollama);
    ollama.model = "  ".to_string();
    config.translation.backends = vec![ollama];
    assert!(config.validate().is_err());
}

/// The custom dictionary defaults to the work directory
#[test]
fn test_custom_dictionary_path_withoutSetting_shouldUseWorkDir() {
    let mut config = Config::default();
    config.work_dir = "/tmp/sheet-work".into();
    assert_eq!(
        config.custom_dictionary_path(),
        std::path::PathBuf::from("/tmp/sheet-work/custom_dictionary.json")
    );
    assert_eq!(config.archive_dir(), std::path::PathBuf::from("/tmp/sheet-work/archive"));

    config.dictionary.custom_path = Some("/etc/terms.json".into());
    assert_eq!(config.custom_dictionary_path(), std::path::PathBuf::from("/etc/terms.json"));
}
