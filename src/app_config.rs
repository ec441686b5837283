use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::path::{Path, PathBuf};
use url::Url;

use crate::file_utils::FileManager;
use crate::language_utils::Direction;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Default translation direction
    #[serde(default)]
    pub direction: Direction,

    /// Leave Latin-only cells (codes, part numbers, English) untouched
    #[serde(default = "default_true")]
    pub preserve_latin: bool,

    /// Write translations into a copied sheet instead of overwriting
    #[serde(default)]
    pub add_new_sheet: bool,

    /// Directory for job outputs and extraction archives
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Seconds a result stays available after it is retrieved
    #[serde(default = "default_result_retention_secs")]
    pub result_retention_secs: u64,

    /// Seconds an extraction archive waits for its reply before it is swept
    #[serde(default = "default_archive_retention_secs")]
    pub archive_retention_secs: u64,

    /// Term dictionary files
    #[serde(default)]
    pub dictionary: DictionaryConfig,

    /// Translation config
    #[serde(default)]
    pub translation: TranslationConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Translation backend type
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    // @backend: Google web endpoint
    Google,
    // @backend: LibreTranslate instance
    LibreTranslate,
    // @backend: HuggingFace inference API
    HuggingFace,
    // @backend: Local Ollama server
    Ollama,
}

impl BackendKind {
    // @returns: Capitalized backend name
    pub fn display_name(&self) -> &str {
        match self {
            Self::Google => "Google",
            Self::LibreTranslate => "LibreTranslate",
            Self::HuggingFace => "HuggingFace",
            Self::Ollama => "Ollama",
        }
    }

    // @returns: Lowercase backend identifier
    pub fn to_lowercase_string(&self) -> String {
        match self {
            Self::Google => "google".to_string(),
            Self::LibreTranslate => "libretranslate".to_string(),
            Self::HuggingFace => "huggingface".to_string(),
            Self::Ollama => "ollama".to_string(),
        }
    }
}

// Implement Display trait for BackendKind
impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_lowercase_string())
    }
}

// Implement FromStr trait for BackendKind
impl std::str::FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "google" => Ok(Self::Google),
            "libretranslate" | "libre" => Ok(Self::LibreTranslate),
            "huggingface" | "hf" => Ok(Self::HuggingFace),
            "ollama" => Ok(Self::Ollama),
            _ => Err(anyhow!("Invalid backend type: {}", s)),
        }
    }
}

/// One entry of the backend cascade
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BackendConfig {
    // @field: Backend type identifier
    #[serde(rename = "type")]
    pub backend_type: BackendKind,

    // @field: Whether the resolver calls this backend
    #[serde(default = "default_true")]
    pub enabled: bool,

    // @field: Service URL
    #[serde(default = "String::new")]
    pub endpoint: String,

    // @field: Model name or template
    #[serde(default = "String::new")]
    pub model: String,

    // @field: API key
    #[serde(default = "String::new")]
    pub api_key: String,

    // @field: Timeout seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    // @field: Retries after a failed call (Ollama only)
    #[serde(default)]
    pub max_retries: u32,
}

impl BackendConfig {
    // @param backend_type: Backend enum
    // @returns: Backend config with defaults
    pub fn new(backend_type: BackendKind) -> Self {
        let (endpoint, model, timeout_secs) = match backend_type {
            BackendKind::Google => (default_google_endpoint(), String::new(), 5),
            BackendKind::LibreTranslate => (default_libretranslate_endpoint(), String::new(), 8),
            BackendKind::HuggingFace => (default_huggingface_endpoint(), default_huggingface_model(), 10),
            BackendKind::Ollama => (default_ollama_endpoint(), default_ollama_model(), 15),
        };
        Self {
            backend_type,
            enabled: true,
            endpoint,
            model,
            api_key: String::new(),
            timeout_secs,
            max_retries: 0,
        }
    }

    /// Same backend type at another endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

/// Dictionary file locations
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct DictionaryConfig {
    /// Base dictionary JSON; the built-in table is used when unset or missing
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// User additions, overriding the base dictionary
    #[serde(default)]
    pub custom_path: Option<PathBuf>,
}

/// Translation resolver configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationConfig {
    /// Upper bound for a single backend call
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,

    /// Backends in the order they are tried
    #[serde(default = "default_backends")]
    pub backends: Vec<BackendConfig>,
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

fn default_true() -> bool {
    true
}

fn default_work_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("sheet-translator"))
        .unwrap_or_else(|| PathBuf::from("./sheet-translator"))
}

fn default_result_retention_secs() -> u64 {
    300
}

fn default_archive_retention_secs() -> u64 {
    7 * 24 * 60 * 60
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_call_timeout_secs() -> u64 {
    15
}

fn default_google_endpoint() -> String {
    "https://translate.googleapis.com".to_string()
}

fn default_libretranslate_endpoint() -> String {
    "https://libretranslate.de/translate".to_string()
}

fn default_huggingface_endpoint() -> String {
    "https://api-inference.huggingface.co".to_string()
}

fn default_huggingface_model() -> String {
    "Helsinki-NLP/opus-mt-{source}-{target}".to_string()
}

fn default_ollama_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "llama3.2:3b".to_string()
}

/// Google, three LibreTranslate mirrors, HuggingFace, then local Ollama
fn default_backends() -> Vec<BackendConfig> {
    vec![
        BackendConfig::new(BackendKind::Google),
        BackendConfig::new(BackendKind::LibreTranslate),
        BackendConfig::new(BackendKind::LibreTranslate)
            .with_endpoint("https://translate.argosopentech.com/translate"),
        BackendConfig::new(BackendKind::LibreTranslate).with_endpoint("https://libretranslate.com/translate"),
        BackendConfig::new(BackendKind::HuggingFace),
        BackendConfig::new(BackendKind::Ollama),
    ]
}

impl Config {
    /// Load the configuration at `path`, writing the defaults there first if
    /// the file does not exist
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save(path)?;
            return Ok(config);
        }
        let content = FileManager::read_to_string(path)?;
        serde_json::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Save the configuration as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        FileManager::write_to_file(path, &json)
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        if self.result_retention_secs == 0 {
            return Err(anyhow!("result_retention_secs must be greater than zero"));
        }
        if self.archive_retention_secs == 0 {
            return Err(anyhow!("archive_retention_secs must be greater than zero"));
        }
        if self.translation.call_timeout_secs == 0 {
            return Err(anyhow!("translation.call_timeout_secs must be greater than zero"));
        }

        for backend in self.translation.backends.iter().filter(|b| b.enabled) {
            let name = backend.backend_type.display_name();
            Url::parse(&backend.endpoint)
                .with_context(|| format!("Invalid endpoint for {} backend: {:?}", name, backend.endpoint))?;
            if backend.timeout_secs == 0 {
                return Err(anyhow!("Timeout for {} backend must be greater than zero", name));
            }
            if matches!(backend.backend_type, BackendKind::Ollama | BackendKind::HuggingFace)
                && backend.model.trim().is_empty()
            {
                return Err(anyhow!("A model is required for the {} backend", name));
            }
        }

        Ok(())
    }

    /// Directory holding extraction archives
    pub fn archive_dir(&self) -> PathBuf {
        self.work_dir.join("archive")
    }

    /// Custom dictionary file, `work_dir/custom_dictionary.json` unless configured
    pub fn custom_dictionary_path(&self) -> PathBuf {
        self.dictionary
            .custom_path
            .clone()
            .unwrap_or_else(|| self.work_dir.join("custom_dictionary.json"))
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            direction: Direction::default(),
            preserve_latin: true,
            add_new_sheet: false,
            work_dir: default_work_dir(),
            result_retention_secs: default_result_retention_secs(),
            archive_retention_secs: default_archive_retention_secs(),
            dictionary: DictionaryConfig::default(),
            translation: TranslationConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}

impl TranslationConfig {
    /// Enabled backends in cascade order
    pub fn enabled_backends(&self) -> impl Iterator<Item = &BackendConfig> {
        self.backends.iter().filter(|b| b.enabled)
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            call_timeout_secs: default_call_timeout_secs(),
            backends: default_backends(),
        }
    }
}
