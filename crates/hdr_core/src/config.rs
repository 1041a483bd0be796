use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{AppError, ErrorKind};

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_GEMINI_EMBEDDING_MODEL: &str = "text-embedding-004";
pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "llama2";

pub const GEMINI_TIMEOUT: Duration = Duration::from_secs(60);
pub const OLLAMA_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ProviderName {
    /// Hosted provider reached over HTTPS.
    Gemini,
    /// Locally reachable runtime.
    Ollama,
}

impl ProviderName {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderName::Gemini => "gemini",
            ProviderName::Ollama => "ollama",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            ProviderName::Gemini => "Gemini",
            ProviderName::Ollama => "Ollama",
        }
    }

    pub fn other(self) -> Self {
        match self {
            ProviderName::Gemini => ProviderName::Ollama,
            ProviderName::Ollama => ProviderName::Gemini,
        }
    }

    pub fn parse(raw: &str) -> Result<Self, AppError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(ProviderName::Gemini),
            "ollama" => Ok(ProviderName::Ollama),
            other => Err(AppError::new(
                ErrorKind::Configuration,
                "CONFIG_INVALID_PROVIDER",
                "AI_PROVIDER must be gemini or ollama",
            )
            .with_details(format!("value={other}"))),
        }
    }
}

impl std::fmt::Display for ProviderName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-provider view of the settings. Read once when the orchestrator is built.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderConfig {
    pub provider_name: ProviderName,
    pub primary: bool,
    pub model_id: String,
    pub endpoint: String,
    pub timeout: Duration,
    pub fallback_enabled: bool,
}

/// Configuration keys, as environment variable names. TOML files and `.env`
/// use the same names; matching is case-insensitive.
pub const CONFIG_KEYS: [&str; 9] = [
    "AI_PROVIDER",
    "AI_USE_FALLBACK",
    "GEMINI_API_KEY",
    "GEMINI_BASE_URL",
    "GEMINI_MODEL",
    "GEMINI_EMBEDDING_MODEL",
    "OLLAMA_BASE_URL",
    "OLLAMA_MODEL",
    "HDR_DATA_DIR",
];

pub const DEFAULT_CONFIG_FILE: &str = "hdr.toml";
pub const DEFAULT_DOTENV_FILE: &str = ".env";

/// Where settings are read from. Layers, lowest precedence first: TOML file,
/// `.env` file, process environment. Missing files are skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSources {
    pub toml_file: Option<PathBuf>,
    pub dotenv_file: Option<PathBuf>,
    pub process_env: bool,
}

impl Default for ConfigSources {
    fn default() -> Self {
        Self {
            toml_file: Some(PathBuf::from(DEFAULT_CONFIG_FILE)),
            dotenv_file: Some(PathBuf::from(DEFAULT_DOTENV_FILE)),
            process_env: true,
        }
    }
}

fn config_error(code: &str, message: &str, path: &Path, e: impl std::fmt::Display) -> AppError {
    AppError::new(ErrorKind::Configuration, code, message)
        .with_details(format!("path={}; err={e}", path.display()))
}

fn is_config_key(key: &str) -> bool {
    CONFIG_KEYS.iter().any(|k| k.eq_ignore_ascii_case(key))
}

/// Read known keys from a dotenv file without touching the process environment.
fn read_dotenv(path: &Path) -> Result<BTreeMap<String, String>, AppError> {
    let iter = match dotenvy::from_path_iter(path) {
        Ok(iter) => iter,
        Err(e) if e.not_found() => return Ok(BTreeMap::new()),
        Err(e) => {
            return Err(config_error(
                "CONFIG_DOTENV_UNREADABLE",
                "Failed to read .env file",
                path,
                e,
            ))
        }
    };

    let mut out = BTreeMap::new();
    for item in iter {
        let (key, value) = item.map_err(|e| {
            config_error("CONFIG_DOTENV_INVALID", "Malformed .env file", path, e)
        })?;
        if is_config_key(&key) {
            out.insert(key.to_ascii_lowercase(), value);
        }
    }
    Ok(out)
}

impl ConfigSources {
    /// No files and no process environment; every setting takes its default.
    pub fn empty() -> Self {
        Self {
            toml_file: None,
            dotenv_file: None,
            process_env: false,
        }
    }

    pub fn with_toml_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.toml_file = Some(path.into());
        self
    }

    pub fn with_dotenv_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.dotenv_file = Some(path.into());
        self
    }

    pub fn without_process_env(mut self) -> Self {
        self.process_env = false;
        self
    }

    pub fn figment(&self) -> Result<Figment, AppError> {
        let mut figment = Figment::new();
        if let Some(path) = &self.toml_file {
            figment = figment.merge(Toml::file(path));
        }
        if let Some(path) = &self.dotenv_file {
            figment = figment.merge(Serialized::defaults(read_dotenv(path)?));
        }
        if self.process_env {
            figment = figment.merge(Env::raw().only(&CONFIG_KEYS));
        }
        Ok(figment)
    }
}

/// Env values arrive typed (`1` is a number, `true` a bool); settings want text.
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Flag(bool),
    Signed(i64),
    Unsigned(u64),
    Float(f64),
    Char(char),
    Text(String),
}

fn lenient_string<'de, D>(de: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Scalar>::deserialize(de)?;
    Ok(value
        .map(|v| match v {
            Scalar::Flag(b) => b.to_string(),
            Scalar::Signed(n) => n.to_string(),
            Scalar::Unsigned(n) => n.to_string(),
            Scalar::Float(n) => n.to_string(),
            Scalar::Char(c) => c.to_string(),
            Scalar::Text(s) => s,
        })
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty()))
}

/// Flat view of every key; blank values count as unset.
#[derive(Default, Deserialize)]
struct RawSettings {
    #[serde(default, deserialize_with = "lenient_string")]
    ai_provider: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    ai_use_fallback: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    gemini_api_key: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    gemini_base_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    gemini_model: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    gemini_embedding_model: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    ollama_base_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    ollama_model: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    hdr_data_dir: Option<String>,
}

impl RawSettings {
    fn extract(figment: &Figment) -> Result<Self, AppError> {
        // Only the key path goes into the error; values may be secrets.
        figment.extract().map_err(|e| {
            AppError::new(
                ErrorKind::Configuration,
                "CONFIG_INVALID",
                "Invalid configuration value",
            )
            .with_details(format!("key={}", e.path.join(".")))
        })
    }
}

/// Process-wide AI settings.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct AiSettings {
    pub provider: ProviderName,
    pub fallback_enabled: bool,
    #[serde(skip_serializing)]
    pub gemini_api_key: Option<String>,
    pub gemini_base_url: String,
    pub gemini_model: String,
    pub gemini_embedding_model: String,
    pub ollama_base_url: String,
    pub ollama_model: String,
}

impl std::fmt::Debug for AiSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiSettings")
            .field("provider", &self.provider)
            .field("fallback_enabled", &self.fallback_enabled)
            .field(
                "gemini_api_key",
                &self.gemini_api_key.as_ref().map(|_| "<redacted>"),
            )
            .field("gemini_base_url", &self.gemini_base_url)
            .field("gemini_model", &self.gemini_model)
            .field("gemini_embedding_model", &self.gemini_embedding_model)
            .field("ollama_base_url", &self.ollama_base_url)
            .field("ollama_model", &self.ollama_model)
            .finish()
    }
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            provider: ProviderName::Gemini,
            fallback_enabled: true,
            gemini_api_key: None,
            gemini_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            gemini_embedding_model: DEFAULT_GEMINI_EMBEDDING_MODEL.to_string(),
            ollama_base_url: DEFAULT_OLLAMA_BASE_URL.to_string(),
            ollama_model: DEFAULT_OLLAMA_MODEL.to_string(),
        }
    }
}

impl AiSettings {
    /// `hdr.toml`, then `.env`, then the process environment.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_figment(&ConfigSources::default().figment()?)
    }

    pub fn from_figment(figment: &Figment) -> Result<Self, AppError> {
        let raw = RawSettings::extract(figment)?;
        let defaults = Self::default();

        let provider = match raw.ai_provider {
            Some(v) => ProviderName::parse(&v)?,
            None => defaults.provider,
        };
        let fallback_enabled = match raw.ai_use_fallback {
            Some(v) => parse_bool(&v),
            None => defaults.fallback_enabled,
        };

        Ok(Self {
            provider,
            fallback_enabled,
            gemini_api_key: raw.gemini_api_key,
            gemini_base_url: raw.gemini_base_url.unwrap_or(defaults.gemini_base_url),
            gemini_model: raw.gemini_model.unwrap_or(defaults.gemini_model),
            gemini_embedding_model: raw
                .gemini_embedding_model
                .unwrap_or(defaults.gemini_embedding_model),
            ollama_base_url: raw.ollama_base_url.unwrap_or(defaults.ollama_base_url),
            ollama_model: raw.ollama_model.unwrap_or(defaults.ollama_model),
        })
    }

    pub fn gemini_configured(&self) -> bool {
        self.gemini_api_key.is_some()
    }

    pub fn provider_config(&self, name: ProviderName) -> ProviderConfig {
        let (model_id, endpoint, timeout) = match name {
            ProviderName::Gemini => (
                self.gemini_model.clone(),
                self.gemini_base_url.clone(),
                GEMINI_TIMEOUT,
            ),
            ProviderName::Ollama => (
                self.ollama_model.clone(),
                self.ollama_base_url.clone(),
                OLLAMA_TIMEOUT,
            ),
        };
        ProviderConfig {
            provider_name: name,
            primary: name == self.provider,
            model_id,
            endpoint,
            timeout,
            fallback_enabled: self.fallback_enabled,
        }
    }
}

/// Loose boolean parsing: `1/true/yes/on` are true, everything else false.
pub fn parse_bool(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

pub const DEFAULT_DATA_DIR: &str = "vector_db";

/// Where the index snapshot and the file registry live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePaths {
    root: PathBuf,
}

impl StoragePaths {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// `HDR_DATA_DIR` from the standard sources, falling back to `./vector_db`.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_figment(&ConfigSources::default().figment()?)
    }

    pub fn from_figment(figment: &Figment) -> Result<Self, AppError> {
        let raw = RawSettings::extract(figment)?;
        let root = raw.hdr_data_dir.unwrap_or_else(|| DEFAULT_DATA_DIR.to_string());
        Ok(Self::new(PathBuf::from(root)))
    }

    pub fn root(&self) -> &Path {
        self.root.as_path()
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.root.join("data.json")
    }

    pub fn registry_db_path(&self) -> PathBuf {
        self.root.join("files.sqlite")
    }
}
