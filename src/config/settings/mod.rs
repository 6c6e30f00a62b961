
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use url::Url;

use crate::chunking::ChunkingConfig;

pub const CONFIG_FILE_NAME: &str = "config.toml";

pub const MAX_TOP_K: usize = 10;

const ENV_EMBEDDING_BACKEND: &str = "DOCS_RAG_EMBEDDING_BACKEND";
const ENV_STORAGE_BACKEND: &str = "DOCS_RAG_STORAGE_BACKEND";
const ENV_STORE_PATH: &str = "DOCS_RAG_STORE_PATH";
const ENV_COLLECTION: &str = "DOCS_RAG_COLLECTION";
const ENV_GENERATION_BACKEND: &str = "DOCS_RAG_GENERATION_BACKEND";
const ENV_TOP_K: &str = "DOCS_RAG_TOP_K";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    #[default]
    Ollama,
    OpenAi,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Exact brute-force search over records persisted as local files
    #[default]
    Simple,
    /// LanceDB table, persisted on every write
    LanceDb,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum GenerationBackend {
    /// No language model: the answer is the retrieved passages themselves
    #[default]
    #[serde(rename = "none")]
    Disabled,
    OpenAi,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub backend: EmbeddingBackend,
    pub model: String,
    pub batch_size: u32,
    pub ollama: OllamaConfig,
    pub openai: OpenAiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OllamaConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
}

/// Any service speaking the OpenAI REST dialect
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OpenAiConfig {
    pub base_url: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Store directory; relative paths resolve against the base directory
    pub path: PathBuf,
    /// Table name used by indexed backends
    pub collection: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenerationConfig {
    pub backend: GenerationBackend,
    pub base_url: String,
    pub model: String,
    pub api_key_env: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_seconds: u64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid batch size: {0} (must be between 1 and 1000)")]
    InvalidBatchSize(u32),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid chunk size: {0} (must be at least 1)")]
    InvalidChunkSize(usize),
    #[error("Chunk overlap ({0}) must be smaller than chunk size ({1})")]
    OverlapTooLarge(usize, usize),
    #[error("Invalid top_k: {0} (must be between 1 and 10)")]
    InvalidTopK(usize),
    #[error("Invalid collection name: '{0}' (cannot be empty)")]
    InvalidCollection(String),
    #[error("Invalid temperature: {0} (must be between 0.0 and 2.0)")]
    InvalidTemperature(f32),
    #[error("Invalid max tokens: {0} (must be at least 1)")]
    InvalidMaxTokens(u32),
    #[error("Invalid timeout: {0} (must be between 1 and 600 seconds)")]
    InvalidTimeout(u64),
    #[error("Unknown {kind} backend: '{name}'")]
    UnknownBackend { kind: &'static str, name: String },
    #[error("Invalid value for {key}: '{value}'")]
    InvalidEnvValue { key: &'static str, value: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Default for Config {
    #[inline]
    fn default() -> Self {
        Self {
            embedding: EmbeddingConfig::default(),
            storage: StorageConfig::default(),
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            generation: GenerationConfig::default(),
            base_dir: Self::default_base_dir().unwrap_or_else(|_| PathBuf::from(".docs-rag")),
        }
    }
}

impl Default for EmbeddingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Ollama,
            model: "nomic-embed-text:latest".to_string(),
            batch_size: 16,
            ollama: OllamaConfig::default(),
            openai: OpenAiConfig::default(),
        }
    }
}

impl Default for OllamaConfig {
    #[inline]
    fn default() -> Self {
        Self {
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 11434,
        }
    }
}

impl Default for OpenAiConfig {
    #[inline]
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}

impl Default for StorageConfig {
    #[inline]
    fn default() -> Self {
        Self {
            backend: StorageBackend::Simple,
            path: PathBuf::from("vectorstore"),
            collection: "rag_collection".to_string(),
        }
    }
}

impl Default for RetrievalConfig {
    #[inline]
    fn default() -> Self {
        Self { top_k: 3 }
    }
}

impl Default for GenerationConfig {
    #[inline]
    fn default() -> Self {
        Self {
            backend: GenerationBackend::Disabled,
            base_url: "https://api.groq.com/openai/v1".to_string(),
            model: "llama-3.3-70b-versatile".to_string(),
            api_key_env: "GROQ_API_KEY".to_string(),
            temperature: 0.0,
            max_tokens: 512,
            timeout_seconds: 60,
        }
    }
}

impl Config {
    /// `~/.docs-rag`, or the platform data directory on Windows
    #[inline]
    pub fn default_base_dir() -> Result<PathBuf, ConfigError> {
        dirs::home_dir()
            .map(|home| home.join(".docs-rag"))
            .or({
                #[cfg(windows)]
                {
                    dirs::data_dir().map(|data| data.join("docs-rag"))
                }
                #[cfg(not(windows))]
                {
                    None
                }
            })
            .ok_or(ConfigError::DirectoryError)
    }

    /// Load `config.toml` from `config_dir`, falling back to defaults when it is absent.
    /// Environment overrides are applied before validation.
    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_file(config_dir)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load `config.toml` without consulting the environment
    #[inline]
    pub fn load_file<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_path = config_dir.as_ref().join(CONFIG_FILE_NAME);

        let mut config = if config_path.exists() {
            let content = fs::read_to_string(&config_path)?;
            toml::from_str::<Self>(&content)?
        } else {
            Self::default()
        };
        config.base_dir = config_dir.as_ref().to_path_buf();

        config.validate()?;
        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<(), ConfigError> {
        self.validate()?;

        fs::create_dir_all(self.get_base_dir())?;

        let content = toml::to_string_pretty(self)?;
        fs::write(self.config_file_path(), content)?;

        Ok(())
    }

    /// Get the base directory for the application
    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join(CONFIG_FILE_NAME)
    }

    /// Directory holding the persisted vector store
    #[inline]
    pub fn store_path(&self) -> PathBuf {
        self.storage.resolved_path(self.get_base_dir())
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.embedding.validate()?;
        self.storage.validate()?;
        self.validate_chunking_config()?;
        self.retrieval.validate()?;
        self.generation.validate()?;
        Ok(())
    }

    fn validate_chunking_config(&self) -> Result<(), ConfigError> {
        let config = &self.chunking;

        if config.chunk_size == 0 {
            return Err(ConfigError::InvalidChunkSize(config.chunk_size));
        }

        if config.chunk_overlap >= config.chunk_size {
            return Err(ConfigError::OverlapTooLarge(
                config.chunk_overlap,
                config.chunk_size,
            ));
        }

        Ok(())
    }

    #[inline]
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup; unset keys leave the setting untouched
    #[inline]
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_EMBEDDING_BACKEND) {
            self.embedding.backend = value.parse()?;
        }
        if let Some(value) = lookup(ENV_STORAGE_BACKEND) {
            self.storage.backend = value.parse()?;
        }
        if let Some(value) = lookup(ENV_STORE_PATH) {
            self.storage.path = PathBuf::from(value);
        }
        if let Some(value) = lookup(ENV_COLLECTION) {
            self.storage.collection = value;
        }
        if let Some(value) = lookup(ENV_GENERATION_BACKEND) {
            self.generation.backend = value.parse()?;
        }
        if let Some(value) = lookup(ENV_TOP_K) {
            self.retrieval.top_k = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidEnvValue {
                    key: ENV_TOP_K,
                    value: value.clone(),
                })?;
        }
        Ok(())
    }
}

impl EmbeddingConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        if self.batch_size == 0 || self.batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }

        match self.backend {
            EmbeddingBackend::Ollama => self.ollama.validate(),
            EmbeddingBackend::OpenAi => {
                Url::parse(&self.openai.base_url)
                    .map_err(|_| ConfigError::InvalidUrl(self.openai.base_url.clone()))?;
                Ok(())
            }
        }
    }
}

impl OllamaConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol != "http" && self.protocol != "https" {
            return Err(ConfigError::InvalidProtocol(self.protocol.clone()));
        }

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        self.ollama_url()?;

        Ok(())
    }

    #[inline]
    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))
    }
}

impl StorageConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.collection.trim().is_empty() {
            return Err(ConfigError::InvalidCollection(self.collection.clone()));
        }
        Ok(())
    }

    #[inline]
    pub fn resolved_path(&self, base_dir: &Path) -> PathBuf {
        if self.path.is_absolute() {
            self.path.clone()
        } else {
            base_dir.join(&self.path)
        }
    }
}

impl RetrievalConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_TOP_K).contains(&self.top_k) {
            return Err(ConfigError::InvalidTopK(self.top_k));
        }
        Ok(())
    }
}

impl GenerationConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend == GenerationBackend::Disabled {
            return Ok(());
        }

        Url::parse(&self.base_url).map_err(|_| ConfigError::InvalidUrl(self.base_url.clone()))?;

        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::InvalidTemperature(self.temperature));
        }

        if self.max_tokens == 0 {
            return Err(ConfigError::InvalidMaxTokens(self.max_tokens));
        }

        if !(1..=600).contains(&self.timeout_seconds) {
            return Err(ConfigError::InvalidTimeout(self.timeout_seconds));
        }

        Ok(())
    }
}

impl FromStr for EmbeddingBackend {
    type Err = ConfigError;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAi),
            _ => Err(ConfigError::UnknownBackend {
                kind: "embedding",
                name: s.to_string(),
            }),
        }
    }
}

impl FromStr for StorageBackend {
    type Err = ConfigError;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simple" => Ok(Self::Simple),
            "lancedb" => Ok(Self::LanceDb),
            _ => Err(ConfigError::UnknownBackend {
                kind: "storage",
                name: s.to_string(),
            }),
        }
    }
}

impl FromStr for GenerationBackend {
    type Err = ConfigError;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::Disabled),
            "openai" => Ok(Self::OpenAi),
            _ => Err(ConfigError::UnknownBackend {
                kind: "generation",
                name: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for EmbeddingBackend {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ollama => "ollama",
            Self::OpenAi => "openai",
        })
    }
}

impl fmt::Display for StorageBackend {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Simple => "simple",
            Self::LanceDb => "lancedb",
        })
    }
}

impl fmt::Display for GenerationBackend {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disabled => "none",
            Self::OpenAi => "openai",
        })
    }
}
