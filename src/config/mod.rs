// Configuration management module
// TOML settings, backend selection and environment overrides

pub mod settings;

pub use settings::{
    Config, ConfigError, EmbeddingBackend, EmbeddingConfig, GenerationBackend, GenerationConfig,
    MAX_TOP_K, OllamaConfig, OpenAiConfig, RetrievalConfig, StorageBackend, StorageConfig,
};

/// Get the default configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::default_base_dir()
}
