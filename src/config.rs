use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;
use thiserror::Error;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
    /// Individually valid values that contradict each other.
    #[error("Inconsistent configuration: {0}")]
    Inconsistent(String),
    /// Configuration was installed twice in the same process.
    #[error("Configuration already initialized")]
    AlreadyInitialized,
}

/// Runtime configuration for the Rusty RAG server.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the Qdrant instance that stores chunk embeddings.
    pub qdrant_url: String,
    /// Name of the Qdrant collection used for document chunks.
    pub qdrant_collection_name: String,
    /// Optional API key required to access Qdrant.
    pub qdrant_api_key: Option<String>,
    /// Embedding provider used to generate vector representations.
    pub embedding_provider: EmbeddingProvider,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Provider used for answer generation.
    pub generation_provider: GenerationProvider,
    /// Chat model identifier passed to the generation provider.
    pub chat_model: String,
    /// Sampling temperature used for answers.
    pub chat_temperature: f32,
    /// Credential for the hosted OpenAI-compatible API.
    pub llm_api_key: Option<String>,
    /// Base URL of the OpenAI-compatible API (including the `/v1` segment).
    pub openai_base_url: String,
    /// Base URL of the local Ollama runtime.
    pub ollama_url: String,
    /// Window size used by the chunker.
    pub chunk_size: usize,
    /// Overlap carried between consecutive windows.
    pub chunk_overlap: usize,
    /// Unit in which chunk size and overlap are measured.
    pub chunk_unit: ChunkUnit,
    /// Number of nearest chunks retrieved per question.
    pub retrieval_top_k: usize,
    /// Rewrite follow-up questions into standalone questions before retrieval.
    pub condense_follow_ups: bool,
    /// Directory receiving raw uploaded files.
    pub upload_dir: PathBuf,
    /// Optional directory caching extracted text per document.
    pub extract_cache_dir: Option<PathBuf>,
    /// Maximum number of files processed concurrently within one upload.
    pub ingest_concurrency: usize,
    /// Maximum accepted request body size for uploads.
    pub max_upload_bytes: usize,
    /// Timeout applied to outbound HTTP requests.
    pub http_timeout_secs: u64,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

/// Supported embedding backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmbeddingProvider {
    /// Local Ollama runtime.
    Ollama,
    /// Hosted OpenAI-compatible embeddings API.
    OpenAI,
    /// Deterministic offline hashing encoder.
    Hash,
}

/// Supported answer generation backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GenerationProvider {
    /// Local Ollama runtime.
    Ollama,
    /// Hosted OpenAI-compatible chat completions API.
    OpenAI,
}

/// Unit used when measuring chunk windows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkUnit {
    /// Unicode scalar values.
    Chars,
    /// `cl100k_base` tokens.
    Tokens,
}

const DEFAULT_COLLECTION: &str = "rusty-rag";
const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";
const DEFAULT_EMBEDDING_DIMENSION: usize = 768;
const DEFAULT_CHAT_MODEL: &str = "llama3.1";
const DEFAULT_CHAT_TEMPERATURE: f32 = 0.7;
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";
const DEFAULT_CHUNK_SIZE: usize = 1000;
const DEFAULT_CHUNK_OVERLAP: usize = 200;
const DEFAULT_TOP_K: usize = 4;
const DEFAULT_UPLOAD_DIR: &str = "data/uploads";
const DEFAULT_EXTRACT_CACHE_DIR: &str = "data/extracted";
const DEFAULT_INGEST_CONCURRENCY: usize = 4;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 120;

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            qdrant_url: load_env("QDRANT_URL")?,
            qdrant_collection_name: load_env_optional("QDRANT_COLLECTION_NAME")
                .unwrap_or_else(|| DEFAULT_COLLECTION.to_string()),
            qdrant_api_key: load_env_optional("QDRANT_API_KEY"),
            embedding_provider: parse_optional("EMBEDDING_PROVIDER")?
                .unwrap_or(EmbeddingProvider::Ollama),
            embedding_model: load_env_optional("EMBEDDING_MODEL")
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            embedding_dimension: parse_optional("EMBEDDING_DIMENSION")?
                .unwrap_or(DEFAULT_EMBEDDING_DIMENSION),
            generation_provider: parse_optional("GENERATION_PROVIDER")?
                .unwrap_or(GenerationProvider::Ollama),
            chat_model: load_env_optional("CHAT_MODEL")
                .unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
            chat_temperature: parse_optional("CHAT_TEMPERATURE")?
                .unwrap_or(DEFAULT_CHAT_TEMPERATURE),
            llm_api_key: load_env_optional("LLM_API_KEY"),
            openai_base_url: load_env_optional("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            ollama_url: load_env_optional("OLLAMA_URL")
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            chunk_size: parse_optional("CHUNK_SIZE")?.unwrap_or(DEFAULT_CHUNK_SIZE),
            chunk_overlap: parse_optional("CHUNK_OVERLAP")?.unwrap_or(DEFAULT_CHUNK_OVERLAP),
            chunk_unit: parse_optional("CHUNK_UNIT")?.unwrap_or(ChunkUnit::Chars),
            retrieval_top_k: parse_optional("RETRIEVAL_TOP_K")?.unwrap_or(DEFAULT_TOP_K),
            condense_follow_ups: parse_flag("CONDENSE_FOLLOW_UPS")?.unwrap_or(false),
            upload_dir: load_env_optional("UPLOAD_DIR")
                .map_or_else(|| PathBuf::from(DEFAULT_UPLOAD_DIR), PathBuf::from),
            extract_cache_dir: match env::var("EXTRACT_CACHE_DIR") {
                Ok(value) if value.trim().is_empty() => None,
                Ok(value) => Some(PathBuf::from(value)),
                Err(_) => Some(PathBuf::from(DEFAULT_EXTRACT_CACHE_DIR)),
            },
            ingest_concurrency: parse_optional("INGEST_CONCURRENCY")?
                .unwrap_or(DEFAULT_INGEST_CONCURRENCY),
            max_upload_bytes: parse_optional("MAX_UPLOAD_BYTES")?
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            http_timeout_secs: parse_optional("HTTP_TIMEOUT_SECS")?
                .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS),
            server_port: parse_optional("SERVER_PORT")?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints that individual parsers cannot see.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::InvalidValue("CHUNK_SIZE".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ConfigError::Inconsistent(format!(
                "CHUNK_OVERLAP ({}) must be smaller than CHUNK_SIZE ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.retrieval_top_k == 0 {
            return Err(ConfigError::InvalidValue("RETRIEVAL_TOP_K".into()));
        }
        if self.embedding_dimension == 0 {
            return Err(ConfigError::InvalidValue("EMBEDDING_DIMENSION".into()));
        }
        if self.ingest_concurrency == 0 {
            return Err(ConfigError::InvalidValue("INGEST_CONCURRENCY".into()));
        }
        let needs_key = self.embedding_provider == EmbeddingProvider::OpenAI
            || self.generation_provider == GenerationProvider::OpenAI;
        if needs_key && self.llm_api_key.is_none() {
            return Err(ConfigError::MissingVariable("LLM_API_KEY".into()));
        }
        Ok(())
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    load_env_optional(key).ok_or_else(|| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_optional<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
}

fn parse_flag(key: &str) -> Result<Option<bool>, ConfigError> {
    load_env_optional(key)
        .map(|value| match value.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue(key.to_string())),
        })
        .transpose()
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            "hash" => Ok(Self::Hash),
            _ => Err(()),
        }
    }
}

impl std::str::FromStr for GenerationProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            _ => Err(()),
        }
    }
}

impl std::str::FromStr for ChunkUnit {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "chars" | "characters" => Ok(Self::Chars),
            "tokens" => Ok(Self::Tokens),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() -> Result<&'static Config, ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(
        qdrant_url = %config.qdrant_url,
        collection = %config.qdrant_collection_name,
        embedding_provider = ?config.embedding_provider,
        generation_provider = ?config.generation_provider,
        chunk_size = config.chunk_size,
        chunk_overlap = config.chunk_overlap,
        top_k = config.retrieval_top_k,
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    CONFIG
        .set(config)
        .map_err(|_| ConfigError::AlreadyInitialized)?;
    Ok(get_config())
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        qdrant_url: "http://127.0.0.1:6333".into(),
        qdrant_collection_name: "test-collection".into(),
        qdrant_api_key: None,
        embedding_provider: EmbeddingProvider::Hash,
        embedding_model: "test-model".into(),
        embedding_dimension: 32,
        generation_provider: GenerationProvider::Ollama,
        chat_model: "test-chat".into(),
        chat_temperature: 0.7,
        llm_api_key: None,
        openai_base_url: DEFAULT_OPENAI_BASE_URL.into(),
        ollama_url: DEFAULT_OLLAMA_URL.into(),
        chunk_size: DEFAULT_CHUNK_SIZE,
        chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        chunk_unit: ChunkUnit::Chars,
        retrieval_top_k: DEFAULT_TOP_K,
        condense_follow_ups: false,
        upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
        extract_cache_dir: None,
        ingest_concurrency: DEFAULT_INGEST_CONCURRENCY,
        max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        server_port: None,
    }
}
