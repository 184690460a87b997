use config::{Config, ConfigError, Environment, File};
use extract::LlmProvider;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Default location of the optional config file
pub const CONFIG_FILE: &str = "graphrag.toml";

/// Output length of the embedding models we ship defaults for
pub fn known_embedding_dimension(model: &str) -> Option<usize> {
    match model.split(':').next().unwrap_or(model) {
        "nomic-embed-text" => Some(768),
        "mxbai-embed-large" => Some(1024),
        "all-minilm" => Some(384),
        "text-embedding-3-small" | "text-embedding-ada-002" => Some(1536),
        "text-embedding-3-large" => Some(3072),
        _ => None,
    }
}

/// Application configuration.
///
/// Layered as built-in defaults, then the optional TOML file (path from
/// `GRAPHRAG_CONFIG`), then `GRAPHRAG_*` environment variables with `__`
/// between section and key, e.g. `GRAPHRAG_NEO4J__PASSWORD`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub qdrant: QdrantConfig,
    pub neo4j: Neo4jConfig,
    pub llm: LlmConfig,
    pub context: ContextConfig,
    pub query: QueryConfig,
    pub concurrency: ConcurrencyConfig,
    pub retry: RetryConfig,
    pub cache: CacheConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QdrantConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub collection: String,
    pub dimension: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Neo4jConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub base_url: String,
    pub model: String,
    pub embedding_model: String,
    pub api_key: Option<String>,
    /// Attempts at getting valid JSON out of the extraction model
    pub max_json_attempts: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    pub max_chars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub default_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    pub max_concurrent_extractions: usize,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: usize,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub max_entries: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Used when `RUST_LOG` is unset
    pub filter: String,
    pub json: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6333".to_string(),
            api_key: None,
            collection: "graphrag_nodes".to_string(),
            // nomic-embed-text, the default embedding model
            dimension: 768,
        }
    }
}

impl Default for Neo4jConfig {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".to_string(),
            user: "neo4j".to_string(),
            password: "password".to_string(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Ollama,
            base_url: "http://localhost:11434".to_string(),
            model: "llama3".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            api_key: None,
            max_json_attempts: 3,
        }
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_chars: query::DEFAULT_MAX_CONTEXT_CHARS,
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self { default_limit: 5 }
    }
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            max_concurrent_extractions: 5,
            request_timeout_secs: 60,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 1000,
            max_backoff_ms: 10000,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 10000,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let path = env::var("GRAPHRAG_CONFIG").unwrap_or_else(|_| CONFIG_FILE.into());
        Self::load_with(&path, Environment::default())
    }

    /// Load from `path` layered under `env`; exposed so tests can supply a fake environment
    pub fn load_with(path: &str, env: Environment) -> Result<Self, ConfigError> {
        let config: AppConfig = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                env.prefix("GRAPHRAG")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.qdrant.dimension == 0 {
            return Err(ConfigError::Message("qdrant.dimension must be positive".into()));
        }
        if self.query.default_limit == 0 {
            return Err(ConfigError::Message("query.default_limit must be positive".into()));
        }
        if self.concurrency.request_timeout_secs == 0 {
            return Err(ConfigError::Message(
                "concurrency.request_timeout_secs must be positive".into(),
            ));
        }
        if self.concurrency.max_concurrent_extractions == 0 {
            return Err(ConfigError::Message(
                "concurrency.max_concurrent_extractions must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.concurrency.request_timeout_secs)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn fake_env(vars: &[(&str, &str)]) -> Environment {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Environment::default().source(Some(map))
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.qdrant.dimension, 768);
        assert_eq!(
            known_embedding_dimension(&config.llm.embedding_model),
            Some(config.qdrant.dimension)
        );
        assert_eq!(config.context.max_chars, 4000);
        assert_eq!(config.query.default_limit, 5);
        assert_eq!(config.llm.provider, LlmProvider::Ollama);
    }

    #[test]
    fn test_known_embedding_dimensions() {
        assert_eq!(known_embedding_dimension("nomic-embed-text:latest"), Some(768));
        assert_eq!(known_embedding_dimension("text-embedding-3-small"), Some(1536));
        assert_eq!(known_embedding_dimension("custom-model"), None);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = AppConfig::load_with("/nonexistent/graphrag.toml", fake_env(&[])).unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.neo4j.user, "neo4j");
    }

    #[test]
    fn test_file_then_env_layering() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[qdrant]\ncollection = \"from_file\"\ndimension = 768\n\n[llm]\nprovider = \"openai\"\n"
        )
        .unwrap();

        let env = fake_env(&[
            ("GRAPHRAG_NEO4J__PASSWORD", "s3cret"),
            ("GRAPHRAG_QDRANT__DIMENSION", "384"),
        ]);
        let config = AppConfig::load_with(file.path().to_str().unwrap(), env).unwrap();

        assert_eq!(config.qdrant.collection, "from_file");
        assert_eq!(config.qdrant.dimension, 384);
        assert_eq!(config.neo4j.password, "s3cret");
        assert_eq!(config.llm.provider, LlmProvider::OpenAi);
        // untouched sections keep their defaults
        assert_eq!(config.retry.max_retries, 3);
    }

    #[test]
    fn test_rejects_zero_values() {
        let mut config = AppConfig::default();
        config.qdrant.dimension = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.query.default_limit = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.concurrency.max_concurrent_extractions = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.concurrency.request_timeout_secs = 0;
        assert!(config.validate().is_err());

        let err = AppConfig::load_with("/nonexistent.toml", fake_env(&[("GRAPHRAG_QUERY__DEFAULT_LIMIT", "0")]));
        assert!(err.is_err());
    }
}
