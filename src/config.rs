//! Pipeline configuration with environment-variable overrides.

use std::path::PathBuf;

/// Configuration for chunking, retrieval, and generation.
///
/// Defaults mirror the service's production settings; every field can be
/// overridden through the environment (see [`RagConfig::from_env`]).
#[derive(Clone, Debug)]
pub struct RagConfig {
    /// Token budget per chunk.
    pub chunk_size: usize,
    /// Token budget for the overlap carried between consecutive chunks.
    pub chunk_overlap: usize,
    /// Default number of results returned by a query.
    pub top_k: usize,
    /// Root directory for persisted state.
    pub data_dir: PathBuf,
    /// Dimension of the embedding vectors the index is built for.
    pub embedding_dimension: usize,
    /// Gemini API key; empty means generation is unconfigured.
    pub gemini_api_key: String,
    /// Gemini model identifier.
    pub gemini_model: String,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 75,
            top_k: 5,
            data_dir: PathBuf::from("data"),
            embedding_dimension: 384,
            gemini_api_key: String::new(),
            gemini_model: "gemini-3-flash-preview".to_string(),
        }
    }
}

impl RagConfig {
    /// Loads configuration from the environment, falling back to defaults.
    ///
    /// Reads `.env` first (when present) so local development mirrors
    /// deployment. Unparseable numeric values fall back silently.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        Self {
            chunk_size: env_usize("LUMINA_CHUNK_SIZE").unwrap_or(defaults.chunk_size),
            chunk_overlap: env_usize("LUMINA_CHUNK_OVERLAP").unwrap_or(defaults.chunk_overlap),
            top_k: env_usize("LUMINA_TOP_K").unwrap_or(defaults.top_k),
            data_dir: std::env::var("LUMINA_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            embedding_dimension: env_usize("LUMINA_EMBEDDING_DIMENSION")
                .unwrap_or(defaults.embedding_dimension),
            gemini_api_key: std::env::var("GEMINI_API_KEY").unwrap_or_default(),
            gemini_model: std::env::var("GEMINI_MODEL").unwrap_or(defaults.gemini_model),
        }
    }

    /// Directory holding the persisted flat index artifacts.
    pub fn index_dir(&self) -> PathBuf {
        self.data_dir.join("flat_index")
    }
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok()?.parse().ok()
}
