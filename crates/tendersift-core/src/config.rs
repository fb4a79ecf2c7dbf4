//! Pipeline configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::categories::CategoryTable;
use crate::error::{Error, Result};

/// Retrieval-mode context assembly settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagSettings {
    /// Use retrieval mode when a retriever is available.
    pub enabled: bool,
    /// Target chunk size in characters.
    pub chunk_chars: usize,
    /// Characters shared between consecutive chunks.
    pub chunk_overlap: usize,
    /// Hits per query for the core and content groups.
    pub top_k: usize,
    /// Hits per query for the summary group.
    pub summary_top_k: usize,
    /// Character budget of one assembled context window.
    pub context_chars: usize,
    /// Budget for one index or query call.
    pub timeout_secs: u64,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            chunk_chars: 3500,
            chunk_overlap: 400,
            top_k: 3,
            summary_top_k: 4,
            context_chars: 12_000,
            timeout_secs: 20,
        }
    }
}

/// Everything a pipeline run needs besides its collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Run the generative extraction pass.
    pub use_llm_extract: bool,
    /// Ask the evaluation collaborator for a bid evaluation.
    pub use_llm_eval: bool,
    pub llm_max_tokens: u32,
    pub llm_temperature: f32,
    pub llm_timeout_secs: u64,
    /// Completion responses larger than this are rejected.
    pub max_response_bytes: usize,
    /// Head slice passed to the generative extractor in direct mode.
    pub direct_context_chars: usize,
    /// Prefix scanned for the global header.
    pub header_chars: usize,
    pub rag: RagSettings,
    /// Documents processed in parallel by the batch runner.
    pub max_concurrency: usize,
    pub categories: CategoryTable,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            use_llm_extract: true,
            use_llm_eval: true,
            llm_max_tokens: 2000,
            llm_temperature: 0.0,
            llm_timeout_secs: 60,
            max_response_bytes: 64 * 1024,
            direct_context_chars: 15_000,
            header_chars: 6000,
            rag: RagSettings::default(),
            max_concurrency: 1,
            categories: CategoryTable::default(),
        }
    }
}

impl PipelineConfig {
    /// Load from a JSON file if it exists, then apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content)
                .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?
        } else {
            tracing::debug!("No pipeline config at {}, using defaults", path.display());
            Self::default()
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Apply `TENDERSIFT_*` environment overrides.
    pub fn apply_env(&mut self) {
        if let Some(v) = env_flag("TENDERSIFT_USE_RAG") {
            self.rag.enabled = v;
        }
        if let Some(v) = env_flag("TENDERSIFT_USE_LLM") {
            self.use_llm_extract = v;
            self.use_llm_eval = v;
        }
        if let Some(n) = std::env::var("TENDERSIFT_MAX_CONCURRENCY")
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
        {
            self.max_concurrency = n;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(Error::Config("max_concurrency must be at least 1".into()));
        }
        if self.rag.chunk_overlap >= self.rag.chunk_chars {
            return Err(Error::Config(
                "rag.chunk_overlap must be smaller than rag.chunk_chars".into(),
            ));
        }
        if self.categories.allowed.is_empty() {
            return Err(Error::Config("categories.allowed is empty".into()));
        }
        Ok(())
    }
}

fn env_flag(name: &str) -> Option<bool> {
    let v = std::env::var(name).ok()?;
    match v.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.llm_max_tokens, 2000);
        assert_eq!(config.direct_context_chars, 15_000);
        assert_eq!(config.rag.chunk_chars, 3500);
        assert_eq!(config.rag.chunk_overlap, 400);
        assert_eq!(config.rag.summary_top_k, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        std::fs::write(&path, r#"{"llm_max_tokens": 512, "rag": {"top_k": 5}}"#).unwrap();

        let config = PipelineConfig::load(&path).unwrap();
        assert_eq!(config.llm_max_tokens, 512);
        assert_eq!(config.rag.top_k, 5);
        assert_eq!(config.rag.chunk_chars, 3500);
        assert!(!config.categories.keywords.is_empty());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::load(dir.path().join("absent.json")).unwrap();
        assert_eq!(config.header_chars, 6000);
    }

    #[test]
    fn test_invalid_overlap_rejected() {
        let mut config = PipelineConfig::default();
        config.rag.chunk_overlap = config.rag.chunk_chars;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
