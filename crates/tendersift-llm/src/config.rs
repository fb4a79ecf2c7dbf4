//! LLM configuration persistence and provider selection.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::types::{LLMProvider, ResolvedProvider};

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_GROQ_MODEL: &str = "llama-3.3-70b-versatile";
pub const DEFAULT_AZURE_API_VERSION: &str = "2024-06-01";

const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";
const GROQ_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const ANTHROPIC_URL: &str = "https://api.anthropic.com/v1/messages";

/// Stored LLM configuration (persisted to llm-config.json).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    /// `auto`, `openai`, `azure`, `anthropic` or `groq`.
    #[serde(default = "default_preferred")]
    pub preferred_provider: String,
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default)]
    pub azure_api_key: Option<String>,
    #[serde(default)]
    pub azure_endpoint: Option<String>,
    #[serde(default)]
    pub azure_deployment: Option<String>,
    #[serde(default = "default_azure_api_version")]
    pub azure_api_version: String,
    #[serde(default)]
    pub anthropic_api_key: Option<String>,
    #[serde(default)]
    pub groq_api_key: Option<String>,
    #[serde(default = "default_openai_model")]
    pub openai_model: String,
    #[serde(default = "default_anthropic_model")]
    pub anthropic_model: String,
    #[serde(default = "default_groq_model")]
    pub groq_model: String,
}

fn default_preferred() -> String {
    "auto".into()
}
fn default_azure_api_version() -> String {
    DEFAULT_AZURE_API_VERSION.into()
}
fn default_openai_model() -> String {
    DEFAULT_OPENAI_MODEL.into()
}
fn default_anthropic_model() -> String {
    DEFAULT_ANTHROPIC_MODEL.into()
}
fn default_groq_model() -> String {
    DEFAULT_GROQ_MODEL.into()
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            preferred_provider: "auto".into(),
            openai_api_key: None,
            azure_api_key: None,
            azure_endpoint: None,
            azure_deployment: None,
            azure_api_version: DEFAULT_AZURE_API_VERSION.into(),
            anthropic_api_key: None,
            groq_api_key: None,
            openai_model: DEFAULT_OPENAI_MODEL.into(),
            anthropic_model: DEFAULT_ANTHROPIC_MODEL.into(),
            groq_model: DEFAULT_GROQ_MODEL.into(),
        }
    }
}

fn env_nonempty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl LLMConfig {
    /// Load config from file, falling back to env vars and defaults.
    pub fn load(config_path: &Path) -> Self {
        let mut config = match std::fs::read_to_string(config_path) {
            Ok(s) => serde_json::from_str(&s).unwrap_or_else(|e| {
                warn!("Ignoring malformed {}: {}", config_path.display(), e);
                LLMConfig::default()
            }),
            Err(_) => {
                debug!("No LLM config at {}, using env and defaults", config_path.display());
                LLMConfig::default()
            }
        };

        config.apply_env();
        config
    }

    /// Fill unset keys and Azure settings from the environment.
    pub fn apply_env(&mut self) {
        if self.openai_api_key.is_none() {
            self.openai_api_key = env_nonempty("OPENAI_API_KEY");
        }
        if self.azure_api_key.is_none() {
            self.azure_api_key = env_nonempty("AZURE_OPENAI_API_KEY");
        }
        if self.azure_endpoint.is_none() {
            self.azure_endpoint = env_nonempty("AZURE_OPENAI_ENDPOINT");
        }
        if self.azure_deployment.is_none() {
            self.azure_deployment = env_nonempty("AZURE_OPENAI_DEPLOYMENT");
        }
        if let Some(v) = env_nonempty("AZURE_OPENAI_API_VERSION") {
            self.azure_api_version = v;
        }
        if self.anthropic_api_key.is_none() {
            self.anthropic_api_key = env_nonempty("ANTHROPIC_API_KEY");
        }
        if self.groq_api_key.is_none() {
            self.groq_api_key = env_nonempty("GROQ_API_KEY");
        }
    }

    fn openai(&self) -> Option<ResolvedProvider> {
        self.openai_api_key.as_ref().map(|k| ResolvedProvider {
            provider: LLMProvider::OpenAI,
            model: self.openai_model.clone(),
            api_key: k.clone(),
            url: OPENAI_URL.into(),
        })
    }

    fn azure(&self) -> Option<ResolvedProvider> {
        let key = self.azure_api_key.as_ref()?;
        let endpoint = self.azure_endpoint.as_ref()?;
        let deployment = self.azure_deployment.as_ref()?;
        Some(ResolvedProvider {
            provider: LLMProvider::Azure,
            model: deployment.clone(),
            api_key: key.clone(),
            url: format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                endpoint.trim_end_matches('/'),
                deployment,
                self.azure_api_version
            ),
        })
    }

    fn anthropic(&self) -> Option<ResolvedProvider> {
        self.anthropic_api_key.as_ref().map(|k| ResolvedProvider {
            provider: LLMProvider::Anthropic,
            model: self.anthropic_model.clone(),
            api_key: k.clone(),
            url: ANTHROPIC_URL.into(),
        })
    }

    fn groq(&self) -> Option<ResolvedProvider> {
        self.groq_api_key.as_ref().map(|k| ResolvedProvider {
            provider: LLMProvider::Groq,
            model: self.groq_model.clone(),
            api_key: k.clone(),
            url: GROQ_URL.into(),
        })
    }

    /// Resolve which provider and model to use.
    pub fn resolve_provider(&self) -> Option<ResolvedProvider> {
        // Explicit preference
        if self.preferred_provider != "auto" {
            return match self.preferred_provider.as_str() {
                "openai" => self.openai(),
                "azure" => self.azure(),
                "anthropic" => self.anthropic(),
                "groq" => self.groq(),
                _ => None,
            };
        }

        // Auto mode: Azure > Anthropic > Groq > OpenAI
        self.azure()
            .or_else(|| self.anthropic())
            .or_else(|| self.groq())
            .or_else(|| self.openai())
    }
}
