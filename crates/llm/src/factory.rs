//! LLM Factory - Provider Abstraction Layer
//!
//! Creates LLM backends from settings. Every pipeline component receives an
//! `Arc<dyn LlmBackend>` built here, so swapping providers is a config change.
//!
//! ## Example
//! ```ignore
//! let settings = load_settings(None, None)?;
//! let llm = LlmFactory::from_settings(&settings.llm)?;
//! let judge_llm = LlmFactory::from_settings_with_model(&settings.llm, settings.judge.model.as_deref())?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use rag_eval_config::{LlmConfig as LlmSettings, LlmProviderKind};

use crate::backend::{LlmBackend, LlmConfig, OllamaBackend, OpenAIBackend, OpenAIConfig};
use crate::LlmError;

/// LLM provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LlmProvider {
    /// OpenAI and OpenAI-compatible servers
    #[default]
    OpenAI,
    /// Ollama - local models
    Ollama,
}

impl From<LlmProviderKind> for LlmProvider {
    fn from(kind: LlmProviderKind) -> Self {
        match kind {
            LlmProviderKind::OpenAI => LlmProvider::OpenAI,
            LlmProviderKind::Ollama => LlmProvider::Ollama,
        }
    }
}

/// Unified LLM provider configuration
#[derive(Debug, Clone)]
pub struct LlmProviderConfig {
    /// Provider type
    pub provider: LlmProvider,
    /// API key (OpenAI)
    pub api_key: Option<String>,
    /// API endpoint
    pub endpoint: String,
    /// Model name or ID
    pub model: String,
    /// Completion length cap; unset leaves the provider default
    pub max_tokens: Option<usize>,
    pub temperature: f32,
    pub timeout: Duration,
    /// Transport-level retries
    pub max_retries: u32,
}

impl LlmProviderConfig {
    /// Build from the `llm` settings section
    pub fn from_settings(settings: &LlmSettings) -> Self {
        Self {
            provider: settings.provider.into(),
            api_key: settings.api_key.clone(),
            endpoint: settings.resolved_endpoint(),
            model: settings.model.clone(),
            max_tokens: settings.max_tokens.map(|n| n as usize),
            temperature: settings.temperature,
            timeout: Duration::from_secs(settings.timeout_secs),
            max_retries: settings.max_retries,
        }
    }

    /// Set model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

/// Factory for creating LLM backends
pub struct LlmFactory;

impl LlmFactory {
    /// Create a backend from provider config
    pub fn create(config: &LlmProviderConfig) -> Result<Arc<dyn LlmBackend>, LlmError> {
        match config.provider {
            LlmProvider::OpenAI => {
                let openai_config = OpenAIConfig {
                    endpoint: config.endpoint.clone(),
                    api_key: config.api_key.clone().unwrap_or_default(),
                    model: config.model.clone(),
                    max_tokens: config.max_tokens,
                    temperature: config.temperature,
                    timeout: config.timeout,
                    max_retries: config.max_retries,
                    ..Default::default()
                };
                Ok(Arc::new(OpenAIBackend::new(openai_config)?))
            }
            LlmProvider::Ollama => {
                let ollama_config = LlmConfig {
                    model: config.model.clone(),
                    endpoint: config.endpoint.clone(),
                    max_tokens: config.max_tokens,
                    temperature: config.temperature,
                    timeout: config.timeout,
                    max_retries: config.max_retries,
                    ..Default::default()
                };
                Ok(Arc::new(OllamaBackend::new(ollama_config)?))
            }
        }
    }

    /// Create a backend from the `llm` settings section
    pub fn from_settings(settings: &LlmSettings) -> Result<Arc<dyn LlmBackend>, LlmError> {
        Self::create(&LlmProviderConfig::from_settings(settings))
    }

    /// Same as [`Self::from_settings`] with an optional model override
    pub fn from_settings_with_model(
        settings: &LlmSettings,
        model: Option<&str>,
    ) -> Result<Arc<dyn LlmBackend>, LlmError> {
        let mut config = LlmProviderConfig::from_settings(settings);
        if let Some(model) = model {
            config = config.with_model(model);
        }
        Self::create(&config)
    }
}
