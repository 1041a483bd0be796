//! One entry point over the hosted and local providers, with single-shot failover.
//!
//! Generation calls go to the effective primary first. Embedding calls go to
//! the hosted provider first whenever it exists, even when the local provider
//! is the generation primary: hashed local vectors are a placeholder, and the
//! index is only useful when one embedding source dominates it.

use hdr_core::config::{AiSettings, ProviderConfig, ProviderName};
use hdr_core::error::{AppError, ErrorKind};
use serde::{Deserialize, Serialize};

use crate::model::{Chunk, ConversationTurn};
use crate::providers::{GeminiClient, InstalledModel, OllamaClient, Provider};

pub type BoxedProvider = Box<dyn Provider>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderStatus {
    pub provider: ProviderName,
    pub configured: bool,
    pub available: bool,
    pub model: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AiStatus {
    pub configured_provider: ProviderName,
    pub active_provider: ProviderName,
    pub embedding_provider: ProviderName,
    pub fallback_enabled: bool,
    pub providers: Vec<ProviderStatus>,
    pub installed_models: Vec<InstalledModel>,
    pub message: String,
}

pub struct ProviderOrchestrator {
    settings: AiSettings,
    primary: ProviderName,
    remote: Option<BoxedProvider>,
    local: Option<BoxedProvider>,
}

impl std::fmt::Debug for ProviderOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderOrchestrator")
            .field("primary", &self.primary)
            .field("fallback_enabled", &self.settings.fallback_enabled)
            .field("remote", &self.remote.is_some())
            .field("local", &self.local.is_some())
            .finish()
    }
}

impl ProviderOrchestrator {
    /// Build the real clients from settings.
    ///
    /// The local client is only built when it can be used (fallback on, or it is
    /// the configured primary); as primary it must also pass a liveness probe.
    pub fn from_settings(settings: AiSettings) -> Result<Self, AppError> {
        let remote: Option<BoxedProvider> = if settings.gemini_configured() {
            match GeminiClient::from_settings(&settings) {
                Ok(client) => {
                    tracing::info!(provider = "gemini", model = %settings.gemini_model, "provider initialized");
                    Some(Box::new(client))
                }
                Err(e) => {
                    tracing::warn!(provider = "gemini", err = %e, "provider failed to initialize");
                    None
                }
            }
        } else {
            None
        };

        let wants_local = settings.fallback_enabled || settings.provider == ProviderName::Ollama;
        let local: Option<BoxedProvider> = if wants_local {
            let built = OllamaClient::from_settings(&settings).and_then(|client| {
                if settings.provider == ProviderName::Ollama {
                    client.health_check()?;
                }
                Ok(client)
            });
            match built {
                Ok(client) => {
                    tracing::info!(provider = "ollama", model = %settings.ollama_model, "provider initialized");
                    Some(Box::new(client))
                }
                Err(e) => {
                    tracing::warn!(provider = "ollama", err = %e, "provider failed to initialize");
                    None
                }
            }
        } else {
            None
        };

        Self::with_providers(settings, remote, local)
    }

    /// Assemble from already-built providers. At least one must be present.
    pub fn with_providers(
        settings: AiSettings,
        remote: Option<BoxedProvider>,
        local: Option<BoxedProvider>,
    ) -> Result<Self, AppError> {
        if remote.is_none() && local.is_none() {
            return Err(AppError::new(
                ErrorKind::Configuration,
                "AI_NO_PROVIDER_AVAILABLE",
                "No AI provider is available; set GEMINI_API_KEY or run Ollama",
            )
            .with_details(format!(
                "provider={}; fallback_enabled={}",
                settings.provider, settings.fallback_enabled
            )));
        }

        for (slot, expected) in [(&remote, ProviderName::Gemini), (&local, ProviderName::Ollama)] {
            if let Some(actual) = slot.as_deref().map(|p| p.name()).filter(|n| *n != expected) {
                return Err(AppError::new(
                    ErrorKind::Configuration,
                    "AI_PROVIDER_SLOT_MISMATCH",
                    "Provider placed in the wrong slot",
                )
                .with_details(format!("slot={expected}; provider={actual}")));
            }
        }

        let configured = settings.provider;
        let has = |name: ProviderName| match name {
            ProviderName::Gemini => remote.is_some(),
            ProviderName::Ollama => local.is_some(),
        };
        let primary = if has(configured) {
            configured
        } else {
            let other = configured.other();
            tracing::warn!(configured = %configured, using = %other, "configured provider unavailable; switching primary");
            other
        };

        tracing::info!(primary = %primary, fallback_enabled = settings.fallback_enabled, "provider orchestrator ready");
        Ok(Self {
            settings,
            primary,
            remote,
            local,
        })
    }

    pub fn primary(&self) -> ProviderName {
        self.primary
    }

    pub fn fallback_enabled(&self) -> bool {
        self.settings.fallback_enabled
    }

    pub fn settings(&self) -> &AiSettings {
        &self.settings
    }

    pub fn has_provider(&self, name: ProviderName) -> bool {
        self.slot(name).is_some()
    }

    /// Immutable per-provider view, `primary` reflecting the effective primary.
    pub fn provider_config(&self, name: ProviderName) -> ProviderConfig {
        let mut config = self.settings.provider_config(name);
        config.primary = name == self.primary;
        config
    }

    /// Hosted provider when present, else local.
    pub fn embedding_provider(&self) -> ProviderName {
        if self.remote.is_some() {
            ProviderName::Gemini
        } else {
            ProviderName::Ollama
        }
    }

    fn slot(&self, name: ProviderName) -> Option<&dyn Provider> {
        match name {
            ProviderName::Gemini => self.remote.as_deref(),
            ProviderName::Ollama => self.local.as_deref(),
        }
    }

    /// Run `call` on `first`; on failure retry once on the other provider when
    /// fallback allows it. The caller always sees the first provider's error.
    fn with_failover<T>(
        &self,
        operation: &'static str,
        first: ProviderName,
        probe_secondary: bool,
        call: impl Fn(&dyn Provider) -> Result<T, AppError>,
    ) -> Result<T, AppError> {
        let Some(provider) = self.slot(first) else {
            return Err(AppError::new(
                ErrorKind::Configuration,
                "AI_NO_PROVIDER_AVAILABLE",
                "No AI provider is available",
            )
            .with_details(format!("operation={operation}; provider={first}")));
        };

        let primary_err = match call(provider) {
            Ok(v) => return Ok(v),
            Err(e) => e,
        };

        if !self.settings.fallback_enabled {
            return Err(primary_err);
        }
        let second = first.other();
        let Some(secondary) = self.slot(second) else {
            return Err(primary_err);
        };
        if probe_secondary && !secondary.is_available() {
            tracing::warn!(operation, failed = %first, fallback = %second, code = %primary_err.code, "fallback provider not available");
            return Err(primary_err);
        }

        tracing::warn!(operation, failed = %first, fallback = %second, kind = ?primary_err.kind, code = %primary_err.code, "failing over");
        match call(secondary) {
            Ok(v) => Ok(v),
            Err(secondary_err) => {
                tracing::warn!(operation, provider = %second, err = %secondary_err, "fallback provider also failed");
                Err(primary_err)
            }
        }
    }

    pub fn embed(&self, text: &str) -> Result<Vec<f32>, AppError> {
        self.with_failover("embed", self.embedding_provider(), false, |p| p.embed(text))
    }

    pub fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, AppError> {
        self.with_failover("embed_batch", self.embedding_provider(), false, |p| {
            p.embed_batch(texts)
        })
    }

    pub fn generate_grounded_answer(
        &self,
        question: &str,
        context: &[Chunk],
        history: &[ConversationTurn],
    ) -> Result<String, AppError> {
        self.with_failover("generate_grounded_answer", self.primary, true, |p| {
            p.generate_grounded_answer(question, context, history)
        })
    }

    pub fn generate_general_answer(
        &self,
        question: &str,
        history: &[ConversationTurn],
    ) -> Result<String, AppError> {
        self.with_failover("generate_general_answer", self.primary, true, |p| {
            p.generate_general_answer(question, history)
        })
    }

    /// Probe both providers and describe how requests will be routed.
    pub fn status(&self) -> AiStatus {
        let remote_available = self.remote.as_deref().is_some_and(|p| p.is_available());
        let local_available = self.local.as_deref().is_some_and(|p| p.is_available());

        let gemini = ProviderStatus {
            provider: ProviderName::Gemini,
            configured: self.remote.is_some(),
            available: remote_available,
            model: self.remote.as_deref().map(|p| p.model_id().to_string()),
            message: match (self.remote.is_some(), remote_available) {
                (false, _) => "Gemini is not configured (GEMINI_API_KEY missing)".to_string(),
                (true, true) => "Gemini is configured and reachable".to_string(),
                (true, false) => "Gemini is configured but not reachable".to_string(),
            },
        };
        let ollama = ProviderStatus {
            provider: ProviderName::Ollama,
            configured: self.local.is_some(),
            available: local_available,
            model: self.local.as_deref().map(|p| p.model_id().to_string()),
            message: match (self.local.is_some(), local_available) {
                (false, _) => "Ollama is not in use".to_string(),
                (true, true) => "Ollama is running".to_string(),
                (true, false) => "Ollama is not available (not running or not installed)".to_string(),
            },
        };

        let installed_models = match self.local.as_deref() {
            Some(p) if local_available => p.installed_models().unwrap_or_else(|e| {
                tracing::warn!(err = %e, "failed to list installed models");
                Vec::new()
            }),
            _ => Vec::new(),
        };

        let available = |name: ProviderName| match name {
            ProviderName::Gemini => remote_available,
            ProviderName::Ollama => local_available,
        };
        let message = usage_message(
            self.primary,
            self.settings.fallback_enabled,
            available(self.primary),
            available(self.primary.other()),
        );

        AiStatus {
            configured_provider: self.settings.provider,
            active_provider: self.primary,
            embedding_provider: self.embedding_provider(),
            fallback_enabled: self.settings.fallback_enabled,
            providers: vec![gemini, ollama],
            installed_models,
            message,
        }
    }
}

fn usage_message(
    primary: ProviderName,
    fallback_enabled: bool,
    primary_available: bool,
    secondary_available: bool,
) -> String {
    let main = primary.display_name();
    let backup = primary.other().display_name();
    match (primary_available, fallback_enabled, secondary_available) {
        (true, true, true) => {
            format!("Using {main} as primary. {backup} is available as automatic fallback.")
        }
        (true, true, false) => format!(
            "Using {main} as primary. Fallback to {backup} is enabled but {backup} is not available."
        ),
        (true, false, _) => format!("Using {main} only (fallback disabled)."),
        (false, true, true) => format!(
            "{main} is not responding. Requests will fail over to {backup}."
        ),
        (false, _, _) => "No provider is currently reachable. Check the configuration.".to_string(),
    }
}
