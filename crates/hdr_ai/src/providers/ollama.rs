use std::time::Duration;

use hdr_core::config::{AiSettings, ProviderName, OLLAMA_TIMEOUT};
use hdr_core::error::{AppError, ErrorKind};
use serde::{Deserialize, Serialize};

use super::hashed_embedding::hashed_embedding;
use super::prompts::{general_prompt, grounded_prompt};
use super::{describe_transport, AnswerMode, Provider};
use crate::model::{Chunk, ConversationTurn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);
const PROBE_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Local Ollama runtime. Generation goes to `/api/generate`; embeddings are
/// synthesized locally (see [`super::hashed_embedding`]).
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: String,
    model: String,
    agent: ureq::Agent,
    probe: ureq::Agent,
}

#[derive(Debug, Clone, Serialize)]
struct GenerateOptions {
    temperature: f32,
    top_p: f32,
    top_k: u32,
}

impl GenerateOptions {
    fn for_mode(mode: AnswerMode) -> Self {
        match mode {
            AnswerMode::Grounded => Self {
                temperature: 0.7,
                top_p: 0.9,
                top_k: 40,
            },
            AnswerMode::General => Self {
                temperature: 0.8,
                top_p: 0.95,
                top_k: 40,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Clone, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[derive(Debug, Clone, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct TagEntry {
    name: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    modified_at: String,
    #[serde(default)]
    digest: String,
}

/// A model present in the local runtime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstalledModel {
    pub name: String,
    pub size: u64,
    pub size_label: String,
    pub modified_at: String,
    pub digest: String,
}

/// Human-readable byte count: `B`, `KB`, `MB`, `GB`, `TB` in powers of 1024.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.2} {}", UNITS[unit])
    }
}

fn invalid_url(base_url: &str, why: &str) -> AppError {
    AppError::new(
        ErrorKind::Configuration,
        "AI_OLLAMA_BAD_URL",
        "Ollama base URL must be http(s)://host[:port]",
    )
    .with_details(format!("base_url={base_url}; reason={why}"))
}

/// Accepts `http(s)://host[:port]` with an optional trailing slash. Userinfo
/// and paths are rejected so the URL cannot smuggle another host.
fn validate_base_url(raw: &str) -> Result<String, AppError> {
    let base_url = raw.trim().trim_end_matches('/').to_string();
    let authority = base_url
        .strip_prefix("http://")
        .or_else(|| base_url.strip_prefix("https://"))
        .ok_or_else(|| invalid_url(&base_url, "scheme"))?;

    if authority.contains('@') {
        return Err(invalid_url(&base_url, "userinfo"));
    }
    if authority.contains('/') || authority.contains('?') || authority.contains('#') {
        return Err(invalid_url(&base_url, "path"));
    }

    let (host, port) = if let Some(rest) = authority.strip_prefix('[') {
        let (host, after) = rest
            .split_once(']')
            .ok_or_else(|| invalid_url(&base_url, "ipv6"))?;
        let port = match after {
            "" => None,
            p => Some(p.strip_prefix(':').ok_or_else(|| invalid_url(&base_url, "port"))?),
        };
        (host, port)
    } else {
        match authority.split_once(':') {
            Some((h, p)) => (h, Some(p)),
            None => (authority, None),
        }
    };

    if host.is_empty() {
        return Err(invalid_url(&base_url, "host"));
    }
    if let Some(port) = port {
        match port.parse::<u16>() {
            Ok(p) if p > 0 => {}
            _ => return Err(invalid_url(&base_url, "port")),
        }
    }

    Ok(base_url)
}

impl OllamaClient {
    pub fn new(base_url: &str, model: &str) -> Result<Self, AppError> {
        let base_url = validate_base_url(base_url)?;
        if model.trim().is_empty() {
            return Err(AppError::new(
                ErrorKind::Configuration,
                "AI_OLLAMA_NO_MODEL",
                "Ollama model name is required",
            ));
        }

        let agent = ureq::AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT)
            .timeout(OLLAMA_TIMEOUT)
            .build();
        let probe = ureq::AgentBuilder::new()
            .timeout_connect(PROBE_CONNECT_TIMEOUT)
            .timeout(PROBE_TIMEOUT)
            .build();

        Ok(Self {
            base_url,
            model: model.trim().to_string(),
            agent,
            probe,
        })
    }

    pub fn from_settings(settings: &AiSettings) -> Result<Self, AppError> {
        Self::new(&settings.ollama_base_url, &settings.ollama_model)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn health_check(&self) -> Result<(), AppError> {
        let url = format!("{}/api/tags", self.base_url);
        match self.probe.get(&url).call() {
            Ok(r) if r.status() == 200 => Ok(()),
            Ok(r) => Err(AppError::new(
                ErrorKind::ProviderUnavailable,
                "AI_OLLAMA_UNHEALTHY",
                "Ollama health check failed",
            )
            .with_details(format!("status={}", r.status()))),
            Err(ureq::Error::Status(code, _)) => Err(AppError::new(
                ErrorKind::ProviderUnavailable,
                "AI_OLLAMA_UNHEALTHY",
                "Ollama health check failed",
            )
            .with_details(format!("status={code}"))),
            Err(ureq::Error::Transport(t)) => Err(AppError::new(
                ErrorKind::ProviderUnavailable,
                "AI_OLLAMA_UNREACHABLE",
                "Failed to reach Ollama",
            )
            .with_details(format!("base_url={}; err={}", self.base_url, describe_transport(&t)))
            .with_retryable(true)),
        }
    }

    pub fn list_installed_models(&self) -> Result<Vec<InstalledModel>, AppError> {
        let url = format!("{}/api/tags", self.base_url);
        let resp = match self.probe.get(&url).call() {
            Ok(r) => r,
            Err(ureq::Error::Status(code, _)) => {
                return Err(AppError::new(
                    ErrorKind::Provider,
                    "AI_OLLAMA_LIST_FAILED",
                    "Failed to list Ollama models",
                )
                .with_details(format!("status={code}")))
            }
            Err(ureq::Error::Transport(t)) => {
                return Err(AppError::new(
                    ErrorKind::ProviderUnavailable,
                    "AI_OLLAMA_UNREACHABLE",
                    "Failed to reach Ollama",
                )
                .with_details(describe_transport(&t))
                .with_retryable(true))
            }
        };

        let tags: TagsResponse = resp.into_json().map_err(|e| {
            AppError::new(ErrorKind::Decode, "AI_OLLAMA_DECODE_FAILED", "Failed to decode Ollama model list")
                .with_details(e.to_string())
        })?;

        Ok(tags
            .models
            .into_iter()
            .map(|m| InstalledModel {
                size_label: format_bytes(m.size),
                name: m.name,
                size: m.size,
                modified_at: m.modified_at,
                digest: m.digest,
            })
            .collect())
    }

    fn generate(&self, prompt: &str, mode: AnswerMode) -> Result<String, AppError> {
        let url = format!("{}/api/generate", self.base_url);
        let req = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions::for_mode(mode),
        };
        let body = serde_json::to_value(req).map_err(|e| {
            AppError::new(ErrorKind::Decode, "AI_OLLAMA_ENCODE_FAILED", "Failed to encode Ollama request")
                .with_details(e.to_string())
        })?;

        match self.agent.post(&url).send_json(body) {
            Ok(r) => {
                let v: GenerateResponse = r.into_json().map_err(|e| {
                    AppError::new(ErrorKind::Decode, "AI_OLLAMA_DECODE_FAILED", "Failed to decode Ollama response")
                        .with_details(e.to_string())
                })?;
                let answer = v.response.trim();
                if answer.is_empty() {
                    return Err(AppError::new(
                        ErrorKind::Decode,
                        "AI_OLLAMA_EMPTY_ANSWER",
                        "Ollama response was empty",
                    ));
                }
                Ok(answer.to_string())
            }
            Err(ureq::Error::Status(code, r)) => {
                let body = r.into_string().unwrap_or_default();
                Err(AppError::new(
                    ErrorKind::Provider,
                    "AI_OLLAMA_REQUEST_FAILED",
                    format!("Ollama request failed with HTTP {code}"),
                )
                .with_details(format!("model={}; body={}", self.model, body.trim())))
            }
            Err(ureq::Error::Transport(t)) => Err(AppError::new(
                ErrorKind::ProviderUnavailable,
                "AI_OLLAMA_UNREACHABLE",
                "Failed to reach Ollama",
            )
            .with_details(format!("base_url={}; err={}", self.base_url, describe_transport(&t)))
            .with_retryable(true)),
        }
    }
}

impl Provider for OllamaClient {
    fn name(&self) -> ProviderName {
        ProviderName::Ollama
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    fn is_available(&self) -> bool {
        match self.health_check() {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(provider = "ollama", err = %e, "liveness probe failed");
                false
            }
        }
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, AppError> {
        Ok(hashed_embedding(text))
    }

    fn generate_grounded_answer(
        &self,
        question: &str,
        context: &[Chunk],
        history: &[ConversationTurn],
    ) -> Result<String, AppError> {
        self.generate(&grounded_prompt(question, context, history), AnswerMode::Grounded)
    }

    fn generate_general_answer(
        &self,
        question: &str,
        history: &[ConversationTurn],
    ) -> Result<String, AppError> {
        self.generate(&general_prompt(question, history), AnswerMode::General)
    }

    fn installed_models(&self) -> Result<Vec<InstalledModel>, AppError> {
        self.list_installed_models()
    }
}
