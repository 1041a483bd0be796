use std::thread;
use std::time::Duration;

use hdr_core::config::{AiSettings, ProviderName, GEMINI_TIMEOUT};
use hdr_core::error::{AppError, ErrorKind};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::prompts::{general_prompt, grounded_prompt};
use super::{describe_transport, AnswerMode, Provider};
use crate::model::{Chunk, ConversationTurn};

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const BATCH_PROGRESS_EVERY: usize = 5;
const BATCH_PAUSE_EVERY: usize = 10;
const BATCH_PAUSE: Duration = Duration::from_millis(50);
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Hosted Gemini client (generateContent + embedContent).
///
/// The API key travels in a header, never in the URL, so transport errors and
/// logs that echo the request URL cannot carry it.
#[derive(Clone)]
pub struct GeminiClient {
    api_key: String,
    base_url: String,
    model: String,
    embedding_model: String,
    timeout: Duration,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("embedding_model", &self.embedding_model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Clone, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Clone, Serialize)]
struct EmbedRequest<'a> {
    model: String,
    content: Content<'a>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_k: u32,
    top_p: f32,
    max_output_tokens: u32,
}

impl GenerationConfig {
    fn for_mode(mode: AnswerMode) -> Self {
        match mode {
            AnswerMode::Grounded => Self {
                temperature: 0.7,
                top_k: 40,
                top_p: 0.95,
                max_output_tokens: 2048,
            },
            AnswerMode::General => Self {
                temperature: 0.8,
                top_k: 40,
                top_p: 0.95,
                max_output_tokens: 1024,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingValues {
    #[serde(default)]
    values: Vec<f32>,
}

#[derive(Debug, Clone, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Clone, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Clone, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

/// Map a non-200 Gemini reply onto an error kind.
///
/// Quota exhaustion shows up either as HTTP 429 or as a `RESOURCE_EXHAUSTED`
/// status inside the error envelope.
pub fn classify_error(status: u16, body: &str) -> AppError {
    let envelope = serde_json::from_str::<ErrorEnvelope>(body).ok();
    let (upstream_message, upstream_status) = match &envelope {
        Some(env) => (env.error.message.as_str(), env.error.status.as_str()),
        None => ("", ""),
    };

    let exhausted = upstream_status == "RESOURCE_EXHAUSTED"
        || upstream_message.to_ascii_lowercase().contains("resource exhausted");

    let message = if upstream_message.is_empty() {
        format!("Gemini request failed with HTTP {status}")
    } else {
        format!("Gemini API error: {upstream_message}")
    };
    let details = format!("status={status}; upstream_status={upstream_status}");

    if status == 429 || exhausted {
        AppError::new(ErrorKind::RateLimited, "AI_GEMINI_RATE_LIMITED", message)
            .with_details(details)
            .with_retryable(true)
    } else {
        AppError::new(ErrorKind::Provider, "AI_GEMINI_REQUEST_FAILED", message)
            .with_details(details)
            .with_retryable(status >= 500)
    }
}

impl GeminiClient {
    pub fn new(
        api_key: &str,
        base_url: &str,
        model: &str,
        embedding_model: &str,
    ) -> Result<Self, AppError> {
        if api_key.trim().is_empty() {
            return Err(AppError::new(
                ErrorKind::Configuration,
                "AI_GEMINI_NOT_CONFIGURED",
                "GEMINI_API_KEY is not set",
            ));
        }
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if !(base_url.starts_with("https://") || base_url.starts_with("http://")) {
            return Err(AppError::new(
                ErrorKind::Configuration,
                "AI_GEMINI_BAD_URL",
                "Gemini base URL must be http(s)",
            )
            .with_details(format!("base_url={base_url}")));
        }

        Ok(Self {
            api_key: api_key.trim().to_string(),
            base_url,
            model: model.to_string(),
            embedding_model: embedding_model.to_string(),
            timeout: GEMINI_TIMEOUT,
        })
    }

    pub fn from_settings(settings: &AiSettings) -> Result<Self, AppError> {
        let key = settings.gemini_api_key.as_deref().unwrap_or_default();
        Self::new(
            key,
            &settings.gemini_base_url,
            &settings.gemini_model,
            &settings.gemini_embedding_model,
        )
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T, AppError> {
        let resp = ureq::post(&self.url(path))
            .set(API_KEY_HEADER, &self.api_key)
            .timeout(self.timeout)
            .send_json(body);

        let raw = match resp {
            Ok(r) => r.into_string().map_err(|e| {
                AppError::new(ErrorKind::Decode, "AI_GEMINI_DECODE_FAILED", "Failed to read Gemini response")
                    .with_details(format!("path={path}; err={e}"))
            })?,
            Err(ureq::Error::Status(code, r)) => {
                let body = r.into_string().unwrap_or_default();
                return Err(classify_error(code, &body));
            }
            Err(ureq::Error::Transport(t)) => {
                return Err(AppError::new(
                    ErrorKind::ProviderUnavailable,
                    "AI_GEMINI_UNREACHABLE",
                    "Failed to reach Gemini",
                )
                .with_details(format!("path={path}; err={}", describe_transport(&t)))
                .with_retryable(true));
            }
        };

        serde_json::from_str(&raw).map_err(|e| {
            AppError::new(ErrorKind::Decode, "AI_GEMINI_DECODE_FAILED", "Failed to decode Gemini response")
                .with_details(format!("path={path}; err={e}"))
        })
    }

    fn generate(&self, prompt: &str, mode: AnswerMode) -> Result<String, AppError> {
        let req = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig::for_mode(mode),
        };
        let body = serde_json::to_value(req).map_err(|e| {
            AppError::new(ErrorKind::Decode, "AI_GEMINI_ENCODE_FAILED", "Failed to encode Gemini request")
                .with_details(e.to_string())
        })?;

        let resp: GenerateResponse =
            self.post(&format!("models/{}:generateContent", self.model), body)?;

        resp.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text)
            .ok_or_else(|| {
                AppError::new(
                    ErrorKind::Decode,
                    "AI_GEMINI_EMPTY_ANSWER",
                    "Gemini response contained no answer text",
                )
            })
    }
}

impl Provider for GeminiClient {
    fn name(&self) -> ProviderName {
        ProviderName::Gemini
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    fn is_available(&self) -> bool {
        let url = self.url(&format!("models/{}", self.model));
        match ureq::get(&url)
            .set(API_KEY_HEADER, &self.api_key)
            .timeout(PROBE_TIMEOUT)
            .call()
        {
            Ok(r) => r.status() == 200,
            Err(ureq::Error::Status(code, _)) => {
                tracing::debug!(provider = "gemini", status = code, "liveness probe rejected");
                false
            }
            Err(ureq::Error::Transport(t)) => {
                tracing::debug!(provider = "gemini", err = %describe_transport(&t), "liveness probe failed");
                false
            }
        }
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, AppError> {
        let req = EmbedRequest {
            model: format!("models/{}", self.embedding_model),
            content: Content {
                parts: vec![Part { text }],
            },
        };
        let body = serde_json::to_value(req).map_err(|e| {
            AppError::new(ErrorKind::Decode, "AI_GEMINI_ENCODE_FAILED", "Failed to encode Gemini request")
                .with_details(e.to_string())
        })?;

        let resp: EmbedResponse = self.post(
            &format!("models/{}:embedContent", self.embedding_model),
            body,
        )?;
        if resp.embedding.values.is_empty() {
            return Err(AppError::new(
                ErrorKind::Decode,
                "AI_GEMINI_EMPTY_EMBEDDING",
                "Gemini returned an empty embedding",
            ));
        }
        Ok(resp.embedding.values)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, AppError> {
        let total = texts.len();
        let mut out = Vec::with_capacity(total);

        for (i, text) in texts.iter().enumerate() {
            let done = i + 1;
            let vector = self.embed(text).map_err(|e| {
                tracing::warn!(provider = "gemini", index = i, total, code = %e.code, "batch embedding aborted");
                e
            })?;
            out.push(vector);

            if done % BATCH_PROGRESS_EVERY == 0 || done == total {
                tracing::debug!(provider = "gemini", done, total, "batch embedding progress");
            }
            if done % BATCH_PAUSE_EVERY == 0 && done < total {
                thread::sleep(BATCH_PAUSE);
            }
        }

        Ok(out)
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_429_is_rate_limited() {
        let err = classify_error(429, "");
        assert_eq!(err.kind, ErrorKind::RateLimited);
        assert!(err.retryable);
    }

    #[test]
    fn resource_exhausted_envelope_is_rate_limited() {
        let body = r#"{"error":{"code":400,"message":"Quota exceeded","status":"RESOURCE_EXHAUSTED"}}"#;
        let err = classify_error(400, body);
        assert_eq!(err.kind, ErrorKind::RateLimited);
        assert_eq!(err.message, "Gemini API error: Quota exceeded");

        let body = r#"{"error":{"message":"Resource exhausted (e.g. check quota).","status":"UNKNOWN"}}"#;
        assert!(classify_error(400, body).is_rate_limited());
    }

    #[test]
    fn other_failures_keep_upstream_message() {
        let body = r#"{"error":{"code":400,"message":"API key not valid","status":"INVALID_ARGUMENT"}}"#;
        let err = classify_error(400, body);
        assert_eq!(err.kind, ErrorKind::Provider);
        assert_eq!(err.message, "Gemini API error: API key not valid");
        assert!(!err.retryable);

        let err = classify_error(503, "<html>oops</html>");
        assert_eq!(err.kind, ErrorKind::Provider);
        assert!(err.retryable);
    }

    #[test]
    fn requires_api_key() {
        let err = GeminiClient::new("  ", "https://x", "m", "e").expect_err("no key");
        assert_eq!(err.kind, ErrorKind::Configuration);

        let err = GeminiClient::from_settings(&AiSettings::default()).expect_err("no key");
        assert_eq!(err.code, "AI_GEMINI_NOT_CONFIGURED");
    }

    #[test]
    fn debug_output_hides_the_key() {
        let client = GeminiClient::new("sk-live-123", "https://x", "m", "e").expect("client");
        let dbg = format!("{client:?}");
        assert!(!dbg.contains("sk-live-123"));
        assert!(dbg.contains("<redacted>"));
        assert_eq!(client.url("models/m"), "https://x/models/m");
    }

    #[test]
    fn generation_config_uses_camel_case() {
        let v = serde_json::to_value(GenerationConfig::for_mode(AnswerMode::General)).expect("encode");
        assert_eq!(v["topK"], 40);
        assert_eq!(v["maxOutputTokens"], 1024);
    }
}
