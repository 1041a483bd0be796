use hdr_core::config::ProviderName;
use hdr_core::error::AppError;

use crate::model::{Chunk, ConversationTurn};

pub mod gemini;
pub mod hashed_embedding;
pub mod ollama;
pub mod prompts;

pub use gemini::GeminiClient;
pub use ollama::{InstalledModel, OllamaClient};

/// Capability surface shared by every model backend.
///
/// Errors carry an [`hdr_core::error::ErrorKind`] so callers can tell a quota
/// signal from an outage without reading message text.
pub trait Provider: Send + Sync {
    fn name(&self) -> ProviderName;

    fn model_id(&self) -> &str;

    /// Liveness probe. Never fails; any problem reads as `false`.
    fn is_available(&self) -> bool;

    fn embed(&self, text: &str) -> Result<Vec<f32>, AppError>;

    /// Order- and length-preserving. Stops at the first failure.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, AppError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    fn generate_grounded_answer(
        &self,
        question: &str,
        context: &[Chunk],
        history: &[ConversationTurn],
    ) -> Result<String, AppError>;

    fn generate_general_answer(
        &self,
        question: &str,
        history: &[ConversationTurn],
    ) -> Result<String, AppError>;

    /// Models the backend reports as installed. Hosted backends report none.
    fn installed_models(&self) -> Result<Vec<InstalledModel>, AppError> {
        Ok(Vec::new())
    }
}

/// Which of the two fixed sampling profiles a generation call uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerMode {
    Grounded,
    General,
}

/// Transport failure text without the request URL.
pub(crate) fn describe_transport(t: &ureq::Transport) -> String {
    let mut out = t.kind().to_string();
    if let Some(msg) = t.message() {
        out.push_str(": ");
        out.push_str(msg);
    }
    if let Some(source) = std::error::Error::source(t) {
        out.push_str(": ");
        out.push_str(&source.to_string());
    }
    out
}
