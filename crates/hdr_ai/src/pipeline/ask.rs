use hdr_core::config::ProviderName;
use hdr_core::error::{AppError, ErrorKind};
use serde::{Deserialize, Serialize};

use super::RagContext;
use crate::index::DEFAULT_TOP_K;
use crate::model::{Chunk, ConversationTurn};

/// Short greetings, thanks and meta questions answered without retrieval.
const GENERAL_PHRASES: &[&str] = &[
    "hello",
    "hi",
    "hey",
    "good morning",
    "good afternoon",
    "good evening",
    "how are you",
    "greetings",
    "thanks",
    "thank you",
    "you're welcome",
    "bye",
    "goodbye",
    "see you",
    "what can you do",
    "what do you do",
    "help me",
    "help",
    "who are you",
    "what are you",
    "introduce yourself",
    "hola",
    "buenos días",
    "buenas tardes",
    "buenas noches",
    "cómo estás",
    "qué tal",
    "saludos",
    "gracias",
    "de nada",
    "adiós",
    "hasta luego",
    "qué puedes hacer",
    "qué haces",
    "ayúdame",
    "quién eres",
    "qué eres",
];

/// Questions shorter than this (in characters) are treated as small talk.
const SHORT_QUESTION_CHARS: usize = 15;
const ATTRIBUTED_SOURCES: usize = 2;

const NO_DOCUMENTS_PROMPT: &str = "Briefly reply that no documents have been loaded yet and that the user can upload files. Be friendly and natural.";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "label", rename_all = "snake_case")]
pub enum AnswerSource {
    /// No document context was used.
    GeneralKnowledge,
    /// Documents matched but the question was small talk.
    DocumentsAndGeneralKnowledge,
    /// Nothing indexed yet.
    NoDocuments,
    /// Grounded answer; `Fragment N of <file>` labels, comma-joined.
    Fragments(String),
}

impl AnswerSource {
    pub fn label(&self) -> Option<&str> {
        match self {
            AnswerSource::GeneralKnowledge => Some("General knowledge"),
            AnswerSource::DocumentsAndGeneralKnowledge => Some("Documents + general knowledge"),
            AnswerSource::NoDocuments => None,
            AnswerSource::Fragments(labels) => Some(labels.as_str()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Answer {
    pub answer: String,
    pub source: AnswerSource,
    pub provider: ProviderName,
}

/// Lowercase, punctuation-free, space-padded form used for phrase matching.
fn normalize_for_matching(text: &str) -> String {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '\'' { c } else { ' ' })
        .collect();
    format!(" {} ", cleaned.split_whitespace().collect::<Vec<_>>().join(" "))
}

/// Greeting/thanks/help phrases (matched on word boundaries) or very short input.
pub fn is_general_question(question: &str) -> bool {
    let trimmed = question.trim();
    if trimmed.chars().count() < SHORT_QUESTION_CHARS {
        return true;
    }
    let haystack = normalize_for_matching(trimmed);
    GENERAL_PHRASES
        .iter()
        .any(|phrase| haystack.contains(&normalize_for_matching(phrase)))
}

fn fragment_labels(chunks: &[Chunk]) -> String {
    chunks
        .iter()
        .take(ATTRIBUTED_SOURCES)
        .map(Chunk::fragment_label)
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn answer_question(
    ctx: &RagContext,
    question: &str,
    history: &[ConversationTurn],
) -> Result<Answer, AppError> {
    let question = question.trim();
    if question.is_empty() {
        return Err(AppError::new(
            ErrorKind::InvalidInput,
            "QUESTION_EMPTY",
            "No question was provided",
        ));
    }

    let orch = &ctx.orchestrator;
    let provider = orch.primary();
    let general = is_general_question(question);

    if !ctx.index.has_data() {
        let (answer, source) = if general {
            (
                orch.generate_general_answer(question, history)?,
                AnswerSource::GeneralKnowledge,
            )
        } else {
            (
                orch.generate_general_answer(NO_DOCUMENTS_PROMPT, history)?,
                AnswerSource::NoDocuments,
            )
        };
        return Ok(Answer {
            answer,
            source,
            provider,
        });
    }

    let query = orch.embed(question)?;
    let hits = ctx.index.search(&query, DEFAULT_TOP_K);
    tracing::debug!(hits = hits.len(), general, "retrieval finished");

    if hits.is_empty() || general {
        let answer = if general {
            orch.generate_general_answer(question, history)?
        } else {
            let prompt = format!(
                "The user asks: {question}. No specific information was found in the loaded documents. Answer helpfully using your general knowledge."
            );
            orch.generate_general_answer(&prompt, history)?
        };
        let source = if hits.is_empty() {
            AnswerSource::GeneralKnowledge
        } else {
            AnswerSource::DocumentsAndGeneralKnowledge
        };
        return Ok(Answer {
            answer,
            source,
            provider,
        });
    }

    let context: Vec<Chunk> = hits.into_iter().map(|h| h.chunk).collect();
    let answer = orch.generate_grounded_answer(question, &context, history)?;
    Ok(Answer {
        answer,
        source: AnswerSource::Fragments(fragment_labels(&context)),
        provider,
    })
}
