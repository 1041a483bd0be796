use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A bounded slice of a document's words, the unit of retrieval.
///
/// Serialized with the snapshot's historical key names (`chunk_number`, `start`,
/// `end`, `file_id`) so existing `data.json` files keep loading.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "file_id", default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    #[serde(rename = "chunk_number")]
    pub sequence_number: u32,
    pub source: String,
    pub text: String,
    #[serde(rename = "start")]
    pub start_word: usize,
    #[serde(rename = "end")]
    pub end_word: usize,
}

impl Chunk {
    pub fn new(source: &str, sequence_number: u32, text: &str, start_word: usize, end_word: usize) -> Self {
        Self {
            id: Self::derive_id(source, sequence_number, text),
            document_id: None,
            sequence_number,
            source: source.to_string(),
            text: text.to_string(),
            start_word,
            end_word,
        }
    }

    /// Content-derived, so re-chunking the same document yields the same ids.
    pub fn derive_id(source: &str, sequence_number: u32, text: &str) -> String {
        let payload = format!("source={source}\nsequence={sequence_number}\ntext={text}");
        let digest = hex::encode(Sha256::digest(payload.as_bytes()));
        digest[..16].to_string()
    }

    /// Human-facing attribution, one-based.
    pub fn fragment_label(&self) -> String {
        format!("Fragment {} of {}", self.sequence_number + 1, self.source)
    }

    pub fn word_count(&self) -> usize {
        self.end_word.saturating_sub(self.start_word)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    #[serde(other)]
    Assistant,
}

impl Role {
    pub fn label(self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationTurn {
    pub role: Role,
    pub text: String,
}

impl ConversationTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    pub chunk: Chunk,
    pub score: f32,
}

/// Persisted form of the whole index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct IndexSnapshot {
    #[serde(default)]
    pub chunks: Vec<Chunk>,
    #[serde(default)]
    pub embeddings: Vec<Vec<f32>>,
    #[serde(default)]
    pub updated_at: Option<String>,
}
