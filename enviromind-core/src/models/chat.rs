use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Message returned to callers when the question is missing or blank.
pub const EMPTY_QUESTION: &str = "Question cannot be empty";

/// Storage-assigned record identifier. Only a [`crate::ChatStore`] can mint one
/// from user input, via `parse_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(Uuid);

impl RecordId {
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for RecordId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// One persisted question/answer pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ChatRecord {
    #[sqlx(try_from = "Uuid")]
    pub id: RecordId,
    pub question: String,
    pub answer: String,
    #[serde(rename = "askedAt")]
    pub asked_at: DateTime<Utc>,
}

/// A record before the store assigns its id.
#[derive(Debug, Clone)]
pub struct NewChatRecord {
    pub question: String,
    pub answer: String,
    pub asked_at: DateTime<Utc>,
}

impl NewChatRecord {
    /// Stamp the record with the server clock.
    pub fn now(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
            asked_at: Utc::now(),
        }
    }

    pub fn with_id(self, id: RecordId) -> ChatRecord {
        ChatRecord {
            id,
            question: self.question,
            answer: self.answer,
            asked_at: self.asked_at,
        }
    }
}

/// Inbound body of `POST /api/chat`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub question: String,
}

impl ChatRequest {
    /// The question with surrounding whitespace removed, or `None` if nothing is left.
    pub fn trimmed_question(&self) -> Option<&str> {
        let q = self.question.trim();
        (!q.is_empty()).then_some(q)
    }
}

/// Outbound body of `POST /api/chat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub answer: String,
    pub id: RecordId,
    #[serde(rename = "askedAt")]
    pub asked_at: DateTime<Utc>,
}

impl From<&ChatRecord> for ChatResponse {
    fn from(record: &ChatRecord) -> Self {
        Self {
            answer: record.answer.clone(),
            id: record.id,
            asked_at: record.asked_at,
        }
    }
}
