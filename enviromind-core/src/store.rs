//! Chat record storage seam.
//!
//! The HTTP layer only sees `dyn ChatStore`. `PgChatStore` (in `db`) is the
//! production backend; `MemoryChatStore` keeps records in process and backs
//! the router tests.

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::EnviroError;
use crate::models::chat::{ChatRecord, NewChatRecord, RecordId};

/// Create-and-read access to the chat record collection.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Persist a record and return it with its assigned id.
    async fn insert(&self, record: NewChatRecord) -> Result<ChatRecord, EnviroError>;

    /// All records, most recent `asked_at` first.
    async fn list(&self) -> Result<Vec<ChatRecord>, EnviroError>;

    /// Look up one record. `Ok(None)` when the id is well-formed but unknown.
    async fn find(&self, id: &RecordId) -> Result<Option<ChatRecord>, EnviroError>;

    /// Whether `raw` is a syntactically valid identifier for this backend.
    ///
    /// Only the lowercase hyphenated form that records are served with is
    /// accepted, so a fetched record's `id` always equals the requested one.
    fn parse_id(&self, raw: &str) -> Option<RecordId> {
        let id = Uuid::parse_str(raw).ok()?;
        let mut buf = Uuid::encode_buffer();
        (&*id.hyphenated().encode_lower(&mut buf) == raw).then(|| RecordId::from(id))
    }

    /// Liveness probe.
    async fn ping(&self) -> Result<(), EnviroError>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

/// In-process store. Records live for the lifetime of the value.
#[derive(Debug, Default)]
pub struct MemoryChatStore {
    records: RwLock<Vec<ChatRecord>>,
}

impl MemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl ChatStore for MemoryChatStore {
    async fn insert(&self, record: NewChatRecord) -> Result<ChatRecord, EnviroError> {
        let record = record.with_id(RecordId::new_v4());
        self.records.write().await.push(record.clone());
        Ok(record)
    }

    async fn list(&self) -> Result<Vec<ChatRecord>, EnviroError> {
        // Later inserts win ties on asked_at.
        let mut records: Vec<ChatRecord> =
            self.records.read().await.iter().rev().cloned().collect();
        records.sort_by(|a, b| b.asked_at.cmp(&a.asked_at));
        Ok(records)
    }

    async fn find(&self, id: &RecordId) -> Result<Option<ChatRecord>, EnviroError> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .find(|r| &r.id == id)
            .cloned())
    }

    async fn ping(&self) -> Result<(), EnviroError> {
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn record_at(question: &str, minutes_ago: i64) -> NewChatRecord {
        NewChatRecord {
            question: question.to_string(),
            answer: format!("answer to {}", question),
            asked_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    #[tokio::test]
    async fn test_insert_assigns_distinct_ids() {
        let store = MemoryChatStore::new();
        let a = store.insert(record_at("a", 0)).await.unwrap();
        let b = store.insert(record_at("b", 0)).await.unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_list_is_newest_first_regardless_of_insert_order() {
        let store = MemoryChatStore::new();
        store.insert(record_at("middle", 5)).await.unwrap();
        store.insert(record_at("oldest", 10)).await.unwrap();
        store.insert(record_at("newest", 1)).await.unwrap();

        let questions: Vec<String> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.question)
            .collect();
        assert_eq!(questions, vec!["newest", "middle", "oldest"]);
    }

    #[tokio::test]
    async fn test_find_returns_inserted_record_and_none_for_unknown() {
        let store = MemoryChatStore::new();
        let inserted = store.insert(record_at("composting", 0)).await.unwrap();

        let found = store.find(&inserted.id).await.unwrap();
        assert_eq!(found, Some(inserted));

        let unknown = RecordId::new_v4();
        assert_eq!(store.find(&unknown).await.unwrap(), None);
    }

    #[test]
    fn test_parse_id_accepts_uuid_only() {
        let store = MemoryChatStore::new();
        assert!(store.parse_id("6f1c1a3e-6c1f-4b7e-9f53-2a4a0c1d9e10").is_some());
        assert!(store.parse_id("not-an-id").is_none());
        assert!(store.parse_id("").is_none());
        assert!(store.parse_id("507f1f77bcf86cd799439011").is_none());
    }

    #[test]
    fn test_parse_id_rejects_non_canonical_uuid_forms() {
        let store = MemoryChatStore::new();
        for raw in [
            "6f1c1a3e6c1f4b7e9f532a4a0c1d9e10",
            "{6f1c1a3e-6c1f-4b7e-9f53-2a4a0c1d9e10}",
            "urn:uuid:6f1c1a3e-6c1f-4b7e-9f53-2a4a0c1d9e10",
            "6F1C1A3E-6C1F-4B7E-9F53-2A4A0C1D9E10",
        ] {
            assert!(store.parse_id(raw).is_none(), "{} should be rejected", raw);
        }
    }

    #[tokio::test]
    async fn test_parsed_id_matches_served_id() {
        let store = MemoryChatStore::new();
        let inserted = store.insert(record_at("wetlands", 0)).await.unwrap();
        let raw = inserted.id.to_string();

        let parsed = store.parse_id(&raw).expect("served id must parse");
        let found = store.find(&parsed).await.unwrap().unwrap();
        assert_eq!(found.id.to_string(), raw);
    }
}
