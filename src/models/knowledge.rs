use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct KnowledgeChunk {
    pub id: Uuid,
    pub source: String,
    pub chunk_index: i32,
    pub content: String,
    #[serde(skip_serializing)]
    pub content_hash: String,
    #[serde(skip_serializing)]
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, FromRow)]
pub struct KnowledgeSource {
    pub source: String,
    pub chunks: i64,
    pub updated_at: DateTime<Utc>,
}

/// Body for POST /admin/knowledge.
#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    pub source: String,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct IngestSummary {
    pub source: String,
    pub chunks: usize,
    pub embedded: usize,
    pub removed: u64,
}

/// Query params for DELETE /admin/knowledge.
#[derive(Debug, Deserialize)]
pub struct SourceQuery {
    pub source: String,
}

/// Body for POST /chat/context.
#[derive(Debug, Deserialize)]
pub struct ContextRequest {
    pub query: String,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScoredChunk {
    pub source: String,
    pub chunk_index: i32,
    pub content: String,
    pub score: f32,
}
