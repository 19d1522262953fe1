use std::collections::HashSet;

use anyhow::Context;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use sqlx::PgPool;

use crate::{
    config::Config,
    db::tenant::schema_name,
    error::AppError,
    models::knowledge::{IngestSummary, KnowledgeChunk, KnowledgeSource, ScoredChunk},
    services::validation::required_text,
};

pub const MAX_CHUNK_CHARS: usize = 800;
pub const CHUNK_OVERLAP_CHARS: usize = 100;
pub const MAX_RESULTS: usize = 10;
pub const DEFAULT_RESULTS: usize = 4;
pub const MIN_SCORE: f32 = 0.2;

/// Splits text into chunks of at most `max_chars` characters.
///
/// Paragraphs are packed together while they fit; a paragraph longer than
/// `max_chars` is split on sentence ends, and a sentence longer than that is
/// cut hard with `overlap` characters repeated at the start of the next piece.
pub fn chunk_text(text: &str, max_chars: usize, overlap: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    let flush = |current: &mut String, chunks: &mut Vec<String>| {
        let trimmed = current.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }
        current.clear();
    };

    for paragraph in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        let pieces: Vec<String> = if paragraph.chars().count() <= max_chars {
            vec![paragraph.to_string()]
        } else {
            split_long(paragraph, max_chars, overlap)
        };

        for piece in pieces {
            let sep = if current.is_empty() { 0 } else { 2 };
            if current.chars().count() + sep + piece.chars().count() > max_chars {
                flush(&mut current, &mut chunks);
            }
            if !current.is_empty() {
                current.push_str("\n\n");
            }
            current.push_str(&piece);
        }
    }
    flush(&mut current, &mut chunks);
    chunks
}

fn split_long(paragraph: &str, max_chars: usize, overlap: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();

    for sentence in sentences(paragraph) {
        if sentence.chars().count() > max_chars {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
            out.extend(hard_split(&sentence, max_chars, overlap));
            continue;
        }
        let sep = if current.is_empty() { 0 } else { 1 };
        if current.chars().count() + sep + sentence.chars().count() > max_chars {
            out.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&sentence);
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

fn sentences(paragraph: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut chars = paragraph.chars().peekable();
    while let Some(c) = chars.next() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') && chars.peek().map_or(true, |n| n.is_whitespace()) {
            out.push(current.trim().to_string());
            current.clear();
        }
    }
    if !current.trim().is_empty() {
        out.push(current.trim().to_string());
    }
    out
}

fn hard_split(s: &str, max_chars: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = s.chars().collect();
    let step = max_chars.saturating_sub(overlap).max(1);
    let mut out = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + max_chars).min(chars.len());
        out.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }
    out
}

pub fn content_hash(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let (mut dot, mut na, mut nb) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na.sqrt() * nb.sqrt())
}

/// Best `limit` chunks scoring at least `min_score`, highest first.
pub fn rank(query: &[f32], chunks: Vec<KnowledgeChunk>, limit: usize, min_score: f32) -> Vec<ScoredChunk> {
    let mut scored: Vec<ScoredChunk> = chunks
        .into_iter()
        .map(|c| ScoredChunk {
            score: cosine_similarity(query, &c.embedding),
            source: c.source,
            chunk_index: c.chunk_index,
            content: c.content,
        })
        .filter(|c| c.score >= min_score)
        .collect();
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(limit);
    scored
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

/// Client for an OpenAI-compatible `/embeddings` endpoint.
pub struct EmbeddingsClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl EmbeddingsClient {
    /// Returns None if no API key is configured.
    pub fn new(config: &Config) -> Option<Self> {
        let api_key = config.embeddings_api_key.clone()?;
        Some(Self {
            client: Client::new(),
            base_url: config.embeddings_base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.embeddings_model.clone(),
        })
    }

    /// One embedding per input, in input order.
    pub async fn embed(&self, inputs: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        let res = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({ "model": self.model, "input": inputs }))
            .send()
            .await
            .context("Embeddings request failed")?
            .error_for_status()
            .context("Embeddings API returned an error")?
            .json::<EmbeddingResponse>()
            .await
            .context("Malformed embeddings response")?;

        let mut data = res.data;
        if data.len() != inputs.len() {
            anyhow::bail!(
                "Embeddings API returned {} vectors for {} inputs",
                data.len(),
                inputs.len()
            );
        }
        data.sort_by_key(|d| d.index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

pub struct KnowledgeService;

impl KnowledgeService {
    /// Replaces the content of `source`: unchanged chunks keep their
    /// embedding, new ones are embedded, vanished ones are deleted.
    pub async fn ingest(
        pool: &PgPool,
        embeddings: &EmbeddingsClient,
        tenant: &str,
        source: &str,
        text: &str,
    ) -> Result<IngestSummary, AppError> {
        let source = required_text(source, "Source", 255)?;
        let chunks = chunk_text(text, MAX_CHUNK_CHARS, CHUNK_OVERLAP_CHARS);
        if chunks.is_empty() {
            return Err(AppError::validation("Text is empty"));
        }
        let schema = schema_name(tenant);

        let existing: HashSet<String> = sqlx::query_scalar::<_, String>(&format!(
            r#"SELECT content_hash FROM "{schema}".knowledge_chunks WHERE source = $1"#
        ))
        .bind(&source)
        .fetch_all(pool)
        .await?
        .into_iter()
        .collect();

        let hashes: Vec<String> = chunks.iter().map(|c| content_hash(c)).collect();
        let mut seen = HashSet::new();
        let new: Vec<(usize, &String)> = chunks
            .iter()
            .enumerate()
            .filter(|(i, _)| !existing.contains(&hashes[*i]) && seen.insert(hashes[*i].clone()))
            .collect();

        let inputs: Vec<String> = new.iter().map(|(_, c)| (*c).clone()).collect();
        let vectors = embeddings.embed(&inputs).await?;

        let mut tx = pool.begin().await?;
        for ((i, content), embedding) in new.iter().zip(vectors) {
            sqlx::query(&format!(
                r#"INSERT INTO "{schema}".knowledge_chunks
                       (source, chunk_index, content, content_hash, embedding)
                   VALUES ($1, $2, $3, $4, $5)
                   ON CONFLICT (source, content_hash) DO NOTHING"#
            ))
            .bind(&source)
            .bind(*i as i32)
            .bind(*content)
            .bind(&hashes[*i])
            .bind(embedding)
            .execute(&mut *tx)
            .await?;
        }

        // Keep chunk order in sync for chunks that were already stored.
        for (i, hash) in hashes.iter().enumerate() {
            sqlx::query(&format!(
                r#"UPDATE "{schema}".knowledge_chunks SET chunk_index = $1
                   WHERE source = $2 AND content_hash = $3"#
            ))
            .bind(i as i32)
            .bind(&source)
            .bind(hash)
            .execute(&mut *tx)
            .await?;
        }

        let removed = sqlx::query(&format!(
            r#"DELETE FROM "{schema}".knowledge_chunks
               WHERE source = $1 AND NOT (content_hash = ANY($2))"#
        ))
        .bind(&source)
        .bind(&hashes)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;

        Ok(IngestSummary {
            source,
            chunks: chunks.len(),
            embedded: new.len(),
            removed,
        })
    }

    pub async fn search(
        pool: &PgPool,
        embeddings: &EmbeddingsClient,
        tenant: &str,
        query: &str,
        limit: Option<usize>,
    ) -> Result<Vec<ScoredChunk>, AppError> {
        let query = required_text(query, "Query", 2000)?;
        let limit = limit.unwrap_or(DEFAULT_RESULTS).clamp(1, MAX_RESULTS);

        let vector = embeddings
            .embed(std::slice::from_ref(&query))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Embeddings API returned no vector"))?;

        let schema = schema_name(tenant);
        let chunks = sqlx::query_as::<_, KnowledgeChunk>(&format!(
            r#"SELECT id, source, chunk_index, content, content_hash, embedding, created_at
               FROM "{schema}".knowledge_chunks"#
        ))
        .fetch_all(pool)
        .await?;

        Ok(rank(&vector, chunks, limit, MIN_SCORE))
    }

    pub async fn list_sources(pool: &PgPool, tenant: &str) -> Result<Vec<KnowledgeSource>, AppError> {
        let schema = schema_name(tenant);
        let rows = sqlx::query_as::<_, KnowledgeSource>(&format!(
            r#"SELECT source, COUNT(*)::BIGINT AS chunks, MAX(created_at) AS updated_at
               FROM "{schema}".knowledge_chunks
               GROUP BY source
               ORDER BY source"#
        ))
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }

    pub async fn delete_source(pool: &PgPool, tenant: &str, source: &str) -> Result<u64, AppError> {
        let schema = schema_name(tenant);
        let res = sqlx::query(&format!(
            r#"DELETE FROM "{schema}".knowledge_chunks WHERE source = $1"#
        ))
        .bind(source)
        .execute(pool)
        .await?;
        if res.rows_affected() == 0 {
            return Err(AppError::NotFound("Source"));
        }
        Ok(res.rows_affected())
    }
}
