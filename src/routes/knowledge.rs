use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};

use crate::{
    error::AppError,
    middleware::{
        rate_limit::{check_rate_limit, client_ip},
        tenant::CurrentTenant,
    },
    models::{
        auth::AuthenticatedUser,
        knowledge::{ContextRequest, IngestRequest, IngestSummary, KnowledgeSource, ScoredChunk, SourceQuery},
        permission::Feature,
    },
    services::{
        knowledge::{EmbeddingsClient, KnowledgeService},
        metrics::KNOWLEDGE_SEARCHES_COUNTER,
        permissions::PermissionService,
    },
    AppState,
};

fn embeddings(state: &AppState) -> Result<Arc<EmbeddingsClient>, AppError> {
    state
        .embeddings
        .clone()
        .ok_or(AppError::ServiceUnavailable("Knowledge search"))
}

pub async fn list_sources(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<KnowledgeSource>>, AppError> {
    PermissionService::require_feature(&state.db, &user, Feature::Chatbot).await?;
    KnowledgeService::list_sources(&state.db, &user.tenant)
        .await
        .map(Json)
}

/// POST /api/admin/knowledge — replaces the chunks of one source.
pub async fn ingest(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<IngestRequest>,
) -> Result<Json<IngestSummary>, AppError> {
    PermissionService::require_feature(&state.db, &user, Feature::Chatbot).await?;
    let client = embeddings(&state)?;
    let summary =
        KnowledgeService::ingest(&state.db, &client, &user.tenant, &body.source, &body.text).await?;
    tracing::info!(
        "Ingested {} ({} chunks, {} embedded, {} removed) for {}",
        summary.source,
        summary.chunks,
        summary.embedded,
        summary.removed,
        user.tenant
    );
    Ok(Json(summary))
}

pub async fn delete_source(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(params): Query<SourceQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    PermissionService::require_feature(&state.db, &user, Feature::Chatbot).await?;
    let removed = KnowledgeService::delete_source(&state.db, &user.tenant, &params.source).await?;
    Ok(Json(serde_json::json!({ "removed": removed })))
}

/// POST /api/chat/context — passages the chat widget feeds to its model.
pub async fn chat_context(
    State(state): State<AppState>,
    CurrentTenant(tenant): CurrentTenant,
    headers: HeaderMap,
    Json(body): Json<ContextRequest>,
) -> Result<Json<Vec<ScoredChunk>>, AppError> {
    // Rate limit: 30 lookups per minute per IP+tenant
    let rate_key = format!("rate:chat:{}:{}", tenant.slug, client_ip(&headers));
    let mut redis = state.redis.clone();
    check_rate_limit(&mut redis, &rate_key, 30, 60).await?;

    let client = embeddings(&state)?;
    let results = KnowledgeService::search(&state.db, &client, &tenant.slug, &body.query, body.limit).await?;
    KNOWLEDGE_SEARCHES_COUNTER.with_label_values(&[&tenant.slug]).inc();
    Ok(Json(results))
}
