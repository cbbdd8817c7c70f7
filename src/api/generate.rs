use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use super::{ApiError, required};
use crate::app::AppState;
use crate::pipeline::{DraftContentItem, RewriteOutcome};
use crate::store::GenerationParams;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateRequest {
    tenant_id: Option<String>,
    category_id: Option<String>,
    writer_id: Option<String>,
    image_prompt_pattern_id: Option<String>,
    target_audience: Option<String>,
    extra: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RewriteRequest {
    tenant_id: Option<String>,
    instructions: Option<String>,
}

/// ドラフトを1件生成して返す。保存は呼び出し側が行う。
pub(crate) async fn generate_draft(
    State(state): State<AppState>,
    Json(payload): Json<GenerateRequest>,
) -> Result<Json<DraftContentItem>, ApiError> {
    let tenant_id = required(payload.tenant_id, "tenantId")?;
    let params = GenerationParams {
        category_id: required(payload.category_id, "categoryId")?,
        writer_id: required(payload.writer_id, "writerId")?,
        image_prompt_pattern_id: required(
            payload.image_prompt_pattern_id,
            "imagePromptPatternId",
        )?,
        target_audience: required(payload.target_audience, "targetAudience")?,
        extra: payload.extra,
    };

    let draft = state.orchestrator().generate(&tenant_id, &params).await?;
    Ok(Json(draft))
}

pub(crate) async fn rewrite_article(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RewriteRequest>,
) -> Result<Json<RewriteOutcome>, ApiError> {
    let tenant_id = required(payload.tenant_id, "tenantId")?;
    let instructions = payload
        .instructions
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty());

    let outcome = state
        .orchestrator()
        .rewrite(&tenant_id, id, instructions)
        .await?;
    Ok(Json(outcome))
}
