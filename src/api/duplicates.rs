use axum::{Json, extract::State};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use super::{ApiError, required};
use crate::app::AppState;
use crate::pipeline::{DuplicateCandidate, ScreeningOutcome};
use crate::store::ContentKind;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DuplicateCheckRequest {
    tenant_id: Option<String>,
    candidate_id: Option<Uuid>,
    title: Option<String>,
    content: Option<String>,
}

/// 候補記事をテナントの公開記事と比較する。
///
/// `title` / `content` のどちらも無い場合は `candidateId` の記事を読み込んで比較する。
pub(crate) async fn check(
    State(state): State<AppState>,
    Json(payload): Json<DuplicateCheckRequest>,
) -> Result<Json<ScreeningOutcome>, ApiError> {
    let tenant_id = required(payload.tenant_id, "tenantId")?;
    let title = payload.title.filter(|value| !value.trim().is_empty());
    let content = payload.content.filter(|value| !value.trim().is_empty());

    let candidate = if title.is_none() && content.is_none() {
        let Some(candidate_id) = payload.candidate_id else {
            return Err(ApiError::validation(
                "title",
                "either candidateId or title/content is required",
            ));
        };
        let item = state
            .content()
            .get(&tenant_id, candidate_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("content item {candidate_id} not found")))?;
        DuplicateCandidate {
            id: Some(item.id),
            title: item.title,
            content: item.body,
        }
    } else {
        DuplicateCandidate {
            id: payload.candidate_id,
            title: title.unwrap_or_default(),
            content: content.unwrap_or_default(),
        }
    };

    let published = state
        .content()
        .list_published(&tenant_id, ContentKind::Article)
        .await?;
    let outcome = state.orchestrator().screen().screen(&candidate, &published);
    if outcome.is_duplicate {
        state.telemetry().metrics().duplicates_flagged.inc();
    }

    info!(
        tenant_id = %tenant_id,
        checked = outcome.checked_count,
        duplicates = outcome.duplicates.len(),
        "duplicate check completed"
    );
    Ok(Json(outcome))
}
