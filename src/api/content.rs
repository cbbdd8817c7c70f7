use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use tracing::info;

use super::{ApiError, required};
use crate::app::AppState;
use crate::store::{ContentItem, ContentKind};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateCategoryRequest {
    tenant_id: Option<String>,
    name: Option<String>,
    kind: Option<String>,
}

/// カテゴリ（またはタグ）を作成する。スラッグはテナント内で一意になるよう割り当てる。
pub(crate) async fn create_category(
    State(state): State<AppState>,
    Json(payload): Json<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<ContentItem>), ApiError> {
    let tenant_id = required(payload.tenant_id, "tenantId")?;
    let name = required(payload.name, "name")?;
    let kind = match payload.kind.as_deref().map(str::trim) {
        None | Some("") => ContentKind::Category,
        Some(raw) => match ContentKind::parse(raw) {
            Some(kind @ (ContentKind::Category | ContentKind::Tag)) => kind,
            _ => return Err(ApiError::validation("kind", "kind must be category or tag")),
        },
    };

    let slug = state
        .slugs()
        .allocate_for_tenant(&tenant_id, &name, None)
        .await?;
    let item = ContentItem::new(tenant_id, kind, name, slug).published(true);
    state.content().insert(&item).await?;

    info!(tenant_id = %item.tenant_id, kind = item.kind.as_str(), slug = %item.slug, "created taxonomy item");
    Ok((StatusCode::CREATED, Json(item)))
}
