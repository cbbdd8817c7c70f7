use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ApiError, required};
use crate::app::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SlugRequest {
    tenant_id: Option<String>,
    title: Option<String>,
    exclude_id: Option<Uuid>,
    #[serde(default)]
    use_ai: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct SlugResponse {
    slug: String,
}

pub(crate) async fn generate_slug(
    State(state): State<AppState>,
    Json(payload): Json<SlugRequest>,
) -> Result<Json<SlugResponse>, ApiError> {
    let tenant_id = required(payload.tenant_id, "tenantId")?;
    let title = required(payload.title, "title")?;

    let slugs = state.slugs();
    let slug = if payload.use_ai {
        slugs
            .allocate_with_romanizer(&tenant_id, &title, payload.exclude_id)
            .await?
    } else {
        slugs
            .allocate_for_tenant(&tenant_id, &title, payload.exclude_id)
            .await?
    };
    Ok(Json(SlugResponse { slug }))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::api::test_support::{app, post_json, send};
    use crate::store::{ContentItem, ContentKind};

    #[tokio::test]
    async fn appends_suffix_for_taken_slug() {
        let app = app("unused");
        app.content
            .seed([ContentItem::new("t1", ContentKind::Article, "Travel Tips", "travel-tips")])
            .await;

        let (status, body) = send(
            &app.router,
            post_json("/generate-slug", &json!({"tenantId": "t1", "title": "Travel Tips"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["slug"], "travel-tips-2");
    }

    #[tokio::test]
    async fn excluded_item_keeps_its_slug() {
        let app = app("unused");
        let own = ContentItem::new("t1", ContentKind::Article, "Travel Tips", "travel-tips");
        app.content.seed([own.clone()]).await;

        let (_, body) = send(
            &app.router,
            post_json(
                "/generate-slug",
                &json!({"tenantId": "t1", "title": "Travel Tips", "excludeId": own.id}),
            ),
        )
        .await;

        assert_eq!(body["slug"], "travel-tips");
    }

    #[tokio::test]
    async fn romanizes_japanese_title_when_requested() {
        let app = app("Barrier Free Travel Guide");

        let (status, body) = send(
            &app.router,
            post_json(
                "/generate-slug",
                &json!({"tenantId": "t1", "title": "バリアフリー旅行ガイド", "useAi": true}),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["slug"], "barrier-free-travel-guide");
    }

    #[tokio::test]
    async fn missing_title_is_validation_error() {
        let app = app("unused");

        let (status, body) = send(
            &app.router,
            post_json("/generate-slug", &json!({"tenantId": "t1", "title": "  "})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["details"]["field"], "title");
    }
}
