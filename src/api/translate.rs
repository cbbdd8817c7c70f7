use std::collections::BTreeMap;

use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::{ApiError, required};
use crate::app::AppState;
use crate::pipeline::{FieldTranslations, TranslationBundle};
use crate::store::TranslatedFields;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TranslateTextRequest {
    text: Option<String>,
    canonical_lang: Option<String>,
    target_langs: Option<Vec<String>>,
    context: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TranslateFieldsRequest {
    #[serde(default)]
    fields: BTreeMap<String, String>,
    canonical_lang: Option<String>,
    target_langs: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TranslateArticleRequest {
    tenant_id: Option<String>,
    target_langs: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ArticleTranslationResponse {
    article_id: Uuid,
    saved_languages: Vec<String>,
    translations: FieldTranslations,
}

struct Languages {
    canonical: String,
    targets: Vec<String>,
}

fn languages(
    state: &AppState,
    canonical: Option<String>,
    targets: Option<Vec<String>>,
) -> Languages {
    let config = state.config();
    let canonical = canonical
        .map(|lang| lang.trim().to_string())
        .filter(|lang| !lang.is_empty())
        .unwrap_or_else(|| config.canonical_language().to_string());
    let targets = targets
        .map(|langs| {
            langs
                .into_iter()
                .map(|lang| lang.trim().to_string())
                .filter(|lang| !lang.is_empty())
                .collect::<Vec<_>>()
        })
        .filter(|langs| !langs.is_empty())
        .unwrap_or_else(|| config.supported_languages().to_vec());
    Languages { canonical, targets }
}

pub(crate) async fn translate_text(
    State(state): State<AppState>,
    Json(payload): Json<TranslateTextRequest>,
) -> Result<Json<TranslationBundle>, ApiError> {
    let text = payload
        .text
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| ApiError::validation("text", "text is required"))?;
    let Languages { canonical, targets } =
        languages(&state, payload.canonical_lang, payload.target_langs);

    let bundle = state
        .translations()
        .translate_fanout(&text, &canonical, &targets, payload.context.as_deref())
        .await;
    Ok(Json(bundle))
}

pub(crate) async fn translate_fields(
    State(state): State<AppState>,
    Json(payload): Json<TranslateFieldsRequest>,
) -> Result<Json<FieldTranslations>, ApiError> {
    if payload.fields.is_empty() {
        return Err(ApiError::validation("fields", "fields must not be empty"));
    }
    let Languages { canonical, targets } =
        languages(&state, payload.canonical_lang, payload.target_langs);

    let translations = state
        .translations()
        .translate_bundle(&payload.fields, &canonical, &targets)
        .await;
    Ok(Json(translations))
}

/// 記事のタイトル・要約・本文を翻訳し、正規言語以外の結果を記事に保存する。
///
/// フォールバックした言語も正規テキストのまま保存される。
pub(crate) async fn translate_article(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<TranslateArticleRequest>,
) -> Result<Json<ArticleTranslationResponse>, ApiError> {
    let tenant_id = required(payload.tenant_id, "tenantId")?;
    let Languages { canonical, targets } = languages(&state, None, payload.target_langs);

    let content = state.content();
    let article = content
        .get(&tenant_id, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("article {id} not found")))?;

    let fields = BTreeMap::from([
        ("title".to_string(), article.title.clone()),
        ("excerpt".to_string(), article.excerpt.clone()),
        ("body".to_string(), article.body.clone()),
    ]);
    let translations = state
        .translations()
        .translate_bundle(&fields, &canonical, &targets)
        .await;

    let mut saved = BTreeMap::new();
    for lang in targets.iter().filter(|lang| **lang != canonical) {
        let text = |field: &str| {
            translations
                .text(field, lang)
                .unwrap_or_default()
                .to_string()
        };
        saved.insert(
            lang.clone(),
            TranslatedFields {
                title: text("title"),
                excerpt: text("excerpt"),
                body: text("body"),
            },
        );
    }

    if !saved.is_empty() {
        content
            .save_translations(&tenant_id, &[(article.id, saved.clone())])
            .await?;
    }

    info!(
        tenant_id = %tenant_id,
        article_id = %article.id,
        languages = saved.len(),
        "stored article translations"
    );
    Ok(Json(ArticleTranslationResponse {
        article_id: article.id,
        saved_languages: saved.into_keys().collect(),
        translations,
    }))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::api::test_support::{app, post_json, send};
    use crate::store::{ContentItem, ContentKind};

    #[tokio::test]
    async fn latin_text_is_copied_to_every_language() {
        let app = app("unused");

        let (status, body) = send(
            &app.router,
            post_json("/translate", &json!({"text": "Hello", "canonicalLang": "en"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        for lang in ["ja", "en", "fr"] {
            assert_eq!(body["translations"][lang]["status"], "copied");
            assert_eq!(body["translations"][lang]["text"], "Hello");
        }
    }

    #[tokio::test]
    async fn provider_failure_falls_back_per_language() {
        let app = app("");

        let (status, body) = send(
            &app.router,
            post_json(
                "/translate",
                &json!({"text": "こんにちは", "targetLangs": ["ja", "en"]}),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["translations"]["ja"]["status"], "copied");
        assert_eq!(body["translations"]["en"]["status"], "fallback");
        assert_eq!(body["translations"]["en"]["text"], "こんにちは");
    }

    #[tokio::test]
    async fn empty_text_is_rejected() {
        let app = app("unused");

        let (status, body) = send(&app.router, post_json("/translate", &json!({"text": " "}))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["details"]["field"], "text");
    }

    #[tokio::test]
    async fn bundle_translates_each_field() {
        let app = app(r#"{"title": "Kyoto in spring", "body": "<p>Cherry blossoms</p>"}"#);

        let (status, body) = send(
            &app.router,
            post_json(
                "/translate/bundle",
                &json!({
                    "fields": {"title": "春の京都", "body": "<p>桜</p>"},
                    "targetLangs": ["en"]
                }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["fields"]["title"]["en"]["text"], "Kyoto in spring");
        assert_eq!(body["fields"]["body"]["en"]["status"], "translated");
    }

    #[tokio::test]
    async fn article_translations_are_persisted() {
        let app = app(
            r#"{"title": "Kyoto in spring", "excerpt": "A walk", "body": "<p>Cherry blossoms</p>"}"#,
        );
        let article = ContentItem::new("t1", ContentKind::Article, "春の京都", "kyoto-spring")
            .with_body("散歩", "<p>桜</p>");
        app.content.seed([article.clone()]).await;

        let (status, body) = send(
            &app.router,
            post_json(
                &format!("/articles/{}/translations", article.id),
                &json!({"tenantId": "t1", "targetLangs": ["ja", "en"]}),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["savedLanguages"], json!(["en"]));

        let stored = app.content.all("t1").await;
        let english = &stored[0].translations["en"];
        assert_eq!(english.title, "Kyoto in spring");
        assert_eq!(english.body, "<p>Cherry blossoms</p>");
        assert!(!stored[0].translations.contains_key("ja"));
    }

    #[tokio::test]
    async fn unknown_article_is_not_found() {
        let app = app("unused");

        let (status, _) = send(
            &app.router,
            post_json(
                &format!("/articles/{}/translations", uuid::Uuid::new_v4()),
                &json!({"tenantId": "t1"}),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
