pub(crate) mod content;
pub(crate) mod cron;
pub(crate) mod duplicates;
pub mod error;
pub(crate) mod generate;
pub(crate) mod health;
pub(crate) mod metrics;
pub(crate) mod schedules;
pub(crate) mod slugs;
pub(crate) mod translate;

use axum::{
    Router,
    routing::{get, post},
};

use crate::app::AppState;

pub use error::ApiError;

pub(crate) fn router(state: AppState) -> Router {
    Router::new()
        .route("/health/ready", get(health::ready))
        .route("/health/live", get(health::live))
        .route("/metrics", get(metrics::exporter))
        .route("/duplicate-check", post(duplicates::check))
        .route("/generate-slug", post(slugs::generate_slug))
        .route(
            "/schedules",
            get(schedules::list_schedules).post(schedules::create_schedule),
        )
        .route(
            "/schedules/{id}",
            get(schedules::get_schedule)
                .put(schedules::update_schedule)
                .delete(schedules::delete_schedule),
        )
        .route("/cron-trigger", get(cron::trigger))
        .route("/generate", post(generate::generate_draft))
        .route("/articles/{id}/rewrite", post(generate::rewrite_article))
        .route("/articles/{id}/translations", post(translate::translate_article))
        .route("/categories", post(content::create_category))
        .route("/translate", post(translate::translate_text))
        .route("/translate/bundle", post(translate::translate_fields))
        .with_state(state)
}

/// 必須の文字列フィールドを取り出す。空白のみの値も欠落として扱う。
pub(crate) fn required(value: Option<String>, field: &'static str) -> Result<String, ApiError> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|trimmed| !trimmed.is_empty())
        .ok_or_else(|| ApiError::validation(field, format!("{field} is required")))
}
