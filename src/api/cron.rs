use axum::{Json, extract::State, http::HeaderMap, http::header::AUTHORIZATION};
use chrono::Utc;
use tracing::warn;

use super::ApiError;
use crate::app::AppState;
use crate::scheduler::BatchReport;

/// 外部スケジューラから呼ばれるバッチ起動口。`Authorization: Bearer <CRON_SECRET>` が必須。
pub(crate) async fn trigger(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<BatchReport>, ApiError> {
    let authorized = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .is_some_and(|token| token.trim() == state.config().cron_secret());
    if !authorized {
        warn!("rejected cron trigger without valid bearer token");
        return Err(ApiError::Unauthorized);
    }

    let report = state.batch_runner().run(Utc::now()).await?;
    Ok(Json(report))
}
