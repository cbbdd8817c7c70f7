use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;
use tracing::error;

use crate::app::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) struct HealthReport {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

impl HealthReport {
    fn ready() -> Self {
        Self {
            status: "ready",
            detail: None,
        }
    }

    fn degraded(detail: impl Into<String>) -> Self {
        Self {
            status: "degraded",
            detail: Some(detail.into()),
        }
    }
}

pub(crate) async fn ready(
    State(state): State<AppState>,
) -> Result<Json<HealthReport>, (StatusCode, Json<HealthReport>)> {
    state.telemetry().record_ready_probe();

    if let Err(error) = state.content().ping().await {
        error!(%error, "content store readiness check failed");
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthReport::degraded(format!("content_store: {error:#}"))),
        ));
    }

    Ok(Json(HealthReport::ready()))
}

pub(crate) async fn live(State(state): State<AppState>) -> Json<HealthReport> {
    state.telemetry().record_live_probe();
    Json(HealthReport {
        status: "live",
        detail: None,
    })
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use crate::api::test_support::{app, get, send};

    #[tokio::test]
    async fn probes_report_status() {
        let app = app("unused");

        let (status, body) = send(&app.router, get("/health/live")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "live");

        let (status, body) = send(&app.router, get("/health/ready")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ready");
    }
}
