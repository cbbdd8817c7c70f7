//! Schedule CRUD. すべての操作はテナントで絞り込まれる。

use std::collections::BTreeSet;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use super::{ApiError, required};
use crate::app::AppState;
use crate::store::{GenerationParams, ScheduleDefinition};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TenantQuery {
    tenant_id: Option<String>,
}

/// 作成と部分更新で共通のリクエスト。更新時は指定されたフィールドだけを上書きする。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ScheduleRequest {
    tenant_id: Option<String>,
    name: Option<String>,
    category_id: Option<String>,
    writer_id: Option<String>,
    image_prompt_pattern_id: Option<String>,
    target_audience: Option<String>,
    days_of_week: Option<Vec<String>>,
    time_of_day: Option<String>,
    timezone: Option<String>,
    extra: Option<Value>,
    is_active: Option<bool>,
}

pub(crate) async fn list_schedules(
    State(state): State<AppState>,
    Query(query): Query<TenantQuery>,
) -> Result<Json<Vec<ScheduleDefinition>>, ApiError> {
    let tenant_id = required(query.tenant_id, "tenantId")?;
    let schedules = state.schedules().list(&tenant_id).await?;
    Ok(Json(schedules))
}

pub(crate) async fn get_schedule(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<TenantQuery>,
) -> Result<Json<ScheduleDefinition>, ApiError> {
    let tenant_id = required(query.tenant_id, "tenantId")?;
    let schedule = load(&state, &tenant_id, id).await?;
    Ok(Json(schedule))
}

pub(crate) async fn create_schedule(
    State(state): State<AppState>,
    Json(payload): Json<ScheduleRequest>,
) -> Result<(StatusCode, Json<ScheduleDefinition>), ApiError> {
    let tenant_id = required(payload.tenant_id, "tenantId")?;
    let name = required(payload.name, "name")?;
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
    let days = parse_days(payload.days_of_week)?;
    let time_of_day = parse_time_of_day(required(payload.time_of_day, "timeOfDay")?)?;
    let timezone = required(payload.timezone, "timezone")?;

    let mut schedule =
        ScheduleDefinition::new(tenant_id, name, params, days, time_of_day, timezone);
    if let Some(is_active) = payload.is_active {
        schedule.is_active = is_active;
    }
    state.schedules().insert(&schedule).await?;

    info!(
        tenant_id = %schedule.tenant_id,
        schedule_id = %schedule.id,
        time_of_day = %schedule.time_of_day,
        "created generation schedule"
    );
    Ok((StatusCode::CREATED, Json(schedule)))
}

/// 指定されたフィールドだけを更新する。
pub(crate) async fn update_schedule(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ScheduleRequest>,
) -> Result<Json<ScheduleDefinition>, ApiError> {
    let tenant_id = required(payload.tenant_id, "tenantId")?;
    let mut schedule = load(&state, &tenant_id, id).await?;

    if let Some(name) = payload.name {
        schedule.name = required(Some(name), "name")?;
    }
    if let Some(value) = payload.category_id {
        schedule.params.category_id = required(Some(value), "categoryId")?;
    }
    if let Some(value) = payload.writer_id {
        schedule.params.writer_id = required(Some(value), "writerId")?;
    }
    if let Some(value) = payload.image_prompt_pattern_id {
        schedule.params.image_prompt_pattern_id =
            required(Some(value), "imagePromptPatternId")?;
    }
    if let Some(value) = payload.target_audience {
        schedule.params.target_audience = required(Some(value), "targetAudience")?;
    }
    if payload.extra.is_some() {
        schedule.params.extra = payload.extra;
    }
    if payload.days_of_week.is_some() {
        schedule.days_of_week = parse_days(payload.days_of_week)?;
    }
    if let Some(value) = payload.time_of_day {
        schedule.time_of_day = parse_time_of_day(required(Some(value), "timeOfDay")?)?;
    }
    if let Some(value) = payload.timezone {
        schedule.timezone = required(Some(value), "timezone")?;
    }
    if let Some(is_active) = payload.is_active {
        schedule.is_active = is_active;
    }
    schedule.updated_at = Utc::now();

    state.schedules().update(&schedule).await?;
    Ok(Json(schedule))
}

pub(crate) async fn delete_schedule(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<TenantQuery>,
) -> Result<StatusCode, ApiError> {
    let tenant_id = required(query.tenant_id, "tenantId")?;
    if state.schedules().delete(&tenant_id, id).await? {
        info!(tenant_id = %tenant_id, schedule_id = %id, "deleted generation schedule");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(id))
    }
}

async fn load(state: &AppState, tenant_id: &str, id: Uuid) -> Result<ScheduleDefinition, ApiError> {
    state
        .schedules()
        .get(tenant_id, id)
        .await?
        .ok_or_else(|| not_found(id))
}

fn not_found(id: Uuid) -> ApiError {
    ApiError::NotFound(format!("schedule {id} not found"))
}

fn parse_days(days: Option<Vec<String>>) -> Result<BTreeSet<String>, ApiError> {
    let days = days.unwrap_or_default();
    if days.is_empty() {
        return Err(ApiError::validation("daysOfWeek", "daysOfWeek is required"));
    }
    days.into_iter()
        .map(|day| {
            let day = day.trim().to_string();
            match day.as_str() {
                "0" | "1" | "2" | "3" | "4" | "5" | "6" => Ok(day),
                _ => Err(ApiError::validation(
                    "daysOfWeek",
                    format!("invalid weekday code {day:?}, expected 0-6"),
                )),
            }
        })
        .collect()
}

/// `HH:MM`（00-23 / 00-59）のみ受け付ける。
fn parse_time_of_day(raw: String) -> Result<String, ApiError> {
    let valid = raw.len() == 5
        && raw.split_once(':').is_some_and(|(hour, minute)| {
            hour.len() == 2
                && minute.len() == 2
                && hour.parse::<u8>().is_ok_and(|h| h < 24)
                && minute.parse::<u8>().is_ok_and(|m| m < 60)
        });
    if valid {
        Ok(raw)
    } else {
        Err(ApiError::validation(
            "timeOfDay",
            format!("timeOfDay must be HH:MM, got {raw:?}"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use rstest::rstest;
    use serde_json::{Value, json};

    use super::parse_time_of_day;
    use crate::api::test_support::{app, get, post_json, put_json, send};

    fn create_body() -> Value {
        json!({
            "tenantId": "t1",
            "name": "Monday morning",
            "categoryId": "cat-1",
            "writerId": "writer-1",
            "imagePromptPatternId": "img-1",
            "targetAudience": "families",
            "daysOfWeek": ["1", "3"],
            "timeOfDay": "09:00",
            "timezone": "Asia/Tokyo"
        })
    }

    #[rstest]
    #[case("09:00", true)]
    #[case("23:55", true)]
    #[case("24:00", false)]
    #[case("19:60", false)]
    #[case("9:00", false)]
    #[case("09-00", false)]
    fn validates_time_of_day(#[case] raw: &str, #[case] ok: bool) {
        assert_eq!(parse_time_of_day(raw.to_string()).is_ok(), ok);
    }

    #[tokio::test]
    async fn create_then_list_and_get() {
        let app = app("unused");

        let (status, created) = send(&app.router, post_json("/schedules", &create_body())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["isActive"], true);
        assert_eq!(created["params"]["categoryId"], "cat-1");
        let id = created["id"].as_str().expect("id").to_string();

        let (status, listed) = send(&app.router, get("/schedules?tenantId=t1")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed.as_array().map(Vec::len), Some(1));

        let (status, fetched) =
            send(&app.router, get(&format!("/schedules/{id}?tenantId=t1"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["daysOfWeek"], json!(["1", "3"]));

        let (status, _) = send(&app.router, get(&format!("/schedules/{id}?tenantId=t2"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[rstest]
    #[case("name")]
    #[case("categoryId")]
    #[case("writerId")]
    #[case("imagePromptPatternId")]
    #[case("targetAudience")]
    #[case("daysOfWeek")]
    #[case("timeOfDay")]
    #[case("timezone")]
    #[tokio::test]
    async fn create_requires_every_field(#[case] field: &str) {
        let app = app("unused");
        let mut body = create_body();
        body.as_object_mut().expect("object").remove(field);

        let (status, error) = send(&app.router, post_json("/schedules", &body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error["details"]["field"], field);
        let (_, listed) = send(&app.router, get("/schedules?tenantId=t1")).await;
        assert_eq!(listed, json!([]));
    }

    #[tokio::test]
    async fn rejects_weekday_out_of_range() {
        let app = app("unused");
        let mut body = create_body();
        body["daysOfWeek"] = json!(["7"]);

        let (status, error) = send(&app.router, post_json("/schedules", &body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error["details"]["field"], "daysOfWeek");
    }

    #[tokio::test]
    async fn update_changes_only_given_fields() {
        let app = app("unused");
        let (_, created) = send(&app.router, post_json("/schedules", &create_body())).await;
        let id = created["id"].as_str().expect("id").to_string();

        let (status, updated) = send(
            &app.router,
            put_json(
                &format!("/schedules/{id}"),
                &json!({"tenantId": "t1", "timeOfDay": "18:30", "isActive": false}),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["timeOfDay"], "18:30");
        assert_eq!(updated["isActive"], false);
        assert_eq!(updated["name"], "Monday morning");
        assert_eq!(updated["params"]["writerId"], "writer-1");
    }

    #[tokio::test]
    async fn update_accepts_the_create_payload_shape() {
        let app = app("unused");
        let (_, created) = send(&app.router, post_json("/schedules", &create_body())).await;
        let id = created["id"].as_str().expect("id").to_string();
        let mut body = create_body();
        body["name"] = json!("Friday evening");
        body["daysOfWeek"] = json!(["5"]);

        let (status, updated) =
            send(&app.router, put_json(&format!("/schedules/{id}"), &body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["id"], created["id"]);
        assert_eq!(updated["name"], "Friday evening");
        assert_eq!(updated["daysOfWeek"], json!(["5"]));
    }

    #[tokio::test]
    async fn delete_returns_no_content_then_not_found() {
        let app = app("unused");
        let (_, created) = send(&app.router, post_json("/schedules", &create_body())).await;
        let id = created["id"].as_str().expect("id").to_string();
        let delete = || {
            Request::delete(format!("/schedules/{id}?tenantId=t1"))
                .body(Body::empty())
                .expect("request builds")
        };

        let (first, _) = send(&app.router, delete()).await;
        let (second, _) = send(&app.router, delete()).await;

        assert_eq!(first, StatusCode::NO_CONTENT);
        assert_eq!(second, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn list_requires_tenant() {
        let app = app("unused");

        let (status, error) = send(&app.router, get("/schedules")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error["details"]["field"], "tenantId");
    }
}
