use std::collections::{BTreeMap, BTreeSet, HashSet};

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Executor, PgPool, Row, postgres::PgRow, types::Json};
use uuid::Uuid;

use super::models::{
    ContentItem, ContentKind, GenerationParams, ScheduleDefinition, TranslatedFields,
};
use super::repository::{ContentRepository, ScheduleRepository};

const SCHEMA: &str = include_str!("../../migrations/0001_content_pipeline.sql");

/// スキーマを冪等に作成する。
///
/// # Errors
/// DDL の実行に失敗した場合はエラーを返す。
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    pool.execute(SCHEMA)
        .await
        .context("failed to apply content pipeline schema")?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct PgContentRepository {
    pool: PgPool,
}

impl PgContentRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const CONTENT_COLUMNS: &str = "id, tenant_id, kind, title, excerpt, body, slug, published, translations, created_at, updated_at";

fn content_from_row(row: &PgRow) -> Result<ContentItem> {
    let kind_raw: String = row.try_get("kind")?;
    let kind = ContentKind::parse(&kind_raw)
        .ok_or_else(|| anyhow!("unknown content kind in store: {kind_raw}"))?;
    let Json(translations): Json<BTreeMap<String, TranslatedFields>> =
        row.try_get("translations")?;

    Ok(ContentItem {
        id: row.try_get("id")?,
        tenant_id: row.try_get("tenant_id")?,
        kind,
        title: row.try_get("title")?,
        excerpt: row.try_get("excerpt")?,
        body: row.try_get("body")?,
        slug: row.try_get("slug")?,
        published: row.try_get("published")?,
        translations,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl ContentRepository for PgContentRepository {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("content store ping failed")?;
        Ok(())
    }

    async fn get(&self, tenant_id: &str, id: Uuid) -> Result<Option<ContentItem>> {
        let row = sqlx::query(&format!(
            "SELECT {CONTENT_COLUMNS} FROM content_items WHERE tenant_id = $1 AND id = $2"
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("failed to fetch content item")?;

        row.as_ref().map(content_from_row).transpose()
    }

    async fn list_published(&self, tenant_id: &str, kind: ContentKind) -> Result<Vec<ContentItem>> {
        let rows = sqlx::query(&format!(
            r"
            SELECT {CONTENT_COLUMNS}
            FROM content_items
            WHERE tenant_id = $1 AND kind = $2 AND published = TRUE
            ORDER BY created_at DESC
            "
        ))
        .bind(tenant_id)
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await
        .context("failed to list published content")?;

        rows.iter().map(content_from_row).collect()
    }

    async fn slugs(&self, tenant_id: &str) -> Result<HashSet<String>> {
        let rows = sqlx::query("SELECT slug FROM content_items WHERE tenant_id = $1")
            .bind(tenant_id)
            .fetch_all(&self.pool)
            .await
            .context("failed to fetch tenant slugs")?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("slug").map_err(Into::into))
            .collect()
    }

    async fn find_by_slug(&self, tenant_id: &str, slug: &str) -> Result<Option<ContentItem>> {
        let row = sqlx::query(&format!(
            "SELECT {CONTENT_COLUMNS} FROM content_items WHERE tenant_id = $1 AND slug = $2 LIMIT 1"
        ))
        .bind(tenant_id)
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .context("failed to fetch content item by slug")?;

        row.as_ref().map(content_from_row).transpose()
    }

    async fn insert(&self, item: &ContentItem) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO content_items
                (id, tenant_id, kind, title, excerpt, body, slug, published, translations, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ",
        )
        .bind(item.id)
        .bind(&item.tenant_id)
        .bind(item.kind.as_str())
        .bind(&item.title)
        .bind(&item.excerpt)
        .bind(&item.body)
        .bind(&item.slug)
        .bind(item.published)
        .bind(Json(&item.translations))
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await
        .context("failed to insert content item")?;
        Ok(())
    }

    async fn update(&self, item: &ContentItem) -> Result<()> {
        let result = sqlx::query(
            r"
            UPDATE content_items
            SET title = $3, excerpt = $4, body = $5, slug = $6, published = $7,
                translations = $8, updated_at = NOW()
            WHERE tenant_id = $1 AND id = $2
            ",
        )
        .bind(&item.tenant_id)
        .bind(item.id)
        .bind(&item.title)
        .bind(&item.excerpt)
        .bind(&item.body)
        .bind(&item.slug)
        .bind(item.published)
        .bind(Json(&item.translations))
        .execute(&self.pool)
        .await
        .context("failed to update content item")?;

        if result.rows_affected() == 0 {
            return Err(anyhow!("content item {} not found", item.id));
        }
        Ok(())
    }

    async fn delete(&self, tenant_id: &str, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM content_items WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("failed to delete content item")?;
        Ok(result.rows_affected() > 0)
    }

    async fn save_translations(
        &self,
        tenant_id: &str,
        updates: &[(Uuid, BTreeMap<String, TranslatedFields>)],
    ) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to begin transaction")?;

        for (id, translations) in updates {
            // jsonb || jsonb merges top-level language keys
            let result = sqlx::query(
                r"
                UPDATE content_items
                SET translations = translations || $3, updated_at = NOW()
                WHERE tenant_id = $1 AND id = $2
                ",
            )
            .bind(tenant_id)
            .bind(id)
            .bind(Json(translations))
            .execute(&mut *tx)
            .await
            .context("failed to update translations")?;

            if result.rows_affected() == 0 {
                tx.rollback()
                    .await
                    .context("failed to rollback transaction")?;
                return Err(anyhow!("content item {id} not found"));
            }
        }

        tx.commit().await.context("failed to commit transaction")?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PgScheduleRepository {
    pool: PgPool,
}

impl PgScheduleRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SCHEDULE_COLUMNS: &str = "id, tenant_id, name, category_id, writer_id, image_prompt_pattern_id, target_audience, extra, days_of_week, time_of_day, timezone, is_active, last_executed_at, created_at, updated_at";

fn schedule_from_row(row: &PgRow) -> Result<ScheduleDefinition> {
    let extra: Option<Json<serde_json::Value>> = row.try_get("extra")?;
    let days: Vec<String> = row.try_get("days_of_week")?;

    Ok(ScheduleDefinition {
        id: row.try_get("id")?,
        tenant_id: row.try_get("tenant_id")?,
        name: row.try_get("name")?,
        params: GenerationParams {
            category_id: row.try_get("category_id")?,
            writer_id: row.try_get("writer_id")?,
            image_prompt_pattern_id: row.try_get("image_prompt_pattern_id")?,
            target_audience: row.try_get("target_audience")?,
            extra: extra.map(|Json(value)| value),
        },
        days_of_week: days.into_iter().collect::<BTreeSet<_>>(),
        time_of_day: row.try_get("time_of_day")?,
        timezone: row.try_get("timezone")?,
        is_active: row.try_get("is_active")?,
        last_executed_at: row.try_get("last_executed_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl ScheduleRepository for PgScheduleRepository {
    async fn list(&self, tenant_id: &str) -> Result<Vec<ScheduleDefinition>> {
        let rows = sqlx::query(&format!(
            "SELECT {SCHEDULE_COLUMNS} FROM generation_schedules WHERE tenant_id = $1 ORDER BY name ASC"
        ))
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await
        .context("failed to list schedules")?;

        rows.iter().map(schedule_from_row).collect()
    }

    async fn list_active(&self) -> Result<Vec<ScheduleDefinition>> {
        let rows = sqlx::query(&format!(
            "SELECT {SCHEDULE_COLUMNS} FROM generation_schedules WHERE is_active = TRUE ORDER BY created_at ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .context("failed to list active schedules")?;

        rows.iter().map(schedule_from_row).collect()
    }

    async fn get(&self, tenant_id: &str, id: Uuid) -> Result<Option<ScheduleDefinition>> {
        let row = sqlx::query(&format!(
            "SELECT {SCHEDULE_COLUMNS} FROM generation_schedules WHERE tenant_id = $1 AND id = $2"
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("failed to fetch schedule")?;

        row.as_ref().map(schedule_from_row).transpose()
    }

    async fn insert(&self, schedule: &ScheduleDefinition) -> Result<()> {
        let days: Vec<String> = schedule.days_of_week.iter().cloned().collect();
        sqlx::query(
            r"
            INSERT INTO generation_schedules
                (id, tenant_id, name, category_id, writer_id, image_prompt_pattern_id, target_audience,
                 extra, days_of_week, time_of_day, timezone, is_active, last_executed_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ",
        )
        .bind(schedule.id)
        .bind(&schedule.tenant_id)
        .bind(&schedule.name)
        .bind(&schedule.params.category_id)
        .bind(&schedule.params.writer_id)
        .bind(&schedule.params.image_prompt_pattern_id)
        .bind(&schedule.params.target_audience)
        .bind(schedule.params.extra.as_ref().map(Json))
        .bind(&days)
        .bind(&schedule.time_of_day)
        .bind(&schedule.timezone)
        .bind(schedule.is_active)
        .bind(schedule.last_executed_at)
        .bind(schedule.created_at)
        .bind(schedule.updated_at)
        .execute(&self.pool)
        .await
        .context("failed to insert schedule")?;
        Ok(())
    }

    async fn update(&self, schedule: &ScheduleDefinition) -> Result<()> {
        let days: Vec<String> = schedule.days_of_week.iter().cloned().collect();
        let result = sqlx::query(
            r"
            UPDATE generation_schedules
            SET name = $3, category_id = $4, writer_id = $5, image_prompt_pattern_id = $6,
                target_audience = $7, extra = $8, days_of_week = $9, time_of_day = $10,
                timezone = $11, is_active = $12, updated_at = NOW()
            WHERE tenant_id = $1 AND id = $2
            ",
        )
        .bind(&schedule.tenant_id)
        .bind(schedule.id)
        .bind(&schedule.name)
        .bind(&schedule.params.category_id)
        .bind(&schedule.params.writer_id)
        .bind(&schedule.params.image_prompt_pattern_id)
        .bind(&schedule.params.target_audience)
        .bind(schedule.params.extra.as_ref().map(Json))
        .bind(&days)
        .bind(&schedule.time_of_day)
        .bind(&schedule.timezone)
        .bind(schedule.is_active)
        .execute(&self.pool)
        .await
        .context("failed to update schedule")?;

        if result.rows_affected() == 0 {
            return Err(anyhow!("schedule {} not found", schedule.id));
        }
        Ok(())
    }

    async fn delete(&self, tenant_id: &str, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM generation_schedules WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("failed to delete schedule")?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_executed(&self, tenant_id: &str, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r"
            UPDATE generation_schedules
            SET last_executed_at = $3, updated_at = NOW()
            WHERE tenant_id = $1 AND id = $2
            ",
        )
        .bind(tenant_id)
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await
        .context("failed to record schedule execution")?;
        Ok(())
    }
}
