//! Scheduled batch: every due schedule generates one draft, concurrently and all-settled.

use std::{num::NonZeroUsize, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::matcher::ScheduleMatcher;
use crate::observability::Metrics;
use crate::pipeline::{GenerationOrchestrator, PipelineError, settle_all};
use crate::store::{ContentRepository, ScheduleDefinition, ScheduleRepository};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSuccess {
    pub schedule_id: Uuid,
    pub tenant_id: String,
    pub article_id: Uuid,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleFailure {
    pub schedule_id: Uuid,
    pub tenant_id: String,
    pub reason: String,
}

/// 1回の評価結果。部分的な失敗を含んでもエラーではない。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub evaluated_at: DateTime<Utc>,
    pub evaluated_count: usize,
    pub due_count: usize,
    pub succeeded: Vec<ScheduleSuccess>,
    pub failed: Vec<ScheduleFailure>,
}

#[derive(Clone)]
pub struct ScheduledBatchRunner {
    schedules: Arc<dyn ScheduleRepository>,
    content: Arc<dyn ContentRepository>,
    orchestrator: GenerationOrchestrator,
    matcher: ScheduleMatcher,
    max_concurrency: NonZeroUsize,
    timeout: Duration,
    metrics: Option<Arc<Metrics>>,
}

impl ScheduledBatchRunner {
    #[must_use]
    pub fn new(
        schedules: Arc<dyn ScheduleRepository>,
        content: Arc<dyn ContentRepository>,
        orchestrator: GenerationOrchestrator,
        matcher: ScheduleMatcher,
        max_concurrency: NonZeroUsize,
        timeout: Duration,
    ) -> Self {
        Self {
            schedules,
            content,
            orchestrator,
            matcher,
            max_concurrency,
            timeout,
            metrics: None,
        }
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// `now` 時点で実行すべきスケジュールをすべて実行する。
    ///
    /// 成功したスケジュールはドラフトを未公開記事として保存し `last_executed_at = now` を記録する。
    /// 失敗・タイムアウト・panic はそのスケジュールの失敗として報告され、他には影響しない。
    ///
    /// # Errors
    /// 有効なスケジュール一覧の取得に失敗した場合のみエラーを返す。
    #[instrument(skip_all, fields(evaluated_at = %now))]
    pub async fn run(&self, now: DateTime<Utc>) -> Result<BatchReport> {
        let started = std::time::Instant::now();
        let active = self
            .schedules
            .list_active()
            .await
            .context("failed to list active schedules")?;
        let due = self.matcher.find_due(&active, now);

        info!(
            evaluated = active.len(),
            due = due.len(),
            "evaluating generation schedules"
        );

        let tasks: Vec<_> = due
            .iter()
            .map(|schedule| {
                let runner = self.clone();
                let schedule = schedule.clone();
                ((schedule.id, schedule.tenant_id.clone()), async move {
                    runner.execute(schedule, now).await
                })
            })
            .collect();

        let mut succeeded = Vec::new();
        let mut failed = Vec::new();

        for ((schedule_id, tenant_id), result) in
            settle_all(tasks, self.max_concurrency, self.timeout).await
        {
            match result {
                Ok(Ok((article_id, slug))) => succeeded.push(ScheduleSuccess {
                    schedule_id,
                    tenant_id,
                    article_id,
                    slug,
                }),
                Ok(Err(error)) => {
                    warn!(%schedule_id, tenant_id = %tenant_id, error = %error, "scheduled generation failed");
                    failed.push(ScheduleFailure {
                        schedule_id,
                        tenant_id,
                        reason: error.to_string(),
                    });
                }
                Err(failure) => {
                    error!(%schedule_id, tenant_id = %tenant_id, error = %failure, "scheduled generation aborted");
                    failed.push(ScheduleFailure {
                        schedule_id,
                        tenant_id,
                        reason: failure.to_string(),
                    });
                }
            }
        }

        if let Some(metrics) = &self.metrics {
            metrics.scheduled_batches.inc();
            metrics.scheduled_runs_succeeded.inc_by(succeeded.len() as f64);
            metrics.scheduled_runs_failed.inc_by(failed.len() as f64);
            metrics.batch_duration.observe(started.elapsed().as_secs_f64());
        }

        info!(
            succeeded = succeeded.len(),
            failed = failed.len(),
            "scheduled batch completed"
        );

        Ok(BatchReport {
            evaluated_at: now,
            evaluated_count: active.len(),
            due_count: due.len(),
            succeeded,
            failed,
        })
    }

    async fn execute(
        &self,
        schedule: ScheduleDefinition,
        now: DateTime<Utc>,
    ) -> Result<(Uuid, String), PipelineError> {
        let draft = self
            .orchestrator
            .generate(&schedule.tenant_id, &schedule.params)
            .await?;
        let article = draft.into_content_item();
        self.content
            .insert(&article)
            .await
            .context("failed to persist generated draft")?;
        self.schedules
            .mark_executed(&schedule.tenant_id, schedule.id, now)
            .await
            .context("failed to record schedule execution")?;
        Ok((article.id, article.slug))
    }
}
