/// Prometheusメトリクス定義。
use prometheus::{
    Counter, Histogram, Registry, register_counter_with_registry,
    register_histogram_with_registry,
};
use std::sync::Arc;

/// メトリクスコレクター。
#[derive(Debug, Clone)]
pub struct Metrics {
    // カウンター
    pub generations_total: Counter,
    pub generations_failed: Counter,
    pub duplicates_flagged: Counter,
    pub slug_collisions: Counter,
    pub translations_total: Counter,
    pub translation_fallbacks: Counter,
    pub scheduled_batches: Counter,
    pub scheduled_runs_succeeded: Counter,
    pub scheduled_runs_failed: Counter,

    // ヒストグラム
    pub generation_duration: Histogram,
    pub batch_duration: Histogram,
}

impl Metrics {
    /// 新しいメトリクスコレクターを作成する。
    ///
    /// # Errors
    /// 同名のメトリクスが既に登録されている場合はエラーを返す。
    pub fn new(registry: Arc<Registry>) -> Result<Self, prometheus::Error> {
        Ok(Self {
            generations_total: register_counter_with_registry!(
                "content_generations_total",
                "Total number of draft generations attempted",
                registry
            )?,
            generations_failed: register_counter_with_registry!(
                "content_generations_failed_total",
                "Total number of draft generations that failed",
                registry
            )?,
            duplicates_flagged: register_counter_with_registry!(
                "content_duplicates_flagged_total",
                "Number of screenings that reported at least one near-duplicate",
                registry
            )?,
            slug_collisions: register_counter_with_registry!(
                "content_slug_collisions_total",
                "Number of slug allocations that needed a numeric suffix",
                registry
            )?,
            translations_total: register_counter_with_registry!(
                "content_translations_total",
                "Total number of per-language translation outcomes",
                registry
            )?,
            translation_fallbacks: register_counter_with_registry!(
                "content_translation_fallbacks_total",
                "Number of languages that fell back to the canonical text",
                registry
            )?,
            scheduled_batches: register_counter_with_registry!(
                "content_scheduled_batches_total",
                "Total number of scheduled batch evaluations",
                registry
            )?,
            scheduled_runs_succeeded: register_counter_with_registry!(
                "content_scheduled_runs_succeeded_total",
                "Number of due schedules that produced a draft",
                registry
            )?,
            scheduled_runs_failed: register_counter_with_registry!(
                "content_scheduled_runs_failed_total",
                "Number of due schedules that failed",
                registry
            )?,
            generation_duration: register_histogram_with_registry!(
                "content_generation_duration_seconds",
                "Duration of a single draft generation",
                registry
            )?,
            batch_duration: register_histogram_with_registry!(
                "content_batch_duration_seconds",
                "Duration of a scheduled batch run",
                registry
            )?,
        })
    }
}
