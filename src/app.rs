use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use sqlx::{PgPool, postgres::PgPoolOptions};
use tower_http::trace::TraceLayer;

use crate::{
    api,
    clients::{ChatCompletionClient, TextGenerator},
    config::{Config, StoreBackend},
    observability::Telemetry,
    pipeline::{
        DuplicateScreen, GenerationOrchestrator, LlmTranslator, SlugAllocator, TranslationFanout,
        Translator,
    },
    scheduler::{ScheduleMatcher, ScheduledBatchRunner},
    store::{
        ContentRepository, InMemoryContentRepository, InMemoryScheduleRepository,
        PgContentRepository, PgScheduleRepository, ScheduleRepository,
    },
};

#[derive(Clone)]
pub struct AppState {
    registry: Arc<ComponentRegistry>,
}

pub struct ComponentRegistry {
    config: Arc<Config>,
    telemetry: Telemetry,
    pg_pool: Option<PgPool>,
    content: Arc<dyn ContentRepository>,
    schedules: Arc<dyn ScheduleRepository>,
    orchestrator: GenerationOrchestrator,
    translations: TranslationFanout,
    batch_runner: Arc<ScheduledBatchRunner>,
}

impl AppState {
    #[must_use]
    pub fn new(registry: ComponentRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub(crate) fn config(&self) -> &Config {
        &self.registry.config
    }

    pub(crate) fn telemetry(&self) -> &Telemetry {
        &self.registry.telemetry
    }

    pub(crate) fn content(&self) -> Arc<dyn ContentRepository> {
        Arc::clone(&self.registry.content)
    }

    pub(crate) fn schedules(&self) -> Arc<dyn ScheduleRepository> {
        Arc::clone(&self.registry.schedules)
    }

    pub(crate) fn orchestrator(&self) -> &GenerationOrchestrator {
        &self.registry.orchestrator
    }

    pub(crate) fn slugs(&self) -> &SlugAllocator {
        self.registry.orchestrator.slugs()
    }

    pub(crate) fn translations(&self) -> &TranslationFanout {
        &self.registry.translations
    }

    pub(crate) fn batch_runner(&self) -> Arc<ScheduledBatchRunner> {
        Arc::clone(&self.registry.batch_runner)
    }
}

impl ComponentRegistry {
    /// 構成情報と依存をまとめて初期化し、アプリケーションの共有レジストリを構築する。
    ///
    /// # Errors
    /// Telemetry の初期化、HTTP クライアント構築、DB プール設定が失敗した場合はエラーを返す。
    pub async fn build(config: Config) -> Result<Self> {
        let telemetry = Telemetry::new()?;

        let generator: Arc<dyn TextGenerator> = Arc::new(ChatCompletionClient::new(
            config.llm_base_url(),
            config.llm_api_key(),
            config.llm_model(),
            config.llm_timeout(),
        )?);
        let translator: Arc<dyn Translator> = Arc::new(LlmTranslator::new(Arc::clone(&generator)));

        let (pg_pool, content, schedules): (
            Option<PgPool>,
            Arc<dyn ContentRepository>,
            Arc<dyn ScheduleRepository>,
        ) = match config.store_backend() {
            StoreBackend::Postgres => {
                let dsn = config
                    .content_db_dsn()
                    .context("CONTENT_DB_DSN is required for the postgres store")?;
                let pool = PgPoolOptions::new()
                    .max_connections(config.content_db_max_connections())
                    .acquire_timeout(config.content_db_acquire_timeout())
                    .test_before_acquire(true)
                    .connect_lazy(dsn)
                    .context("failed to configure content_db connection pool")?;
                (
                    Some(pool.clone()),
                    Arc::new(PgContentRepository::new(pool.clone())),
                    Arc::new(PgScheduleRepository::new(pool)),
                )
            }
            StoreBackend::Memory => (
                None,
                Arc::new(InMemoryContentRepository::new()),
                Arc::new(InMemoryScheduleRepository::new()),
            ),
        };

        let mut registry = Self::from_parts(
            config, telemetry, content, schedules, generator, translator,
        );
        registry.pg_pool = pg_pool;
        Ok(registry)
    }

    /// 既に用意された依存からレジストリを組み立てる（テストや組み込み用途）。
    #[must_use]
    pub fn from_parts(
        config: Config,
        telemetry: Telemetry,
        content: Arc<dyn ContentRepository>,
        schedules: Arc<dyn ScheduleRepository>,
        generator: Arc<dyn TextGenerator>,
        translator: Arc<dyn Translator>,
    ) -> Self {
        let config = Arc::new(config);
        let metrics = telemetry.metrics();

        let screen = DuplicateScreen::new(
            config.duplicate_threshold(),
            config.duplicate_content_chars(),
        );
        let orchestrator = GenerationOrchestrator::new(generator, Arc::clone(&content), screen)
            .with_call_timeout(config.generation_timeout())
            .with_metrics(Arc::clone(&metrics));
        let translations = TranslationFanout::new(
            translator,
            config.translation_max_concurrency(),
            config.translation_timeout(),
        )
        .with_metrics(Arc::clone(&metrics));
        let batch_runner = Arc::new(
            ScheduledBatchRunner::new(
                Arc::clone(&schedules),
                Arc::clone(&content),
                orchestrator.clone(),
                ScheduleMatcher::new(config.minute_rounding()),
                config.generation_max_concurrency(),
                config.generation_timeout(),
            )
            .with_metrics(metrics),
        );

        Self {
            config,
            telemetry,
            pg_pool: None,
            content,
            schedules,
            orchestrator,
            translations,
            batch_runner,
        }
    }

    #[must_use]
    pub fn config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    #[must_use]
    pub fn pg_pool(&self) -> Option<&PgPool> {
        self.pg_pool.as_ref()
    }

    #[must_use]
    pub fn batch_runner(&self) -> Arc<ScheduledBatchRunner> {
        Arc::clone(&self.batch_runner)
    }
}

pub fn build_router(registry: ComponentRegistry) -> Router {
    let state = AppState::new(registry);
    api::router(state).layer(TraceLayer::new_for_http())
}
