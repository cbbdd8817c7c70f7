//! Draft generation: generator → slug → duplicate screening → draft.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use serde::Serialize;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::PipelineError;
use super::draft::{FaqEntry, ParsedDraft, build_generation_prompt, build_rewrite_prompt, parse_draft};
use super::similarity::{DuplicateCandidate, DuplicateScreen, SimilarityResult};
use super::slug::SlugAllocator;
use crate::clients::{Prompt, TextGenerator};
use crate::observability::Metrics;
use crate::store::{ContentItem, ContentKind, ContentRepository, GenerationParams};

/// 生成済みで未保存の記事ドラフト。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftContentItem {
    pub tenant_id: String,
    pub title: String,
    pub excerpt: String,
    pub body: String,
    pub slug: String,
    pub faq: Vec<FaqEntry>,
    pub generation_params: GenerationParams,
    pub warnings: Vec<String>,
    pub duplicates: Vec<SimilarityResult>,
}

impl DraftContentItem {
    /// 未公開の記事としてストアに書き込める形へ変換する。FAQ は本文末尾に追記する。
    #[must_use]
    pub fn into_content_item(self) -> ContentItem {
        let body = if self.faq.is_empty() {
            self.body
        } else {
            format!("{}\n{}", self.body, render_faq(&self.faq))
        };
        ContentItem::new(self.tenant_id, ContentKind::Article, self.title, self.slug)
            .with_body(self.excerpt, body)
    }
}

/// リライト結果（保存はしない）。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RewriteOutcome {
    pub article_id: Uuid,
    pub draft: ParsedDraft,
    pub is_duplicate: bool,
    pub matched_titles: Vec<String>,
}

#[derive(Clone)]
pub struct GenerationOrchestrator {
    generator: Arc<dyn TextGenerator>,
    content: Arc<dyn ContentRepository>,
    slugs: SlugAllocator,
    screen: DuplicateScreen,
    call_timeout: Option<Duration>,
    metrics: Option<Arc<Metrics>>,
}

impl GenerationOrchestrator {
    #[must_use]
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        content: Arc<dyn ContentRepository>,
        screen: DuplicateScreen,
    ) -> Self {
        let slugs = SlugAllocator::new(Arc::clone(&content), Arc::clone(&generator));
        Self {
            generator,
            content,
            slugs,
            screen,
            call_timeout: None,
            metrics: None,
        }
    }

    /// 生成器1回の呼び出しに上限時間を設ける。超過すると `PipelineError::Timeout`。
    #[must_use]
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.slugs = self.slugs.with_metrics(Arc::clone(&metrics));
        self.metrics = Some(metrics);
        self
    }

    #[must_use]
    pub fn slugs(&self) -> &SlugAllocator {
        &self.slugs
    }

    #[must_use]
    pub fn screen(&self) -> DuplicateScreen {
        self.screen
    }

    /// ドラフトを1件生成する。重複は警告として添付され、生成をブロックしない。
    ///
    /// # Errors
    /// 生成器の失敗・空応答は `Upstream`、ストア障害は `Store` を返す。再試行はしない。
    #[instrument(skip_all, fields(tenant_id = %tenant_id, category_id = %params.category_id))]
    pub async fn generate(
        &self,
        tenant_id: &str,
        params: &GenerationParams,
    ) -> Result<DraftContentItem, PipelineError> {
        let started = Instant::now();
        if let Some(metrics) = &self.metrics {
            metrics.generations_total.inc();
        }

        let result = self.generate_draft(tenant_id, params).await;

        if let Some(metrics) = &self.metrics {
            metrics
                .generation_duration
                .observe(started.elapsed().as_secs_f64());
            if result.is_err() {
                metrics.generations_failed.inc();
            }
        }
        match &result {
            Ok(draft) => info!(
                slug = %draft.slug,
                duplicates = draft.duplicates.len(),
                "draft generated"
            ),
            Err(error) => error!(error = %error, "draft generation failed"),
        }
        result
    }

    async fn generate_draft(
        &self,
        tenant_id: &str,
        params: &GenerationParams,
    ) -> Result<DraftContentItem, PipelineError> {
        let response = self.complete(&build_generation_prompt(params)).await?;
        let parsed = parse_draft(&response)?;

        let slug_source = parsed
            .slug
            .as_deref()
            .filter(|candidate| !candidate.trim().is_empty())
            .unwrap_or(&parsed.title);
        let slug = self
            .slugs
            .allocate_for_tenant(tenant_id, slug_source, None)
            .await?;

        let published = self
            .content
            .list_published(tenant_id, ContentKind::Article)
            .await?;
        let outcome = self.screen.screen(
            &DuplicateCandidate {
                id: None,
                title: parsed.title.clone(),
                content: parsed.body.clone(),
            },
            &published,
        );
        if outcome.is_duplicate {
            self.record_duplicate();
            warn!(
                tenant_id,
                matches = outcome.duplicates.len(),
                "generated draft resembles published articles"
            );
        }
        let warnings = outcome.duplicates.iter().map(describe_match).collect();

        Ok(DraftContentItem {
            tenant_id: tenant_id.to_string(),
            title: parsed.title,
            excerpt: parsed.excerpt,
            body: parsed.body,
            slug,
            faq: parsed.faq,
            generation_params: params.clone(),
            warnings,
            duplicates: outcome.duplicates,
        })
    }

    /// 既存記事を書き直し、採用前に公開記事との重複を確認する。
    ///
    /// # Errors
    /// 記事が存在しない場合は `NotFound`、生成器の失敗は `Upstream`。
    #[instrument(skip_all, fields(tenant_id = %tenant_id, article_id = %article_id))]
    pub async fn rewrite(
        &self,
        tenant_id: &str,
        article_id: Uuid,
        instructions: Option<&str>,
    ) -> Result<RewriteOutcome, PipelineError> {
        let article = self
            .content
            .get(tenant_id, article_id)
            .await?
            .ok_or_else(|| PipelineError::not_found("article", article_id))?;

        let response = self
            .complete(&build_rewrite_prompt(&article, instructions))
            .await?;
        let draft = parse_draft(&response)?;

        let published = self
            .content
            .list_published(tenant_id, ContentKind::Article)
            .await?;
        let outcome = self.screen.screen(
            &DuplicateCandidate {
                id: Some(article.id),
                title: draft.title.clone(),
                content: draft.body.clone(),
            },
            &published,
        );
        if outcome.is_duplicate {
            self.record_duplicate();
        }

        Ok(RewriteOutcome {
            article_id,
            draft,
            is_duplicate: outcome.is_duplicate,
            matched_titles: outcome
                .duplicates
                .into_iter()
                .map(|result| result.title)
                .collect(),
        })
    }

    async fn complete(&self, prompt: &Prompt) -> Result<String, PipelineError> {
        let Some(limit) = self.call_timeout else {
            return Ok(self.generator.complete(prompt).await?);
        };
        match tokio::time::timeout(limit, self.generator.complete(prompt)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(PipelineError::Timeout(limit)),
        }
    }

    fn record_duplicate(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.duplicates_flagged.inc();
        }
    }
}

fn describe_match(result: &SimilarityResult) -> String {
    format!(
        "similar to published article \"{}\" (title {:.2}, content {:.2})",
        result.title, result.title_similarity, result.content_similarity
    )
}

fn render_faq(entries: &[FaqEntry]) -> String {
    let mut html = String::from("<h2>FAQ</h2>\n<dl>\n");
    for entry in entries {
        html.push_str("<dt>");
        html.push_str(&escape_html(&entry.question));
        html.push_str("</dt>\n<dd>");
        html.push_str(&escape_html(&entry.answer));
        html.push_str("</dd>\n");
    }
    html.push_str("</dl>");
    html
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
