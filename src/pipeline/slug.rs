use std::{collections::HashSet, sync::Arc};

use tracing::{debug, warn};
use uuid::Uuid;

use super::PipelineError;
use crate::clients::{Prompt, TextGenerator};
use crate::observability::Metrics;
use crate::store::ContentRepository;
use crate::util::text::is_latin_text;

/// 正規化の結果が空になった場合（日本語タイトル等）に使うベース。
pub const FALLBACK_SLUG: &str = "untitled";

/// 小文字化し、`[a-z0-9]` 以外を `-` に置換、連続する `-` を畳み、前後の `-` を除去する。
#[must_use]
pub fn normalize_slug(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            slug.push(c);
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}

fn base_slug(candidate: &str) -> String {
    let base = normalize_slug(candidate);
    if base.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        base
    }
}

/// テナント内で一意なスラッグを決定的に割り当てる。
///
/// `exclude` は編集中アイテム自身の現在のスラッグで、それと一致する場合は衝突とみなさない。
/// 接尾辞付きの候補も同様で、`a-2` を持つアイテムは `a-2` を保持する。
/// 同一テナントへの同時割り当てに対しては安全ではない。
#[must_use]
pub fn allocate(candidate: &str, existing: &HashSet<String>, exclude: Option<&str>) -> String {
    let base = base_slug(candidate);

    if !existing.contains(&base) || exclude == Some(base.as_str()) {
        return base;
    }

    let mut suffix: u64 = 2;
    loop {
        let attempt = format!("{base}-{suffix}");
        if !existing.contains(&attempt) || exclude == Some(attempt.as_str()) {
            return attempt;
        }
        suffix += 1;
    }
}

/// Repository-backed slug allocation for one tenant.
#[derive(Clone)]
pub struct SlugAllocator {
    content: Arc<dyn ContentRepository>,
    generator: Arc<dyn TextGenerator>,
    metrics: Option<Arc<Metrics>>,
}

impl SlugAllocator {
    #[must_use]
    pub fn new(content: Arc<dyn ContentRepository>, generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            content,
            generator,
            metrics: None,
        }
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// テナントの既存スラッグに対して割り当てる。
    ///
    /// `exclude_id` が指定された場合、そのアイテムの現在のスラッグは再利用可能。
    ///
    /// # Errors
    /// `exclude_id` のアイテムが存在しない場合は `NotFound`、ストア障害は `Store`。
    pub async fn allocate_for_tenant(
        &self,
        tenant_id: &str,
        candidate: &str,
        exclude_id: Option<Uuid>,
    ) -> Result<String, PipelineError> {
        let exclude_slug = match exclude_id {
            Some(id) => Some(
                self.content
                    .get(tenant_id, id)
                    .await?
                    .ok_or_else(|| PipelineError::not_found("content item", id))?
                    .slug,
            ),
            None => None,
        };

        let existing = self.content.slugs(tenant_id).await?;
        let slug = allocate(candidate, &existing, exclude_slug.as_deref());
        if slug != base_slug(candidate) {
            if let Some(metrics) = &self.metrics {
                metrics.slug_collisions.inc();
            }
        }
        debug!(tenant_id, %slug, existing = existing.len(), "allocated slug");
        Ok(slug)
    }

    /// 非ラテン文字のタイトルを短い英語フレーズへ変換してから割り当てる。
    ///
    /// 変換に失敗した場合は元のタイトルで割り当てを続行する。
    ///
    /// # Errors
    /// [`Self::allocate_for_tenant`] と同じ。
    pub async fn allocate_with_romanizer(
        &self,
        tenant_id: &str,
        title: &str,
        exclude_id: Option<Uuid>,
    ) -> Result<String, PipelineError> {
        let candidate = if is_latin_text(title) {
            title.to_string()
        } else {
            match self.generator.complete(&romanize_prompt(title)).await {
                Ok(phrase) => phrase.lines().next().unwrap_or_default().trim().to_string(),
                Err(error) => {
                    warn!(tenant_id, error = %error, "slug romanization failed, using raw title");
                    title.to_string()
                }
            }
        };
        self.allocate_for_tenant(tenant_id, &candidate, exclude_id)
            .await
    }
}

fn romanize_prompt(title: &str) -> Prompt {
    Prompt::new(
        "You create URL slugs. Translate the given article title into a short English phrase \
         of at most six words. Reply with the phrase only, without quotes or punctuation.",
        title,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::ProviderError;
    use crate::store::{ContentItem, ContentKind, InMemoryContentRepository};
    use async_trait::async_trait;
    use rstest::rstest;

    fn set(values: &[&str]) -> HashSet<String> {
        values.iter().map(|v| (*v).to_string()).collect()
    }

    #[rstest]
    #[case("Hello World!", "hello-world")]
    #[case("  --Already--slugged-- ", "already-slugged")]
    #[case("C++ & Rust 2024", "c-rust-2024")]
    #[case("Café Tour", "caf-tour")]
    fn normalize_examples(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize_slug(input), expected);
    }

    #[test]
    fn allocate_returns_normalized_when_free() {
        assert_eq!(allocate("Hello World!", &HashSet::new(), None), "hello-world");
    }

    #[test]
    fn allocate_appends_first_free_suffix() {
        assert_eq!(allocate("a", &set(&["a"]), None), "a-2");
        assert_eq!(allocate("a", &set(&["a", "a-2"]), None), "a-3");
        assert_eq!(allocate("a", &set(&["a", "a-3"]), None), "a-2");
    }

    #[test]
    fn allocate_keeps_own_slug_when_excluded() {
        assert_eq!(
            allocate("my-slug", &set(&["my-slug"]), Some("my-slug")),
            "my-slug"
        );
    }

    #[test]
    fn allocate_keeps_own_suffixed_slug_when_excluded() {
        assert_eq!(allocate("a", &set(&["a", "a-2"]), Some("a-2")), "a-2");
        assert_eq!(allocate("a", &set(&["a", "a-2", "a-3"]), Some("a-3")), "a-3");
    }

    #[test]
    fn allocate_is_deterministic_for_same_snapshot() {
        let existing = set(&["travel-tips", "travel-tips-2"]);
        let first = allocate("Travel Tips", &existing, None);
        let second = allocate("Travel Tips", &existing, None);
        assert_eq!(first, second);
        assert_eq!(first, "travel-tips-3");
    }

    #[test]
    fn allocate_falls_back_for_non_latin_titles() {
        assert_eq!(allocate("旅行ガイド", &HashSet::new(), None), "untitled");
        assert_eq!(allocate("旅行ガイド", &set(&["untitled"]), None), "untitled-2");
    }

    struct FixedGenerator(Result<&'static str, ()>);

    #[async_trait]
    impl TextGenerator for FixedGenerator {
        async fn complete(&self, _prompt: &Prompt) -> Result<String, ProviderError> {
            self.0
                .map(str::to_string)
                .map_err(|()| ProviderError::Unavailable("down".into()))
        }
    }

    fn allocator(
        repo: Arc<InMemoryContentRepository>,
        reply: Result<&'static str, ()>,
    ) -> SlugAllocator {
        SlugAllocator::new(repo, Arc::new(FixedGenerator(reply)))
    }

    #[tokio::test]
    async fn allocate_for_tenant_uses_existing_slugs() {
        let repo = Arc::new(InMemoryContentRepository::new());
        repo.insert(&ContentItem::new("t", ContentKind::Category, "Travel Tips", "travel-tips"))
            .await
            .expect("insert");

        let slug = allocator(repo, Ok("unused"))
            .allocate_for_tenant("t", "Travel Tips", None)
            .await
            .expect("allocates");

        assert_eq!(slug, "travel-tips-2");
    }

    #[tokio::test]
    async fn allocate_for_tenant_excludes_item_being_edited() {
        let repo = Arc::new(InMemoryContentRepository::new());
        let item = ContentItem::new("t", ContentKind::Article, "Travel Tips", "travel-tips");
        repo.insert(&item).await.expect("insert");

        let slug = allocator(repo, Ok("unused"))
            .allocate_for_tenant("t", "Travel Tips", Some(item.id))
            .await
            .expect("allocates");

        assert_eq!(slug, "travel-tips");
    }

    #[tokio::test]
    async fn allocate_for_tenant_reports_missing_excluded_item() {
        let repo = Arc::new(InMemoryContentRepository::new());
        let error = allocator(repo, Ok("unused"))
            .allocate_for_tenant("t", "x", Some(Uuid::new_v4()))
            .await
            .expect_err("missing item");

        assert!(matches!(error, PipelineError::NotFound { .. }));
    }

    #[tokio::test]
    async fn romanizer_translates_non_latin_titles() {
        let repo = Arc::new(InMemoryContentRepository::new());
        let slug = allocator(repo, Ok("Barrier-free Travel Guide\nextra"))
            .allocate_with_romanizer("t", "バリアフリー旅行ガイド", None)
            .await
            .expect("allocates");

        assert_eq!(slug, "barrier-free-travel-guide");
    }

    #[tokio::test]
    async fn romanizer_failure_falls_back_to_title() {
        let repo = Arc::new(InMemoryContentRepository::new());
        let slug = allocator(repo, Err(()))
            .allocate_with_romanizer("t", "バリアフリー旅行ガイド", None)
            .await
            .expect("allocates");

        assert_eq!(slug, "untitled");
    }
}
