use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use crate::clients::ProviderError;

pub mod draft;
pub mod fanout;
pub mod generation;
pub mod similarity;
pub mod slug;
pub mod translation;

pub use draft::{FaqEntry, ParsedDraft};
pub use fanout::{TaskFailure, settle_all};
pub use generation::{DraftContentItem, GenerationOrchestrator, RewriteOutcome};
pub use similarity::{
    DuplicateCandidate, DuplicateScreen, ScreeningOutcome, SimilarityResult, similarity,
};
pub use slug::{SlugAllocator, allocate, normalize_slug};
pub use translation::{
    FieldTranslations, LlmTranslator, TranslationBundle, TranslationFanout, TranslationOutcome,
    Translator,
};

/// パイプライン各コンポーネントの境界エラー。
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },
    #[error("generator failed: {0}")]
    Upstream(#[from] ProviderError),
    #[error("generation timed out after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl PipelineError {
    #[must_use]
    pub fn not_found(entity: &'static str, id: Uuid) -> Self {
        Self::NotFound { entity, id }
    }
}
