//! Multi-language translation fan-out.
//!
//! 正規言語のテキストを対象言語ごとに独立して翻訳する。いずれかの言語が失敗しても
//! 他の言語には影響せず、失敗した言語は正規テキストへフォールバックする。
//! 返却されるマップは常に全対象言語のキーを含む。

use std::{collections::{BTreeMap, BTreeSet}, num::NonZeroUsize, sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use super::fanout::settle_all;
use crate::clients::{Prompt, ProviderError, TextGenerator};
use crate::observability::Metrics;
use crate::util::text::is_latin_text;

/// 外部翻訳プロバイダの抽象。
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(
        &self,
        text: &str,
        target_lang: &str,
        context: Option<&str>,
    ) -> Result<String, ProviderError>;

    /// 複数フィールドを1回の呼び出しでまとめて翻訳する。
    ///
    /// 既定実装はフィールドごとに [`Translator::translate`] を呼ぶ。
    async fn translate_fields(
        &self,
        fields: &BTreeMap<String, String>,
        target_lang: &str,
    ) -> Result<BTreeMap<String, String>, ProviderError> {
        let mut translated = BTreeMap::new();
        for (name, text) in fields {
            let value = self.translate(text, target_lang, None).await?;
            translated.insert(name.clone(), value);
        }
        Ok(translated)
    }
}

/// [`TextGenerator`] 上に構築した翻訳器。
#[derive(Clone)]
pub struct LlmTranslator {
    generator: Arc<dyn TextGenerator>,
}

impl LlmTranslator {
    #[must_use]
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl Translator for LlmTranslator {
    async fn translate(
        &self,
        text: &str,
        target_lang: &str,
        context: Option<&str>,
    ) -> Result<String, ProviderError> {
        let system = format!(
            "You are a professional translator. Translate the user's text into {}. \
             Keep HTML tags, URLs and proper nouns intact. Reply with the translation only.",
            language_name(target_lang)
        );
        let user = match context {
            Some(context) if !context.trim().is_empty() => {
                format!("Context: {context}\n\nText:\n{text}")
            }
            _ => text.to_string(),
        };
        let translated = self.generator.complete(&Prompt::new(system, user)).await?;
        Ok(translated.trim().to_string())
    }

    async fn translate_fields(
        &self,
        fields: &BTreeMap<String, String>,
        target_lang: &str,
    ) -> Result<BTreeMap<String, String>, ProviderError> {
        let system = format!(
            "You are a professional translator. The user sends a JSON object whose values are \
             parts of one article. Translate every value into {} consistently. Keep HTML tags \
             intact. Reply with a JSON object that has exactly the same keys.",
            language_name(target_lang)
        );
        let user = serde_json::to_string(fields)
            .map_err(|error| ProviderError::Decode(error.to_string()))?;
        let response = self.generator.complete(&Prompt::new(system, user)).await?;
        parse_json_object(&response)
    }
}

fn parse_json_object(response: &str) -> Result<BTreeMap<String, String>, ProviderError> {
    let start = response.find('{');
    let end = response.rfind('}');
    let (Some(start), Some(end)) = (start, end) else {
        return Err(ProviderError::Decode(
            "batch translation response contained no JSON object".to_string(),
        ));
    };
    if end < start {
        return Err(ProviderError::Decode(
            "batch translation response contained no JSON object".to_string(),
        ));
    }

    let object: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(&response[start..=end])
            .map_err(|error| ProviderError::Decode(error.to_string()))?;

    Ok(object
        .into_iter()
        .filter_map(|(key, value)| match value {
            serde_json::Value::String(text) => Some((key, text)),
            _ => None,
        })
        .collect())
}

fn language_name(code: &str) -> &str {
    match code {
        "ja" => "Japanese",
        "en" => "English",
        "zh" => "Simplified Chinese",
        "ko" => "Korean",
        "fr" => "French",
        "es" => "Spanish",
        "de" => "German",
        other => other,
    }
}

/// 言語ごとの翻訳結果。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum TranslationOutcome {
    Translated { text: String },
    Copied { text: String },
    Fallback { text: String, error: String },
}

impl TranslationOutcome {
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Translated { text } | Self::Copied { text } | Self::Fallback { text, .. } => {
                text
            }
        }
    }

    #[must_use]
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationBundle {
    pub canonical_lang: String,
    pub canonical_text: String,
    pub translations: BTreeMap<String, TranslationOutcome>,
}

impl TranslationBundle {
    /// 言語コード → テキストの単純なマップ。
    #[must_use]
    pub fn texts(&self) -> BTreeMap<String, String> {
        self.translations
            .iter()
            .map(|(lang, outcome)| (lang.clone(), outcome.text().to_string()))
            .collect()
    }
}

/// フィールド名 → 言語コード → 結果。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldTranslations {
    pub canonical_lang: String,
    pub fields: BTreeMap<String, BTreeMap<String, TranslationOutcome>>,
}

impl FieldTranslations {
    #[must_use]
    pub fn text(&self, field: &str, lang: &str) -> Option<&str> {
        self.fields
            .get(field)
            .and_then(|languages| languages.get(lang))
            .map(TranslationOutcome::text)
    }
}

#[derive(Clone)]
pub struct TranslationFanout {
    translator: Arc<dyn Translator>,
    max_concurrency: NonZeroUsize,
    timeout: Duration,
    metrics: Option<Arc<Metrics>>,
}

impl TranslationFanout {
    #[must_use]
    pub fn new(
        translator: Arc<dyn Translator>,
        max_concurrency: NonZeroUsize,
        timeout: Duration,
    ) -> Self {
        Self {
            translator,
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

    /// 1つのテキストを全対象言語へ展開する。
    ///
    /// 正規言語と同じ言語、またはラテン文字のみのテキストは翻訳せずにコピーする。
    /// 翻訳の失敗・タイムアウトは警告ログを出して正規テキストにフォールバックする。
    pub async fn translate_fanout(
        &self,
        text: &str,
        canonical_lang: &str,
        targets: &[String],
        context: Option<&str>,
    ) -> TranslationBundle {
        let mut translations = BTreeMap::new();
        let mut tasks = Vec::new();

        for lang in unique(targets) {
            if lang == canonical_lang || is_latin_text(text) {
                translations.insert(
                    lang.clone(),
                    TranslationOutcome::Copied {
                        text: text.to_string(),
                    },
                );
                continue;
            }

            let translator = Arc::clone(&self.translator);
            let source = text.to_string();
            let target = lang.clone();
            let context = context.map(str::to_string);
            tasks.push((lang.clone(), async move {
                translator
                    .translate(&source, &target, context.as_deref())
                    .await
            }));
        }

        for (lang, result) in settle_all(tasks, self.max_concurrency, self.timeout).await {
            let outcome = match result {
                Ok(Ok(translated)) if !translated.trim().is_empty() => {
                    TranslationOutcome::Translated { text: translated }
                }
                Ok(Ok(_)) => self.fallback(&lang, text, "translator returned empty text"),
                Ok(Err(error)) => self.fallback(&lang, text, &error.to_string()),
                Err(failure) => self.fallback(&lang, text, &failure.to_string()),
            };
            translations.insert(lang, outcome);
        }

        self.record(translations.values());
        debug!(
            canonical_lang,
            languages = translations.len(),
            "translation fan-out completed"
        );

        TranslationBundle {
            canonical_lang: canonical_lang.to_string(),
            canonical_text: text.to_string(),
            translations,
        }
    }

    /// 複数フィールドを言語ごとに1回のバッチ呼び出しで翻訳する。
    ///
    /// 言語全体の失敗は全フィールドのフォールバック、バッチ応答に欠けたフィールドは
    /// そのフィールドだけのフォールバックになる。
    pub async fn translate_bundle(
        &self,
        fields: &BTreeMap<String, String>,
        canonical_lang: &str,
        targets: &[String],
    ) -> FieldTranslations {
        let needs_translation: BTreeMap<String, String> = fields
            .iter()
            .filter(|(_, text)| !is_latin_text(text))
            .map(|(name, text)| (name.clone(), text.clone()))
            .collect();

        let mut per_field: BTreeMap<String, BTreeMap<String, TranslationOutcome>> = fields
            .keys()
            .map(|name| (name.clone(), BTreeMap::new()))
            .collect();
        let mut tasks = Vec::new();

        for lang in unique(targets) {
            if lang == canonical_lang || needs_translation.is_empty() {
                for (name, text) in fields {
                    insert_outcome(
                        &mut per_field,
                        name,
                        lang,
                        TranslationOutcome::Copied { text: text.clone() },
                    );
                }
                continue;
            }

            let translator = Arc::clone(&self.translator);
            let batch = needs_translation.clone();
            let target = lang.clone();
            tasks.push((lang.clone(), async move {
                translator.translate_fields(&batch, &target).await
            }));
        }

        for (lang, result) in settle_all(tasks, self.max_concurrency, self.timeout).await {
            let translated = match result {
                Ok(Ok(translated)) => Ok(translated),
                Ok(Err(error)) => Err(error.to_string()),
                Err(failure) => Err(failure.to_string()),
            };

            for (name, text) in fields {
                let outcome = if !needs_translation.contains_key(name) {
                    TranslationOutcome::Copied { text: text.clone() }
                } else {
                    match &translated {
                        Ok(values) => match values.get(name) {
                            Some(value) if !value.trim().is_empty() => {
                                TranslationOutcome::Translated {
                                    text: value.clone(),
                                }
                            }
                            _ => self.fallback(&lang, text, "field missing from batch response"),
                        },
                        Err(error) => self.fallback(&lang, text, error),
                    }
                };
                insert_outcome(&mut per_field, name, &lang, outcome);
            }
        }

        self.record(per_field.values().flat_map(BTreeMap::values));

        FieldTranslations {
            canonical_lang: canonical_lang.to_string(),
            fields: per_field,
        }
    }

    fn fallback(&self, lang: &str, text: &str, error: &str) -> TranslationOutcome {
        warn!(lang, error, "translation failed, falling back to canonical text");
        TranslationOutcome::Fallback {
            text: text.to_string(),
            error: error.to_string(),
        }
    }

    fn record<'a>(&self, outcomes: impl Iterator<Item = &'a TranslationOutcome>) {
        let Some(metrics) = &self.metrics else {
            return;
        };
        for outcome in outcomes {
            metrics.translations_total.inc();
            if outcome.is_fallback() {
                metrics.translation_fallbacks.inc();
            }
        }
    }
}

fn unique(targets: &[String]) -> impl Iterator<Item = &String> {
    let mut seen = BTreeSet::new();
    targets.iter().filter(move |lang| seen.insert(lang.as_str()))
}

fn insert_outcome(
    per_field: &mut BTreeMap<String, BTreeMap<String, TranslationOutcome>>,
    field: &str,
    lang: &str,
    outcome: TranslationOutcome,
) {
    per_field
        .entry(field.to_string())
        .or_default()
        .insert(lang.to_string(), outcome);
}
