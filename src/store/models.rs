use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// コンテンツ種別。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Article,
    Category,
    Tag,
    Page,
}

impl ContentKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Article => "article",
            Self::Category => "category",
            Self::Tag => "tag",
            Self::Page => "page",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "article" => Some(Self::Article),
            "category" => Some(Self::Category),
            "tag" => Some(Self::Tag),
            "page" => Some(Self::Page),
            _ => None,
        }
    }
}

/// 翻訳済みのテキストフィールド一式。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslatedFields {
    pub title: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    pub id: Uuid,
    pub tenant_id: String,
    pub kind: ContentKind,
    pub title: String,
    pub excerpt: String,
    pub body: String,
    pub slug: String,
    pub published: bool,
    #[serde(default)]
    pub translations: BTreeMap<String, TranslatedFields>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ContentItem {
    /// 未公開の新規アイテムを作成する。
    #[must_use]
    pub fn new(
        tenant_id: impl Into<String>,
        kind: ContentKind,
        title: impl Into<String>,
        slug: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            tenant_id: tenant_id.into(),
            kind,
            title: title.into(),
            excerpt: String::new(),
            body: String::new(),
            slug: slug.into(),
            published: false,
            translations: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn with_body(mut self, excerpt: impl Into<String>, body: impl Into<String>) -> Self {
        self.excerpt = excerpt.into();
        self.body = body.into();
        self
    }

    #[must_use]
    pub fn published(mut self, published: bool) -> Self {
        self.published = published;
        self
    }
}

/// 生成パラメータ。生成器へそのまま渡す不透明な参照の組。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationParams {
    pub category_id: String,
    pub writer_id: String,
    pub image_prompt_pattern_id: String,
    pub target_audience: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleDefinition {
    pub id: Uuid,
    pub tenant_id: String,
    pub name: String,
    pub params: GenerationParams,
    /// Weekday codes, `"0"` = Sunday … `"6"` = Saturday.
    pub days_of_week: BTreeSet<String>,
    /// `HH:MM`
    pub time_of_day: String,
    pub timezone: String,
    pub is_active: bool,
    pub last_executed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScheduleDefinition {
    #[must_use]
    pub fn new(
        tenant_id: impl Into<String>,
        name: impl Into<String>,
        params: GenerationParams,
        days_of_week: impl IntoIterator<Item = impl Into<String>>,
        time_of_day: impl Into<String>,
        timezone: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            tenant_id: tenant_id.into(),
            name: name.into(),
            params,
            days_of_week: days_of_week.into_iter().map(Into::into).collect(),
            time_of_day: time_of_day.into(),
            timezone: timezone.into(),
            is_active: true,
            last_executed_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}
