//! Repository traits for the document store.
//!
//! Every query takes the tenant id explicitly; there is no ambient tenant context.

use std::collections::{BTreeMap, HashSet};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::models::{ContentItem, ContentKind, ScheduleDefinition, TranslatedFields};

/// ContentRepository - 記事・カテゴリ・タグ・固定ページのデータアクセス層
#[async_trait]
pub trait ContentRepository: Send + Sync {
    /// ストアへの疎通確認
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn get(&self, tenant_id: &str, id: Uuid) -> Result<Option<ContentItem>>;

    /// 公開済みアイテムを作成日時の降順で返す
    async fn list_published(&self, tenant_id: &str, kind: ContentKind) -> Result<Vec<ContentItem>>;

    /// テナント内で使用中の全スラッグ（種別を問わない）
    async fn slugs(&self, tenant_id: &str) -> Result<HashSet<String>>;

    async fn find_by_slug(&self, tenant_id: &str, slug: &str) -> Result<Option<ContentItem>>;

    async fn insert(&self, item: &ContentItem) -> Result<()>;

    async fn update(&self, item: &ContentItem) -> Result<()>;

    async fn delete(&self, tenant_id: &str, id: Uuid) -> Result<bool>;

    /// 複数アイテムの翻訳をまとめて書き込む（アトミック）
    async fn save_translations(
        &self,
        tenant_id: &str,
        updates: &[(Uuid, BTreeMap<String, TranslatedFields>)],
    ) -> Result<()>;
}

/// ScheduleRepository - 自動生成スケジュールのデータアクセス層
#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    /// テナントのスケジュールを名前順で返す
    async fn list(&self, tenant_id: &str) -> Result<Vec<ScheduleDefinition>>;

    /// 全テナントの有効なスケジュール
    async fn list_active(&self) -> Result<Vec<ScheduleDefinition>>;

    async fn get(&self, tenant_id: &str, id: Uuid) -> Result<Option<ScheduleDefinition>>;

    async fn insert(&self, schedule: &ScheduleDefinition) -> Result<()>;

    async fn update(&self, schedule: &ScheduleDefinition) -> Result<()>;

    async fn delete(&self, tenant_id: &str, id: Uuid) -> Result<bool>;

    /// 生成成功後に `last_executed_at` を記録する
    async fn mark_executed(&self, tenant_id: &str, id: Uuid, at: DateTime<Utc>) -> Result<()>;
}
