//! In-memory repositories (single process, no durability).
//!
//! Used with `STORE_BACKEND=memory` and by the test suites.

use std::collections::{BTreeMap, HashMap, HashSet};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::models::{ContentItem, ContentKind, ScheduleDefinition, TranslatedFields};
use super::repository::{ContentRepository, ScheduleRepository};

type Key = (String, Uuid);

#[derive(Debug, Default)]
pub struct InMemoryContentRepository {
    items: RwLock<HashMap<Key, ContentItem>>,
}

impl InMemoryContentRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// テスト・初期データ投入用。
    pub async fn seed(&self, items: impl IntoIterator<Item = ContentItem>) {
        let mut guard = self.items.write().await;
        for item in items {
            guard.insert((item.tenant_id.clone(), item.id), item);
        }
    }

    pub async fn all(&self, tenant_id: &str) -> Vec<ContentItem> {
        let guard = self.items.read().await;
        let mut items: Vec<ContentItem> = guard
            .values()
            .filter(|item| item.tenant_id == tenant_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        items
    }
}

#[async_trait]
impl ContentRepository for InMemoryContentRepository {
    async fn get(&self, tenant_id: &str, id: Uuid) -> Result<Option<ContentItem>> {
        let guard = self.items.read().await;
        Ok(guard.get(&(tenant_id.to_string(), id)).cloned())
    }

    async fn list_published(&self, tenant_id: &str, kind: ContentKind) -> Result<Vec<ContentItem>> {
        let guard = self.items.read().await;
        let mut items: Vec<ContentItem> = guard
            .values()
            .filter(|item| item.tenant_id == tenant_id && item.kind == kind && item.published)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }

    async fn slugs(&self, tenant_id: &str) -> Result<HashSet<String>> {
        let guard = self.items.read().await;
        Ok(guard
            .values()
            .filter(|item| item.tenant_id == tenant_id)
            .map(|item| item.slug.clone())
            .collect())
    }

    async fn find_by_slug(&self, tenant_id: &str, slug: &str) -> Result<Option<ContentItem>> {
        let guard = self.items.read().await;
        Ok(guard
            .values()
            .find(|item| item.tenant_id == tenant_id && item.slug == slug)
            .cloned())
    }

    async fn insert(&self, item: &ContentItem) -> Result<()> {
        let mut guard = self.items.write().await;
        guard.insert((item.tenant_id.clone(), item.id), item.clone());
        Ok(())
    }

    async fn update(&self, item: &ContentItem) -> Result<()> {
        let mut guard = self.items.write().await;
        let key = (item.tenant_id.clone(), item.id);
        match guard.get_mut(&key) {
            Some(existing) => {
                *existing = item.clone();
                existing.updated_at = Utc::now();
                Ok(())
            }
            None => Err(anyhow!("content item {} not found", item.id)),
        }
    }

    async fn delete(&self, tenant_id: &str, id: Uuid) -> Result<bool> {
        let mut guard = self.items.write().await;
        Ok(guard.remove(&(tenant_id.to_string(), id)).is_some())
    }

    async fn save_translations(
        &self,
        tenant_id: &str,
        updates: &[(Uuid, BTreeMap<String, TranslatedFields>)],
    ) -> Result<()> {
        let mut guard = self.items.write().await;
        // all-or-nothing: validate before mutating
        for (id, _) in updates {
            if !guard.contains_key(&(tenant_id.to_string(), *id)) {
                return Err(anyhow!("content item {id} not found"));
            }
        }
        let now = Utc::now();
        for (id, translations) in updates {
            if let Some(item) = guard.get_mut(&(tenant_id.to_string(), *id)) {
                item.translations.extend(translations.clone());
                item.updated_at = now;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryScheduleRepository {
    schedules: RwLock<HashMap<Key, ScheduleDefinition>>,
}

impl InMemoryScheduleRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScheduleRepository for InMemoryScheduleRepository {
    async fn list(&self, tenant_id: &str) -> Result<Vec<ScheduleDefinition>> {
        let guard = self.schedules.read().await;
        let mut schedules: Vec<ScheduleDefinition> = guard
            .values()
            .filter(|schedule| schedule.tenant_id == tenant_id)
            .cloned()
            .collect();
        schedules.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(schedules)
    }

    async fn list_active(&self) -> Result<Vec<ScheduleDefinition>> {
        let guard = self.schedules.read().await;
        let mut schedules: Vec<ScheduleDefinition> = guard
            .values()
            .filter(|schedule| schedule.is_active)
            .cloned()
            .collect();
        schedules.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(schedules)
    }

    async fn get(&self, tenant_id: &str, id: Uuid) -> Result<Option<ScheduleDefinition>> {
        let guard = self.schedules.read().await;
        Ok(guard.get(&(tenant_id.to_string(), id)).cloned())
    }

    async fn insert(&self, schedule: &ScheduleDefinition) -> Result<()> {
        let mut guard = self.schedules.write().await;
        guard.insert((schedule.tenant_id.clone(), schedule.id), schedule.clone());
        Ok(())
    }

    async fn update(&self, schedule: &ScheduleDefinition) -> Result<()> {
        let mut guard = self.schedules.write().await;
        let key = (schedule.tenant_id.clone(), schedule.id);
        match guard.get_mut(&key) {
            Some(existing) => {
                *existing = schedule.clone();
                existing.updated_at = Utc::now();
                Ok(())
            }
            None => Err(anyhow!("schedule {} not found", schedule.id)),
        }
    }

    async fn delete(&self, tenant_id: &str, id: Uuid) -> Result<bool> {
        let mut guard = self.schedules.write().await;
        Ok(guard.remove(&(tenant_id.to_string(), id)).is_some())
    }

    async fn mark_executed(&self, tenant_id: &str, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        let mut guard = self.schedules.write().await;
        match guard.get_mut(&(tenant_id.to_string(), id)) {
            Some(schedule) => {
                schedule.last_executed_at = Some(at);
                schedule.updated_at = Utc::now();
                Ok(())
            }
            None => Err(anyhow!("schedule {id} not found")),
        }
    }
}
