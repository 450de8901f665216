//! Store wrapper that fails selected primitives.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Result, bail};
use async_trait::async_trait;

use super::{ChildFilter, ContentStore, MemoryStore};
use crate::content::Range;
use crate::models::{ContentItem, ItemId, NewItem};

/// Delegates to a [`MemoryStore`] but bails on every primitive named in
/// `failing`, before touching the inner store.
pub(crate) struct FailingStore {
    pub inner: Arc<MemoryStore>,
    failing: HashSet<&'static str>,
}

impl FailingStore {
    pub fn new(inner: Arc<MemoryStore>, failing: &[&'static str]) -> Self {
        Self {
            inner,
            failing: failing.iter().copied().collect(),
        }
    }

    fn check(&self, primitive: &str) -> Result<()> {
        if self.failing.contains(primitive) {
            bail!("{primitive}: disk full");
        }
        Ok(())
    }
}

#[async_trait]
impl ContentStore for FailingStore {
    async fn get(&self, id: ItemId) -> Result<Option<ContentItem>> {
        self.inner.get(id).await
    }

    async fn find_child_by_name(
        &self,
        parent_id: ItemId,
        name: &str,
    ) -> Result<Option<ContentItem>> {
        self.inner.find_child_by_name(parent_id, name).await
    }

    async fn list_children(
        &self,
        parent_id: ItemId,
        filter: ChildFilter,
        window: Range,
    ) -> Result<Vec<ContentItem>> {
        self.inner.list_children(parent_id, filter, window).await
    }

    async fn descendants(&self, id: ItemId) -> Result<Vec<ContentItem>> {
        self.inner.descendants(id).await
    }

    async fn insert(&self, input: NewItem) -> Result<ContentItem> {
        self.check("insert")?;
        self.inner.insert(input).await
    }

    async fn save(&self, item: &ContentItem) -> Result<()> {
        self.check("save")?;
        self.inner.save(item).await
    }

    async fn move_item(
        &self,
        id: ItemId,
        parent_id: ItemId,
        before: Option<ItemId>,
    ) -> Result<()> {
        self.check("move_item")?;
        self.inner.move_item(id, parent_id, before).await
    }

    async fn save_and_move(
        &self,
        item: &ContentItem,
        parent_id: ItemId,
        before: Option<ItemId>,
    ) -> Result<()> {
        self.check("save_and_move")?;
        self.inner.save_and_move(item, parent_id, before).await
    }

    async fn remove(&self, id: ItemId) -> Result<bool> {
        self.check("remove")?;
        self.inner.remove(id).await
    }

    async fn save_and_remove(&self, item: &ContentItem, remove_id: ItemId) -> Result<()> {
        self.check("save_and_remove")?;
        self.inner.save_and_remove(item, remove_id).await
    }

    async fn due_for_publish(&self, now: i64) -> Result<Vec<ContentItem>> {
        self.inner.due_for_publish(now).await
    }

    async fn due_for_expiry(&self, now: i64) -> Result<Vec<ContentItem>> {
        self.inner.due_for_expiry(now).await
    }

    async fn health_check(&self) -> bool {
        true
    }
}
