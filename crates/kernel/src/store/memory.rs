//! In-memory content store.
//!
//! Backs `CONTENT_STORE=memory` and the test suites. A single write guard
//! covers each primitive, which makes every primitive atomic.

use std::collections::BTreeMap;

use anyhow::{Context, Result, anyhow, ensure};
use async_trait::async_trait;
use parking_lot::RwLock;

use super::{ChildFilter, ContentStore};
use crate::content::Range;
use crate::models::{ChildState, ContentItem, ContentState, ItemId, NewItem};

/// Content store held entirely in memory.
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
    large_threshold: usize,
}

#[derive(Default)]
struct MemoryInner {
    items: BTreeMap<ItemId, ContentItem>,
    last_id: ItemId,
}

impl MemoryInner {
    /// Children of `parent_id` in sibling order.
    fn children(&self, parent_id: ItemId) -> Vec<&ContentItem> {
        let mut children: Vec<&ContentItem> = self
            .items
            .values()
            .filter(|item| item.parent_id == Some(parent_id))
            .collect();
        children.sort_by_key(|item| (item.sort_order, item.id));
        children
    }

    fn sync_child_state(&mut self, parent_id: ItemId, large_threshold: usize) {
        let children = self.children(parent_id);
        let state = ChildState::compute(
            children.len(),
            children.iter().any(|c| c.is_page),
            children.iter().any(|c| !c.is_page),
            large_threshold,
        );

        if let Some(parent) = self.items.get_mut(&parent_id) {
            parent.child_state = state;
        }
    }
    /// Whether `id` sits anywhere below `ancestor`.
    fn is_below(&self, id: ItemId, ancestor: ItemId) -> bool {
        self.items
            .get(&id)
            .is_some_and(|item| item.is_descendant_of(ancestor))
    }

    fn save(&mut self, item: &ContentItem) -> Result<()> {
        let stored = self
            .items
            .get_mut(&item.id)
            .with_context(|| format!("item {} not found", item.id))?;

        stored.name = item.name.clone();
        stored.title = item.title.clone();
        stored.state = item.state;
        stored.published = item.published;
        stored.expires = item.expires;
        stored.publish_on = item.publish_on;
        stored.authorized_roles = item.authorized_roles.clone();
        stored.version_of = item.version_of;
        stored.trash = item.trash.clone();
        stored.fields = item.fields.clone();
        stored.changed = now();

        Ok(())
    }

    /// Validates completely before the first write.
    fn move_item(
        &mut self,
        id: ItemId,
        parent_id: ItemId,
        before: Option<ItemId>,
        large_threshold: usize,
    ) -> Result<()> {
        let item = self
            .items
            .get(&id)
            .cloned()
            .ok_or_else(|| anyhow!("item {id} not found"))?;
        let parent = self
            .items
            .get(&parent_id)
            .cloned()
            .ok_or_else(|| anyhow!("parent item {parent_id} not found"))?;

        ensure!(
            parent.id != id && !parent.is_descendant_of(id),
            "cannot move item {id} below itself"
        );

        let mut siblings: Vec<ItemId> = self
            .children(parent_id)
            .iter()
            .map(|c| c.id)
            .filter(|sibling| *sibling != id)
            .collect();
        let position = match before {
            Some(before) => siblings
                .iter()
                .position(|sibling| *sibling == before)
                .ok_or_else(|| anyhow!("item {before} is not a child of {parent_id}"))?,
            None => siblings.len(),
        };
        siblings.insert(position, id);

        let old_prefix = item.descendant_trail();
        let new_trail = parent.descendant_trail();
        let new_prefix = format!("{new_trail}{id}/");

        for other in self.items.values_mut() {
            if let Some(rest) = other.ancestral_trail.strip_prefix(&old_prefix) {
                other.ancestral_trail = format!("{new_prefix}{rest}");
            }
        }

        if let Some(moved) = self.items.get_mut(&id) {
            moved.parent_id = Some(parent_id);
            moved.ancestral_trail = new_trail;
            moved.changed = now();
        }

        for (index, sibling) in siblings.iter().enumerate() {
            if let Some(s) = self.items.get_mut(sibling) {
                s.sort_order = index as i32;
            }
        }

        if let Some(old_parent) = item.parent_id {
            self.sync_child_state(old_parent, large_threshold);
        }
        self.sync_child_state(parent_id, large_threshold);

        Ok(())
    }

    fn remove(&mut self, id: ItemId, large_threshold: usize) -> bool {
        let Some(item) = self.items.remove(&id) else {
            return false;
        };

        let prefix = item.descendant_trail();
        self.items
            .retain(|_, other| !other.ancestral_trail.starts_with(&prefix));

        if let Some(parent_id) = item.parent_id {
            self.sync_child_state(parent_id, large_threshold);
        }

        true
    }
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new(large_threshold: usize) -> Self {
        Self {
            inner: RwLock::new(MemoryInner::default()),
            large_threshold,
        }
    }

    /// Copy of every stored item, in id order.
    pub fn snapshot(&self) -> Vec<ContentItem> {
        self.inner.read().items.values().cloned().collect()
    }

    /// Number of stored items.
    pub fn len(&self) -> usize {
        self.inner.read().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().items.is_empty()
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn get(&self, id: ItemId) -> Result<Option<ContentItem>> {
        Ok(self.inner.read().items.get(&id).cloned())
    }

    async fn find_child_by_name(
        &self,
        parent_id: ItemId,
        name: &str,
    ) -> Result<Option<ContentItem>> {
        let inner = self.inner.read();
        Ok(inner
            .children(parent_id)
            .into_iter()
            .find(|child| child.name.eq_ignore_ascii_case(name))
            .cloned())
    }

    async fn list_children(
        &self,
        parent_id: ItemId,
        filter: ChildFilter,
        window: Range,
    ) -> Result<Vec<ContentItem>> {
        let inner = self.inner.read();
        Ok(inner
            .children(parent_id)
            .into_iter()
            .filter(|child| filter.accepts(child))
            .skip(window.skip)
            .take(window.take.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    async fn descendants(&self, id: ItemId) -> Result<Vec<ContentItem>> {
        let inner = self.inner.read();
        let Some(item) = inner.items.get(&id) else {
            return Ok(Vec::new());
        };
        let prefix = item.descendant_trail();

        Ok(inner
            .items
            .values()
            .filter(|other| other.ancestral_trail.starts_with(&prefix))
            .cloned()
            .collect())
    }

    async fn insert(&self, input: NewItem) -> Result<ContentItem> {
        let mut inner = self.inner.write();
        let now = now();

        let (ancestral_trail, sort_order) = match input.parent_id {
            Some(parent_id) => {
                let trail = inner
                    .items
                    .get(&parent_id)
                    .map(ContentItem::descendant_trail)
                    .ok_or_else(|| anyhow!("parent item {parent_id} not found"))?;
                let next = inner
                    .children(parent_id)
                    .iter()
                    .map(|c| c.sort_order)
                    .max()
                    .map_or(0, |max| max + 1);
                (trail, next)
            }
            None => ("/".to_string(), 0),
        };

        inner.last_id += 1;
        let item = ContentItem {
            id: inner.last_id,
            parent_id: input.parent_id,
            ancestral_trail,
            sort_order,
            name: input.name,
            title: input.title,
            item_type: input.item_type,
            is_page: input.is_page,
            state: input.state.unwrap_or_default(),
            child_state: ChildState::IS_EMPTY,
            published: input.published,
            expires: input.expires,
            publish_on: None,
            authorized_roles: input.authorized_roles,
            version_of: input.version_of,
            trash: None,
            fields: input.fields.unwrap_or_else(|| serde_json::json!({})),
            created: now,
            changed: now,
        };

        inner.items.insert(item.id, item.clone());
        if let Some(parent_id) = item.parent_id {
            inner.sync_child_state(parent_id, self.large_threshold);
        }

        Ok(item)
    }

    async fn save(&self, item: &ContentItem) -> Result<()> {
        self.inner.write().save(item)
    }

    async fn move_item(
        &self,
        id: ItemId,
        parent_id: ItemId,
        before: Option<ItemId>,
    ) -> Result<()> {
        self.inner
            .write()
            .move_item(id, parent_id, before, self.large_threshold)
    }

    async fn save_and_move(
        &self,
        item: &ContentItem,
        parent_id: ItemId,
        before: Option<ItemId>,
    ) -> Result<()> {
        let mut inner = self.inner.write();
        // The move validates everything before it writes; once it is
        // through, the save cannot fail.
        inner.move_item(item.id, parent_id, before, self.large_threshold)?;
        inner.save(item)
    }

    async fn remove(&self, id: ItemId) -> Result<bool> {
        Ok(self.inner.write().remove(id, self.large_threshold))
    }

    async fn save_and_remove(&self, item: &ContentItem, remove_id: ItemId) -> Result<()> {
        let mut inner = self.inner.write();
        ensure!(inner.items.contains_key(&remove_id), "item {remove_id} not found");
        ensure!(
            item.id != remove_id && !inner.is_below(item.id, remove_id),
            "cannot remove item {remove_id} while saving item {}",
            item.id
        );
        inner.save(item)?;
        inner.remove(remove_id, self.large_threshold);
        Ok(())
    }

    async fn due_for_publish(&self, now: i64) -> Result<Vec<ContentItem>> {
        let inner = self.inner.read();
        Ok(inner
            .items
            .values()
            .filter(|item| {
                item.state == ContentState::ScheduledForPublish
                    && item.publish_on.is_some_and(|at| at <= now)
            })
            .cloned()
            .collect())
    }

    async fn due_for_expiry(&self, now: i64) -> Result<Vec<ContentItem>> {
        let inner = self.inner.read();
        Ok(inner
            .items
            .values()
            .filter(|item| item.is_published() && item.expires.is_some_and(|at| at <= now))
            .cloned()
            .collect())
    }

    async fn health_check(&self) -> bool {
        true
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("items", &self.len())
            .finish()
    }
}
