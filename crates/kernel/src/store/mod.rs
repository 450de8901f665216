//! Content persistence.
//!
//! The tree management core only talks to storage through [`ContentStore`].
//! Each primitive is atomic on its own; callers validate before they call.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgContentStore;
pub(crate) use postgres::{ITEM_COLUMNS, ItemRow};

use anyhow::Result;
use async_trait::async_trait;

use crate::content::Range;
use crate::models::{ContentItem, ItemId, NewItem};

/// Store-side filter for child listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChildFilter {
    /// `Some(true)` keeps pages, `Some(false)` keeps parts.
    pub only_pages: Option<bool>,
    /// Keep only published items that were not thrown into the trash.
    pub published_only: bool,
}

impl ChildFilter {
    /// Whether an item passes this filter.
    pub fn accepts(&self, item: &ContentItem) -> bool {
        if let Some(pages) = self.only_pages {
            if item.is_page != pages {
                return false;
            }
        }
        !self.published_only || (item.is_published() && item.trash.is_none())
    }
}

/// Persistence engine contract.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Load an item by id.
    async fn get(&self, id: ItemId) -> Result<Option<ContentItem>>;

    /// Find the child of `parent_id` with the given URL segment.
    async fn find_child_by_name(&self, parent_id: ItemId, name: &str)
    -> Result<Option<ContentItem>>;

    /// List one window of a parent's children in sibling order.
    async fn list_children(
        &self,
        parent_id: ItemId,
        filter: ChildFilter,
        window: Range,
    ) -> Result<Vec<ContentItem>>;

    /// All items below `id`, at any depth.
    async fn descendants(&self, id: ItemId) -> Result<Vec<ContentItem>>;

    /// Insert a new item as the last child of its parent.
    async fn insert(&self, input: NewItem) -> Result<ContentItem>;

    /// Persist the non-structural fields of an existing item.
    async fn save(&self, item: &ContentItem) -> Result<()>;

    /// Reparent `id` under `parent_id`, immediately before the sibling
    /// `before` or at the end when `before` is `None`.
    ///
    /// Renumbers the destination sibling list, rewrites the trails of the
    /// moved subtree and re-syncs the child state of both parents in one
    /// atomic step.
    async fn move_item(&self, id: ItemId, parent_id: ItemId, before: Option<ItemId>)
    -> Result<()>;

    /// Persist the non-structural fields of `item` and move it like
    /// [`ContentStore::move_item`], as one atomic step.
    async fn save_and_move(
        &self,
        item: &ContentItem,
        parent_id: ItemId,
        before: Option<ItemId>,
    ) -> Result<()>;

    /// Permanently remove an item and its descendants.
    async fn remove(&self, id: ItemId) -> Result<bool>;

    /// Persist `item` and permanently remove `remove_id` with its
    /// descendants, as one atomic step. Fails without writing anything when
    /// `remove_id` does not exist or `item` would be removed with it.
    async fn save_and_remove(&self, item: &ContentItem, remove_id: ItemId) -> Result<()>;

    /// Items waiting for scheduled publication at or before `now`.
    async fn due_for_publish(&self, now: i64) -> Result<Vec<ContentItem>>;

    /// Published items whose expiry is at or before `now`.
    async fn due_for_expiry(&self, now: i64) -> Result<Vec<ContentItem>>;

    /// Whether the backing storage is reachable.
    async fn health_check(&self) -> bool;
}

#[cfg(test)]
pub(crate) mod testing;
