//! Applies validated moves.
//!
//! Moving a thrown item out of the trash restores it: its trash record is
//! dropped and an `Expired` item goes back to `Unpublished`, in the same
//! store step as the move.

use std::sync::Arc;

use tracing::info;

use super::error::{TreeError, TreeResult};
use super::persister::TrashHandler;
use crate::models::{ContentItem, ContentState, ItemId};
use crate::store::ContentStore;

/// Issues move primitives against the store.
#[derive(Clone)]
pub struct TreeSorter {
    store: Arc<dyn ContentStore>,
    trash: TrashHandler,
}

impl TreeSorter {
    pub fn new(store: Arc<dyn ContentStore>, trash: TrashHandler) -> Self {
        Self { store, trash }
    }

    /// Place `item` immediately before `sibling`, adopting its parent.
    pub async fn move_before(&self, item: &ContentItem, sibling: &ContentItem) -> TreeResult<()> {
        if item.id == sibling.id {
            return Ok(());
        }

        let Some(parent_id) = sibling.parent_id else {
            return Err(TreeError::integrity("Cannot move an item before the root"));
        };

        let into_trash = self.trash.is_in_trash(sibling);
        self.relocate(item, parent_id, Some(sibling.id), into_trash)
            .await?;

        info!(item_id = item.id, before = sibling.id, parent_id, "moved item before sibling");
        Ok(())
    }

    /// Append `item` to the children of `destination`.
    pub async fn move_to(&self, item: &ContentItem, destination: &ContentItem) -> TreeResult<()> {
        let into_trash = self.trash.trash_id() == Some(destination.id)
            || self.trash.is_in_trash(destination);
        self.relocate(item, destination.id, None, into_trash).await?;

        info!(item_id = item.id, parent_id = destination.id, "moved item");
        Ok(())
    }

    async fn relocate(
        &self,
        item: &ContentItem,
        parent_id: ItemId,
        before: Option<ItemId>,
        into_trash: bool,
    ) -> TreeResult<()> {
        if into_trash || item.trash.is_none() {
            self.store.move_item(item.id, parent_id, before).await?;
            return Ok(());
        }

        let mut restored = item.clone();
        restored.trash = None;
        if restored.state == ContentState::Expired {
            restored.state = ContentState::Unpublished;
        }
        self.store.save_and_move(&restored, parent_id, before).await?;

        info!(item_id = item.id, parent_id, "restored item from the trash");
        Ok(())
    }
}
