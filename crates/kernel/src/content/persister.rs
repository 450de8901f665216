//! Deletion through the trash.
//!
//! With a trash container configured, deleting an item first throws it
//! into the trash where it can be recovered. Deleting an item that is
//! already in the trash, or one whose type is not throwable, removes it and
//! its subtree for good.

use std::sync::Arc;

use tracing::info;

use super::error::{TreeError, TreeResult};
use super::type_registry::ContentTypeRegistry;
use crate::models::{ContentItem, ContentState, ItemId, TrashInfo};
use crate::store::ContentStore;

/// What a delete request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Thrown,
    Removed,
}

/// Knows where the trash is and what lives in it.
#[derive(Debug, Clone, Copy)]
pub struct TrashHandler {
    trash_id: Option<ItemId>,
}

impl TrashHandler {
    pub fn new(trash_id: Option<ItemId>) -> Self {
        Self { trash_id }
    }

    pub fn trash_id(&self) -> Option<ItemId> {
        self.trash_id
    }

    /// Whether `item` sits anywhere inside the trash container.
    pub fn is_in_trash(&self, item: &ContentItem) -> bool {
        if item.trash.is_some() {
            return true;
        }
        self.trash_id
            .is_some_and(|trash_id| item.parent_id == Some(trash_id) || item.is_descendant_of(trash_id))
    }
}

/// Deletes items, through the trash when possible.
#[derive(Clone)]
pub struct Persister {
    store: Arc<dyn ContentStore>,
    types: ContentTypeRegistry,
    trash: TrashHandler,
}

impl Persister {
    pub fn new(store: Arc<dyn ContentStore>, types: ContentTypeRegistry, trash: TrashHandler) -> Self {
        Self { store, types, trash }
    }

    pub async fn delete(&self, item: &ContentItem) -> TreeResult<DeleteOutcome> {
        match self.trash.trash_id() {
            Some(trash_id)
                if !self.trash.is_in_trash(item)
                    && item.id != trash_id
                    && self.types.resolve(&item.item_type).throwable =>
            {
                self.throw(item, trash_id).await?;
                Ok(DeleteOutcome::Thrown)
            }
            _ => {
                if !self.store.remove(item.id).await? {
                    return Err(TreeError::NotFound(format!("item {}", item.id)));
                }
                info!(item_id = item.id, "permanently removed item");
                Ok(DeleteOutcome::Removed)
            }
        }
    }

    /// Record where the item came from and move it under the trash in one
    /// store step.
    async fn throw(&self, item: &ContentItem, trash_id: ItemId) -> TreeResult<()> {
        let mut thrown = item.clone();
        thrown.trash = Some(TrashInfo {
            former_parent_id: item.parent_id,
            former_state: item.state,
            deleted_at: chrono::Utc::now().timestamp(),
        });
        thrown.state = ContentState::Expired;
        self.store.save_and_move(&thrown, trash_id, None).await?;

        info!(item_id = item.id, trash_id, "threw item into the trash");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::content::type_registry::{ContentTypeDefinition, TRASH_TYPE};
    use crate::models::NewItem;
    use crate::store::MemoryStore;
    use crate::store::testing::FailingStore;

    fn new_item(parent_id: Option<i64>, name: &str, item_type: &str) -> NewItem {
        NewItem {
            parent_id,
            name: name.to_string(),
            title: name.to_string(),
            item_type: item_type.to_string(),
            is_page: true,
            state: Some(ContentState::Published),
            published: None,
            expires: None,
            authorized_roles: Vec::new(),
            version_of: None,
            fields: None,
        }
    }

    async fn setup(with_trash: bool) -> (Arc<MemoryStore>, Persister, ContentItem, ContentItem) {
        let store = Arc::new(MemoryStore::new(100));
        let root = store.insert(new_item(None, "root", "Root")).await.unwrap();
        let trash = store
            .insert(new_item(Some(root.id), "trash", TRASH_TYPE))
            .await
            .unwrap();
        let page = store.insert(new_item(Some(root.id), "page", "Page")).await.unwrap();

        let types = ContentTypeRegistry::new();
        let handler = TrashHandler::new(with_trash.then_some(trash.id));
        let persister = Persister::new(store.clone(), types, handler);
        (store, persister, trash, page)
    }

    #[tokio::test]
    async fn first_delete_throws_second_removes() {
        let (store, persister, trash, page) = setup(true).await;

        assert_eq!(persister.delete(&page).await.unwrap(), DeleteOutcome::Thrown);
        let thrown = store.get(page.id).await.unwrap().unwrap();
        assert_eq!(thrown.parent_id, Some(trash.id));
        assert_eq!(thrown.state, ContentState::Expired);
        let info = thrown.trash.clone().unwrap();
        assert_eq!(info.former_parent_id, page.parent_id);
        assert_eq!(info.former_state, ContentState::Published);

        assert_eq!(persister.delete(&thrown).await.unwrap(), DeleteOutcome::Removed);
        assert!(store.get(page.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn without_trash_delete_is_permanent() {
        let (store, persister, _, page) = setup(false).await;
        assert_eq!(persister.delete(&page).await.unwrap(), DeleteOutcome::Removed);
        assert!(store.get(page.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn non_throwable_types_are_removed() {
        let store = Arc::new(MemoryStore::new(100));
        let root = store.insert(new_item(None, "root", "Root")).await.unwrap();
        let trash = store
            .insert(new_item(Some(root.id), "trash", TRASH_TYPE))
            .await
            .unwrap();
        let item = store.insert(new_item(Some(root.id), "tmp", "Scratch")).await.unwrap();

        let types = ContentTypeRegistry::new();
        types.register(ContentTypeDefinition {
            throwable: false,
            ..ContentTypeDefinition::page("Scratch")
        });
        let persister = Persister::new(store.clone(), types, TrashHandler::new(Some(trash.id)));

        assert_eq!(persister.delete(&item).await.unwrap(), DeleteOutcome::Removed);
    }

    #[tokio::test]
    async fn failed_throw_leaves_item_untouched() {
        let (store, _, trash, page) = setup(true).await;
        let failing = Arc::new(FailingStore::new(store.clone(), &["save_and_move"]));
        let persister = Persister::new(
            failing,
            ContentTypeRegistry::new(),
            TrashHandler::new(Some(trash.id)),
        );

        let err = persister.delete(&page).await.unwrap_err();
        assert_eq!(err.kind(), "store");

        let stored = store.get(page.id).await.unwrap().unwrap();
        assert_eq!(stored, page);
        assert!(store.get(trash.id).await.unwrap().unwrap().child_state.is_empty());
    }

    #[tokio::test]
    async fn throw_does_not_depend_on_plain_saves() {
        let (store, _, trash, page) = setup(true).await;
        let failing = Arc::new(FailingStore::new(store.clone(), &["save", "move_item"]));
        let persister = Persister::new(
            failing,
            ContentTypeRegistry::new(),
            TrashHandler::new(Some(trash.id)),
        );

        assert_eq!(persister.delete(&page).await.unwrap(), DeleteOutcome::Thrown);
        let thrown = store.get(page.id).await.unwrap().unwrap();
        assert_eq!(thrown.parent_id, Some(trash.id));
        assert_eq!(thrown.state, ContentState::Expired);
        assert!(thrown.trash.is_some());
    }

    #[test]
    fn trash_membership() {
        let handler = TrashHandler::new(Some(2));
        let mut item = crate::models::item::tests::sample_item(9, "/1/2/");
        assert!(handler.is_in_trash(&item));

        item = crate::models::item::tests::sample_item(9, "/1/3/");
        assert!(!handler.is_in_trash(&item));
        assert!(!TrashHandler::new(None).is_in_trash(&item));
    }
}
