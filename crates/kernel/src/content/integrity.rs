//! Structural rules for move and delete.
//!
//! Checks run before any mutation is issued, so a rejected request leaves
//! the tree untouched.

use std::sync::Arc;

use super::error::{TreeError, TreeResult};
use super::type_registry::{ContentTypeRegistry, ROOT_TYPE, TRASH_TYPE};
use crate::models::{ContentItem, ItemId, Principal};
use crate::permissions::{Authorizer, Permission};
use crate::sites::SiteRegistry;
use crate::store::ContentStore;

/// Validates structural mutations.
#[derive(Clone)]
pub struct IntegrityManager {
    store: Arc<dyn ContentStore>,
    types: ContentTypeRegistry,
    sites: SiteRegistry,
    authorizer: Arc<dyn Authorizer>,
    trash_id: Option<ItemId>,
}

impl IntegrityManager {
    pub fn new(
        store: Arc<dyn ContentStore>,
        types: ContentTypeRegistry,
        sites: SiteRegistry,
        authorizer: Arc<dyn Authorizer>,
        trash_id: Option<ItemId>,
    ) -> Self {
        Self {
            store,
            types,
            sites,
            authorizer,
            trash_id,
        }
    }

    /// Root, trash container and site start items can be neither moved nor
    /// deleted.
    pub fn is_protected(&self, item: &ContentItem) -> bool {
        (item.parent_id.is_none() && !item.is_version())
            || self.sites.is_start(item.id)
            || Some(item.id) == self.trash_id
            || item.item_type == ROOT_TYPE
            || item.item_type == TRASH_TYPE
    }

    /// Validate moving `item` below `destination`.
    pub fn check_move(
        &self,
        item: &ContentItem,
        destination: &ContentItem,
        principal: &Principal,
    ) -> TreeResult<()> {
        if self.is_protected(item) {
            return Err(TreeError::integrity(format!(
                "Cannot move protected item {}",
                item.id
            )));
        }

        if destination.id == item.id || destination.is_descendant_of(item.id) {
            return Err(TreeError::integrity("Cannot move an item below itself"));
        }

        if !self
            .authorizer
            .is_authorized(destination, principal, Permission::Write)
        {
            return Err(TreeError::Forbidden(format!(
                "{} may not write to item {}",
                principal.name, destination.id
            )));
        }

        let destination_type = self.types.resolve(&destination.item_type);
        if !destination_type.allows_child(&item.item_type) {
            return Err(TreeError::integrity(format!(
                "{} is not allowed below {}",
                item.item_type, destination_type.name
            )));
        }

        Ok(())
    }

    /// Validate deleting `item` together with its subtree.
    pub async fn check_delete(&self, item: &ContentItem) -> TreeResult<()> {
        if let Some(reason) = self.delete_exception(item) {
            return Err(TreeError::Integrity(reason));
        }

        for descendant in self.store.descendants(item.id).await? {
            if let Some(reason) = self.delete_exception(&descendant) {
                return Err(TreeError::Integrity(format!(
                    "Cannot delete item {}: {reason}",
                    item.id
                )));
            }
        }

        Ok(())
    }

    fn delete_exception(&self, item: &ContentItem) -> Option<String> {
        if self.is_protected(item) {
            return Some(format!("item {} is protected", item.id));
        }

        if !self.types.resolve(&item.item_type).deletable {
            return Some(format!(
                "items of type {} cannot be deleted",
                item.item_type
            ));
        }

        None
    }
}
