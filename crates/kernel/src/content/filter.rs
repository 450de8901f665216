//! Item filter pipeline.
//!
//! Listings and search results pass through an [`ItemFilter`] bound to the
//! acting principal. An item is kept only if every predicate accepts it;
//! authorization in listings is filtering, never failure.

use std::sync::Arc;

use crate::models::{ContentItem, Principal};
use crate::permissions::{Authorizer, Permission};

/// A single predicate in the pipeline.
pub trait ItemPredicate: Send + Sync {
    /// Predicate name for debugging.
    fn name(&self) -> &str;

    fn matches(&self, item: &ContentItem) -> bool;
}

/// Conjunction of predicates applied in sequence.
pub struct ItemFilter {
    predicates: Vec<Box<dyn ItemPredicate>>,
}

impl ItemFilter {
    /// Create a filter that accepts everything.
    pub fn new() -> Self {
        Self {
            predicates: Vec::new(),
        }
    }

    /// Add a predicate to the pipeline.
    pub fn add<P: ItemPredicate + 'static>(mut self, predicate: P) -> Self {
        self.predicates.push(Box::new(predicate));
        self
    }

    /// The filter used by the editing surface: read access for `principal`,
    /// plus the page predicate when `only_pages` is given.
    pub fn for_editor(
        principal: &Principal,
        authorizer: Arc<dyn Authorizer>,
        only_pages: Option<bool>,
    ) -> Self {
        let filter = Self::new().add(AccessFilter::new(
            principal.clone(),
            authorizer,
            Permission::Read,
        ));

        match only_pages {
            Some(pages) => filter.add(PageFilter(pages)),
            None => filter,
        }
    }

    pub fn matches(&self, item: &ContentItem) -> bool {
        self.predicates.iter().all(|p| p.matches(item))
    }

    /// Predicate names, in order.
    pub fn names(&self) -> Vec<&str> {
        self.predicates.iter().map(|p| p.name()).collect()
    }
}

impl Default for ItemFilter {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps items the principal holds a permission on.
pub struct AccessFilter {
    principal: Principal,
    authorizer: Arc<dyn Authorizer>,
    permission: Permission,
}

impl AccessFilter {
    pub fn new(principal: Principal, authorizer: Arc<dyn Authorizer>, permission: Permission) -> Self {
        Self {
            principal,
            authorizer,
            permission,
        }
    }
}

impl ItemPredicate for AccessFilter {
    fn name(&self) -> &str {
        "access"
    }

    fn matches(&self, item: &ContentItem) -> bool {
        self.authorizer
            .is_authorized(item, &self.principal, self.permission)
    }
}

/// Keeps pages (`true`) or parts (`false`).
pub struct PageFilter(pub bool);

impl ItemPredicate for PageFilter {
    fn name(&self) -> &str {
        "page"
    }

    fn matches(&self, item: &ContentItem) -> bool {
        item.is_page == self.0
    }
}
