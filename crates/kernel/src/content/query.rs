//! Child queries.
//!
//! A [`Query`] describes which children of one item to fetch and which
//! window of them. Queries are values: the builder methods consume and
//! return a new query.

use crate::models::{ContentItem, ItemId};

/// The surface consuming a query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Interface {
    /// Editors managing the tree: every state is visible.
    #[default]
    Managing,
    /// Public viewing: only published items outside the trash.
    Viewing,
}

/// A window `[skip, skip + take)` over an ordered sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub skip: usize,
    /// Window length; `None` is unbounded.
    pub take: Option<usize>,
}

impl Range {
    pub fn new(skip: usize, take: usize) -> Self {
        Self {
            skip,
            take: Some(take),
        }
    }

    /// Everything from `skip` on.
    pub fn starting_at(skip: usize) -> Self {
        Self { skip, take: None }
    }

    /// Exclusive end of the window, if bounded.
    pub fn end(&self) -> Option<usize> {
        self.take.map(|take| self.skip.saturating_add(take))
    }
}

/// Paging and filtering specification over one item's children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    scope: ItemId,
    interface: Interface,
    only_pages: Option<bool>,
    limit: Option<Range>,
    skip: Option<usize>,
    take: Option<usize>,
}

impl Query {
    /// Query the children of `item`.
    ///
    /// Large child collections get a `[0, large_threshold)` window so the
    /// collection is never read unpaged; explicit skip/take still compose
    /// with it.
    pub fn children_of(item: &ContentItem, large_threshold: usize) -> Self {
        let limit = item
            .child_state
            .is_large()
            .then(|| Range::new(0, large_threshold));

        Self {
            scope: item.id,
            interface: Interface::Managing,
            only_pages: None,
            limit,
            skip: None,
            take: None,
        }
    }

    pub fn with_interface(mut self, interface: Interface) -> Self {
        self.interface = interface;
        self
    }

    /// Restrict to pages (`Some(true)`), parts (`Some(false)`) or neither.
    pub fn with_only_pages(mut self, only_pages: Option<bool>) -> Self {
        self.only_pages = only_pages;
        self
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn take(mut self, take: usize) -> Self {
        self.take = Some(take);
        self
    }

    pub fn scope(&self) -> ItemId {
        self.scope
    }

    pub fn interface(&self) -> Interface {
        self.interface
    }

    pub fn only_pages(&self) -> Option<bool> {
        self.only_pages
    }

    /// The effective window: skip and take override the matching half of
    /// the limit.
    pub fn window(&self) -> Option<Range> {
        match (self.limit, self.skip, self.take) {
            (limit, None, None) => limit,
            (limit, skip, take) => Some(Range {
                skip: skip.or(limit.map(|l| l.skip)).unwrap_or(0),
                take: take.or(limit.and_then(|l| l.take)),
            }),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::models::ChildState;
    use crate::models::item::tests::sample_item;

    fn large_item() -> ContentItem {
        let mut item = sample_item(4, "/1/");
        item.child_state = ChildState::CONTAINS_PAGES.with(ChildState::IS_LARGE);
        item
    }

    #[test]
    fn small_collection_is_unpaged_by_default() {
        let query = Query::children_of(&sample_item(4, "/1/"), 100);
        assert_eq!(query.window(), None);
        assert_eq!(query.scope(), 4);
        assert_eq!(query.interface(), Interface::Managing);
    }

    #[test]
    fn large_collection_defaults_to_threshold_window() {
        let query = Query::children_of(&large_item(), 100);
        assert_eq!(query.window(), Some(Range::new(0, 100)));
    }

    #[test]
    fn skip_alone_keeps_threshold_length() {
        let query = Query::children_of(&large_item(), 100).skip(250);
        assert_eq!(query.window(), Some(Range::new(250, 100)));
    }

    #[test]
    fn take_alone_starts_at_zero() {
        let query = Query::children_of(&large_item(), 100).take(10);
        assert_eq!(query.window(), Some(Range::new(0, 10)));
    }

    #[test]
    fn explicit_window_on_small_collection() {
        let query = Query::children_of(&sample_item(4, "/1/"), 100).skip(5);
        assert_eq!(query.window(), Some(Range::starting_at(5)));
        assert_eq!(query.window().unwrap().end(), None);

        let query = Query::children_of(&sample_item(4, "/1/"), 100)
            .skip(5)
            .take(5);
        assert_eq!(query.window().unwrap().end(), Some(10));
    }

    #[test]
    fn builder_sets_filters() {
        let query = Query::children_of(&sample_item(4, "/1/"), 100)
            .with_interface(Interface::Viewing)
            .with_only_pages(Some(false));
        assert_eq!(query.interface(), Interface::Viewing);
        assert_eq!(query.only_pages(), Some(false));
    }
}
