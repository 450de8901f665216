//! Path navigation.

use std::sync::Arc;

use anyhow::Result;

use crate::models::ContentItem;
use crate::store::ContentStore;

/// Walks `/a/b/c` style paths by child name.
#[derive(Clone)]
pub struct Navigator {
    store: Arc<dyn ContentStore>,
}

impl Navigator {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    /// Follow `path` from `start`, one segment per level.
    ///
    /// Empty segments are ignored, so `/` and `` resolve to `start`. Returns
    /// `None` as soon as a segment has no matching child.
    pub async fn navigate(&self, start: ContentItem, path: &str) -> Result<Option<ContentItem>> {
        let mut current = start;

        for segment in path.split('/').filter(|s| !s.is_empty()) {
            match self.store.find_child_by_name(current.id, segment).await? {
                Some(child) => current = child,
                None => return Ok(None),
            }
        }

        Ok(Some(current))
    }
}
