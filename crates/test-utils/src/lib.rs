//! Canopy test utilities.
//!
//! Helpers for integration testing: item builders, an in-memory tree
//! fixture, principals and JSON assertion helpers.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use serde_json::Value as JsonValue;

use canopy_kernel::content::type_registry::{ROOT_TYPE, TRASH_TYPE};
use canopy_kernel::models::{ContentItem, ContentState, ItemId, NewItem, Principal};
use canopy_kernel::store::{ContentStore, MemoryStore};

/// Create a test page below `parent_id`.
pub fn test_page(parent_id: ItemId, name: &str) -> TestItem {
    TestItem::new("Page", name).below(parent_id)
}

/// Create a test part (non-page content) below `parent_id`.
pub fn test_part(parent_id: ItemId, name: &str) -> TestItem {
    TestItem::new("Part", name).below(parent_id).part()
}

/// A test item builder for creating test fixtures.
#[derive(Debug, Clone)]
pub struct TestItem {
    pub parent_id: Option<ItemId>,
    pub name: String,
    pub title: String,
    pub item_type: String,
    pub is_page: bool,
    pub state: ContentState,
    pub expires: Option<i64>,
    pub authorized_roles: Vec<String>,
    pub version_of: Option<ItemId>,
    pub fields: JsonValue,
}

impl TestItem {
    /// A detached, unpublished page whose title matches its name.
    pub fn new(item_type: &str, name: &str) -> Self {
        Self {
            parent_id: None,
            name: name.to_string(),
            title: name.to_string(),
            item_type: item_type.to_string(),
            is_page: true,
            state: ContentState::Unpublished,
            expires: None,
            authorized_roles: Vec::new(),
            version_of: None,
            fields: serde_json::json!({}),
        }
    }

    /// Place below a parent.
    pub fn below(mut self, parent_id: ItemId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Set the title.
    pub fn titled(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    /// Mark as a part rather than a page.
    pub fn part(mut self) -> Self {
        self.is_page = false;
        self
    }

    /// Set as published.
    pub fn published(mut self) -> Self {
        self.state = ContentState::Published;
        self
    }

    /// Set as published with an expiry timestamp.
    pub fn expiring_at(mut self, expires: i64) -> Self {
        self.state = ContentState::Published;
        self.expires = Some(expires);
        self
    }

    /// Restrict reading to the given roles.
    pub fn readable_by(mut self, roles: &[&str]) -> Self {
        self.authorized_roles = roles.iter().map(|r| r.to_string()).collect();
        self
    }

    /// Make this a detached draft version of `master`.
    pub fn version_of(mut self, master: ItemId) -> Self {
        self.parent_id = None;
        self.version_of = Some(master);
        self
    }

    /// Add a single field.
    pub fn with_field(mut self, name: &str, value: JsonValue) -> Self {
        if let Some(obj) = self.fields.as_object_mut() {
            obj.insert(name.to_string(), value);
        }
        self
    }

    /// Convert into store input.
    pub fn into_new_item(self) -> NewItem {
        let published = (self.state == ContentState::Published).then_some(0);
        NewItem {
            parent_id: self.parent_id,
            name: self.name,
            title: self.title,
            item_type: self.item_type,
            is_page: self.is_page,
            state: Some(self.state),
            published,
            expires: self.expires,
            authorized_roles: self.authorized_roles,
            version_of: self.version_of,
            fields: Some(self.fields),
        }
    }
}

/// An in-memory tree holding a root item and a trash container.
pub struct TreeFixture {
    pub store: Arc<MemoryStore>,
    pub root: ContentItem,
    pub trash: ContentItem,
}

impl TreeFixture {
    /// Seed a fresh store. The root gets id 1 and the trash id 2.
    pub async fn new(large_threshold: usize) -> Self {
        let store = Arc::new(MemoryStore::new(large_threshold));
        let root = store
            .insert(TestItem::new(ROOT_TYPE, "").titled("Root").published().into_new_item())
            .await
            .expect("failed to seed root");
        let trash = store
            .insert(
                TestItem::new(TRASH_TYPE, "trash")
                    .titled("Trash")
                    .below(root.id)
                    .published()
                    .into_new_item(),
            )
            .await
            .expect("failed to seed trash");

        Self { store, root, trash }
    }

    /// Insert an item.
    pub async fn add(&self, item: TestItem) -> ContentItem {
        self.store
            .insert(item.into_new_item())
            .await
            .expect("failed to insert test item")
    }

    /// Insert `count` pages named `{prefix}-{n}` below `parent_id`.
    pub async fn add_pages(&self, parent_id: ItemId, prefix: &str, count: usize) -> Vec<ContentItem> {
        let mut items = Vec::with_capacity(count);
        for n in 0..count {
            items.push(self.add(test_page(parent_id, &format!("{prefix}-{n}"))).await);
        }
        items
    }

    /// Reload an item from the store.
    pub async fn get(&self, id: ItemId) -> Option<ContentItem> {
        self.store.get(id).await.expect("store read failed")
    }

    /// Child ids of `parent_id` in sibling order.
    pub fn child_ids(&self, parent_id: ItemId) -> Vec<ItemId> {
        let mut children: Vec<ContentItem> = self
            .store
            .snapshot()
            .into_iter()
            .filter(|item| item.parent_id == Some(parent_id))
            .collect();
        children.sort_by_key(|item| (item.sort_order, item.id));
        children.into_iter().map(|item| item.id).collect()
    }
}

/// An authenticated editor.
pub fn editor() -> Principal {
    Principal::authenticated("editor", vec!["Editors".to_string()])
}

/// An authenticated administrator.
pub fn admin() -> Principal {
    Principal::authenticated("admin", vec!["Administrators".to_string()])
}

/// An authenticated principal with the given roles.
pub fn member(name: &str, roles: &[&str]) -> Principal {
    Principal::authenticated(name, roles.iter().map(|r| r.to_string()).collect())
}

/// Assertion helpers for JSON content.
pub mod assert {
    use serde_json::Value;

    /// Assert that a JSON value has a specific key.
    pub fn has_key(value: &Value, key: &str) {
        assert!(
            value.get(key).is_some(),
            "Expected JSON to have key '{key}', got: {value}"
        );
    }

    /// Ids of the `Current` nodes in a `Children` array.
    pub fn child_ids(response: &Value) -> Vec<i64> {
        response["Children"]
            .as_array()
            .map(|children| {
                children
                    .iter()
                    .filter_map(|node| node["Current"]["Id"].as_i64())
                    .collect()
            })
            .unwrap_or_default()
    }
}
