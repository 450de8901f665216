//! Node adapters.
//!
//! An adapter projects items into [`TreeNode`]s and answers child queries
//! for them. Adapters are chosen per content type through the
//! [`AdapterRegistry`]; types without a registration use the default one.

use std::pin::Pin;
use std::sync::Arc;

use anyhow::Result;
use async_stream::try_stream;
use async_trait::async_trait;
use dashmap::DashMap;
use futures_core::Stream;
use tokio_stream::StreamExt;

use super::filter::ItemFilter;
use super::query::{Interface, Query, Range};
use super::type_registry::{ContentTypeRegistry, TRASH_TYPE};
use crate::models::{ContentItem, ItemId, TreeNode};
use crate::store::{ChildFilter, ContentStore};

/// Lazy sequence of items read from the store in batches.
pub type ItemStream<'a> = Pin<Box<dyn Stream<Item = Result<ContentItem>> + Send + 'a>>;

/// Children are read from the store this many at a time.
pub const CHILD_BATCH_SIZE: usize = 25;

/// Projects items and answers child queries.
#[async_trait]
pub trait NodeAdapter: Send + Sync {
    /// Pure projection of an item.
    fn tree_node(&self, item: &ContentItem) -> TreeNode;

    /// The children selected by `query`, in sibling order.
    ///
    /// Each call opens a fresh stream.
    fn children(&self, query: Query) -> ItemStream<'_>;

    /// Whether `item` has at least one child accepted by `filter`.
    async fn has_children(&self, item: &ContentItem, filter: &ItemFilter) -> Result<bool>;
}

/// Adapter used for every type without a dedicated one.
#[derive(Clone)]
pub struct DefaultNodeAdapter {
    store: Arc<dyn ContentStore>,
    types: ContentTypeRegistry,
    batch_size: usize,
}

impl DefaultNodeAdapter {
    pub fn new(store: Arc<dyn ContentStore>, types: ContentTypeRegistry) -> Self {
        Self {
            store,
            types,
            batch_size: CHILD_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Stream `window` of the children of `parent_id` one batch at a time.
    fn scan(&self, parent_id: ItemId, filter: ChildFilter, window: Range) -> ItemStream<'static> {
        let store = Arc::clone(&self.store);
        let batch_size = self.batch_size;

        Box::pin(try_stream! {
            let end = window.end();
            let mut skip = window.skip;

            loop {
                let take = match end {
                    Some(end) => batch_size.min(end.saturating_sub(skip)),
                    None => batch_size,
                };
                if take == 0 {
                    break;
                }

                let batch = store
                    .list_children(parent_id, filter, Range::new(skip, take))
                    .await?;
                let fetched = batch.len();
                for item in batch {
                    yield item;
                }

                if fetched < take {
                    break;
                }
                skip += fetched;
            }
        })
    }
}

#[async_trait]
impl NodeAdapter for DefaultNodeAdapter {
    fn tree_node(&self, item: &ContentItem) -> TreeNode {
        TreeNode {
            id: item.id,
            title: item.title.clone(),
            name: item.name.clone(),
            type_name: item.item_type.clone(),
            state: item.state,
            trail: item.descendant_trail(),
            is_page: item.is_page,
            icon_class: self.types.resolve(&item.item_type).icon_class,
            published: item.published,
            publish_on: item.publish_on,
            url: format!("/api/content/children?id={}", item.id),
        }
    }

    fn children(&self, query: Query) -> ItemStream<'_> {
        let filter = ChildFilter {
            only_pages: query.only_pages(),
            published_only: query.interface() == Interface::Viewing,
        };
        let window = query.window().unwrap_or(Range::starting_at(0));

        self.scan(query.scope(), filter, window)
    }

    async fn has_children(&self, item: &ContentItem, filter: &ItemFilter) -> Result<bool> {
        if item.child_state.is_empty() {
            return Ok(false);
        }

        let mut children = self.scan(item.id, ChildFilter::default(), Range::starting_at(0));
        while let Some(child) = children.next().await {
            if filter.matches(&child?) {
                return Ok(true);
            }
        }

        Ok(false)
    }
}

/// Adapter for the trash container.
///
/// Thrown items keep their own type, so only the container itself is
/// projected differently.
#[derive(Clone)]
pub struct TrashNodeAdapter {
    inner: DefaultNodeAdapter,
}

impl TrashNodeAdapter {
    pub fn new(inner: DefaultNodeAdapter) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl NodeAdapter for TrashNodeAdapter {
    fn tree_node(&self, item: &ContentItem) -> TreeNode {
        let mut node = self.inner.tree_node(item);
        if !item.child_state.is_empty() {
            node.icon_class = "fa fa-trash-o".to_string();
        }
        node
    }

    fn children(&self, query: Query) -> ItemStream<'_> {
        self.inner.children(query)
    }

    async fn has_children(&self, item: &ContentItem, filter: &ItemFilter) -> Result<bool> {
        self.inner.has_children(item, filter).await
    }
}

/// Maps content type tags to adapters.
#[derive(Clone)]
pub struct AdapterRegistry {
    inner: Arc<AdapterRegistryInner>,
}

struct AdapterRegistryInner {
    adapters: DashMap<String, Arc<dyn NodeAdapter>>,
    default: Arc<dyn NodeAdapter>,
}

impl AdapterRegistry {
    /// Registry with only a default adapter.
    pub fn new(default: Arc<dyn NodeAdapter>) -> Self {
        Self {
            inner: Arc::new(AdapterRegistryInner {
                adapters: DashMap::new(),
                default,
            }),
        }
    }

    /// The bundled registry: the default adapter plus the trash adapter.
    pub fn with_defaults(store: Arc<dyn ContentStore>, types: ContentTypeRegistry) -> Self {
        let default = DefaultNodeAdapter::new(store, types);
        let registry = Self::new(Arc::new(default.clone()));
        registry.register(TRASH_TYPE, Arc::new(TrashNodeAdapter::new(default)));
        registry
    }

    pub fn register(&self, type_name: &str, adapter: Arc<dyn NodeAdapter>) {
        self.inner.adapters.insert(type_name.to_string(), adapter);
    }

    /// The adapter responsible for `item`.
    pub fn for_item(&self, item: &ContentItem) -> Arc<dyn NodeAdapter> {
        self.for_type(&item.item_type)
    }

    pub fn for_type(&self, type_name: &str) -> Arc<dyn NodeAdapter> {
        self.inner
            .adapters
            .get(type_name)
            .map(|a| Arc::clone(a.value()))
            .unwrap_or_else(|| Arc::clone(&self.inner.default))
    }
}
