//! Tree management operations.
//!
//! [`TreeService`] ties selection, adapters, filters, integrity checks and
//! the state machine together. Every operation validates completely before
//! it issues its first mutation.

use std::sync::Arc;

use serde::Serialize;
use tokio_stream::StreamExt;
use tracing::debug;

use super::adapter::AdapterRegistry;
use super::error::{TreeError, TreeResult};
use super::filter::ItemFilter;
use super::integrity::IntegrityManager;
use super::params::RequestParams;
use super::persister::{Persister, TrashHandler};
use super::publishing::{VersionManager, parse_publish_date};
use super::query::{Interface, Query};
use super::selection::SelectionUtility;
use super::sorter::TreeSorter;
use super::type_registry::ContentTypeRegistry;
use crate::models::{ContentItem, ItemId, Node, Principal, TreeNode};
use crate::permissions::{Authorizer, Permission};
use crate::search::{SearchIndex, SearchQuery};
use crate::sites::SiteRegistry;
use crate::store::ContentStore;

/// Tunables for the tree operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeSettings {
    /// Child collections above this size are only read in pages.
    pub large_threshold: usize,
    pub search_default_take: usize,
    pub search_max_take: usize,
    /// Trash container, if deletes should be recoverable.
    pub trash_id: Option<ItemId>,
}

impl Default for TreeSettings {
    fn default() -> Self {
        Self {
            large_threshold: 100,
            search_default_take: 10,
            search_max_take: 100,
            trash_id: None,
        }
    }
}

/// Everything an operation needs to know about the request.
#[derive(Debug, Clone, Default)]
pub struct TreeRequest {
    pub params: RequestParams,
    pub host: Option<String>,
    pub principal: Principal,
}

impl TreeRequest {
    pub fn new(params: RequestParams, principal: Principal) -> Self {
        Self {
            params,
            host: None,
            principal,
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChildrenResponse {
    pub children: Vec<Node<TreeNode>>,
    pub is_paged: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SearchResponse {
    /// Matches before authorization filtering.
    pub total: usize,
    pub hits: Vec<TreeNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteResponse {
    pub removed_permanently: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<TreeNode>,
}

impl DeleteResponse {
    /// Build the response from what the store still holds after a delete.
    /// An item the store no longer returns was removed permanently, whatever
    /// the delete path reported.
    pub fn after_delete(current: Option<TreeNode>) -> Self {
        Self {
            removed_permanently: current.is_none(),
            current,
        }
    }
}

/// The tree management API.
#[derive(Clone)]
pub struct TreeService {
    inner: Arc<TreeServiceInner>,
}

struct TreeServiceInner {
    store: Arc<dyn ContentStore>,
    search: Arc<dyn SearchIndex>,
    authorizer: Arc<dyn Authorizer>,
    adapters: AdapterRegistry,
    selection: SelectionUtility,
    integrity: IntegrityManager,
    sorter: TreeSorter,
    persister: Persister,
    versions: VersionManager,
    settings: TreeSettings,
}

impl TreeService {
    pub fn new(
        store: Arc<dyn ContentStore>,
        search: Arc<dyn SearchIndex>,
        authorizer: Arc<dyn Authorizer>,
        types: ContentTypeRegistry,
        sites: SiteRegistry,
        settings: TreeSettings,
    ) -> Self {
        let trash = TrashHandler::new(settings.trash_id);

        Self {
            inner: Arc::new(TreeServiceInner {
                adapters: AdapterRegistry::with_defaults(Arc::clone(&store), types.clone()),
                selection: SelectionUtility::new(Arc::clone(&store), sites.clone()),
                integrity: IntegrityManager::new(
                    Arc::clone(&store),
                    types.clone(),
                    sites,
                    Arc::clone(&authorizer),
                    settings.trash_id,
                ),
                sorter: TreeSorter::new(Arc::clone(&store), trash),
                persister: Persister::new(Arc::clone(&store), types, trash),
                versions: VersionManager::new(Arc::clone(&store), trash),
                store,
                search,
                authorizer,
                settings,
            }),
        }
    }

    pub fn adapters(&self) -> &AdapterRegistry {
        &self.inner.adapters
    }

    pub fn versions(&self) -> &VersionManager {
        &self.inner.versions
    }

    pub fn settings(&self) -> TreeSettings {
        self.inner.settings
    }

    /// List the children of the selected item.
    pub async fn children(&self, request: &TreeRequest) -> TreeResult<ChildrenResponse> {
        let target = self.select(request).await?;
        let params = &request.params;

        let only_pages = params.parse_bool("pages")?;
        let mut query = Query::children_of(&target, self.inner.settings.large_threshold)
            .with_interface(Interface::Managing)
            .with_only_pages(only_pages);
        if let Some(skip) = params.parse("skip")? {
            query = query.skip(skip);
        }
        if let Some(take) = params.parse("take")? {
            query = query.take(take);
        }

        let filter = ItemFilter::for_editor(
            &request.principal,
            Arc::clone(&self.inner.authorizer),
            only_pages,
        );

        let adapter = self.inner.adapters.for_item(&target);
        let mut stream = adapter.children(query);
        let mut children = Vec::new();

        while let Some(child) = stream.next().await {
            let child = child?;
            if !filter.matches(&child) {
                continue;
            }

            let child_adapter = self.inner.adapters.for_item(&child);
            let has_children = child_adapter.has_children(&child, &filter).await?;
            children.push(Node::collapsed(child_adapter.tree_node(&child), has_children));
        }

        debug!(item_id = target.id, count = children.len(), "listed children");

        Ok(ChildrenResponse {
            children,
            is_paged: target.child_state.is_large(),
        })
    }

    /// Full-text search, filtered by read access.
    pub async fn search(&self, request: &TreeRequest) -> TreeResult<SearchResponse> {
        let settings = &self.inner.settings;
        let query = SearchQuery::parse(
            &request.params,
            settings.search_default_take,
            settings.search_max_take,
        )?;

        if query.is_empty() {
            return Ok(SearchResponse {
                total: 0,
                hits: Vec::new(),
            });
        }

        let result = self.inner.search.search(&query).await?;
        let filter = ItemFilter::for_editor(
            &request.principal,
            Arc::clone(&self.inner.authorizer),
            None,
        );

        let hits = result
            .hits
            .into_iter()
            .map(|scored| scored.item)
            .filter(|item| filter.matches(item))
            .map(|item| self.project(&item))
            .collect();

        Ok(SearchResponse {
            total: result.total,
            hits,
        })
    }

    /// Move the selected item before a sibling (`before`) or below a new
    /// parent (`to`).
    pub async fn move_item(&self, request: &TreeRequest) -> TreeResult<()> {
        self.require_editor(&request.principal)?;
        let item = self.select(request).await?;
        let selection = &self.inner.selection;

        if let Some(before) = selection
            .resolve_reference(&request.params, "before", request.host())
            .await?
        {
            let before = before.ok_or_else(|| {
                TreeError::NotFound("the item to move before does not exist".to_string())
            })?;
            if before.id == item.id {
                return Ok(());
            }

            let Some(parent_id) = before.parent_id else {
                return Err(TreeError::integrity("Cannot move an item before the root"));
            };
            let parent = self
                .inner
                .store
                .get(parent_id)
                .await?
                .ok_or_else(|| TreeError::NotFound(format!("item {parent_id}")))?;

            self.inner
                .integrity
                .check_move(&item, &parent, &request.principal)?;
            return self.inner.sorter.move_before(&item, &before).await;
        }

        if let Some(to) = selection
            .resolve_reference(&request.params, "to", request.host())
            .await?
        {
            let to = to.ok_or_else(|| TreeError::integrity("null target"))?;

            self.inner
                .integrity
                .check_move(&item, &to, &request.principal)?;
            return self.inner.sorter.move_to(&item, &to).await;
        }

        Err(TreeError::validation("either 'before' or 'to' is required"))
    }

    /// Delete the selected item, through the trash when possible.
    pub async fn delete(&self, request: &TreeRequest) -> TreeResult<DeleteResponse> {
        self.require_editor(&request.principal)?;
        let item = self.select(request).await?;
        self.require(&item, &request.principal, Permission::Write)?;

        self.inner.integrity.check_delete(&item).await?;
        let outcome = self.inner.persister.delete(&item).await?;

        let current = self.inner.store.get(item.id).await?;
        debug!(item_id = item.id, ?outcome, present = current.is_some(), "deleted item");

        Ok(DeleteResponse::after_delete(
            current.map(|current| self.project(&current)),
        ))
    }

    pub async fn publish(&self, request: &TreeRequest) -> TreeResult<ContentItem> {
        let item = self.select_for_publishing(request).await?;
        self.inner.versions.publish(&item).await
    }

    pub async fn unpublish(&self, request: &TreeRequest) -> TreeResult<ContentItem> {
        let item = self.select_for_publishing(request).await?;
        self.inner.versions.unpublish(&item).await
    }

    /// Schedule the selected item for publishing at `publishDate`.
    pub async fn schedule(&self, request: &TreeRequest) -> TreeResult<ContentItem> {
        let item = self.select_for_publishing(request).await?;
        let raw = request
            .params
            .get("publishDate")
            .ok_or_else(|| TreeError::validation("'publishDate' is required"))?;
        let publish_on = parse_publish_date(raw)?;

        self.inner.versions.schedule(&item, publish_on).await
    }

    async fn select(&self, request: &TreeRequest) -> TreeResult<ContentItem> {
        self.inner
            .selection
            .resolve(&request.params, request.host())
            .await
    }

    async fn select_for_publishing(&self, request: &TreeRequest) -> TreeResult<ContentItem> {
        self.require_editor(&request.principal)?;
        let item = self.select(request).await?;
        self.require(&item, &request.principal, Permission::Publish)?;
        Ok(item)
    }

    fn project(&self, item: &ContentItem) -> TreeNode {
        self.inner.adapters.for_item(item).tree_node(item)
    }

    fn require_editor(&self, principal: &Principal) -> TreeResult<()> {
        if self.inner.authorizer.is_editor(principal) {
            Ok(())
        } else {
            Err(TreeError::Forbidden(format!(
                "{} may not edit content",
                principal.name
            )))
        }
    }

    fn require(&self, item: &ContentItem, principal: &Principal, permission: Permission) -> TreeResult<()> {
        if self.inner.authorizer.is_authorized(item, principal, permission) {
            Ok(())
        } else {
            Err(TreeError::Forbidden(format!(
                "{} lacks {} permission on item {}",
                principal.name,
                permission.as_str(),
                item.id
            )))
        }
    }
}
