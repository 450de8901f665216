//! Request target resolution.
//!
//! Every operation acts on the item a request selects. Selection is
//! explicit: a request that selects nothing fails instead of falling back
//! to the root.

use std::sync::Arc;

use super::error::{TreeError, TreeResult};
use super::navigator::Navigator;
use super::params::RequestParams;
use crate::models::{ContentItem, ItemId};
use crate::sites::SiteRegistry;
use crate::store::ContentStore;

/// Resolves selections and item references.
#[derive(Clone)]
pub struct SelectionUtility {
    store: Arc<dyn ContentStore>,
    navigator: Navigator,
    sites: SiteRegistry,
}

/// A parsed item reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemRef {
    Id(ItemId),
    Path(String),
}

impl ItemRef {
    /// Values starting with `/` are paths, anything else must be an id.
    pub fn parse(key: &str, raw: &str) -> TreeResult<Self> {
        if raw.starts_with('/') {
            return Ok(Self::Path(raw.to_string()));
        }

        raw.parse()
            .map(Self::Id)
            .map_err(|_| TreeError::validation(format!("'{key}' has invalid value '{raw}'")))
    }
}

impl SelectionUtility {
    pub fn new(store: Arc<dyn ContentStore>, sites: SiteRegistry) -> Self {
        Self {
            navigator: Navigator::new(Arc::clone(&store)),
            store,
            sites,
        }
    }

    pub fn sites(&self) -> &SiteRegistry {
        &self.sites
    }

    /// Resolve the selected item: `id` first, then the `selected` reference.
    pub async fn resolve(&self, params: &RequestParams, host: Option<&str>) -> TreeResult<ContentItem> {
        if let Some(id) = params.parse::<ItemId>("id")? {
            return self
                .store
                .get(id)
                .await?
                .ok_or_else(|| TreeError::Resolution(format!("item {id} does not exist")));
        }

        if let Some(raw) = params.get("selected") {
            let reference = ItemRef::parse("selected", raw)?;
            return self
                .lookup(&reference, host)
                .await?
                .ok_or_else(|| TreeError::Resolution(format!("'{raw}' does not resolve")));
        }

        Err(TreeError::Resolution(
            "no id or selected parameter".to_string(),
        ))
    }

    /// Resolve an optional reference parameter such as `before` or `to`.
    ///
    /// `Ok(None)` means the parameter was absent; a present reference that
    /// does not resolve is `Ok(Some(None))`.
    pub async fn resolve_reference(
        &self,
        params: &RequestParams,
        key: &str,
        host: Option<&str>,
    ) -> TreeResult<Option<Option<ContentItem>>> {
        let Some(raw) = params.get(key) else {
            return Ok(None);
        };
        let reference = ItemRef::parse(key, raw)?;
        Ok(Some(self.lookup(&reference, host).await?))
    }

    async fn lookup(&self, reference: &ItemRef, host: Option<&str>) -> TreeResult<Option<ContentItem>> {
        match reference {
            ItemRef::Id(id) => Ok(self.store.get(*id).await?),
            ItemRef::Path(path) => {
                let start_id = self.sites.start_for_host(host);
                let Some(start) = self.store.get(start_id).await? else {
                    return Ok(None);
                };
                Ok(self.navigator.navigate(start, path).await?)
            }
        }
    }
}
