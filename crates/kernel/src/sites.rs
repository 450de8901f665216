//! Site registry.
//!
//! Maps request host names to the start item of their site. Requests for
//! unknown hosts use the root item.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use dashmap::DashMap;

use crate::models::ItemId;

/// Host name to start item mapping.
#[derive(Clone)]
pub struct SiteRegistry {
    inner: Arc<SiteRegistryInner>,
}

struct SiteRegistryInner {
    root_id: ItemId,
    hosts: DashMap<String, ItemId>,
}

impl SiteRegistry {
    pub fn new(root_id: ItemId) -> Self {
        Self {
            inner: Arc::new(SiteRegistryInner {
                root_id,
                hosts: DashMap::new(),
            }),
        }
    }

    /// Parse `host=id,host=id`.
    pub fn parse(root_id: ItemId, entries: &str) -> Result<Self> {
        let registry = Self::new(root_id);

        for entry in entries.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let Some((host, id)) = entry.split_once('=') else {
                bail!("site entry '{entry}' is not host=id");
            };
            let id: ItemId = id
                .trim()
                .parse()
                .with_context(|| format!("site entry '{entry}' has an invalid item id"))?;
            registry.add(host.trim(), id);
        }

        Ok(registry)
    }

    pub fn add(&self, host: &str, start_id: ItemId) {
        self.inner.hosts.insert(normalize_host(host), start_id);
    }

    pub fn root_id(&self) -> ItemId {
        self.inner.root_id
    }

    /// Start item for a request host (port ignored, case-insensitive).
    pub fn start_for_host(&self, host: Option<&str>) -> ItemId {
        host.and_then(|h| self.inner.hosts.get(&normalize_host(h)).map(|id| *id))
            .unwrap_or(self.inner.root_id)
    }

    /// Whether `id` is the root or any site's start item.
    pub fn is_start(&self, id: ItemId) -> bool {
        id == self.inner.root_id || self.inner.hosts.iter().any(|e| *e.value() == id)
    }
}

fn normalize_host(host: &str) -> String {
    let host = host.trim();
    let host = match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    };
    host.to_ascii_lowercase()
}
