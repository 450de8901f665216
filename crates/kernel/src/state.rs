//! Application state shared across all handlers.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use sqlx::PgPool;
use tracing::{info, warn};

use crate::config::{Config, StoreKind};
use crate::content::type_registry::{ROOT_TYPE, TRASH_TYPE};
use crate::content::{ContentTypeRegistry, TreeService, TreeSettings};
use crate::db;
use crate::metrics::Metrics;
use crate::middleware::PrincipalDirectory;
use crate::models::{ContentState, ItemId, NewItem};
use crate::permissions::{Authorizer, RoleAuthorizer};
use crate::search::{MemorySearchIndex, PgSearchIndex, SearchIndex};
use crate::services::ScheduledPublishingService;
use crate::sites::SiteRegistry;
use crate::store::{ContentStore, MemoryStore, PgContentStore};

/// Shared application state.
///
/// Wrapped in Arc internally so Clone is cheap.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,

    /// PostgreSQL pool, absent for the memory store.
    db: Option<PgPool>,

    store: Arc<dyn ContentStore>,

    tree: TreeService,

    /// Bearer token to principal mapping.
    principals: PrincipalDirectory,

    authorizer: Arc<RoleAuthorizer>,

    content_types: ContentTypeRegistry,

    sites: SiteRegistry,

    metrics: Arc<Metrics>,

    scheduler: Arc<ScheduledPublishingService>,
}

impl AppState {
    /// Create new application state, connecting to the configured store.
    pub async fn new(config: &Config) -> Result<Self> {
        let principals = match &config.principals_file {
            Some(path) => PrincipalDirectory::load_file(path)?,
            None => {
                warn!("PRINCIPALS_FILE is not set; every request is anonymous");
                PrincipalDirectory::new()
            }
        };

        match config.store {
            StoreKind::Postgres => {
                let pool = db::create_pool(config)
                    .await
                    .context("failed to create database pool")?;
                db::run_migrations(&pool).await?;
                info!("Database migrations applied");

                let store: Arc<dyn ContentStore> = Arc::new(PgContentStore::new(
                    pool.clone(),
                    config.large_collection_threshold,
                ));
                ensure_root(store.as_ref(), config.root_item_id).await?;

                let search = Arc::new(PgSearchIndex::new(pool.clone()));
                Self::assemble(
                    config.clone(),
                    Some(pool),
                    store,
                    search,
                    principals,
                    config.trash_item_id,
                )
            }
            StoreKind::Memory => Self::in_memory(config.clone(), principals).await,
        }
    }

    /// State over a fresh in-memory store holding a root and a trash
    /// container.
    pub async fn in_memory(config: Config, principals: PrincipalDirectory) -> Result<Self> {
        let memory = Arc::new(MemoryStore::new(config.large_collection_threshold));
        let store: Arc<dyn ContentStore> = memory.clone();

        ensure_root(store.as_ref(), config.root_item_id).await?;
        let trash = store
            .insert(container(Some(config.root_item_id), "trash", "Trash", TRASH_TYPE))
            .await
            .context("failed to seed trash container")?;

        if let Some(configured) = config.trash_item_id {
            if configured != trash.id {
                warn!(
                    configured,
                    seeded = trash.id,
                    "TRASH_ITEM_ID does not match the seeded trash; using the seeded one"
                );
            }
        }

        info!(root_id = config.root_item_id, trash_id = trash.id, "Memory store seeded");

        let search = Arc::new(MemorySearchIndex::new(memory));
        Self::assemble(config, None, store, search, principals, Some(trash.id))
    }

    /// Build state over an existing store and index.
    pub fn from_parts(
        config: Config,
        store: Arc<dyn ContentStore>,
        search: Arc<dyn SearchIndex>,
        principals: PrincipalDirectory,
    ) -> Result<Self> {
        let trash_id = config.trash_item_id;
        Self::assemble(config, None, store, search, principals, trash_id)
    }

    fn assemble(
        config: Config,
        db: Option<PgPool>,
        store: Arc<dyn ContentStore>,
        search: Arc<dyn SearchIndex>,
        principals: PrincipalDirectory,
        trash_id: Option<ItemId>,
    ) -> Result<Self> {
        let content_types = ContentTypeRegistry::new();
        if let Some(path) = &config.content_types_file {
            let count = content_types.load_file(path)?;
            info!(count, path = %path.display(), "Content types loaded");
        }

        let sites = SiteRegistry::parse(config.root_item_id, &config.sites)
            .context("SITES is malformed")?;

        let authorizer = Arc::new(RoleAuthorizer::new(
            config.editor_roles.clone(),
            config.admin_roles.clone(),
        ));

        let settings = TreeSettings {
            large_threshold: config.large_collection_threshold,
            search_default_take: config.search_default_take,
            search_max_take: config.search_max_take,
            trash_id,
        };

        let tree = TreeService::new(
            Arc::clone(&store),
            search,
            Arc::clone(&authorizer) as Arc<dyn Authorizer>,
            content_types.clone(),
            sites.clone(),
            settings,
        );

        let scheduler = Arc::new(ScheduledPublishingService::new(
            Arc::clone(&store),
            tree.versions().clone(),
        ));

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                db,
                store,
                tree,
                principals,
                authorizer,
                content_types,
                sites,
                metrics: Arc::new(Metrics::new()),
                scheduler,
            }),
        })
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the database pool, if the state runs on PostgreSQL.
    pub fn db(&self) -> Option<&PgPool> {
        self.inner.db.as_ref()
    }

    pub fn store(&self) -> &Arc<dyn ContentStore> {
        &self.inner.store
    }

    pub fn tree(&self) -> &TreeService {
        &self.inner.tree
    }

    pub fn principals(&self) -> &PrincipalDirectory {
        &self.inner.principals
    }

    pub fn authorizer(&self) -> &RoleAuthorizer {
        &self.inner.authorizer
    }

    pub fn content_types(&self) -> &ContentTypeRegistry {
        &self.inner.content_types
    }

    pub fn sites(&self) -> &SiteRegistry {
        &self.inner.sites
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.inner.metrics
    }

    pub fn scheduler(&self) -> &Arc<ScheduledPublishingService> {
        &self.inner.scheduler
    }

    /// Check if the content store is reachable.
    pub async fn store_healthy(&self) -> bool {
        self.inner.store.health_check().await
    }
}

fn container(parent_id: Option<ItemId>, name: &str, title: &str, item_type: &str) -> NewItem {
    NewItem {
        parent_id,
        name: name.to_string(),
        title: title.to_string(),
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

/// Insert the root item when the store does not have it yet.
async fn ensure_root(store: &dyn ContentStore, root_id: ItemId) -> Result<()> {
    if store.get(root_id).await?.is_some() {
        return Ok(());
    }

    let root = store
        .insert(container(None, "", "Root", ROOT_TYPE))
        .await
        .context("failed to create root item")?;
    if root.id != root_id {
        bail!(
            "created root item {} but ROOT_ITEM_ID is {root_id}",
            root.id
        );
    }

    info!(root_id, "Created root item");
    Ok(())
}
