//! Configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result, bail};

use crate::models::ItemId;

/// Which content store backs the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Postgres,
    /// In-process store seeded with a root and a trash container.
    Memory,
}

impl FromStr for StoreKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => bail!("unknown content store '{other}'"),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port (default: 3000).
    pub port: u16,

    /// Content store backend (`CONTENT_STORE`, default: postgres; `Default` uses memory).
    pub store: StoreKind,

    /// PostgreSQL connection URL. Required for the postgres store.
    pub database_url: Option<String>,

    /// Maximum database connections in pool (default: 10).
    pub database_max_connections: u32,

    /// CORS allowed origins (comma-separated, default: "*").
    pub cors_allowed_origins: Vec<String>,

    /// Child collections above this size are paged (default: 100).
    pub large_collection_threshold: usize,

    /// Search page size when `take` is absent (default: 10).
    pub search_default_take: usize,

    /// Upper bound for search `take` (default: 100).
    pub search_max_take: usize,

    /// Root item id (default: 1).
    pub root_item_id: ItemId,

    /// Trash container id. Deletes are permanent when unset.
    pub trash_item_id: Option<ItemId>,

    /// Host to start item mapping, `host=id,...`.
    pub sites: String,

    /// TOML file mapping bearer tokens to principals.
    pub principals_file: Option<PathBuf>,

    /// TOML file with additional content types.
    pub content_types_file: Option<PathBuf>,

    /// Roles that may edit content (default: Editors,Administrators).
    pub editor_roles: Vec<String>,

    /// Roles with every permission (default: Administrators).
    pub admin_roles: Vec<String>,

    /// Seconds between scheduler passes; 0 disables the scheduler
    /// (default: 60).
    pub scheduler_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            store: StoreKind::Memory,
            database_url: None,
            database_max_connections: 10,
            cors_allowed_origins: vec!["*".to_string()],
            large_collection_threshold: 100,
            search_default_take: 10,
            search_max_take: 100,
            root_item_id: 1,
            trash_item_id: None,
            sites: String::new(),
            principals_file: None,
            content_types_file: None,
            editor_roles: vec!["Editors".to_string(), "Administrators".to_string()],
            admin_roles: vec!["Administrators".to_string()],
            scheduler_interval_secs: 60,
        }
    }
}

fn list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parsed<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .with_context(|| format!("{name} has an invalid value")),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let port = parsed("PORT", defaults.port).context("PORT must be a valid u16")?;

        let store = env::var("CONTENT_STORE")
            .unwrap_or_else(|_| "postgres".to_string())
            .parse()
            .context("CONTENT_STORE must be 'postgres' or 'memory'")?;

        let database_url = env::var("DATABASE_URL").ok();
        if store == StoreKind::Postgres && database_url.is_none() {
            bail!("DATABASE_URL environment variable is required for the postgres store");
        }

        let database_max_connections =
            parsed("DATABASE_MAX_CONNECTIONS", defaults.database_max_connections)?;

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .map(|v| list(&v))
            .unwrap_or(defaults.cors_allowed_origins);

        let large_collection_threshold =
            parsed("LARGE_COLLECTION_THRESHOLD", defaults.large_collection_threshold)?;
        let search_default_take = parsed("SEARCH_DEFAULT_TAKE", defaults.search_default_take)?;
        let search_max_take = parsed("SEARCH_MAX_TAKE", defaults.search_max_take)?;

        let root_item_id = parsed("ROOT_ITEM_ID", defaults.root_item_id)?;
        let trash_item_id = match env::var("TRASH_ITEM_ID") {
            Ok(v) if !v.trim().is_empty() => Some(
                v.trim()
                    .parse()
                    .context("TRASH_ITEM_ID must be an item id")?,
            ),
            _ => None,
        };

        let sites = env::var("SITES").unwrap_or_default();
        let principals_file = env::var("PRINCIPALS_FILE").ok().map(PathBuf::from);
        let content_types_file = env::var("CONTENT_TYPES_FILE").ok().map(PathBuf::from);

        let editor_roles = env::var("EDITOR_ROLES")
            .map(|v| list(&v))
            .unwrap_or(defaults.editor_roles);
        let admin_roles = env::var("ADMIN_ROLES")
            .map(|v| list(&v))
            .unwrap_or(defaults.admin_roles);

        let scheduler_interval_secs =
            parsed("SCHEDULER_INTERVAL_SECS", defaults.scheduler_interval_secs)?;

        Ok(Self {
            port,
            store,
            database_url,
            database_max_connections,
            cors_allowed_origins,
            large_collection_threshold,
            search_default_take,
            search_max_take,
            root_item_id,
            trash_item_id,
            sites,
            principals_file,
            content_types_file,
            editor_roles,
            admin_roles,
            scheduler_interval_secs,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn store_kind_parses() {
        assert_eq!("Postgres".parse::<StoreKind>().unwrap(), StoreKind::Postgres);
        assert_eq!(" memory ".parse::<StoreKind>().unwrap(), StoreKind::Memory);
        assert!("sqlite".parse::<StoreKind>().is_err());
    }

    #[test]
    fn list_splits_and_trims() {
        assert_eq!(list("Editors, Admins,,"), vec!["Editors", "Admins"]);
        assert!(list("").is_empty());
    }

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.large_collection_threshold, 100);
        assert_eq!(config.search_default_take, 10);
        assert_eq!(config.trash_item_id, None);
    }
}
