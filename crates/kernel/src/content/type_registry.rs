//! Content type registry.
//!
//! Holds the definition of every content type the tree knows about. The
//! built-in types are registered on construction; deployments add their own
//! from a TOML file at startup.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Type tag of the tree root.
pub const ROOT_TYPE: &str = "Root";
/// Type tag of site start items.
pub const START_PAGE_TYPE: &str = "StartPage";
/// Type tag of the trash container.
pub const TRASH_TYPE: &str = "Trash";

/// Definition of a content type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentTypeDefinition {
    /// Type tag stored on items.
    pub name: String,

    /// Human readable label.
    #[serde(default)]
    pub label: String,

    #[serde(default = "default_true")]
    pub is_page: bool,

    /// CSS icon class shown in tree nodes.
    #[serde(default = "default_icon")]
    pub icon_class: String,

    /// Types that may be placed below this type. `None` allows anything.
    #[serde(default)]
    pub allowed_children: Option<Vec<String>>,

    /// Whether items of this type may be deleted at all.
    #[serde(default = "default_true")]
    pub deletable: bool,

    /// Whether deleting goes through the trash.
    #[serde(default = "default_true")]
    pub throwable: bool,
}

fn default_true() -> bool {
    true
}

fn default_icon() -> String {
    "fa fa-file".to_string()
}

impl ContentTypeDefinition {
    /// Page type with default rules.
    pub fn page(name: &str) -> Self {
        Self {
            name: name.to_string(),
            label: name.to_string(),
            is_page: true,
            icon_class: default_icon(),
            allowed_children: None,
            deletable: true,
            throwable: true,
        }
    }

    /// Check whether `child_type` may be placed below this type.
    pub fn allows_child(&self, child_type: &str) -> bool {
        match &self.allowed_children {
            None => true,
            Some(allowed) => allowed.iter().any(|t| t.eq_ignore_ascii_case(child_type)),
        }
    }
}

/// File format for `CONTENT_TYPES_FILE`.
#[derive(Debug, Deserialize)]
struct ContentTypesFile {
    #[serde(default, rename = "type")]
    types: Vec<ContentTypeDefinition>,
}

/// Registry of content types.
#[derive(Clone)]
pub struct ContentTypeRegistry {
    inner: Arc<ContentTypeRegistryInner>,
}

struct ContentTypeRegistryInner {
    types: DashMap<String, ContentTypeDefinition>,
}

impl ContentTypeRegistry {
    /// Create a registry holding the built-in types.
    pub fn new() -> Self {
        let registry = Self {
            inner: Arc::new(ContentTypeRegistryInner {
                types: DashMap::new(),
            }),
        };

        registry.register(ContentTypeDefinition {
            label: "Root".to_string(),
            icon_class: "fa fa-sitemap".to_string(),
            deletable: false,
            throwable: false,
            ..ContentTypeDefinition::page(ROOT_TYPE)
        });
        registry.register(ContentTypeDefinition {
            label: "Start page".to_string(),
            icon_class: "fa fa-home".to_string(),
            ..ContentTypeDefinition::page(START_PAGE_TYPE)
        });
        registry.register(ContentTypeDefinition::page("Page"));
        registry.register(ContentTypeDefinition {
            is_page: false,
            icon_class: "fa fa-puzzle-piece".to_string(),
            allowed_children: Some(vec!["Part".to_string()]),
            ..ContentTypeDefinition::page("Part")
        });
        registry.register(ContentTypeDefinition {
            label: "Trash".to_string(),
            icon_class: "fa fa-trash".to_string(),
            deletable: false,
            throwable: false,
            ..ContentTypeDefinition::page(TRASH_TYPE)
        });

        registry
    }

    /// Add or replace a definition.
    pub fn register(&self, def: ContentTypeDefinition) {
        self.inner.types.insert(def.name.clone(), def);
    }

    /// Parse a TOML document of `[[type]]` tables and register each.
    pub fn load_toml(&self, source: &str) -> Result<usize> {
        let file: ContentTypesFile =
            toml::from_str(source).context("failed to parse content types")?;
        let count = file.types.len();

        for def in file.types {
            info!(type_name = %def.name, "registered content type");
            self.register(def);
        }

        Ok(count)
    }

    /// Load definitions from a TOML file.
    pub fn load_file(&self, path: &Path) -> Result<usize> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        self.load_toml(&source)
    }

    /// Get a content type by name.
    pub fn get(&self, type_name: &str) -> Option<ContentTypeDefinition> {
        self.inner.types.get(type_name).map(|r| r.clone())
    }

    /// Get a content type, falling back to default page rules for unknown
    /// types.
    pub fn resolve(&self, type_name: &str) -> ContentTypeDefinition {
        self.get(type_name)
            .unwrap_or_else(|| ContentTypeDefinition::page(type_name))
    }

    /// List all content types.
    pub fn list(&self) -> Vec<ContentTypeDefinition> {
        let mut types: Vec<_> = self.inner.types.iter().map(|r| r.value().clone()).collect();
        types.sort_by(|a, b| a.name.cmp(&b.name));
        types
    }
}

impl Default for ContentTypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
