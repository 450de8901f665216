//! Content tree management.
//!
//! This module provides:
//! - Query: paging and filtering over one item's children
//! - NodeAdapter / AdapterRegistry: per-type projection and child streams
//! - ItemFilter: principal-bound visibility predicates
//! - SelectionUtility / Navigator: request target resolution
//! - IntegrityManager / TreeSorter: validated moves
//! - Persister: deletion through the trash
//! - VersionManager: publish state machine
//! - TreeService: the operations exposed over HTTP

pub mod adapter;
mod error;
pub mod filter;
pub mod integrity;
pub mod navigator;
mod params;
pub mod persister;
pub mod publishing;
mod query;
pub mod selection;
pub mod sorter;
mod tree_service;
pub mod type_registry;

pub use adapter::{AdapterRegistry, DefaultNodeAdapter, NodeAdapter};
pub use error::{TreeError, TreeResult};
pub use filter::ItemFilter;
pub use params::RequestParams;
pub use persister::TrashHandler;
pub use publishing::{StateChanger, VersionManager, parse_publish_date};
pub use query::{Interface, Query, Range};
pub use selection::SelectionUtility;
pub use tree_service::{
    ChildrenResponse, DeleteResponse, SearchResponse, TreeRequest, TreeService, TreeSettings,
};
pub use type_registry::{ContentTypeDefinition, ContentTypeRegistry};
