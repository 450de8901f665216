//! Domain models.

pub mod item;
pub mod principal;
pub mod tree_node;

pub use item::{ChildState, ContentItem, ContentState, ItemId, NewItem, TrashInfo};
pub use principal::Principal;
pub use tree_node::{Node, TreeNode};
