//! Content item model.
//!
//! Content items are the nodes of the managed hierarchy. Every item except
//! the root has exactly one parent; the store keeps the parent graph acyclic
//! and maintains the sibling order, the ancestral trail and the child state
//! flags. Handlers never write those structural fields directly.

use serde::{Deserialize, Serialize};

/// Stable item identifier.
pub type ItemId = i64;

/// Publication state of an item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentState {
    #[default]
    Unpublished,
    Published,
    ScheduledForPublish,
    Expired,
}

impl ContentState {
    /// Storage code for the state.
    pub fn code(self) -> i16 {
        match self {
            Self::Unpublished => 0,
            Self::Published => 1,
            Self::ScheduledForPublish => 2,
            Self::Expired => 3,
        }
    }

    /// Parse a storage code. Unknown codes are treated as unpublished.
    pub fn from_code(code: i16) -> Self {
        match code {
            1 => Self::Published,
            2 => Self::ScheduledForPublish,
            3 => Self::Expired,
            _ => Self::Unpublished,
        }
    }

    /// Whether the state machine allows moving from `self` to `next`.
    ///
    /// Staying in the same state is always allowed.
    pub fn can_transition_to(self, next: ContentState) -> bool {
        use ContentState::*;

        if self == next {
            return true;
        }

        matches!(
            (self, next),
            (Unpublished, Published)
                | (Unpublished, ScheduledForPublish)
                | (ScheduledForPublish, Published)
                | (ScheduledForPublish, Unpublished)
                | (Published, Unpublished)
                | (Published, Expired)
                | (Expired, Unpublished)
        )
    }
}

impl std::fmt::Display for ContentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Unpublished => "Unpublished",
            Self::Published => "Published",
            Self::ScheduledForPublish => "ScheduledForPublish",
            Self::Expired => "Expired",
        };
        f.write_str(name)
    }
}

/// Flag set describing an item's child collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChildState(u16);

impl ChildState {
    /// Not yet computed.
    pub const UNKNOWN: ChildState = ChildState(0);
    /// The item has no children.
    pub const IS_EMPTY: ChildState = ChildState(1);
    /// At least one child is a page.
    pub const CONTAINS_PAGES: ChildState = ChildState(2);
    /// At least one child is a part (non-page content).
    pub const CONTAINS_PARTS: ChildState = ChildState(4);
    /// The child collection exceeds the large collection threshold and must
    /// only ever be fetched with a paging window.
    pub const IS_LARGE: ChildState = ChildState(8);

    /// Build from raw bits, dropping unknown ones.
    pub fn from_bits(bits: u16) -> Self {
        Self(bits & 0b1111)
    }

    /// Raw bits.
    pub fn bits(self) -> u16 {
        self.0
    }

    /// True if any flag in `other` is set.
    pub fn is_any(self, other: ChildState) -> bool {
        self.0 & other.0 != 0
    }

    /// True if every flag in `other` is set.
    pub fn contains(self, other: ChildState) -> bool {
        self.0 & other.0 == other.0
    }

    /// Return a copy with the flags in `other` added.
    pub fn with(self, other: ChildState) -> Self {
        Self(self.0 | other.0)
    }

    pub fn is_large(self) -> bool {
        self.is_any(Self::IS_LARGE)
    }

    pub fn is_empty(self) -> bool {
        self.is_any(Self::IS_EMPTY)
    }

    /// Compute the flags for a child collection.
    pub fn compute(count: usize, any_page: bool, any_part: bool, large_threshold: usize) -> Self {
        if count == 0 {
            return Self::IS_EMPTY;
        }

        let mut state = Self::UNKNOWN;
        if any_page {
            state = state.with(Self::CONTAINS_PAGES);
        }
        if any_part {
            state = state.with(Self::CONTAINS_PARTS);
        }
        if count > large_threshold {
            state = state.with(Self::IS_LARGE);
        }
        state
    }
}

/// Where a thrown item came from, recorded when it is moved to the trash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrashInfo {
    /// Parent the item had before it was thrown.
    pub former_parent_id: Option<ItemId>,

    /// State the item had before it was thrown.
    pub former_state: ContentState,

    /// Unix timestamp of the delete request.
    pub deleted_at: i64,
}

/// Content item record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    /// Unique identifier.
    pub id: ItemId,

    /// Parent item (None for the root and for detached draft versions).
    pub parent_id: Option<ItemId>,

    /// Ids of all ancestors, root first, delimited by `/`.
    ///
    /// The root has `/`, a child of item 1 has `/1/`.
    pub ancestral_trail: String,

    /// Position among siblings (store maintained).
    pub sort_order: i32,

    /// URL segment used by path navigation.
    pub name: String,

    /// Display title.
    pub title: String,

    /// Content type tag.
    pub item_type: String,

    /// Pages are navigable; parts are embedded content.
    pub is_page: bool,

    /// Publication state.
    pub state: ContentState,

    /// Child collection flags (store maintained).
    pub child_state: ChildState,

    /// Unix timestamp of first publication.
    pub published: Option<i64>,

    /// Unix timestamp after which the item expires.
    pub expires: Option<i64>,

    /// Unix timestamp at which the scheduler should publish the item.
    pub publish_on: Option<i64>,

    /// Roles allowed to read the item. Empty means everyone.
    pub authorized_roles: Vec<String>,

    /// Master item when this item is a draft version.
    pub version_of: Option<ItemId>,

    /// Set while the item sits in the trash.
    pub trash: Option<TrashInfo>,

    /// Opaque typed content fields.
    pub fields: serde_json::Value,

    /// Unix timestamp when created.
    pub created: i64,

    /// Unix timestamp when last changed.
    pub changed: i64,
}

/// Input for inserting a new item.
#[derive(Debug, Clone, Deserialize)]
pub struct NewItem {
    pub parent_id: Option<ItemId>,
    pub name: String,
    pub title: String,
    pub item_type: String,
    pub is_page: bool,
    pub state: Option<ContentState>,
    pub published: Option<i64>,
    pub expires: Option<i64>,
    pub authorized_roles: Vec<String>,
    pub version_of: Option<ItemId>,
    pub fields: Option<serde_json::Value>,
}

impl ContentItem {
    /// The trail that this item's children carry.
    pub fn descendant_trail(&self) -> String {
        format!("{}{}/", self.ancestral_trail, self.id)
    }

    /// Check whether `ancestor` appears anywhere above this item.
    pub fn is_descendant_of(&self, ancestor: ItemId) -> bool {
        self.ancestral_trail.contains(&format!("/{ancestor}/"))
    }

    pub fn is_published(&self) -> bool {
        self.state == ContentState::Published
    }

    /// Whether this item is a draft version of another item.
    pub fn is_version(&self) -> bool {
        self.version_of.is_some()
    }

    /// Check if the item is readable by a holder of `roles`.
    pub fn is_readable_by(&self, roles: &[String]) -> bool {
        self.authorized_roles.is_empty()
            || self
                .authorized_roles
                .iter()
                .any(|allowed| roles.iter().any(|r| r.eq_ignore_ascii_case(allowed)))
    }
}
