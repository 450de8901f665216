//! Transport projections of content items.
//!
//! These are built per response and never persisted.

use serde::Serialize;

use super::item::{ContentState, ItemId};

/// Read-only projection of a content item for a single response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TreeNode {
    pub id: ItemId,
    pub title: String,
    pub name: String,
    pub type_name: String,
    pub state: ContentState,
    /// Ancestral trail including the item itself (`/1/5/9/`).
    pub trail: String,
    pub is_page: bool,
    pub icon_class: String,
    pub published: Option<i64>,
    pub publish_on: Option<i64>,
    /// Management URL that selects this item.
    pub url: String,
}

/// A tree node together with its expansion metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Node<T> {
    pub current: T,
    pub children: Vec<Node<T>>,
    pub has_children: bool,
    pub expanded: bool,
}

impl<T> Node<T> {
    /// A collapsed node whose children are fetched by a later request.
    pub fn collapsed(current: T, has_children: bool) -> Self {
        Self {
            current,
            children: Vec::new(),
            has_children,
            expanded: false,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn node_serializes_pascal_case() {
        let node = Node::collapsed(
            TreeNode {
                id: 7,
                title: "About".to_string(),
                name: "about".to_string(),
                type_name: "Page".to_string(),
                state: ContentState::Published,
                trail: "/1/7/".to_string(),
                is_page: true,
                icon_class: "page".to_string(),
                published: Some(10),
                publish_on: None,
                url: "/api/content/children?id=7".to_string(),
            },
            true,
        );

        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["Current"]["Id"], 7);
        assert_eq!(json["Current"]["TypeName"], "Page");
        assert_eq!(json["Current"]["State"], "Published");
        assert_eq!(json["HasChildren"], true);
        assert_eq!(json["Expanded"], false);
        assert_eq!(json["Children"].as_array().unwrap().len(), 0);
    }
}
