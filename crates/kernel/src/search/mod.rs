//! Full-text search over the content tree.
//!
//! A [`SearchIndex`] executes a parsed [`SearchQuery`] and returns scored
//! items together with the total number of matches. The total is counted
//! before any authorization filtering, so callers may end up showing fewer
//! hits than the total suggests.

mod memory;
mod postgres;

pub use memory::MemorySearchIndex;
pub use postgres::PgSearchIndex;

use anyhow::Result;
use async_trait::async_trait;

use crate::content::{RequestParams, TreeResult};
use crate::models::{ContentItem, ItemId};

/// Prefix marking an inline type constraint in `q`.
const TYPE_TOKEN: &str = "type:";

/// A parsed search request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchQuery {
    /// Free text: alphanumeric words only, inline type tokens removed.
    pub text: String,
    /// Accepted type tags. Empty accepts all types.
    pub types: Vec<String>,
    /// Restrict to descendants of this item.
    pub below: Option<ItemId>,
    pub only_pages: Option<bool>,
    pub skip: usize,
    pub take: usize,
}

impl SearchQuery {
    /// Build a query from request parameters.
    ///
    /// `take` defaults to `default_take` and is clamped to `max_take`.
    pub fn parse(params: &RequestParams, default_take: usize, max_take: usize) -> TreeResult<Self> {
        let mut words = Vec::new();
        let mut types = Vec::new();

        for token in params.get("q").unwrap_or_default().split_whitespace() {
            match token.strip_prefix(TYPE_TOKEN) {
                Some(type_name) if !type_name.is_empty() => types.push(type_name.to_string()),
                Some(_) => {}
                None => words.extend(
                    token
                        .split(|c: char| !c.is_alphanumeric())
                        .filter(|word| !word.is_empty()),
                ),
            }
        }

        if let Some(list) = params.get("type") {
            types.extend(
                list.split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string),
            );
        }

        Ok(Self {
            text: words.join(" "),
            types,
            below: params.parse("below")?,
            only_pages: params.parse_bool("pages")?,
            skip: params.parse("skip")?.unwrap_or(0),
            take: params
                .parse("take")?
                .unwrap_or(default_take)
                .min(max_take),
        })
    }

    /// True when there is neither text nor any constraint. A `q` made only
    /// of punctuation counts as no text.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
            && self.types.is_empty()
            && self.below.is_none()
            && self.only_pages.is_none()
    }

    /// Lowercased search terms.
    pub fn terms(&self) -> Vec<String> {
        self.text
            .split_whitespace()
            .map(str::to_lowercase)
            .collect()
    }

    /// Whether `item` satisfies the non-text constraints.
    pub fn accepts(&self, item: &ContentItem) -> bool {
        if item.is_version() {
            return false;
        }
        if !self.types.is_empty() && !self.types.iter().any(|t| t.eq_ignore_ascii_case(&item.item_type)) {
            return false;
        }
        if let Some(below) = self.below {
            if !item.is_descendant_of(below) {
                return false;
            }
        }
        self.only_pages.is_none_or(|pages| item.is_page == pages)
    }
}

/// A matching item with its relevance.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredItem {
    pub item: ContentItem,
    pub score: f32,
}

/// One window of matches plus the total match count.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResult {
    pub total: usize,
    pub hits: Vec<ScoredItem>,
}

/// Full-text index contract.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    async fn search(&self, query: &SearchQuery) -> Result<SearchResult>;
}
