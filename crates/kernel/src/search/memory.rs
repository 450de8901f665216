//! Search over the in-memory store.
//!
//! Scores are term occurrence counts; title matches weigh double.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use super::{ScoredItem, SearchIndex, SearchQuery, SearchResult};
use crate::models::ContentItem;
use crate::store::MemoryStore;

/// Linear scan index over a [`MemoryStore`].
#[derive(Clone)]
pub struct MemorySearchIndex {
    store: Arc<MemoryStore>,
}

impl MemorySearchIndex {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }
}

fn score(item: &ContentItem, terms: &[String]) -> Option<f32> {
    if terms.is_empty() {
        return Some(0.0);
    }

    let title = item.title.to_lowercase();
    let name = item.name.to_lowercase();
    let mut total = 0.0;

    for term in terms {
        let hits = 2 * title.matches(term.as_str()).count() + name.matches(term.as_str()).count();
        if hits == 0 {
            return None;
        }
        total += hits as f32;
    }

    Some(total)
}

#[async_trait]
impl SearchIndex for MemorySearchIndex {
    async fn search(&self, query: &SearchQuery) -> Result<SearchResult> {
        let terms = query.terms();

        let mut matches: Vec<ScoredItem> = self
            .store
            .snapshot()
            .into_iter()
            .filter(|item| query.accepts(item))
            .filter_map(|item| score(&item, &terms).map(|score| ScoredItem { item, score }))
            .collect();

        matches.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.item.id.cmp(&b.item.id))
        });

        let total = matches.len();
        let hits = matches
            .into_iter()
            .skip(query.skip)
            .take(query.take)
            .collect();

        Ok(SearchResult { total, hits })
    }
}
