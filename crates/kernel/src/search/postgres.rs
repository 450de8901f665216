//! PostgreSQL full-text search.
//!
//! Uses the generated `search_vector` column with its GIN index and ranks
//! with `ts_rank`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;

use super::{ScoredItem, SearchIndex, SearchQuery, SearchResult};
use crate::models::ContentItem;
use crate::store::{ITEM_COLUMNS, ItemRow};

/// Shared WHERE clause for count and page queries.
const SEARCH_FILTER: &str = "version_of IS NULL \
     AND ($1 = '' OR search_vector @@ to_tsquery('simple', $1)) \
     AND (cardinality($2::text[]) = 0 OR lower(item_type) = ANY($2)) \
     AND ($3::bigint IS NULL OR ancestral_trail LIKE '%/' || $3::text || '/%') \
     AND ($4::boolean IS NULL OR is_page = $4)";

#[derive(sqlx::FromRow)]
struct ScoredRow {
    #[sqlx(flatten)]
    item: ItemRow,
    rank: f32,
}

/// Search index backed by the `content_item` table.
#[derive(Clone)]
pub struct PgSearchIndex {
    pool: PgPool,
}

impl PgSearchIndex {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Convert terms to a prefix-matching tsquery joined with `&`.
///
/// [`SearchQuery`] only yields alphanumeric terms, so none of them can
/// carry tsquery operators.
fn to_ts_query(terms: &[String]) -> String {
    terms
        .iter()
        .map(|term| format!("{term}:*"))
        .collect::<Vec<_>>()
        .join(" & ")
}

#[async_trait]
impl SearchIndex for PgSearchIndex {
    async fn search(&self, query: &SearchQuery) -> Result<SearchResult> {
        let ts_query = to_ts_query(&query.terms());
        let types: Vec<String> = query.types.iter().map(|t| t.to_lowercase()).collect();

        debug!(query = %query.text, ts_query = %ts_query, "executing search");

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM content_item WHERE {SEARCH_FILTER}"
        ))
        .bind(&ts_query)
        .bind(&types)
        .bind(query.below)
        .bind(query.only_pages)
        .fetch_one(&self.pool)
        .await
        .context("failed to count search results")?;

        let rows: Vec<ScoredRow> = sqlx::query_as(&format!(
            "SELECT {ITEM_COLUMNS}, \
                    CASE WHEN $1 = '' THEN 0::real \
                         ELSE ts_rank(search_vector, to_tsquery('simple', $1)) END AS rank \
             FROM content_item \
             WHERE {SEARCH_FILTER} \
             ORDER BY rank DESC, id \
             OFFSET $5 LIMIT $6"
        ))
        .bind(&ts_query)
        .bind(&types)
        .bind(query.below)
        .bind(query.only_pages)
        .bind(query.skip as i64)
        .bind(query.take as i64)
        .fetch_all(&self.pool)
        .await
        .context("failed to execute search")?;

        Ok(SearchResult {
            total: total as usize,
            hits: rows
                .into_iter()
                .map(|row| ScoredItem {
                    item: ContentItem::from(row.item),
                    score: row.rank,
                })
                .collect(),
        })
    }
}
