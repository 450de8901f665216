//! PostgreSQL content store.
//!
//! Structural primitives run inside one transaction and lock the rows they
//! rewrite with `SELECT ... FOR UPDATE`.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;

use super::{ChildFilter, ContentStore};
use crate::content::Range;
use crate::models::{ChildState, ContentItem, ContentState, ItemId, NewItem, TrashInfo};

/// Columns selected for every item read.
pub(crate) const ITEM_COLUMNS: &str = "id, parent_id, ancestral_trail, sort_order, name, title, \
     item_type, is_page, state, child_state, published, expires, publish_on, authorized_roles, \
     version_of, trash, fields, created, changed";

/// Database row for a content item.
#[derive(sqlx::FromRow)]
pub(crate) struct ItemRow {
    id: i64,
    parent_id: Option<i64>,
    ancestral_trail: String,
    sort_order: i32,
    name: String,
    title: String,
    item_type: String,
    is_page: bool,
    state: i16,
    child_state: i16,
    published: Option<i64>,
    expires: Option<i64>,
    publish_on: Option<i64>,
    authorized_roles: Vec<String>,
    version_of: Option<i64>,
    trash: Option<Json<TrashInfo>>,
    fields: serde_json::Value,
    created: i64,
    changed: i64,
}

impl From<ItemRow> for ContentItem {
    fn from(row: ItemRow) -> Self {
        Self {
            id: row.id,
            parent_id: row.parent_id,
            ancestral_trail: row.ancestral_trail,
            sort_order: row.sort_order,
            name: row.name,
            title: row.title,
            item_type: row.item_type,
            is_page: row.is_page,
            state: ContentState::from_code(row.state),
            child_state: ChildState::from_bits(row.child_state as u16),
            published: row.published,
            expires: row.expires,
            publish_on: row.publish_on,
            authorized_roles: row.authorized_roles,
            version_of: row.version_of,
            trash: row.trash.map(|Json(info)| info),
            fields: row.fields,
            created: row.created,
            changed: row.changed,
        }
    }
}

/// Content store backed by the `content_item` table.
#[derive(Clone)]
pub struct PgContentStore {
    pool: PgPool,
    large_threshold: usize,
}

impl PgContentStore {
    pub fn new(pool: PgPool, large_threshold: usize) -> Self {
        Self {
            pool,
            large_threshold,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn lock_item(tx: &mut Transaction<'_, Postgres>, id: ItemId) -> Result<Option<ContentItem>> {
        let row = sqlx::query_as::<_, ItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM content_item WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .context("failed to lock content item")?;

        Ok(row.map(ContentItem::from))
    }

    /// Recompute and store the child flags of `parent_id`.
    async fn sync_child_state(&self, tx: &mut Transaction<'_, Postgres>, parent_id: ItemId) -> Result<()> {
        let (count, any_page, any_part): (i64, bool, bool) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COALESCE(bool_or(is_page), FALSE),
                   COALESCE(bool_or(NOT is_page), FALSE)
            FROM content_item
            WHERE parent_id = $1
            "#,
        )
        .bind(parent_id)
        .fetch_one(&mut **tx)
        .await
        .context("failed to count children")?;

        let state = ChildState::compute(count as usize, any_page, any_part, self.large_threshold);

        sqlx::query("UPDATE content_item SET child_state = $2 WHERE id = $1")
            .bind(parent_id)
            .bind(state.bits() as i16)
            .execute(&mut **tx)
            .await
            .context("failed to update child state")?;

        Ok(())
    }

    /// Reparent `id` inside `tx`. Locks the item, the new parent and the
    /// destination siblings.
    async fn move_in(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: ItemId,
        parent_id: ItemId,
        before: Option<ItemId>,
    ) -> Result<()> {
        let Some(item) = Self::lock_item(tx, id).await? else {
            bail!("item {id} not found");
        };
        let Some(parent) = Self::lock_item(tx, parent_id).await? else {
            bail!("parent item {parent_id} not found");
        };
        if parent.id == id || parent.is_descendant_of(id) {
            bail!("cannot move item {id} below itself");
        }

        let mut siblings: Vec<i64> = sqlx::query_scalar(
            "SELECT id FROM content_item WHERE parent_id = $1 AND id <> $2 \
             ORDER BY sort_order, id FOR UPDATE",
        )
        .bind(parent_id)
        .bind(id)
        .fetch_all(&mut **tx)
        .await
        .context("failed to lock siblings")?;

        let position = match before {
            Some(before) => match siblings.iter().position(|s| *s == before) {
                Some(position) => position,
                None => bail!("item {before} is not a child of {parent_id}"),
            },
            None => siblings.len(),
        };
        siblings.insert(position, id);

        let old_prefix = item.descendant_trail();
        let new_trail = parent.descendant_trail();
        let new_prefix = format!("{new_trail}{id}/");

        sqlx::query(
            "UPDATE content_item \
             SET ancestral_trail = $2 || substr(ancestral_trail, length($1) + 1) \
             WHERE ancestral_trail LIKE $1 || '%'",
        )
        .bind(&old_prefix)
        .bind(&new_prefix)
        .execute(&mut **tx)
        .await
        .context("failed to rewrite descendant trails")?;

        sqlx::query(
            "UPDATE content_item SET parent_id = $2, ancestral_trail = $3, changed = $4 WHERE id = $1",
        )
        .bind(id)
        .bind(parent_id)
        .bind(&new_trail)
        .bind(chrono::Utc::now().timestamp())
        .execute(&mut **tx)
        .await
        .context("failed to reparent item")?;

        sqlx::query(
            "UPDATE content_item AS c SET sort_order = (o.ord - 1)::integer \
             FROM unnest($1::bigint[]) WITH ORDINALITY AS o(id, ord) \
             WHERE c.id = o.id",
        )
        .bind(&siblings)
        .execute(&mut **tx)
        .await
        .context("failed to renumber siblings")?;

        if let Some(old_parent) = item.parent_id {
            self.sync_child_state(tx, old_parent).await?;
        }
        self.sync_child_state(tx, parent_id).await?;

        Ok(())
    }

    /// Delete `id` and its subtree inside `tx`.
    async fn remove_in(&self, tx: &mut Transaction<'_, Postgres>, id: ItemId) -> Result<bool> {
        let Some(item) = Self::lock_item(tx, id).await? else {
            return Ok(false);
        };

        let removed = sqlx::query(
            "DELETE FROM content_item WHERE id = $1 OR ancestral_trail LIKE $2 || '%'",
        )
        .bind(id)
        .bind(item.descendant_trail())
        .execute(&mut **tx)
        .await
        .context("failed to delete content item")?;

        if let Some(parent_id) = item.parent_id {
            self.sync_child_state(tx, parent_id).await?;
        }

        debug!(item_id = id, rows = removed.rows_affected(), "removed content item");
        Ok(true)
    }
}

/// Write the non-structural fields of `item`.
async fn write_fields<'e, E>(executor: E, item: &ContentItem) -> Result<()>
where
    E: sqlx::PgExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        UPDATE content_item
        SET name = $2, title = $3, state = $4, published = $5, expires = $6,
            publish_on = $7, authorized_roles = $8, version_of = $9, trash = $10,
            fields = $11, changed = $12
        WHERE id = $1
        "#,
    )
    .bind(item.id)
    .bind(&item.name)
    .bind(&item.title)
    .bind(item.state.code())
    .bind(item.published)
    .bind(item.expires)
    .bind(item.publish_on)
    .bind(&item.authorized_roles)
    .bind(item.version_of)
    .bind(item.trash.clone().map(Json))
    .bind(&item.fields)
    .bind(chrono::Utc::now().timestamp())
    .execute(executor)
    .await
    .context("failed to save content item")?;

    if result.rows_affected() == 0 {
        bail!("item {} not found", item.id);
    }

    Ok(())
}

#[async_trait]
impl ContentStore for PgContentStore {
    async fn get(&self, id: ItemId) -> Result<Option<ContentItem>> {
        let row = sqlx::query_as::<_, ItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM content_item WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("failed to load content item")?;

        Ok(row.map(ContentItem::from))
    }

    async fn find_child_by_name(
        &self,
        parent_id: ItemId,
        name: &str,
    ) -> Result<Option<ContentItem>> {
        let row = sqlx::query_as::<_, ItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM content_item \
             WHERE parent_id = $1 AND lower(name) = lower($2) \
             ORDER BY sort_order, id LIMIT 1"
        ))
        .bind(parent_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .context("failed to find child by name")?;

        Ok(row.map(ContentItem::from))
    }

    async fn list_children(
        &self,
        parent_id: ItemId,
        filter: ChildFilter,
        window: Range,
    ) -> Result<Vec<ContentItem>> {
        // LIMIT NULL means no limit.
        let rows = sqlx::query_as::<_, ItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM content_item \
             WHERE parent_id = $1 \
               AND ($2::boolean IS NULL OR is_page = $2) \
               AND (NOT $3 OR (state = $4 AND trash IS NULL)) \
             ORDER BY sort_order, id \
             OFFSET $5 LIMIT $6"
        ))
        .bind(parent_id)
        .bind(filter.only_pages)
        .bind(filter.published_only)
        .bind(ContentState::Published.code())
        .bind(window.skip as i64)
        .bind(window.take.map(|take| take as i64))
        .fetch_all(&self.pool)
        .await
        .context("failed to list children")?;

        Ok(rows.into_iter().map(ContentItem::from).collect())
    }

    async fn descendants(&self, id: ItemId) -> Result<Vec<ContentItem>> {
        let Some(item) = self.get(id).await? else {
            return Ok(Vec::new());
        };

        let rows = sqlx::query_as::<_, ItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM content_item \
             WHERE ancestral_trail LIKE $1 || '%' \
             ORDER BY ancestral_trail, sort_order, id"
        ))
        .bind(item.descendant_trail())
        .fetch_all(&self.pool)
        .await
        .context("failed to load descendants")?;

        Ok(rows.into_iter().map(ContentItem::from).collect())
    }

    async fn insert(&self, input: NewItem) -> Result<ContentItem> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to start transaction")?;

        let (trail, sort_order) = match input.parent_id {
            Some(parent_id) => {
                let Some(parent) = Self::lock_item(&mut tx, parent_id).await? else {
                    bail!("parent item {parent_id} not found");
                };
                let next: i32 = sqlx::query_scalar(
                    "SELECT COALESCE(MAX(sort_order) + 1, 0) FROM content_item WHERE parent_id = $1",
                )
                .bind(parent_id)
                .fetch_one(&mut *tx)
                .await
                .context("failed to compute sort order")?;
                (parent.descendant_trail(), next)
            }
            None => ("/".to_string(), 0),
        };

        let row = sqlx::query_as::<_, ItemRow>(&format!(
            r#"
            INSERT INTO content_item (parent_id, ancestral_trail, sort_order, name, title,
                item_type, is_page, state, child_state, published, expires, authorized_roles,
                version_of, fields, created, changed)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $15)
            RETURNING {ITEM_COLUMNS}
            "#
        ))
        .bind(input.parent_id)
        .bind(&trail)
        .bind(sort_order)
        .bind(&input.name)
        .bind(&input.title)
        .bind(&input.item_type)
        .bind(input.is_page)
        .bind(input.state.unwrap_or_default().code())
        .bind(ChildState::IS_EMPTY.bits() as i16)
        .bind(input.published)
        .bind(input.expires)
        .bind(&input.authorized_roles)
        .bind(input.version_of)
        .bind(input.fields.unwrap_or_else(|| serde_json::json!({})))
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .context("failed to insert content item")?;

        if let Some(parent_id) = input.parent_id {
            self.sync_child_state(&mut tx, parent_id).await?;
        }

        tx.commit().await.context("failed to commit transaction")?;

        let item = ContentItem::from(row);
        debug!(item_id = item.id, trail = %item.ancestral_trail, "inserted content item");
        Ok(item)
    }

    async fn save(&self, item: &ContentItem) -> Result<()> {
        write_fields(&self.pool, item).await
    }

    async fn move_item(
        &self,
        id: ItemId,
        parent_id: ItemId,
        before: Option<ItemId>,
    ) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to start transaction")?;

        self.move_in(&mut tx, id, parent_id, before).await?;

        tx.commit().await.context("failed to commit transaction")?;
        debug!(item_id = id, parent_id, ?before, "moved content item");
        Ok(())
    }

    async fn save_and_move(
        &self,
        item: &ContentItem,
        parent_id: ItemId,
        before: Option<ItemId>,
    ) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to start transaction")?;

        self.move_in(&mut tx, item.id, parent_id, before).await?;
        write_fields(&mut *tx, item).await?;

        tx.commit().await.context("failed to commit transaction")?;
        debug!(item_id = item.id, parent_id, ?before, "saved and moved content item");
        Ok(())
    }

    async fn remove(&self, id: ItemId) -> Result<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to start transaction")?;

        let removed = self.remove_in(&mut tx, id).await?;

        tx.commit().await.context("failed to commit transaction")?;
        Ok(removed)
    }

    async fn save_and_remove(&self, item: &ContentItem, remove_id: ItemId) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to start transaction")?;

        let Some(saved) = Self::lock_item(&mut tx, item.id).await? else {
            bail!("item {} not found", item.id);
        };
        if saved.id == remove_id || saved.is_descendant_of(remove_id) {
            bail!("cannot remove item {remove_id} while saving item {}", item.id);
        }

        write_fields(&mut *tx, item).await?;
        if !self.remove_in(&mut tx, remove_id).await? {
            bail!("item {remove_id} not found");
        }

        tx.commit().await.context("failed to commit transaction")?;
        Ok(())
    }

    async fn due_for_publish(&self, now: i64) -> Result<Vec<ContentItem>> {
        let rows = sqlx::query_as::<_, ItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM content_item \
             WHERE state = $1 AND publish_on IS NOT NULL AND publish_on <= $2 \
             ORDER BY publish_on, id"
        ))
        .bind(ContentState::ScheduledForPublish.code())
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .context("failed to load items due for publishing")?;

        Ok(rows.into_iter().map(ContentItem::from).collect())
    }

    async fn due_for_expiry(&self, now: i64) -> Result<Vec<ContentItem>> {
        let rows = sqlx::query_as::<_, ItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM content_item \
             WHERE state = $1 AND expires IS NOT NULL AND expires <= $2 \
             ORDER BY expires, id"
        ))
        .bind(ContentState::Published.code())
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .context("failed to load items due for expiry")?;

        Ok(rows.into_iter().map(ContentItem::from).collect())
    }

    async fn health_check(&self) -> bool {
        crate::db::check_health(&self.pool).await
    }
}
