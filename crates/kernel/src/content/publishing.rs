//! Publication state changes.
//!
//! [`StateChanger`] enforces the state machine on a single item.
//! [`VersionManager`] publishes, unpublishes and schedules items, promoting
//! draft versions onto their master on publish.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, TimeZone, Utc};
use tracing::info;

use super::error::{TreeError, TreeResult};
use super::persister::TrashHandler;
use crate::models::{ContentItem, ContentState};
use crate::store::ContentStore;

/// Parse a schedule date into a unix timestamp.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM[:SS]`, `YYYY-MM-DDTHH:MM[:SS]` (UTC)
/// and `YYYY-MM-DD` (midnight UTC).
pub fn parse_publish_date(raw: &str) -> TreeResult<i64> {
    let raw = raw.trim();

    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.timestamp());
    }

    for format in [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(Utc.from_utc_datetime(&naive).timestamp());
        }
    }

    if let Some(midnight) = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
    {
        return Ok(Utc.from_utc_datetime(&midnight).timestamp());
    }

    Err(TreeError::validation(format!("'{raw}' is not a valid date")))
}

/// Applies state transitions to items in memory.
#[derive(Debug, Clone, Copy, Default)]
pub struct StateChanger;

impl StateChanger {
    /// Move `item` to `next`, rejecting transitions the state machine does
    /// not allow.
    pub fn change_to(&self, item: &mut ContentItem, next: ContentState) -> TreeResult<()> {
        if !item.state.can_transition_to(next) {
            return Err(TreeError::integrity(format!(
                "Cannot change item {} from {} to {}",
                item.id, item.state, next
            )));
        }

        item.state = next;
        Ok(())
    }
}

/// Publishes items and promotes draft versions.
#[derive(Clone)]
pub struct VersionManager {
    store: Arc<dyn ContentStore>,
    changer: StateChanger,
    trash: TrashHandler,
}

impl VersionManager {
    pub fn new(store: Arc<dyn ContentStore>, trash: TrashHandler) -> Self {
        Self {
            store,
            changer: StateChanger,
            trash,
        }
    }

    /// Publish `item` and return the item that is now published.
    ///
    /// For a draft version that is the master it was promoted onto.
    pub async fn publish(&self, item: &ContentItem) -> TreeResult<ContentItem> {
        self.reject_trashed(item, "publish")?;

        let Some(master_id) = item.version_of else {
            if item.is_published() {
                return Ok(item.clone());
            }

            let mut published = item.clone();
            self.mark_published(&mut published)?;
            self.store.save(&published).await?;
            info!(item_id = item.id, "published item");
            return Ok(published);
        };

        let master = self
            .store
            .get(master_id)
            .await?
            .ok_or_else(|| TreeError::NotFound(format!("master item {master_id}")))?;
        self.reject_trashed(&master, "publish")?;

        let mut promoted = master;
        promoted.title = item.title.clone();
        promoted.name = item.name.clone();
        promoted.fields = item.fields.clone();
        promoted.expires = item.expires.or(promoted.expires);
        self.mark_published(&mut promoted)?;

        self.store.save_and_remove(&promoted, item.id).await?;

        info!(item_id = promoted.id, version_id = item.id, "promoted draft version");
        Ok(promoted)
    }

    /// Unpublish `item`. The change is made on a copy and only becomes
    /// visible once the save succeeds.
    pub async fn unpublish(&self, item: &ContentItem) -> TreeResult<ContentItem> {
        let mut unpublished = item.clone();
        self.changer
            .change_to(&mut unpublished, ContentState::Unpublished)?;
        unpublished.published = None;
        unpublished.publish_on = None;

        self.store.save(&unpublished).await?;
        info!(item_id = item.id, "unpublished item");
        Ok(unpublished)
    }

    /// Record a future publication time for `item`.
    pub async fn schedule(&self, item: &ContentItem, publish_on: i64) -> TreeResult<ContentItem> {
        self.reject_trashed(item, "schedule")?;

        let mut scheduled = item.clone();
        if !scheduled.is_published() {
            self.changer
                .change_to(&mut scheduled, ContentState::ScheduledForPublish)?;
        }
        scheduled.publish_on = Some(publish_on);

        self.store.save(&scheduled).await?;
        info!(item_id = item.id, publish_on, "scheduled item for publishing");
        Ok(scheduled)
    }

    /// Transition a published item whose expiry has passed.
    pub async fn expire(&self, item: &ContentItem) -> TreeResult<ContentItem> {
        let mut expired = item.clone();
        self.changer.change_to(&mut expired, ContentState::Expired)?;

        self.store.save(&expired).await?;
        info!(item_id = item.id, "expired item");
        Ok(expired)
    }

    fn mark_published(&self, item: &mut ContentItem) -> TreeResult<()> {
        self.changer.change_to(item, ContentState::Published)?;
        item.published.get_or_insert_with(|| Utc::now().timestamp());
        item.publish_on = None;
        Ok(())
    }

    fn reject_trashed(&self, item: &ContentItem, action: &str) -> TreeResult<()> {
        if self.trash.is_in_trash(item) {
            return Err(TreeError::integrity(format!(
                "Cannot {action} item {} while it is in the trash",
                item.id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::models::{ItemId, NewItem};
    use crate::store::MemoryStore;
    use crate::store::testing::FailingStore;

    fn new_item(parent_id: Option<ItemId>, name: &str) -> NewItem {
        NewItem {
            parent_id,
            name: name.to_string(),
            title: name.to_string(),
            item_type: "Page".to_string(),
            is_page: true,
            state: None,
            published: None,
            expires: None,
            authorized_roles: Vec::new(),
            version_of: None,
            fields: None,
        }
    }

    async fn setup() -> (Arc<MemoryStore>, VersionManager, ContentItem) {
        let store = Arc::new(MemoryStore::new(100));
        let root = store.insert(new_item(None, "root")).await.unwrap();
        let page = store.insert(new_item(Some(root.id), "page")).await.unwrap();
        let manager = VersionManager::new(store.clone(), TrashHandler::new(None));
        (store, manager, page)
    }

    #[test]
    fn date_formats() {
        assert_eq!(parse_publish_date("2030-01-02T03:04:05Z").unwrap(), 1_893_553_445);
        assert_eq!(
            parse_publish_date("2030-01-02T05:04:05+02:00").unwrap(),
            1_893_553_445
        );
        assert_eq!(parse_publish_date("2030-01-02 03:04:05").unwrap(), 1_893_553_445);
        assert_eq!(parse_publish_date("2030-01-02T03:04").unwrap(), 1_893_553_440);
        assert_eq!(parse_publish_date("2030-01-02").unwrap(), 1_893_542_400);
    }

    #[test]
    fn bad_dates_fail_validation() {
        for raw in ["not-a-date", "", "2030-13-01", "02/01/2030"] {
            assert_eq!(parse_publish_date(raw).unwrap_err().kind(), "validation");
        }
    }

    #[test]
    fn state_changer_rejects_disallowed_transitions() {
        let mut item = crate::models::item::tests::sample_item(2, "/1/");
        item.state = ContentState::Expired;
        let err = StateChanger.change_to(&mut item, ContentState::Published).unwrap_err();
        assert_eq!(err.kind(), "integrity");
        assert_eq!(item.state, ContentState::Expired);
    }

    #[tokio::test]
    async fn publish_stamps_and_clears_schedule() {
        let (store, manager, page) = setup().await;
        let scheduled = manager.schedule(&page, 4_000_000_000).await.unwrap();
        assert_eq!(scheduled.state, ContentState::ScheduledForPublish);

        let published = manager.publish(&scheduled).await.unwrap();
        assert_eq!(published.state, ContentState::Published);
        assert!(published.published.is_some());
        assert_eq!(published.publish_on, None);

        let stored = store.get(page.id).await.unwrap().unwrap();
        assert_eq!(stored.state, ContentState::Published);
    }

    #[tokio::test]
    async fn draft_version_is_promoted_onto_master() {
        let (store, manager, page) = setup().await;
        let draft = store
            .insert(NewItem {
                title: "New title".to_string(),
                version_of: Some(page.id),
                fields: Some(serde_json::json!({"body": "v2"})),
                ..new_item(None, "page")
            })
            .await
            .unwrap();

        let promoted = manager.publish(&draft).await.unwrap();
        assert_eq!(promoted.id, page.id);
        assert_eq!(promoted.title, "New title");
        assert_eq!(promoted.fields["body"], "v2");
        assert!(store.get(draft.id).await.unwrap().is_none());
        assert!(store.get(page.id).await.unwrap().unwrap().is_published());
    }

    async fn draft_of(store: &MemoryStore, master: &ContentItem) -> ContentItem {
        store
            .insert(NewItem {
                title: "New title".to_string(),
                version_of: Some(master.id),
                ..new_item(None, "page")
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn failed_promotion_changes_nothing() {
        let (store, _, page) = setup().await;
        let draft = draft_of(&store, &page).await;
        let manager = VersionManager::new(
            Arc::new(FailingStore::new(store.clone(), &["save_and_remove"])),
            TrashHandler::new(None),
        );

        assert_eq!(manager.publish(&draft).await.unwrap_err().kind(), "store");
        assert_eq!(store.get(page.id).await.unwrap().unwrap(), page);
        assert!(store.get(draft.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn promotion_is_one_store_step() {
        let (store, _, page) = setup().await;
        let draft = draft_of(&store, &page).await;
        let manager = VersionManager::new(
            Arc::new(FailingStore::new(store.clone(), &["save", "remove"])),
            TrashHandler::new(None),
        );

        let promoted = manager.publish(&draft).await.unwrap();
        assert_eq!(promoted.id, page.id);
        assert!(store.get(page.id).await.unwrap().unwrap().is_published());
        assert!(store.get(draft.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unpublish_clears_dates() {
        let (store, manager, page) = setup().await;
        let published = manager.publish(&page).await.unwrap();
        let unpublished = manager.unpublish(&published).await.unwrap();

        assert_eq!(unpublished.state, ContentState::Unpublished);
        assert_eq!(unpublished.published, None);

        let stored = store.get(page.id).await.unwrap().unwrap();
        assert_eq!(stored.state, ContentState::Unpublished);
        assert_eq!(stored.published, None);
    }

    #[tokio::test]
    async fn schedule_published_item_keeps_state() {
        let (_, manager, page) = setup().await;
        let published = manager.publish(&page).await.unwrap();
        let rescheduled = manager.schedule(&published, 4_000_000_000).await.unwrap();
        assert_eq!(rescheduled.state, ContentState::Published);
        assert_eq!(rescheduled.publish_on, Some(4_000_000_000));
    }

    #[tokio::test]
    async fn trashed_items_cannot_be_published() {
        let (_, manager, mut page) = setup().await;
        page.trash = Some(crate::models::TrashInfo {
            former_parent_id: page.parent_id,
            former_state: ContentState::Unpublished,
            deleted_at: 0,
        });
        assert_eq!(manager.publish(&page).await.unwrap_err().kind(), "integrity");
        assert_eq!(
            manager.schedule(&page, 0).await.unwrap_err().kind(),
            "integrity"
        );
    }
}
