//! Scheduled publishing service.
//!
//! Publishes items whose `publish_on` has passed and expires published
//! items whose `expires` has passed. Runs periodically in the background.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::content::VersionManager;
use crate::metrics::Metrics;
use crate::store::ContentStore;

/// What one pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerReport {
    pub published: u64,
    pub expired: u64,
}

impl SchedulerReport {
    pub fn total(&self) -> u64 {
        self.published + self.expired
    }
}

/// Scheduled publishing handler.
pub struct ScheduledPublishingService {
    store: Arc<dyn ContentStore>,
    versions: VersionManager,
}

impl ScheduledPublishingService {
    /// Create a new scheduled publishing service.
    pub fn new(store: Arc<dyn ContentStore>, versions: VersionManager) -> Self {
        Self { store, versions }
    }

    /// Process scheduled publish and expiry transitions due at `now`.
    ///
    /// A failure on one item is logged and does not stop the batch.
    pub async fn process(&self, now: i64) -> Result<SchedulerReport> {
        let mut report = SchedulerReport::default();

        for item in self.store.due_for_publish(now).await? {
            match self.versions.publish(&item).await {
                Ok(published) => {
                    debug!(item_id = published.id, "published scheduled item");
                    report.published += 1;
                }
                Err(e) => {
                    warn!(item_id = item.id, error = %e, "failed to publish scheduled item");
                }
            }
        }

        for item in self.store.due_for_expiry(now).await? {
            match self.versions.expire(&item).await {
                Ok(_) => report.expired += 1,
                Err(e) => {
                    warn!(item_id = item.id, error = %e, "failed to expire item");
                }
            }
        }

        if report.total() > 0 {
            info!(
                published = report.published,
                expired = report.expired,
                "processed scheduled items"
            );
        }

        Ok(report)
    }

    /// Run [`process`](Self::process) every `interval` until `shutdown`
    /// flips to `true`.
    pub fn spawn(
        self: Arc<Self>,
        interval: Duration,
        metrics: Arc<Metrics>,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let now = chrono::Utc::now().timestamp();
                        match self.process(now).await {
                            Ok(report) => metrics.record_scheduler_run(report.published, report.expired),
                            Err(e) => warn!(error = %e, "scheduled publishing pass failed"),
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            debug!("scheduled publishing stopped");
                            break;
                        }
                    }
                }
            }
        })
    }
}

impl std::fmt::Debug for ScheduledPublishingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduledPublishingService").finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::content::TrashHandler;
    use crate::models::{ContentState, NewItem};
    use crate::store::MemoryStore;

    fn page(parent_id: Option<i64>, name: &str) -> NewItem {
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

    #[tokio::test]
    async fn publishes_due_and_expires_stale() {
        let store = Arc::new(MemoryStore::new(100));
        let versions = VersionManager::new(store.clone(), TrashHandler::new(None));
        let root = store.insert(page(None, "root")).await.unwrap();
        let due = store.insert(page(Some(root.id), "due")).await.unwrap();
        let later = store.insert(page(Some(root.id), "later")).await.unwrap();
        let stale = store
            .insert(NewItem {
                state: Some(ContentState::Published),
                expires: Some(500),
                ..page(Some(root.id), "stale")
            })
            .await
            .unwrap();

        versions.schedule(&due, 900).await.unwrap();
        versions.schedule(&later, 2_000).await.unwrap();

        let service = ScheduledPublishingService::new(store.clone(), versions);
        let report = service.process(1_000).await.unwrap();
        assert_eq!(report, SchedulerReport { published: 1, expired: 1 });

        let state = |id| {
            let store = store.clone();
            async move { store.get(id).await.unwrap().unwrap().state }
        };
        assert_eq!(state(due.id).await, ContentState::Published);
        assert_eq!(state(later.id).await, ContentState::ScheduledForPublish);
        assert_eq!(state(stale.id).await, ContentState::Expired);

        // Nothing left to do.
        assert_eq!(service.process(1_000).await.unwrap().total(), 0);
    }

    #[tokio::test]
    async fn spawned_loop_stops_on_shutdown() {
        let store = Arc::new(MemoryStore::new(100));
        let versions = VersionManager::new(store.clone(), TrashHandler::new(None));
        let service = Arc::new(ScheduledPublishingService::new(store, versions));
        let (tx, rx) = watch::channel(false);

        let handle = service.spawn(Duration::from_millis(10), Arc::new(Metrics::new()), rx);
        tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
