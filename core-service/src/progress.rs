//! # Learner Progress
//!
//! Records which course modules the learner has completed. A module counts
//! as complete once its knowledge check is passed; completing it again is a
//! no-op. The set is persisted as a JSON array in the settings store and is
//! independent of narration.

use crate::error::Result;
use bridge_traits::SettingsStore;
use core_runtime::events::{CoreEvent, EventBus, ProgressEvent};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Settings key holding the completed module ids.
pub const PROGRESS_KEY: &str = "physics_progress_v1";

/// Persistent set of completed modules.
pub struct ProgressTracker {
    store: Arc<dyn SettingsStore>,
    events: EventBus,
    key: String,
    // Serializes read-modify-write cycles on the stored set.
    write_lock: Mutex<()>,
}

impl ProgressTracker {
    pub fn new(store: Arc<dyn SettingsStore>, events: EventBus) -> Self {
        Self::with_key(store, events, PROGRESS_KEY)
    }

    pub fn with_key(store: Arc<dyn SettingsStore>, events: EventBus, key: impl Into<String>) -> Self {
        Self {
            store,
            events,
            key: key.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Record `module_id` as complete.
    ///
    /// Returns `true` the first time a module is completed, when a
    /// [`ProgressEvent::ModuleCompleted`] is also emitted.
    pub async fn mark_complete(&self, module_id: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().await;

        let mut completed = self.load().await?;
        if !completed.insert(module_id.to_string()) {
            debug!(module_id, "Module already complete");
            return Ok(false);
        }

        let encoded = serde_json::to_string(&completed)?;
        self.store.set_string(&self.key, &encoded).await?;

        info!(module_id, total = completed.len(), "Module completed");
        self.events
            .emit(CoreEvent::Progress(ProgressEvent::ModuleCompleted {
                module_id: module_id.to_string(),
            }))
            .ok();
        Ok(true)
    }

    pub async fn is_complete(&self, module_id: &str) -> Result<bool> {
        Ok(self.load().await?.contains(module_id))
    }

    /// Completed module ids in sorted order.
    pub async fn completed_modules(&self) -> Result<Vec<String>> {
        Ok(self.load().await?.into_iter().collect())
    }

    /// Forget all progress.
    pub async fn reset(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.store.delete(&self.key).await?;
        info!("Progress reset");
        Ok(())
    }

    async fn load(&self) -> Result<BTreeSet<String>> {
        let Some(raw) = self.store.get_string(&self.key).await? else {
            return Ok(BTreeSet::new());
        };

        match serde_json::from_str::<BTreeSet<String>>(&raw) {
            Ok(set) => Ok(set),
            Err(e) => {
                warn!(key = %self.key, error = %e, "Discarding unreadable progress record");
                Ok(BTreeSet::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_desktop::MemorySettingsStore;

    fn tracker() -> (ProgressTracker, Arc<MemorySettingsStore>, EventBus) {
        let store = Arc::new(MemorySettingsStore::new());
        let events = EventBus::new(16);
        (ProgressTracker::new(store.clone(), events.clone()), store, events)
    }

    #[tokio::test]
    async fn first_completion_is_recorded_and_announced() {
        let (tracker, _store, events) = tracker();
        let mut rx = events.subscribe();

        assert!(tracker.mark_complete("waves").await.unwrap());
        assert!(tracker.is_complete("waves").await.unwrap());
        assert!(!tracker.is_complete("optics").await.unwrap());

        assert_eq!(
            rx.try_recv().unwrap(),
            CoreEvent::Progress(ProgressEvent::ModuleCompleted {
                module_id: "waves".into()
            })
        );
    }

    #[tokio::test]
    async fn repeat_completion_is_idempotent() {
        let (tracker, _store, events) = tracker();
        let mut rx = events.subscribe();

        assert!(tracker.mark_complete("waves").await.unwrap());
        assert!(!tracker.mark_complete("waves").await.unwrap());

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err(), "only one event per module");
        assert_eq!(tracker.completed_modules().await.unwrap(), vec!["waves"]);
    }

    #[tokio::test]
    async fn progress_survives_a_new_tracker() {
        let (tracker, store, events) = tracker();
        tracker.mark_complete("optics").await.unwrap();
        tracker.mark_complete("waves").await.unwrap();

        let reopened = ProgressTracker::new(store, events);
        assert_eq!(
            reopened.completed_modules().await.unwrap(),
            vec!["optics", "waves"]
        );
    }

    #[tokio::test]
    async fn corrupt_record_reads_as_empty() {
        let (tracker, store, _events) = tracker();
        store.set_string(PROGRESS_KEY, "{not json").await.unwrap();

        assert!(tracker.completed_modules().await.unwrap().is_empty());
        assert!(tracker.mark_complete("waves").await.unwrap());
    }

    #[tokio::test]
    async fn reset_clears_everything() {
        let (tracker, _store, _events) = tracker();
        tracker.mark_complete("waves").await.unwrap();
        tracker.reset().await.unwrap();
        assert!(tracker.completed_modules().await.unwrap().is_empty());
    }
}
