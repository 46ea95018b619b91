use crate::api::models::VideoRecord;
use crate::store::{PreferenceStore, KEY_HISTORY};
use crate::events::PlayerEvent;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;

pub const HISTORY_LIMIT: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub record: VideoRecord,
    /// Epoch milliseconds.
    pub watched_at: i64,
}

/// Watch history, most recent first, one entry per video id.
#[derive(Debug, Clone, Default)]
pub struct History {
    entries: Vec<HistoryEntry>,
}

impl History {
    pub fn load(store: &PreferenceStore) -> Self {
        let mut entries: Vec<HistoryEntry> = store.get_or(KEY_HISTORY, Vec::new());
        entries.truncate(HISTORY_LIMIT);
        Self { entries }
    }

    /// Move `record` to the front stamped with `watched_at`, evicting the
    /// oldest entry past the limit.
    pub fn record(&mut self, record: &VideoRecord, watched_at: i64) {
        self.entries.retain(|e| e.record.video_id != record.video_id);
        self.entries.insert(
            0,
            HistoryEntry {
                record: record.clone(),
                watched_at,
            },
        );
        self.entries.truncate(HISTORY_LIMIT);
    }

    pub fn record_and_persist(&mut self, record: &VideoRecord, store: &PreferenceStore) {
        self.record(record, chrono::Utc::now().timestamp_millis());
        store.persist(KEY_HISTORY, &self.entries);
    }

    pub fn clear(&mut self, store: &PreferenceStore) {
        self.entries.clear();
        store.persist(KEY_HISTORY, &self.entries);
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Record every track that starts playing.
pub fn spawn_history_recorder(
    mut rx: broadcast::Receiver<PlayerEvent>,
    history: Arc<Mutex<History>>,
    store: PreferenceStore,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(PlayerEvent::TrackChanged { record, .. }) => {
                    history.lock().await.record_and_persist(&record, &store);
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    log::warn!("[history] Missed {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
