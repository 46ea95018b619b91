use crate::api::models::VideoRecord;
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    #[default]
    Off,
    All,
    One,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueState {
    pub records: Vec<VideoRecord>,
    pub current_index: Option<usize>,
    pub repeat_mode: RepeatMode,
    pub shuffled: bool,
}

/// Queue state written to disk on shutdown.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersistedQueueState {
    pub records: Vec<VideoRecord>,
    pub current_index: Option<usize>,
    pub repeat_mode: RepeatMode,
    pub shuffled: bool,
}

/// Ordered, id-unique list of records with a current position.
///
/// `current_index` is `Some(i)` with `i < len` whenever the queue is
/// non-empty and `None` when it is empty. Mutations keep the same record
/// current unless that record itself is removed.
#[derive(Debug, Clone, Default)]
pub struct PlaybackQueue {
    records: Vec<VideoRecord>,
    current_index: Option<usize>,
    repeat_mode: RepeatMode,
    shuffled: bool,
    /// The playing record was removed and `current_index` now points at
    /// the record that slid into its slot, which is the next one to play.
    slot_pending: bool,
}

impl PlaybackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position_of(&self, video_id: &str) -> Option<usize> {
        self.records.iter().position(|r| r.video_id == video_id)
    }

    pub fn contains(&self, video_id: &str) -> bool {
        self.position_of(video_id).is_some()
    }

    /// Replace the contents. Later duplicates of an id are dropped.
    pub fn set_records(&mut self, records: Vec<VideoRecord>, start_index: usize) {
        self.records.clear();
        self.slot_pending = false;
        for record in records {
            if !self.contains(&record.video_id) {
                self.records.push(record);
            }
        }
        self.current_index = if self.records.is_empty() {
            None
        } else {
            Some(start_index.min(self.records.len() - 1))
        };
    }

    /// Make `record` current, appending it only if its id is not queued yet.
    pub fn select_or_append(&mut self, record: VideoRecord) -> usize {
        let index = match self.position_of(&record.video_id) {
            Some(existing) => existing,
            None => {
                self.records.push(record);
                self.records.len() - 1
            }
        };
        self.current_index = Some(index);
        self.slot_pending = false;
        index
    }

    /// Append to the tail. Returns false when the id is already queued.
    pub fn append(&mut self, record: VideoRecord) -> bool {
        if self.contains(&record.video_id) {
            return false;
        }
        self.records.push(record);
        if self.current_index.is_none() {
            self.current_index = Some(0);
        }
        true
    }

    /// Put `record` right after the current item. An existing entry for the
    /// same id is relocated there; the current item itself is left alone.
    /// Returns false when nothing moved.
    pub fn insert_next(&mut self, record: VideoRecord) -> bool {
        let Some(current) = self.current_index else {
            return self.append(record);
        };

        // With a pending slot the record at `current` has not played yet.
        let target = if self.slot_pending { current } else { current + 1 };
        match self.position_of(&record.video_id) {
            Some(existing) if existing == current && !self.slot_pending => false,
            Some(existing) if existing == target => false,
            Some(existing) => {
                let moved = self.records.remove(existing);
                let (current, target) = if existing < current {
                    (current - 1, target - 1)
                } else {
                    (current, target)
                };
                self.records.insert(target, moved);
                self.current_index = Some(current);
                true
            }
            None => {
                self.records.insert(target, record);
                true
            }
        }
    }

    pub fn remove(&mut self, index: usize) -> Option<VideoRecord> {
        if index >= self.records.len() {
            return None;
        }

        let removed = self.records.remove(index);

        if let Some(current) = self.current_index {
            if self.records.is_empty() {
                self.current_index = None;
                self.slot_pending = false;
            } else if index < current {
                self.current_index = Some(current - 1);
            } else if index == current && current >= self.records.len() {
                self.current_index = Some(self.records.len() - 1);
                self.slot_pending = false;
            } else if index == current {
                self.slot_pending = true;
            }
        }
        Some(removed)
    }

    pub fn move_item(&mut self, from: usize, to: usize) -> bool {
        if from >= self.records.len() || to >= self.records.len() || from == to {
            return false;
        }

        let record = self.records.remove(from);
        self.records.insert(to, record);

        if let Some(current) = self.current_index {
            if from == current {
                self.current_index = Some(to);
            } else if from < current && to >= current {
                self.current_index = Some(current - 1);
            } else if from > current && to <= current {
                self.current_index = Some(current + 1);
            }
        }
        true
    }

    pub fn select(&mut self, index: usize) -> Option<&VideoRecord> {
        if index >= self.records.len() {
            return None;
        }
        self.current_index = Some(index);
        self.slot_pending = false;
        self.records.get(index)
    }

    pub fn current(&self) -> Option<&VideoRecord> {
        self.current_index.and_then(|i| self.records.get(i))
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    pub fn get(&self, index: usize) -> Option<&VideoRecord> {
        self.records.get(index)
    }

    pub fn records(&self) -> &[VideoRecord] {
        &self.records
    }

    /// True when a later entry exists in queue order.
    pub fn has_next(&self) -> bool {
        match self.current_index {
            Some(_) if self.slot_pending => true,
            Some(i) => i + 1 < self.records.len(),
            None => false,
        }
    }

    /// Index `next` would move to. With shuffle on, any index is possible,
    /// the current one included.
    pub fn next_index(&self) -> Option<usize> {
        let len = self.records.len();
        if len == 0 {
            return None;
        }
        if self.shuffled {
            Some(rand::thread_rng().gen_range(0..len))
        } else {
            match self.current_index {
                Some(i) if self.slot_pending => Some(i),
                Some(i) => Some((i + 1) % len),
                None => Some(0),
            }
        }
    }

    pub fn previous_index(&self) -> Option<usize> {
        let len = self.records.len();
        if len == 0 {
            return None;
        }
        let current = self.current_index.unwrap_or(0);
        Some((current + len - 1) % len)
    }

    pub fn toggle_shuffle(&mut self) -> bool {
        self.shuffled = !self.shuffled;
        self.shuffled
    }

    pub fn is_shuffled(&self) -> bool {
        self.shuffled
    }

    pub fn toggle_repeat(&mut self) -> RepeatMode {
        self.repeat_mode = match self.repeat_mode {
            RepeatMode::Off => RepeatMode::All,
            RepeatMode::All => RepeatMode::One,
            RepeatMode::One => RepeatMode::Off,
        };
        self.repeat_mode
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.repeat_mode
    }

    pub fn state(&self) -> QueueState {
        QueueState {
            records: self.records.clone(),
            current_index: self.current_index,
            repeat_mode: self.repeat_mode,
            shuffled: self.shuffled,
        }
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.current_index = None;
        self.slot_pending = false;
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn persisted_state(&self) -> PersistedQueueState {
        PersistedQueueState {
            records: self.records.clone(),
            current_index: self.current_index,
            repeat_mode: self.repeat_mode,
            shuffled: self.shuffled,
        }
    }

    pub fn restore_from_persisted(&mut self, state: PersistedQueueState) {
        let start = state.current_index.unwrap_or(0);
        self.set_records(state.records, start);
        self.repeat_mode = state.repeat_mode;
        self.shuffled = state.shuffled;
    }
}
