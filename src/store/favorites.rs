use crate::api::models::VideoRecord;
use crate::store::{PreferenceStore, KEY_FAVORITES};

/// Favorite videos keyed by id, in the order they were added. The full
/// record is kept so the library can be shown without a catalog fetch.
#[derive(Debug, Clone, Default)]
pub struct Favorites {
    entries: Vec<(String, VideoRecord)>,
}

impl Favorites {
    pub fn load(store: &PreferenceStore) -> Self {
        match store.get_value(KEY_FAVORITES) {
            Some(value) => Self::from_value(value),
            None => Self::default(),
        }
    }

    /// Decode a stored payload. An old payload of bare ids has nothing to
    /// rebuild records from, so it loads as empty.
    pub fn from_value(value: serde_json::Value) -> Self {
        let is_legacy = value
            .as_array()
            .and_then(|items| items.first())
            .map(|first| first.is_string())
            .unwrap_or(false);
        if is_legacy {
            log::info!("[favorites] Migrating favorites from the id-only format");
            return Self::default();
        }

        match serde_json::from_value::<Vec<(String, VideoRecord)>>(value) {
            Ok(entries) => {
                let mut favorites = Self::default();
                for (id, record) in entries {
                    if !favorites.contains(&id) {
                        favorites.entries.push((id, record));
                    }
                }
                favorites
            }
            Err(e) => {
                log::warn!("[favorites] Unreadable favorites, starting empty: {}", e);
                Self::default()
            }
        }
    }

    pub fn contains(&self, video_id: &str) -> bool {
        self.entries.iter().any(|(id, _)| id == video_id)
    }

    pub fn get(&self, video_id: &str) -> Option<&VideoRecord> {
        self.entries
            .iter()
            .find(|(id, _)| id == video_id)
            .map(|(_, record)| record)
    }

    /// Flip membership of `record`. Returns true when it is now a favorite.
    pub fn toggle(&mut self, record: &VideoRecord) -> bool {
        if let Some(pos) = self.entries.iter().position(|(id, _)| *id == record.video_id) {
            self.entries.remove(pos);
            false
        } else {
            self.entries.push((record.video_id.clone(), record.clone()));
            true
        }
    }

    /// Toggle and write through to the store.
    pub fn toggle_and_persist(&mut self, record: &VideoRecord, store: &PreferenceStore) -> bool {
        let now_favorite = self.toggle(record);
        self.persist(store);
        now_favorite
    }

    pub fn persist(&self, store: &PreferenceStore) {
        store.persist(KEY_FAVORITES, &self.entries);
    }

    pub fn records(&self) -> impl Iterator<Item = &VideoRecord> {
        self.entries.iter().map(|(_, record)| record)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn toggle_round_trips_through_the_store() {
        let dir = TempDir::new().unwrap();
        let store = PreferenceStore::new(dir.path());
        let record = VideoRecord::new("abc", "Intro").with_owner("Saison 8");

        let mut favorites = Favorites::load(&store);
        assert!(favorites.toggle_and_persist(&record, &store));

        let reloaded = Favorites::load(&store);
        assert_eq!(reloaded.get("abc"), Some(&record));

        let mut reloaded = reloaded;
        assert!(!reloaded.toggle_and_persist(&record, &store));
        assert!(Favorites::load(&store).is_empty());
    }

    #[test]
    fn id_only_payload_migrates_to_empty() {
        let favorites = Favorites::from_value(json!(["abc", "xyz"]));
        assert!(favorites.is_empty());
    }

    #[test]
    fn pair_payload_keeps_order() {
        let favorites = Favorites::from_value(json!([
            ["b", {"video_id": "b", "title": "B"}],
            ["a", {"video_id": "a", "title": "A"}]
        ]));
        let ids: Vec<_> = favorites.records().map(|r| r.video_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn garbage_payload_is_empty() {
        assert!(Favorites::from_value(json!({"oops": 1})).is_empty());
    }
}
