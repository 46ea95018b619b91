use crate::store::{PreferenceStore, KEY_SETTINGS};
use serde::{Deserialize, Serialize};

/// The user settings bag. Missing keys take their defaults on load and keys
/// this version does not know about are carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub accent_color: String,
    pub theme: String,
    pub particles: bool,
    pub glass_intensity: u32,
    pub neon_glow: bool,
    pub animations: bool,
    pub aurora_effect: bool,
    pub ambient_mode: bool,
    pub immersive_player: bool,
    pub visualizer: bool,
    pub autoplay: bool,
    pub max_queue_size: usize,
    #[serde(rename = "skipSeason8Intro")]
    pub skip_season8_intro: bool,
    pub bass_boost: f32,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            accent_color: "#FF0000".into(),
            theme: "dark".into(),
            particles: false,
            glass_intensity: 30,
            neon_glow: false,
            animations: true,
            aurora_effect: false,
            ambient_mode: false,
            immersive_player: false,
            visualizer: false,
            autoplay: true,
            max_queue_size: 50,
            skip_season8_intro: false,
            bass_boost: 0.0,
            extra: serde_json::Map::new(),
        }
    }
}

impl Settings {
    pub fn load(store: &PreferenceStore) -> Self {
        store.get_or(KEY_SETTINGS, Self::default())
    }

    pub fn save(&self, store: &PreferenceStore) {
        store.persist(KEY_SETTINGS, self);
    }
}
