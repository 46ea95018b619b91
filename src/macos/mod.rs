pub mod media_keys;
pub mod now_playing;
