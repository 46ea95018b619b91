//! Transport commands arriving from outside the engine: media keys, the
//! companion window's buttons, or typed shell words.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", content = "seconds", rename_all = "kebab-case")]
pub enum RemoteCommand {
    Play,
    Pause,
    Toggle,
    Next,
    Previous,
    SeekTo(f64),
}

impl RemoteCommand {
    /// Parse a command word. Unknown or malformed input yields `None`.
    pub fn parse(input: &str) -> Option<Self> {
        let mut parts = input.split_whitespace();
        let word = parts.next()?.to_ascii_lowercase();
        let command = match word.as_str() {
            "play" => RemoteCommand::Play,
            "pause" => RemoteCommand::Pause,
            "toggle" | "play-pause" => RemoteCommand::Toggle,
            "next" => RemoteCommand::Next,
            "previous" | "prev" => RemoteCommand::Previous,
            "seek-to" | "seekto" => {
                let seconds: f64 = parts.next()?.parse().ok()?;
                if !seconds.is_finite() {
                    return None;
                }
                RemoteCommand::SeekTo(seconds)
            }
            _ => {
                log::debug!("[bridge] Ignoring unknown remote command: {}", input.trim());
                return None;
            }
        };
        if parts.next().is_some() {
            log::debug!("[bridge] Ignoring trailing input in: {}", input.trim());
        }
        Some(command)
    }

    /// Commands that move the playhead of whichever surface owns playback.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            RemoteCommand::Play | RemoteCommand::Pause | RemoteCommand::Toggle | RemoteCommand::SeekTo(_)
        )
    }
}
