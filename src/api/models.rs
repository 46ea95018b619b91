use serde::{Deserialize, Deserializer, Serialize};

// Catalog envelope types
#[derive(Debug, Deserialize)]
pub struct MediaEnvelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub videos: Option<Vec<VideoRecord>>,
}

#[derive(Debug, Deserialize)]
pub struct SeriesEnvelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub seasons: Option<Vec<Series>>,
}

#[derive(Debug, Deserialize)]
pub struct EpisodesEnvelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub episodes: Option<Vec<RawEpisode>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawEpisode {
    #[serde(deserialize_with = "string_or_number")]
    pub video_id: String,
    #[serde(default)]
    pub episode_number: Option<u32>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub owner_name: Option<String>,
    #[serde(default)]
    pub duration: Option<MediaDuration>,
}

// Domain types

/// A playable catalog entry. Identity is the `video_id`; two records with
/// the same id are the same item even if their other fields differ.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoRecord {
    #[serde(deserialize_with = "string_or_number")]
    pub video_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub owner_name: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub duration: Option<MediaDuration>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub views: Option<u64>,
}

impl VideoRecord {
    pub fn new(video_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            video_id: video_id.into(),
            title: title.into(),
            owner_name: None,
            thumbnail: None,
            duration: None,
            views: None,
        }
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner_name = Some(owner.into());
        self
    }

    pub fn with_duration(mut self, duration: MediaDuration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn same_item(&self, other: &VideoRecord) -> bool {
        self.video_id == other.video_id
    }

    /// Owner label as shown to the user.
    pub fn artist(&self) -> &str {
        self.owner_name
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or("Inconnu")
    }

    pub fn duration_seconds(&self) -> Option<f64> {
        self.duration.as_ref().and_then(MediaDuration::seconds)
    }
}

/// The catalog reports durations either as a display string ("3:45") or as
/// a number of seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MediaDuration {
    Seconds(f64),
    Display(String),
}

impl MediaDuration {
    pub fn seconds(&self) -> Option<f64> {
        match self {
            MediaDuration::Seconds(s) if s.is_finite() && *s >= 0.0 => Some(*s),
            MediaDuration::Seconds(_) => None,
            MediaDuration::Display(text) => parse_clock(text),
        }
    }
}

/// Parse `ss`, `m:ss` or `h:mm:ss`.
fn parse_clock(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let mut total = 0.0;
    for part in text.split(':') {
        let value: f64 = part.trim().parse().ok()?;
        if value < 0.0 {
            return None;
        }
        total = total * 60.0 + value;
    }
    Some(total)
}

/// Format seconds as `m:ss` the way the player displays elapsed time.
pub fn format_time(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return "0:00".to_string();
    }
    let mins = (seconds / 60.0).floor() as u64;
    let secs = (seconds % 60.0).floor() as u64;
    format!("{}:{:02}", mins, secs)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Series {
    #[serde(deserialize_with = "string_or_number")]
    pub series_id: String,
    #[serde(default)]
    pub season_name: String,
    #[serde(default)]
    pub episode_count: u32,
}

impl Series {
    pub fn new(series_id: &str, season_name: &str, episode_count: u32) -> Self {
        Self {
            series_id: series_id.to_string(),
            season_name: season_name.to_string(),
            episode_count,
        }
    }

    /// First number in the season name, used for ordering.
    pub fn season_number(&self) -> u32 {
        let digits: String = self
            .season_name
            .chars()
            .skip_while(|c| !c.is_ascii_digit())
            .take_while(|c| c.is_ascii_digit())
            .collect();
        digits.parse().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Episode {
    pub episode_number: u32,
    pub record: VideoRecord,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}

fn lenient_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}
