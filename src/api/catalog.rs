//! Catalog operations. Every listing call folds transport and service
//! failures into an empty result; callers never see a raw transport error.

use crate::api::client::CatalogClient;
use crate::api::locators::Locators;
use crate::api::models::{
    EpisodesEnvelope, Episode, MediaDuration, MediaEnvelope, RawEpisode, Series, SeriesEnvelope,
    VideoRecord,
};
use crate::error::AppResult;
use rand::seq::SliceRandom;
use serde::Serialize;

const SERIES_PATH: &str = "/kikiskothek-api/";
const RANDOM_POOL_SIZE: u32 = 50;

/// A page of catalog results. `success == false` means the request failed
/// and `videos` is empty.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CatalogPage {
    pub success: bool,
    pub videos: Vec<VideoRecord>,
}

impl CatalogPage {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.videos.is_empty()
    }

    fn from_envelope(envelope: MediaEnvelope) -> Self {
        match envelope.videos {
            Some(videos) if envelope.success => Self {
                success: true,
                videos,
            },
            _ => Self::empty(),
        }
    }

    fn from_result(context: &str, result: AppResult<MediaEnvelope>) -> Self {
        match result {
            Ok(envelope) => Self::from_envelope(envelope),
            Err(e) => {
                log::warn!("[catalog] {} failed: {}", context, e);
                Self::empty()
            }
        }
    }
}

impl CatalogClient {
    pub async fn list(&self, limit: u32, offset: u32) -> CatalogPage {
        let (limit, offset) = (limit.to_string(), offset.to_string());
        let result = self
            .get_api(
                "/media/getPublicMedia.php",
                &[("limit", &limit), ("offset", &offset)],
            )
            .await;
        CatalogPage::from_result("list", result)
    }

    pub async fn most_viewed(&self, limit: u32, offset: u32) -> CatalogPage {
        let (limit, offset) = (limit.to_string(), offset.to_string());
        let result = self
            .get_api(
                "/media/getMostViewedMedia.php",
                &[("limit", &limit), ("offset", &offset)],
            )
            .await;
        CatalogPage::from_result("most viewed", result)
    }

    /// Random selection from the first public page, excluding `exclude`.
    pub async fn random_media(&self, limit: usize, exclude: &[String]) -> CatalogPage {
        let page = self.list(RANDOM_POOL_SIZE, 0).await;
        if !page.success {
            return CatalogPage::empty();
        }
        let mut available: Vec<VideoRecord> = page
            .videos
            .into_iter()
            .filter(|v| !exclude.contains(&v.video_id))
            .collect();
        available.shuffle(&mut rand::thread_rng());
        available.truncate(limit);
        CatalogPage {
            success: true,
            videos: available,
        }
    }

    pub async fn search(&self, query: &str) -> CatalogPage {
        let query = query.trim();
        if query.is_empty() {
            return CatalogPage::empty();
        }
        let result = self
            .get_api("/search/autocomplete.php", &[("q", query)])
            .await;
        CatalogPage::from_result("search", result)
    }

    /// Season listing, newest first. Falls back to the built-in table when
    /// the service is unavailable.
    pub async fn series_list(&self) -> Vec<Series> {
        let series = match self.get_base::<SeriesEnvelope>(SERIES_PATH, &[]).await {
            Ok(SeriesEnvelope {
                success: true,
                seasons: Some(seasons),
            }) if !seasons.is_empty() => seasons,
            Ok(_) => fallback_series(),
            Err(e) => {
                log::warn!("[catalog] Failed to fetch seasons: {}", e);
                fallback_series()
            }
        };
        sort_series(series)
    }

    pub async fn episodes(&self, series_id: &str) -> Vec<Episode> {
        match self
            .get_base::<EpisodesEnvelope>(SERIES_PATH, &[("season", series_id)])
            .await
        {
            Ok(EpisodesEnvelope {
                success: true,
                episodes: Some(raw),
            }) => normalize_episodes(series_id, raw, self.locators()),
            Ok(_) => Vec::new(),
            Err(e) => {
                log::warn!("[catalog] Failed to fetch episodes for {}: {}", series_id, e);
                Vec::new()
            }
        }
    }

    /// Report a view. Callers treat this as best effort.
    pub async fn track_view(&self, video_id: &str) -> AppResult<()> {
        let _: serde_json::Value = self
            .get_api("/media/trackView.php", &[("video_id", video_id)])
            .await?;
        Ok(())
    }
}

pub fn fallback_series() -> Vec<Series> {
    vec![
        Series::new("10", "Saison 10", 0),
        Series::new("9", "Saison 9", 1),
        Series::new("8", "Saison 8", 15),
        Series::new("7", "Saison 7", 23),
        Series::new("6", "Saison 6", 15),
        Series::new("5", "Saison 5", 16),
        Series::new("4", "Saison 4", 15),
        Series::new("3", "Saison 3", 14),
        Series::new("2", "Saison 2", 15),
        Series::new("1", "Saison 1", 13),
        Series::new("kalandar", "Kalandar", 25),
        Series::new("autre", "Autre", 34),
    ]
}

fn sort_series(mut series: Vec<Series>) -> Vec<Series> {
    series.sort_by(|a, b| b.season_number().cmp(&a.season_number()));
    series
}

fn normalize_episodes(series_id: &str, raw: Vec<RawEpisode>, locators: &Locators) -> Vec<Episode> {
    raw.into_iter()
        .enumerate()
        .map(|(i, ep)| {
            let thumbnail = ep
                .thumbnail
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| locators.thumbnail(&ep.video_id));
            let record = VideoRecord {
                video_id: ep.video_id,
                title: ep.title,
                owner_name: Some(
                    ep.owner_name
                        .filter(|o| !o.is_empty())
                        .unwrap_or_else(|| format!("Saison {}", series_id)),
                ),
                thumbnail: Some(thumbnail),
                duration: Some(
                    ep.duration
                        .unwrap_or_else(|| MediaDuration::Display("0:00".into())),
                ),
                views: None,
            };
            Episode {
                episode_number: ep.episode_number.unwrap_or(i as u32 + 1),
                record,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use std::sync::Arc;

    #[test]
    fn failed_envelope_is_empty() {
        let envelope: MediaEnvelope =
            serde_json::from_str(r#"{"success": false, "videos": [{"video_id": "a"}]}"#).unwrap();
        let page = CatalogPage::from_envelope(envelope);
        assert!(!page.success);
        assert!(page.is_empty());

        let envelope: MediaEnvelope = serde_json::from_str(r#"{"success": true}"#).unwrap();
        assert!(CatalogPage::from_envelope(envelope).is_empty());
    }

    #[test]
    fn series_sort_newest_first() {
        let sorted = sort_series(vec![
            Series::new("2", "Saison 2", 15),
            Series::new("autre", "Autre", 34),
            Series::new("10", "Saison 10", 0),
        ]);
        let ids: Vec<_> = sorted.iter().map(|s| s.series_id.as_str()).collect();
        assert_eq!(ids, vec!["10", "2", "autre"]);
    }

    #[test]
    fn episodes_get_defaults() {
        let locators = Locators::new(&AppConfig::default());
        let raw: Vec<RawEpisode> = serde_json::from_str(
            r#"[{"video_id": "e1", "title": "Pilot"}, {"video_id": "e2", "title": "Two", "episode_number": 7, "duration": "4:00"}]"#,
        )
        .unwrap();
        let episodes = normalize_episodes("8", raw, &locators);

        assert_eq!(episodes[0].episode_number, 1);
        assert_eq!(episodes[0].record.artist(), "Saison 8");
        assert_eq!(
            episodes[0].record.thumbnail.as_deref(),
            Some(locators.thumbnail("e1").as_str())
        );
        assert_eq!(episodes[0].record.duration_seconds(), Some(0.0));
        assert_eq!(episodes[1].episode_number, 7);
        assert_eq!(episodes[1].record.duration_seconds(), Some(240.0));
    }

    #[tokio::test]
    async fn unreachable_service_means_no_results() {
        let config = AppConfig {
            api_base_url: "http://127.0.0.1:1".into(),
            request_timeout_secs: 2,
            ..AppConfig::default()
        };
        let client = CatalogClient::new(Arc::new(config)).unwrap();

        assert!(client.list(20, 0).await.is_empty());
        assert!(client.search("kiki").await.is_empty());
        assert!(client.episodes("8").await.is_empty());
        assert_eq!(client.series_list().await.len(), fallback_series().len());
        assert!(client.track_view("abc").await.is_err());
    }
}
