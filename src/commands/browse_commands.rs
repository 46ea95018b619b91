use crate::api::models::VideoRecord;
use crate::audio::element::MediaElement;
use crate::commands::remember_listing;
use crate::error::AppResult;
use crate::AppState;
use rand::seq::SliceRandom;

const MOST_VIEWED_LIMIT: u32 = 8;
const RANDOM_LIMIT: usize = 12;

pub async fn list<E: MediaElement>(state: &AppState<E>, limit: u32, offset: u32) -> AppResult<String> {
    let page = state.catalog.list(limit, offset).await;
    Ok(remember_listing(state, page.videos).await)
}

pub async fn top<E: MediaElement>(state: &AppState<E>) -> AppResult<String> {
    let page = state.catalog.most_viewed(MOST_VIEWED_LIMIT, 0).await;
    Ok(remember_listing(state, page.videos).await)
}

/// Random picks, skipping whatever is already queued.
pub async fn random<E: MediaElement>(state: &AppState<E>) -> AppResult<String> {
    let exclude: Vec<String> = {
        let engine = state.engine.lock().await;
        engine
            .queue()
            .records()
            .iter()
            .map(|r| r.video_id.clone())
            .collect()
    };
    let page = state.catalog.random_media(RANDOM_LIMIT, &exclude).await;
    Ok(remember_listing(state, page.videos).await)
}

pub async fn series<E: MediaElement>(state: &AppState<E>) -> AppResult<String> {
    let series = state.catalog.series_list().await;
    Ok(series
        .iter()
        .map(|s| format!("{:>10}  {} ({} episodes)", s.series_id, s.season_name, s.episode_count))
        .collect::<Vec<_>>()
        .join("\n"))
}

pub async fn episodes<E: MediaElement>(state: &AppState<E>, series_id: &str) -> AppResult<String> {
    let records: Vec<VideoRecord> = state
        .catalog
        .episodes(series_id)
        .await
        .into_iter()
        .map(|e| e.record)
        .collect();
    Ok(remember_listing(state, records).await)
}

/// Queue a shuffled selection of a season, capped at the configured queue
/// size, and start playing it.
pub async fn mix<E: MediaElement>(state: &AppState<E>, series_id: &str) -> AppResult<String> {
    let mut records: Vec<VideoRecord> = state
        .catalog
        .episodes(series_id)
        .await
        .into_iter()
        .map(|e| e.record)
        .collect();
    if records.is_empty() {
        return Ok("No results".to_string());
    }

    let max = state.settings.read().await.max_queue_size.max(1);
    records.shuffle(&mut rand::thread_rng());
    records.truncate(max);
    let count = records.len();

    state.engine.lock().await.set_queue(records, true).await;
    Ok(format!("Queued {} episodes", count))
}
