use crate::audio::element::MediaElement;
use crate::commands::{format_listing, format_record, listing_item};
use crate::error::{AppError, AppResult};
use crate::events::PlayerEvent;
use crate::AppState;
use std::sync::atomic::Ordering;

/// Toggle a favorite: listing item `n`, or the current record.
pub async fn toggle<E: MediaElement>(state: &AppState<E>, n: Option<usize>) -> AppResult<String> {
    let record = match n {
        Some(n) => listing_item(state, n).await?,
        None => state
            .engine
            .lock()
            .await
            .current()
            .cloned()
            .ok_or_else(|| AppError::NotFound("Nothing is playing".into()))?,
    };

    let favorite = state
        .favorites
        .lock()
        .await
        .toggle_and_persist(&record, &state.store);
    state.events.emit(PlayerEvent::FavoriteToggled {
        video_id: record.video_id.clone(),
        favorite,
    });
    Ok(if favorite {
        format!("♥ {}", record.title)
    } else {
        format!("Removed {} from favorites", record.title)
    })
}

pub async fn list<E: MediaElement>(state: &AppState<E>) -> AppResult<String> {
    let records: Vec<_> = state.favorites.lock().await.records().cloned().collect();
    let text = format_listing(&records);
    *state.listing.lock().await = records;
    Ok(text)
}

pub async fn history<E: MediaElement>(state: &AppState<E>) -> AppResult<String> {
    let history = state.history.lock().await;
    if history.is_empty() {
        return Ok("History is empty".to_string());
    }
    Ok(history
        .entries()
        .iter()
        .map(|entry| {
            let when = chrono::DateTime::from_timestamp_millis(entry.watched_at)
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default();
            format!("{}  {}", when, format_record(&entry.record))
        })
        .collect::<Vec<_>>()
        .join("\n"))
}

pub async fn clear_history<E: MediaElement>(state: &AppState<E>) -> AppResult<String> {
    state.history.lock().await.clear(&state.store);
    Ok("History cleared".to_string())
}

pub async fn presence<E: MediaElement>(state: &AppState<E>, enabled: bool) -> AppResult<String> {
    state.store.set_presence_enabled(enabled);
    state.presence_enabled.store(enabled, Ordering::Relaxed);
    Ok(format!("Presence {}", if enabled { "on" } else { "off" }))
}
