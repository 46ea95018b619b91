use crate::audio::element::MediaElement;
use crate::audio::queue::RepeatMode;
use crate::commands::{format_record, listing_item};
use crate::error::{AppError, AppResult};
use crate::AppState;

pub async fn add<E: MediaElement>(state: &AppState<E>, n: usize) -> AppResult<String> {
    let record = listing_item(state, n).await?;
    let added = state.engine.lock().await.add_to_queue(record.clone());
    Ok(if added {
        format!("Queued {}", record.title)
    } else {
        format!("{} is already queued", record.title)
    })
}

pub async fn next_up<E: MediaElement>(state: &AppState<E>, n: usize) -> AppResult<String> {
    let record = listing_item(state, n).await?;
    state.engine.lock().await.add_to_queue_next(record.clone());
    Ok(format!("{} plays next", record.title))
}

pub async fn show<E: MediaElement>(state: &AppState<E>) -> AppResult<String> {
    let engine = state.engine.lock().await;
    let queue = engine.queue();
    if queue.is_empty() {
        return Ok("Queue is empty".to_string());
    }
    let current = queue.current_index();
    Ok(queue
        .records()
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let marker = if Some(i) == current { ">" } else { " " };
            format!("{} {:>3}. {}", marker, i + 1, format_record(r))
        })
        .collect::<Vec<_>>()
        .join("\n"))
}

fn queue_index(position: usize) -> AppResult<usize> {
    position
        .checked_sub(1)
        .ok_or_else(|| AppError::InvalidCommand("queue positions start at 1".into()))
}

pub async fn remove<E: MediaElement>(state: &AppState<E>, position: usize) -> AppResult<String> {
    let index = queue_index(position)?;
    match state.engine.lock().await.remove_at(index) {
        Some(record) => Ok(format!("Removed {}", record.title)),
        None => Err(AppError::NotFound(format!("No queue entry {}", position))),
    }
}

pub async fn move_item<E: MediaElement>(state: &AppState<E>, from: usize, to: usize) -> AppResult<String> {
    let (from, to) = (queue_index(from)?, queue_index(to)?);
    if state.engine.lock().await.move_item(from, to) {
        Ok("Moved".to_string())
    } else {
        Err(AppError::NotFound("Queue position out of range".into()))
    }
}

pub async fn clear<E: MediaElement>(state: &AppState<E>) -> AppResult<String> {
    state.engine.lock().await.clear();
    Ok("Queue cleared".to_string())
}

pub async fn shuffle<E: MediaElement>(state: &AppState<E>) -> AppResult<String> {
    let on = state.engine.lock().await.toggle_shuffle();
    Ok(format!("Shuffle {}", if on { "on" } else { "off" }))
}

pub async fn repeat<E: MediaElement>(state: &AppState<E>) -> AppResult<String> {
    let mode = state.engine.lock().await.cycle_repeat_mode();
    Ok(match mode {
        RepeatMode::Off => "Repeat off",
        RepeatMode::All => "Repeat all",
        RepeatMode::One => "Repeat one",
    }
    .to_string())
}
