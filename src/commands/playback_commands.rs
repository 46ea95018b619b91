use crate::api::models::format_time;
use crate::audio::element::MediaElement;
use crate::audio::engine::VolumeIcon;
use crate::bridge::remote::RemoteCommand;
use crate::commands::{format_record, listing_item, SeekTarget};
use crate::error::{AppError, AppResult};
use crate::events::{ControlOwner, PlaybackState};
use crate::AppState;

/// Play item `n` of the last listing, queueing the whole listing from it.
pub async fn play_listing_item<E: MediaElement>(state: &AppState<E>, n: usize) -> AppResult<String> {
    let record = listing_item(state, n).await?;
    let listing = state.listing.lock().await.clone();
    let mut engine = state.engine.lock().await;
    engine.play_from_listing(&listing, record.clone()).await;
    if engine.state() == PlaybackState::Playing {
        Ok(format!("▶ {}", format_record(&record)))
    } else {
        Err(AppError::Stream(format!("Could not start {}", record.title)))
    }
}

pub async fn transport<E: MediaElement>(state: &AppState<E>, command: RemoteCommand) -> AppResult<String> {
    state.bridge.dispatch(command).await;
    status_line(state).await
}

pub async fn volume<E: MediaElement>(state: &AppState<E>, percent: u32) -> AppResult<String> {
    let mut engine = state.engine.lock().await;
    engine.set_volume(percent.min(100) as f32 / 100.0);
    Ok(format!("Volume {}%", (engine.volume() * 100.0).round()))
}

pub async fn mute<E: MediaElement>(state: &AppState<E>) -> AppResult<String> {
    let mut engine = state.engine.lock().await;
    engine.toggle_mute();
    Ok(match engine.volume_icon() {
        VolumeIcon::Muted => "Muted".to_string(),
        VolumeIcon::Audible => format!("Volume {}%", (engine.volume() * 100.0).round()),
    })
}

pub async fn bass<E: MediaElement>(state: &AppState<E>, db: f32) -> AppResult<String> {
    let mut engine = state.engine.lock().await;
    engine.set_bass_boost(db);
    let applied = engine.bass_boost();
    drop(engine);

    let mut settings = state.settings.write().await;
    settings.bass_boost = applied;
    settings.save(&state.store);
    Ok(format!("Bass boost {:.1} dB", applied))
}

pub async fn seek<E: MediaElement>(state: &AppState<E>, target: SeekTarget) -> AppResult<String> {
    let mut engine = state.engine.lock().await;
    match target {
        SeekTarget::Absolute(seconds) => engine.seek(seconds),
        SeekTarget::Relative(delta) => engine.seek_relative(delta),
    }
    Ok(format!(
        "{} / {}",
        format_time(engine.position()),
        format_time(engine.duration())
    ))
}

pub async fn detach<E: MediaElement>(state: &AppState<E>) -> AppResult<String> {
    let companion = (state.companion_factory)();
    state.bridge.detach(companion).await?;
    Ok("Playing in the companion window".to_string())
}

pub async fn expand<E: MediaElement>(state: &AppState<E>) -> AppResult<String> {
    if state.engine.lock().await.owner() != ControlOwner::Companion {
        return Ok("Already playing here".to_string());
    }
    state.bridge.expand().await;
    status_line(state).await
}

async fn status_line<E: MediaElement>(state: &AppState<E>) -> AppResult<String> {
    let engine = state.engine.lock().await;
    let Some(record) = engine.current() else {
        return Ok("Stopped".to_string());
    };
    let symbol = match engine.state() {
        PlaybackState::Playing => "▶",
        PlaybackState::Paused => "⏸",
        PlaybackState::Stopped => "■",
    };
    Ok(format!(
        "{} {} ({} / {})",
        symbol,
        format_record(record),
        format_time(engine.position()),
        format_time(engine.duration())
    ))
}

pub async fn status<E: MediaElement>(state: &AppState<E>) -> AppResult<String> {
    let line = status_line(state).await?;
    let snapshot = state.engine.lock().await.snapshot();
    Ok(format!(
        "{}\nqueue {}/{} · shuffle {} · repeat {:?} · volume {}%{} · bass {:.1} dB · {}",
        line,
        snapshot.current_index.map(|i| i + 1).unwrap_or(0),
        snapshot.queue_len,
        if snapshot.shuffle { "on" } else { "off" },
        snapshot.repeat,
        (snapshot.volume * 100.0).round(),
        if snapshot.muted { " (muted)" } else { "" },
        snapshot.bass_boost,
        match snapshot.owner {
            ControlOwner::Local => "local",
            ControlOwner::Companion => "companion window",
        }
    ))
}
