use crate::audio::element::MediaElement;
use crate::commands::remember_listing;
use crate::error::AppResult;
use crate::AppState;

pub async fn search<E: MediaElement>(state: &AppState<E>, query: &str) -> AppResult<String> {
    let page = state.catalog.search(query.trim()).await;
    Ok(remember_listing(state, page.videos).await)
}
