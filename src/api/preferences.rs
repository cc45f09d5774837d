//! Preference endpoints.

use axum::{extract::State, Json};

use crate::error::Result;
use crate::notification::{NotificationPreferences, PreferencesPatch};
use crate::server::AppState;

/// GET /api/v1/preferences
pub async fn get_preferences(State(state): State<AppState>) -> Json<NotificationPreferences> {
    Json(state.store.preferences())
}

/// PATCH /api/v1/preferences
///
/// Top-level keys only; a `categories` object replaces the whole map.
pub async fn update_preferences(
    State(state): State<AppState>,
    Json(patch): Json<PreferencesPatch>,
) -> Result<Json<NotificationPreferences>> {
    if patch.is_empty() {
        return Ok(Json(state.store.preferences()));
    }

    let preferences = state
        .store
        .run_blocking(move |store| store.update_preferences(patch))
        .await?;
    Ok(Json(preferences))
}
