//! Notification endpoints consumed by dashboard components.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::notification::{Admission, NewNotification, Notification, NotificationGroup, RejectReason};
use crate::server::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationListResponse {
    pub notifications: Vec<Notification>,
    pub unread_count: usize,
}

#[derive(Debug, Serialize)]
pub struct AddNotificationResponse {
    pub admitted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectReason>,
}

impl From<Admission> for AddNotificationResponse {
    fn from(admission: Admission) -> Self {
        match admission {
            Admission::Admitted(id) => Self {
                admitted: true,
                id: Some(id),
                reason: None,
            },
            Admission::Rejected(reason) => Self {
                admitted: false,
                id: None,
                reason: Some(reason),
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadCountResponse {
    pub unread_count: usize,
}

#[derive(Debug, Serialize)]
pub struct UpdatedResponse {
    pub updated: usize,
}

/// GET /api/v1/notifications
pub async fn list_notifications(State(state): State<AppState>) -> Json<NotificationListResponse> {
    let snapshot = state.store.snapshot();
    Json(NotificationListResponse {
        notifications: snapshot.notifications,
        unread_count: snapshot.unread_count,
    })
}

/// POST /api/v1/notifications
///
/// Rejection by preferences is a normal outcome and answers 200, not an error.
pub async fn add_notification(
    State(state): State<AppState>,
    Json(input): Json<NewNotification>,
) -> Result<(StatusCode, Json<AddNotificationResponse>)> {
    if input.title.trim().is_empty() {
        return Err(AppError::Validation("title must not be empty".to_string()));
    }

    let admission = state
        .store
        .run_blocking(move |store| store.add_notification(input))
        .await?;
    let status = if admission.is_admitted() {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((status, Json(admission.into())))
}

/// GET /api/v1/notifications/groups
pub async fn list_groups(State(state): State<AppState>) -> Json<Vec<NotificationGroup>> {
    Json(state.store.grouped_notifications())
}

/// GET /api/v1/notifications/unread-count
pub async fn unread_count(State(state): State<AppState>) -> Json<UnreadCountResponse> {
    Json(UnreadCountResponse {
        unread_count: state.store.unread_count(),
    })
}

/// POST /api/v1/notifications/{id}/read
///
/// Unknown ids are accepted silently.
pub async fn mark_read(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<UpdatedResponse>> {
    let changed = state.store.run_blocking(move |store| store.mark_as_read(id)).await?;
    Ok(Json(UpdatedResponse {
        updated: usize::from(changed),
    }))
}

/// POST /api/v1/notifications/read-all
pub async fn mark_all_read(State(state): State<AppState>) -> Result<Json<UpdatedResponse>> {
    let updated = state.store.run_blocking(|store| store.mark_all_as_read()).await?;
    Ok(Json(UpdatedResponse { updated }))
}

/// DELETE /api/v1/notifications/{id}
///
/// Unknown ids are accepted silently.
pub async fn remove_notification(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    let removed = state
        .store
        .run_blocking(move |store| store.remove_notification(id))
        .await?;
    if removed.is_none() {
        tracing::debug!(notification_id = %id, "Remove requested for unknown notification");
    }
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/notifications
pub async fn clear_all(State(state): State<AppState>) -> Result<StatusCode> {
    state.store.run_blocking(|store| store.clear_all()).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/notifications/{id}/actions/{index}
pub async fn invoke_action(
    State(state): State<AppState>,
    Path((id, index)): Path<(Uuid, usize)>,
) -> Result<StatusCode> {
    state
        .store
        .run_blocking(move |store| store.invoke_action(id, index))
        .await??;
    Ok(StatusCode::NO_CONTENT)
}
