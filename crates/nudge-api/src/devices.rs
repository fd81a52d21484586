use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
    response::IntoResponse,
};

use nudge_types::api::{
    Claims, RegisterDeviceRequest, RegisterDeviceResponse, SendTestResponse,
    UnregisterDeviceRequest, UnregisterDeviceResponse,
};

use crate::auth::AppState;
use crate::error::ApiError;

/// POST /api/push/subscribe — register (or refresh) this browser's push
/// subscription for the authenticated user.
pub async fn register_device(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    body: Result<Json<RegisterDeviceRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = body.map_err(|e| ApiError::BadRequest(format!("invalid request body: {e}")))?;

    let outcome = state
        .registry
        .register(claims.sub, &req.subscription, req.browser)
        .await?;

    Ok(Json(RegisterDeviceResponse {
        success: true,
        created: outcome.created,
        device_id: outcome.device_id,
    }))
}

/// DELETE /api/push/unsubscribe — ownership-scoped removal. `deleted` is
/// false both for an unknown endpoint and for someone else's endpoint.
pub async fn unregister_device(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    body: Result<Json<UnregisterDeviceRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = body.map_err(|e| ApiError::BadRequest(format!("invalid request body: {e}")))?;

    let deleted = state.registry.unregister(claims.sub, &req.endpoint).await?;

    Ok(Json(UnregisterDeviceResponse {
        success: true,
        deleted,
    }))
}

/// POST /api/push/test — fan a test notification out to every active device
/// of the authenticated user.
pub async fn send_test_notification(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let devices_count = state.dispatcher.send_test(claims.sub).await?;

    Ok(Json(SendTestResponse {
        success: true,
        devices_count,
        message: "Test notification sent".to_string(),
    }))
}
