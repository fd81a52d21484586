use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

use nudge_push::{DispatchError, RegistryError};

/// The error message for a test send with nothing to deliver to.
pub const NO_ACTIVE_DEVICES: &str =
    "No active devices found. Please enable notifications first.";

/// Boundary error type for the push handlers. Only recognized kinds turn
/// into specific responses; everything else is logged and collapsed into a
/// generic 500 so internals never leak to the client.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".to_string(),
            ),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::InvalidSubscription(reason) => {
                ApiError::BadRequest(format!("invalid subscription: {reason}"))
            }
            RegistryError::Store(e) => {
                error!("Registry store failure: {:#}", e);
                ApiError::Internal
            }
        }
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::NoActiveDevices => ApiError::BadRequest(NO_ACTIVE_DEVICES.to_string()),
            DispatchError::Store(e) => {
                error!("Dispatch store failure: {:#}", e);
                ApiError::Internal
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_request_maps_to_400() {
        let resp = ApiError::BadRequest("nope".to_string()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn store_failures_collapse_to_generic_500() {
        let err: ApiError = RegistryError::Store(anyhow::anyhow!("secret detail")).into();
        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn no_active_devices_is_a_client_error() {
        let err: ApiError = DispatchError::NoActiveDevices.into();
        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
