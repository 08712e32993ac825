/*!
 * Error type for the HTTP layer.
 *
 * Device failures are rendered as an [`OperationResult`] body with a status
 * code chosen by failure kind, so clients can tell bad input, a missing or
 * broken instrument, a timeout and an unsupported feature apart.
 */
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tracing::{debug, warn};

use model240_devices::DeviceError;

use crate::schemas::OperationResult;

/// Error type for request handlers
#[derive(Error, Debug)]
pub enum ApiError {
    /// A device operation failed
    #[error(transparent)]
    Device(#[from] DeviceError),

    /// The request could not be decoded
    #[error("{message}")]
    Malformed {
        /// Status chosen by the extractor
        status: StatusCode,
        /// What was wrong with the request
        message: String,
    },
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::Malformed {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Malformed {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Malformed {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

/// Result type for request handlers
pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl ApiError {
    /// Status code for this error
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Device(err) => match err {
                DeviceError::InvalidChannel(_)
                | DeviceError::InvalidIndex(_)
                | DeviceError::InvalidBrightness(_) => StatusCode::BAD_REQUEST,
                DeviceError::NotConnected
                | DeviceError::ConnectionFailure(_)
                | DeviceError::CommunicationError(_)
                | DeviceError::UpdateFailed(_) => StatusCode::SERVICE_UNAVAILABLE,
                DeviceError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
                DeviceError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            },
            ApiError::Malformed { status, .. } => *status,
        }
    }

    fn summary(&self) -> &'static str {
        match self {
            ApiError::Device(err) => match err {
                DeviceError::NotConnected => "Device not connected",
                DeviceError::InvalidChannel(_) => "Invalid channel",
                DeviceError::InvalidIndex(_) => "Invalid curve data point index",
                DeviceError::InvalidBrightness(_) => "Invalid brightness",
                DeviceError::ConnectionFailure(_) => "Connection failure",
                DeviceError::CommunicationError(_) => "Device communication error",
                DeviceError::UpdateFailed(_) => "Update failed",
                DeviceError::NotImplemented(_) => "Not implemented",
                DeviceError::Timeout(_) => "Device timeout",
            },
            ApiError::Malformed { .. } => "Invalid request",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!("Request failed with {}: {}", status, self);
        } else {
            debug!("Request rejected with {}: {}", status, self);
        }

        let body = OperationResult::failure(self.summary(), self.to_string());
        (status, Json(body)).into_response()
    }
}
