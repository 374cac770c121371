//! API error types and response handling.
//!
//! This module provides a unified error type for all API handlers
//! with automatic conversion to appropriate HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use georoll_core::{GeoRollError, Verdict};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Result type alias for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type.
///
/// Each variant maps to a specific HTTP status code and produces a
/// consistent JSON error response.
#[derive(Debug, Clone)]
pub enum ApiError {
    /// 400 Bad Request - Invalid input from client.
    BadRequest {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
    },

    /// 403 Forbidden - The request is understood but refused, e.g. the
    /// student is outside the geofence.
    Forbidden {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
        /// Optional structured details.
        details: Option<serde_json::Value>,
    },

    /// 404 Not Found - Resource does not exist.
    NotFound {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
    },

    /// 409 Conflict - Operation cannot be completed due to current state.
    Conflict {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
    },

    /// 422 Unprocessable Entity - Well-formed input with invalid values.
    Unprocessable {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
    },

    /// 500 Internal Server Error - Unexpected server-side error.
    InternalError {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
        /// Optional details (not exposed to client in production).
        details: Option<String>,
    },
}

/// Standard JSON error response body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "out_of_range",
    "message": "You are 1112m away from the class location. You need to be within 50m to check in.",
    "details": { "distance": 1112, "required_radius": 50.0 }
}))]
pub struct ErrorResponse {
    /// Machine-readable error code (e.g., "no_active_session").
    #[schema(example = "no_active_session")]
    pub error: String,

    /// Human-readable error message.
    #[schema(example = "There is no active session to check in to.")]
    pub message: String,

    /// Optional additional details.
    #[schema(nullable)]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// The HTTP error for a check-in verdict that did not produce a record.
    ///
    /// Returns `None` for [`Verdict::Accepted`].
    #[must_use]
    pub fn from_rejection(verdict: &Verdict) -> Option<Self> {
        let error_code = verdict.code().to_string();
        let message = verdict.message();

        match verdict {
            Verdict::Accepted(_) => None,
            Verdict::NoActiveSession => Some(Self::Conflict {
                error_code,
                message,
            }),
            Verdict::LocationUnavailable => Some(Self::BadRequest {
                error_code,
                message,
            }),
            Verdict::InvalidLocation(_) => Some(Self::Unprocessable {
                error_code,
                message,
            }),
            Verdict::OutOfRange {
                distance_meters,
                radius_meters,
            } => Some(Self::Forbidden {
                error_code,
                message,
                details: Some(serde_json::json!({
                    "distance": distance_meters.round(),
                    "required_radius": radius_meters,
                })),
            }),
        }
    }

    /// HTTP status this error is reported with.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Unprocessable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_response = match self {
            Self::BadRequest { error_code, message }
            | Self::NotFound { error_code, message }
            | Self::Conflict { error_code, message }
            | Self::Unprocessable { error_code, message } => ErrorResponse {
                error: error_code,
                message,
                details: None,
            },

            Self::Forbidden {
                error_code,
                message,
                details,
            } => ErrorResponse {
                error: error_code,
                message,
                details,
            },

            Self::InternalError {
                error_code,
                message,
                details,
            } => {
                tracing::error!(
                    error_code = %error_code,
                    message = %message,
                    details = ?details,
                    "Internal server error"
                );

                ErrorResponse {
                    error: error_code,
                    message,
                    details: details.map(|d| serde_json::json!(d)),
                }
            }
        };

        (status, Json(error_response)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadRequest { message, .. } => write!(f, "Bad Request: {message}"),
            Self::Forbidden { message, .. } => write!(f, "Forbidden: {message}"),
            Self::NotFound { message, .. } => write!(f, "Not Found: {message}"),
            Self::Conflict { message, .. } => write!(f, "Conflict: {message}"),
            Self::Unprocessable { message, .. } => write!(f, "Unprocessable: {message}"),
            Self::InternalError { message, .. } => write!(f, "Internal Error: {message}"),
        }
    }
}

impl std::error::Error for ApiError {}

/// Convert from georoll_core errors.
impl From<GeoRollError> for ApiError {
    fn from(err: GeoRollError) -> Self {
        let error_code = err.error_code().to_lowercase();
        let message = err.to_string();

        match err.http_status_code() {
            400 => Self::BadRequest {
                error_code,
                message,
            },
            404 => Self::NotFound {
                error_code,
                message,
            },
            409 => Self::Conflict {
                error_code,
                message,
            },
            422 => Self::Unprocessable {
                error_code,
                message,
            },
            _ => Self::InternalError {
                error_code,
                message,
                details: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use georoll_core::{GeoError, SessionId, StudentId};

    #[test]
    fn test_bad_request_error() {
        let err = ApiError::BadRequest {
            error_code: "test_error".to_string(),
            message: "Test message".to_string(),
        };
        assert!(err.to_string().contains("Bad Request"));
    }

    #[test]
    fn test_error_response_serialization() {
        let response = ErrorResponse {
            error: "test_error".to_string(),
            message: "Test message".to_string(),
            details: None,
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("test_error"));
    }

    #[test]
    fn test_rejections_map_to_status_codes() {
        let cases = [
            (Verdict::NoActiveSession, StatusCode::CONFLICT),
            (Verdict::LocationUnavailable, StatusCode::BAD_REQUEST),
            (
                Verdict::InvalidLocation(GeoError::LatitudeOutOfRange { latitude: 91.0 }),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                Verdict::OutOfRange {
                    distance_meters: 1111.9,
                    radius_meters: 50.0,
                },
                StatusCode::FORBIDDEN,
            ),
        ];

        for (verdict, status) in cases {
            let err = ApiError::from_rejection(&verdict).unwrap();
            assert_eq!(err.status_code(), status, "{verdict:?}");
        }
    }

    #[test]
    fn test_out_of_range_carries_distance_details() {
        let err = ApiError::from_rejection(&Verdict::OutOfRange {
            distance_meters: 1111.9,
            radius_meters: 50.0,
        })
        .unwrap();

        match err {
            ApiError::Forbidden { details, .. } => {
                let details = details.unwrap();
                assert_eq!(details["distance"], 1112.0);
                assert_eq!(details["required_radius"], 50.0);
            }
            other => panic!("expected Forbidden, got {other:?}"),
        }
    }

    #[test]
    fn test_core_errors_keep_their_status() {
        let duplicate = ApiError::from(GeoRollError::DuplicateAttendance {
            session_id: SessionId::new(),
            student_id: StudentId::new("alice"),
        });
        assert_eq!(duplicate.status_code(), StatusCode::CONFLICT);

        let missing = ApiError::from(GeoRollError::SessionNotFound(SessionId::new()));
        assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);

        let io = ApiError::from(GeoRollError::IoError(std::io::Error::other("disk full")));
        assert_eq!(io.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
