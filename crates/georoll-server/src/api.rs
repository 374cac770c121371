//! HTTP API routes and handlers.
//!
//! This module contains all HTTP endpoint implementations organized by domain:
//! - `health` - Service health checks
//! - `sessions` - Class session lifecycle
//! - `attendance` - Check-in, distance preview and attendance reports
//! - `error` - API error types
//! - `openapi` - OpenAPI specification generation

use axum::Router;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::SharedState;

pub mod attendance;
pub mod error;
pub mod health;
pub mod openapi;
pub mod sessions;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use openapi::{get_openapi_json, ApiDoc};

/// Creates the combined API router with all endpoints.
///
/// # Route Structure
///
/// ```text
/// /health                                  - Health check
/// /docs                                    - Swagger UI
/// /api
/// ├── /openapi.json                        - OpenAPI specification
/// ├── /courses/{course_id}/sessions        - List and create sessions
/// ├── /courses/{course_id}/sessions/open   - Currently open session
/// ├── /courses/{course_id}/checkin         - Check in to the open session
/// ├── /courses/{course_id}/attendance      - Course totals
/// ├── /sessions/{session_id}               - Session detail
/// ├── /sessions/{session_id}/start         - Open for check-ins
/// ├── /sessions/{session_id}/end           - Close
/// ├── /sessions/{session_id}/checkin       - Check in
/// ├── /sessions/{session_id}/distance      - Live distance preview
/// ├── /sessions/{session_id}/attendance    - Records and head count
/// └── /students/{student_id}/attendance    - History and statistics
/// ```
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(sessions::router())
        .merge(attendance::router())
        .merge(openapi::swagger_ui())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
