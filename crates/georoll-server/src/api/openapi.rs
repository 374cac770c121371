//! OpenAPI specification generation for the georoll API.
//!
//! The document is served at `/api/openapi.json`, browsable at `/docs`, and
//! written to disk by the `gen-openapi` binary for client generation.

use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use super::attendance::{
    CheckInRequest, CheckInResponse, CourseAttendanceResponse, LocationInput,
    SessionAttendanceResponse, StudentAttendanceResponse,
};
use super::error::ErrorResponse;
use super::sessions::{CreateSessionRequest, SessionListResponse, SessionResponse};
use georoll_core::{
    AttendanceOutcome, AttendanceRecord, Coordinate, CourseSummary, DistanceReport,
    HealthResponse, LocationFailure, SessionStatus, SessionSummary, StudentStatistics,
};

/// Path the OpenAPI document is served from.
pub const OPENAPI_PATH: &str = "/api/openapi.json";

/// Path of the Swagger UI.
pub const DOCS_PATH: &str = "/docs";

/// Swagger UI serving the document at [`OPENAPI_PATH`].
#[must_use]
pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new(DOCS_PATH).url(OPENAPI_PATH, ApiDoc::openapi())
}

/// Returns the OpenAPI specification as a pretty-printed JSON string.
///
/// # Errors
///
/// Returns an error if the document cannot be serialized.
pub fn get_openapi_json() -> Result<String, serde_json::Error> {
    ApiDoc::openapi().to_pretty_json()
}

/// Main OpenAPI document structure for georoll.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "georoll API",
        version = "0.1.0",
        description = r#"
# georoll API

georoll records class attendance by checking that students are physically present.

## Overview

1. **Sessions**: An instructor creates a session with a class location, a
   check-in radius and a time window, then starts it.
2. **Check-in**: A student submits a location fix. It is accepted when the
   session is open and the student is within the radius. Check-ins more than
   the grace period after the window start are recorded as late.
3. **Attendance**: Instructors see head counts per session; students see their
   history and attendance rate.

Each student can check in to a session once. A course has at most one open
session, and a session stops accepting check-ins at the end of its window.
"#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "/", description = "Local georoll server")
    ),
    tags(
        (name = "system", description = "Health checks"),
        (name = "sessions", description = "Class session lifecycle"),
        (name = "attendance", description = "Geofenced check-in and attendance records")
    ),
    paths(
        super::health::health_check,
        super::sessions::list_sessions,
        super::sessions::create_session,
        super::sessions::get_open_session,
        super::sessions::get_session,
        super::sessions::start_session,
        super::sessions::end_session,
        super::attendance::check_in,
        super::attendance::check_in_to_course,
        super::attendance::get_distance,
        super::attendance::get_session_attendance,
        super::attendance::get_student_attendance,
        super::attendance::get_course_attendance,
    ),
    components(
        schemas(
            ErrorResponse,
            HealthResponse,
            // Session types
            SessionResponse,
            SessionListResponse,
            CreateSessionRequest,
            SessionStatus,
            // Check-in types
            Coordinate,
            LocationInput,
            LocationFailure,
            CheckInRequest,
            CheckInResponse,
            DistanceReport,
            // Attendance types
            AttendanceOutcome,
            AttendanceRecord,
            SessionAttendanceResponse,
            StudentAttendanceResponse,
            CourseAttendanceResponse,
            SessionSummary,
            StudentStatistics,
            CourseSummary,
        )
    )
)]
pub struct ApiDoc;
