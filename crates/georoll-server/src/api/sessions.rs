//! Class session API endpoints.
//!
//! Instructors create a session for a course with a geofence and a time
//! window, then start it to accept check-ins. A session closes when ended or
//! once its window is over. Only one session per course can be open.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Duration, Utc};
use georoll_core::{
    ClassSession, Coordinate, CourseId, InstructorId, NewSession, SessionId, SessionStatus,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::error::{ApiError, ApiResult};
use crate::state::SharedState;

/// Window length used when a create request gives neither an end nor a duration.
pub const DEFAULT_DURATION_MINUTES: u32 = 60;

/// Creates the sessions router with all endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route(
            "/api/courses/{course_id}/sessions",
            get(list_sessions).post(create_session),
        )
        .route("/api/courses/{course_id}/sessions/open", get(get_open_session))
        .route("/api/sessions/{session_id}", get(get_session))
        .route("/api/sessions/{session_id}/start", post(start_session))
        .route("/api/sessions/{session_id}/end", post(end_session))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// A class session as seen by API clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "id": "01936f4e-8b7a-7c3d-9f21-4a5b6c7d8e9f",
    "course_id": "CS101",
    "instructor_id": "instructor-7",
    "location_name": "Engineering Hall 101",
    "latitude": 40.7128,
    "longitude": -74.006,
    "radius_meters": 50.0,
    "window_start": "2025-01-15T09:00:00Z",
    "window_end": "2025-01-15T10:30:00Z",
    "late_after": "2025-01-15T09:15:00Z",
    "status": "open",
    "created_at": "2025-01-15T08:55:00Z"
}))]
pub struct SessionResponse {
    /// Session identifier.
    pub id: SessionId,

    /// Course the session belongs to.
    pub course_id: CourseId,

    /// Instructor who created the session.
    pub instructor_id: InstructorId,

    /// Human-readable location.
    #[schema(example = "Engineering Hall 101")]
    pub location_name: String,

    /// Geofence center latitude.
    #[schema(example = 40.7128)]
    pub latitude: f64,

    /// Geofence center longitude.
    #[schema(example = json!(-74.006))]
    pub longitude: f64,

    /// Check-in radius in meters.
    #[schema(example = 50.0)]
    pub radius_meters: f64,

    /// Scheduled start.
    pub window_start: DateTime<Utc>,

    /// End of the check-in window.
    pub window_end: DateTime<Utc>,

    /// Check-ins after this instant are recorded as late.
    pub late_after: DateTime<Utc>,

    /// Effective status at the time of the request.
    pub status: SessionStatus,

    /// When the session was created.
    pub created_at: DateTime<Utc>,
}

impl SessionResponse {
    /// Build the response view of `session` as of `now`.
    #[must_use]
    pub fn new(session: &ClassSession, now: DateTime<Utc>, grace_period: Duration) -> Self {
        Self {
            id: session.id,
            course_id: session.course_id.clone(),
            instructor_id: session.instructor_id.clone(),
            location_name: session.location_name.clone(),
            latitude: session.geofence.center.latitude,
            longitude: session.geofence.center.longitude,
            radius_meters: session.geofence.radius_meters,
            window_start: session.window_start,
            window_end: session.window_end,
            late_after: session.late_after(grace_period),
            status: session.status_at(now),
            created_at: session.created_at,
        }
    }
}

/// Sessions of one course.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionListResponse {
    /// Course listed.
    pub course_id: CourseId,

    /// Sessions, most recent window first.
    pub sessions: Vec<SessionResponse>,
}

/// Request body for creating a session.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[schema(example = json!({
    "instructor_id": "instructor-7",
    "location_name": "Engineering Hall 101",
    "latitude": 40.7128,
    "longitude": -74.006,
    "radius_meters": 50.0,
    "duration_minutes": 90,
    "start_now": true
}))]
pub struct CreateSessionRequest {
    /// Instructor creating the session.
    pub instructor_id: InstructorId,

    /// Human-readable location. Must not be blank.
    #[schema(example = "Engineering Hall 101", min_length = 1)]
    pub location_name: String,

    /// Class latitude in degrees.
    #[schema(example = 40.7128, minimum = -90, maximum = 90)]
    pub latitude: f64,

    /// Class longitude in degrees.
    #[schema(example = json!(-74.006), minimum = -180, maximum = 180)]
    pub longitude: f64,

    /// Check-in radius in meters. Defaults to the configured radius.
    #[schema(example = 50.0)]
    pub radius_meters: Option<f64>,

    /// Scheduled start. Defaults to now.
    pub window_start: Option<DateTime<Utc>>,

    /// End of the check-in window. Takes precedence over `duration_minutes`.
    pub window_end: Option<DateTime<Utc>>,

    /// Window length in minutes when `window_end` is omitted. Defaults to 60.
    #[schema(example = 90, minimum = 1)]
    pub duration_minutes: Option<u32>,

    /// Open the session for check-ins immediately.
    #[serde(default)]
    #[schema(example = true)]
    pub start_now: bool,
}

// ============================================================================
// Handlers
// ============================================================================

/// List a course's sessions.
#[utoipa::path(
    get,
    path = "/api/courses/{course_id}/sessions",
    tag = "sessions",
    operation_id = "listSessions",
    summary = "List sessions of a course",
    description = "Returns every session of the course, most recent window first, \
        with each session's effective status.",
    params(("course_id" = String, Path, description = "Course identifier")),
    responses(
        (status = 200, description = "Sessions retrieved", body = SessionListResponse)
    )
)]
pub async fn list_sessions(
    State(state): State<SharedState>,
    Path(course_id): Path<CourseId>,
) -> Json<SessionListResponse> {
    let state_guard = state.read().await;
    let now = Utc::now();
    let grace = state_guard.evaluator.grace_period();

    let sessions = state_guard
        .registry
        .sessions_for_course(&course_id)
        .iter()
        .map(|session| SessionResponse::new(session, now, grace))
        .collect();

    Json(SessionListResponse {
        course_id,
        sessions,
    })
}

/// Create a session, optionally opening it right away.
#[utoipa::path(
    post,
    path = "/api/courses/{course_id}/sessions",
    tag = "sessions",
    operation_id = "createSession",
    summary = "Create a class session",
    description = "Creates a session with a geofence and a time window. With \
        `start_now` the session is opened immediately, which fails if another \
        session of the course is still open.",
    params(("course_id" = String, Path, description = "Course identifier")),
    request_body = CreateSessionRequest,
    responses(
        (status = 201, description = "Session created", body = SessionResponse),
        (status = 400, description = "Empty location name or window", body = crate::api::error::ErrorResponse),
        (status = 409, description = "Window already over or another session open", body = crate::api::error::ErrorResponse),
        (status = 422, description = "Invalid geofence", body = crate::api::error::ErrorResponse)
    )
)]
pub async fn create_session(
    State(state): State<SharedState>,
    Path(course_id): Path<CourseId>,
    Json(request): Json<CreateSessionRequest>,
) -> ApiResult<(StatusCode, Json<SessionResponse>)> {
    let state_guard = state.read().await;
    let now = Utc::now();

    let window_start = request.window_start.unwrap_or(now);
    let window_end = request.window_end.unwrap_or_else(|| {
        let minutes = request.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES);
        window_start + Duration::minutes(i64::from(minutes))
    });

    let mut session = state_guard.registry.create_session(
        NewSession {
            course_id,
            instructor_id: request.instructor_id,
            location_name: request.location_name,
            center: Coordinate::new(request.latitude, request.longitude),
            radius_meters: request.radius_meters,
            window_start,
            window_end,
        },
        now,
    )?;

    if request.start_now {
        session = state_guard.registry.start_session(session.id, now)?;
    }

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse::new(
            &session,
            now,
            state_guard.evaluator.grace_period(),
        )),
    ))
}

/// Get the session of a course that is currently accepting check-ins.
#[utoipa::path(
    get,
    path = "/api/courses/{course_id}/sessions/open",
    tag = "sessions",
    operation_id = "getOpenSession",
    summary = "Get the open session of a course",
    params(("course_id" = String, Path, description = "Course identifier")),
    responses(
        (status = 200, description = "Open session", body = SessionResponse),
        (status = 404, description = "No session is open", body = crate::api::error::ErrorResponse)
    )
)]
pub async fn get_open_session(
    State(state): State<SharedState>,
    Path(course_id): Path<CourseId>,
) -> ApiResult<Json<SessionResponse>> {
    let state_guard = state.read().await;
    let now = Utc::now();

    let session = state_guard
        .registry
        .open_session_for_course(&course_id, now)
        .ok_or_else(|| ApiError::NotFound {
            error_code: "no_active_session".to_string(),
            message: format!("No session of course {course_id} is open"),
        })?;

    Ok(Json(SessionResponse::new(
        &session,
        now,
        state_guard.evaluator.grace_period(),
    )))
}

/// Get one session.
#[utoipa::path(
    get,
    path = "/api/sessions/{session_id}",
    tag = "sessions",
    operation_id = "getSession",
    summary = "Get a session",
    params(("session_id" = String, Path, description = "Session identifier")),
    responses(
        (status = 200, description = "Session retrieved", body = SessionResponse),
        (status = 404, description = "Unknown session", body = crate::api::error::ErrorResponse)
    )
)]
pub async fn get_session(
    State(state): State<SharedState>,
    Path(session_id): Path<SessionId>,
) -> ApiResult<Json<SessionResponse>> {
    let state_guard = state.read().await;
    let session = state_guard
        .registry
        .get(session_id)
        .ok_or(georoll_core::GeoRollError::SessionNotFound(session_id))?;

    Ok(Json(SessionResponse::new(
        &session,
        Utc::now(),
        state_guard.evaluator.grace_period(),
    )))
}

/// Open a session for check-ins.
#[utoipa::path(
    post,
    path = "/api/sessions/{session_id}/start",
    tag = "sessions",
    operation_id = "startSession",
    summary = "Start a session",
    description = "Opens a scheduled session. Starting an open session is a no-op.",
    params(("session_id" = String, Path, description = "Session identifier")),
    responses(
        (status = 200, description = "Session open", body = SessionResponse),
        (status = 404, description = "Unknown session", body = crate::api::error::ErrorResponse),
        (status = 409, description = "Session closed, window over, or another session open", body = crate::api::error::ErrorResponse)
    )
)]
pub async fn start_session(
    State(state): State<SharedState>,
    Path(session_id): Path<SessionId>,
) -> ApiResult<Json<SessionResponse>> {
    let state_guard = state.read().await;
    let now = Utc::now();
    let session = state_guard.registry.start_session(session_id, now)?;

    Ok(Json(SessionResponse::new(
        &session,
        now,
        state_guard.evaluator.grace_period(),
    )))
}

/// Close a session.
#[utoipa::path(
    post,
    path = "/api/sessions/{session_id}/end",
    tag = "sessions",
    operation_id = "endSession",
    summary = "End a session",
    description = "Closes the session. Ending a closed session is a no-op.",
    params(("session_id" = String, Path, description = "Session identifier")),
    responses(
        (status = 200, description = "Session closed", body = SessionResponse),
        (status = 404, description = "Unknown session", body = crate::api::error::ErrorResponse)
    )
)]
pub async fn end_session(
    State(state): State<SharedState>,
    Path(session_id): Path<SessionId>,
) -> ApiResult<Json<SessionResponse>> {
    let state_guard = state.read().await;
    let session = state_guard.registry.end_session(session_id)?;

    Ok(Json(SessionResponse::new(
        &session,
        Utc::now(),
        state_guard.evaluator.grace_period(),
    )))
}
