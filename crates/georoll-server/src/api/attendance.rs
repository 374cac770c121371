//! Check-in and attendance API endpoints.
//!
//! Students check in with a location fix taken by their device. The server
//! evaluates the fix against the session's geofence and window, records
//! accepted check-ins once per student, and reports rejections with the
//! reason and, when out of range, how far away the student is.

use std::collections::HashSet;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use georoll_core::{
    current_distance, round_meters, AttendanceOutcome, AttendanceRecord, ClassSession, Coordinate,
    CourseId, CourseSummary, DistanceReport, GeoRollError, LocationFailure, LocationSample,
    SessionId, SessionSummary, StudentId, StudentStatistics, Verdict, DEFAULT_HISTORY_LIMIT,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use crate::api::error::{ApiError, ApiResult, ErrorResponse};
use crate::api::sessions::SessionResponse;
use crate::state::{AppState, SharedState};

/// Largest page a student history request may ask for.
pub const MAX_HISTORY_LIMIT: usize = 200;

/// Creates the attendance router with all endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/api/courses/{course_id}/checkin", post(check_in_to_course))
        .route("/api/courses/{course_id}/attendance", get(get_course_attendance))
        .route("/api/sessions/{session_id}/checkin", post(check_in))
        .route("/api/sessions/{session_id}/distance", post(get_distance))
        .route("/api/sessions/{session_id}/attendance", get(get_session_attendance))
        .route("/api/students/{student_id}/attendance", get(get_student_attendance))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// A location fix reported by the student's device.
#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[schema(example = json!({
    "latitude": 40.71285,
    "longitude": -74.006,
    "accuracy_meters": 8.0,
    "captured_at": "2025-01-15T09:05:00Z"
}))]
pub struct LocationInput {
    /// Latitude in degrees.
    #[schema(example = 40.71285)]
    pub latitude: f64,

    /// Longitude in degrees.
    #[schema(example = json!(-74.006))]
    pub longitude: f64,

    /// Reported accuracy radius in meters.
    #[schema(example = 8.0, minimum = 0.0)]
    pub accuracy_meters: f64,

    /// When the fix was taken. Defaults to the time the request is received.
    pub captured_at: Option<DateTime<Utc>>,
}

impl LocationInput {
    /// Convert to a sample, stamping it with `now` when the client sent no time.
    #[must_use]
    pub fn into_sample(self, now: DateTime<Utc>) -> LocationSample {
        LocationSample::new(
            Coordinate::new(self.latitude, self.longitude),
            self.accuracy_meters,
            self.captured_at.unwrap_or(now),
        )
    }
}

/// Request body for a check-in attempt.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[schema(example = json!({
    "student_id": "student-42",
    "location": {
        "latitude": 40.71285,
        "longitude": -74.006,
        "accuracy_meters": 8.0
    }
}))]
pub struct CheckInRequest {
    /// Student checking in.
    pub student_id: StudentId,

    /// Location fix. Omitted when the device could not provide one.
    pub location: Option<LocationInput>,

    /// Why the device could not provide a fix.
    pub location_error: Option<LocationFailure>,
}

/// Response after a successful check-in.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "success": true,
    "status": "present",
    "message": "Check-in successful",
    "distance_meters": 6,
    "record": {
        "session_id": "01936f4e-8b7a-7c3d-9f21-4a5b6c7d8e9f",
        "student_id": "student-42",
        "coordinate": { "latitude": 40.71285, "longitude": -74.006 },
        "accuracy_meters": 8.0,
        "distance_meters": 5.56,
        "captured_at": "2025-01-15T09:05:00Z",
        "outcome": "present"
    }
}))]
pub struct CheckInResponse {
    /// Always true; rejections are reported as errors.
    #[schema(example = true)]
    pub success: bool,

    /// Present or late.
    pub status: AttendanceOutcome,

    /// User-facing confirmation.
    #[schema(example = "Check-in successful")]
    pub message: String,

    /// Distance from the class location, rounded to whole meters.
    #[schema(example = 6)]
    pub distance_meters: u64,

    /// The stored record.
    pub record: AttendanceRecord,
}

/// Query parameters for session attendance.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct SessionAttendanceQuery {
    /// Number of students enrolled. Enables absent count and percentage.
    #[param(example = 25, minimum = 0)]
    pub expected_students: Option<usize>,
}

/// Attendance of one session.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionAttendanceResponse {
    /// The session.
    pub session: SessionResponse,

    /// Records in check-in order.
    pub records: Vec<AttendanceRecord>,

    /// Head count.
    pub summary: SessionSummary,
}

/// Query parameters for student attendance history.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct StudentAttendanceQuery {
    /// Maximum records to return. Defaults to 50, capped at 200.
    #[param(example = 50, minimum = 1, maximum = 200)]
    pub limit: Option<usize>,

    /// Records to skip, newest first.
    #[param(example = 0, minimum = 0)]
    pub offset: Option<usize>,

    /// Sessions the student was expected at. Defaults to sessions attended.
    #[param(example = 12, minimum = 0)]
    pub total_sessions: Option<usize>,

    /// Only count sessions of this course.
    #[param(example = "CS101")]
    pub course_id: Option<CourseId>,
}

/// Query parameters for course attendance.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct CourseAttendanceQuery {
    /// Number of students enrolled. Enables absent count and percentage.
    #[param(example = 25, minimum = 0)]
    pub enrolled_students: Option<usize>,
}

/// One page of a student's attendance history with overall statistics.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StudentAttendanceResponse {
    /// Student listed.
    pub student_id: StudentId,

    /// Records on this page, newest first.
    pub records: Vec<AttendanceRecord>,

    /// Records across all pages.
    #[schema(example = 12)]
    pub total_count: usize,

    /// Page size used.
    #[schema(example = 50)]
    pub limit: usize,

    /// Records skipped.
    #[schema(example = 0)]
    pub offset: usize,

    /// Totals across all of the student's records.
    pub statistics: StudentStatistics,
}

/// Attendance across a course's sessions.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CourseAttendanceResponse {
    /// Course totals.
    pub summary: CourseSummary,

    /// Head count of each session, most recent window first.
    pub sessions: Vec<SessionSummary>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Check in to a specific session.
#[utoipa::path(
    post,
    path = "/api/sessions/{session_id}/checkin",
    tag = "attendance",
    operation_id = "checkIn",
    summary = "Check in to a session",
    description = "Evaluates the student's location against the session geofence \
        and window. Accepted check-ins are recorded once per student; check-ins \
        more than the grace period after the window start are recorded as late.",
    params(("session_id" = String, Path, description = "Session identifier")),
    request_body = CheckInRequest,
    responses(
        (status = 201, description = "Checked in", body = CheckInResponse),
        (status = 400, description = "No location fix", body = ErrorResponse),
        (status = 403, description = "Outside the geofence", body = ErrorResponse),
        (status = 404, description = "Unknown session", body = ErrorResponse),
        (status = 409, description = "Session not open or already checked in", body = ErrorResponse),
        (status = 422, description = "Invalid coordinates or accuracy", body = ErrorResponse)
    )
)]
pub async fn check_in(
    State(state): State<SharedState>,
    Path(session_id): Path<SessionId>,
    Json(request): Json<CheckInRequest>,
) -> ApiResult<(StatusCode, Json<CheckInResponse>)> {
    let state_guard = state.read().await;
    let session = state_guard
        .registry
        .get(session_id)
        .ok_or(GeoRollError::SessionNotFound(session_id))?;

    submit_check_in(&state_guard, Some(&session), request)
}

/// Check in to whichever session of a course is open.
#[utoipa::path(
    post,
    path = "/api/courses/{course_id}/checkin",
    tag = "attendance",
    operation_id = "checkInToCourse",
    summary = "Check in to a course's open session",
    description = "Same as checking in to a session, but resolves the course's \
        open session first. Fails with `no_active_session` when none is open.",
    params(("course_id" = String, Path, description = "Course identifier")),
    request_body = CheckInRequest,
    responses(
        (status = 201, description = "Checked in", body = CheckInResponse),
        (status = 400, description = "No location fix", body = ErrorResponse),
        (status = 403, description = "Outside the geofence", body = ErrorResponse),
        (status = 409, description = "No open session or already checked in", body = ErrorResponse),
        (status = 422, description = "Invalid coordinates or accuracy", body = ErrorResponse)
    )
)]
pub async fn check_in_to_course(
    State(state): State<SharedState>,
    Path(course_id): Path<CourseId>,
    Json(request): Json<CheckInRequest>,
) -> ApiResult<(StatusCode, Json<CheckInResponse>)> {
    let state_guard = state.read().await;
    let session = state_guard
        .registry
        .open_session_for_course(&course_id, Utc::now());

    submit_check_in(&state_guard, session.as_ref(), request)
}

/// Live distance to the class location.
#[utoipa::path(
    post,
    path = "/api/sessions/{session_id}/distance",
    tag = "attendance",
    operation_id = "getDistance",
    summary = "Preview distance to the class location",
    description = "Reports how far the given fix is from the session's geofence \
        center and whether a check-in from there would be in range. Nothing is \
        recorded.",
    params(("session_id" = String, Path, description = "Session identifier")),
    request_body = LocationInput,
    responses(
        (status = 200, description = "Distance computed", body = DistanceReport),
        (status = 404, description = "Unknown session", body = ErrorResponse),
        (status = 409, description = "Session not open", body = ErrorResponse),
        (status = 422, description = "Invalid coordinates or accuracy", body = ErrorResponse)
    )
)]
pub async fn get_distance(
    State(state): State<SharedState>,
    Path(session_id): Path<SessionId>,
    Json(location): Json<LocationInput>,
) -> ApiResult<Json<DistanceReport>> {
    let state_guard = state.read().await;
    let session = state_guard
        .registry
        .get(session_id)
        .ok_or(GeoRollError::SessionNotFound(session_id))?;
    let sample = location.into_sample(Utc::now());

    if let Some(report) = current_distance(Some(&session), Some(&sample)) {
        return Ok(Json(report));
    }

    let verdict = match sample.validate() {
        Err(err) if session.is_open_at(sample.captured_at) => Verdict::InvalidLocation(err),
        _ => Verdict::NoActiveSession,
    };
    Err(rejection(&verdict, None))
}

/// Attendance of one session.
#[utoipa::path(
    get,
    path = "/api/sessions/{session_id}/attendance",
    tag = "attendance",
    operation_id = "getSessionAttendance",
    summary = "Get session attendance",
    description = "Returns the session's attendance records and a head count. \
        Pass `expected_students` to include absences and a percentage.",
    params(
        ("session_id" = String, Path, description = "Session identifier"),
        SessionAttendanceQuery
    ),
    responses(
        (status = 200, description = "Attendance retrieved", body = SessionAttendanceResponse),
        (status = 404, description = "Unknown session", body = ErrorResponse)
    )
)]
pub async fn get_session_attendance(
    State(state): State<SharedState>,
    Path(session_id): Path<SessionId>,
    Query(query): Query<SessionAttendanceQuery>,
) -> ApiResult<Json<SessionAttendanceResponse>> {
    let state_guard = state.read().await;
    let session = state_guard
        .registry
        .get(session_id)
        .ok_or(GeoRollError::SessionNotFound(session_id))?;

    let records = state_guard.ledger.records_for_session(session_id);
    let summary = SessionSummary::from_records(session_id, &records, query.expected_students);

    Ok(Json(SessionAttendanceResponse {
        session: SessionResponse::new(&session, Utc::now(), state_guard.evaluator.grace_period()),
        records,
        summary,
    }))
}

/// Attendance history of one student.
#[utoipa::path(
    get,
    path = "/api/students/{student_id}/attendance",
    tag = "attendance",
    operation_id = "getStudentAttendance",
    summary = "Get student attendance history",
    description = "Returns one page of the student's attendance records, newest \
        first, with statistics across all of them. Pass `course_id` to restrict \
        both to one course.",
    params(
        ("student_id" = String, Path, description = "Student identifier"),
        StudentAttendanceQuery
    ),
    responses(
        (status = 200, description = "History retrieved", body = StudentAttendanceResponse),
        (status = 400, description = "Invalid page size", body = ErrorResponse)
    )
)]
pub async fn get_student_attendance(
    State(state): State<SharedState>,
    Path(student_id): Path<StudentId>,
    Query(query): Query<StudentAttendanceQuery>,
) -> ApiResult<Json<StudentAttendanceResponse>> {
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    if limit == 0 || limit > MAX_HISTORY_LIMIT {
        return Err(ApiError::BadRequest {
            error_code: "invalid_limit".to_string(),
            message: format!("limit must be between 1 and {MAX_HISTORY_LIMIT}"),
        });
    }
    let offset = query.offset.unwrap_or(0);

    let state_guard = state.read().await;
    let course_sessions: Option<HashSet<SessionId>> = query.course_id.as_ref().map(|course_id| {
        state_guard
            .registry
            .sessions_for_course(course_id)
            .into_iter()
            .map(|s| s.id)
            .collect()
    });
    let history = state_guard
        .ledger
        .history_for_student(&student_id, course_sessions.as_ref(), offset, limit);
    let statistics = StudentStatistics::from_history(student_id.clone(), &history, query.total_sessions);

    Ok(Json(StudentAttendanceResponse {
        student_id,
        records: history.records,
        total_count: history.total_count,
        limit,
        offset,
        statistics,
    }))
}

/// Attendance across all sessions of a course.
#[utoipa::path(
    get,
    path = "/api/courses/{course_id}/attendance",
    tag = "attendance",
    operation_id = "getCourseAttendance",
    summary = "Get course attendance summary",
    description = "Returns totals across every session of the course and a head \
        count per session. Pass `enrolled_students` to include absences and \
        percentages.",
    params(
        ("course_id" = String, Path, description = "Course identifier"),
        CourseAttendanceQuery
    ),
    responses(
        (status = 200, description = "Summary retrieved", body = CourseAttendanceResponse)
    )
)]
pub async fn get_course_attendance(
    State(state): State<SharedState>,
    Path(course_id): Path<CourseId>,
    Query(query): Query<CourseAttendanceQuery>,
) -> Json<CourseAttendanceResponse> {
    let state_guard = state.read().await;
    let sessions = state_guard.registry.sessions_for_course(&course_id);

    let mut all_records = Vec::new();
    let per_session = sessions
        .iter()
        .map(|session| {
            let records = state_guard.ledger.records_for_session(session.id);
            let summary = SessionSummary::from_records(session.id, &records, query.enrolled_students);
            all_records.extend(records);
            summary
        })
        .collect();

    Json(CourseAttendanceResponse {
        summary: CourseSummary::from_records(
            course_id,
            sessions.len(),
            &all_records,
            query.enrolled_students,
        ),
        sessions: per_session,
    })
}

// ============================================================================
// Helpers
// ============================================================================

fn submit_check_in(
    state: &AppState,
    session: Option<&ClassSession>,
    request: CheckInRequest,
) -> ApiResult<(StatusCode, Json<CheckInResponse>)> {
    let sample = request.location.map(|l| l.into_sample(Utc::now()));
    let verdict = state
        .evaluator
        .evaluate(session, &request.student_id, sample.as_ref());

    let record = match verdict {
        Verdict::Accepted(record) => record,
        rejected => {
            info!(
                student_id = %request.student_id,
                session_id = ?session.map(|s| s.id),
                verdict = rejected.code(),
                "Check-in rejected"
            );
            return Err(rejection(&rejected, request.location_error));
        }
    };

    let message = Verdict::Accepted(record.clone()).message();
    let record = state.ledger.record(record)?;

    Ok((
        StatusCode::CREATED,
        Json(CheckInResponse {
            success: true,
            status: record.outcome,
            message,
            distance_meters: round_meters(record.distance_meters),
            record,
        }),
    ))
}

/// The error for a rejected verdict, using the device's own reason when it
/// could not provide a fix.
fn rejection(verdict: &Verdict, location_error: Option<LocationFailure>) -> ApiError {
    let error = ApiError::from_rejection(verdict).unwrap_or_else(|| ApiError::InternalError {
        error_code: "unexpected_verdict".to_string(),
        message: "Check-in was accepted but reported as rejected".to_string(),
        details: None,
    });

    match (error, location_error) {
        (ApiError::BadRequest { error_code, .. }, Some(failure)) => ApiError::BadRequest {
            error_code,
            message: failure.message().to_string(),
        },
        (error, _) => error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_input_defaults_capture_time() {
        let now = Utc::now();
        let input = LocationInput {
            latitude: 40.7128,
            longitude: -74.006,
            accuracy_meters: 5.0,
            captured_at: None,
        };
        assert_eq!(input.into_sample(now).captured_at, now);
    }

    #[test]
    fn test_device_failure_replaces_generic_message() {
        let err = rejection(
            &Verdict::LocationUnavailable,
            Some(LocationFailure::PermissionDenied),
        );
        match err {
            ApiError::BadRequest { error_code, message } => {
                assert_eq!(error_code, "location_unavailable");
                assert_eq!(message, LocationFailure::PermissionDenied.message());
            }
            other => panic!("expected BadRequest, got {other:?}"),
        }
    }

    #[test]
    fn test_device_failure_does_not_mask_other_rejections() {
        let err = rejection(&Verdict::NoActiveSession, Some(LocationFailure::Timeout));
        assert!(matches!(err, ApiError::Conflict { .. }));
    }

    #[test]
    fn test_check_in_request_without_location() {
        let request: CheckInRequest = serde_json::from_value(serde_json::json!({
            "student_id": "student-42",
            "location_error": "permission_denied"
        }))
        .unwrap();
        assert!(request.location.is_none());
        assert_eq!(request.location_error, Some(LocationFailure::PermissionDenied));
    }
}
