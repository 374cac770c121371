//! HTTP integration tests for the georoll API.

use axum::http::StatusCode;
use axum_test::TestServer;
use chrono::{Duration, Utc};
use georoll_core::{GeoRollConfig, StorageConfig};
use georoll_server::api::create_router;
use georoll_server::state::AppState;
use serde_json::{json, Value};
use tempfile::TempDir;

const CLASS_LAT: f64 = 40.7128;
const CLASS_LON: f64 = -74.0060;

fn server() -> TestServer {
    let state = AppState::in_memory(GeoRollConfig::default()).into_shared();
    TestServer::new(create_router(state)).unwrap()
}

fn persistent_server(dir: &TempDir) -> TestServer {
    let config = GeoRollConfig {
        storage: StorageConfig {
            data_dir: Some(dir.path().to_path_buf()),
            persist: true,
        },
        ..GeoRollConfig::default()
    };
    let state = AppState::new(config).unwrap().into_shared();
    TestServer::new(create_router(state)).unwrap()
}

async fn open_session(server: &TestServer, course: &str) -> String {
    let response = server
        .post(&format!("/api/courses/{course}/sessions"))
        .json(&json!({
            "instructor_id": "instructor-7",
            "location_name": "Engineering Hall 101",
            "latitude": CLASS_LAT,
            "longitude": CLASS_LON,
            "radius_meters": 50.0,
            "duration_minutes": 90,
            "start_now": true
        }))
        .await;
    response.assert_status(StatusCode::CREATED);

    let body: Value = response.json();
    assert_eq!(body["status"], "open");
    body["id"].as_str().unwrap().to_string()
}

fn check_in_body(student: &str, latitude: f64) -> Value {
    json!({
        "student_id": student,
        "location": {
            "latitude": latitude,
            "longitude": CLASS_LON,
            "accuracy_meters": 8.0
        }
    })
}

#[tokio::test]
async fn health_reports_ok() {
    let response = server().get("/health").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn openapi_document_is_served() {
    let response = server().get("/api/openapi.json").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["info"]["title"], "georoll API");
}

#[tokio::test]
async fn nearby_student_checks_in_once() {
    let server = server();
    let session_id = open_session(&server, "CS101").await;
    let path = format!("/api/sessions/{session_id}/checkin");

    let response = server.post(&path).json(&check_in_body("alice", 40.71285)).await;
    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["status"], "present");
    assert_eq!(body["distance_meters"], 6);
    assert_eq!(body["record"]["student_id"], "alice");

    let again = server.post(&path).json(&check_in_body("alice", 40.71285)).await;
    again.assert_status(StatusCode::CONFLICT);
    let body: Value = again.json();
    assert_eq!(body["error"], "duplicate_attendance");
}

#[tokio::test]
async fn distant_student_is_told_how_far_away_they_are() {
    let server = server();
    let session_id = open_session(&server, "CS101").await;

    let response = server
        .post(&format!("/api/sessions/{session_id}/checkin"))
        .json(&check_in_body("bob", 40.7228))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);

    let body: Value = response.json();
    assert_eq!(body["error"], "out_of_range");
    assert_eq!(body["details"]["distance"], 1112.0);
    assert_eq!(body["details"]["required_radius"], 50.0);
    assert_eq!(
        body["message"],
        "You are 1112m away from the class location. You need to be within 50m to check in."
    );
}

#[tokio::test]
async fn check_in_rejections_map_to_status_codes() {
    let server = server();
    let session_id = open_session(&server, "CS101").await;
    let path = format!("/api/sessions/{session_id}/checkin");

    let no_fix = server
        .post(&path)
        .json(&json!({ "student_id": "carol", "location_error": "permission_denied" }))
        .await;
    no_fix.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = no_fix.json();
    assert_eq!(body["error"], "location_unavailable");

    let bad_fix = server.post(&path).json(&check_in_body("carol", 95.0)).await;
    bad_fix.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = bad_fix.json();
    assert_eq!(body["error"], "invalid_location");

    server
        .post(&format!("/api/sessions/{session_id}/end"))
        .await
        .assert_status_ok();
    let closed = server.post(&path).json(&check_in_body("carol", 40.71285)).await;
    closed.assert_status(StatusCode::CONFLICT);
    let body: Value = closed.json();
    assert_eq!(body["error"], "no_active_session");
}

#[tokio::test]
async fn late_check_in_is_recorded_as_late() {
    let server = server();
    let session_id = open_session(&server, "CS101").await;

    let captured_at = Utc::now() + Duration::minutes(20);
    let response = server
        .post(&format!("/api/sessions/{session_id}/checkin"))
        .json(&json!({
            "student_id": "dave",
            "location": {
                "latitude": 40.71285,
                "longitude": CLASS_LON,
                "accuracy_meters": 8.0,
                "captured_at": captured_at
            }
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["status"], "late");
}

#[tokio::test]
async fn course_check_in_uses_the_open_session() {
    let server = server();

    let none_open = server
        .post("/api/courses/CS101/checkin")
        .json(&check_in_body("erin", 40.71285))
        .await;
    none_open.assert_status(StatusCode::CONFLICT);

    let session_id = open_session(&server, "CS101").await;
    let response = server
        .post("/api/courses/CS101/checkin")
        .json(&check_in_body("erin", 40.71285))
        .await;
    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["record"]["session_id"], session_id.as_str());
}

#[tokio::test]
async fn only_one_session_per_course_can_be_open() {
    let server = server();
    open_session(&server, "CS101").await;

    let second = server
        .post("/api/courses/CS101/sessions")
        .json(&json!({
            "instructor_id": "instructor-7",
            "location_name": "Room 2",
            "latitude": CLASS_LAT,
            "longitude": CLASS_LON
        }))
        .await;
    second.assert_status(StatusCode::CREATED);
    let second_id = second.json::<Value>()["id"].as_str().unwrap().to_string();

    let start = server.post(&format!("/api/sessions/{second_id}/start")).await;
    start.assert_status(StatusCode::CONFLICT);
    let body: Value = start.json();
    assert_eq!(body["error"], "session_already_open");

    open_session(&server, "MATH200").await;
}

#[tokio::test]
async fn create_session_validates_input() {
    let server = server();

    let blank = server
        .post("/api/courses/CS101/sessions")
        .json(&json!({
            "instructor_id": "instructor-7",
            "location_name": " ",
            "latitude": CLASS_LAT,
            "longitude": CLASS_LON
        }))
        .await;
    blank.assert_status(StatusCode::BAD_REQUEST);

    let bad_radius = server
        .post("/api/courses/CS101/sessions")
        .json(&json!({
            "instructor_id": "instructor-7",
            "location_name": "Room 1",
            "latitude": CLASS_LAT,
            "longitude": CLASS_LON,
            "radius_meters": 0.0
        }))
        .await;
    bad_radius.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    let server = server();
    let id = "01936f4e-8b7a-7c3d-9f21-4a5b6c7d8e9f";

    server
        .get(&format!("/api/sessions/{id}"))
        .await
        .assert_status(StatusCode::NOT_FOUND);
    server
        .post(&format!("/api/sessions/{id}/checkin"))
        .json(&check_in_body("alice", 40.71285))
        .await
        .assert_status(StatusCode::NOT_FOUND);
    server
        .get("/api/courses/CS101/sessions/open")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn distance_preview_does_not_record_attendance() {
    let server = server();
    let session_id = open_session(&server, "CS101").await;

    let response = server
        .post(&format!("/api/sessions/{session_id}/distance"))
        .json(&json!({ "latitude": 40.7228, "longitude": CLASS_LON, "accuracy_meters": 15.0 }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["rounded_meters"], 1112);
    assert_eq!(body["within_range"], false);

    let attendance: Value = server
        .get(&format!("/api/sessions/{session_id}/attendance"))
        .await
        .json();
    assert_eq!(attendance["records"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn session_attendance_summarizes_head_count() {
    let server = server();
    let session_id = open_session(&server, "CS101").await;
    let path = format!("/api/sessions/{session_id}/checkin");

    for student in ["alice", "bob"] {
        server
            .post(&path)
            .json(&check_in_body(student, 40.71285))
            .await
            .assert_status(StatusCode::CREATED);
    }

    let response = server
        .get(&format!("/api/sessions/{session_id}/attendance"))
        .add_query_param("expected_students", 3)
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["summary"]["present"], 2);
    assert_eq!(body["summary"]["late"], 0);
    assert_eq!(body["summary"]["absent"], 1);
    assert_eq!(body["summary"]["attendance_percentage"], 66.67);
}

#[tokio::test]
async fn student_history_is_paginated() {
    let server = server();

    for course in ["CS101", "MATH200", "PHYS150"] {
        let session_id = open_session(&server, course).await;
        server
            .post(&format!("/api/sessions/{session_id}/checkin"))
            .json(&check_in_body("alice", 40.71285))
            .await
            .assert_status(StatusCode::CREATED);
    }

    let response = server
        .get("/api/students/alice/attendance")
        .add_query_param("limit", 2)
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["total_count"], 3);
    assert_eq!(body["records"].as_array().unwrap().len(), 2);
    assert_eq!(body["statistics"]["present"], 3);

    server
        .get("/api/students/alice/attendance")
        .add_query_param("limit", 0)
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn session_attendance_never_exceeds_full_attendance() {
    let server = server();
    let session_id = open_session(&server, "CS101").await;
    let path = format!("/api/sessions/{session_id}/checkin");

    for student in ["alice", "bob", "carol"] {
        server
            .post(&path)
            .json(&check_in_body(student, 40.71285))
            .await
            .assert_status(StatusCode::CREATED);
    }

    let body: Value = server
        .get(&format!("/api/sessions/{session_id}/attendance"))
        .add_query_param("expected_students", 2)
        .await
        .json();
    assert_eq!(body["summary"]["expected_students"], 3);
    assert_eq!(body["summary"]["absent"], 0);
    assert_eq!(body["summary"]["attendance_percentage"], 100.0);
}

#[tokio::test]
async fn student_history_can_be_limited_to_one_course() {
    let server = server();

    for course in ["CS101", "MATH200", "PHYS150"] {
        let session_id = open_session(&server, course).await;
        server
            .post(&format!("/api/sessions/{session_id}/checkin"))
            .json(&check_in_body("alice", 40.71285))
            .await
            .assert_status(StatusCode::CREATED);
    }

    let response = server
        .get("/api/students/alice/attendance")
        .add_query_param("course_id", "MATH200")
        .add_query_param("total_sessions", 4)
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["total_count"], 1);
    assert_eq!(body["records"].as_array().unwrap().len(), 1);
    assert_eq!(body["statistics"]["present"], 1);
    assert_eq!(body["statistics"]["attendance_percentage"], 25.0);

    let body: Value = server
        .get("/api/students/alice/attendance")
        .add_query_param("course_id", "HIST100")
        .await
        .json();
    assert_eq!(body["total_count"], 0);
}

#[tokio::test]
async fn course_attendance_covers_every_session() {
    let server = server();

    let first = open_session(&server, "CS101").await;
    for student in ["alice", "bob"] {
        server
            .post(&format!("/api/sessions/{first}/checkin"))
            .json(&check_in_body(student, 40.71285))
            .await
            .assert_status(StatusCode::CREATED);
    }
    server
        .post(&format!("/api/sessions/{first}/end"))
        .await
        .assert_status_ok();

    let second = open_session(&server, "CS101").await;
    server
        .post(&format!("/api/sessions/{second}/checkin"))
        .json(&check_in_body("alice", 40.71285))
        .await
        .assert_status(StatusCode::CREATED);

    let other = open_session(&server, "MATH200").await;
    server
        .post(&format!("/api/sessions/{other}/checkin"))
        .json(&check_in_body("carol", 40.71285))
        .await
        .assert_status(StatusCode::CREATED);

    let response = server
        .get("/api/courses/CS101/attendance")
        .add_query_param("enrolled_students", 2)
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["summary"]["course_id"], "CS101");
    assert_eq!(body["summary"]["total_sessions"], 2);
    assert_eq!(body["summary"]["total_records"], 3);
    assert_eq!(body["summary"]["present"], 3);
    assert_eq!(body["summary"]["absent"], 1);
    assert_eq!(body["summary"]["attendance_percentage"], 75.0);
    assert_eq!(body["sessions"].as_array().unwrap().len(), 2);

    let empty: Value = server.get("/api/courses/HIST100/attendance").await.json();
    assert_eq!(empty["summary"]["total_sessions"], 0);
    assert!(empty["summary"]["attendance_percentage"].is_null());
}

#[tokio::test]
async fn attendance_survives_restart() {
    let dir = TempDir::new().unwrap();

    let session_id = {
        let server = persistent_server(&dir);
        let session_id = open_session(&server, "CS101").await;
        server
            .post(&format!("/api/sessions/{session_id}/checkin"))
            .json(&check_in_body("alice", 40.71285))
            .await
            .assert_status(StatusCode::CREATED);
        session_id
    };

    let server = persistent_server(&dir);
    server
        .post(&format!("/api/sessions/{session_id}/checkin"))
        .json(&check_in_body("alice", 40.71285))
        .await
        .assert_status(StatusCode::CONFLICT);

    let body: Value = server
        .get(&format!("/api/sessions/{session_id}/attendance"))
        .await
        .json();
    assert_eq!(body["records"].as_array().unwrap().len(), 1);
}
