//! # georoll-core
//!
//! Core business logic for the georoll GPS class check-in system.
//!
//! This crate provides:
//! - Great-circle distance and circular geofences
//! - Class sessions with a time window and a single-open-session-per-course rule
//! - Check-in evaluation producing one verdict per attempt
//! - An attendance ledger that stores at most one record per student per session
//! - Configuration management and JSON file persistence
//!
//! ## Architecture
//!
//! The crate is organized into the following modules:
//!
//! - [`geo`] - Coordinates, haversine distance and geofences
//! - [`location`] - Location fixes reported by clients
//! - [`session`] - Session lifecycle and the session registry
//! - [`checkin`] - Check-in verdicts and live distance feedback
//! - [`attendance`] - Attendance records and the ledger
//! - [`stats`] - Per-session and per-student summaries
//! - [`config`] - Application configuration loading, saving, and validation
//! - [`storage`] - Persistent storage using JSON files
//! - [`error`] - Unified error types for the crate
//! - [`types`] - Shared identifiers and OpenAPI schemas

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![warn(missing_docs)]

pub mod attendance;
pub mod checkin;
pub mod config;
pub mod error;
pub mod geo;
pub mod location;
pub mod session;
pub mod stats;
pub mod storage;
pub mod types;

// Re-export primary types for convenience
pub use attendance::{
    AttendanceLedger, AttendanceOutcome, AttendanceRecord, StudentHistory, DEFAULT_HISTORY_LIMIT,
};
pub use checkin::{current_distance, round_meters, CheckInEvaluator, DistanceReport, Verdict};
pub use config::{
    CheckInConfig, ConfigError, ConfigResult, GeoRollConfig, ServerConfig, StorageConfig,
};
pub use error::{GeoRollError, Result};
pub use geo::{distance, Coordinate, GeoError, GeoFence, EARTH_RADIUS_METERS};
pub use location::{LocationFailure, LocationSample};
pub use session::{ClassSession, NewSession, SessionRegistry, SessionStatus};
pub use stats::{CourseSummary, SessionSummary, StudentStatistics};
pub use storage::Storage;
pub use types::{CourseId, HealthResponse, InstructorId, SessionId, StudentId};
