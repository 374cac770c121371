//! Unified error types for the georoll core library.
//!
//! [`GeoRollError`] covers every operational failure across the crate:
//! session lifecycle conflicts, duplicate attendance, configuration and
//! persistence. Check-in rejections (out of range, no open session, ...) are
//! not errors; they are [`Verdict`](crate::checkin::Verdict) values.
//!
//! # Design Principles
//!
//! - **Specific variants**: Each error variant captures exactly one failure mode
//! - **Actionable messages**: Error messages say what to do next
//! - **HTTP-ready**: Error types include HTTP status codes and error codes
//!
//! # Example
//!
//! ```rust
//! use georoll_core::error::{GeoRollError, Result};
//! use georoll_core::SessionId;
//!
//! fn require_session(found: bool, id: SessionId) -> Result<()> {
//!     if !found {
//!         return Err(GeoRollError::SessionNotFound(id));
//!     }
//!     Ok(())
//! }
//! ```

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::geo::GeoError;
use crate::types::{CourseId, SessionId, StudentId};

/// The unified error type for all georoll operations.
#[derive(Debug, Error)]
pub enum GeoRollError {
    // =========================================================================
    // SESSION ERRORS
    // =========================================================================
    /// No session exists with the given identifier.
    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),

    /// The course already has an open session.
    #[error("Course '{course_id}' already has an open session ({session_id}). End it before starting another.")]
    SessionAlreadyOpen {
        /// Course that owns both sessions.
        course_id: CourseId,
        /// The session that is currently open.
        session_id: SessionId,
    },

    /// The session has been closed and cannot be reopened.
    #[error("Session {0} is closed and cannot be reopened")]
    SessionClosed(SessionId),

    /// The session's check-in window has already ended.
    #[error("The check-in window of session {0} has already ended")]
    SessionWindowElapsed(SessionId),

    /// The session's window does not end after it starts.
    #[error("Session window must end after it starts (start {start}, end {end})")]
    InvalidSessionWindow {
        /// Requested window start.
        start: DateTime<Utc>,
        /// Requested window end.
        end: DateTime<Utc>,
    },

    /// The declared class location or radius is unusable.
    #[error("Invalid geofence: {0}")]
    InvalidGeoFence(String),

    /// The session has no location name.
    #[error("Session location name cannot be empty")]
    EmptyLocationName,

    // =========================================================================
    // ATTENDANCE ERRORS
    // =========================================================================
    /// The student already has an attendance record for this session.
    #[error("Student '{student_id}' has already checked in for session {session_id}")]
    DuplicateAttendance {
        /// Session checked in to.
        session_id: SessionId,
        /// Student who already checked in.
        student_id: StudentId,
    },

    // =========================================================================
    // CONFIGURATION ERRORS
    // =========================================================================
    /// A configuration source could not be loaded or parsed.
    #[error("Failed to load configuration: {0}")]
    ConfigLoadError(String),

    /// The configuration was parsed but contains invalid values.
    #[error("Configuration validation failed: {0}")]
    ConfigValidationError(String),

    // =========================================================================
    // PERSISTENCE & I/O ERRORS
    // =========================================================================
    /// An error occurred while persisting or reading data.
    #[error("Persistence error: {0}")]
    PersistenceError(String),

    /// A stored file does not contain the expected JSON.
    #[error("Stored data is malformed: {0}")]
    DataFormatError(#[from] serde_json::Error),

    /// A low-level I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A specialized [`Result`] type for georoll operations.
pub type Result<T> = std::result::Result<T, GeoRollError>;

impl GeoRollError {
    /// Returns `true` if this error concerns a session's lifecycle or definition.
    #[inline]
    #[must_use]
    pub const fn is_session_error(&self) -> bool {
        matches!(
            self,
            Self::SessionNotFound(_)
                | Self::SessionAlreadyOpen { .. }
                | Self::SessionClosed(_)
                | Self::SessionWindowElapsed(_)
                | Self::InvalidSessionWindow { .. }
                | Self::InvalidGeoFence(_)
                | Self::EmptyLocationName
        )
    }

    /// Returns `true` if this error concerns an attendance record.
    #[inline]
    #[must_use]
    pub const fn is_attendance_error(&self) -> bool {
        matches!(self, Self::DuplicateAttendance { .. })
    }

    /// Returns `true` if this error is related to configuration.
    #[inline]
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigLoadError(_) | Self::ConfigValidationError(_)
        )
    }

    /// Returns `true` if this error is related to I/O or persistence.
    #[inline]
    #[must_use]
    pub const fn is_io_error(&self) -> bool {
        matches!(
            self,
            Self::PersistenceError(_) | Self::DataFormatError(_) | Self::IoError(_)
        )
    }

    /// Returns `true` if retrying the same request later may succeed.
    ///
    /// A duplicate check-in never succeeds on retry; an already-open session
    /// may once the instructor ends it.
    #[inline]
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::SessionAlreadyOpen { .. } | Self::PersistenceError(_) | Self::IoError(_)
        )
    }

    /// Returns an HTTP-appropriate status code for this error.
    #[inline]
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - malformed input
            Self::InvalidSessionWindow { .. } | Self::EmptyLocationName => 400,

            // 404 Not Found
            Self::SessionNotFound(_) => 404,

            // 409 Conflict - current state forbids the operation
            Self::SessionAlreadyOpen { .. }
            | Self::SessionClosed(_)
            | Self::SessionWindowElapsed(_)
            | Self::DuplicateAttendance { .. } => 409,

            // 422 Unprocessable Entity - semantic errors
            Self::InvalidGeoFence(_) | Self::ConfigLoadError(_) | Self::ConfigValidationError(_) => {
                422
            }

            // 500 Internal Server Error - server-side issues
            Self::PersistenceError(_) | Self::DataFormatError(_) | Self::IoError(_) => 500,
        }
    }

    /// Returns a machine-readable error code for API responses.
    #[inline]
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::SessionNotFound(_) => "SESSION_NOT_FOUND",
            Self::SessionAlreadyOpen { .. } => "SESSION_ALREADY_OPEN",
            Self::SessionClosed(_) => "SESSION_CLOSED",
            Self::SessionWindowElapsed(_) => "SESSION_WINDOW_ELAPSED",
            Self::InvalidSessionWindow { .. } => "INVALID_SESSION_WINDOW",
            Self::InvalidGeoFence(_) => "INVALID_GEOFENCE",
            Self::EmptyLocationName => "EMPTY_LOCATION_NAME",
            Self::DuplicateAttendance { .. } => "DUPLICATE_ATTENDANCE",
            Self::ConfigLoadError(_) => "CONFIG_LOAD_ERROR",
            Self::ConfigValidationError(_) => "CONFIG_VALIDATION_ERROR",
            Self::PersistenceError(_) => "PERSISTENCE_ERROR",
            Self::DataFormatError(_) => "DATA_FORMAT_ERROR",
            Self::IoError(_) => "IO_ERROR",
        }
    }
}

// =============================================================================
// CONVERSIONS FROM MODULE-SPECIFIC ERRORS
// =============================================================================

impl From<crate::config::ConfigError> for GeoRollError {
    fn from(err: crate::config::ConfigError) -> Self {
        use crate::config::ConfigError;
        match err {
            ConfigError::LoadError(e) => Self::ConfigLoadError(e.to_string()),
            ConfigError::SerializeError(e) => Self::ConfigLoadError(e.to_string()),
            ConfigError::WriteError { path, source } => {
                Self::PersistenceError(format!("Failed to write {path}: {source}"))
            }
            err @ ConfigError::ValidationError { .. } => {
                Self::ConfigValidationError(err.to_string())
            }
            ConfigError::MultipleValidationErrors(errors) => {
                let messages: Vec<String> = errors.into_iter().map(|e| e.to_string()).collect();
                Self::ConfigValidationError(messages.join("; "))
            }
        }
    }
}

impl From<GeoError> for GeoRollError {
    fn from(err: GeoError) -> Self {
        Self::InvalidGeoFence(err.to_string())
    }
}

// =============================================================================
// TESTS
// =============================================================================
