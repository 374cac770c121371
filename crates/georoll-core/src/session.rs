//! Class sessions and their lifecycle.
//!
//! A session moves `Scheduled → Open → Closed`. It closes when the instructor
//! ends it or, implicitly, once its window has ended. At most one session per
//! course is open at any time; [`SessionRegistry`] enforces this under a
//! single lock so concurrent starts cannot both succeed.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use crate::config::CheckInConfig;
use crate::error::{GeoRollError, Result};
use crate::geo::{Coordinate, GeoFence};
use crate::storage::Storage;
use crate::types::{CourseId, InstructorId, SessionId};

/// Lifecycle state of a class session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Created but not yet accepting check-ins.
    Scheduled,
    /// Accepting check-ins.
    Open,
    /// No longer accepting check-ins.
    Closed,
}

/// A class meeting with an instructor-declared geofence and time window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ClassSession {
    /// Session identifier.
    pub id: SessionId,

    /// Course this session belongs to.
    pub course_id: CourseId,

    /// Instructor who created the session.
    pub instructor_id: InstructorId,

    /// Human-readable location, e.g. a room name.
    #[schema(example = "Engineering Hall 101")]
    pub location_name: String,

    /// Where students must be to check in.
    pub geofence: GeoFence,

    /// Scheduled start of the class.
    pub window_start: DateTime<Utc>,

    /// End of the check-in window; the session closes here.
    pub window_end: DateTime<Utc>,

    /// Stored lifecycle state. See [`ClassSession::status_at`] for the
    /// effective state at a given instant.
    pub status: SessionStatus,

    /// When the session was created.
    pub created_at: DateTime<Utc>,
}

impl ClassSession {
    /// Effective status at `at`, treating an open session past its window as closed.
    #[must_use]
    pub fn status_at(&self, at: DateTime<Utc>) -> SessionStatus {
        match self.status {
            SessionStatus::Open if at >= self.window_end => SessionStatus::Closed,
            status => status,
        }
    }

    /// Whether the session accepts check-ins at `at`.
    #[must_use]
    pub fn is_open_at(&self, at: DateTime<Utc>) -> bool {
        self.status_at(at) == SessionStatus::Open
    }

    /// Instant after which a check-in is recorded as late.
    #[must_use]
    pub fn late_after(&self, grace_period: Duration) -> DateTime<Utc> {
        self.window_start + grace_period
    }
}

/// Instructor input for creating a session.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSession {
    /// Course the session belongs to.
    pub course_id: CourseId,
    /// Instructor creating the session.
    pub instructor_id: InstructorId,
    /// Human-readable location.
    pub location_name: String,
    /// Class location.
    pub center: Coordinate,
    /// Check-in radius; the configured default applies when `None`.
    pub radius_meters: Option<f64>,
    /// Scheduled start.
    pub window_start: DateTime<Utc>,
    /// End of the check-in window.
    pub window_end: DateTime<Utc>,
}

/// Owner of all class sessions.
///
/// Every mutation is written through to [`Storage`] when one is attached.
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<SessionId, ClassSession>>,
    storage: Option<Storage>,
    default_radius_meters: f64,
    max_radius_meters: f64,
}

impl SessionRegistry {
    /// Create an empty registry that keeps sessions in memory only.
    #[must_use]
    pub fn in_memory(config: &CheckInConfig) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            storage: None,
            default_radius_meters: config.default_radius_meters,
            max_radius_meters: config.max_radius_meters,
        }
    }

    /// Create a registry backed by `storage`, loading previously saved sessions.
    ///
    /// # Errors
    ///
    /// Returns an error if stored sessions cannot be read.
    pub fn with_storage(storage: Storage, config: &CheckInConfig) -> Result<Self> {
        let sessions: HashMap<_, _> = storage
            .load_sessions()?
            .into_iter()
            .map(|session| (session.id, session))
            .collect();
        info!(count = sessions.len(), "Loaded sessions from storage");

        Ok(Self {
            sessions: Mutex::new(sessions),
            storage: Some(storage),
            default_radius_meters: config.default_radius_meters,
            max_radius_meters: config.max_radius_meters,
        })
    }

    /// Create a session in the `Scheduled` state.
    ///
    /// # Errors
    ///
    /// Returns an error if the location name is blank, the geofence is
    /// invalid or larger than allowed, the window is empty, or the window has
    /// already ended.
    pub fn create_session(&self, new: NewSession, now: DateTime<Utc>) -> Result<ClassSession> {
        if new.location_name.trim().is_empty() {
            return Err(GeoRollError::EmptyLocationName);
        }

        let radius_meters = new.radius_meters.unwrap_or(self.default_radius_meters);
        let geofence = GeoFence::new(new.center, radius_meters)?;
        if radius_meters > self.max_radius_meters {
            return Err(GeoRollError::InvalidGeoFence(format!(
                "Geofence radius {radius_meters}m exceeds the maximum of {}m",
                self.max_radius_meters
            )));
        }

        if new.window_end <= new.window_start {
            return Err(GeoRollError::InvalidSessionWindow {
                start: new.window_start,
                end: new.window_end,
            });
        }

        let session = ClassSession {
            id: SessionId::new(),
            course_id: new.course_id,
            instructor_id: new.instructor_id,
            location_name: new.location_name.trim().to_string(),
            geofence,
            window_start: new.window_start,
            window_end: new.window_end,
            status: SessionStatus::Scheduled,
            created_at: now,
        };
        if now >= session.window_end {
            return Err(GeoRollError::SessionWindowElapsed(session.id));
        }

        let mut sessions = self.lock();
        self.persist(&session)?;
        sessions.insert(session.id, session.clone());

        info!(
            session_id = %session.id,
            course_id = %session.course_id,
            radius_meters,
            "Session created"
        );
        Ok(session)
    }

    /// Open a scheduled session for check-ins.
    ///
    /// Starting an already-open session returns it unchanged. Any other open
    /// session of the same course whose window has ended is closed first.
    ///
    /// # Errors
    ///
    /// Returns an error if the session does not exist, is closed, its window
    /// has ended, or another session of the course is still open.
    pub fn start_session(&self, id: SessionId, now: DateTime<Utc>) -> Result<ClassSession> {
        let mut sessions = self.lock();

        let session = sessions
            .get(&id)
            .cloned()
            .ok_or(GeoRollError::SessionNotFound(id))?;

        match session.status_at(now) {
            SessionStatus::Open => return Ok(session),
            SessionStatus::Closed => return Err(GeoRollError::SessionClosed(id)),
            SessionStatus::Scheduled if now >= session.window_end => {
                return Err(GeoRollError::SessionWindowElapsed(id));
            }
            SessionStatus::Scheduled => {}
        }

        let open_siblings: Vec<ClassSession> = sessions
            .values()
            .filter(|other| {
                other.id != id
                    && other.course_id == session.course_id
                    && other.status == SessionStatus::Open
            })
            .cloned()
            .collect();

        for sibling in open_siblings {
            if sibling.is_open_at(now) {
                return Err(GeoRollError::SessionAlreadyOpen {
                    course_id: session.course_id,
                    session_id: sibling.id,
                });
            }
            let closed = ClassSession {
                status: SessionStatus::Closed,
                ..sibling
            };
            self.persist(&closed)?;
            sessions.insert(closed.id, closed);
        }

        let opened = ClassSession {
            status: SessionStatus::Open,
            ..session
        };
        self.persist(&opened)?;
        sessions.insert(id, opened.clone());

        info!(session_id = %id, course_id = %opened.course_id, "Session opened");
        Ok(opened)
    }

    /// Close a session. Ending an already-closed session returns it unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if the session does not exist or cannot be persisted.
    pub fn end_session(&self, id: SessionId) -> Result<ClassSession> {
        let mut sessions = self.lock();

        let session = sessions
            .get(&id)
            .cloned()
            .ok_or(GeoRollError::SessionNotFound(id))?;
        if session.status == SessionStatus::Closed {
            return Ok(session);
        }

        let closed = ClassSession {
            status: SessionStatus::Closed,
            ..session
        };
        self.persist(&closed)?;
        sessions.insert(id, closed.clone());

        info!(session_id = %id, course_id = %closed.course_id, "Session ended");
        Ok(closed)
    }

    /// Close every open session whose window has ended by `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if a closed session cannot be persisted. Sessions
    /// closed before the failure stay closed.
    pub fn close_expired(&self, now: DateTime<Utc>) -> Result<Vec<SessionId>> {
        let mut sessions = self.lock();

        let expired: Vec<SessionId> = sessions
            .values()
            .filter(|s| s.status == SessionStatus::Open && !s.is_open_at(now))
            .map(|s| s.id)
            .collect();

        for id in &expired {
            if let Some(session) = sessions.get_mut(id) {
                let closed = ClassSession {
                    status: SessionStatus::Closed,
                    ..session.clone()
                };
                self.persist(&closed)?;
                *session = closed;
                info!(session_id = %id, "Session closed at end of window");
            }
        }

        Ok(expired)
    }

    /// Look up a session.
    #[must_use]
    pub fn get(&self, id: SessionId) -> Option<ClassSession> {
        self.lock().get(&id).cloned()
    }

    /// The session of `course_id` that accepts check-ins at `now`, if any.
    #[must_use]
    pub fn open_session_for_course(
        &self,
        course_id: &CourseId,
        now: DateTime<Utc>,
    ) -> Option<ClassSession> {
        self.lock()
            .values()
            .find(|s| &s.course_id == course_id && s.is_open_at(now))
            .cloned()
    }

    /// All sessions of a course, most recent window first.
    #[must_use]
    pub fn sessions_for_course(&self, course_id: &CourseId) -> Vec<ClassSession> {
        let mut sessions: Vec<ClassSession> = self
            .lock()
            .values()
            .filter(|s| &s.course_id == course_id)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.window_start.cmp(&a.window_start));
        sessions
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SessionId, ClassSession>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, session: &ClassSession) -> Result<()> {
        match &self.storage {
            Some(storage) => storage.save_session(session),
            None => Ok(()),
        }
    }
}
