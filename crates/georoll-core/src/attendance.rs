//! Attendance records and the append-only ledger that stores them.
//!
//! The ledger is the single place where "at most one record per student per
//! session" is enforced: [`AttendanceLedger::record`] checks and inserts under
//! one lock, so two concurrent accepted check-ins for the same pair cannot
//! both be stored.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::error::{GeoRollError, Result};
use crate::geo::Coordinate;
use crate::location::LocationSample;
use crate::session::ClassSession;
use crate::storage::Storage;
use crate::types::{SessionId, StudentId};

/// Default page size for student attendance history.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// How a successful check-in is classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceOutcome {
    /// Checked in within the grace period.
    Present,
    /// Checked in after the grace period.
    Late,
}

/// Proof that a student checked in to a session from inside its geofence.
///
/// Records are only built by an accepted check-in evaluation, or loaded back
/// from storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[non_exhaustive]
pub struct AttendanceRecord {
    /// Session checked in to.
    pub session_id: SessionId,

    /// Student who checked in.
    pub student_id: StudentId,

    /// Reported position at check-in.
    pub coordinate: Coordinate,

    /// Reported GPS accuracy in meters.
    #[schema(example = 8.0)]
    pub accuracy_meters: f64,

    /// Distance from the session's geofence center in meters.
    #[schema(example = 5.56)]
    pub distance_meters: f64,

    /// When the location fix was taken.
    pub captured_at: DateTime<Utc>,

    /// Present or late.
    pub outcome: AttendanceOutcome,
}

impl AttendanceRecord {
    pub(crate) fn accepted(
        session: &ClassSession,
        student_id: StudentId,
        sample: &LocationSample,
        distance_meters: f64,
        outcome: AttendanceOutcome,
    ) -> Self {
        debug_assert!(
            session.geofence.admits(distance_meters),
            "record at {distance_meters}m is outside the {}m geofence",
            session.geofence.radius_meters
        );
        Self {
            session_id: session.id,
            student_id,
            coordinate: sample.coordinate,
            accuracy_meters: sample.accuracy_meters,
            distance_meters,
            captured_at: sample.captured_at,
            outcome,
        }
    }
}

/// One page of a student's attendance history.
#[derive(Debug, Clone, PartialEq)]
pub struct StudentHistory {
    /// Records on this page, newest first.
    pub records: Vec<AttendanceRecord>,
    /// Records across all pages.
    pub total_count: usize,
    /// On-time records across all pages.
    pub present: usize,
    /// Late records across all pages.
    pub late: usize,
}

/// Append-only store of attendance records, keyed by session.
#[derive(Debug)]
pub struct AttendanceLedger {
    records: Mutex<HashMap<SessionId, Vec<AttendanceRecord>>>,
    storage: Option<Storage>,
}

impl Default for AttendanceLedger {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl AttendanceLedger {
    /// Create an empty ledger that keeps records in memory only.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            storage: None,
        }
    }

    /// Create a ledger backed by `storage`, loading previously saved records.
    ///
    /// # Errors
    ///
    /// Returns an error if stored records cannot be read.
    pub fn with_storage(storage: Storage) -> Result<Self> {
        let mut records: HashMap<SessionId, Vec<AttendanceRecord>> = HashMap::new();
        for list in storage.load_all_attendance()? {
            for record in list {
                records.entry(record.session_id).or_default().push(record);
            }
        }
        info!(sessions = records.len(), "Loaded attendance from storage");

        Ok(Self {
            records: Mutex::new(records),
            storage: Some(storage),
        })
    }

    /// Store a record unless the student already checked in to the session.
    ///
    /// # Errors
    ///
    /// Returns [`GeoRollError::DuplicateAttendance`] if a record for the same
    /// (session, student) pair exists, or a persistence error if the record
    /// cannot be written. Nothing is stored in either case.
    pub fn record(&self, record: AttendanceRecord) -> Result<AttendanceRecord> {
        let mut records = self.lock();
        let session_records = records.entry(record.session_id).or_default();

        if session_records
            .iter()
            .any(|existing| existing.student_id == record.student_id)
        {
            return Err(GeoRollError::DuplicateAttendance {
                session_id: record.session_id,
                student_id: record.student_id,
            });
        }

        session_records.push(record.clone());
        if let Some(storage) = &self.storage {
            if let Err(err) = storage.save_attendance(record.session_id, session_records) {
                session_records.pop();
                warn!(
                    session_id = %record.session_id,
                    student_id = %record.student_id,
                    error = %err,
                    "Failed to persist attendance record"
                );
                return Err(err);
            }
        }

        info!(
            session_id = %record.session_id,
            student_id = %record.student_id,
            outcome = ?record.outcome,
            distance_meters = record.distance_meters,
            "Attendance recorded"
        );
        Ok(record)
    }

    /// Whether the student has a record for the session.
    #[must_use]
    pub fn has_checked_in(&self, session_id: SessionId, student_id: &StudentId) -> bool {
        self.lock()
            .get(&session_id)
            .is_some_and(|list| list.iter().any(|r| &r.student_id == student_id))
    }

    /// All records of a session in check-in order.
    #[must_use]
    pub fn records_for_session(&self, session_id: SessionId) -> Vec<AttendanceRecord> {
        self.lock().get(&session_id).cloned().unwrap_or_default()
    }

    /// One page of a student's history, newest first.
    ///
    /// When `sessions` is given, only records of those sessions count, both
    /// for the page and for the totals.
    #[must_use]
    pub fn history_for_student(
        &self,
        student_id: &StudentId,
        sessions: Option<&HashSet<SessionId>>,
        offset: usize,
        limit: usize,
    ) -> StudentHistory {
        let mut all: Vec<AttendanceRecord> = self
            .lock()
            .iter()
            .filter(|(id, _)| sessions.map_or(true, |wanted| wanted.contains(id)))
            .flat_map(|(_, list)| list.iter())
            .filter(|r| &r.student_id == student_id)
            .cloned()
            .collect();
        all.sort_by(|a, b| b.captured_at.cmp(&a.captured_at));

        let total_count = all.len();
        let late = all
            .iter()
            .filter(|r| r.outcome == AttendanceOutcome::Late)
            .count();
        let records = all.into_iter().skip(offset).take(limit).collect();

        StudentHistory {
            records,
            total_count,
            present: total_count - late,
            late,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SessionId, Vec<AttendanceRecord>>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
