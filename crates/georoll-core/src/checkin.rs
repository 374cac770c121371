//! Geofence check-in evaluation.
//!
//! [`CheckInEvaluator::evaluate`] turns the current session and a location
//! fix into exactly one [`Verdict`]. It is total and stateless: it never
//! fails, never touches storage, and produces the same verdict for the same
//! inputs. Persisting an accepted record, and rejecting a second one for the
//! same student, is the job of
//! [`AttendanceLedger`](crate::attendance::AttendanceLedger).
//!
//! Checks run in a fixed order:
//!
//! 1. no session, or the session is not open at `captured_at` → [`Verdict::NoActiveSession`]
//! 2. no location fix → [`Verdict::LocationUnavailable`]
//! 3. coordinate or accuracy out of range → [`Verdict::InvalidLocation`]
//! 4. farther than the radius → [`Verdict::OutOfRange`]
//! 5. otherwise → [`Verdict::Accepted`]

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;

use crate::attendance::{AttendanceOutcome, AttendanceRecord};
use crate::config::CheckInConfig;
use crate::geo::GeoError;
use crate::location::LocationSample;
use crate::session::{ClassSession, SessionStatus};
use crate::types::StudentId;

/// Outcome of one check-in attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// There is no session, or it is not accepting check-ins.
    NoActiveSession,

    /// The client could not obtain a location fix.
    LocationUnavailable,

    /// The client reported a coordinate or accuracy outside the valid range.
    InvalidLocation(GeoError),

    /// The student is outside the geofence.
    OutOfRange {
        /// Distance from the geofence center in meters.
        distance_meters: f64,
        /// Required radius in meters.
        radius_meters: f64,
    },

    /// The student is inside the geofence; the record is ready to store.
    Accepted(AttendanceRecord),
}

impl Verdict {
    /// Whether the attempt produced an attendance record.
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }

    /// Whether the student can usefully try again right away.
    ///
    /// Invalid locations point at a broken location provider, so they are
    /// not retried automatically.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NoActiveSession | Self::LocationUnavailable | Self::OutOfRange { .. }
        )
    }

    /// Machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NoActiveSession => "no_active_session",
            Self::LocationUnavailable => "location_unavailable",
            Self::InvalidLocation(_) => "invalid_location",
            Self::OutOfRange { .. } => "out_of_range",
            Self::Accepted(_) => "accepted",
        }
    }

    /// User-facing explanation.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::NoActiveSession => {
                "There is no active session to check in to. Wait for your instructor to start one."
                    .to_string()
            }
            Self::LocationUnavailable => {
                "Unable to retrieve your location. Please try again.".to_string()
            }
            Self::InvalidLocation(err) => format!("The reported location is invalid: {err}"),
            Self::OutOfRange {
                distance_meters,
                radius_meters,
            } => format!(
                "You are {}m away from the class location. You need to be within {}m to check in.",
                round_meters(*distance_meters),
                round_meters(*radius_meters)
            ),
            Self::Accepted(record) => match record.outcome {
                AttendanceOutcome::Present => "Check-in successful".to_string(),
                AttendanceOutcome::Late => "Check-in successful (late)".to_string(),
            },
        }
    }
}

/// Live distance feedback shown before the student commits a check-in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "distance_meters": 5.56,
    "rounded_meters": 6,
    "radius_meters": 50.0,
    "within_range": true,
    "accuracy_meters": 12
}))]
pub struct DistanceReport {
    /// Exact distance from the geofence center in meters.
    pub distance_meters: f64,

    /// Distance rounded to the nearest meter, for display.
    pub rounded_meters: u64,

    /// Required radius in meters.
    pub radius_meters: f64,

    /// Whether a check-in at this position would be accepted.
    pub within_range: bool,

    /// Reported GPS accuracy rounded to the nearest meter.
    pub accuracy_meters: u64,
}

/// Live distance between a student and an open session's geofence.
///
/// Returns `None` unless a session open at `sample.captured_at` and a valid
/// sample are both present. This is a pure query; calling it does not
/// affect later evaluations.
#[must_use]
pub fn current_distance(
    session: Option<&ClassSession>,
    sample: Option<&LocationSample>,
) -> Option<DistanceReport> {
    let (session, sample) = (session?, sample?);
    if !session.is_open_at(sample.captured_at) || sample.validate().is_err() {
        return None;
    }

    let distance_meters = session.geofence.distance_from_center(&sample.coordinate);
    Some(DistanceReport {
        distance_meters,
        rounded_meters: round_meters(distance_meters),
        radius_meters: session.geofence.radius_meters,
        within_range: session.geofence.admits(distance_meters),
        accuracy_meters: round_meters(sample.accuracy_meters),
    })
}

/// Decides check-in attempts against a session's geofence and window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckInEvaluator {
    grace_period: Duration,
}

impl Default for CheckInEvaluator {
    fn default() -> Self {
        Self::from_config(&CheckInConfig::default())
    }
}

impl CheckInEvaluator {
    /// Create an evaluator with an explicit lateness grace period.
    #[must_use]
    pub const fn new(grace_period: Duration) -> Self {
        Self { grace_period }
    }

    /// Create an evaluator from configuration.
    #[must_use]
    pub fn from_config(config: &CheckInConfig) -> Self {
        Self::new(config.grace_period())
    }

    /// Time after a session's window start during which check-ins count as present.
    #[must_use]
    pub const fn grace_period(&self) -> Duration {
        self.grace_period
    }

    /// Evaluate one check-in attempt.
    #[must_use]
    pub fn evaluate(
        &self,
        session: Option<&ClassSession>,
        student_id: &StudentId,
        sample: Option<&LocationSample>,
    ) -> Verdict {
        let verdict = self.decide(session, student_id, sample);
        debug!(
            student_id = %student_id,
            session_id = ?session.map(|s| s.id),
            verdict = verdict.code(),
            "Check-in evaluated"
        );
        verdict
    }

    /// Present or late for a check-in at `captured_at`.
    #[must_use]
    pub fn outcome_at(&self, session: &ClassSession, captured_at: DateTime<Utc>) -> AttendanceOutcome {
        if captured_at > session.late_after(self.grace_period) {
            AttendanceOutcome::Late
        } else {
            AttendanceOutcome::Present
        }
    }

    fn decide(
        &self,
        session: Option<&ClassSession>,
        student_id: &StudentId,
        sample: Option<&LocationSample>,
    ) -> Verdict {
        let Some(session) = session else {
            return Verdict::NoActiveSession;
        };
        let Some(sample) = sample else {
            // Without a fix there is no capture time; judge by stored status.
            return if session.status == SessionStatus::Open {
                Verdict::LocationUnavailable
            } else {
                Verdict::NoActiveSession
            };
        };
        if !session.is_open_at(sample.captured_at) {
            return Verdict::NoActiveSession;
        }
        if let Err(err) = sample.validate() {
            return Verdict::InvalidLocation(err);
        }

        let distance_meters = session.geofence.distance_from_center(&sample.coordinate);
        if !session.geofence.admits(distance_meters) {
            return Verdict::OutOfRange {
                distance_meters,
                radius_meters: session.geofence.radius_meters,
            };
        }

        Verdict::Accepted(AttendanceRecord::accepted(
            session,
            student_id.clone(),
            sample,
            distance_meters,
            self.outcome_at(session, sample.captured_at),
        ))
    }
}

/// Round a non-negative length to whole meters for display.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn round_meters(meters: f64) -> u64 {
    meters.max(0.0).round() as u64
}
