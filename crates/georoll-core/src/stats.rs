//! Attendance summaries for instructors and students.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::attendance::{AttendanceOutcome, AttendanceRecord, StudentHistory};
use crate::types::{CourseId, SessionId, StudentId};

/// Head count for one session.
///
/// `absent` and `attendance_percentage` need the roster size, which this
/// crate does not own, so they are only filled in when the caller supplies
/// the number of expected students. A roster smaller than the head count is
/// raised to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "session_id": "01936f4e-8b7a-7c3d-9f21-4a5b6c7d8e9f",
    "present": 18,
    "late": 3,
    "total_checked_in": 21,
    "expected_students": 25,
    "absent": 4,
    "attendance_percentage": 84.0
}))]
pub struct SessionSummary {
    /// Session summarized.
    pub session_id: SessionId,
    /// Students checked in on time.
    pub present: usize,
    /// Students checked in after the grace period.
    pub late: usize,
    /// `present + late`.
    pub total_checked_in: usize,
    /// Roster size, when known.
    pub expected_students: Option<usize>,
    /// Expected students without a record.
    pub absent: Option<usize>,
    /// Share of expected students who checked in, 0-100, two decimals.
    pub attendance_percentage: Option<f64>,
}

impl SessionSummary {
    /// Summarize the records of one session.
    #[must_use]
    pub fn from_records(
        session_id: SessionId,
        records: &[AttendanceRecord],
        expected_students: Option<usize>,
    ) -> Self {
        let (present, late) = count_outcomes(records);
        let total_checked_in = present + late;
        let expected_students = expected_students.map(|expected| expected.max(total_checked_in));

        Self {
            session_id,
            present,
            late,
            total_checked_in,
            expected_students,
            absent: expected_students.map(|expected| expected - total_checked_in),
            attendance_percentage: expected_students.map(|expected| percentage(total_checked_in, expected)),
        }
    }
}

/// Attendance totals for one student across sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StudentStatistics {
    /// Student summarized.
    pub student_id: StudentId,
    /// Sessions attended on time.
    pub present: usize,
    /// Sessions attended late.
    pub late: usize,
    /// Sessions counted as held. Equals `present + late` unless the caller
    /// supplies the number of sessions the student was expected at.
    pub total_sessions: usize,
    /// Sessions attended out of `total_sessions`, 0-100, two decimals.
    pub attendance_percentage: f64,
}

impl StudentStatistics {
    /// Summarize a student's history.
    ///
    /// `total_sessions` defaults to the number of records in the history; a
    /// smaller value is raised to it.
    #[must_use]
    pub fn from_history(
        student_id: StudentId,
        history: &StudentHistory,
        total_sessions: Option<usize>,
    ) -> Self {
        let attended = history.present + history.late;
        let total_sessions = total_sessions.map_or(attended, |total| total.max(attended));

        Self {
            student_id,
            present: history.present,
            late: history.late,
            total_sessions,
            attendance_percentage: percentage(attended, total_sessions),
        }
    }
}

/// Attendance across every session of a course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "course_id": "CS101",
    "total_sessions": 4,
    "total_records": 90,
    "present": 80,
    "late": 10,
    "enrolled_students": 25,
    "absent": 10,
    "attendance_percentage": 90.0
}))]
pub struct CourseSummary {
    /// Course summarized.
    pub course_id: CourseId,
    /// Sessions created for the course.
    pub total_sessions: usize,
    /// Attendance records across those sessions.
    pub total_records: usize,
    /// Records checked in on time.
    pub present: usize,
    /// Records checked in late.
    pub late: usize,
    /// Students enrolled, when known.
    pub enrolled_students: Option<usize>,
    /// Student-sessions without a record.
    pub absent: Option<usize>,
    /// Records out of `total_sessions * enrolled_students`, 0-100, two decimals.
    pub attendance_percentage: Option<f64>,
}

impl CourseSummary {
    /// Summarize the records of a course's sessions.
    ///
    /// Every student-session slot is expected to hold at most one record, so
    /// `total_sessions * enrolled_students` is raised to the record count
    /// when it falls short.
    #[must_use]
    pub fn from_records(
        course_id: CourseId,
        total_sessions: usize,
        records: &[AttendanceRecord],
        enrolled_students: Option<usize>,
    ) -> Self {
        let (present, late) = count_outcomes(records);
        let total_records = present + late;
        let possible = enrolled_students
            .map(|enrolled| enrolled.saturating_mul(total_sessions).max(total_records));

        Self {
            course_id,
            total_sessions,
            total_records,
            present,
            late,
            enrolled_students,
            absent: possible.map(|possible| possible - total_records),
            attendance_percentage: possible.map(|possible| percentage(total_records, possible)),
        }
    }
}

fn count_outcomes(records: &[AttendanceRecord]) -> (usize, usize) {
    records
        .iter()
        .fold((0, 0), |(present, late), record| match record.outcome {
            AttendanceOutcome::Present => (present + 1, late),
            AttendanceOutcome::Late => (present, late + 1),
        })
}

#[allow(clippy::cast_precision_loss)]
fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    let raw = part as f64 / whole as f64 * 100.0;
    (raw * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Coordinate;
    use chrono::Utc;

    fn records(present: usize, late: usize) -> Vec<AttendanceRecord> {
        let session_id = SessionId::new();
        (0..present + late)
            .map(|i| AttendanceRecord {
                session_id,
                student_id: StudentId::new(format!("student-{i}")),
                coordinate: Coordinate::new(40.71285, -74.0060),
                accuracy_meters: 8.0,
                distance_meters: 5.56,
                captured_at: Utc::now(),
                outcome: if i < present {
                    AttendanceOutcome::Present
                } else {
                    AttendanceOutcome::Late
                },
            })
            .collect()
    }

    #[test]
    fn test_session_summary_without_roster() {
        let summary = SessionSummary::from_records(SessionId::new(), &records(4, 2), None);

        assert_eq!(summary.present, 4);
        assert_eq!(summary.late, 2);
        assert_eq!(summary.total_checked_in, 6);
        assert_eq!(summary.absent, None);
        assert_eq!(summary.attendance_percentage, None);
    }

    #[test]
    fn test_session_summary_with_roster() {
        let summary = SessionSummary::from_records(SessionId::new(), &records(1, 1), Some(3));

        assert_eq!(summary.absent, Some(1));
        assert_eq!(summary.attendance_percentage, Some(66.67));
    }

    #[test]
    fn test_empty_roster_is_zero_percent() {
        let summary = SessionSummary::from_records(SessionId::new(), &[], Some(0));
        assert_eq!(summary.absent, Some(0));
        assert_eq!(summary.attendance_percentage, Some(0.0));
    }

    #[test]
    fn test_short_roster_is_raised_to_head_count() {
        let summary = SessionSummary::from_records(SessionId::new(), &records(5, 0), Some(3));

        assert_eq!(summary.expected_students, Some(5));
        assert_eq!(summary.absent, Some(0));
        assert_eq!(summary.attendance_percentage, Some(100.0));
    }

    fn history(present: usize, late: usize) -> StudentHistory {
        StudentHistory {
            records: records(present, late),
            total_count: present + late,
            present,
            late,
        }
    }

    #[test]
    fn test_student_statistics() {
        let student = StudentId::new("alice");

        let stats = StudentStatistics::from_history(student.clone(), &history(3, 1), None);
        assert_eq!(stats.total_sessions, 4);
        assert!((stats.attendance_percentage - 100.0).abs() < f64::EPSILON);

        let stats = StudentStatistics::from_history(student.clone(), &history(3, 1), Some(8));
        assert_eq!(stats.total_sessions, 8);
        assert!((stats.attendance_percentage - 50.0).abs() < f64::EPSILON);

        let stats = StudentStatistics::from_history(student, &history(2, 0), Some(1));
        assert_eq!(stats.total_sessions, 2);
    }

    #[test]
    fn test_student_statistics_count_all_pages() {
        let mut page = history(3, 2);
        page.records.truncate(1);

        let stats = StudentStatistics::from_history(StudentId::new("alice"), &page, Some(10));
        assert_eq!(stats.present, 3);
        assert_eq!(stats.late, 2);
        assert!((stats.attendance_percentage - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_course_summary() {
        let course = CourseId::new("CS101");

        let summary = CourseSummary::from_records(course.clone(), 2, &records(4, 1), Some(5));
        assert_eq!(summary.total_records, 5);
        assert_eq!(summary.present, 4);
        assert_eq!(summary.late, 1);
        assert_eq!(summary.absent, Some(5));
        assert_eq!(summary.attendance_percentage, Some(50.0));

        let summary = CourseSummary::from_records(course.clone(), 2, &records(4, 1), None);
        assert_eq!(summary.absent, None);
        assert_eq!(summary.attendance_percentage, None);

        let empty = CourseSummary::from_records(course, 0, &[], Some(30));
        assert_eq!(empty.absent, Some(0));
        assert_eq!(empty.attendance_percentage, Some(0.0));
    }

    #[test]
    fn test_course_summary_never_exceeds_full_attendance() {
        let summary = CourseSummary::from_records(CourseId::new("CS101"), 1, &records(6, 0), Some(4));
        assert_eq!(summary.absent, Some(0));
        assert_eq!(summary.attendance_percentage, Some(100.0));
    }
}
