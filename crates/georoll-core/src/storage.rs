//! Persistent storage for sessions and attendance records.
//!
//! Uses one JSON file per session under `sessions/` and one JSON file per
//! session's attendance list under `attendance/`, both keyed by session id.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::attendance::AttendanceRecord;
use crate::error::{GeoRollError, Result};
use crate::session::ClassSession;
use crate::types::SessionId;

const SESSIONS_DIR: &str = "sessions";
const ATTENDANCE_DIR: &str = "attendance";

/// Storage backend for georoll data.
#[derive(Debug, Clone)]
pub struct Storage {
    data_dir: PathBuf,
}

impl Storage {
    /// Create a new storage instance.
    ///
    /// # Arguments
    ///
    /// * `data_dir` - Directory to store data files
    #[must_use]
    pub const fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    /// Get the default storage location.
    ///
    /// On Linux: `/var/lib/georoll/`
    /// Elsewhere: the platform data directory (e.g. `~/Library/Application Support/georoll`)
    ///
    /// # Errors
    ///
    /// Returns an error if no data directory can be determined.
    pub fn default_location() -> Result<Self> {
        #[cfg(target_os = "linux")]
        {
            Ok(Self::new(PathBuf::from("/var/lib/georoll")))
        }
        #[cfg(not(target_os = "linux"))]
        {
            let dirs = directories::ProjectDirs::from("", "", "georoll").ok_or_else(|| {
                GeoRollError::PersistenceError("Cannot determine data directory".into())
            })?;
            Ok(Self::new(dirs.data_dir().to_path_buf()))
        }
    }

    /// Root directory of this store.
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Load a single session.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_session(&self, id: SessionId) -> Result<Option<ClassSession>> {
        read_json(&self.session_path(id))
    }

    /// Load every stored session, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or any session file cannot be read.
    pub fn load_sessions(&self) -> Result<Vec<ClassSession>> {
        self.load_dir(SESSIONS_DIR)
    }

    /// Save (create or replace) a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_session(&self, session: &ClassSession) -> Result<()> {
        write_json(&self.session_path(session.id), session)
    }

    /// Load the attendance records of one session.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_attendance(&self, session_id: SessionId) -> Result<Option<Vec<AttendanceRecord>>> {
        read_json(&self.attendance_path(session_id))
    }

    /// Load every stored attendance list.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or any attendance file cannot be read.
    pub fn load_all_attendance(&self) -> Result<Vec<Vec<AttendanceRecord>>> {
        self.load_dir(ATTENDANCE_DIR)
    }

    /// Save (replace) the attendance records of one session.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_attendance(&self, session_id: SessionId, records: &[AttendanceRecord]) -> Result<()> {
        write_json(&self.attendance_path(session_id), &records)
    }

    fn session_path(&self, id: SessionId) -> PathBuf {
        self.data_dir.join(SESSIONS_DIR).join(format!("{id}.json"))
    }

    fn attendance_path(&self, id: SessionId) -> PathBuf {
        self.data_dir.join(ATTENDANCE_DIR).join(format!("{id}.json"))
    }

    fn load_dir<T: DeserializeOwned>(&self, name: &str) -> Result<Vec<T>> {
        let dir = self.data_dir.join(name);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut items = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(item) = read_json(&path)? {
                items.push(item);
            }
        }
        Ok(items)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)?;
    let value = serde_json::from_str(&content).map_err(|e| {
        tracing::warn!(path = %path.display(), error = %e, "Malformed data file");
        GeoRollError::DataFormatError(e)
    })?;
    Ok(Some(value))
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(value)?;
    // Readers must never observe a partially written file.
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, content)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::AttendanceOutcome;
    use crate::geo::{Coordinate, GeoFence};
    use crate::session::SessionStatus;
    use crate::types::{CourseId, InstructorId, StudentId};
    use chrono::{Duration, Utc};
    use tempfile::TempDir;

    fn session() -> ClassSession {
        let now = Utc::now();
        ClassSession {
            id: SessionId::new(),
            course_id: CourseId::new("CS101"),
            instructor_id: InstructorId::new("instructor-1"),
            location_name: "Room 101".to_string(),
            geofence: GeoFence::new(Coordinate::new(40.7128, -74.0060), 50.0).unwrap(),
            window_start: now,
            window_end: now + Duration::hours(1),
            status: SessionStatus::Open,
            created_at: now,
        }
    }

    fn record(session_id: SessionId, student: &str) -> AttendanceRecord {
        AttendanceRecord {
            session_id,
            student_id: StudentId::new(student),
            coordinate: Coordinate::new(40.71285, -74.0060),
            accuracy_meters: 8.0,
            distance_meters: 5.56,
            captured_at: Utc::now(),
            outcome: AttendanceOutcome::Present,
        }
    }

    #[test]
    fn test_missing_files_load_as_none() {
        let dir = TempDir::new().unwrap();
        let storage = Storage::new(dir.path().to_path_buf());

        assert!(storage.load_session(SessionId::new()).unwrap().is_none());
        assert!(storage.load_attendance(SessionId::new()).unwrap().is_none());
        assert!(storage.load_sessions().unwrap().is_empty());
        assert!(storage.load_all_attendance().unwrap().is_empty());
    }

    #[test]
    fn test_session_save_and_load() {
        let dir = TempDir::new().unwrap();
        let storage = Storage::new(dir.path().to_path_buf());
        let session = session();

        storage.save_session(&session).unwrap();

        assert_eq!(storage.load_session(session.id).unwrap(), Some(session.clone()));
        assert_eq!(storage.load_sessions().unwrap(), vec![session]);
    }

    #[test]
    fn test_attendance_save_replaces_previous_list() {
        let dir = TempDir::new().unwrap();
        let storage = Storage::new(dir.path().to_path_buf());
        let session_id = SessionId::new();

        storage
            .save_attendance(session_id, &[record(session_id, "a")])
            .unwrap();
        storage
            .save_attendance(session_id, &[record(session_id, "a"), record(session_id, "b")])
            .unwrap();

        let loaded = storage.load_attendance(session_id).unwrap().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(storage.load_all_attendance().unwrap().len(), 1);
    }

    #[test]
    fn test_malformed_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let storage = Storage::new(dir.path().to_path_buf());
        let id = SessionId::new();

        let path = dir.path().join(SESSIONS_DIR).join(format!("{id}.json"));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            storage.load_session(id),
            Err(GeoRollError::DataFormatError(_))
        ));
    }

    #[test]
    fn test_non_json_files_are_ignored() {
        let dir = TempDir::new().unwrap();
        let storage = Storage::new(dir.path().to_path_buf());
        storage.save_session(&session()).unwrap();
        std::fs::write(dir.path().join(SESSIONS_DIR).join("notes.txt"), "hello").unwrap();

        assert_eq!(storage.load_sessions().unwrap().len(), 1);
    }
}
