//! Application state shared across handlers.

use std::sync::Arc;

use georoll_core::{
    AttendanceLedger, CheckInEvaluator, GeoRollConfig, Result, SessionRegistry, Storage,
};
use tokio::sync::RwLock;
use tracing::info;

/// Shared handle to application state.
pub type SharedState = Arc<RwLock<AppState>>;

/// Application state.
///
/// The registry and ledger synchronize internally, so handlers only need a
/// read guard.
#[derive(Debug)]
pub struct AppState {
    /// Loaded configuration.
    pub config: GeoRollConfig,
    /// All class sessions.
    pub registry: SessionRegistry,
    /// All attendance records.
    pub ledger: AttendanceLedger,
    /// Check-in policy.
    pub evaluator: CheckInEvaluator,
}

impl AppState {
    /// Create state from configuration, loading persisted data when enabled.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory cannot be determined or stored
    /// data cannot be read.
    pub fn new(config: GeoRollConfig) -> Result<Self> {
        if !config.storage.persist {
            return Ok(Self::in_memory(config));
        }

        let storage = match &config.storage.data_dir {
            Some(dir) => Storage::new(dir.clone()),
            None => Storage::default_location()?,
        };
        info!(data_dir = %storage.data_dir().display(), "Using persistent storage");

        Ok(Self {
            registry: SessionRegistry::with_storage(storage.clone(), &config.checkin)?,
            ledger: AttendanceLedger::with_storage(storage)?,
            evaluator: CheckInEvaluator::from_config(&config.checkin),
            config,
        })
    }

    /// Create state that keeps everything in memory.
    #[must_use]
    pub fn in_memory(config: GeoRollConfig) -> Self {
        Self {
            registry: SessionRegistry::in_memory(&config.checkin),
            ledger: AttendanceLedger::in_memory(),
            evaluator: CheckInEvaluator::from_config(&config.checkin),
            config,
        }
    }

    /// Wrap into a [`SharedState`].
    #[must_use]
    pub fn into_shared(self) -> SharedState {
        Arc::new(RwLock::new(self))
    }
}
