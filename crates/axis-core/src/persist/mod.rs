//! Durable snapshots of the submission logbooks.
//!
//! All logbooks serialise into one self-describing snapshot document with a
//! versioned schema field. Writes are atomic (write-new-then-swap), so a
//! concurrent reader always sees either the previous or the new complete
//! snapshot; loading reconstructs the exact prior state. Document bytes are
//! not part of the snapshot; they already live immutably in the document
//! store's directory tree with sidecar manifests.

pub mod fs;

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::logbook::{LogbookStore, SubmissionLogbook};
use self::fs::{DEFAULT_MAX_FILE_SIZE, FsError, atomic_write_json, bounded_read_json};

/// Current snapshot schema version.
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

/// Errors from snapshot persistence. Non-recoverable: a failed save or
/// load halts further work rather than running on partial state.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PersistError {
    /// Underlying filesystem or serialisation failure.
    #[error("persistence unavailable: {0}")]
    Storage(#[from] FsError),

    /// The snapshot declares a schema version this build does not read.
    #[error("unsupported snapshot schema version {found}, supported {supported}")]
    UnsupportedSchema {
        /// Version found in the file.
        found: u32,
        /// Version this build supports.
        supported: u32,
    },
}

/// The serialised snapshot document.
#[derive(Debug, Serialize, Deserialize)]
struct SnapshotDocument {
    schema_version: u32,
    saved_at: DateTime<Utc>,
    logbooks: Vec<SubmissionLogbook>,
}

/// Writes every logbook to a snapshot file atomically.
///
/// Logbooks are deep-copied out of the store under read locks before any
/// I/O happens, so writers are not blocked for the duration of the disk
/// write and the snapshot is internally consistent.
///
/// # Errors
///
/// [`PersistError::Storage`] when the write fails.
pub fn save_snapshot(store: &LogbookStore, path: &Path) -> Result<(), PersistError> {
    let document = SnapshotDocument {
        schema_version: SNAPSHOT_SCHEMA_VERSION,
        saved_at: Utc::now(),
        logbooks: store.export_all(),
    };
    atomic_write_json(path, &document)?;
    info!(
        path = %path.display(),
        logbooks = document.logbooks.len(),
        "snapshot saved"
    );
    Ok(())
}

/// Loads a snapshot file back into a store, reconstructing prior state.
///
/// # Errors
///
/// - [`PersistError::Storage`] when the file cannot be read or parsed.
/// - [`PersistError::UnsupportedSchema`] for a schema version this build
///   does not read.
pub fn load_snapshot(path: &Path) -> Result<LogbookStore, PersistError> {
    let document: SnapshotDocument = bounded_read_json(path, DEFAULT_MAX_FILE_SIZE)?;
    if document.schema_version != SNAPSHOT_SCHEMA_VERSION {
        return Err(PersistError::UnsupportedSchema {
            found: document.schema_version,
            supported: SNAPSHOT_SCHEMA_VERSION,
        });
    }
    info!(
        path = %path.display(),
        logbooks = document.logbooks.len(),
        "snapshot loaded"
    );
    Ok(LogbookStore::from_logbooks(document.logbooks))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logbook::{
        AgentSubmission, SaleRoute, SubmissionStatus, generate_submission_id,
    };
    use crate::schema::{PropertyType, Tenure};

    fn submission() -> AgentSubmission {
        AgentSubmission {
            property_id: String::new(),
            submission_id: generate_submission_id(),
            full_address: "72 Coldharbour Lane, London".to_string(),
            postcode: "SE5 9PU".to_string(),
            property_type: PropertyType::Maisonette,
            tenure: Tenure::Leasehold,
            floor_area_sqm: 84,
            guide_price: 425_000,
            sale_route: SaleRoute::Auction,
            agent_firm: "Hartley & Co".to_string(),
            agent_name: "R. Hartley".to_string(),
            agent_email: "rh@hartley.example".to_string(),
            bedrooms: Some(2),
            bathrooms: Some(1),
            year_built: None,
            council_tax_band: Some('C'),
            epc_rating: Some('D'),
            lease_years_remaining: Some(96),
            ground_rent_annual: Some(250),
            service_charge_annual: Some(1_800),
            has_planning_application: false,
            documents: Vec::new(),
            submitted_at: None,
            status: SubmissionStatus::Incomplete,
        }
    }

    #[test]
    fn snapshot_round_trip_reconstructs_exact_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("submissions.json");

        let store = LogbookStore::new();
        let id = store.create(submission()).unwrap();
        store
            .change_status(
                &id,
                SubmissionStatus::Withdrawn,
                "rh@hartley.example",
                None,
            )
            .unwrap();

        save_snapshot(&store, &path).unwrap();
        let restored = load_snapshot(&path).unwrap();

        assert_eq!(restored.property_ids(), store.property_ids());
        assert_eq!(restored.history(&id).unwrap(), store.history(&id).unwrap());
        assert_eq!(
            restored.current_snapshot(&id).unwrap(),
            store.current_snapshot(&id).unwrap()
        );
        // The restored chain still verifies.
        assert_eq!(
            restored
                .with_logbook(&id, |logbook| logbook.verify_chain())
                .unwrap(),
            None
        );
    }

    #[test]
    fn snapshot_is_self_describing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("submissions.json");
        save_snapshot(&LogbookStore::new(), &path).unwrap();

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["schema_version"], 1);
        assert!(raw["saved_at"].is_string());
        assert!(raw["logbooks"].is_array());
    }

    #[test]
    fn unknown_schema_version_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("submissions.json");
        fs::atomic_write(
            &path,
            b"{\"schema_version\": 99, \"saved_at\": \"2026-01-01T00:00:00Z\", \"logbooks\": []}",
        )
        .unwrap();
        let err = load_snapshot(&path).unwrap_err();
        assert!(matches!(err, PersistError::UnsupportedSchema { found: 99, .. }));
    }
}
