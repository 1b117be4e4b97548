//! The append-only submission logbook.
//!
//! A logbook is born with version 1 at submission and thereafter only
//! grows. No version is ever rewritten or deleted, snapshots are deep
//! copies, and the current status is always the status of the latest
//! version. Status movement is constrained by a fixed transition table;
//! anything outside it fails with a stable `ILLEGAL_STATUS_TRANSITION`
//! code.
//!
//! ```text
//! draft -> incomplete -> submitted -> under_review -> evaluated
//!                                          |-> unevaluated -> evaluated
//! evaluated -> approved | rejected | archived
//! any non-terminal -> withdrawn
//! ```

mod store;
mod submission;
mod version;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub use store::{LogbookStore, VersionHeader};
pub use submission::{
    AgentSubmission, FieldError, FieldErrorCode, FormValidation, REQUIRED_SUBMISSION_FIELDS,
    SaleRoute, SubmissionForm, SubmissionStatus, create_submission, generate_property_id,
    generate_submission_id, required_document_types, validate_form,
};
pub use version::{SubmissionVersion, VersionAction, verify_hash_chain};

/// Errors from logbook operations. Codes are stable tokens.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LogbookError {
    /// The requested status movement is not in the transition table.
    #[error("illegal status transition: {from} -> {to}")]
    IllegalStatusTransition {
        /// Status before the attempted transition.
        from: SubmissionStatus,
        /// The status that was requested.
        to: SubmissionStatus,
    },

    /// No logbook exists for the property id.
    #[error("unknown property: {property_id}")]
    UnknownProperty {
        /// The unknown property id.
        property_id: String,
    },

    /// The logbook has no version with that number.
    #[error("version {version_number} not found for property {property_id}")]
    VersionNotFound {
        /// The property id.
        property_id: String,
        /// The missing version number.
        version_number: u32,
    },

    /// A logbook already exists for the property id.
    #[error("property already exists: {property_id}")]
    DuplicateProperty {
        /// The conflicting property id.
        property_id: String,
    },

    /// The submission is not eligible for export to the Deal Engine.
    #[error("submission not exportable: {detail}")]
    NotExportable {
        /// Why the export was refused.
        detail: String,
    },
}

impl LogbookError {
    /// Stable wire token for this error.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::IllegalStatusTransition { .. } => "ILLEGAL_STATUS_TRANSITION",
            Self::UnknownProperty { .. } => "UNKNOWN_PROPERTY",
            Self::VersionNotFound { .. } => "VERSION_NOT_FOUND",
            Self::DuplicateProperty { .. } => "DUPLICATE_PROPERTY",
            Self::NotExportable { .. } => "NOT_EXPORTABLE",
        }
    }
}

/// Returns true when the status machine allows `from -> to`.
///
/// Staying on the same status is not a transition and is always allowed
/// for non-status-changing appends.
#[must_use]
pub fn transition_allowed(from: SubmissionStatus, to: SubmissionStatus) -> bool {
    use SubmissionStatus as S;
    if from == to {
        return true;
    }
    // Withdrawal is reachable from every non-terminal status.
    if to == S::Withdrawn {
        return !from.is_terminal();
    }
    matches!(
        (from, to),
        (S::Draft, S::Incomplete | S::Submitted)
            | (S::Incomplete, S::Submitted)
            | (S::Submitted, S::UnderReview)
            | (S::UnderReview, S::Unevaluated | S::Evaluated)
            | (S::Unevaluated, S::Evaluated)
            | (S::Evaluated, S::Approved | S::Rejected | S::Archived)
    )
}

/// Append-only versioned record for one submitted property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionLogbook {
    /// Property identifier (`PROP-` + 12 lowercase hex).
    pub property_id: String,

    /// When the logbook was created.
    pub created_at: DateTime<Utc>,

    /// Status of the latest version.
    pub current_status: SubmissionStatus,

    versions: Vec<SubmissionVersion>,
}

impl SubmissionLogbook {
    /// Creates a logbook with version 1 from an initial submission.
    ///
    /// The submission's `submitted_at` is stamped and its status must
    /// already reflect completeness (`Submitted` or `Incomplete`).
    #[must_use]
    pub fn create(mut submission: AgentSubmission) -> Self {
        let now = Utc::now();
        submission.submitted_at = Some(now);
        let property_id = submission.property_id.clone();
        let action_by = submission.agent_email.clone();
        let status = submission.status;
        let initial = SubmissionVersion::create(
            &property_id,
            1,
            VersionAction::InitialSubmission,
            &action_by,
            None,
            submission,
            None,
        );
        debug!(property_id = %property_id, status = %status, "logbook created");
        Self {
            property_id,
            created_at: now,
            current_status: status,
            versions: vec![initial],
        }
    }

    /// All versions, oldest first.
    #[must_use]
    pub fn versions(&self) -> &[SubmissionVersion] {
        &self.versions
    }

    /// Number of versions.
    #[must_use]
    pub fn version_count(&self) -> u32 {
        u32::try_from(self.versions.len()).unwrap_or(u32::MAX)
    }

    /// The latest version.
    ///
    /// # Panics
    ///
    /// Never panics: a logbook is constructed with version 1 and versions
    /// are only appended.
    #[must_use]
    pub fn current_version(&self) -> &SubmissionVersion {
        self.versions.last().expect("logbook is never empty")
    }

    /// A deep copy of the current submission.
    #[must_use]
    pub fn current_snapshot(&self) -> AgentSubmission {
        self.current_version().submission_snapshot.clone()
    }

    /// Hash of the latest version.
    #[must_use]
    pub fn current_hash(&self) -> &str {
        &self.current_version().version_hash
    }

    /// Appends a new version (append-only; nothing is rewritten).
    ///
    /// The submission's status is validated against the transition table
    /// when it differs from the current status.
    ///
    /// # Errors
    ///
    /// [`LogbookError::IllegalStatusTransition`] when the status movement
    /// is outside the table.
    pub fn append(
        &mut self,
        submission: AgentSubmission,
        action: VersionAction,
        action_by: &str,
        action_note: Option<String>,
    ) -> Result<&SubmissionVersion, LogbookError> {
        let to = submission.status;
        if !transition_allowed(self.current_status, to) {
            return Err(LogbookError::IllegalStatusTransition {
                from: self.current_status,
                to,
            });
        }
        let version = SubmissionVersion::create(
            &self.property_id,
            self.version_count() + 1,
            action,
            action_by,
            action_note,
            submission,
            Some(self.current_hash().to_string()),
        );
        debug!(
            property_id = %self.property_id,
            version = version.version_number,
            action = ?action,
            "version appended"
        );
        self.current_status = to;
        self.versions.push(version);
        Ok(self.current_version())
    }

    /// Changes status only, snapshotting the current submission.
    ///
    /// # Errors
    ///
    /// [`LogbookError::IllegalStatusTransition`] for movement outside the
    /// table.
    pub fn change_status(
        &mut self,
        new_status: SubmissionStatus,
        action_by: &str,
        action_note: Option<String>,
    ) -> Result<&SubmissionVersion, LogbookError> {
        let mut submission = self.current_snapshot();
        submission.status = new_status;
        let note =
            action_note.unwrap_or_else(|| format!("status changed to {new_status}"));
        self.append(submission, VersionAction::StatusChanged, action_by, Some(note))
    }

    /// A specific version by 1-indexed number.
    ///
    /// # Errors
    ///
    /// [`LogbookError::VersionNotFound`] when the number is out of range.
    pub fn version(&self, version_number: u32) -> Result<&SubmissionVersion, LogbookError> {
        if version_number == 0 {
            return Err(LogbookError::VersionNotFound {
                property_id: self.property_id.clone(),
                version_number,
            });
        }
        self.versions
            .get(version_number as usize - 1)
            .ok_or_else(|| LogbookError::VersionNotFound {
                property_id: self.property_id.clone(),
                version_number,
            })
    }

    /// Verifies the hash chain; `None` means intact, otherwise the version
    /// number where it breaks.
    #[must_use]
    pub fn verify_chain(&self) -> Option<u32> {
        verify_hash_chain(&self.versions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::{DocumentRecord, DocumentType};
    use crate::schema::{PropertyType, Tenure};

    fn submission(status: SubmissionStatus) -> AgentSubmission {
        AgentSubmission {
            property_id: generate_property_id(),
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
            status,
        }
    }

    fn document(document_type: DocumentType) -> DocumentRecord {
        DocumentRecord {
            document_id: format!("DOC-{:012x}", 0x42u64),
            property_id: "PROP-0123456789ab".to_string(),
            document_type,
            filename: "file.pdf".to_string(),
            file_extension: "pdf".to_string(),
            sha256_hex: "ab".repeat(32),
            size_bytes: 16,
            uploaded_at: Utc::now(),
            storage_path: "p/t/file.pdf".to_string(),
        }
    }

    #[test]
    fn logbook_is_born_with_version_one() {
        let logbook = SubmissionLogbook::create(submission(SubmissionStatus::Submitted));
        assert_eq!(logbook.version_count(), 1);
        assert_eq!(logbook.current_status, SubmissionStatus::Submitted);
        let v1 = logbook.version(1).unwrap();
        assert_eq!(v1.action, VersionAction::InitialSubmission);
        assert_eq!(v1.version_number, 1);
        assert!(v1.previous_version_hash.is_none());
        assert!(v1.submission_snapshot.submitted_at.is_some());
    }

    #[test]
    fn version_numbers_increase_by_one_and_timestamps_are_ordered() {
        let mut logbook = SubmissionLogbook::create(submission(SubmissionStatus::Submitted));
        logbook
            .change_status(SubmissionStatus::UnderReview, "axis_system", None)
            .unwrap();
        logbook
            .change_status(SubmissionStatus::Evaluated, "axis_system", None)
            .unwrap();
        let versions = logbook.versions();
        for (index, version) in versions.iter().enumerate() {
            assert_eq!(version.version_number as usize, index + 1);
        }
        for pair in versions.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
        assert_eq!(logbook.verify_chain(), None);
    }

    #[test]
    fn illegal_transition_rejected_with_stable_code() {
        let mut logbook = SubmissionLogbook::create(submission(SubmissionStatus::Submitted));
        let err = logbook
            .change_status(SubmissionStatus::Approved, "axis_system", None)
            .unwrap_err();
        assert_eq!(err.code(), "ILLEGAL_STATUS_TRANSITION");
        // The failed attempt left no trace.
        assert_eq!(logbook.version_count(), 1);
        assert_eq!(logbook.current_status, SubmissionStatus::Submitted);
    }

    #[test]
    fn terminal_statuses_admit_nothing() {
        let mut logbook = SubmissionLogbook::create(submission(SubmissionStatus::Submitted));
        logbook
            .change_status(SubmissionStatus::Withdrawn, "rh@hartley.example", None)
            .unwrap();
        let err = logbook
            .change_status(SubmissionStatus::Submitted, "axis_system", None)
            .unwrap_err();
        assert!(matches!(err, LogbookError::IllegalStatusTransition { .. }));
    }

    #[test]
    fn withdrawal_allowed_from_any_non_terminal() {
        for status in [
            SubmissionStatus::Draft,
            SubmissionStatus::Incomplete,
            SubmissionStatus::Submitted,
            SubmissionStatus::UnderReview,
            SubmissionStatus::Unevaluated,
            SubmissionStatus::Evaluated,
        ] {
            assert!(transition_allowed(status, SubmissionStatus::Withdrawn), "{status}");
        }
        for status in [
            SubmissionStatus::Approved,
            SubmissionStatus::Rejected,
            SubmissionStatus::Archived,
        ] {
            assert!(!transition_allowed(status, SubmissionStatus::Withdrawn), "{status}");
        }
    }

    #[test]
    fn document_replacement_changes_only_the_document() {
        let mut initial = submission(SubmissionStatus::Submitted);
        let mut first_plan = document(DocumentType::FloorPlan);
        first_plan.document_id = "DOC-aaaaaaaaaaaa".to_string();
        initial.attach_document(first_plan);
        let mut logbook = SubmissionLogbook::create(initial);

        let mut updated = logbook.current_snapshot();
        let mut second_plan = document(DocumentType::FloorPlan);
        second_plan.document_id = "DOC-bbbbbbbbbbbb".to_string();
        let replaced = updated.attach_document(second_plan);
        assert!(replaced);
        logbook
            .append(
                updated,
                VersionAction::DocumentReplaced,
                "rh@hartley.example",
                Some("floor plan replaced".to_string()),
            )
            .unwrap();

        let v1 = logbook.version(1).unwrap();
        let v2 = logbook.version(2).unwrap();
        assert_eq!(v2.action, VersionAction::DocumentReplaced);
        assert_eq!(
            v1.submission_snapshot
                .document_of_type(DocumentType::FloorPlan)
                .unwrap()
                .document_id,
            "DOC-aaaaaaaaaaaa"
        );
        assert_eq!(
            v2.submission_snapshot
                .document_of_type(DocumentType::FloorPlan)
                .unwrap()
                .document_id,
            "DOC-bbbbbbbbbbbb"
        );
        // Status unchanged by a document replacement.
        assert_eq!(logbook.current_status, SubmissionStatus::Submitted);
    }

    #[test]
    fn unknown_version_reported() {
        let logbook = SubmissionLogbook::create(submission(SubmissionStatus::Submitted));
        assert_eq!(logbook.version(0).unwrap_err().code(), "VERSION_NOT_FOUND");
        assert_eq!(logbook.version(2).unwrap_err().code(), "VERSION_NOT_FOUND");
    }
}
