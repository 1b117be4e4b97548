//! Keyed storage of submission logbooks.
//!
//! The map is many-reader/single-writer; each logbook sits behind its own
//! lock so commits for one property serialise without blocking appends to
//! another. Identifier generation is collision-checked: an id that already
//! exists is regenerated, never overwritten.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::submission::{AgentSubmission, SubmissionStatus, generate_property_id};
use super::version::{SubmissionVersion, VersionAction};
use super::{LogbookError, SubmissionLogbook};
use crate::documents::DocumentRecord;
use crate::schema::{
    ASSET_SCHEMA_VERSION, ListingStatus, SourceCategory, SourceMetadata, ValidatedAsset,
    generate_asset_id,
};

/// Attempts at generating a fresh property id before giving up.
const ID_GENERATION_ATTEMPTS: usize = 8;

/// Lightweight version header for history listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionHeader {
    /// Version identifier.
    pub version_id: String,

    /// 1-indexed version number.
    pub version_number: u32,

    /// When the version was appended.
    pub timestamp: DateTime<Utc>,

    /// What created the version.
    pub action: super::VersionAction,

    /// Who performed the action.
    pub action_by: String,

    /// Optional note.
    pub action_note: Option<String>,

    /// Status at the version.
    pub status: SubmissionStatus,

    /// Content hash of the version.
    pub version_hash: String,
}

impl From<&SubmissionVersion> for VersionHeader {
    fn from(version: &SubmissionVersion) -> Self {
        Self {
            version_id: version.version_id.clone(),
            version_number: version.version_number,
            timestamp: version.timestamp,
            action: version.action,
            action_by: version.action_by.clone(),
            action_note: version.action_note.clone(),
            status: version.status_at_version,
            version_hash: version.version_hash.clone(),
        }
    }
}

/// Keyed map of logbooks with per-property commit serialisation.
#[derive(Debug, Default)]
pub struct LogbookStore {
    logbooks: RwLock<HashMap<String, Arc<RwLock<SubmissionLogbook>>>>,
}

impl LogbookStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Commits an initial submission, creating its logbook.
    ///
    /// When the submission carries no usable property id, one is generated;
    /// a generated id that collides is regenerated rather than overwriting.
    /// Returns the property id.
    ///
    /// # Errors
    ///
    /// - [`LogbookError::DuplicateProperty`] when the submission brought
    ///   its own id and that id is taken.
    pub fn create(&self, mut submission: AgentSubmission) -> Result<String, LogbookError> {
        let mut logbooks = self.logbooks.write().expect("logbook map lock poisoned");

        if submission.property_id.is_empty() {
            submission.property_id = generate_property_id();
        }
        if logbooks.contains_key(&submission.property_id) {
            // Collisions are detected and retried, never overwritten.
            let mut attempts = 0;
            loop {
                let candidate = generate_property_id();
                if !logbooks.contains_key(&candidate) {
                    warn!(
                        colliding = %submission.property_id,
                        replacement = %candidate,
                        "property id collision, regenerated"
                    );
                    submission.property_id = candidate;
                    break;
                }
                attempts += 1;
                if attempts >= ID_GENERATION_ATTEMPTS {
                    return Err(LogbookError::DuplicateProperty {
                        property_id: submission.property_id,
                    });
                }
            }
        }

        let property_id = submission.property_id.clone();
        let logbook = SubmissionLogbook::create(submission);
        info!(property_id = %property_id, status = %logbook.current_status, "submission committed");
        logbooks.insert(property_id.clone(), Arc::new(RwLock::new(logbook)));
        Ok(property_id)
    }

    /// Runs a read-only closure against a logbook.
    ///
    /// # Errors
    ///
    /// [`LogbookError::UnknownProperty`] when no logbook exists.
    pub fn with_logbook<T>(
        &self,
        property_id: &str,
        f: impl FnOnce(&SubmissionLogbook) -> T,
    ) -> Result<T, LogbookError> {
        let handle = self.handle(property_id)?;
        let guard = handle.read().expect("logbook lock poisoned");
        Ok(f(&guard))
    }

    /// Runs a mutating closure against a logbook under its commit lock.
    ///
    /// # Errors
    ///
    /// [`LogbookError::UnknownProperty`] when no logbook exists, or
    /// whatever the closure returns.
    pub fn with_logbook_mut<T>(
        &self,
        property_id: &str,
        f: impl FnOnce(&mut SubmissionLogbook) -> Result<T, LogbookError>,
    ) -> Result<T, LogbookError> {
        let handle = self.handle(property_id)?;
        let mut guard = handle.write().expect("logbook lock poisoned");
        f(&mut guard)
    }

    /// Attaches or replaces a document, appending the matching version.
    ///
    /// An incomplete submission that becomes complete moves to `Submitted`
    /// as a resubmission.
    ///
    /// # Errors
    ///
    /// [`LogbookError::UnknownProperty`] or an illegal transition.
    pub fn attach_document(
        &self,
        property_id: &str,
        record: DocumentRecord,
        action_by: &str,
    ) -> Result<(), LogbookError> {
        self.with_logbook_mut(property_id, |logbook| {
            let mut submission = logbook.current_snapshot();
            let document_type = record.document_type;
            let replaced = submission.attach_document(record);
            let action = if replaced {
                VersionAction::DocumentReplaced
            } else {
                VersionAction::DocumentAdded
            };
            let note = format!("{document_type} {}", if replaced { "replaced" } else { "added" });
            logbook.append(submission, action, action_by, Some(note))?;

            // Completion promotes an incomplete submission.
            let now_complete = logbook.current_snapshot().has_all_required_documents();
            if logbook.current_status == SubmissionStatus::Incomplete && now_complete {
                let mut promoted = logbook.current_snapshot();
                promoted.status = SubmissionStatus::Submitted;
                logbook.append(
                    promoted,
                    VersionAction::Resubmission,
                    action_by,
                    Some("all required documents present".to_string()),
                )?;
            }
            Ok(())
        })
    }

    /// Updates submission fields, appending a `field_updated` version.
    ///
    /// The incoming submission keeps the logbook's identity and status; use
    /// [`Self::change_status`] for status movement.
    ///
    /// # Errors
    ///
    /// [`LogbookError::UnknownProperty`] or an illegal transition.
    pub fn update_fields(
        &self,
        property_id: &str,
        mut submission: AgentSubmission,
        action_by: &str,
        action_note: Option<String>,
    ) -> Result<(), LogbookError> {
        self.with_logbook_mut(property_id, |logbook| {
            let current = logbook.current_snapshot();
            submission.property_id.clone_from(&current.property_id);
            submission.submission_id.clone_from(&current.submission_id);
            submission.submitted_at = current.submitted_at;
            submission.status = current.status;
            logbook.append(submission, VersionAction::FieldUpdated, action_by, action_note)?;
            Ok(())
        })
    }

    /// Moves a submission's status, appending a `status_changed` version.
    ///
    /// # Errors
    ///
    /// [`LogbookError::UnknownProperty`] or an illegal transition.
    pub fn change_status(
        &self,
        property_id: &str,
        new_status: SubmissionStatus,
        action_by: &str,
        action_note: Option<String>,
    ) -> Result<(), LogbookError> {
        self.with_logbook_mut(property_id, |logbook| {
            logbook.change_status(new_status, action_by, action_note)?;
            Ok(())
        })
    }

    /// Records an internal review note, appending an `axis_review` version.
    ///
    /// # Errors
    ///
    /// [`LogbookError::UnknownProperty`] or an illegal transition.
    pub fn record_review(&self, property_id: &str, note: String) -> Result<(), LogbookError> {
        self.with_logbook_mut(property_id, |logbook| {
            let submission = logbook.current_snapshot();
            logbook.append(
                submission,
                VersionAction::AxisReview,
                "axis_system",
                Some(note),
            )?;
            Ok(())
        })
    }

    // ------------------------------------------------------------------
    // Read API
    // ------------------------------------------------------------------

    /// Latest submission snapshot for a property.
    ///
    /// # Errors
    ///
    /// [`LogbookError::UnknownProperty`] when no logbook exists.
    pub fn current_snapshot(&self, property_id: &str) -> Result<AgentSubmission, LogbookError> {
        self.with_logbook(property_id, SubmissionLogbook::current_snapshot)
    }

    /// Ordered version headers for a property.
    ///
    /// # Errors
    ///
    /// [`LogbookError::UnknownProperty`] when no logbook exists.
    pub fn history(&self, property_id: &str) -> Result<Vec<VersionHeader>, LogbookError> {
        self.with_logbook(property_id, |logbook| {
            logbook.versions().iter().map(VersionHeader::from).collect()
        })
    }

    /// Immutable snapshot of version `n`.
    ///
    /// # Errors
    ///
    /// [`LogbookError::UnknownProperty`] or [`LogbookError::VersionNotFound`].
    pub fn version(
        &self,
        property_id: &str,
        version_number: u32,
    ) -> Result<SubmissionVersion, LogbookError> {
        let handle = self.handle(property_id)?;
        let guard = handle.read().expect("logbook lock poisoned");
        guard.version(version_number).cloned()
    }

    /// All property ids, sorted.
    #[must_use]
    pub fn property_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .logbooks
            .read()
            .expect("logbook map lock poisoned")
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    /// Property ids currently in a status, sorted.
    #[must_use]
    pub fn property_ids_by_status(&self, status: SubmissionStatus) -> Vec<String> {
        let mut ids: Vec<String> = self
            .logbooks
            .read()
            .expect("logbook map lock poisoned")
            .iter()
            .filter(|(_, handle)| {
                handle.read().expect("logbook lock poisoned").current_status == status
            })
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Number of logbooks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.logbooks.read().expect("logbook map lock poisoned").len()
    }

    /// True when no logbooks exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Surfaces a completed submission to the Deal Engine as a read-only
    /// [`ValidatedAsset`].
    ///
    /// Refused for incomplete submissions and for broken hash chains; the
    /// Deal Engine never sees a partially documented or tampered record.
    ///
    /// # Errors
    ///
    /// [`LogbookError::UnknownProperty`] or [`LogbookError::NotExportable`].
    pub fn export_for_evaluation(
        &self,
        property_id: &str,
    ) -> Result<ValidatedAsset, LogbookError> {
        self.with_logbook(property_id, |logbook| {
            if let Some(broken_at) = logbook.verify_chain() {
                return Err(LogbookError::NotExportable {
                    detail: format!("hash chain broken at version {broken_at}"),
                });
            }
            let submission = logbook.current_snapshot();
            if !submission.has_all_required_documents() {
                return Err(LogbookError::NotExportable {
                    detail: "required documents missing".to_string(),
                });
            }
            let submitted_at = submission.submitted_at.unwrap_or(logbook.created_at);
            let listing_date = submitted_at.date_naive();

            // City is the last comma-separated address component; a parse,
            // not an inference.
            let city = submission
                .full_address
                .rsplit(',')
                .map(str::trim)
                .find(|part| !part.is_empty())
                .unwrap_or("Unknown")
                .to_string();

            Ok(ValidatedAsset {
                asset_id: generate_asset_id("agent_portal", &submission.property_id, listing_date),
                address: submission.full_address.clone(),
                postcode: submission.postcode.clone(),
                city,
                area: None,
                property_type: submission.property_type,
                tenure: submission.tenure,
                asking_price: submission.guide_price,
                price_qualifier: Some("guide price".to_string()),
                listing_status: ListingStatus::Active,
                listing_date,
                days_on_market: 0,
                bedrooms: submission.bedrooms,
                bathrooms: submission.bathrooms,
                square_feet: None,
                plot_acres: None,
                latitude: None,
                longitude: None,
                source: SourceMetadata {
                    source_id: "agent_portal".to_string(),
                    source_name: "Agent Submission Portal".to_string(),
                    source_listing_id: submission.submission_id.clone(),
                    source_url: format!("portal://submissions/{}", submission.property_id),
                    source_category: SourceCategory::Other,
                    auction_date: None,
                    lot_number: None,
                    receiver_name: None,
                    insolvency_type: None,
                    scraped_at: Some(submitted_at),
                },
                validated_at: submitted_at,
                schema_version: ASSET_SCHEMA_VERSION.to_string(),
            })
        })?
    }

    /// Clones every logbook out for snapshot persistence, sorted by id.
    #[must_use]
    pub fn export_all(&self) -> Vec<SubmissionLogbook> {
        let logbooks = self.logbooks.read().expect("logbook map lock poisoned");
        let mut cloned: Vec<SubmissionLogbook> = logbooks
            .values()
            .map(|handle| handle.read().expect("logbook lock poisoned").clone())
            .collect();
        cloned.sort_by(|a, b| a.property_id.cmp(&b.property_id));
        cloned
    }

    /// Rebuilds a store from persisted logbooks.
    #[must_use]
    pub fn from_logbooks(logbooks: Vec<SubmissionLogbook>) -> Self {
        let map = logbooks
            .into_iter()
            .map(|lb| (lb.property_id.clone(), Arc::new(RwLock::new(lb))))
            .collect();
        Self {
            logbooks: RwLock::new(map),
        }
    }

    fn handle(&self, property_id: &str) -> Result<Arc<RwLock<SubmissionLogbook>>, LogbookError> {
        self.logbooks
            .read()
            .expect("logbook map lock poisoned")
            .get(property_id)
            .cloned()
            .ok_or_else(|| LogbookError::UnknownProperty {
                property_id: property_id.to_string(),
            })
    }
}
