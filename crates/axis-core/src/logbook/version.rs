//! Immutable submission versions with hash-chain linkage.
//!
//! Each version snapshots the complete submission and carries a SHA-256
//! hash over its own content plus the previous version's hash. Tampering
//! with any historical version breaks the chain. Hash computation is
//! deterministic: the snapshot is serialised with fixed field order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::submission::{AgentSubmission, SubmissionStatus};

/// The action that created a version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionAction {
    /// First version of a logbook.
    InitialSubmission,
    /// A document was added.
    DocumentAdded,
    /// A document of an existing type was replaced.
    DocumentReplaced,
    /// Submission fields were updated.
    FieldUpdated,
    /// Status changed.
    StatusChanged,
    /// Internal review was recorded.
    AxisReview,
    /// An incomplete submission was completed and resubmitted.
    Resubmission,
}

/// An immutable snapshot of a submission at a point in time.
///
/// Versions are never rewritten or deleted; the snapshot is a deep copy
/// with no shared state against the live submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionVersion {
    /// Version identifier: `{property_id}-v{version_number}`.
    pub version_id: String,

    /// Owning property.
    pub property_id: String,

    /// 1-indexed, strictly increasing version number.
    pub version_number: u32,

    /// When the version was appended.
    pub timestamp: DateTime<Utc>,

    /// What created this version.
    pub action: VersionAction,

    /// Who performed the action (agent email or `axis_system`).
    pub action_by: String,

    /// Optional note explaining the action.
    pub action_note: Option<String>,

    /// Deep copy of the submission at this version.
    pub submission_snapshot: AgentSubmission,

    /// Submission status at this version.
    pub status_at_version: SubmissionStatus,

    /// SHA-256 over this version's content, lowercase hex.
    pub version_hash: String,

    /// Hash of the previous version; `None` for version 1.
    pub previous_version_hash: Option<String>,
}

impl SubmissionVersion {
    /// Creates a version, computing the content hash and chain linkage.
    #[must_use]
    pub fn create(
        property_id: &str,
        version_number: u32,
        action: VersionAction,
        action_by: &str,
        action_note: Option<String>,
        submission_snapshot: AgentSubmission,
        previous_version_hash: Option<String>,
    ) -> Self {
        let timestamp = Utc::now();
        let status_at_version = submission_snapshot.status;
        let version_hash = compute_version_hash(
            property_id,
            version_number,
            timestamp,
            action,
            action_by,
            action_note.as_deref(),
            &submission_snapshot,
            status_at_version,
            previous_version_hash.as_deref(),
        );
        Self {
            version_id: format!("{property_id}-v{version_number}"),
            property_id: property_id.to_string(),
            version_number,
            timestamp,
            action,
            action_by: action_by.to_string(),
            action_note,
            submission_snapshot,
            status_at_version,
            version_hash,
            previous_version_hash,
        }
    }

    /// Recomputes this version's hash and compares it against the stored one.
    #[must_use]
    pub fn verify_hash(&self) -> bool {
        let expected = compute_version_hash(
            &self.property_id,
            self.version_number,
            self.timestamp,
            self.action,
            &self.action_by,
            self.action_note.as_deref(),
            &self.submission_snapshot,
            self.status_at_version,
            self.previous_version_hash.as_deref(),
        );
        self.version_hash == expected
    }
}

/// Content serialised into a version hash. Field order is the hash format;
/// changing it invalidates every stored chain.
#[derive(Serialize)]
struct HashableVersion<'a> {
    property_id: &'a str,
    version_number: u32,
    timestamp: DateTime<Utc>,
    action: VersionAction,
    action_by: &'a str,
    action_note: Option<&'a str>,
    submission_snapshot: &'a AgentSubmission,
    status: SubmissionStatus,
    previous_version_hash: Option<&'a str>,
}

#[allow(clippy::too_many_arguments)]
fn compute_version_hash(
    property_id: &str,
    version_number: u32,
    timestamp: DateTime<Utc>,
    action: VersionAction,
    action_by: &str,
    action_note: Option<&str>,
    submission_snapshot: &AgentSubmission,
    status: SubmissionStatus,
    previous_version_hash: Option<&str>,
) -> String {
    let hashable = HashableVersion {
        property_id,
        version_number,
        timestamp,
        action,
        action_by,
        action_note,
        submission_snapshot,
        status,
        previous_version_hash,
    };
    let serialised = serde_json::to_vec(&hashable).expect("version content serialises");
    let digest = Sha256::digest(&serialised);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Verifies an entire chain: every hash matches its content and every
/// version links to its predecessor. Returns the version number where the
/// chain breaks, or `None` when intact.
#[must_use]
pub fn verify_hash_chain(versions: &[SubmissionVersion]) -> Option<u32> {
    let mut previous: Option<&str> = None;
    for version in versions {
        if version.previous_version_hash.as_deref() != previous || !version.verify_hash() {
            return Some(version.version_number);
        }
        previous = Some(&version.version_hash);
    }
    None
}
