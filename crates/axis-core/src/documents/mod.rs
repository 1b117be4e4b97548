//! Content-addressed document store for agent submissions.
//!
//! Every stored document is hashed (SHA-256) on write and re-verified on
//! read, so corruption is always detected. Two uploads with identical
//! content produce identical hashes; replacements create new records and
//! never delete prior ones. Files live in a per-property, per-type
//! directory tree with a JSON sidecar manifest next to each file.
//!
//! # Validation
//!
//! A document is accepted only when its filename extension *and* its
//! sniffed magic bytes both land in the allowed set (pdf, jpg/jpeg, png,
//! tiff), it is non-empty, and it is at most 10 MiB.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::persist::fs::atomic_write;

/// Maximum accepted document size: 10 MiB.
pub const MAX_DOCUMENT_SIZE: usize = 10 * 1024 * 1024;

/// Allowed filename extensions, lowercase, without the dot.
pub const ALLOWED_EXTENSIONS: [&str; 6] = ["pdf", "jpg", "jpeg", "png", "tiff", "tif"];

/// Kinds of document an agent can attach to a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    /// HM Land Registry title register.
    TitleRegister,
    /// Energy performance certificate.
    Epc,
    /// Floor plan.
    FloorPlan,
    /// Lease document (leasehold only).
    Lease,
    /// Planning approval decision notice.
    PlanningApproval,
    /// Anything else.
    Other,
}

impl DocumentType {
    /// Directory name used in the storage tree.
    #[must_use]
    pub const fn dir_name(self) -> &'static str {
        match self {
            Self::TitleRegister => "title_register",
            Self::Epc => "epc",
            Self::FloorPlan => "floor_plan",
            Self::Lease => "lease",
            Self::PlanningApproval => "planning_approval",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Errors from the document store. Codes are stable tokens.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DocumentError {
    /// Extension or sniffed content type outside the allowed set.
    #[error("unsupported format: {detail}")]
    UnsupportedFormat {
        /// What failed: the extension or the sniffed type.
        detail: String,
    },

    /// Document exceeds the maximum size.
    #[error("file too large: {size} bytes exceeds maximum of {max} bytes")]
    FileTooLarge {
        /// Actual size in bytes.
        size: usize,
        /// Maximum allowed size in bytes.
        max: usize,
    },

    /// Document content is empty.
    #[error("empty file")]
    EmptyFile,

    /// Stored bytes no longer match the recorded hash.
    #[error("hash mismatch on read for document {document_id}")]
    HashMismatchOnRead {
        /// The corrupted document's id.
        document_id: String,
    },

    /// No record for the requested document id.
    #[error("document not found: {document_id}")]
    NotFound {
        /// The unknown document id.
        document_id: String,
    },

    /// Underlying filesystem failure.
    #[error("document I/O error during {context}: {source}")]
    Io {
        /// What was being attempted.
        context: String,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl DocumentError {
    /// Stable wire token for this error.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            Self::FileTooLarge { .. } => "FILE_TOO_LARGE",
            Self::EmptyFile => "EMPTY_FILE",
            Self::HashMismatchOnRead { .. } => "HASH_MISMATCH_ON_READ",
            Self::NotFound { .. } => "DOCUMENT_NOT_FOUND",
            Self::Io { .. } => "DOCUMENT_IO_ERROR",
        }
    }
}

/// Immutable record of a stored document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Unique document identifier (`DOC-` + 12 lowercase hex).
    pub document_id: String,

    /// Property the document belongs to.
    pub property_id: String,

    /// Kind of document.
    pub document_type: DocumentType,

    /// Sanitised filename the bytes were stored under.
    pub filename: String,

    /// Lowercase filename extension, without the dot.
    pub file_extension: String,

    /// SHA-256 of the content, lowercase hex.
    pub sha256_hex: String,

    /// Content size in bytes.
    pub size_bytes: u64,

    /// When the document was stored.
    pub uploaded_at: DateTime<Utc>,

    /// Path of the stored file, relative to the store root.
    pub storage_path: String,
}

/// Sidecar manifest written next to every stored file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct SidecarManifest {
    document_id: String,
    sha256_hex: String,
    size_bytes: u64,
    uploaded_at: DateTime<Utc>,
}

/// Content-addressed document store rooted at a directory.
///
/// Layout: `{root}/{property_id}/{document_type}/{filename}`, with
/// `{filename}.manifest.json` beside each file. Stored bytes are immutable;
/// a replacement with different content under the same name is stored under
/// a hash-prefixed name instead of overwriting.
#[derive(Debug)]
pub struct DocumentStore {
    root: PathBuf,
    records: RwLock<HashMap<String, DocumentRecord>>,
}

impl DocumentStore {
    /// Opens a store rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Io`] if the root cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, DocumentError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| DocumentError::Io {
            context: "create store root".to_string(),
            source: e,
        })?;
        Ok(Self {
            root,
            records: RwLock::new(HashMap::new()),
        })
    }

    /// The store's root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Validates and stores a document, returning its record.
    ///
    /// # Errors
    ///
    /// - [`DocumentError::EmptyFile`] for empty content.
    /// - [`DocumentError::FileTooLarge`] above 10 MiB.
    /// - [`DocumentError::UnsupportedFormat`] when the extension or the
    ///   sniffed content type is outside the allowed set, or they disagree.
    /// - [`DocumentError::Io`] on filesystem failure.
    pub fn put(
        &self,
        property_id: &str,
        document_type: DocumentType,
        filename: &str,
        content: &[u8],
    ) -> Result<DocumentRecord, DocumentError> {
        if content.is_empty() {
            return Err(DocumentError::EmptyFile);
        }
        if content.len() > MAX_DOCUMENT_SIZE {
            return Err(DocumentError::FileTooLarge {
                size: content.len(),
                max: MAX_DOCUMENT_SIZE,
            });
        }

        let extension = extension_of(filename).ok_or_else(|| {
            DocumentError::UnsupportedFormat {
                detail: format!("missing or disallowed extension on '{filename}'"),
            }
        })?;
        let sniffed = sniff_format(content).ok_or_else(|| DocumentError::UnsupportedFormat {
            detail: "content does not match any allowed format".to_string(),
        })?;
        if !sniffed.matches_extension(&extension) {
            return Err(DocumentError::UnsupportedFormat {
                detail: format!(
                    "extension '.{extension}' does not match sniffed content type {sniffed}"
                ),
            });
        }

        let content_hash = sha256_hex(content);
        let safe_name = sanitise_filename(filename);
        let dir = self
            .root
            .join(property_id)
            .join(document_type.dir_name());
        fs::create_dir_all(&dir).map_err(|e| DocumentError::Io {
            context: "create document directory".to_string(),
            source: e,
        })?;

        // Same name, different content: disambiguate instead of overwriting.
        let final_name = match fs::read(dir.join(&safe_name)) {
            Ok(existing) if sha256_hex(&existing) != content_hash => {
                format!("{}-{}", &content_hash[..8], safe_name)
            }
            _ => safe_name,
        };
        let path = dir.join(&final_name);
        atomic_write(&path, content).map_err(|e| DocumentError::Io {
            context: "write document".to_string(),
            source: std::io::Error::other(e),
        })?;

        let document_id = format!("DOC-{}", hex12());
        let record = DocumentRecord {
            document_id: document_id.clone(),
            property_id: property_id.to_string(),
            document_type,
            filename: final_name.clone(),
            file_extension: extension,
            sha256_hex: content_hash,
            size_bytes: content.len() as u64,
            uploaded_at: Utc::now(),
            storage_path: format!(
                "{}/{}/{}",
                property_id,
                document_type.dir_name(),
                final_name
            ),
        };

        let manifest = SidecarManifest {
            document_id: record.document_id.clone(),
            sha256_hex: record.sha256_hex.clone(),
            size_bytes: record.size_bytes,
            uploaded_at: record.uploaded_at,
        };
        let manifest_path = dir.join(format!("{final_name}.manifest.json"));
        let manifest_json =
            serde_json::to_vec_pretty(&manifest).expect("manifest serialises");
        atomic_write(&manifest_path, &manifest_json).map_err(|e| DocumentError::Io {
            context: "write sidecar manifest".to_string(),
            source: std::io::Error::other(e),
        })?;

        self.records
            .write()
            .expect("document records lock poisoned")
            .insert(document_id.clone(), record.clone());
        info!(
            document_id = %document_id,
            property_id,
            document_type = %document_type,
            size = content.len(),
            "document stored"
        );
        Ok(record)
    }

    /// Retrieves a document's bytes, verifying the content hash.
    ///
    /// # Errors
    ///
    /// - [`DocumentError::NotFound`] for an unknown id.
    /// - [`DocumentError::HashMismatchOnRead`] when the stored bytes no
    ///   longer match the recorded hash.
    /// - [`DocumentError::Io`] on filesystem failure.
    pub fn get(&self, document_id: &str) -> Result<Vec<u8>, DocumentError> {
        let record = self.record(document_id).ok_or_else(|| DocumentError::NotFound {
            document_id: document_id.to_string(),
        })?;
        let path = self.root.join(&record.storage_path);
        let content = fs::read(&path).map_err(|e| DocumentError::Io {
            context: format!("read document at {}", path.display()),
            source: e,
        })?;
        if sha256_hex(&content) != record.sha256_hex {
            return Err(DocumentError::HashMismatchOnRead {
                document_id: document_id.to_string(),
            });
        }
        debug!(document_id, "document read and verified");
        Ok(content)
    }

    /// Looks up a document record by id.
    #[must_use]
    pub fn record(&self, document_id: &str) -> Option<DocumentRecord> {
        self.records
            .read()
            .expect("document records lock poisoned")
            .get(document_id)
            .cloned()
    }

    /// All records for a property, sorted by upload time then id.
    #[must_use]
    pub fn records_for_property(&self, property_id: &str) -> Vec<DocumentRecord> {
        let mut records: Vec<DocumentRecord> = self
            .records
            .read()
            .expect("document records lock poisoned")
            .values()
            .filter(|r| r.property_id == property_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| {
            a.uploaded_at
                .cmp(&b.uploaded_at)
                .then_with(|| a.document_id.cmp(&b.document_id))
        });
        records
    }

    /// Re-registers a record loaded from a persisted snapshot.
    pub fn restore_record(&self, record: DocumentRecord) {
        self.records
            .write()
            .expect("document records lock poisoned")
            .insert(record.document_id.clone(), record);
    }
}

/// Sniffed content format from magic bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SniffedFormat {
    Pdf,
    Jpeg,
    Png,
    Tiff,
}

impl SniffedFormat {
    fn matches_extension(self, extension: &str) -> bool {
        match self {
            Self::Pdf => extension == "pdf",
            Self::Jpeg => extension == "jpg" || extension == "jpeg",
            Self::Png => extension == "png",
            Self::Tiff => extension == "tiff" || extension == "tif",
        }
    }
}

impl fmt::Display for SniffedFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pdf => write!(f, "pdf"),
            Self::Jpeg => write!(f, "jpeg"),
            Self::Png => write!(f, "png"),
            Self::Tiff => write!(f, "tiff"),
        }
    }
}

/// Identifies content by magic bytes; `None` for anything unrecognised.
fn sniff_format(content: &[u8]) -> Option<SniffedFormat> {
    if content.starts_with(b"%PDF-") {
        Some(SniffedFormat::Pdf)
    } else if content.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some(SniffedFormat::Jpeg)
    } else if content.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some(SniffedFormat::Png)
    } else if content.starts_with(b"II*\0") || content.starts_with(b"MM\0*") {
        Some(SniffedFormat::Tiff)
    } else {
        None
    }
}

/// Lowercase extension of a filename, if it is in the allowed set.
fn extension_of(filename: &str) -> Option<String> {
    let ext = filename.rsplit_once('.')?.1.to_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// Strips path separators and traversal sequences from a filename.
fn sanitise_filename(filename: &str) -> String {
    let safe: String = filename
        .replace(['/', '\\'], "_")
        .replace("..", "_")
        .trim()
        .trim_matches('.')
        .to_string();
    if safe.is_empty() {
        "document".to_string()
    } else {
        safe
    }
}

fn sha256_hex(content: &[u8]) -> String {
    let digest = Sha256::digest(content);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

fn hex12() -> String {
    Uuid::new_v4().simple().to_string()[..12].to_string()
}
