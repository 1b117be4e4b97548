//! Agent submission schema and form validation.
//!
//! Facts before marketing: the submission schema is a fixed set of typed
//! fields, free-text marketing copy is rejected outright, and required
//! documents are derived from the property's tenure and planning state.
//! Field-level failures carry stable codes so the portal can render them
//! without parsing message text.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::documents::{DocumentRecord, DocumentType};
use crate::ingest::{standard_property_type_map, standard_tenure_map};
use crate::schema::{PropertyType, Tenure, normalise_uk_postcode, validate_uk_postcode};

/// The ten mandatory submission fields, in display order.
pub const REQUIRED_SUBMISSION_FIELDS: [&str; 10] = [
    "full_address",
    "postcode",
    "property_type",
    "tenure",
    "floor_area_sqm",
    "guide_price",
    "sale_route",
    "agent_firm",
    "agent_name",
    "agent_email",
];

/// Expected sale route for a submitted property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaleRoute {
    /// Sale by auction.
    Auction,
    /// Private treaty sale.
    PrivateTreaty,
    /// Off-market sale.
    OffMarket,
}

impl SaleRoute {
    /// Parses the portal's wire token.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "auction" => Some(Self::Auction),
            "private_treaty" => Some(Self::PrivateTreaty),
            "off_market" => Some(Self::OffMarket),
            _ => None,
        }
    }
}

/// Lifecycle status of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    /// Being drafted; not yet submitted.
    Draft,
    /// Missing required fields or documents.
    Incomplete,
    /// Complete and awaiting review.
    Submitted,
    /// Being reviewed.
    UnderReview,
    /// Reviewed but not yet evaluated by the Deal Engine.
    Unevaluated,
    /// Evaluated by the Deal Engine.
    Evaluated,
    /// Approved. Terminal.
    Approved,
    /// Rejected. Terminal.
    Rejected,
    /// Archived. Terminal.
    Archived,
    /// Withdrawn by the agent. Terminal.
    Withdrawn,
}

impl SubmissionStatus {
    /// True for statuses no transition may leave.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Approved | Self::Rejected | Self::Archived | Self::Withdrawn
        )
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match self {
            Self::Draft => "draft",
            Self::Incomplete => "incomplete",
            Self::Submitted => "submitted",
            Self::UnderReview => "under_review",
            Self::Unevaluated => "unevaluated",
            Self::Evaluated => "evaluated",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Archived => "archived",
            Self::Withdrawn => "withdrawn",
        };
        f.write_str(token)
    }
}

/// Stable field-level validation codes for the portal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldErrorCode {
    /// Required field absent or empty.
    MissingRequiredField,
    /// Postcode failed UK format validation.
    InvalidPostcode,
    /// Property type not in the shared mapping table.
    UnmappedPropertyType,
    /// Tenure not in the shared mapping table.
    UnmappedTenure,
    /// A supplied value is out of range or the wrong shape.
    InvalidValue,
    /// Free-text marketing copy is not accepted.
    MarketingTextRejected,
}

impl FieldErrorCode {
    /// Stable wire token.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::MissingRequiredField => "MISSING_REQUIRED_FIELD",
            Self::InvalidPostcode => "INVALID_POSTCODE",
            Self::UnmappedPropertyType => "UNMAPPED_PROPERTY_TYPE",
            Self::UnmappedTenure => "UNMAPPED_TENURE",
            Self::InvalidValue => "INVALID_VALUE",
            Self::MarketingTextRejected => "MARKETING_TEXT_REJECTED",
        }
    }
}

/// One field-level validation failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    /// Which form field failed.
    pub field: String,

    /// Stable code.
    pub code: FieldErrorCode,

    /// Agent-facing message.
    pub message: String,
}

/// Outcome of validating a submission form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormValidation {
    /// Field-level failures. Any entry blocks submission creation.
    pub field_errors: Vec<FieldError>,

    /// Required documents not yet uploaded. Missing documents do not block
    /// creation; they leave the submission INCOMPLETE.
    pub missing_documents: Vec<DocumentType>,
}

impl FormValidation {
    /// True when the form cannot produce a submission at all.
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        !self.field_errors.is_empty()
    }

    /// True when every field and every required document is present.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.field_errors.is_empty() && self.missing_documents.is_empty()
    }
}

/// Raw portal form, before validation.
///
/// Everything is optional or stringly typed here; validation turns it into
/// a typed [`AgentSubmission`] or a list of field errors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubmissionForm {
    /// Full property address.
    pub full_address: Option<String>,

    /// UK postcode.
    pub postcode: Option<String>,

    /// Property type (shared mapping-table vocabulary).
    pub property_type: Option<String>,

    /// Tenure (`freehold` or `leasehold` and their synonyms).
    pub tenure: Option<String>,

    /// Internal floor area in square metres.
    pub floor_area_sqm: Option<i64>,

    /// Guide price in whole GBP.
    pub guide_price: Option<i64>,

    /// Expected sale route.
    pub sale_route: Option<String>,

    /// Submitting agent's firm.
    pub agent_firm: Option<String>,

    /// Submitting agent's name.
    pub agent_name: Option<String>,

    /// Submitting agent's email.
    pub agent_email: Option<String>,

    /// Bedrooms.
    pub bedrooms: Option<i64>,

    /// Bathrooms.
    pub bathrooms: Option<i64>,

    /// Year of construction.
    pub year_built: Option<i64>,

    /// Council tax band, A through H.
    pub council_tax_band: Option<String>,

    /// EPC rating, A through G.
    pub epc_rating: Option<String>,

    /// Years remaining on the lease (leasehold only).
    pub lease_years_remaining: Option<i64>,

    /// Annual ground rent in GBP (leasehold only).
    pub ground_rent_annual: Option<i64>,

    /// Annual service charge in GBP (leasehold only).
    pub service_charge_annual: Option<i64>,

    /// Whether a planning application is attached to the property.
    pub has_planning_application: bool,

    /// Free-text marketing copy. Rejected if present and non-empty.
    pub marketing_text: Option<String>,
}

/// A validated agent submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSubmission {
    /// Property identifier (`PROP-` + 12 lowercase hex).
    pub property_id: String,

    /// Submission identifier (`SUB-` + 12 lowercase hex).
    pub submission_id: String,

    /// Full property address.
    pub full_address: String,

    /// Normalised UK postcode.
    pub postcode: String,

    /// Normalised property type.
    pub property_type: PropertyType,

    /// Normalised tenure.
    pub tenure: Tenure,

    /// Internal floor area in square metres.
    pub floor_area_sqm: i64,

    /// Guide price in whole GBP.
    pub guide_price: i64,

    /// Expected sale route.
    pub sale_route: SaleRoute,

    /// Submitting agent's firm.
    pub agent_firm: String,

    /// Submitting agent's name.
    pub agent_name: String,

    /// Submitting agent's email.
    pub agent_email: String,

    /// Bedrooms, when supplied.
    pub bedrooms: Option<u8>,

    /// Bathrooms, when supplied.
    pub bathrooms: Option<u8>,

    /// Year of construction, when supplied.
    pub year_built: Option<i32>,

    /// Council tax band, A through H.
    pub council_tax_band: Option<char>,

    /// EPC rating, A through G.
    pub epc_rating: Option<char>,

    /// Years remaining on the lease.
    pub lease_years_remaining: Option<u32>,

    /// Annual ground rent in GBP.
    pub ground_rent_annual: Option<i64>,

    /// Annual service charge in GBP.
    pub service_charge_annual: Option<i64>,

    /// Whether a planning application is attached.
    pub has_planning_application: bool,

    /// Uploaded documents.
    pub documents: Vec<DocumentRecord>,

    /// When the submission was first committed to a logbook.
    pub submitted_at: Option<DateTime<Utc>>,

    /// Current status.
    pub status: SubmissionStatus,
}

impl AgentSubmission {
    /// Required document types for this submission: Title Register, EPC,
    /// and Floor Plan always; Lease for leasehold; Planning Approval when a
    /// planning application is attached.
    #[must_use]
    pub fn required_document_types(&self) -> Vec<DocumentType> {
        required_document_types(self.tenure, self.has_planning_application)
    }

    /// Required documents not yet uploaded, in required order.
    #[must_use]
    pub fn missing_documents(&self) -> Vec<DocumentType> {
        self.required_document_types()
            .into_iter()
            .filter(|required| !self.documents.iter().any(|d| d.document_type == *required))
            .collect()
    }

    /// True when every required document is uploaded.
    #[must_use]
    pub fn has_all_required_documents(&self) -> bool {
        self.missing_documents().is_empty()
    }

    /// The latest uploaded document of a type, if any.
    #[must_use]
    pub fn document_of_type(&self, document_type: DocumentType) -> Option<&DocumentRecord> {
        self.documents
            .iter()
            .rev()
            .find(|d| d.document_type == document_type)
    }

    /// Attaches a document, replacing any previous one of the same type in
    /// the active set. Returns `true` when this replaced an existing type.
    pub fn attach_document(&mut self, record: DocumentRecord) -> bool {
        let had_type = self
            .documents
            .iter()
            .any(|d| d.document_type == record.document_type);
        self.documents
            .retain(|d| d.document_type != record.document_type);
        self.documents.push(record);
        had_type
    }
}

/// Required document types for a tenure/planning combination.
#[must_use]
pub fn required_document_types(
    tenure: Tenure,
    has_planning_application: bool,
) -> Vec<DocumentType> {
    let mut required = vec![
        DocumentType::TitleRegister,
        DocumentType::Epc,
        DocumentType::FloorPlan,
    ];
    if tenure == Tenure::Leasehold {
        required.push(DocumentType::Lease);
    }
    if has_planning_application {
        required.push(DocumentType::PlanningApproval);
    }
    required
}

/// Generates a property identifier from a cryptographically strong source.
#[must_use]
pub fn generate_property_id() -> String {
    format!("PROP-{}", hex12())
}

/// Generates a submission identifier from a cryptographically strong source.
#[must_use]
pub fn generate_submission_id() -> String {
    format!("SUB-{}", hex12())
}

fn hex12() -> String {
    Uuid::new_v4().simple().to_string()[..12].to_string()
}

/// Validates a form without constructing a submission.
#[must_use]
pub fn validate_form(form: &SubmissionForm) -> FormValidation {
    let mut validation = FormValidation::default();
    build_from_form(form, &mut validation);
    validation
}

/// Validates a form and constructs the submission when nothing blocks it.
///
/// Documents already uploaded for the property are attached before the
/// completeness check. The submission's status is `Submitted` when complete
/// and `Incomplete` when required documents are missing.
///
/// # Errors
///
/// Returns the validation outcome when any field-level error blocks
/// construction.
pub fn create_submission(
    form: &SubmissionForm,
    documents: Vec<DocumentRecord>,
) -> Result<(AgentSubmission, FormValidation), FormValidation> {
    let mut validation = FormValidation::default();
    let built = build_from_form(form, &mut validation);
    let Some(mut submission) = built else {
        return Err(validation);
    };
    if validation.is_blocked() {
        return Err(validation);
    }

    submission.documents = documents;
    validation.missing_documents = submission.missing_documents();
    submission.status = if validation.missing_documents.is_empty() {
        SubmissionStatus::Submitted
    } else {
        SubmissionStatus::Incomplete
    };
    Ok((submission, validation))
}

/// Shared form-to-submission construction; pushes failures into
/// `validation` and returns a submission candidate when the typed fields
/// could all be built.
#[allow(clippy::too_many_lines)]
fn build_from_form(
    form: &SubmissionForm,
    validation: &mut FormValidation,
) -> Option<AgentSubmission> {
    let mut push = |field: &str, code: FieldErrorCode, message: &str| {
        validation.field_errors.push(FieldError {
            field: field.to_string(),
            code,
            message: message.to_string(),
        });
    };

    if let Some(text) = &form.marketing_text {
        if !text.trim().is_empty() {
            push(
                "marketing_text",
                FieldErrorCode::MarketingTextRejected,
                "Marketing descriptions are not accepted; submit facts only",
            );
        }
    }

    let full_address = match non_empty(form.full_address.as_deref()) {
        Some(v) => Some(v),
        None => {
            push(
                "full_address",
                FieldErrorCode::MissingRequiredField,
                "Please provide the full property address",
            );
            None
        }
    };

    let postcode = match non_empty(form.postcode.as_deref()) {
        Some(raw) if validate_uk_postcode(&raw) => Some(normalise_uk_postcode(&raw)),
        Some(_) => {
            push(
                "postcode",
                FieldErrorCode::InvalidPostcode,
                "Please enter a valid UK postcode (e.g. SW1A 1AA)",
            );
            None
        }
        None => {
            push(
                "postcode",
                FieldErrorCode::MissingRequiredField,
                "Please provide the property postcode",
            );
            None
        }
    };

    // The portal and the engine share one mapping table, so the portal's
    // hyphenated vocabulary normalises identically to adapter input.
    let property_type = match non_empty(form.property_type.as_deref()) {
        Some(raw) => match standard_property_type_map().get(raw.to_lowercase().trim()) {
            Some(pt) => Some(*pt),
            None => {
                push(
                    "property_type",
                    FieldErrorCode::UnmappedPropertyType,
                    "Please select a property type from the list",
                );
                None
            }
        },
        None => {
            push(
                "property_type",
                FieldErrorCode::MissingRequiredField,
                "Please select a property type",
            );
            None
        }
    };

    let tenure = match non_empty(form.tenure.as_deref()) {
        Some(raw) => match standard_tenure_map().get(raw.to_lowercase().trim()) {
            Some(t) => Some(*t),
            None => {
                push(
                    "tenure",
                    FieldErrorCode::UnmappedTenure,
                    "Please select freehold or leasehold",
                );
                None
            }
        },
        None => {
            push(
                "tenure",
                FieldErrorCode::MissingRequiredField,
                "Please select freehold or leasehold",
            );
            None
        }
    };

    let floor_area_sqm = match form.floor_area_sqm {
        Some(v) if v > 0 => Some(v),
        Some(_) => {
            push(
                "floor_area_sqm",
                FieldErrorCode::InvalidValue,
                "Floor area must be greater than zero",
            );
            None
        }
        None => {
            push(
                "floor_area_sqm",
                FieldErrorCode::MissingRequiredField,
                "Please provide the floor area in square metres",
            );
            None
        }
    };

    let guide_price = match form.guide_price {
        Some(v) if v > 0 => Some(v),
        Some(_) => {
            push(
                "guide_price",
                FieldErrorCode::InvalidValue,
                "Guide price must be greater than zero",
            );
            None
        }
        None => {
            push(
                "guide_price",
                FieldErrorCode::MissingRequiredField,
                "Please provide the guide price",
            );
            None
        }
    };

    let sale_route = match non_empty(form.sale_route.as_deref()) {
        Some(raw) => match SaleRoute::parse(&raw) {
            Some(route) => Some(route),
            None => {
                push(
                    "sale_route",
                    FieldErrorCode::InvalidValue,
                    "Please select a valid sale route",
                );
                None
            }
        },
        None => {
            push(
                "sale_route",
                FieldErrorCode::MissingRequiredField,
                "Please select a sale route",
            );
            None
        }
    };

    let agent_firm = match non_empty(form.agent_firm.as_deref()) {
        Some(v) => Some(v),
        None => {
            push(
                "agent_firm",
                FieldErrorCode::MissingRequiredField,
                "Agent firm is required",
            );
            None
        }
    };
    let agent_name = match non_empty(form.agent_name.as_deref()) {
        Some(v) => Some(v),
        None => {
            push(
                "agent_name",
                FieldErrorCode::MissingRequiredField,
                "Please provide your name",
            );
            None
        }
    };
    let agent_email = match non_empty(form.agent_email.as_deref()) {
        Some(v) if v.contains('@') => Some(v),
        Some(_) => {
            push(
                "agent_email",
                FieldErrorCode::InvalidValue,
                "Please enter a valid email address",
            );
            None
        }
        None => {
            push(
                "agent_email",
                FieldErrorCode::MissingRequiredField,
                "Agent email is required",
            );
            None
        }
    };

    let council_tax_band = match band_letter(form.council_tax_band.as_deref(), 'H') {
        Ok(band) => band,
        Err(()) => {
            push(
                "council_tax_band",
                FieldErrorCode::InvalidValue,
                "Council tax band must be A to H",
            );
            None
        }
    };
    let epc_rating = match band_letter(form.epc_rating.as_deref(), 'G') {
        Ok(band) => band,
        Err(()) => {
            push(
                "epc_rating",
                FieldErrorCode::InvalidValue,
                "EPC rating must be A to G",
            );
            None
        }
    };

    Some(AgentSubmission {
        property_id: generate_property_id(),
        submission_id: generate_submission_id(),
        full_address: full_address?,
        postcode: postcode?,
        property_type: property_type?,
        tenure: tenure?,
        floor_area_sqm: floor_area_sqm?,
        guide_price: guide_price?,
        sale_route: sale_route?,
        agent_firm: agent_firm?,
        agent_name: agent_name?,
        agent_email: agent_email?,
        bedrooms: form.bedrooms.filter(|v| *v >= 0).and_then(|v| u8::try_from(v).ok()),
        bathrooms: form.bathrooms.filter(|v| *v >= 0).and_then(|v| u8::try_from(v).ok()),
        year_built: form.year_built.and_then(|v| i32::try_from(v).ok()),
        council_tax_band,
        epc_rating,
        lease_years_remaining: form
            .lease_years_remaining
            .filter(|v| *v >= 0)
            .and_then(|v| u32::try_from(v).ok()),
        ground_rent_annual: form.ground_rent_annual.filter(|v| *v >= 0),
        service_charge_annual: form.service_charge_annual.filter(|v| *v >= 0),
        has_planning_application: form.has_planning_application,
        documents: Vec::new(),
        submitted_at: None,
        status: SubmissionStatus::Draft,
    })
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

/// Parses a single band letter up to `max` inclusive. `Ok(None)` when
/// absent, `Err(())` when malformed.
fn band_letter(value: Option<&str>, max: char) -> Result<Option<char>, ()> {
    let Some(raw) = value.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    let mut chars = raw.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => {
            let upper = c.to_ascii_uppercase();
            if upper >= 'A' && upper <= max {
                Ok(Some(upper))
            } else {
                Err(())
            }
        }
        _ => Err(()),
    }
}
