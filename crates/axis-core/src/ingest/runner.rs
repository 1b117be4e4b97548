//! Drives a source adapter through fetch, normalisation, and rejection
//! reporting.
//!
//! The ingestor is the public face of stage 1: it owns the fetch timeout,
//! funnels every failed record to a rejection side channel, and only ever
//! yields fully validated assets. A timed-out fetch produces a rejection,
//! never a synthesised record; a rejected record does not stop its peers.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::adapter::{RawListing, SourceAdapter};
use super::validator::StructuralValidator;
use crate::schema::{RejectionCode, RejectionRecord, ValidatedAsset};

/// Outcome of an ingestion run over one source.
#[derive(Debug, Default)]
pub struct IngestOutcome {
    /// Assets that passed structural validation, in source order.
    pub assets: Vec<ValidatedAsset>,

    /// Count of records rejected during this run.
    pub rejected: usize,
}

/// Drives a [`SourceAdapter`]: fetch under timeout, validate, report
/// rejections out-of-band.
pub struct Ingestor {
    adapter: Box<dyn SourceAdapter>,
    validator: StructuralValidator,
    fetch_timeout: Duration,
    rejections: mpsc::UnboundedSender<RejectionRecord>,
}

impl Ingestor {
    /// Creates an ingestor for an adapter.
    ///
    /// Returns the ingestor and the receiving half of the rejection channel.
    /// The validator is seeded with the adapter's synonym tables.
    #[must_use]
    pub fn new(
        adapter: Box<dyn SourceAdapter>,
        reference_date: NaiveDate,
        fetch_timeout: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<RejectionRecord>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let validator = StructuralValidator::new(reference_date)
            .with_maps(adapter.property_type_map(), adapter.tenure_map());
        (
            Self {
                adapter,
                validator,
                fetch_timeout,
                rejections: tx,
            },
            rx,
        )
    }

    /// The source id this ingestor serves.
    #[must_use]
    pub fn source_id(&self) -> &str {
        &self.adapter.registration().source_id
    }

    /// Fetches and normalises listings from the source.
    ///
    /// Records that fail normalisation are reported to the rejection channel
    /// and skipped; this method never yields partially populated records.
    /// A fetch timeout is reported as a single [`RejectionCode::FetchTimeout`]
    /// rejection and yields an empty batch.
    pub async fn fetch_listings(&self, since: Option<DateTime<Utc>>) -> IngestOutcome {
        let fetched =
            tokio::time::timeout(self.fetch_timeout, self.adapter.fetch_raw(since)).await;
        let raws = match fetched {
            Ok(Ok(raws)) => raws,
            Ok(Err(err)) => {
                warn!(source = %self.source_id(), error = %err, "source fetch failed");
                return IngestOutcome::default();
            }
            Err(_) => {
                self.report_timeout("batch");
                return IngestOutcome { assets: Vec::new(), rejected: 1 };
            }
        };

        let mut outcome = IngestOutcome::default();
        for raw in &raws {
            match self.normalise(raw) {
                Some(asset) => outcome.assets.push(asset),
                None => outcome.rejected += 1,
            }
        }
        info!(
            source = %self.source_id(),
            validated = outcome.assets.len(),
            rejected = outcome.rejected,
            "ingestion batch complete"
        );
        outcome
    }

    /// Fetches a single listing by its source-specific id.
    ///
    /// Returns `None` when the listing does not exist or fails validation
    /// (the rejection is still reported to the side channel).
    pub async fn fetch_single(&self, source_listing_id: &str) -> Option<ValidatedAsset> {
        let fetched = tokio::time::timeout(
            self.fetch_timeout,
            self.adapter.fetch_raw_single(source_listing_id),
        )
        .await;
        match fetched {
            Ok(Ok(Some(raw))) => self.normalise(&raw),
            Ok(Ok(None)) => None,
            Ok(Err(err)) => {
                warn!(source = %self.source_id(), error = %err, "single fetch failed");
                None
            }
            Err(_) => {
                self.report_timeout(source_listing_id);
                None
            }
        }
    }

    fn normalise(&self, raw: &RawListing) -> Option<ValidatedAsset> {
        match self.validator.validate(raw) {
            Ok(asset) => Some(asset),
            Err(rejection) => {
                // Receiver drop only loses the report, never the run.
                let _ = self.rejections.send(*rejection);
                None
            }
        }
    }

    fn report_timeout(&self, scope: &str) {
        warn!(source = %self.source_id(), scope, "source fetch timed out");
        let _ = self.rejections.send(RejectionRecord::new(
            self.source_id().to_string(),
            scope.to_string(),
            RejectionCode::FetchTimeout,
            format!("fetch timed out after {:?}", self.fetch_timeout),
            &[],
        ));
    }
}
