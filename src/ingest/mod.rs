//! Ingestor
//!
//! Feeds decoded contract events through the aggregation engine and the raw
//! event log, one transaction per event. Owns the delivery discipline the
//! engine relies on: each event is applied at most once and in chain order.

mod source;

use serde::Serialize;
use tokio::io::AsyncBufRead;

use crate::domain::{DomainError, EventRecord, PayrollEvent};
use crate::engine::{AggregationEngine, ClaimOutcome, IndexerError};

pub use source::{JsonLinesSource, SourceItem};

/// Result of ingesting one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Event committed; carries the new totals when it was a claim
    Applied(Option<ClaimOutcome>),
    /// Event id already present in the log; nothing written
    Duplicate,
}

/// Record rejected without touching the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejection {
    pub index: usize,
    pub reason: String,
}

/// Per-batch counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub applied: usize,
    pub duplicates: usize,
    pub rejected: Vec<Rejection>,
}

/// A batch stopped on a non-malformed error.
///
/// `report` counts everything committed before the failing record.
#[derive(Debug, thiserror::Error)]
#[error("Batch halted at record {index}: {source}")]
pub struct BatchHalted {
    pub index: usize,
    pub report: BatchReport,
    #[source]
    pub source: IndexerError,
}

/// A source replay stopped before the end of its input
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("Failed to read event source: {0}")]
    Io(#[from] std::io::Error),

    /// `index` of the halt is the source line number
    #[error(transparent)]
    Halted(#[from] BatchHalted),
}

/// Sequential event ingestor
#[derive(Clone)]
pub struct Ingestor {
    engine: AggregationEngine,
}

impl Ingestor {
    pub fn new(engine: AggregationEngine) -> Self {
        Self { engine }
    }

    /// Ingest one decoded event atomically
    pub async fn ingest(&self, event: &PayrollEvent) -> Result<IngestOutcome, IndexerError> {
        let mut tx = self.engine.store().begin().await?;

        if tx.contains_event(event.event_id()).await? {
            tracing::debug!(event_id = %event.event_id(), "Duplicate event skipped");
            return Ok(IngestOutcome::Duplicate);
        }

        let position = event.position();
        if let Some(checkpoint) = tx.checkpoint().await? {
            if position <= checkpoint {
                tracing::warn!(
                    event_id = %event.event_id(),
                    %position,
                    %checkpoint,
                    "Event delivered out of order"
                );
                return Err(IndexerError::OutOfOrder {
                    event_id: event.event_id().to_string(),
                    position,
                    checkpoint,
                });
            }
        }

        let claim = match event.as_claim() {
            Some(claim) => Some(self.engine.apply_claim(tx.as_mut(), &claim).await?),
            None => None,
        };

        tx.append_event(event).await?;
        tx.commit().await?;

        tracing::info!(
            event_id = %event.event_id(),
            kind = event.kind_name(),
            %position,
            "Event ingested"
        );

        Ok(IngestOutcome::Applied(claim))
    }

    /// Decode then ingest; malformed records never reach the store
    pub async fn ingest_record(&self, record: &EventRecord) -> Result<IngestOutcome, IndexerError> {
        let event = record.decode()?;
        self.ingest(&event).await
    }

    /// Ingest records in order.
    ///
    /// Malformed records are reported in the returned report and skipped.
    /// Any other error halts the batch.
    pub async fn ingest_batch<I>(&self, records: I) -> Result<BatchReport, BatchHalted>
    where
        I: IntoIterator<Item = (usize, Result<EventRecord, DomainError>)>,
    {
        let mut report = BatchReport::default();

        for (index, record) in records {
            if let Err(source) = self.step(&mut report, index, record, true).await {
                return Err(BatchHalted {
                    index,
                    report,
                    source,
                });
            }
        }

        Ok(report)
    }

    /// Replay a JSON-lines source to its end.
    ///
    /// Rejections are keyed by line number. A malformed line halts the
    /// replay unless `skip_malformed` is set; nothing after the halting line
    /// is read.
    pub async fn ingest_source<R>(
        &self,
        source: &mut JsonLinesSource<R>,
        skip_malformed: bool,
    ) -> Result<BatchReport, ReplayError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut report = BatchReport::default();

        while let Some((line, record)) = source.next_record().await? {
            if let Err(error) = self.step(&mut report, line, record, skip_malformed).await {
                return Err(BatchHalted {
                    index: line,
                    report,
                    source: error,
                }
                .into());
            }
        }

        Ok(report)
    }

    /// Ingest one record into `report`; an `Err` means the run must stop
    async fn step(
        &self,
        report: &mut BatchReport,
        index: usize,
        record: Result<EventRecord, DomainError>,
        skip_malformed: bool,
    ) -> Result<(), IndexerError> {
        let result = match record {
            Ok(record) => self.ingest_record(&record).await,
            Err(e) => Err(IndexerError::Malformed(e)),
        };

        match result {
            Ok(IngestOutcome::Applied(_)) => report.applied += 1,
            Ok(IngestOutcome::Duplicate) => report.duplicates += 1,
            Err(IndexerError::Malformed(e)) if skip_malformed => {
                tracing::warn!(index, error = %e, "Malformed event rejected");
                report.rejected.push(Rejection {
                    index,
                    reason: e.to_string(),
                });
            }
            Err(source) => {
                tracing::error!(index, error = %source, "Ingestion halted");
                return Err(source);
            }
        }

        Ok(())
    }
}
