use crate::domain::NormalizedRecall;
use crate::error::Result;
use crate::metrics;
use crate::normalize::{normalize, normalize_recall};
use crate::storage::{RecallStore, UpsertOutcome};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PersistReport {
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RenormalizeReport {
    pub processed: usize,
    pub updated: usize,
    pub failed: usize,
}

/// Upserts normalized recalls into the store, keyed by `recallId`
#[derive(Clone)]
pub struct Persister {
    store: Arc<dyn RecallStore>,
}

impl Persister {
    pub fn new(store: Arc<dyn RecallStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn RecallStore> {
        &self.store
    }

    /// Persist a batch and return how many entries were newly created
    pub async fn persist(&self, records: &[NormalizedRecall]) -> Result<usize> {
        Ok(self.persist_with_report(records).await?.created)
    }

    /// Each record is re-normalized and fully replaces any existing entry.
    /// A record that fails is logged and skipped; an unreachable store aborts.
    #[instrument(skip(self, records), fields(batch = records.len()))]
    pub async fn persist_with_report(&self, records: &[NormalizedRecall]) -> Result<PersistReport> {
        let mut report = PersistReport::default();

        for record in records {
            let Some(normalized) = normalize_recall(record) else {
                warn!(recall_id = %record.recall_id, "Record did not normalize; skipping");
                report.failed += 1;
                continue;
            };
            match self.store.upsert(&normalized).await {
                Ok(UpsertOutcome::Created) => report.created += 1,
                Ok(UpsertOutcome::Updated) => report.updated += 1,
                Err(e) if e.is_store_unavailable() => {
                    error!(error = %e, "Store unavailable; aborting persist batch");
                    record_persist_metrics(&report);
                    return Err(e);
                }
                Err(e) => {
                    warn!(recall_id = %normalized.recall_id, error = %e, "Failed to persist recall");
                    report.failed += 1;
                }
            }
        }

        record_persist_metrics(&report);
        debug!(?report, "Persisted batch");
        Ok(report)
    }

    /// Normalize arbitrary JSON documents (seed data, exports) and persist them
    pub async fn import_records(&self, documents: &[Value]) -> Result<PersistReport> {
        let mut skipped = 0;
        let recalls: Vec<NormalizedRecall> = documents
            .iter()
            .filter_map(|doc| {
                let recall = normalize(doc);
                if recall.is_none() {
                    skipped += 1;
                }
                recall
            })
            .collect();

        let mut report = self.persist_with_report(&recalls).await?;
        report.failed += skipped;
        info!(
            created = report.created,
            updated = report.updated,
            failed = report.failed,
            "Imported {} documents",
            documents.len()
        );
        Ok(report)
    }

    /// Re-run the normalizer over every stored document and write back the result.
    /// A document stored under a key other than its normalized `recallId` is moved.
    /// Records are processed independently; only an unreachable store stops the pass.
    #[instrument(skip(self))]
    pub async fn renormalize_all(&self) -> Result<RenormalizeReport> {
        let documents = self.store.all().await?;
        let mut report = RenormalizeReport::default();

        for stored in &documents {
            report.processed += 1;
            let Some(normalized) = normalize(&stored.document) else {
                report.failed += 1;
                continue;
            };
            let moved = stored.key != normalized.recall_id;
            let changed = moved || serde_json::to_value(&normalized).map_or(true, |v| v != stored.document);

            let written = match self.store.upsert(&normalized).await {
                Ok(_) if moved => self.store.remove(&stored.key).await.map(|_| ()),
                Ok(_) => Ok(()),
                Err(e) => Err(e),
            };
            match written {
                Ok(()) if changed => report.updated += 1,
                Ok(()) => {}
                Err(e) if e.is_store_unavailable() => return Err(e),
                Err(e) => {
                    warn!(key = %stored.key, error = %e, "Failed to re-normalize recall");
                    report.failed += 1;
                }
            }
        }

        metrics::persist::renormalized(report.updated as u64);
        info!(
            processed = report.processed,
            updated = report.updated,
            failed = report.failed,
            "Re-normalization complete"
        );
        Ok(report)
    }
}

fn record_persist_metrics(report: &PersistReport) {
    metrics::persist::created(report.created as u64);
    metrics::persist::updated(report.updated as u64);
    metrics::persist::failed(report.failed as u64);
}

/// Bounded hand-off to a background persist worker. Enqueueing never waits:
/// when the queue is full the batch is dropped and logged.
#[derive(Clone)]
pub struct PersistQueue {
    tx: mpsc::Sender<Vec<NormalizedRecall>>,
}

impl PersistQueue {
    /// Spawn the worker. It runs until every queue handle is dropped.
    pub fn start(persister: Persister, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<Vec<NormalizedRecall>>(capacity.max(1));

        let worker = tokio::spawn(async move {
            while let Some(batch) = rx.recv().await {
                match persister.persist_with_report(&batch).await {
                    Ok(report) => info!(
                        created = report.created,
                        updated = report.updated,
                        failed = report.failed,
                        "Background persist finished"
                    ),
                    Err(e) => error!(error = %e, batch = batch.len(), "Background persist failed"),
                }
            }
            debug!("Persist queue closed");
        });

        (Self { tx }, worker)
    }

    /// Returns false when the batch was not accepted
    pub fn enqueue(&self, records: Vec<NormalizedRecall>) -> bool {
        if records.is_empty() {
            return true;
        }
        match self.tx.try_send(records) {
            Ok(()) => true,
            Err(TrySendError::Full(batch)) => {
                warn!(batch = batch.len(), "Persist queue full; dropping batch");
                metrics::persist::queue_dropped();
                false
            }
            Err(TrySendError::Closed(batch)) => {
                warn!(batch = batch.len(), "Persist queue closed; dropping batch");
                metrics::persist::queue_dropped();
                false
            }
        }
    }
}
