use std::sync::Arc;
use std::time::Duration;

use checkpoint_shared::{CheckpointRecord, Coordinate};
use futures::future::join_all;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::resolver::CoordinateResolver;

/// Authoritative coordinate for one record, delivered to the map owner.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCoordinate {
    pub id: String,
    /// Location the coordinate was resolved for; a marker whose record moved since is left alone.
    pub location: String,
    pub coordinate: Coordinate,
}

/// Resolves unknown locations in small, rate-limited batches so the geocoding
/// provider sees at most `batch_size` requests per `batch_delay`.
pub struct BatchGeocoder {
    resolver: Arc<CoordinateResolver>,
    batch_size: usize,
    batch_delay: Duration,
}

impl BatchGeocoder {
    pub fn new(resolver: Arc<CoordinateResolver>) -> Self {
        let config = resolver.config();
        let batch_size = config.batch_size.max(1);
        let batch_delay = config.batch_delay;
        Self {
            resolver,
            batch_size,
            batch_delay,
        }
    }

    /// Records with no static entry whose cache key was never attempted.
    pub fn pending<'a>(&self, records: &'a [CheckpointRecord]) -> Vec<&'a CheckpointRecord> {
        records
            .iter()
            .filter(|record| self.resolver.needs_resolution(record))
            .collect()
    }

    /// Resolve every pending record and push results into `results`.
    /// Returns how many results were delivered; stops early once the receiver is gone.
    pub async fn run(
        &self,
        records: &[CheckpointRecord],
        results: &mpsc::Sender<ResolvedCoordinate>,
    ) -> usize {
        let pending = self.pending(records);
        if pending.is_empty() {
            return 0;
        }

        let batches = pending.len().div_ceil(self.batch_size);
        info!(records = pending.len(), batches, "geocoding unresolved records");

        let mut delivered = 0;
        for (index, batch) in pending.chunks(self.batch_size).enumerate() {
            if index > 0 {
                tokio::time::sleep(self.batch_delay).await;
            }

            let resolved = join_all(batch.iter().map(|record| async move {
                ResolvedCoordinate {
                    id: record.id.clone(),
                    location: self.resolver.location_key(record),
                    coordinate: self.resolver.resolve(record).await,
                }
            }))
            .await;

            for result in resolved {
                if results.send(result).await.is_err() {
                    debug!(delivered, "result receiver closed; stopping");
                    return delivered;
                }
                delivered += 1;
            }
            debug!(batch = index + 1, batches, "batch resolved");
        }
        delivered
    }

    /// Run the schedule in the background; the caller renders immediately.
    pub fn spawn(
        self: Arc<Self>,
        records: Vec<CheckpointRecord>,
        results: mpsc::Sender<ResolvedCoordinate>,
    ) -> JoinHandle<usize> {
        tokio::spawn(async move { self.run(&records, &results).await })
    }
}
