//! # State Snapshot Aggregator
//!
//! One cycle:
//!
//! 1. Note the current snapshot version (the base)
//! 2. Encode every query and issue all reads concurrently
//! 3. Wait for every read to settle
//! 4. Any failure discards the whole cycle
//! 5. Otherwise publish version `base + 1`, unless another cycle already
//!    published past the base

use crate::domain::{PartialRead, SnapshotCell, StateSnapshot};
use crate::error::AggregateError;
use ds_01_metadata_codec::{Codec, Value};
use futures::future::join_all;
use shared_types::ledger::LedgerTransport;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Aggregator statistics
#[derive(Debug, Default)]
pub struct AggregatorStats {
    /// Cycles that published a snapshot
    pub published: AtomicU64,
    /// Cycles discarded because a part failed
    pub failed: AtomicU64,
    /// Cycles discarded because a newer snapshot won
    pub superseded: AtomicU64,
}

pub struct StateSnapshotAggregator {
    transport: Arc<dyn LedgerTransport>,
    codec: Codec,
    cell: Arc<SnapshotCell>,
    reads: Vec<PartialRead>,
    stats: AggregatorStats,
}

impl StateSnapshotAggregator {
    pub fn new(
        transport: Arc<dyn LedgerTransport>,
        codec: Codec,
        cell: Arc<SnapshotCell>,
        reads: Vec<PartialRead>,
    ) -> Self {
        Self {
            transport,
            codec,
            cell,
            reads,
            stats: AggregatorStats::default(),
        }
    }

    #[must_use]
    pub fn cell(&self) -> &Arc<SnapshotCell> {
        &self.cell
    }

    #[must_use]
    pub fn reads(&self) -> &[PartialRead] {
        &self.reads
    }

    #[must_use]
    pub fn stats(&self) -> &AggregatorStats {
        &self.stats
    }

    /// Run one cycle over the configured reads.
    pub async fn refresh(&self) -> Result<Arc<StateSnapshot>, AggregateError> {
        self.aggregate(&self.reads).await
    }

    /// Run one cycle over `reads` and publish the result.
    ///
    /// # Errors
    ///
    /// On any error nothing is published and the current snapshot stays.
    pub async fn aggregate(&self, reads: &[PartialRead]) -> Result<Arc<StateSnapshot>, AggregateError> {
        if reads.is_empty() {
            return Err(AggregateError::NoReads);
        }
        let base = self.cell.version();

        let results = join_all(reads.iter().map(|read| self.read_part(read))).await;
        let mut parts = BTreeMap::new();
        for result in results {
            match result {
                Ok((name, value)) => {
                    parts.insert(name, value);
                }
                Err(e) => {
                    self.stats.failed.fetch_add(1, Ordering::Relaxed);
                    warn!(base, reason = e.reason(), error = %e, "Aggregation cycle discarded");
                    return Err(e);
                }
            }
        }

        match self.cell.publish_after(base, parts) {
            Ok(snapshot) => {
                self.stats.published.fetch_add(1, Ordering::Relaxed);
                info!(version = snapshot.version, parts = snapshot.parts.len(), "Snapshot published");
                Ok(snapshot)
            }
            Err(e) => {
                self.stats.superseded.fetch_add(1, Ordering::Relaxed);
                debug!(error = %e, "Aggregation cycle superseded");
                Err(e)
            }
        }
    }

    async fn read_part(&self, read: &PartialRead) -> Result<(String, Value), AggregateError> {
        let query = self
            .codec
            .encode_state_query(&read.query)
            .map_err(|source| AggregateError::Query {
                part: read.name.clone(),
                source,
            })?;

        let bytes = self
            .transport
            .read(read.actor, &query)
            .await
            .map_err(|source| AggregateError::Read {
                part: read.name.clone(),
                source,
            })?;

        let decoded = match read.output {
            Some(ty) => self.codec.decode(ty, &bytes),
            None => self.codec.decode_state(&bytes),
        };
        let value = decoded.map_err(|source| AggregateError::Decode {
            part: read.name.clone(),
            source,
        })?;
        debug!(part = %read.name, bytes = bytes.len(), "Partial read decoded");
        Ok((read.name.clone(), value))
    }
}
