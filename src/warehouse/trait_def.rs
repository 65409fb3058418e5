//! WarehouseStore trait definition.

use super::policy::ConflictPolicy;
use crate::sqlite_persistence::Table;
use crate::staging::{EventRecord, SongRecord, StagingSnapshot};
use anyhow::Result;
use rusqlite::types::Value;

/// Outcome of one batched write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    /// Rows handed to the sink.
    pub attempted: usize,
    /// Rows inserted or updated.
    pub written: usize,
    pub batches: usize,
}

impl WriteSummary {
    /// Rows dropped by the conflict policy.
    pub fn skipped(&self) -> usize {
        self.attempted.saturating_sub(self.written)
    }
}

/// Destination of a pipeline run.
///
/// Implementations serialize writers, so callers may write several tables
/// concurrently from different threads.
pub trait WarehouseStore: Send + Sync {
    // =========================================================================
    // Schema
    // =========================================================================

    /// Drop and recreate every relation.
    fn reset_schema(&self) -> Result<()>;

    // =========================================================================
    // Staging
    // =========================================================================

    /// Replace the contents of `staging_events` in one transaction.
    fn replace_staging_events(&self, records: &[EventRecord]) -> Result<usize>;

    /// Replace the contents of `staging_songs` in one transaction.
    fn replace_staging_songs(&self, records: &[SongRecord]) -> Result<usize>;

    /// Both staging relations in staging order.
    fn read_staging(&self) -> Result<StagingSnapshot>;

    // =========================================================================
    // Warehouse
    // =========================================================================

    /// Write rows to `table` under `policy`, committing every `batch_size` rows.
    fn write_rows(
        &self,
        table: &Table,
        policy: &ConflictPolicy,
        rows: &[Vec<Value>],
        batch_size: usize,
    ) -> Result<WriteSummary>;

    /// First songplay id not used by any existing row.
    fn next_songplay_id(&self) -> Result<i64>;

    fn row_count(&self, relation: &str) -> Result<usize>;
}
