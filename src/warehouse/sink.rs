use super::models::WarehouseRow;
use super::policy::ConflictPolicies;
use super::schema;
use super::trait_def::{WarehouseStore, WriteSummary};
use crate::error::{EtlError, EtlResult};
use tracing::info;

/// Writes typed rows to their table under the relation's conflict policy.
pub fn write_relation<R: WarehouseRow>(
    store: &dyn WarehouseStore,
    policies: &ConflictPolicies,
    rows: &[R],
    batch_size: usize,
) -> EtlResult<WriteSummary> {
    let table = schema::relation(R::RELATION)?;
    let policy = policies.for_relation(R::RELATION);
    policy.validate(table)?;

    let values: Vec<_> = rows.iter().map(WarehouseRow::to_values).collect();
    let summary = store
        .write_rows(table, &policy, &values, batch_size)
        .map_err(|e| EtlError::sink(R::RELATION, e))?;

    info!(
        "Loaded {} ({}): {} rows, {} written, {} skipped in {} batches",
        R::RELATION,
        policy.name(),
        summary.attempted,
        summary.written,
        summary.skipped(),
        summary.batches
    );
    Ok(summary)
}
