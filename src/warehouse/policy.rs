//! Per-table conflict policies of the sink.

use super::schema::{self, USERS};
use crate::error::{EtlError, EtlResult};
use crate::sqlite_persistence::Table;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// Rows conflicting with an existing key or unique constraint are skipped.
    InsertIgnore,
    /// Rows conflicting on the natural key overwrite `update_columns`.
    InsertOrUpdate { update_columns: Vec<String> },
}

impl ConflictPolicy {
    pub fn default_for(relation: &str) -> ConflictPolicy {
        match relation {
            USERS => ConflictPolicy::InsertOrUpdate {
                update_columns: vec!["level".to_string()],
            },
            _ => ConflictPolicy::InsertIgnore,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ConflictPolicy::InsertIgnore => "insert_ignore",
            ConflictPolicy::InsertOrUpdate { .. } => "insert_or_update",
        }
    }

    /// Columns identifying an existing row: the first unique constraint when
    /// the table has one, else the primary key. Surrogate ids are fresh on
    /// every run, so only the natural key can detect a replayed row.
    pub fn conflict_target(table: &Table) -> Option<Vec<&'static str>> {
        if let Some(unique) = table.unique_constraints.first() {
            return Some(unique.to_vec());
        }
        table.primary_key().map(|c| vec![c.name])
    }

    pub fn validate(&self, table: &Table) -> EtlResult<()> {
        let ConflictPolicy::InsertOrUpdate { update_columns } = self else {
            return Ok(());
        };
        if Self::conflict_target(table).is_none() {
            return Err(EtlError::Schema(format!(
                "Table {} has no key to update on",
                table.name
            )));
        }
        if update_columns.is_empty() {
            return Err(EtlError::Schema(format!(
                "insert_or_update on {} needs at least one update column",
                table.name
            )));
        }
        for name in update_columns {
            let Some(column) = table.column(name) else {
                return Err(EtlError::Schema(format!(
                    "Table {} has no column '{}'",
                    table.name, name
                )));
            };
            let in_unique = table
                .unique_constraints
                .iter()
                .any(|constraint| constraint.contains(&column.name));
            if column.is_primary_key() || in_unique {
                return Err(EtlError::Schema(format!(
                    "Column {}.{} is a key column and cannot be updated",
                    table.name, name
                )));
            }
        }
        Ok(())
    }

    /// Parameterized insert statement for one row of `table`.
    pub fn insert_sql(&self, table: &Table) -> EtlResult<String> {
        self.validate(table)?;
        let columns = table.column_names();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
        let insert = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table.name,
            columns.join(", "),
            placeholders.join(", ")
        );

        Ok(match self {
            ConflictPolicy::InsertIgnore => format!("{} ON CONFLICT DO NOTHING", insert),
            ConflictPolicy::InsertOrUpdate { update_columns } => {
                // validate() guarantees a conflict target
                let target = Self::conflict_target(table).unwrap_or_default();
                let assignments: Vec<String> = update_columns
                    .iter()
                    .map(|c| format!("{} = excluded.{}", c, c))
                    .collect();
                // unchanged rows are not rewritten, so they count as conflicts
                let changed: Vec<String> = update_columns
                    .iter()
                    .map(|c| format!("{}.{} IS NOT excluded.{}", table.name, c, c))
                    .collect();
                format!(
                    "{} ON CONFLICT({}) DO UPDATE SET {} WHERE {}",
                    insert,
                    target.join(", "),
                    assignments.join(", "),
                    changed.join(" OR ")
                )
            }
        })
    }
}

/// Conflict policy per warehouse relation: defaults plus configured overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConflictPolicies {
    overrides: BTreeMap<String, ConflictPolicy>,
}

impl ConflictPolicies {
    pub fn new(overrides: BTreeMap<String, ConflictPolicy>) -> EtlResult<ConflictPolicies> {
        for (relation, policy) in &overrides {
            let table = schema::relation(relation)?;
            if schema::is_staging(relation) {
                return Err(EtlError::Schema(format!(
                    "Staging relation {} is replaced on every load and takes no conflict policy",
                    relation
                )));
            }
            policy.validate(table)?;
        }
        Ok(ConflictPolicies { overrides })
    }

    pub fn for_relation(&self, relation: &str) -> ConflictPolicy {
        self.overrides
            .get(relation)
            .cloned()
            .unwrap_or_else(|| ConflictPolicy::default_for(relation))
    }
}
