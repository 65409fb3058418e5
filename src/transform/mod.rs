//! Dimension and fact builders.
//!
//! Builders are pure functions over a staging snapshot. Each returns its rows
//! sorted by key so identical input always yields identical output.

mod artists;
mod calendar;
mod songplays;
mod songs;
mod users;

pub use artists::build_artists;
pub use calendar::{build_time, decompose};
pub use songplays::{build_songplays, normalize, FactOptions, FactOutput, SongMatcher};
pub use songs::build_songs;
pub use users::build_users;

use crate::error::{EtlError, EtlResult};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt::{Debug, Display};
use tracing::warn;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// Fail on a key observed with conflicting attributes instead of
    /// keeping the first occurrence.
    pub strict_integrity: bool,
}

/// Deduplicates keyed rows keeping the first occurrence of each key.
fn dedupe_first_wins<K, R, I>(relation: &str, rows: I, options: &BuildOptions) -> EtlResult<Vec<R>>
where
    K: Ord + Display,
    R: PartialEq + Debug,
    I: IntoIterator<Item = (K, R)>,
{
    let mut by_key: BTreeMap<K, R> = BTreeMap::new();
    let mut conflicts = 0usize;
    for (key, row) in rows {
        match by_key.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(row);
            }
            Entry::Occupied(existing) => {
                if *existing.get() == row {
                    continue;
                }
                if options.strict_integrity {
                    return Err(EtlError::Integrity {
                        relation: relation.to_string(),
                        key: existing.key().to_string(),
                        first: format!("{:?}", existing.get()),
                        second: format!("{:?}", row),
                    });
                }
                conflicts += 1;
                warn!(
                    "{}: key {} seen with conflicting values, keeping {:?} over {:?}",
                    relation,
                    existing.key(),
                    existing.get(),
                    row
                );
            }
        }
    }
    if conflicts > 0 {
        warn!("{}: {} conflicting duplicates dropped", relation, conflicts);
    }
    Ok(by_key.into_values().collect())
}

/// Present and not blank.
fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.trim().is_empty())
}
