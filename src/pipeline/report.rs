use crate::error::EtlError;
use crate::warehouse::schema::{
    ARTISTS, SONGPLAYS, SONGS, STAGING_EVENTS, STAGING_SONGS, TIME, USERS,
};
use std::fmt;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentStatus {
    Pending,
    Ok,
    Failed { kind: &'static str, message: String },
    Skipped { reason: String },
}

impl ComponentStatus {
    pub fn failed(err: &EtlError) -> Self {
        ComponentStatus::Failed {
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ComponentStatus::Pending => "pending",
            ComponentStatus::Ok => "ok",
            ComponentStatus::Failed { .. } => "failed",
            ComponentStatus::Skipped { .. } => "skipped",
        }
    }
}

impl fmt::Display for ComponentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentStatus::Failed { kind, message } => write!(f, "failed ({}): {}", kind, message),
            ComponentStatus::Skipped { reason } => write!(f, "skipped: {}", reason),
            other => write!(f, "{}", other.label()),
        }
    }
}

/// Counters and outcome of one relation in a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationReport {
    pub relation: &'static str,
    /// Input records seen by the component.
    pub read: usize,
    pub rejected: usize,
    /// Rows produced by the builder.
    pub produced: usize,
    /// Rows inserted or updated in the destination.
    pub written: usize,
    /// Rows dropped by the conflict policy.
    pub conflicts: usize,
    /// Plays resolved to a catalog song; songplays only.
    pub matched: Option<usize>,
    pub status: ComponentStatus,
}

impl RelationReport {
    fn new(relation: &'static str) -> Self {
        RelationReport {
            relation,
            read: 0,
            rejected: 0,
            produced: 0,
            written: 0,
            conflicts: 0,
            matched: None,
            status: ComponentStatus::Pending,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ComponentStatus::Ok
    }
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub relations: Vec<RelationReport>,
    pub elapsed: Duration,
}

impl Default for RunReport {
    fn default() -> Self {
        RunReport {
            relations: [
                STAGING_EVENTS,
                STAGING_SONGS,
                USERS,
                SONGS,
                ARTISTS,
                TIME,
                SONGPLAYS,
            ]
            .into_iter()
            .map(RelationReport::new)
            .collect(),
            elapsed: Duration::ZERO,
        }
    }
}

impl RunReport {
    pub fn entry(&mut self, relation: &'static str) -> &mut RelationReport {
        let index = match self.relations.iter().position(|r| r.relation == relation) {
            Some(index) => index,
            None => {
                self.relations.push(RelationReport::new(relation));
                self.relations.len() - 1
            }
        };
        &mut self.relations[index]
    }

    pub fn relation(&self, relation: &str) -> Option<&RelationReport> {
        self.relations.iter().find(|r| r.relation == relation)
    }

    pub fn fail(&mut self, relation: &'static str, err: &EtlError) {
        error!("{} failed: {}", relation, err);
        self.entry(relation).status = ComponentStatus::failed(err);
    }

    pub fn skip(&mut self, relation: &'static str, reason: impl Into<String>) {
        let reason = reason.into();
        warn!("{} skipped: {}", relation, reason);
        self.entry(relation).status = ComponentStatus::Skipped { reason };
    }

    /// Marks every relation still pending as skipped.
    pub fn skip_pending(&mut self, reason: &str) {
        let pending: Vec<&'static str> = self
            .relations
            .iter()
            .filter(|r| r.status == ComponentStatus::Pending)
            .map(|r| r.relation)
            .collect();
        for relation in pending {
            self.skip(relation, reason);
        }
    }

    pub fn is_success(&self) -> bool {
        self.relations.iter().all(RelationReport::is_ok)
    }

    pub fn total_rejected(&self) -> usize {
        self.relations.iter().map(|r| r.rejected).sum()
    }

    pub fn log_summary(&self) {
        info!("Run finished in {:?}", self.elapsed);
        for r in &self.relations {
            match &r.status {
                ComponentStatus::Failed { .. } => error!("  {}: {}", r.relation, r.status),
                _ => info!(
                    "  {}: read {}, rejected {}, produced {}, written {}, conflicts {} - {}",
                    r.relation, r.read, r.rejected, r.produced, r.written, r.conflicts, r.status
                ),
            }
        }
        if self.is_success() {
            info!(
                "All relations loaded ({} records rejected during staging)",
                self.total_rejected()
            );
        } else {
            error!("Run failed");
        }
    }
}
