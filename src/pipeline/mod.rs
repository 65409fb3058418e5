//! Run coordination: staging, dimension builders, fact builder and sink.
//!
//! Blocking work (file parsing, SQLite, transforms) runs on the blocking pool
//! while one async task sequences the phases. Builders share one read-only
//! staging snapshot. Songplays are written only after every dimension table
//! has loaded.

mod report;

pub use report::{ComponentStatus, RelationReport, RunReport};

use crate::config::AppConfig;
use crate::error::{EtlError, EtlResult};
use crate::staging::{self, LoadOptions, LoadReport, StagingSnapshot};
use crate::transform::{self, FactOptions, FactOutput};
use crate::warehouse::schema::{
    self, ARTISTS, DIMENSIONS, SONGPLAYS, SONGS, STAGING_EVENTS, STAGING_SONGS, TIME, USERS,
};
use crate::warehouse::{
    write_relation, ConflictPolicies, WarehouseRow, WarehouseStore, WriteSummary,
};
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

type Loader = fn(&dyn WarehouseStore, &Path, &LoadOptions) -> EtlResult<LoadReport>;

/// Runs `task` on the blocking pool. Expiry of `timeout` or a panic in the
/// task is reported through `on_failure`.
async fn run_blocking<T, F, E>(timeout: Option<Duration>, on_failure: E, task: F) -> EtlResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> EtlResult<T> + Send + 'static,
    E: FnOnce(String) -> EtlError,
{
    let handle = tokio::task::spawn_blocking(task);
    let joined = match timeout {
        Some(limit) => match tokio::time::timeout(limit, handle).await {
            Ok(joined) => joined,
            Err(_) => return Err(on_failure(format!("timed out after {:?}", limit))),
        },
        None => handle.await,
    };
    match joined {
        Ok(result) => result,
        Err(e) => Err(on_failure(format!("task failed: {}", e))),
    }
}

fn load_failure(relation: &'static str) -> impl FnOnce(String) -> EtlError {
    move |reason| EtlError::Load {
        relation: relation.to_string(),
        reason,
        rejected: 0,
    }
}

fn sink_failure(relation: &'static str) -> impl FnOnce(String) -> EtlError {
    move |reason| EtlError::Sink {
        relation: relation.to_string(),
        reason,
    }
}

fn transform_failure(relation: &'static str) -> impl FnOnce(String) -> EtlError {
    move |reason| EtlError::transform(relation, reason, std::iter::empty::<String>())
}

// =============================================================================
// Phases
// =============================================================================

async fn stage(
    store: Arc<dyn WarehouseStore>,
    relation: &'static str,
    loader: Loader,
    source: PathBuf,
    options: LoadOptions,
    timeout: Duration,
) -> EtlResult<LoadReport> {
    run_blocking(Some(timeout), load_failure(relation), move || {
        loader(&*store, &source, &options)
    })
    .await
}

async fn build<R, F>(
    relation: &'static str,
    snapshot: Arc<StagingSnapshot>,
    builder: F,
) -> EtlResult<Arc<Vec<R>>>
where
    R: Send + Sync + 'static,
    F: FnOnce(&StagingSnapshot) -> EtlResult<Vec<R>> + Send + 'static,
{
    run_blocking(None, transform_failure(relation), move || builder(&snapshot))
        .await
        .map(Arc::new)
}

#[derive(Clone)]
struct SinkContext {
    store: Arc<dyn WarehouseStore>,
    policies: ConflictPolicies,
    batch_size: usize,
    timeout: Duration,
}

async fn load<R>(sink: SinkContext, rows: Arc<Vec<R>>) -> EtlResult<WriteSummary>
where
    R: WarehouseRow + Send + Sync + 'static,
{
    let timeout = sink.timeout;
    run_blocking(Some(timeout), sink_failure(R::RELATION), move || {
        write_relation(&*sink.store, &sink.policies, &rows, sink.batch_size)
    })
    .await
}

/// Loads a built dimension; `None` when its builder failed.
async fn load_built<R>(sink: &SinkContext, built: &EtlResult<Arc<Vec<R>>>) -> Option<EtlResult<WriteSummary>>
where
    R: WarehouseRow + Send + Sync + 'static,
{
    let rows = built.as_ref().ok()?.clone();
    Some(load(sink.clone(), rows).await)
}

// =============================================================================
// Report bookkeeping
// =============================================================================

fn record_staging(report: &mut RunReport, relation: &'static str, result: &EtlResult<LoadReport>) {
    match result {
        Ok(load) => {
            let entry = report.entry(relation);
            entry.read = load.read;
            entry.rejected = load.rejected;
            entry.produced = load.staged;
            entry.written = load.staged;
            entry.status = ComponentStatus::Ok;
        }
        Err(err) => {
            if let EtlError::Load { rejected, .. } = err {
                report.entry(relation).rejected = *rejected;
            }
            report.fail(relation, err);
        }
    }
}

fn record_built<R>(
    report: &mut RunReport,
    relation: &'static str,
    read: usize,
    result: &EtlResult<Arc<Vec<R>>>,
) {
    report.entry(relation).read = read;
    match result {
        Ok(rows) => {
            report.entry(relation).produced = rows.len();
            info!("Built {}: {} rows from {} records", relation, rows.len(), read);
        }
        Err(err) => report.fail(relation, err),
    }
}

fn record_load(
    report: &mut RunReport,
    relation: &'static str,
    result: Option<EtlResult<WriteSummary>>,
) {
    match result {
        // builder failure already recorded
        None => {}
        Some(Ok(summary)) => {
            let entry = report.entry(relation);
            entry.written = summary.written;
            entry.conflicts = summary.skipped();
            entry.status = ComponentStatus::Ok;
        }
        Some(Err(err)) => report.fail(relation, &err),
    }
}

// =============================================================================
// Entry points
// =============================================================================

/// Runs staging, dimension builders, fact builder and sink.
///
/// Component failures are recorded in the returned report; `Err` means the
/// run could not start.
pub async fn run_pipeline(config: &AppConfig, store: Arc<dyn WarehouseStore>) -> Result<RunReport> {
    let (events_source, songs_source) = config.require_sources()?;
    let started = Instant::now();
    let mut report = RunReport::default();
    let load_options = config.load_options();

    // Staging
    info!("Staging phase");
    let (events, songs) = tokio::join!(
        stage(
            store.clone(),
            STAGING_EVENTS,
            staging::stage_events,
            events_source.to_path_buf(),
            load_options,
            config.load_timeout,
        ),
        stage(
            store.clone(),
            STAGING_SONGS,
            staging::stage_songs,
            songs_source.to_path_buf(),
            load_options,
            config.load_timeout,
        ),
    );
    record_staging(&mut report, STAGING_EVENTS, &events);
    record_staging(&mut report, STAGING_SONGS, &songs);
    if events.is_err() || songs.is_err() {
        report.skip_pending("staging failed");
        report.elapsed = started.elapsed();
        return Ok(report);
    }

    let snapshot = {
        let store = store.clone();
        run_blocking(Some(config.load_timeout), load_failure(STAGING_EVENTS), move || {
            store.read_staging().map_err(|e| EtlError::Load {
                relation: "staging".to_string(),
                reason: format!("{:#}", e),
                rejected: 0,
            })
        })
        .await
    };
    let snapshot = match snapshot {
        Ok(snapshot) => Arc::new(snapshot),
        Err(err) => {
            report.skip_pending(&format!("staging snapshot unreadable: {}", err));
            report.elapsed = started.elapsed();
            return Ok(report);
        }
    };

    // Dimensions
    info!("Dimension phase");
    let options = config.build_options();
    let (users, songs, artists, time) = tokio::join!(
        build(USERS, snapshot.clone(), |s| transform::build_users(&s.events)),
        build(SONGS, snapshot.clone(), move |s| transform::build_songs(&s.songs, &options)),
        build(ARTISTS, snapshot.clone(), move |s| transform::build_artists(&s.songs, &options)),
        build(TIME, snapshot.clone(), |s| transform::build_time(&s.events)),
    );
    let event_count = snapshot.events.len();
    let song_count = snapshot.songs.len();
    record_built(&mut report, USERS, event_count, &users);
    record_built(&mut report, SONGS, song_count, &songs);
    record_built(&mut report, ARTISTS, song_count, &artists);
    record_built(&mut report, TIME, event_count, &time);

    let fact_inputs = match (&songs, &artists, &time) {
        (Ok(songs), Ok(artists), Ok(time)) => Ok((songs.clone(), artists.clone(), time.clone())),
        _ => {
            let failed: Vec<&str> = [(SONGS, songs.is_err()), (ARTISTS, artists.is_err()), (TIME, time.is_err())]
                .into_iter()
                .filter(|(_, failed)| *failed)
                .map(|(relation, _)| relation)
                .collect();
            Err(EtlError::Join(format!(
                "songplays depends on {} which did not build",
                failed.join(", ")
            )))
        }
    };
    if let Err(err) = &fact_inputs {
        report.entry(SONGPLAYS).read = event_count;
        report.skip(SONGPLAYS, err.to_string());
    }

    let sink = SinkContext {
        store: store.clone(),
        policies: config.conflict_policies.clone(),
        batch_size: config.batch_size,
        timeout: config.load_timeout,
    };

    let fact = async {
        let (songs, artists, time) = fact_inputs.ok()?;
        let first_id = {
            let store = store.clone();
            run_blocking(Some(config.load_timeout), sink_failure(SONGPLAYS), move || {
                store
                    .next_songplay_id()
                    .map_err(|e| EtlError::sink(SONGPLAYS, e))
            })
            .await
        };
        let first_id = match first_id {
            Ok(id) => id,
            Err(err) => return Some(Err(err)),
        };
        let fact_options = FactOptions {
            first_id,
            duration_tolerance: config.duration_tolerance_secs,
        };
        let snapshot = snapshot.clone();
        Some(
            run_blocking(None, EtlError::Join, move || {
                transform::build_songplays(
                    &snapshot.events,
                    &snapshot.songs,
                    &songs,
                    &artists,
                    &time,
                    &fact_options,
                )
            })
            .await,
        )
    };

    // Dimension loads run alongside the fact build.
    info!("Load phase");
    let (users_load, songs_load, artists_load, time_load, fact) = tokio::join!(
        load_built(&sink, &users),
        load_built(&sink, &songs),
        load_built(&sink, &artists),
        load_built(&sink, &time),
        fact,
    );
    record_load(&mut report, USERS, users_load);
    record_load(&mut report, SONGS, songs_load);
    record_load(&mut report, ARTISTS, artists_load);
    record_load(&mut report, TIME, time_load);

    match fact {
        None => {}
        Some(Err(err)) => report.fail(SONGPLAYS, &err),
        Some(Ok(FactOutput { rows, matched })) => {
            let entry = report.entry(SONGPLAYS);
            entry.read = event_count;
            entry.produced = rows.len();
            entry.matched = Some(matched);
            info!(
                "Built {}: {} plays, {} matched a catalog song",
                SONGPLAYS,
                rows.len(),
                matched
            );

            let dimensions_loaded = DIMENSIONS
                .iter()
                .all(|d| report.relation(d).map(RelationReport::is_ok).unwrap_or(false));
            if dimensions_loaded {
                let result = load(sink.clone(), Arc::new(rows)).await;
                record_load(&mut report, SONGPLAYS, Some(result));
            } else {
                report.skip(SONGPLAYS, "not every dimension table loaded");
            }
        }
    }

    report.elapsed = started.elapsed();
    Ok(report)
}

/// Drops and recreates every relation.
pub async fn reset_schema(store: Arc<dyn WarehouseStore>) -> EtlResult<()> {
    run_blocking(None, EtlError::Schema, move || {
        store.reset_schema().map_err(EtlError::schema)
    })
    .await
}

/// Row count of every relation, in creation order.
pub async fn relation_counts(store: Arc<dyn WarehouseStore>) -> EtlResult<Vec<(&'static str, usize)>> {
    run_blocking(None, EtlError::Schema, move || {
        schema::relations()
            .iter()
            .map(|table| {
                store
                    .row_count(table.name)
                    .map(|count| (table.name, count))
                    .map_err(EtlError::schema)
            })
            .collect()
    })
    .await
}
