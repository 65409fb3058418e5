//! Bulk loading of raw JSON sources into the staging relations.

use super::models::{EventRecord, SongRecord};
use crate::error::{EtlError, EtlResult};
use crate::warehouse::schema::{STAGING_EVENTS, STAGING_SONGS};
use crate::warehouse::WarehouseStore;
use rayon::prelude::*;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, Default)]
pub struct LoadOptions {
    /// Fail the load when more records than this are rejected.
    pub max_rejected: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub relation: &'static str,
    pub files: usize,
    pub read: usize,
    pub rejected: usize,
    pub staged: usize,
}

/// A record that could not be coerced into its staging row.
#[derive(Debug, Clone)]
pub struct Rejection {
    pub file: PathBuf,
    /// 1-based; 0 when the whole file was one document.
    pub line: usize,
    pub reason: String,
}

#[derive(Debug)]
pub struct ParsedSource<T> {
    pub files: usize,
    pub records: Vec<T>,
    pub rejections: Vec<Rejection>,
}

impl<T> ParsedSource<T> {
    pub fn read(&self) -> usize {
        self.records.len() + self.rejections.len()
    }
}

fn load_error(relation: &str, reason: impl Into<String>, rejected: usize) -> EtlError {
    EtlError::Load {
        relation: relation.to_string(),
        reason: reason.into(),
        rejected,
    }
}

/// Lists the `*.json` files under `source`, in sorted path order.
pub fn collect_json_files(relation: &str, source: &Path) -> EtlResult<Vec<PathBuf>> {
    if !source.exists() {
        return Err(load_error(
            relation,
            format!("source {} does not exist", source.display()),
            0,
        ));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(source).follow_links(true) {
        let entry = entry.map_err(|e| {
            load_error(
                relation,
                format!("cannot walk {}: {}", source.display(), e),
                0,
            )
        })?;
        let is_json = entry
            .path()
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        if entry.file_type().is_file() && is_json {
            files.push(entry.into_path());
        }
    }
    files.sort();

    if files.is_empty() {
        return Err(load_error(
            relation,
            format!("no .json files found under {}", source.display()),
            0,
        ));
    }
    Ok(files)
}

struct FileOutcome<T> {
    records: Vec<T>,
    rejections: Vec<Rejection>,
}

fn convert<T: DeserializeOwned>(
    value: Value,
    file: &Path,
    line: usize,
    outcome: &mut FileOutcome<T>,
) {
    if !value.is_object() {
        outcome.rejections.push(Rejection {
            file: file.to_path_buf(),
            line,
            reason: "record is not a JSON object".to_string(),
        });
        return;
    }
    match serde_json::from_value::<T>(value) {
        Ok(record) => outcome.records.push(record),
        Err(err) => outcome.rejections.push(Rejection {
            file: file.to_path_buf(),
            line,
            reason: err.to_string(),
        }),
    }
}

/// Parses one file either as a single JSON document (an object, or an array
/// of objects) or, failing that, as JSON lines.
fn parse_file<T: DeserializeOwned>(file: &Path, content: &str) -> FileOutcome<T> {
    let mut outcome = FileOutcome {
        records: Vec::new(),
        rejections: Vec::new(),
    };

    let document_error = match serde_json::from_str::<Value>(content) {
        Ok(Value::Array(items)) => {
            for item in items {
                convert(item, file, 0, &mut outcome);
            }
            return outcome;
        }
        Ok(other) => {
            convert(other, file, 0, &mut outcome);
            return outcome;
        }
        Err(err) => err,
    };

    let mut json_lines = 0;
    for (index, line) in content.lines().enumerate() {
        let line_no = index + 1;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(value) => {
                json_lines += 1;
                convert(value, file, line_no, &mut outcome);
            }
            Err(err) => outcome.rejections.push(Rejection {
                file: file.to_path_buf(),
                line: line_no,
                reason: err.to_string(),
            }),
        }
    }

    // Neither a document nor JSON lines: one broken record, not one per line.
    if json_lines == 0 && !outcome.rejections.is_empty() {
        outcome.rejections = vec![Rejection {
            file: file.to_path_buf(),
            line: 0,
            reason: document_error.to_string(),
        }];
    }
    outcome
}

/// Reads and coerces every record of a source. Files are parsed in parallel
/// but records keep sorted-file, then in-file order.
pub fn read_source<T>(relation: &str, source: &Path) -> EtlResult<ParsedSource<T>>
where
    T: DeserializeOwned + Send,
{
    let files = collect_json_files(relation, source)?;
    debug!("{}: reading {} files from {}", relation, files.len(), source.display());

    let outcomes: Vec<FileOutcome<T>> = files
        .par_iter()
        .map(|file| {
            let content = std::fs::read_to_string(file).map_err(|e| {
                load_error(relation, format!("cannot read {}: {}", file.display(), e), 0)
            })?;
            Ok(parse_file(file, &content))
        })
        .collect::<EtlResult<_>>()?;

    let mut parsed = ParsedSource {
        files: files.len(),
        records: Vec::new(),
        rejections: Vec::new(),
    };
    for mut outcome in outcomes {
        parsed.records.append(&mut outcome.records);
        parsed.rejections.append(&mut outcome.rejections);
    }

    for rejection in &parsed.rejections {
        warn!(
            "{}: rejected record at {}:{}: {}",
            relation,
            rejection.file.display(),
            rejection.line,
            rejection.reason
        );
    }
    Ok(parsed)
}

fn check_rejections<T>(
    relation: &str,
    parsed: &ParsedSource<T>,
    options: &LoadOptions,
) -> EtlResult<()> {
    let rejected = parsed.rejections.len();
    if rejected > 0 && parsed.records.is_empty() {
        return Err(load_error(
            relation,
            "every record was rejected, the source does not match the staging schema",
            rejected,
        ));
    }
    if let Some(max) = options.max_rejected {
        if rejected > max {
            return Err(load_error(
                relation,
                format!("rejected records exceed the ceiling of {}", max),
                rejected,
            ));
        }
    }
    Ok(())
}

fn stage<T, F>(
    relation: &'static str,
    source: &Path,
    options: &LoadOptions,
    replace: F,
) -> EtlResult<LoadReport>
where
    T: DeserializeOwned + Send,
    F: FnOnce(&[T]) -> anyhow::Result<usize>,
{
    info!("Staging {} from {}", relation, source.display());
    let parsed = read_source::<T>(relation, source)?;
    check_rejections(relation, &parsed, options)?;

    let staged = replace(&parsed.records).map_err(|e| {
        load_error(relation, format!("{:#}", e), parsed.rejections.len())
    })?;

    let report = LoadReport {
        relation,
        files: parsed.files,
        read: parsed.read(),
        rejected: parsed.rejections.len(),
        staged,
    };
    info!(
        "Staged {}: {} files, {} read, {} rejected, {} staged",
        relation, report.files, report.read, report.rejected, report.staged
    );
    Ok(report)
}

pub fn stage_events(
    store: &dyn WarehouseStore,
    source: &Path,
    options: &LoadOptions,
) -> EtlResult<LoadReport> {
    stage::<EventRecord, _>(STAGING_EVENTS, source, options, |records| {
        store.replace_staging_events(records)
    })
}

pub fn stage_songs(
    store: &dyn WarehouseStore,
    source: &Path,
    options: &LoadOptions,
) -> EtlResult<LoadReport> {
    stage::<SongRecord, _>(STAGING_SONGS, source, options, |records| {
        store.replace_staging_songs(records)
    })
}
