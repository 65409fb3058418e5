//! Common test infrastructure
//!
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::TestWarehouse;
//!
//! #[tokio::test]
//! async fn test_run() {
//!     let warehouse = TestWarehouse::with_fixtures();
//!     let report = warehouse.run().await;
//!     assert!(report.is_success());
//! }
//! ```

mod constants;
mod fixtures;

pub use constants::*;
#[allow(unused_imports)]
pub use fixtures::write_json_lines;

use sparkify_warehouse::config::{AppConfig, CliConfig};
use sparkify_warehouse::{run_pipeline, RunReport, SqliteWarehouse, WarehouseStore};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// Source trees and a warehouse database inside one temporary directory.
pub struct TestWarehouse {
    pub events_dir: PathBuf,
    pub songs_dir: PathBuf,
    pub db_path: PathBuf,
    // Keep last so the directory outlives the paths above
    _dir: TempDir,
}

#[allow(dead_code)]
impl TestWarehouse {
    /// Empty source directories and no database yet.
    pub fn empty() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let events_dir = dir.path().join("log_data");
        let songs_dir = dir.path().join("song_data");
        std::fs::create_dir_all(&events_dir).expect("Failed to create log_data");
        std::fs::create_dir_all(&songs_dir).expect("Failed to create song_data");
        TestWarehouse {
            events_dir,
            songs_dir,
            db_path: dir.path().join("sparkify.db"),
            _dir: dir,
        }
    }

    /// Sources holding the standard event log and song catalog.
    pub fn with_fixtures() -> Self {
        let warehouse = Self::empty();
        fixtures::write_event_logs(&warehouse.events_dir).expect("Failed to write event logs");
        fixtures::write_song_catalog(&warehouse.songs_dir).expect("Failed to write catalog");
        warehouse
    }

    pub fn cli_config(&self) -> CliConfig {
        CliConfig {
            source_events: Some(self.events_dir.clone()),
            source_songs: Some(self.songs_dir.clone()),
            destination: Some(format!("sqlite://{}", self.db_path.display())),
            ..Default::default()
        }
    }

    pub fn config(&self) -> AppConfig {
        AppConfig::resolve(&self.cli_config(), None).expect("Failed to resolve config")
    }

    pub fn open(&self) -> SqliteWarehouse {
        SqliteWarehouse::open(&self.db_path).expect("Failed to open warehouse")
    }

    pub async fn run_with(&self, config: &AppConfig) -> RunReport {
        let store: Arc<dyn WarehouseStore> = Arc::new(self.open());
        run_pipeline(config, store).await.expect("Run did not start")
    }

    pub async fn run(&self) -> RunReport {
        self.run_with(&self.config()).await
    }

    pub fn count(&self, relation: &str) -> usize {
        self.open().row_count(relation).expect("Failed to count rows")
    }

    /// Single-column query against the warehouse database.
    pub fn query_column<T: rusqlite::types::FromSql>(&self, sql: &str) -> Vec<T> {
        let conn = rusqlite::Connection::open(&self.db_path).expect("Failed to open database");
        let mut stmt = conn.prepare(sql).expect("Failed to prepare query");
        stmt.query_map([], |row| row.get(0))
            .expect("Failed to run query")
            .collect::<rusqlite::Result<Vec<T>>>()
            .expect("Failed to read rows")
    }
}
