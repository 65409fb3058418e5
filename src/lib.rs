//! Sparkify Warehouse Library
//!
//! Batch ETL materializing song-play logs and the song catalog into a star
//! schema. The modules are exposed for the binary and for integration tests.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod sqlite_persistence;
pub mod staging;
pub mod transform;
pub mod warehouse;

// Re-export commonly used types for convenience
pub use config::{AppConfig, CliConfig, FileConfig};
pub use error::{EtlError, EtlResult};
pub use pipeline::{run_pipeline, ComponentStatus, RunReport};
pub use warehouse::{SqliteWarehouse, WarehouseStore};
