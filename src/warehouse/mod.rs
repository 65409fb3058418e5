mod models;
mod policy;
pub mod schema;
mod sink;
mod store;
mod trait_def;

pub use models::{ArtistRow, SongRow, SongplayRow, TimeRow, UserRow, WarehouseRow};
pub use policy::{ConflictPolicies, ConflictPolicy};
pub use sink::write_relation;
pub use store::{destination_path, SqliteWarehouse};
pub use trait_def::{WarehouseStore, WriteSummary};
