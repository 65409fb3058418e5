mod coerce;
mod loader;
mod models;

pub use loader::{
    collect_json_files, read_source, stage_events, stage_songs, LoadOptions, LoadReport,
    ParsedSource, Rejection,
};
pub use models::{EventRecord, SongRecord, StagingSnapshot, NEXT_SONG_PAGE};
