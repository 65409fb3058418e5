//! Shared constants for end-to-end tests
//!
//! When the fixture data changes, update only this file and fixtures.rs.

// ============================================================================
// Catalog
// ============================================================================

pub const DESREE_SONG_ID: &str = "SOSFNZA12A8C13A7A2";
pub const DESREE_ARTIST_ID: &str = "ARL7K851187B99ACD2";
pub const DESREE_TITLE: &str = "You Gotta Be";
pub const DESREE_NAME: &str = "Des'ree";
pub const DESREE_DURATION: f64 = 246.30812;

pub const HARMONIA_SONG_ID: &str = "SOTTDKS12AB018D69B";
pub const HARMONIA_ARTIST_ID: &str = "ARMBR4Y1187B9990EB";
pub const HARMONIA_TITLE: &str = "Sehr kosmisch";
pub const HARMONIA_NAME: &str = "Harmonia";
pub const HARMONIA_DURATION: f64 = 655.77751;

/// Catalog song nobody plays, by an artist without a location.
pub const QUIET_SONG_ID: &str = "SOQUIET12AB0188D01";
pub const QUIET_ARTIST_ID: &str = "ARQUIET1187B98D0C1";

pub const CATALOG_SONGS: usize = 3;
pub const CATALOG_ARTISTS: usize = 3;

// ============================================================================
// Event logs
// ============================================================================

/// Kaylee moves from free to paid between the two log days.
pub const KAYLEE_USER_ID: i64 = 8;
pub const RYAN_USER_ID: i64 = 26;

/// The Des'ree play of 2018-11-01.
pub const DESREE_PLAY_TS: i64 = 1541106106796;
pub const UNMATCHED_PLAY_TS: i64 = 1541106352796;
pub const HARMONIA_PLAY_TS: i64 = 1541110994796;
pub const REPLAY_TS: i64 = 1541200000000;

/// Every staged log line, NextSong or not.
pub const EVENT_LINES: usize = 6;
pub const SONG_PLAYS: usize = 4;
pub const MATCHED_PLAYS: usize = 3;
pub const DISTINCT_USERS: usize = 2;
