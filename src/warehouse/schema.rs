//! Table definitions for the staging area and the star schema.
//!
//! Staging tables mirror the raw JSON field names so a load is a
//! column-for-column copy. Warehouse tables are declared dimensions first so
//! the foreign keys held by `songplays` always point at existing tables.

use crate::error::{EtlError, EtlResult};
use crate::sqlite_column;
use crate::sqlite_persistence::{
    Column, ForeignKey, ForeignKeyOnChange, KeyRole, SqlType, Table, VersionedSchema,
};

pub const STAGING_EVENTS: &str = "staging_events";
pub const STAGING_SONGS: &str = "staging_songs";
pub const SONGPLAYS: &str = "songplays";
pub const USERS: &str = "users";
pub const SONGS: &str = "songs";
pub const ARTISTS: &str = "artists";
pub const TIME: &str = "time";

// =============================================================================
// Staging Tables
// =============================================================================

const STAGING_EVENTS_TABLE: Table = Table {
    name: STAGING_EVENTS,
    columns: &[
        sqlite_column!("artist", SqlType::Text),
        sqlite_column!("auth", SqlType::Text),
        sqlite_column!("firstName", SqlType::Text),
        sqlite_column!("gender", SqlType::Text),
        sqlite_column!("itemInSession", SqlType::Integer),
        sqlite_column!("lastName", SqlType::Text),
        sqlite_column!("length", SqlType::Real),
        sqlite_column!("level", SqlType::Text),
        sqlite_column!("location", SqlType::Text),
        sqlite_column!("method", SqlType::Text),
        sqlite_column!("page", SqlType::Text),
        sqlite_column!("registration", SqlType::Real),
        sqlite_column!("sessionId", SqlType::Integer),
        sqlite_column!("song", SqlType::Text),
        sqlite_column!("status", SqlType::Integer),
        sqlite_column!("ts", SqlType::Integer, non_null = true), // epoch millis
        sqlite_column!("userAgent", SqlType::Text),
        sqlite_column!("userId", SqlType::Integer),
    ],
    unique_constraints: &[],
};

const STAGING_SONGS_TABLE: Table = Table {
    name: STAGING_SONGS,
    columns: &[
        sqlite_column!("num_songs", SqlType::Integer),
        sqlite_column!("artist_id", SqlType::Text),
        sqlite_column!("artist_latitude", SqlType::Real),
        sqlite_column!("artist_longitude", SqlType::Real),
        sqlite_column!("artist_location", SqlType::Text),
        sqlite_column!("artist_name", SqlType::Text),
        sqlite_column!("song_id", SqlType::Text),
        sqlite_column!("title", SqlType::Text),
        sqlite_column!("duration", SqlType::Real),
        sqlite_column!("year", SqlType::Integer),
    ],
    unique_constraints: &[],
};

// =============================================================================
// Dimension Tables
// =============================================================================

const USERS_TABLE: Table = Table {
    name: USERS,
    columns: &[
        sqlite_column!(
            "user_id",
            SqlType::Integer,
            key_roles = &[KeyRole::Primary, KeyRole::Dist]
        ),
        sqlite_column!("first_name", SqlType::Text),
        sqlite_column!("last_name", SqlType::Text),
        sqlite_column!("gender", SqlType::Text),
        sqlite_column!("level", SqlType::Text, non_null = true), // 'free' or 'paid'
    ],
    unique_constraints: &[],
};

const SONGS_TABLE: Table = Table {
    name: SONGS,
    columns: &[
        sqlite_column!(
            "song_id",
            SqlType::Text,
            key_roles = &[KeyRole::Primary, KeyRole::Sort]
        ),
        sqlite_column!("title", SqlType::Text, non_null = true),
        sqlite_column!("artist_id", SqlType::Text, non_null = true),
        sqlite_column!("year", SqlType::Integer),
        sqlite_column!("duration", SqlType::Real),
    ],
    unique_constraints: &[],
};

const ARTISTS_TABLE: Table = Table {
    name: ARTISTS,
    columns: &[
        sqlite_column!(
            "artist_id",
            SqlType::Text,
            key_roles = &[KeyRole::Primary, KeyRole::Sort]
        ),
        sqlite_column!("name", SqlType::Text, non_null = true),
        sqlite_column!("location", SqlType::Text),
        sqlite_column!("latitude", SqlType::Real),
        sqlite_column!("longitude", SqlType::Real),
    ],
    unique_constraints: &[],
};

const TIME_TABLE: Table = Table {
    name: TIME,
    columns: &[
        sqlite_column!(
            "start_time",
            SqlType::Integer,
            key_roles = &[KeyRole::Primary, KeyRole::Sort]
        ), // epoch millis
        sqlite_column!("hour", SqlType::Integer, non_null = true),
        sqlite_column!("day", SqlType::Integer, non_null = true),
        sqlite_column!("week", SqlType::Integer, non_null = true), // ISO-8601 week
        sqlite_column!("month", SqlType::Integer, non_null = true),
        sqlite_column!("year", SqlType::Integer, non_null = true),
        sqlite_column!("weekday", SqlType::Integer, non_null = true), // Monday = 0
    ],
    unique_constraints: &[],
};

// =============================================================================
// Fact Table
// =============================================================================

const TIME_FK: ForeignKey = ForeignKey {
    foreign_table: TIME,
    foreign_column: "start_time",
    on_delete: ForeignKeyOnChange::NoAction,
};

const USERS_FK: ForeignKey = ForeignKey {
    foreign_table: USERS,
    foreign_column: "user_id",
    on_delete: ForeignKeyOnChange::NoAction,
};

const SONGS_FK: ForeignKey = ForeignKey {
    foreign_table: SONGS,
    foreign_column: "song_id",
    on_delete: ForeignKeyOnChange::NoAction,
};

const ARTISTS_FK: ForeignKey = ForeignKey {
    foreign_table: ARTISTS,
    foreign_column: "artist_id",
    on_delete: ForeignKeyOnChange::NoAction,
};

const SONGPLAYS_TABLE: Table = Table {
    name: SONGPLAYS,
    columns: &[
        sqlite_column!("songplay_id", SqlType::Integer, key_roles = &[KeyRole::Primary]),
        sqlite_column!(
            "start_time",
            SqlType::Integer,
            non_null = true,
            key_roles = &[KeyRole::Sort],
            foreign_key = Some(&TIME_FK)
        ),
        sqlite_column!(
            "user_id",
            SqlType::Integer,
            key_roles = &[KeyRole::Dist],
            foreign_key = Some(&USERS_FK)
        ),
        sqlite_column!("level", SqlType::Text),
        sqlite_column!("song_id", SqlType::Text, foreign_key = Some(&SONGS_FK)),
        sqlite_column!("artist_id", SqlType::Text, foreign_key = Some(&ARTISTS_FK)),
        sqlite_column!("session_id", SqlType::Integer, non_null = true),
        sqlite_column!("item_in_session", SqlType::Integer),
        sqlite_column!("location", SqlType::Text),
        sqlite_column!("user_agent", SqlType::Text),
        // start_time:user_id:session_id:item_in_session, '-' for missing parts
        sqlite_column!("play_key", SqlType::Text, non_null = true),
    ],
    unique_constraints: &[&["play_key"]],
};

// =============================================================================
// Versioned Schema Definition
// =============================================================================

pub const WAREHOUSE_SCHEMA: VersionedSchema = VersionedSchema {
    version: 0,
    tables: &[
        STAGING_EVENTS_TABLE,
        STAGING_SONGS_TABLE,
        USERS_TABLE,
        SONGS_TABLE,
        ARTISTS_TABLE,
        TIME_TABLE,
        SONGPLAYS_TABLE,
    ],
};

/// Looks up the definition of a relation by name.
pub fn relation(name: &str) -> EtlResult<&'static Table> {
    WAREHOUSE_SCHEMA
        .tables
        .iter()
        .find(|t| t.name == name)
        .ok_or_else(|| EtlError::Schema(format!("Unknown relation '{}'", name)))
}

/// All relations, in creation order.
pub fn relations() -> &'static [Table] {
    WAREHOUSE_SCHEMA.tables
}

pub fn is_staging(name: &str) -> bool {
    name == STAGING_EVENTS || name == STAGING_SONGS
}

/// Warehouse relations in load order, dimensions first.
pub const DIMENSIONS: [&str; 4] = [USERS, SONGS, ARTISTS, TIME];
