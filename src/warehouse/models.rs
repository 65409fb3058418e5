//! Typed rows of the star schema.

use super::schema::{ARTISTS, SONGPLAYS, SONGS, TIME, USERS};
use rusqlite::types::Value;

/// A row that can be written to its warehouse table.
///
/// `to_values` yields one value per column, in the table's declared order.
pub trait WarehouseRow {
    const RELATION: &'static str;

    fn to_values(&self) -> Vec<Value>;
}

fn opt_text(value: &Option<String>) -> Value {
    value.clone().map(Value::Text).unwrap_or(Value::Null)
}

fn opt_int(value: Option<i64>) -> Value {
    value.map(Value::Integer).unwrap_or(Value::Null)
}

fn opt_real(value: Option<f64>) -> Value {
    value.map(Value::Real).unwrap_or(Value::Null)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRow {
    pub user_id: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<String>,
    pub level: String,
}

impl WarehouseRow for UserRow {
    const RELATION: &'static str = USERS;

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::Integer(self.user_id),
            opt_text(&self.first_name),
            opt_text(&self.last_name),
            opt_text(&self.gender),
            Value::Text(self.level.clone()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SongRow {
    pub song_id: String,
    pub title: String,
    pub artist_id: String,
    pub year: Option<i64>,
    pub duration: Option<f64>,
}

impl WarehouseRow for SongRow {
    const RELATION: &'static str = SONGS;

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.song_id.clone()),
            Value::Text(self.title.clone()),
            Value::Text(self.artist_id.clone()),
            opt_int(self.year),
            opt_real(self.duration),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArtistRow {
    pub artist_id: String,
    pub name: String,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl WarehouseRow for ArtistRow {
    const RELATION: &'static str = ARTISTS;

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.artist_id.clone()),
            Value::Text(self.name.clone()),
            opt_text(&self.location),
            opt_real(self.latitude),
            opt_real(self.longitude),
        ]
    }
}

/// Calendar breakdown of a play timestamp, in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRow {
    /// Epoch millis.
    pub start_time: i64,
    pub hour: u32,
    pub day: u32,
    /// ISO-8601 week number.
    pub week: u32,
    pub month: u32,
    pub year: i32,
    /// Monday = 0 ... Sunday = 6.
    pub weekday: u32,
}

impl WarehouseRow for TimeRow {
    const RELATION: &'static str = TIME;

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::Integer(self.start_time),
            Value::Integer(self.hour as i64),
            Value::Integer(self.day as i64),
            Value::Integer(self.week as i64),
            Value::Integer(self.month as i64),
            Value::Integer(self.year as i64),
            Value::Integer(self.weekday as i64),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SongplayRow {
    pub songplay_id: i64,
    pub start_time: i64,
    pub user_id: Option<i64>,
    pub level: Option<String>,
    pub song_id: Option<String>,
    pub artist_id: Option<String>,
    pub session_id: i64,
    pub item_in_session: Option<i64>,
    pub location: Option<String>,
    pub user_agent: Option<String>,
}

impl SongplayRow {
    /// Natural key of a play, unique in the fact table.
    pub fn play_key(&self) -> String {
        fn part(value: Option<i64>) -> String {
            value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
        }
        format!(
            "{}:{}:{}:{}",
            self.start_time,
            part(self.user_id),
            self.session_id,
            part(self.item_in_session)
        )
    }
}

impl WarehouseRow for SongplayRow {
    const RELATION: &'static str = SONGPLAYS;

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::Integer(self.songplay_id),
            Value::Integer(self.start_time),
            opt_int(self.user_id),
            opt_text(&self.level),
            opt_text(&self.song_id),
            opt_text(&self.artist_id),
            Value::Integer(self.session_id),
            opt_int(self.item_in_session),
            opt_text(&self.location),
            opt_text(&self.user_agent),
            Value::Text(self.play_key()),
        ]
    }
}
