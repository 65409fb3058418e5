use super::coerce;
use serde::Deserialize;

/// One action of a listening session, as found in the raw event logs.
#[derive(Deserialize, Debug, Clone, PartialEq, Default)]
pub struct EventRecord {
    #[serde(default, deserialize_with = "coerce::text")]
    pub artist: Option<String>,
    #[serde(default, deserialize_with = "coerce::text")]
    pub auth: Option<String>,
    #[serde(rename = "firstName", default, deserialize_with = "coerce::text")]
    pub first_name: Option<String>,
    #[serde(default, deserialize_with = "coerce::text")]
    pub gender: Option<String>,
    #[serde(rename = "itemInSession", default, deserialize_with = "coerce::int")]
    pub item_in_session: Option<i64>,
    #[serde(rename = "lastName", default, deserialize_with = "coerce::text")]
    pub last_name: Option<String>,
    /// Track duration in seconds.
    #[serde(default, deserialize_with = "coerce::float")]
    pub length: Option<f64>,
    #[serde(default, deserialize_with = "coerce::text")]
    pub level: Option<String>,
    #[serde(default, deserialize_with = "coerce::text")]
    pub location: Option<String>,
    #[serde(default, deserialize_with = "coerce::text")]
    pub method: Option<String>,
    /// Only `NextSong` denotes an actual play.
    #[serde(default, deserialize_with = "coerce::text")]
    pub page: Option<String>,
    #[serde(default, deserialize_with = "coerce::float")]
    pub registration: Option<f64>,
    #[serde(rename = "sessionId", default, deserialize_with = "coerce::int")]
    pub session_id: Option<i64>,
    #[serde(default, deserialize_with = "coerce::text")]
    pub song: Option<String>,
    #[serde(default, deserialize_with = "coerce::int")]
    pub status: Option<i64>,
    /// Epoch milliseconds.
    #[serde(deserialize_with = "coerce::required_int")]
    pub ts: i64,
    #[serde(rename = "userAgent", default, deserialize_with = "coerce::text")]
    pub user_agent: Option<String>,
    #[serde(rename = "userId", default, deserialize_with = "coerce::int")]
    pub user_id: Option<i64>,
}

pub const NEXT_SONG_PAGE: &str = "NextSong";

impl EventRecord {
    pub fn is_song_play(&self) -> bool {
        self.page.as_deref() == Some(NEXT_SONG_PAGE)
    }
}

/// One song catalog entry.
#[derive(Deserialize, Debug, Clone, PartialEq, Default)]
pub struct SongRecord {
    #[serde(default, deserialize_with = "coerce::int")]
    pub num_songs: Option<i64>,
    #[serde(default, deserialize_with = "coerce::text")]
    pub artist_id: Option<String>,
    #[serde(default, deserialize_with = "coerce::float")]
    pub artist_latitude: Option<f64>,
    #[serde(default, deserialize_with = "coerce::float")]
    pub artist_longitude: Option<f64>,
    #[serde(default, deserialize_with = "coerce::text")]
    pub artist_location: Option<String>,
    #[serde(default, deserialize_with = "coerce::text")]
    pub artist_name: Option<String>,
    #[serde(default, deserialize_with = "coerce::text")]
    pub song_id: Option<String>,
    #[serde(default, deserialize_with = "coerce::text")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "coerce::float")]
    pub duration: Option<f64>,
    #[serde(default, deserialize_with = "coerce::int")]
    pub year: Option<i64>,
}

/// Read-only copy of both staging relations, in staging order.
#[derive(Debug, Clone, Default)]
pub struct StagingSnapshot {
    pub events: Vec<EventRecord>,
    pub songs: Vec<SongRecord>,
}
