//! Songplay fact construction.
//!
//! A play is resolved to a catalog song by normalized title and artist name,
//! with event length and catalog duration within a tolerance.

use super::non_blank;
use crate::error::{EtlError, EtlResult};
use crate::staging::{EventRecord, SongRecord};
use crate::warehouse::{ArtistRow, SongRow, SongplayRow, TimeRow};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};

/// Trims, collapses inner whitespace and lowercases.
pub fn normalize(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[derive(Debug, Clone)]
struct Candidate {
    song_id: String,
    artist_id: String,
    duration: Option<f64>,
}

/// Catalog lookup keyed by (normalized title, normalized artist name).
#[derive(Debug, Default)]
pub struct SongMatcher {
    by_title_and_artist: HashMap<(String, String), Vec<Candidate>>,
    tolerance: f64,
}

impl SongMatcher {
    /// Indexes every song under the artists dimension name of its artist and
    /// under each artist name the catalog records spell for it.
    ///
    /// Fails when a song references an artist id absent from `artists`.
    pub fn new(
        songs: &[SongRow],
        artists: &[ArtistRow],
        catalog: &[SongRecord],
        tolerance: f64,
    ) -> EtlResult<Self> {
        let names: HashMap<&str, &str> = artists
            .iter()
            .map(|a| (a.artist_id.as_str(), a.name.as_str()))
            .collect();

        let mut spellings: HashMap<&str, BTreeSet<String>> = HashMap::new();
        for record in catalog {
            if let (Some(song_id), Some(name)) =
                (record.song_id.as_deref(), non_blank(&record.artist_name))
            {
                spellings
                    .entry(song_id)
                    .or_default()
                    .insert(normalize(name));
            }
        }

        let mut by_title_and_artist: HashMap<(String, String), Vec<Candidate>> = HashMap::new();
        for song in songs {
            let Some(name) = names.get(song.artist_id.as_str()) else {
                return Err(EtlError::Join(format!(
                    "song {} references artist {} missing from the artists dimension",
                    song.song_id, song.artist_id
                )));
            };
            let mut artist_names = spellings.remove(song.song_id.as_str()).unwrap_or_default();
            artist_names.insert(normalize(name));

            let title = normalize(&song.title);
            for artist_name in artist_names {
                by_title_and_artist
                    .entry((title.clone(), artist_name))
                    .or_default()
                    .push(Candidate {
                        song_id: song.song_id.clone(),
                        artist_id: song.artist_id.clone(),
                        duration: song.duration,
                    });
            }
        }
        Ok(SongMatcher {
            by_title_and_artist,
            tolerance,
        })
    }

    /// `(song_id, artist_id)` of the best catalog match for a play.
    ///
    /// Without a length the duration test is skipped. A catalog song without
    /// a duration only matches plays without a length.
    pub fn resolve(
        &self,
        title: Option<&str>,
        artist: Option<&str>,
        length: Option<f64>,
    ) -> Option<(&str, &str)> {
        let key = (normalize(title?), normalize(artist?));
        let candidates = self.by_title_and_artist.get(&key)?;

        candidates
            .iter()
            .filter_map(|c| {
                let distance = match (length, c.duration) {
                    (None, _) => 0.0,
                    (Some(length), Some(duration)) => (length - duration).abs(),
                    (Some(_), None) => return None,
                };
                (distance <= self.tolerance).then_some((distance, c))
            })
            .min_by(|(da, a), (db, b)| {
                da.partial_cmp(db)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| a.song_id.cmp(&b.song_id))
            })
            .map(|(_, c)| (c.song_id.as_str(), c.artist_id.as_str()))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FactOptions {
    /// Id of the first play of this run.
    pub first_id: i64,
    pub duration_tolerance: f64,
}

#[derive(Debug, Clone, Default)]
pub struct FactOutput {
    pub rows: Vec<SongplayRow>,
    pub matched: usize,
}

/// One row per `NextSong` event, numbered in natural-key order.
pub fn build_songplays(
    events: &[EventRecord],
    catalog: &[SongRecord],
    songs: &[SongRow],
    artists: &[ArtistRow],
    time: &[TimeRow],
    options: &FactOptions,
) -> EtlResult<FactOutput> {
    let matcher = SongMatcher::new(songs, artists, catalog, options.duration_tolerance)?;
    let known_times: HashSet<i64> = time.iter().map(|t| t.start_time).collect();

    let mut plays: Vec<(usize, &EventRecord)> = events
        .iter()
        .enumerate()
        .filter(|(_, e)| e.is_song_play())
        .collect();
    plays.sort_by_key(|(idx, e)| (e.ts, e.user_id, e.session_id, e.item_in_session, *idx));

    let mut output = FactOutput {
        rows: Vec::with_capacity(plays.len()),
        matched: 0,
    };
    for (offset, (idx, event)) in plays.into_iter().enumerate() {
        if !known_times.contains(&event.ts) {
            return Err(EtlError::Join(format!(
                "play at ts {} has no row in the time dimension",
                event.ts
            )));
        }
        let Some(session_id) = event.session_id else {
            return Err(EtlError::Join(format!(
                "play #{} at ts {} has no session id",
                idx, event.ts
            )));
        };

        let resolved = matcher.resolve(event.song.as_deref(), event.artist.as_deref(), event.length);
        if resolved.is_some() {
            output.matched += 1;
        }
        let (song_id, artist_id) = match resolved {
            Some((song_id, artist_id)) => (Some(song_id.to_string()), Some(artist_id.to_string())),
            None => (None, None),
        };

        output.rows.push(SongplayRow {
            songplay_id: options.first_id + offset as i64,
            start_time: event.ts,
            user_id: event.user_id,
            level: event.level.clone(),
            song_id,
            artist_id,
            session_id,
            item_in_session: event.item_in_session,
            location: event.location.clone(),
            user_agent: event.user_agent.clone(),
        });
    }
    Ok(output)
}
