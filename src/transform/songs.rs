use super::{dedupe_first_wins, non_blank, BuildOptions};
use crate::error::{EtlError, EtlResult};
use crate::staging::SongRecord;
use crate::warehouse::schema::SONGS;
use crate::warehouse::SongRow;

pub fn build_songs(records: &[SongRecord], options: &BuildOptions) -> EtlResult<Vec<SongRow>> {
    let mut rows = Vec::new();
    let mut invalid = Vec::new();
    for record in records {
        let Some(song_id) = non_blank(&record.song_id) else {
            continue;
        };
        match (non_blank(&record.title), non_blank(&record.artist_id)) {
            (Some(title), Some(artist_id)) => rows.push((
                song_id.to_string(),
                SongRow {
                    song_id: song_id.to_string(),
                    title: title.to_string(),
                    artist_id: artist_id.to_string(),
                    year: record.year,
                    duration: record.duration,
                },
            )),
            _ => invalid.push(record),
        }
    }

    if !invalid.is_empty() {
        return Err(EtlError::transform(
            SONGS,
            format!("{} songs lack a title or an artist id", invalid.len()),
            invalid,
        ));
    }
    dedupe_first_wins(SONGS, rows, options)
}
