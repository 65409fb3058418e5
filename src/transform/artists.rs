use super::{dedupe_first_wins, non_blank, BuildOptions};
use crate::error::{EtlError, EtlResult};
use crate::staging::SongRecord;
use crate::warehouse::schema::ARTISTS;
use crate::warehouse::ArtistRow;

pub fn build_artists(
    records: &[SongRecord],
    options: &BuildOptions,
) -> EtlResult<Vec<ArtistRow>> {
    let mut rows = Vec::new();
    let mut unnamed = Vec::new();
    for record in records {
        let Some(artist_id) = non_blank(&record.artist_id) else {
            continue;
        };
        let Some(name) = non_blank(&record.artist_name) else {
            unnamed.push(artist_id);
            continue;
        };
        rows.push((
            artist_id.to_string(),
            ArtistRow {
                artist_id: artist_id.to_string(),
                name: name.to_string(),
                location: non_blank(&record.artist_location).map(str::to_string),
                latitude: record.artist_latitude,
                longitude: record.artist_longitude,
            },
        ));
    }

    if !unnamed.is_empty() {
        return Err(EtlError::transform(
            ARTISTS,
            format!("{} artists have no name", unnamed.len()),
            unnamed,
        ));
    }
    dedupe_first_wins(ARTISTS, rows, options)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(artist_id: &str, name: &str, location: Option<&str>) -> SongRecord {
        SongRecord {
            artist_id: Some(artist_id.to_string()),
            artist_name: Some(name.to_string()),
            artist_location: location.map(str::to_string),
            artist_latitude: Some(35.14968),
            artist_longitude: Some(-90.04892),
            ..SongRecord::default()
        }
    }

    #[test]
    fn test_one_row_per_artist() {
        let records = vec![
            record("ARMJAGH1187FB546F3", "The Box Tops", Some("Memphis, TN")),
            record("ARD7TVE1187B99BFB1", "Casual", Some("California - LA")),
            record("ARMJAGH1187FB546F3", "The Box Tops", Some("Memphis, TN")),
        ];
        let artists = build_artists(&records, &BuildOptions::default()).unwrap();
        assert_eq!(artists.len(), 2);
        assert_eq!(artists[0].artist_id, "ARD7TVE1187B99BFB1");
        assert_eq!(artists[1].location.as_deref(), Some("Memphis, TN"));
    }

    #[test]
    fn test_blank_location_becomes_null() {
        let artists =
            build_artists(&[record("AR1", "Casual", Some(""))], &BuildOptions::default()).unwrap();
        assert_eq!(artists[0].location, None);
    }

    #[test]
    fn test_conflicting_names() {
        let records = vec![record("AR1", "Casual", None), record("AR1", "Casual Band", None)];
        let artists = build_artists(&records, &BuildOptions::default()).unwrap();
        assert_eq!(artists[0].name, "Casual");

        let strict = BuildOptions {
            strict_integrity: true,
        };
        assert_eq!(
            build_artists(&records, &strict).unwrap_err().kind(),
            "IntegrityError"
        );
    }

    #[test]
    fn test_artist_without_name_is_transform_error() {
        let mut record = record("AR1", "", None);
        record.artist_name = None;
        let err = build_artists(&[record], &BuildOptions::default()).unwrap_err();
        assert_eq!(err.kind(), "TransformError");
        assert!(err.to_string().contains("AR1"));
    }
}
