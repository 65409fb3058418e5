use crate::error::{EtlError, EtlResult};
use crate::staging::EventRecord;
use crate::warehouse::schema::TIME;
use crate::warehouse::TimeRow;
use chrono::{DateTime, Datelike, Timelike};
use std::collections::BTreeSet;

/// UTC calendar breakdown of an epoch-millis timestamp, `None` when out of range.
pub fn decompose(ts_millis: i64) -> Option<TimeRow> {
    let at = DateTime::from_timestamp_millis(ts_millis)?;
    Some(TimeRow {
        start_time: ts_millis,
        hour: at.hour(),
        day: at.day(),
        week: at.iso_week().week(),
        month: at.month(),
        year: at.year(),
        weekday: at.weekday().num_days_from_monday(),
    })
}

/// One row per distinct play timestamp.
pub fn build_time(events: &[EventRecord]) -> EtlResult<Vec<TimeRow>> {
    let timestamps: BTreeSet<i64> = events
        .iter()
        .filter(|e| e.is_song_play())
        .map(|e| e.ts)
        .collect();

    let mut rows = Vec::with_capacity(timestamps.len());
    let mut out_of_range = Vec::new();
    for ts in timestamps {
        match decompose(ts) {
            Some(row) => rows.push(row),
            None => out_of_range.push(ts),
        }
    }
    if !out_of_range.is_empty() {
        return Err(EtlError::transform(
            TIME,
            format!("{} timestamps are out of range", out_of_range.len()),
            out_of_range,
        ));
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn play(ts: i64) -> EventRecord {
        EventRecord {
            ts,
            page: Some("NextSong".to_string()),
            ..EventRecord::default()
        }
    }

    #[test]
    fn test_decompose_known_instant() {
        // 2018-11-01T12:00:00Z, a Thursday
        let row = decompose(1541073600000).unwrap();
        assert_eq!(
            row,
            TimeRow {
                start_time: 1541073600000,
                hour: 12,
                day: 1,
                week: 44,
                month: 11,
                year: 2018,
                weekday: 3,
            }
        );
    }

    #[test]
    fn test_iso_week_at_year_boundary() {
        // 2018-12-31 is Monday of ISO week 1 of 2019
        let row = decompose(1546214400000).unwrap();
        assert_eq!((row.year, row.month, row.day), (2018, 12, 31));
        assert_eq!(row.week, 1);
        assert_eq!(row.weekday, 0);
    }

    #[test]
    fn test_distinct_play_timestamps_only() {
        let mut home = play(5);
        home.page = Some("Home".to_string());
        let events = vec![play(1541106106796), play(1541106106796), home, play(1541105830796)];
        let rows = build_time(&events).unwrap();
        let keys: Vec<i64> = rows.iter().map(|r| r.start_time).collect();
        assert_eq!(keys, vec![1541105830796, 1541106106796]);
    }

    #[test]
    fn test_out_of_range_timestamp_is_transform_error() {
        let err = build_time(&[play(i64::MAX)]).unwrap_err();
        assert_eq!(err.kind(), "TransformError");
        assert!(decompose(i64::MIN).is_none());
    }
}
