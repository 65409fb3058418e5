//! Source file fixtures: a two-day event log and a three-song catalog.

use super::constants::*;
use anyhow::Result;
use serde_json::{json, Value};
use std::fs;
use std::path::Path;

const USER_AGENT: &str =
    "\"Mozilla/5.0 (Windows NT 6.1; WOW64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/35.0.1916.153 Safari/537.36\"";

fn kaylee(page: &str, level: &str, session: i64, item: i64, ts: i64) -> Value {
    json!({
        "auth": "Logged In",
        "firstName": "Kaylee",
        "gender": "F",
        "itemInSession": item,
        "lastName": "Summers",
        "level": level,
        "location": "Phoenix-Mesa-Scottsdale, AZ",
        "method": "PUT",
        "page": page,
        "registration": 1540344794796.0,
        "sessionId": session,
        "status": 200,
        "ts": ts,
        "userAgent": USER_AGENT,
        "userId": KAYLEE_USER_ID.to_string(),
    })
}

fn play(mut event: Value, artist: &str, song: &str, length: f64) -> Value {
    event["artist"] = json!(artist);
    event["song"] = json!(song);
    event["length"] = json!(length);
    event
}

/// Serializes `lines` as JSON lines.
pub fn write_json_lines(path: &Path, lines: &[Value]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let body: Vec<String> = lines.iter().map(Value::to_string).collect();
    fs::write(path, body.join("\n"))?;
    Ok(())
}

/// Writes the event log under `root`, split in two daily files.
pub fn write_event_logs(root: &Path) -> Result<()> {
    let day_one = vec![
        kaylee("Home", "free", 139, 0, 1541105830796),
        play(
            kaylee("NextSong", "free", 139, 1, DESREE_PLAY_TS),
            DESREE_NAME,
            DESREE_TITLE,
            DESREE_DURATION,
        ),
        play(
            kaylee("NextSong", "free", 139, 2, UNMATCHED_PLAY_TS),
            "Nobody Famous",
            "Unreleased Demo",
            200.0,
        ),
        json!({
            "artist": HARMONIA_NAME,
            "auth": "Logged In",
            "firstName": "Ryan",
            "gender": "M",
            "itemInSession": 0,
            "lastName": "Smith",
            "length": HARMONIA_DURATION,
            "level": "free",
            "location": "San Jose-Sunnyvale-Santa Clara, CA",
            "method": "PUT",
            "page": "NextSong",
            "registration": 1541016707796.0,
            "sessionId": 169,
            "song": HARMONIA_TITLE,
            "status": 200,
            "ts": HARMONIA_PLAY_TS,
            "userAgent": USER_AGENT,
            "userId": RYAN_USER_ID.to_string(),
        }),
        json!({
            "auth": "Logged Out",
            "itemInSession": 0,
            "level": "free",
            "method": "GET",
            "page": "Home",
            "sessionId": 170,
            "status": 200,
            "ts": 1541111000000i64,
            "userId": "",
        }),
    ];
    write_json_lines(&root.join("2018/11/2018-11-01-events.json"), &day_one)?;

    // Artist spelled with different case and spacing still matches.
    let day_two = vec![play(
        kaylee("NextSong", "paid", 200, 0, REPLAY_TS),
        "  des'REE ",
        "you  gotta be",
        DESREE_DURATION + 0.2,
    )];
    write_json_lines(&root.join("2018/11/2018-11-02-events.json"), &day_two)?;
    Ok(())
}

fn song(
    song_id: &str,
    title: &str,
    artist_id: &str,
    artist_name: &str,
    location: &str,
    duration: f64,
    year: i64,
) -> Value {
    json!({
        "num_songs": 1,
        "artist_id": artist_id,
        "artist_latitude": null,
        "artist_longitude": null,
        "artist_location": location,
        "artist_name": artist_name,
        "song_id": song_id,
        "title": title,
        "duration": duration,
        "year": year,
    })
}

fn write_song(root: &Path, relative: &str, song: &Value) -> Result<()> {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(song)?)?;
    Ok(())
}

/// Writes one catalog file per song under `root`, nested like the song dataset.
pub fn write_song_catalog(root: &Path) -> Result<()> {
    write_song(
        root,
        "A/A/A/TRAAAAW128F429D538.json",
        &song(
            DESREE_SONG_ID,
            DESREE_TITLE,
            DESREE_ARTIST_ID,
            DESREE_NAME,
            "",
            DESREE_DURATION,
            1994,
        ),
    )?;
    write_song(
        root,
        "A/A/B/TRAABJL12903CDCF1A.json",
        &song(
            HARMONIA_SONG_ID,
            HARMONIA_TITLE,
            HARMONIA_ARTIST_ID,
            HARMONIA_NAME,
            "Hamburg, Germany",
            HARMONIA_DURATION,
            0,
        ),
    )?;
    write_song(
        root,
        "A/B/C/TRABCEI128F424C983.json",
        &song(
            QUIET_SONG_ID,
            "Nothing Much",
            QUIET_ARTIST_ID,
            "The Quiet Ones",
            "",
            123.4,
            2004,
        ),
    )?;
    Ok(())
}
