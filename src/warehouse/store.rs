//! SQLite-backed warehouse store.
//!
//! All access goes through one write connection behind a mutex, which is what
//! serializes concurrent table loads.

use super::policy::ConflictPolicy;
use super::schema::{self, STAGING_EVENTS, STAGING_SONGS, WAREHOUSE_SCHEMA};
use super::trait_def::{WarehouseStore, WriteSummary};
use crate::sqlite_persistence::Table;
use crate::staging::{EventRecord, SongRecord, StagingSnapshot};
use anyhow::{anyhow, bail, Context, Result};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

const SQLITE_SCHEME: &str = "sqlite://";

/// Resolves a `destination` setting, either a plain path or `sqlite://path`.
pub fn destination_path(destination: &str) -> Result<PathBuf> {
    let path = destination
        .strip_prefix(SQLITE_SCHEME)
        .unwrap_or(destination)
        .trim();
    if path.is_empty() {
        bail!("Empty destination");
    }
    if path.contains("://") {
        bail!(
            "Unsupported destination '{}', expected a file path or sqlite://path",
            destination
        );
    }
    Ok(PathBuf::from(path))
}

#[derive(Clone)]
pub struct SqliteWarehouse {
    conn: Arc<Mutex<Connection>>,
}

fn ensure_schema(conn: &Connection) -> Result<()> {
    let table_count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        [],
        |r| r.get(0),
    )?;

    if table_count == 0 {
        info!(
            "Creating warehouse schema at version {}",
            WAREHOUSE_SCHEMA.version
        );
        WAREHOUSE_SCHEMA.create(conn)?;
        return Ok(());
    }

    #[cfg(not(feature = "no_checks"))]
    WAREHOUSE_SCHEMA
        .validate(conn)
        .context("Warehouse schema does not match, run reset-schema to recreate it")?;
    Ok(())
}

impl SqliteWarehouse {
    /// Open (creating if needed) the warehouse database at `db_path`,
    /// creating the schema in an empty database and validating it otherwise.
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Self::open_connection(db_path.as_ref())?;
        ensure_schema(&conn)?;
        Ok(Self::from_connection(conn))
    }

    /// Open without touching the schema, for callers about to reset it.
    pub fn open_unvalidated<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Self::open_connection(db_path.as_ref())?;
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        ensure_schema(&conn)?;
        Ok(Self::from_connection(conn))
    }

    fn open_connection(db_path: &Path) -> Result<Connection> {
        let conn = Connection::open_with_flags(
            db_path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("Failed to open warehouse database {}", db_path.display()))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(conn)
    }

    fn from_connection(conn: Connection) -> Self {
        SqliteWarehouse {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("Warehouse connection lock poisoned"))
    }

    /// Every row of `relation` ordered by its primary key (or rowid), for
    /// comparing warehouse states.
    pub fn snapshot_relation(&self, relation: &str) -> Result<Vec<Vec<Value>>> {
        let table = schema::relation(relation)?;
        let order = table.primary_key().map(|c| c.name).unwrap_or("rowid");
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM {} ORDER BY {}",
            table.column_names().join(", "),
            table.name,
            order
        ))?;
        let width = table.columns.len();
        let rows = stmt
            .query_map([], |row| {
                (0..width)
                    .map(|i| row.get::<_, Value>(i))
                    .collect::<rusqlite::Result<Vec<_>>>()
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

fn event_from_row(row: &Row) -> rusqlite::Result<EventRecord> {
    Ok(EventRecord {
        artist: row.get(0)?,
        auth: row.get(1)?,
        first_name: row.get(2)?,
        gender: row.get(3)?,
        item_in_session: row.get(4)?,
        last_name: row.get(5)?,
        length: row.get(6)?,
        level: row.get(7)?,
        location: row.get(8)?,
        method: row.get(9)?,
        page: row.get(10)?,
        registration: row.get(11)?,
        session_id: row.get(12)?,
        song: row.get(13)?,
        status: row.get(14)?,
        ts: row.get(15)?,
        user_agent: row.get(16)?,
        user_id: row.get(17)?,
    })
}

fn song_from_row(row: &Row) -> rusqlite::Result<SongRecord> {
    Ok(SongRecord {
        num_songs: row.get(0)?,
        artist_id: row.get(1)?,
        artist_latitude: row.get(2)?,
        artist_longitude: row.get(3)?,
        artist_location: row.get(4)?,
        artist_name: row.get(5)?,
        song_id: row.get(6)?,
        title: row.get(7)?,
        duration: row.get(8)?,
        year: row.get(9)?,
    })
}

fn select_all_sql(relation: &str) -> Result<String> {
    let table = schema::relation(relation)?;
    Ok(format!(
        "SELECT {} FROM {} ORDER BY rowid",
        table.column_names().join(", "),
        table.name
    ))
}

fn insert_all_sql(relation: &str) -> Result<String> {
    let table = schema::relation(relation)?;
    let placeholders: Vec<String> = (1..=table.columns.len())
        .map(|i| format!("?{}", i))
        .collect();
    Ok(format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table.name,
        table.column_names().join(", "),
        placeholders.join(", ")
    ))
}

impl WarehouseStore for SqliteWarehouse {
    fn reset_schema(&self) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        WAREHOUSE_SCHEMA
            .drop_all(&tx)
            .context("Failed to drop warehouse relations")?;
        WAREHOUSE_SCHEMA
            .create(&tx)
            .context("Failed to create warehouse relations")?;
        tx.commit()?;
        info!(
            "Recreated {} warehouse relations",
            WAREHOUSE_SCHEMA.tables.len()
        );
        Ok(())
    }

    fn replace_staging_events(&self, records: &[EventRecord]) -> Result<usize> {
        let sql = insert_all_sql(STAGING_EVENTS)?;
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(&format!("DELETE FROM {}", STAGING_EVENTS), [])?;
        {
            let mut stmt = tx.prepare_cached(&sql)?;
            for e in records {
                stmt.execute(params![
                    e.artist,
                    e.auth,
                    e.first_name,
                    e.gender,
                    e.item_in_session,
                    e.last_name,
                    e.length,
                    e.level,
                    e.location,
                    e.method,
                    e.page,
                    e.registration,
                    e.session_id,
                    e.song,
                    e.status,
                    e.ts,
                    e.user_agent,
                    e.user_id,
                ])
                .with_context(|| format!("Failed to stage event at ts {}", e.ts))?;
            }
        }
        tx.commit()?;
        Ok(records.len())
    }

    fn replace_staging_songs(&self, records: &[SongRecord]) -> Result<usize> {
        let sql = insert_all_sql(STAGING_SONGS)?;
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(&format!("DELETE FROM {}", STAGING_SONGS), [])?;
        {
            let mut stmt = tx.prepare_cached(&sql)?;
            for s in records {
                stmt.execute(params![
                    s.num_songs,
                    s.artist_id,
                    s.artist_latitude,
                    s.artist_longitude,
                    s.artist_location,
                    s.artist_name,
                    s.song_id,
                    s.title,
                    s.duration,
                    s.year,
                ])
                .with_context(|| format!("Failed to stage song {:?}", s.song_id))?;
            }
        }
        tx.commit()?;
        Ok(records.len())
    }

    fn read_staging(&self) -> Result<StagingSnapshot> {
        let events_sql = select_all_sql(STAGING_EVENTS)?;
        let songs_sql = select_all_sql(STAGING_SONGS)?;
        let conn = self.lock()?;

        let mut stmt = conn.prepare(&events_sql)?;
        let events = stmt
            .query_map([], event_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read staging_events")?;

        let mut stmt = conn.prepare(&songs_sql)?;
        let songs = stmt
            .query_map([], song_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read staging_songs")?;

        Ok(StagingSnapshot { events, songs })
    }

    fn write_rows(
        &self,
        table: &Table,
        policy: &ConflictPolicy,
        rows: &[Vec<Value>],
        batch_size: usize,
    ) -> Result<WriteSummary> {
        if batch_size == 0 {
            bail!("Batch size must be positive");
        }
        let sql = policy.insert_sql(table)?;
        let mut summary = WriteSummary {
            attempted: rows.len(),
            ..WriteSummary::default()
        };

        let mut conn = self.lock()?;
        for (batch_index, batch) in rows.chunks(batch_size).enumerate() {
            let tx = conn.transaction()?;
            let mut written = 0;
            {
                let mut stmt = tx.prepare_cached(&sql)?;
                for row in batch {
                    written += stmt
                        .execute(params_from_iter(row.iter()))
                        .with_context(|| {
                            format!("Failed to write {} row in batch {}", table.name, batch_index)
                        })?;
                }
            }
            tx.commit()?;
            debug!(
                "{}: committed batch {} ({} rows, {} written)",
                table.name,
                batch_index,
                batch.len(),
                written
            );
            summary.written += written;
            summary.batches += 1;
        }
        Ok(summary)
    }

    fn next_songplay_id(&self) -> Result<i64> {
        let conn = self.lock()?;
        let max: i64 = conn.query_row(
            "SELECT COALESCE(MAX(songplay_id), 0) FROM songplays",
            [],
            |r| r.get(0),
        )?;
        Ok(max + 1)
    }

    fn row_count(&self, relation: &str) -> Result<usize> {
        let table = schema::relation(relation)?;
        let conn = self.lock()?;
        let count: i64 =
            conn.query_row(&format!("SELECT COUNT(*) FROM {}", table.name), [], |r| {
                r.get(0)
            })?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::warehouse::models::{SongRow, UserRow, WarehouseRow};
    use crate::warehouse::schema::{relation, SONGS, USERS};
    use tempfile::TempDir;

    fn user(id: i64, level: &str) -> Vec<Value> {
        UserRow {
            user_id: id,
            first_name: Some("Kaylee".to_string()),
            last_name: None,
            gender: Some("F".to_string()),
            level: level.to_string(),
        }
        .to_values()
    }

    fn event(ts: i64) -> EventRecord {
        EventRecord {
            page: Some("NextSong".to_string()),
            ts,
            user_id: Some(8),
            ..EventRecord::default()
        }
    }

    #[test]
    fn test_destination_path() {
        assert_eq!(
            destination_path("sqlite:///tmp/dwh.db").unwrap(),
            PathBuf::from("/tmp/dwh.db")
        );
        assert_eq!(destination_path("dwh.db").unwrap(), PathBuf::from("dwh.db"));
        assert!(destination_path("postgres://host/db").is_err());
        assert!(destination_path("sqlite://").is_err());
    }

    #[test]
    fn test_open_creates_then_validates_schema() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dwh.db");
        {
            let store = SqliteWarehouse::open(&path).unwrap();
            assert_eq!(store.row_count(USERS).unwrap(), 0);
        }
        // Reopening validates the existing schema.
        SqliteWarehouse::open(&path).unwrap();
    }

    #[cfg(not(feature = "no_checks"))]
    #[test]
    fn test_open_rejects_foreign_schema() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dwh.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute("CREATE TABLE users (id INTEGER)", []).unwrap();
        }
        let err = match SqliteWarehouse::open(&path) {
            Err(err) => format!("{:#}", err),
            Ok(_) => panic!("foreign schema was accepted"),
        };
        assert!(err.contains("reset-schema"));

        let store = SqliteWarehouse::open_unvalidated(&path).unwrap();
        store.reset_schema().unwrap();
        drop(store);
        SqliteWarehouse::open(&path).unwrap();
    }

    #[test]
    fn test_replace_staging_is_not_additive() {
        let store = SqliteWarehouse::open_in_memory().unwrap();
        store
            .replace_staging_events(&[event(1), event(2), event(3)])
            .unwrap();
        store.replace_staging_events(&[event(4)]).unwrap();

        let snapshot = store.read_staging().unwrap();
        assert_eq!(snapshot.events.len(), 1);
        assert_eq!(snapshot.events[0].ts, 4);
        assert_eq!(snapshot.events[0].user_id, Some(8));
        assert_eq!(store.row_count(STAGING_EVENTS).unwrap(), 1);
    }

    #[test]
    fn test_staging_round_trip_keeps_order_and_nulls() {
        let store = SqliteWarehouse::open_in_memory().unwrap();
        let songs = vec![
            SongRecord {
                song_id: Some("SOB".to_string()),
                duration: Some(120.5),
                ..SongRecord::default()
            },
            SongRecord {
                song_id: Some("SOA".to_string()),
                ..SongRecord::default()
            },
        ];
        store.replace_staging_songs(&songs).unwrap();
        assert_eq!(store.read_staging().unwrap().songs, songs);
    }

    #[test]
    fn test_upsert_overwrites_level_only() {
        let store = SqliteWarehouse::open_in_memory().unwrap();
        let users = relation(USERS).unwrap();
        let policy = ConflictPolicy::default_for(USERS);

        let first = store
            .write_rows(users, &policy, &[user(8, "free")], 1000)
            .unwrap();
        assert_eq!(first.written, 1);

        let mut changed = user(8, "paid");
        changed[1] = Value::Text("Someone Else".to_string());
        store.write_rows(users, &policy, &[changed], 1000).unwrap();

        let rows = store.snapshot_relation(USERS).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][1], Value::Text("Kaylee".to_string()));
        assert_eq!(rows[0][4], Value::Text("paid".to_string()));
    }

    #[test]
    fn test_upsert_of_unchanged_row_counts_as_conflict() {
        let store = SqliteWarehouse::open_in_memory().unwrap();
        let users = relation(USERS).unwrap();
        let policy = ConflictPolicy::default_for(USERS);
        let rows = vec![user(8, "free"), user(26, "paid")];

        store.write_rows(users, &policy, &rows, 1000).unwrap();
        let rerun = store.write_rows(users, &policy, &rows, 1000).unwrap();
        assert_eq!(rerun.written, 0);
        assert_eq!(rerun.skipped(), 2);

        let upgraded = store
            .write_rows(users, &policy, &[user(8, "paid"), user(26, "paid")], 1000)
            .unwrap();
        assert_eq!(upgraded.written, 1);
        assert_eq!(upgraded.skipped(), 1);
    }

    #[test]
    fn test_songplays_upsert_matches_replayed_play_by_natural_key() {
        let store = SqliteWarehouse::open_in_memory().unwrap();
        let ts = 1541106106796;
        let time = crate::transform::decompose(ts).unwrap();
        store
            .write_rows(
                relation(schema::TIME).unwrap(),
                &ConflictPolicy::InsertIgnore,
                &[time.to_values()],
                10,
            )
            .unwrap();

        let songplays = relation(schema::SONGPLAYS).unwrap();
        let policy = ConflictPolicy::InsertOrUpdate {
            update_columns: vec!["level".to_string()],
        };
        let play = |songplay_id: i64, level: &str| {
            crate::warehouse::models::SongplayRow {
                songplay_id,
                start_time: ts,
                user_id: None,
                level: Some(level.to_string()),
                song_id: None,
                artist_id: None,
                session_id: 139,
                item_in_session: Some(1),
                location: None,
                user_agent: None,
            }
            .to_values()
        };

        store.write_rows(songplays, &policy, &[play(1, "free")], 10).unwrap();
        // A rerun numbers the same play from MAX + 1
        let rerun = store.write_rows(songplays, &policy, &[play(2, "free")], 10).unwrap();
        assert_eq!(rerun.written, 0);
        let updated = store.write_rows(songplays, &policy, &[play(3, "paid")], 10).unwrap();
        assert_eq!(updated.written, 1);

        let rows = store.snapshot_relation(schema::SONGPLAYS).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][0], Value::Integer(1));
        assert_eq!(rows[0][3], Value::Text("paid".to_string()));
    }

    #[test]
    fn test_insert_ignore_skips_existing_keys_in_batches() {
        let store = SqliteWarehouse::open_in_memory().unwrap();
        let songs = relation(SONGS).unwrap();
        let rows: Vec<Vec<Value>> = (0..5)
            .map(|i| {
                SongRow {
                    song_id: format!("SO{}", i),
                    title: format!("Song {}", i),
                    artist_id: "AR1".to_string(),
                    year: None,
                    duration: Some(200.0),
                }
                .to_values()
            })
            .collect();

        let summary = store
            .write_rows(songs, &ConflictPolicy::InsertIgnore, &rows[..3], 2)
            .unwrap();
        assert_eq!(summary.batches, 2);
        assert_eq!(summary.written, 3);

        let summary = store
            .write_rows(songs, &ConflictPolicy::InsertIgnore, &rows, 2)
            .unwrap();
        assert_eq!(summary.written, 2);
        assert_eq!(summary.skipped(), 3);
        assert_eq!(store.row_count(SONGS).unwrap(), 5);
    }

    #[test]
    fn test_foreign_key_violation_fails_write() {
        let store = SqliteWarehouse::open_in_memory().unwrap();
        let songplays = relation(schema::SONGPLAYS).unwrap();
        let row = crate::warehouse::models::SongplayRow {
            songplay_id: 1,
            start_time: 1541106106796,
            user_id: None,
            level: None,
            song_id: None,
            artist_id: None,
            session_id: 1,
            item_in_session: None,
            location: None,
            user_agent: None,
        };
        let result = store.write_rows(
            songplays,
            &ConflictPolicy::InsertIgnore,
            &[row.to_values()],
            10,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_next_songplay_id_and_reset() {
        let store = SqliteWarehouse::open_in_memory().unwrap();
        assert_eq!(store.next_songplay_id().unwrap(), 1);
        {
            let conn = store.lock().unwrap();
            conn.execute("INSERT INTO time VALUES (5, 0, 1, 1, 1, 1970, 3)", [])
                .unwrap();
            conn.execute(
                "INSERT INTO songplays (songplay_id, start_time, session_id, play_key) VALUES (41, 5, 1, 'k')",
                [],
            )
            .unwrap();
        }
        assert_eq!(store.next_songplay_id().unwrap(), 42);

        store.reset_schema().unwrap();
        assert_eq!(store.next_songplay_id().unwrap(), 1);
        assert_eq!(store.row_count(schema::TIME).unwrap(), 0);
    }

    #[test]
    fn test_row_count_of_unknown_relation_fails() {
        let store = SqliteWarehouse::open_in_memory().unwrap();
        assert!(store.row_count("plays").is_err());
    }
}
