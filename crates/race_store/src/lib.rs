//! SQLite repository for races, locations, and forecast rows.
//!
//! One explicitly constructed store instance is injected into every component
//! that needs storage; there is no ambient global handle. The connection sits
//! behind a mutex and is safe for concurrent use by the sync pass, the reaper,
//! and request handlers; locks are held only across single statements.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use common::{Error, ForecastSample, Location, RaceWindow, Result};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

/// Idempotent schema. Timestamps are RFC 3339 UTC text: constant width, so
/// SQL string comparison is chronological.
const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS locations (
    location_id INTEGER PRIMARY KEY AUTOINCREMENT,
    lat TEXT NOT NULL,
    lon TEXT NOT NULL,
    UNIQUE (lat, lon)
);
CREATE TABLE IF NOT EXISTS races (
    race_id INTEGER PRIMARY KEY AUTOINCREMENT,
    location_id INTEGER NOT NULL REFERENCES locations(location_id),
    name TEXT NOT NULL,
    race_start TEXT NOT NULL,
    race_end TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS forecasts (
    location_id INTEGER NOT NULL REFERENCES locations(location_id),
    condition_icon TEXT NOT NULL,
    forecast_time TEXT NOT NULL,
    rain REAL NOT NULL,
    snow REAL NOT NULL,
    temperature REAL NOT NULL,
    humidity INTEGER NOT NULL,
    wind_speed REAL NOT NULL,
    UNIQUE (location_id, forecast_time)
);
";

fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Decode a stored RFC 3339 timestamp, reporting the failing column on error.
fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn db_err(e: rusqlite::Error) -> Error {
    Error::Persistence(e.to_string())
}

/// Repository over races, locations, and forecast rows.
#[derive(Clone)]
pub struct RaceStore {
    conn: Arc<Mutex<Connection>>,
}

impl RaceStore {
    /// Open (or create) the database file and run the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref()).map_err(db_err)?;
        Self::from_connection(conn)
    }

    /// In-memory store, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        info!("Storage schema ready");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Persistence("storage mutex poisoned".into()))
    }

    // ── Race CRUD ─────────────────────────────────────────────────────

    /// Insert a race, creating its location row if this is the first race
    /// there. Returns `(race_id, location_id)`.
    pub fn create_race(
        &self,
        name: &str,
        location: &Location,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<(i64, i64)> {
        let conn = self.conn()?;
        let location_id = resolve_location(&conn, location)?;
        conn.execute(
            "INSERT INTO races (location_id, name, race_start, race_end)
             VALUES (?1, ?2, ?3, ?4)",
            params![location_id, name, ts(start), ts(end)],
        )
        .map_err(db_err)?;
        Ok((conn.last_insert_rowid(), location_id))
    }

    /// # Errors
    /// `Error::NotFound` for an unknown race id.
    pub fn get_race(&self, race_id: i64) -> Result<RaceWindow> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT r.race_id, r.name, r.race_start, r.race_end,
                    l.location_id, l.lat, l.lon
             FROM races r JOIN locations l ON l.location_id = r.location_id
             WHERE r.race_id = ?1",
            params![race_id],
            row_to_race,
        )
        .optional()
        .map_err(db_err)?
        .ok_or_else(|| Error::NotFound(format!("race {race_id}")))
    }

    /// Update all mutable race fields, re-resolving the location.
    ///
    /// # Errors
    /// `Error::NotFound` for an unknown race id.
    pub fn update_race(
        &self,
        race_id: i64,
        name: &str,
        location: &Location,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.conn()?;
        let location_id = resolve_location(&conn, location)?;
        let changed = conn
            .execute(
                "UPDATE races
                 SET location_id = ?2, name = ?3, race_start = ?4, race_end = ?5
                 WHERE race_id = ?1",
                params![race_id, location_id, name, ts(start), ts(end)],
            )
            .map_err(db_err)?;
        if changed == 0 {
            return Err(Error::NotFound(format!("race {race_id}")));
        }
        Ok(())
    }

    /// # Errors
    /// `Error::NotFound` for an unknown race id.
    pub fn delete_race(&self, race_id: i64) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn
            .execute("DELETE FROM races WHERE race_id = ?1", params![race_id])
            .map_err(db_err)?;
        if changed == 0 {
            return Err(Error::NotFound(format!("race {race_id}")));
        }
        Ok(())
    }

    /// All races whose end is still in the future, in creation order.
    pub fn list_active_races(&self, now: DateTime<Utc>) -> Result<Vec<RaceWindow>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT r.race_id, r.name, r.race_start, r.race_end,
                        l.location_id, l.lat, l.lon
                 FROM races r JOIN locations l ON l.location_id = r.location_id
                 WHERE r.race_end > ?1
                 ORDER BY r.race_id",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![ts(now)], row_to_race)
            .map_err(db_err)?;
        let mut races = Vec::new();
        for row in rows {
            races.push(row.map_err(db_err)?);
        }
        Ok(races)
    }

    // ── Forecast reads ────────────────────────────────────────────────

    /// Stored samples for a race's location, clamped to the race window and
    /// excluding steps already in the past.
    ///
    /// # Errors
    /// `Error::NotFound` for an unknown race id.
    pub fn race_forecast(&self, race_id: i64, now: DateTime<Utc>) -> Result<Vec<ForecastSample>> {
        let race = self.get_race(race_id)?;
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT forecast_time, temperature, humidity, wind_speed,
                        rain, snow, condition_icon
                 FROM forecasts
                 WHERE location_id = ?1
                   AND forecast_time >= ?2 AND forecast_time <= ?3
                   AND forecast_time >= ?4
                 ORDER BY forecast_time",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(
                params![race.location_id, ts(race.start), ts(race.end), ts(now)],
                row_to_sample,
            )
            .map_err(db_err)?;
        let mut samples = Vec::new();
        for row in rows {
            samples.push(row.map_err(db_err)?);
        }
        Ok(samples)
    }

    // ── Forecast writes (reconciler / reaper surface) ─────────────────

    pub fn has_forecast_rows(&self, location_id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM forecasts WHERE location_id = ?1",
                params![location_id],
                |row| row.get(0),
            )
            .map_err(db_err)?;
        Ok(count > 0)
    }

    /// Insert samples for a location, silently skipping any
    /// `(location, forecast_time)` pair that already exists. Returns the
    /// number of rows actually inserted.
    pub fn insert_samples(&self, location_id: i64, samples: &[ForecastSample]) -> Result<usize> {
        let conn = self.conn()?;
        let mut inserted = 0;
        for sample in samples {
            inserted += conn
                .execute(
                    "INSERT INTO forecasts (location_id, condition_icon, forecast_time,
                                            rain, snow, temperature, humidity, wind_speed)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                     ON CONFLICT (location_id, forecast_time) DO NOTHING",
                    params![
                        location_id,
                        sample.condition_icon,
                        ts(sample.forecast_time),
                        sample.rain_3h,
                        sample.snow_3h,
                        sample.temperature,
                        sample.humidity,
                        sample.wind_speed,
                    ],
                )
                .map_err(db_err)?;
        }
        Ok(inserted)
    }

    /// Refresh the stored row matching this sample's timestamp.
    /// Returns false when no row matched.
    pub fn update_sample(&self, location_id: i64, sample: &ForecastSample) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn
            .execute(
                "UPDATE forecasts
                 SET condition_icon = ?3, rain = ?4, snow = ?5,
                     temperature = ?6, humidity = ?7, wind_speed = ?8
                 WHERE location_id = ?1 AND forecast_time = ?2",
                params![
                    location_id,
                    ts(sample.forecast_time),
                    sample.condition_icon,
                    sample.rain_3h,
                    sample.snow_3h,
                    sample.temperature,
                    sample.humidity,
                    sample.wind_speed,
                ],
            )
            .map_err(db_err)?;
        Ok(changed > 0)
    }

    /// Delete every forecast row strictly before `now`. Returns the count.
    pub fn delete_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM forecasts WHERE forecast_time < ?1", params![ts(now)])
            .map_err(db_err)
    }
}

/// Get-or-create the location row for exact `(lat, lon)` identity.
fn resolve_location(conn: &Connection, location: &Location) -> Result<i64> {
    conn.execute(
        "INSERT INTO locations (lat, lon) VALUES (?1, ?2)
         ON CONFLICT (lat, lon) DO NOTHING",
        params![location.lat, location.lon],
    )
    .map_err(db_err)?;
    conn.query_row(
        "SELECT location_id FROM locations WHERE lat = ?1 AND lon = ?2",
        params![location.lat, location.lon],
        |row| row.get(0),
    )
    .map_err(db_err)
}

fn row_to_race(row: &rusqlite::Row<'_>) -> rusqlite::Result<RaceWindow> {
    let start: String = row.get(2)?;
    let end: String = row.get(3)?;
    Ok(RaceWindow {
        id: row.get(0)?,
        name: row.get(1)?,
        start: parse_ts(2, &start)?,
        end: parse_ts(3, &end)?,
        location_id: row.get(4)?,
        location: Location {
            lat: row.get(5)?,
            lon: row.get(6)?,
        },
    })
}

fn row_to_sample(row: &rusqlite::Row<'_>) -> rusqlite::Result<ForecastSample> {
    let time: String = row.get(0)?;
    Ok(ForecastSample {
        forecast_time: parse_ts(0, &time)?,
        temperature: row.get(1)?,
        humidity: row.get(2)?,
        wind_speed: row.get(3)?,
        rain_3h: row.get(4)?,
        snow_3h: row.get(5)?,
        condition_icon: row.get(6)?,
    })
}
