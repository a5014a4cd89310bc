//! SQLite-backed event storage.
//!
//! Handlers only see the [`EventStore`] trait; this module is the only place
//! that runs SQL.

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{EventRecord, EventStatus};

pub type StoreResult<T> = Result<T, StoreError>;

/// CRUD over seminar events.
pub trait EventStore {
    fn insert(&mut self, event: &EventRecord) -> StoreResult<()>;
    fn update(&mut self, event: &EventRecord) -> StoreResult<()>;
    fn get(&self, id: Uuid) -> StoreResult<EventRecord>;
    /// All events, oldest first.
    fn list(&self) -> StoreResult<Vec<EventRecord>>;
    fn delete(&mut self, id: Uuid) -> StoreResult<()>;
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS events (
    id                      TEXT PRIMARY KEY,
    date                    TEXT NOT NULL,
    location                TEXT NOT NULL,
    topic                   TEXT NOT NULL,
    advertising_cost        REAL NOT NULL,
    food_venue_cost         REAL NOT NULL,
    audience_total          INTEGER NOT NULL,
    registrant_responses    INTEGER NOT NULL,
    confirmations           INTEGER NOT NULL,
    attendees               INTEGER NOT NULL,
    appointments            INTEGER NOT NULL,
    clients_from_event      INTEGER NOT NULL,
    fixed_annuity_production REAL NOT NULL,
    life_production         REAL NOT NULL,
    aum_total               REAL NOT NULL,
    planning_fee_count      INTEGER,
    planning_fee_rate       REAL,
    annuity_premium         REAL,
    life_insurance_premium  REAL,
    status                  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS events_date_idx ON events (date);
";

const COLUMNS: &str = "id, date, location, topic, advertising_cost, food_venue_cost, \
    audience_total, registrant_responses, confirmations, attendees, appointments, \
    clients_from_event, fixed_annuity_production, life_production, aum_total, \
    planning_fee_count, planning_fee_rate, annuity_premium, life_insurance_premium, status";

pub struct SqliteEventStore {
    conn: Connection,
}

impl SqliteEventStore {
    /// Open (or create) the database at `path` and ensure the schema exists.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path.as_ref())?;
        if let Err(err) = conn.execute_batch("PRAGMA journal_mode=WAL;") {
            warn!(error = %err, "could not enable WAL journal; using default mode");
        }
        Self::with_connection(conn)
    }

    /// In-memory database (used in tests).
    pub fn in_memory() -> StoreResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<(String, String, EventRecord)> {
    let id: String = row.get(0)?;
    let status: String = row.get(19)?;
    let record = EventRecord {
        id: Uuid::nil(),
        date: row.get(1)?,
        location: row.get(2)?,
        topic: row.get(3)?,
        advertising_cost: row.get(4)?,
        food_venue_cost: row.get(5)?,
        audience_total: row.get(6)?,
        registrant_responses: row.get(7)?,
        confirmations: row.get(8)?,
        attendees: row.get(9)?,
        appointments: row.get(10)?,
        clients_from_event: row.get(11)?,
        fixed_annuity_production: row.get(12)?,
        life_production: row.get(13)?,
        aum_total: row.get(14)?,
        planning_fee_count: row.get(15)?,
        planning_fee_rate: row.get(16)?,
        annuity_premium: row.get(17)?,
        life_insurance_premium: row.get(18)?,
        status: EventStatus::Incomplete,
    };
    Ok((id, status, record))
}

/// Resolve the text columns rusqlite cannot map directly.
fn finish_row((id, status, mut record): (String, String, EventRecord)) -> StoreResult<EventRecord> {
    record.id = Uuid::parse_str(&id).map_err(|_| StoreError::Corrupt(format!("bad id {id:?}")))?;
    record.status = EventStatus::parse(&status)
        .ok_or_else(|| StoreError::Corrupt(format!("bad status {status:?} for {id}")))?;
    Ok(record)
}

impl EventStore for SqliteEventStore {
    fn insert(&mut self, event: &EventRecord) -> StoreResult<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO events ({COLUMNS}) VALUES \
                 (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)"
            ),
            params![
                event.id.to_string(),
                event.date,
                event.location,
                event.topic,
                event.advertising_cost,
                event.food_venue_cost,
                event.audience_total,
                event.registrant_responses,
                event.confirmations,
                event.attendees,
                event.appointments,
                event.clients_from_event,
                event.fixed_annuity_production,
                event.life_production,
                event.aum_total,
                event.planning_fee_count,
                event.planning_fee_rate,
                event.annuity_premium,
                event.life_insurance_premium,
                event.status.as_str(),
            ],
        )?;
        debug!(id = %event.id, topic = %event.topic, "event inserted");
        Ok(())
    }

    fn update(&mut self, event: &EventRecord) -> StoreResult<()> {
        let changed = self.conn.execute(
            "UPDATE events SET date = ?2, location = ?3, topic = ?4, advertising_cost = ?5, \
             food_venue_cost = ?6, audience_total = ?7, registrant_responses = ?8, \
             confirmations = ?9, attendees = ?10, appointments = ?11, clients_from_event = ?12, \
             fixed_annuity_production = ?13, life_production = ?14, aum_total = ?15, \
             planning_fee_count = ?16, planning_fee_rate = ?17, annuity_premium = ?18, \
             life_insurance_premium = ?19, status = ?20 WHERE id = ?1",
            params![
                event.id.to_string(),
                event.date,
                event.location,
                event.topic,
                event.advertising_cost,
                event.food_venue_cost,
                event.audience_total,
                event.registrant_responses,
                event.confirmations,
                event.attendees,
                event.appointments,
                event.clients_from_event,
                event.fixed_annuity_production,
                event.life_production,
                event.aum_total,
                event.planning_fee_count,
                event.planning_fee_rate,
                event.annuity_premium,
                event.life_insurance_premium,
                event.status.as_str(),
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(event.id));
        }
        debug!(id = %event.id, "event updated");
        Ok(())
    }

    fn get(&self, id: Uuid) -> StoreResult<EventRecord> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM events WHERE id = ?1"),
                params![id.to_string()],
                read_row,
            )
            .optional()?;
        match row {
            Some(row) => finish_row(row),
            None => Err(StoreError::NotFound(id)),
        }
    }

    fn list(&self) -> StoreResult<Vec<EventRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {COLUMNS} FROM events ORDER BY date ASC, rowid ASC"))?;
        let rows = stmt
            .query_map([], read_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        let events = rows.into_iter().map(finish_row).collect::<StoreResult<Vec<_>>>()?;
        debug!(count = events.len(), "events listed");
        Ok(events)
    }

    fn delete(&mut self, id: Uuid) -> StoreResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM events WHERE id = ?1", params![id.to_string()])?;
        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }
        debug!(%id, "event deleted");
        Ok(())
    }
}
