//! Incident persistence.
//!
//! Incidents are append-only records: the core never mutates or deletes
//! them (retention is an external concern). The SQLite store backs the
//! daemon; the in-memory store backs tests and the demo binary.

use anyhow::Result;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

/// One persisted safety incident. Immutable once created.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    pub timestamp: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub image_path: String,
    pub details: String,
}

pub trait IncidentStore: Send {
    fn append(&mut self, incident: &Incident) -> Result<()>;

    /// Most recent incidents, newest first.
    fn recent(&mut self, limit: usize) -> Result<Vec<Incident>>;
}

// ----------------------------------------------------------------------------
// SQLite store
// ----------------------------------------------------------------------------

pub struct SqliteIncidentStore {
    conn: Connection,
}

impl SqliteIncidentStore {
    pub fn open(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        let store = Self { conn };
        store.ensure_schema()?;
        Ok(store)
    }

    fn ensure_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;

            CREATE TABLE IF NOT EXISTS incidents (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              timestamp TEXT NOT NULL,
              type TEXT NOT NULL,
              image_path TEXT,
              details TEXT
            );
            "#,
        )?;
        Ok(())
    }
}

impl IncidentStore for SqliteIncidentStore {
    fn append(&mut self, incident: &Incident) -> Result<()> {
        self.conn.execute(
            "INSERT INTO incidents (timestamp, type, image_path, details) VALUES (?1, ?2, ?3, ?4)",
            params![
                incident.timestamp,
                incident.kind,
                incident.image_path,
                incident.details
            ],
        )?;
        Ok(())
    }

    fn recent(&mut self, limit: usize) -> Result<Vec<Incident>> {
        let mut stmt = self.conn.prepare(
            "SELECT timestamp, type, image_path, details FROM incidents ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(Incident {
                timestamp: row.get(0)?,
                kind: row.get(1)?,
                image_path: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                details: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
            })
        })?;

        let mut incidents = Vec::new();
        for row in rows {
            incidents.push(row?);
        }
        Ok(incidents)
    }
}

// ----------------------------------------------------------------------------
// In-memory store
// ----------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct InMemoryIncidentStore {
    incidents: Vec<Incident>,
}

impl InMemoryIncidentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.incidents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.incidents.is_empty()
    }
}

impl IncidentStore for InMemoryIncidentStore {
    fn append(&mut self, incident: &Incident) -> Result<()> {
        self.incidents.push(incident.clone());
        Ok(())
    }

    fn recent(&mut self, limit: usize) -> Result<Vec<Incident>> {
        Ok(self.incidents.iter().rev().take(limit).cloned().collect())
    }
}
