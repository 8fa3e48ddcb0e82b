// 🗄️ Store - SQLite persistence for blobs, snapshots and normalized entities
//
// Tables:
// - raw_blobs            content-addressed XML exports (sha256 → bytes)
// - snapshots            one per applied import of a controller
// - snapshot_members     entity keys + content hashes produced by each snapshot
// - entities             current state per entity key (tombstoned, never deleted)
// - entity_events        audit trail of every applied change
// - controllers          latest snapshot + version counter per controller
// - controller_revisions one row per version bump
// - schema_registry      fingerprints of the mapping schema each vendor was imported with

use crate::config::ImportConfig;
use crate::differ::{DeltaCounts, SnapshotView};
use crate::entities::{EntityBody, EntityKey, EntityKind};
use crate::error::{ImportError, ImportResult};
use anyhow::Context;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

// ============================================================================
// RECORDS
// ============================================================================

/// An entity row as stored, tombstone included
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEntity {
    pub key: EntityKey,
    pub kind: EntityKind,
    pub controller: String,
    pub body: EntityBody,
    pub content_hash: String,
    /// Bumped on every applied update or revival
    pub version: i64,
    pub created_snapshot: String,
    pub created_at: DateTime<Utc>,
    pub updated_snapshot: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
    pub removed_snapshot: Option<String>,
    pub removed_at: Option<DateTime<Utc>>,
}

impl StoredEntity {
    pub fn is_live(&self) -> bool {
        self.removed_at.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotRecord {
    pub snapshot_id: String,
    pub controller: String,
    pub base_snapshot: Option<String>,
    pub blob_hash: String,
    pub source_name: String,
    pub schema_revision: String,
    pub export_date: Option<String>,
    pub imported_at: DateTime<Utc>,
    pub counts: DeltaCounts,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ControllerRecord {
    pub name: String,
    pub vendor: String,
    pub current_version: i64,
    pub latest_snapshot: String,
    pub facility_id: Option<i64>,
    pub unit_id: Option<i64>,
    pub last_export_date: Option<String>,
    pub first_imported_at: DateTime<Utc>,
    pub last_imported_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ControllerRevision {
    pub controller: String,
    pub version: i64,
    pub old_blob_hash: Option<String>,
    pub new_blob_hash: String,
    pub snapshot_id: String,
    pub change_summary: String,
    pub recorded_at: DateTime<Utc>,
}

/// Audit trail entry: one per applied change to an entity
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Event {
    pub event_id: String,
    pub snapshot_id: String,
    pub timestamp: DateTime<Utc>,
    /// created / updated / removed / revived
    pub event_type: String,
    pub entity_kind: String,
    pub entity_key: String,
    pub content_hash: Option<String>,
    pub data: serde_json::Value,
}

impl Event {
    /// Event ids derive from (snapshot, key) so replaying an apply cannot duplicate them
    pub fn new(
        snapshot_id: &str,
        event_type: &str,
        kind: EntityKind,
        key: &EntityKey,
        content_hash: Option<&str>,
        data: serde_json::Value,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id: crate::entities::sha256_hex(format!("{}\n{}", snapshot_id, key).as_bytes()),
            snapshot_id: snapshot_id.to_string(),
            timestamp,
            event_type: event_type.to_string(),
            entity_kind: kind.as_str().to_string(),
            entity_key: key.to_string(),
            content_hash: content_hash.map(str::to_string),
            data,
        }
    }
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> rusqlite::Result<()> {
    // WAL for crash recovery; in-memory databases report "memory" and that is fine
    let _mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS raw_blobs (
            content_hash TEXT PRIMARY KEY,
            content BLOB NOT NULL,
            size_bytes INTEGER NOT NULL,
            first_seen_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS snapshots (
            snapshot_id TEXT PRIMARY KEY,
            controller_name TEXT NOT NULL,
            base_snapshot TEXT,
            blob_hash TEXT NOT NULL REFERENCES raw_blobs(content_hash),
            source_name TEXT NOT NULL,
            schema_revision TEXT NOT NULL,
            export_date TEXT,
            imported_at TEXT NOT NULL,
            counts TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS snapshot_members (
            snapshot_id TEXT NOT NULL REFERENCES snapshots(snapshot_id),
            entity_key TEXT NOT NULL,
            kind TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            PRIMARY KEY (snapshot_id, entity_key)
        );

        CREATE TABLE IF NOT EXISTS entities (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            controller_name TEXT NOT NULL,
            entity_key TEXT NOT NULL,
            kind TEXT NOT NULL,
            scope TEXT,
            name TEXT NOT NULL,
            body TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            version INTEGER NOT NULL DEFAULT 1,
            created_snapshot TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_snapshot TEXT,
            updated_at TEXT,
            removed_snapshot TEXT,
            removed_at TEXT,
            UNIQUE (controller_name, entity_key)
        );

        CREATE TABLE IF NOT EXISTS entity_events (
            event_id TEXT PRIMARY KEY,
            snapshot_id TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_kind TEXT NOT NULL,
            entity_key TEXT NOT NULL,
            content_hash TEXT,
            data TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS controllers (
            name TEXT PRIMARY KEY,
            vendor TEXT NOT NULL,
            current_version INTEGER NOT NULL,
            latest_snapshot TEXT NOT NULL REFERENCES snapshots(snapshot_id),
            facility_id INTEGER,
            unit_id INTEGER,
            last_export_date TEXT,
            first_imported_at TEXT NOT NULL,
            last_imported_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS controller_revisions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            controller_name TEXT NOT NULL,
            version INTEGER NOT NULL,
            old_blob_hash TEXT,
            new_blob_hash TEXT NOT NULL,
            snapshot_id TEXT NOT NULL,
            change_summary TEXT NOT NULL,
            recorded_at TEXT NOT NULL,
            UNIQUE (controller_name, version)
        );

        CREATE TABLE IF NOT EXISTS schema_registry (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            vendor TEXT NOT NULL,
            schema_revision TEXT NOT NULL,
            fingerprint TEXT NOT NULL,
            registered_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_schema_registry_vendor ON schema_registry(vendor);
        CREATE INDEX IF NOT EXISTS idx_snapshots_controller ON snapshots(controller_name);
        CREATE INDEX IF NOT EXISTS idx_entities_controller ON entities(controller_name, kind);
        CREATE INDEX IF NOT EXISTS idx_entities_name ON entities(name);
        CREATE INDEX IF NOT EXISTS idx_events_entity ON entity_events(entity_key, timestamp);",
    )?;

    Ok(())
}

// ============================================================================
// STORE
// ============================================================================

/// Shared handle to the database. Statements serialize on the connection mutex;
/// per-controller ordering is the writer's job.
pub struct Store {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl Store {
    pub fn open(path: &Path, busy_timeout: Duration) -> ImportResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| ImportError::StorageUnavailable(format!("{}: {}", parent.display(), e)))?;
        }
        let conn = Connection::open(path).map_err(ImportError::storage)?;
        conn.busy_timeout(busy_timeout).map_err(ImportError::storage)?;
        setup_database(&conn).map_err(ImportError::storage)?;
        info!(target: "simec.import", db = %path.display(), "store opened");
        Ok(Store {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        })
    }

    pub fn open_with_config(config: &ImportConfig) -> ImportResult<Self> {
        Self::open(&config.db_path, Duration::from_millis(config.busy_timeout_ms))
    }

    pub fn open_in_memory() -> ImportResult<Self> {
        let conn = Connection::open_in_memory().map_err(ImportError::storage)?;
        setup_database(&conn).map_err(ImportError::storage)?;
        Ok(Store {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }

    /// Run a read against the connection, mapping SQLite failures to `StorageUnavailable`
    pub fn read<T>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> ImportResult<T> {
        let conn = self.lock();
        f(&conn).map_err(ImportError::storage)
    }

    pub fn latest_snapshot(&self, controller: &str) -> ImportResult<Option<SnapshotView>> {
        self.read(|conn| latest_snapshot(conn, controller))
    }

    pub fn snapshot(&self, snapshot_id: &str) -> ImportResult<Option<SnapshotRecord>> {
        self.read(|conn| get_snapshot(conn, snapshot_id))
    }

    pub fn snapshots_for(&self, controller: &str) -> ImportResult<Vec<SnapshotRecord>> {
        self.read(|conn| get_snapshots_for_controller(conn, controller))
    }

    pub fn entity(&self, key: &EntityKey) -> ImportResult<Option<StoredEntity>> {
        self.read(|conn| get_entity(conn, key))
    }

    pub fn live_entities(&self, controller: &str) -> ImportResult<Vec<StoredEntity>> {
        self.read(|conn| get_live_entities(conn, controller))
    }

    pub fn blob(&self, content_hash: &str) -> ImportResult<Option<Vec<u8>>> {
        self.read(|conn| get_blob(conn, content_hash))
    }

    pub fn blob_count(&self) -> ImportResult<i64> {
        self.read(|conn| conn.query_row("SELECT COUNT(*) FROM raw_blobs", [], |row| row.get(0)))
    }

    pub fn controller(&self, name: &str) -> ImportResult<Option<ControllerRecord>> {
        self.read(|conn| get_controller(conn, name))
    }

    pub fn controller_revisions(&self, name: &str) -> ImportResult<Vec<ControllerRevision>> {
        self.read(|conn| get_controller_revisions(conn, name))
    }

    pub fn history(&self, key: &EntityKey) -> ImportResult<Vec<Event>> {
        self.read(|conn| get_events_for_entity(conn, key))
    }

    /// Most recently registered schema fingerprint for a vendor code
    pub fn schema_fingerprint(&self, vendor: &str) -> ImportResult<Option<String>> {
        self.read(|conn| latest_schema_fingerprint(conn, vendor))
    }

    /// Copy the database to `<stem>_bakNNN.sqlite` beside it, keeping the newest `max_backups`
    pub fn backup_rolling(&self, max_backups: usize) -> anyhow::Result<PathBuf> {
        let src = self
            .path
            .as_deref()
            .context("in-memory stores cannot be backed up")?;
        let dir = src.parent().unwrap_or_else(|| Path::new("."));
        let stem = src
            .file_stem()
            .and_then(|s| s.to_str())
            .context("database path has no file stem")?;

        let mut numbered = existing_backups(dir, stem)?;
        let next = numbered.last().map_or(1, |(n, _)| n + 1);
        let dst = dir.join(format!("{}_bak{:03}.sqlite", stem, next));

        {
            let conn = self.lock();
            conn.backup(rusqlite::DatabaseName::Main, &dst, None)
                .with_context(|| format!("Failed to back up to {}", dst.display()))?;
        }
        numbered.push((next, dst.clone()));

        while numbered.len() > max_backups.max(1) {
            let (_, oldest) = numbered.remove(0);
            if let Err(e) = std::fs::remove_file(&oldest) {
                warn!(target: "simec.import", path = %oldest.display(), error = %e, "failed to delete old backup");
            }
        }

        info!(target: "simec.import", backup = %dst.display(), "database backed up");
        Ok(dst)
    }
}

fn existing_backups(dir: &Path, stem: &str) -> anyhow::Result<Vec<(u32, PathBuf)>> {
    let prefix = format!("{}_bak", stem);
    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("Failed to list {}", dir.display()))? {
        let path = entry?.path();
        let number = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_prefix(&prefix))
            .and_then(|n| n.strip_suffix(".sqlite"))
            .filter(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|n| n.parse::<u32>().ok());
        if let Some(number) = number {
            found.push((number, path));
        }
    }
    found.sort();
    Ok(found)
}

// ============================================================================
// QUERIES
// ============================================================================

fn parse_time(idx: usize, raw: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_opt_time(idx: usize, raw: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    raw.map(|s| parse_time(idx, s)).transpose()
}

fn parse_kind(idx: usize, raw: String) -> rusqlite::Result<EntityKind> {
    EntityKind::parse(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unknown entity kind '{}'", raw).into(),
        )
    })
}

fn parse_json<T: serde::de::DeserializeOwned>(idx: usize, raw: String) -> rusqlite::Result<T> {
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Latest applied snapshot of a controller, with its membership
pub fn latest_snapshot(conn: &Connection, controller: &str) -> rusqlite::Result<Option<SnapshotView>> {
    let head: Option<(String, String)> = conn
        .query_row(
            "SELECT s.snapshot_id, s.blob_hash
             FROM controllers c JOIN snapshots s ON s.snapshot_id = c.latest_snapshot
             WHERE c.name = ?1",
            [controller],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let (snapshot_id, blob_hash) = match head {
        Some(head) => head,
        None => return Ok(None),
    };

    Ok(Some(SnapshotView {
        members: get_snapshot_members(conn, &snapshot_id)?,
        snapshot_id,
        blob_hash,
    }))
}

pub fn get_snapshot_members(
    conn: &Connection,
    snapshot_id: &str,
) -> rusqlite::Result<BTreeMap<EntityKey, (EntityKind, String)>> {
    let mut stmt = conn.prepare(
        "SELECT entity_key, kind, content_hash FROM snapshot_members WHERE snapshot_id = ?1",
    )?;
    let members = stmt
        .query_map([snapshot_id], |row| {
            Ok((
                EntityKey::from_stored(row.get(0)?),
                (parse_kind(1, row.get(1)?)?, row.get::<_, String>(2)?),
            ))
        })?
        .collect::<Result<BTreeMap<_, _>, _>>()?;
    Ok(members)
}

fn snapshot_from_row(row: &Row<'_>) -> rusqlite::Result<SnapshotRecord> {
    Ok(SnapshotRecord {
        snapshot_id: row.get(0)?,
        controller: row.get(1)?,
        base_snapshot: row.get(2)?,
        blob_hash: row.get(3)?,
        source_name: row.get(4)?,
        schema_revision: row.get(5)?,
        export_date: row.get(6)?,
        imported_at: parse_time(7, row.get(7)?)?,
        counts: parse_json(8, row.get(8)?)?,
    })
}

const SNAPSHOT_COLUMNS: &str = "snapshot_id, controller_name, base_snapshot, blob_hash, source_name,
     schema_revision, export_date, imported_at, counts";

pub fn get_snapshot(conn: &Connection, snapshot_id: &str) -> rusqlite::Result<Option<SnapshotRecord>> {
    conn.query_row(
        &format!("SELECT {} FROM snapshots WHERE snapshot_id = ?1", SNAPSHOT_COLUMNS),
        [snapshot_id],
        snapshot_from_row,
    )
    .optional()
}

/// Snapshots of a controller, oldest first
pub fn get_snapshots_for_controller(
    conn: &Connection,
    controller: &str,
) -> rusqlite::Result<Vec<SnapshotRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM snapshots WHERE controller_name = ?1 ORDER BY rowid",
        SNAPSHOT_COLUMNS
    ))?;
    let snapshots = stmt
        .query_map([controller], snapshot_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(snapshots)
}

const ENTITY_COLUMNS: &str = "entity_key, kind, controller_name, body, content_hash, version,
     created_snapshot, created_at, updated_snapshot, updated_at, removed_snapshot, removed_at";

fn entity_from_row(row: &Row<'_>) -> rusqlite::Result<StoredEntity> {
    Ok(StoredEntity {
        key: EntityKey::from_stored(row.get(0)?),
        kind: parse_kind(1, row.get(1)?)?,
        controller: row.get(2)?,
        body: parse_json(3, row.get(3)?)?,
        content_hash: row.get(4)?,
        version: row.get(5)?,
        created_snapshot: row.get(6)?,
        created_at: parse_time(7, row.get(7)?)?,
        updated_snapshot: row.get(8)?,
        updated_at: parse_opt_time(9, row.get(9)?)?,
        removed_snapshot: row.get(10)?,
        removed_at: parse_opt_time(11, row.get(11)?)?,
    })
}

/// Entity by key, tombstoned or not
pub fn get_entity(conn: &Connection, key: &EntityKey) -> rusqlite::Result<Option<StoredEntity>> {
    conn.query_row(
        &format!("SELECT {} FROM entities WHERE entity_key = ?1", ENTITY_COLUMNS),
        [key.as_str()],
        entity_from_row,
    )
    .optional()
}

pub fn get_live_entities(conn: &Connection, controller: &str) -> rusqlite::Result<Vec<StoredEntity>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM entities
         WHERE controller_name = ?1 AND removed_at IS NULL
         ORDER BY entity_key",
        ENTITY_COLUMNS
    ))?;
    let entities = stmt
        .query_map([controller], entity_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(entities)
}

pub fn get_blob(conn: &Connection, content_hash: &str) -> rusqlite::Result<Option<Vec<u8>>> {
    conn.query_row(
        "SELECT content FROM raw_blobs WHERE content_hash = ?1",
        [content_hash],
        |row| row.get(0),
    )
    .optional()
}

pub fn get_controller(conn: &Connection, name: &str) -> rusqlite::Result<Option<ControllerRecord>> {
    conn.query_row(
        "SELECT name, vendor, current_version, latest_snapshot, facility_id, unit_id,
                last_export_date, first_imported_at, last_imported_at
         FROM controllers WHERE name = ?1",
        [name],
        |row| {
            Ok(ControllerRecord {
                name: row.get(0)?,
                vendor: row.get(1)?,
                current_version: row.get(2)?,
                latest_snapshot: row.get(3)?,
                facility_id: row.get(4)?,
                unit_id: row.get(5)?,
                last_export_date: row.get(6)?,
                first_imported_at: parse_time(7, row.get(7)?)?,
                last_imported_at: parse_time(8, row.get(8)?)?,
            })
        },
    )
    .optional()
}

pub fn get_controller_revisions(
    conn: &Connection,
    name: &str,
) -> rusqlite::Result<Vec<ControllerRevision>> {
    let mut stmt = conn.prepare(
        "SELECT controller_name, version, old_blob_hash, new_blob_hash, snapshot_id,
                change_summary, recorded_at
         FROM controller_revisions WHERE controller_name = ?1 ORDER BY version",
    )?;
    let revisions = stmt
        .query_map([name], |row| {
            Ok(ControllerRevision {
                controller: row.get(0)?,
                version: row.get(1)?,
                old_blob_hash: row.get(2)?,
                new_blob_hash: row.get(3)?,
                snapshot_id: row.get(4)?,
                change_summary: row.get(5)?,
                recorded_at: parse_time(6, row.get(6)?)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(revisions)
}

pub fn latest_schema_fingerprint(conn: &Connection, vendor: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT fingerprint FROM schema_registry WHERE vendor = ?1 ORDER BY id DESC LIMIT 1",
        [vendor],
        |row| row.get(0),
    )
    .optional()
}

/// Record `fingerprint` as the vendor's current schema unless it already is
pub fn register_schema(
    conn: &Connection,
    vendor: &str,
    schema_revision: &str,
    fingerprint: &str,
    now: DateTime<Utc>,
) -> rusqlite::Result<bool> {
    if latest_schema_fingerprint(conn, vendor)?.as_deref() == Some(fingerprint) {
        return Ok(false);
    }
    conn.execute(
        "INSERT INTO schema_registry (vendor, schema_revision, fingerprint, registered_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![vendor, schema_revision, fingerprint, now.to_rfc3339()],
    )?;
    Ok(true)
}

/// Insert event into audit trail; a replayed event id is ignored
pub fn insert_event(conn: &Connection, event: &Event) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO entity_events (
            event_id, snapshot_id, timestamp, event_type, entity_kind, entity_key, content_hash, data
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            event.event_id,
            event.snapshot_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_kind,
            event.entity_key,
            event.content_hash,
            event.data.to_string(),
        ],
    )?;
    Ok(())
}

/// Every change recorded for an entity, oldest first
pub fn get_events_for_entity(conn: &Connection, key: &EntityKey) -> rusqlite::Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, snapshot_id, timestamp, event_type, entity_kind, entity_key, content_hash, data
         FROM entity_events
         WHERE entity_key = ?1
         ORDER BY rowid",
    )?;

    let events = stmt
        .query_map([key.as_str()], |row| {
            Ok(Event {
                event_id: row.get(0)?,
                snapshot_id: row.get(1)?,
                timestamp: parse_time(2, row.get(2)?)?,
                event_type: row.get(3)?,
                entity_kind: row.get(4)?,
                entity_key: row.get(5)?,
                content_hash: row.get(6)?,
                data: parse_json(7, row.get(7)?)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}

/// Deterministic text dump of every table, for before/after comparisons in tests
#[cfg(test)]
pub(crate) fn dump_tables(conn: &Connection) -> String {
    let tables = [
        "raw_blobs",
        "snapshots",
        "snapshot_members",
        "entities",
        "entity_events",
        "controllers",
        "controller_revisions",
        "schema_registry",
    ];
    let mut out = String::new();
    for table in tables {
        out.push_str(&format!("## {}\n", table));
        let mut stmt = conn
            .prepare(&format!("SELECT * FROM {} ORDER BY 1, 2", table))
            .unwrap();
        let columns = stmt.column_count();
        let rows = stmt
            .query_map([], |row| {
                let mut cells = Vec::with_capacity(columns);
                for i in 0..columns {
                    let value: rusqlite::types::Value = row.get(i)?;
                    cells.push(format!("{:?}", value));
                }
                Ok(cells.join(" | "))
            })
            .unwrap();
        for row in rows {
            out.push_str(&row.unwrap());
            out.push('\n');
        }
    }
    out
}
