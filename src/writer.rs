// ✍️ Idempotent Writer
// Applies a DeltaSet to the store in a single IMMEDIATE transaction.
//
// Re-run safety:
// - snapshot ids are deterministic: sha256(controller, base snapshot, blob hash)
// - a snapshot id that already exists means the apply already happened (replayed)
// - blob inserts are INSERT OR IGNORE
// - row writes are guarded so a second pass changes nothing
//
// Entities are never deleted. A removed entity is tombstoned; if it comes back it is revived.

use crate::db::{self, Event};
use crate::differ::{ChangeKind, Delta, DeltaCounts, DeltaSet};
use crate::entities::{sha256_hex, Entity, EntityKey, EntityKind};
use crate::error::{ImportError, ImportResult};
use crate::mapper::MappedDocument;
use crate::reader::Vendor;
use crate::schema;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

// ============================================================================
// INPUTS / OUTPUT
// ============================================================================

/// The exact bytes of an export, addressed by their SHA-256
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBlob {
    pub hash: String,
    pub bytes: Vec<u8>,
}

impl RawBlob {
    pub fn new(bytes: Vec<u8>) -> Self {
        RawBlob {
            hash: sha256_hex(&bytes),
            bytes,
        }
    }
}

/// Document-level metadata recorded with the snapshot and controller row
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyContext {
    pub source_name: String,
    pub vendor: Vendor,
    pub schema_revision: String,
    pub export_date: Option<String>,
    pub facility_id: Option<i64>,
    pub unit_id: Option<i64>,
    /// Fingerprint of the element schemas the document was mapped with
    pub schema_fingerprint: String,
    /// Refuse the apply when the store registered a different fingerprint for this vendor
    pub abort_on_schema_mismatch: bool,
}

impl ApplyContext {
    pub fn for_document(document: &MappedDocument, source_name: &str) -> Self {
        ApplyContext {
            source_name: source_name.to_string(),
            vendor: document.vendor,
            schema_revision: document.schema_revision.clone(),
            export_date: document.export_date.clone(),
            facility_id: None,
            unit_id: None,
            schema_fingerprint: schema::fingerprint(),
            abort_on_schema_mismatch: true,
        }
    }

    pub fn with_schema_check(mut self, abort_on_mismatch: bool) -> Self {
        self.abort_on_schema_mismatch = abort_on_mismatch;
        self
    }

    pub fn with_placement(mut self, facility_id: Option<i64>, unit_id: Option<i64>) -> Self {
        self.facility_id = facility_id;
        self.unit_id = unit_id;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WriteOutcome {
    pub controller: String,
    pub snapshot_id: String,
    pub counts: DeltaCounts,
    pub blob_hash: String,
    /// False when the blob was already stored
    pub blob_new: bool,
    /// Controller version after the apply
    pub version: i64,
    /// The same delta set had already been applied; nothing was written
    pub replayed: bool,
    /// Identical bytes and content as the base snapshot; nothing was written
    pub reused: bool,
}

/// Deterministic snapshot id
pub fn snapshot_id(controller: &str, base_snapshot: Option<&str>, blob_hash: &str) -> String {
    sha256_hex(format!("{}\n{}\n{}", controller, base_snapshot.unwrap_or(""), blob_hash).as_bytes())
}

// ============================================================================
// CONTROLLER LOCKS
// ============================================================================

/// One mutex per controller name. Hold it from reading the base snapshot through commit.
#[derive(Default)]
pub struct ControllerLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ControllerLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock handle for a controller; the same name always yields the same mutex
    pub fn handle(&self, controller: &str) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .entry(controller.to_string())
            .or_default()
            .clone()
    }
}

// ============================================================================
// WRITER
// ============================================================================

pub struct IdempotentWriter<'a> {
    store: &'a db::Store,
}

impl<'a> IdempotentWriter<'a> {
    pub fn new(store: &'a db::Store) -> Self {
        IdempotentWriter { store }
    }

    pub fn apply(
        &self,
        deltas: &DeltaSet,
        blob: &RawBlob,
        ctx: &ApplyContext,
    ) -> ImportResult<WriteOutcome> {
        let controller = deltas.controller.as_str();
        let fail = |e: rusqlite::Error| ImportError::apply(controller, e);
        let snapshot_id = snapshot_id(controller, deltas.base_snapshot.as_deref(), &blob.hash);

        let mut conn = self.store.lock();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(fail)?;

        // Same controller + base + bytes already applied
        if let Some(recorded) = db::get_snapshot(&tx, &snapshot_id).map_err(fail)? {
            let version = controller_head(&tx, controller)
                .map_err(fail)?
                .map_or(0, |(_, version)| version);
            info!(target: "simec.import", stage = "writer", controller, snapshot = %snapshot_id, "replay detected, nothing written");
            return Ok(WriteOutcome {
                controller: controller.to_string(),
                snapshot_id,
                counts: recorded.counts,
                blob_hash: recorded.blob_hash,
                blob_new: false,
                version,
                replayed: true,
                reused: false,
            });
        }

        let registered = db::latest_schema_fingerprint(&tx, ctx.vendor.code()).map_err(fail)?;
        if let Some(registered) = registered {
            if registered != ctx.schema_fingerprint {
                if ctx.abort_on_schema_mismatch {
                    return Err(ImportError::UnsupportedSchemaVersion {
                        found: registered,
                        detail: format!(
                            "store was populated with a different {} schema (built-in fingerprint {})",
                            ctx.vendor.code(),
                            ctx.schema_fingerprint
                        ),
                    });
                }
                warn!(target: "simec.schema", controller, registered = %registered, "schema fingerprint differs, registering the built-in one");
            }
        }

        let head = controller_head(&tx, controller).map_err(fail)?;
        let head_snapshot = head.as_ref().map(|(snapshot, _)| snapshot.as_str());
        if head_snapshot != deltas.base_snapshot.as_deref() {
            return Err(ImportError::AtomicApplyFailed {
                controller: controller.to_string(),
                detail: format!(
                    "base snapshot moved: diffed against {}, latest is {}",
                    deltas.base_snapshot.as_deref().unwrap_or("<none>"),
                    head_snapshot.unwrap_or("<none>")
                ),
            });
        }
        let current_version = head.as_ref().map_or(0, |(_, version)| *version);

        if deltas.is_noop() && deltas.base_blob_hash.as_deref() == Some(blob.hash.as_str()) {
            if let Some(base) = &deltas.base_snapshot {
                info!(target: "simec.import", stage = "writer", controller, snapshot = %base, "identical export, base snapshot reused");
                return Ok(WriteOutcome {
                    controller: controller.to_string(),
                    snapshot_id: base.clone(),
                    counts: deltas.counts(),
                    blob_hash: blob.hash.clone(),
                    blob_new: false,
                    version: current_version,
                    replayed: false,
                    reused: true,
                });
            }
        }

        let outcome = write_snapshot(&tx, deltas, blob, ctx, &snapshot_id, current_version)
            .map_err(fail)?;
        tx.commit().map_err(fail)?;

        info!(
            target: "simec.import",
            stage = "writer",
            controller,
            snapshot = %outcome.snapshot_id,
            version = outcome.version,
            blob_new = outcome.blob_new,
            counts = %outcome.counts.summary(),
            "snapshot committed"
        );
        Ok(outcome)
    }
}

/// (latest snapshot, current version) of a controller
fn controller_head(conn: &Connection, controller: &str) -> rusqlite::Result<Option<(String, i64)>> {
    conn.query_row(
        "SELECT latest_snapshot, current_version FROM controllers WHERE name = ?1",
        [controller],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .optional()
}

fn to_json<T: serde::Serialize>(value: &T) -> rusqlite::Result<String> {
    serde_json::to_string(value).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

fn write_snapshot(
    conn: &Connection,
    deltas: &DeltaSet,
    blob: &RawBlob,
    ctx: &ApplyContext,
    snapshot_id: &str,
    current_version: i64,
) -> rusqlite::Result<WriteOutcome> {
    let controller = deltas.controller.as_str();
    let now = Utc::now();
    let counts = deltas.counts();

    // 1. Raw blob
    let blob_new = conn.execute(
        "INSERT OR IGNORE INTO raw_blobs (content_hash, content, size_bytes, first_seen_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![blob.hash, blob.bytes, blob.bytes.len() as i64, now.to_rfc3339()],
    )? == 1;

    // 2. Snapshot record
    conn.execute(
        "INSERT INTO snapshots (
            snapshot_id, controller_name, base_snapshot, blob_hash, source_name,
            schema_revision, export_date, imported_at, counts
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            snapshot_id,
            controller,
            deltas.base_snapshot,
            blob.hash,
            ctx.source_name,
            ctx.schema_revision,
            ctx.export_date,
            now.to_rfc3339(),
            to_json(&counts)?,
        ],
    )?;

    // 3. Schema fingerprint the entities below were mapped with
    db::register_schema(conn, ctx.vendor.code(), &ctx.schema_revision, &ctx.schema_fingerprint, now)?;

    // 4. Entity rows, membership, audit events
    for delta in &deltas.deltas {
        match delta {
            Delta::Created(entity) => {
                if let Some(event_type) = create_entity(conn, controller, entity, snapshot_id, now)? {
                    record_event(conn, snapshot_id, event_type, entity.kind(), &entity.key, Some(entity), now)?;
                }
                insert_member(conn, snapshot_id, entity)?;
            }
            Delta::Updated { entity, .. } => {
                if update_entity(conn, entity, snapshot_id, now)? {
                    record_event(conn, snapshot_id, ChangeKind::Updated.as_str(), entity.kind(), &entity.key, Some(entity), now)?;
                }
                insert_member(conn, snapshot_id, entity)?;
            }
            Delta::Unchanged { key, .. } => {
                if let Some(base) = &deltas.base_snapshot {
                    carry_member(conn, snapshot_id, base, key)?;
                }
            }
            Delta::Removed { kind, key } => {
                if tombstone_entity(conn, key, snapshot_id, now)? {
                    record_event(conn, snapshot_id, ChangeKind::Removed.as_str(), *kind, key, None, now)?;
                }
            }
        }
    }

    // 5. Controller row + revision
    let version = if current_version == 0 || counts.total().changed() > 0 {
        current_version + 1
    } else {
        current_version
    };

    conn.execute(
        "INSERT INTO controllers (
            name, vendor, current_version, latest_snapshot, facility_id, unit_id,
            last_export_date, first_imported_at, last_imported_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
        ON CONFLICT(name) DO UPDATE SET
            vendor = excluded.vendor,
            current_version = excluded.current_version,
            latest_snapshot = excluded.latest_snapshot,
            facility_id = COALESCE(excluded.facility_id, controllers.facility_id),
            unit_id = COALESCE(excluded.unit_id, controllers.unit_id),
            last_export_date = excluded.last_export_date,
            last_imported_at = excluded.last_imported_at",
        params![
            controller,
            ctx.vendor.code(),
            version,
            snapshot_id,
            ctx.facility_id,
            ctx.unit_id,
            ctx.export_date,
            now.to_rfc3339(),
        ],
    )?;

    if version > current_version {
        conn.execute(
            "INSERT INTO controller_revisions (
                controller_name, version, old_blob_hash, new_blob_hash, snapshot_id,
                change_summary, recorded_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                controller,
                version,
                deltas.base_blob_hash,
                blob.hash,
                snapshot_id,
                counts.summary(),
                now.to_rfc3339(),
            ],
        )?;
    }

    debug!(target: "simec.import", stage = "writer", controller, version, "controller row updated");

    Ok(WriteOutcome {
        controller: controller.to_string(),
        snapshot_id: snapshot_id.to_string(),
        counts,
        blob_hash: blob.hash.clone(),
        blob_new,
        version,
        replayed: false,
        reused: false,
    })
}

/// Insert a new row, or revive a tombstoned one. Returns the event type when a row changed.
fn create_entity(
    conn: &Connection,
    controller: &str,
    entity: &Entity,
    snapshot_id: &str,
    now: DateTime<Utc>,
) -> rusqlite::Result<Option<&'static str>> {
    let tombstoned: Option<bool> = conn
        .query_row(
            "SELECT removed_at IS NOT NULL FROM entities WHERE entity_key = ?1",
            [entity.key.as_str()],
            |row| row.get(0),
        )
        .optional()?;

    let changed = conn.execute(
        "INSERT INTO entities (
            controller_name, entity_key, kind, scope, name, body, content_hash, version,
            created_snapshot, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8, ?9)
        ON CONFLICT(controller_name, entity_key) DO UPDATE SET
            kind = excluded.kind,
            body = excluded.body,
            content_hash = excluded.content_hash,
            version = entities.version + 1,
            updated_snapshot = excluded.created_snapshot,
            updated_at = excluded.created_at,
            removed_snapshot = NULL,
            removed_at = NULL
        WHERE entities.removed_at IS NOT NULL",
        params![
            controller,
            entity.key.as_str(),
            entity.kind().as_str(),
            entity.scope().map(|s| s.to_string()),
            entity.body.name(),
            entity.body_json(),
            entity.content_hash(),
            snapshot_id,
            now.to_rfc3339(),
        ],
    )?;

    Ok(match (changed, tombstoned) {
        (0, _) => None,
        (_, Some(true)) => Some("revived"),
        _ => Some(ChangeKind::Created.as_str()),
    })
}

/// In-place update; creation metadata is untouched
fn update_entity(
    conn: &Connection,
    entity: &Entity,
    snapshot_id: &str,
    now: DateTime<Utc>,
) -> rusqlite::Result<bool> {
    let hash = entity.content_hash();
    let changed = conn.execute(
        "UPDATE entities SET
            body = ?1,
            content_hash = ?2,
            version = version + 1,
            updated_snapshot = ?3,
            updated_at = ?4
         WHERE entity_key = ?5 AND content_hash <> ?2 AND removed_at IS NULL",
        params![entity.body_json(), hash, snapshot_id, now.to_rfc3339(), entity.key.as_str()],
    )?;
    Ok(changed > 0)
}

fn tombstone_entity(
    conn: &Connection,
    key: &EntityKey,
    snapshot_id: &str,
    now: DateTime<Utc>,
) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "UPDATE entities SET removed_snapshot = ?1, removed_at = ?2
         WHERE entity_key = ?3 AND removed_at IS NULL",
        params![snapshot_id, now.to_rfc3339(), key.as_str()],
    )?;
    Ok(changed > 0)
}

fn insert_member(conn: &Connection, snapshot_id: &str, entity: &Entity) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO snapshot_members (snapshot_id, entity_key, kind, content_hash)
         VALUES (?1, ?2, ?3, ?4)",
        params![snapshot_id, entity.key.as_str(), entity.kind().as_str(), entity.content_hash()],
    )?;
    Ok(())
}

/// Unchanged entities keep the hash recorded in the base snapshot
fn carry_member(conn: &Connection, snapshot_id: &str, base: &str, key: &EntityKey) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO snapshot_members (snapshot_id, entity_key, kind, content_hash)
         SELECT ?1, entity_key, kind, content_hash FROM snapshot_members
         WHERE snapshot_id = ?2 AND entity_key = ?3",
        params![snapshot_id, base, key.as_str()],
    )?;
    Ok(())
}

fn record_event(
    conn: &Connection,
    snapshot_id: &str,
    event_type: &str,
    kind: EntityKind,
    key: &EntityKey,
    entity: Option<&Entity>,
    now: DateTime<Utc>,
) -> rusqlite::Result<()> {
    let data = match entity {
        Some(entity) => serde_json::to_value(&entity.body)
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?,
        None => serde_json::json!({}),
    };
    let hash = entity.map(Entity::content_hash);
    let event = Event::new(snapshot_id, event_type, kind, key, hash.as_deref(), data, now);
    db::insert_event(conn, &event)
}
