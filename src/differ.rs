// 🔍 Version Differ
// Classifies every entity key of a new import against the controller's latest snapshot:
// Created / Updated / Unchanged / Removed.
//
// Comparison is content-hash equality of the normalized body. Timestamps never
// participate; formatting differences never reach this stage (the mapper canonicalizes).

use crate::entities::{Entity, EntityKey, EntityKind};
use crate::mapper::MappedDocument;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

// ============================================================================
// PRIOR SNAPSHOT
// ============================================================================

/// What the differ needs from the stored snapshot: key → (kind, content hash)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotView {
    pub snapshot_id: String,
    pub blob_hash: String,
    pub members: BTreeMap<EntityKey, (EntityKind, String)>,
}

// ============================================================================
// DELTAS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    Created,
    Updated,
    Unchanged,
    Removed,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Created => "created",
            ChangeKind::Updated => "updated",
            ChangeKind::Unchanged => "unchanged",
            ChangeKind::Removed => "removed",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Delta {
    Created(Entity),
    Updated { entity: Entity, previous_hash: String },
    /// Key only; the writer skips it
    Unchanged { kind: EntityKind, key: EntityKey },
    Removed { kind: EntityKind, key: EntityKey },
}

impl Delta {
    pub fn key(&self) -> &EntityKey {
        match self {
            Delta::Created(entity) | Delta::Updated { entity, .. } => &entity.key,
            Delta::Unchanged { key, .. } | Delta::Removed { key, .. } => key,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Delta::Created(entity) | Delta::Updated { entity, .. } => entity.kind(),
            Delta::Unchanged { kind, .. } | Delta::Removed { kind, .. } => *kind,
        }
    }

    pub fn change(&self) -> ChangeKind {
        match self {
            Delta::Created(_) => ChangeKind::Created,
            Delta::Updated { .. } => ChangeKind::Updated,
            Delta::Unchanged { .. } => ChangeKind::Unchanged,
            Delta::Removed { .. } => ChangeKind::Removed,
        }
    }
}

// ============================================================================
// COUNTS
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindCounts {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub removed: usize,
}

impl KindCounts {
    fn bump(&mut self, change: ChangeKind) {
        match change {
            ChangeKind::Created => self.created += 1,
            ChangeKind::Updated => self.updated += 1,
            ChangeKind::Unchanged => self.unchanged += 1,
            ChangeKind::Removed => self.removed += 1,
        }
    }

    fn add(&mut self, other: &KindCounts) {
        self.created += other.created;
        self.updated += other.updated;
        self.unchanged += other.unchanged;
        self.removed += other.removed;
    }

    /// Created + updated + removed
    pub fn changed(&self) -> usize {
        self.created + self.updated + self.removed
    }
}

/// Per-kind delta counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaCounts {
    pub by_kind: BTreeMap<EntityKind, KindCounts>,
}

impl DeltaCounts {
    pub fn for_kind(&self, kind: EntityKind) -> KindCounts {
        self.by_kind.get(&kind).copied().unwrap_or_default()
    }

    pub fn total(&self) -> KindCounts {
        let mut total = KindCounts::default();
        for counts in self.by_kind.values() {
            total.add(counts);
        }
        total
    }

    /// "created=1 updated=0 removed=2 unchanged=9"
    pub fn summary(&self) -> String {
        let t = self.total();
        format!(
            "created={} updated={} removed={} unchanged={}",
            t.created, t.updated, t.removed, t.unchanged
        )
    }
}

// ============================================================================
// DELTA SET
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct DeltaSet {
    pub controller: String,

    /// Snapshot this set was computed against (`None` on first import)
    pub base_snapshot: Option<String>,
    pub base_blob_hash: Option<String>,

    /// New entities in mapper order, then removals in key order
    pub deltas: Vec<Delta>,
}

impl DeltaSet {
    pub fn counts(&self) -> DeltaCounts {
        let mut counts = DeltaCounts::default();
        for delta in &self.deltas {
            counts
                .by_kind
                .entry(delta.kind())
                .or_default()
                .bump(delta.change());
        }
        counts
    }

    /// Nothing to create, update or remove
    pub fn is_noop(&self) -> bool {
        self.deltas
            .iter()
            .all(|d| d.change() == ChangeKind::Unchanged)
    }

    pub fn get(&self, key: &EntityKey) -> Option<&Delta> {
        self.deltas.iter().find(|d| d.key() == key)
    }

    pub fn with_change(&self, change: ChangeKind) -> impl Iterator<Item = &Delta> {
        self.deltas.iter().filter(move |d| d.change() == change)
    }
}

// ============================================================================
// DIFF
// ============================================================================

pub fn diff(document: &MappedDocument, prior: Option<&SnapshotView>) -> DeltaSet {
    let mut deltas = Vec::with_capacity(document.entities.len());
    let mut present: HashSet<&EntityKey> = HashSet::with_capacity(document.entities.len());

    for entity in &document.entities {
        present.insert(&entity.key);

        let previous = prior.and_then(|p| p.members.get(&entity.key));
        let delta = match previous {
            None => Delta::Created(entity.clone()),
            Some((_, previous_hash)) if *previous_hash == entity.content_hash() => {
                Delta::Unchanged {
                    kind: entity.kind(),
                    key: entity.key.clone(),
                }
            }
            Some((_, previous_hash)) => Delta::Updated {
                entity: entity.clone(),
                previous_hash: previous_hash.clone(),
            },
        };
        deltas.push(delta);
    }

    if let Some(prior) = prior {
        for (key, (kind, _)) in &prior.members {
            if !present.contains(key) {
                deltas.push(Delta::Removed {
                    kind: *kind,
                    key: key.clone(),
                });
            }
        }
    }

    DeltaSet {
        controller: document.controller.clone(),
        base_snapshot: prior.map(|p| p.snapshot_id.clone()),
        base_blob_hash: prior.map(|p| p.blob_hash.clone()),
        deltas,
    }
}
