// Entity Models
// Normalized records extracted from a PLC export.
//
// Identity is the scope path (`Controller:C1/Program:Main/Tag:Temp1`), never a
// storage id, so the same logical entity lines up across imports.
// Value equality is content-hash equality of the canonical JSON body.

pub mod aoi;
pub mod controller;
pub mod program;
pub mod routine;
pub mod tag;

pub use aoi::{AoiDefinition, AoiParameter, ParameterDirection};
pub use controller::Controller;
pub use program::Program;
pub use routine::{Routine, RoutineKind};
pub use tag::{Tag, TagScope};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ============================================================================
// ENTITY KIND
// ============================================================================

/// Declaration order is the mapper's output order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Controller,
    Program,
    Routine,
    Tag,
    Aoi,
}

impl EntityKind {
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Controller,
        EntityKind::Program,
        EntityKind::Routine,
        EntityKind::Tag,
        EntityKind::Aoi,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Controller => "Controller",
            EntityKind::Program => "Program",
            EntityKind::Routine => "Routine",
            EntityKind::Tag => "Tag",
            EntityKind::Aoi => "AOI",
        }
    }

    pub fn parse(s: &str) -> Option<EntityKind> {
        EntityKind::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// ENTITY KEY
// ============================================================================

/// Scope path of an entity: `Kind:name` segments joined by `/`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityKey(String);

impl EntityKey {
    pub fn controller(name: &str) -> Self {
        EntityKey(format!("{}:{}", EntityKind::Controller.as_str(), name))
    }

    /// Key of a child entity living in this scope
    pub fn child(&self, kind: EntityKind, name: &str) -> Self {
        EntityKey(format!("{}/{}:{}", self.0, kind.as_str(), name))
    }

    /// Wrap a key read back from storage
    pub fn from_stored(raw: String) -> Self {
        EntityKey(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The enclosing scope, `None` for a controller
    pub fn parent(&self) -> Option<EntityKey> {
        self.0.rfind('/').map(|idx| EntityKey(self.0[..idx].to_string()))
    }
}

impl std::fmt::Display for EntityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// ENTITY RECORD
// ============================================================================

/// Typed body of a normalized entity. Serialized as JSON for storage and hashing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "body")]
pub enum EntityBody {
    Controller(Controller),
    Program(Program),
    Routine(Routine),
    Tag(Tag),
    Aoi(AoiDefinition),
}

impl EntityBody {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityBody::Controller(_) => EntityKind::Controller,
            EntityBody::Program(_) => EntityKind::Program,
            EntityBody::Routine(_) => EntityKind::Routine,
            EntityBody::Tag(_) => EntityKind::Tag,
            EntityBody::Aoi(_) => EntityKind::Aoi,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            EntityBody::Controller(c) => &c.name,
            EntityBody::Program(p) => &p.name,
            EntityBody::Routine(r) => &r.name,
            EntityBody::Tag(t) => &t.name,
            EntityBody::Aoi(a) => &a.name,
        }
    }

    /// Unknown child elements kept verbatim (canonical XML)
    pub fn extensions(&self) -> &[String] {
        match self {
            EntityBody::Controller(c) => &c.extensions,
            EntityBody::Program(p) => &p.extensions,
            EntityBody::Routine(_) => &[],
            EntityBody::Tag(t) => &t.extensions,
            EntityBody::Aoi(a) => &a.extensions,
        }
    }
}

/// One normalized entity with its identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub key: EntityKey,
    pub body: EntityBody,
}

impl Entity {
    pub fn new(key: EntityKey, body: EntityBody) -> Self {
        Entity { key, body }
    }

    pub fn kind(&self) -> EntityKind {
        self.body.kind()
    }

    pub fn scope(&self) -> Option<EntityKey> {
        self.key.parent()
    }

    pub fn body_json(&self) -> String {
        // Derived Serialize over owned strings and enums cannot fail
        serde_json::to_string(&self.body).unwrap_or_default()
    }

    /// SHA-256 over the canonical JSON body. Equal hash ⇔ equal content.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.body_json().as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// Hex SHA-256 of arbitrary bytes (raw blobs, snapshot ids)
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
