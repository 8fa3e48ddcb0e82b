// PLC Sync - Core Library
// Imports vendor PLC XML exports into a versioned SQLite store

pub mod config;   // Import configuration (YAML)
pub mod db;       // SQLite store: blobs, snapshots, entities, audit trail
pub mod differ;   // Version differ: Created / Updated / Unchanged / Removed
pub mod entities; // Entity models: Controller, Program, Routine, Tag, AOI
pub mod error;    // ImportError + stage classification
pub mod importer; // Import coordinator
pub mod mapper;   // Schema mapper: raw tree → normalized entities
pub mod reader;   // XML reader: bytes → raw tree
pub mod schema;   // Per-kind element schemas
pub mod writer;   // Idempotent writer

#[cfg(test)]
mod test_fixtures;

// Re-export commonly used types
pub use config::ImportConfig;
pub use db::{
    Store, StoredEntity, SnapshotRecord, ControllerRecord, ControllerRevision, Event,
    setup_database, insert_event, get_events_for_entity,
};
pub use differ::{diff, ChangeKind, Delta, DeltaCounts, DeltaSet, KindCounts, SnapshotView};
pub use entities::{
    AoiDefinition, AoiParameter, Controller, Entity, EntityBody, EntityKey, EntityKind,
    ParameterDirection, Program, Routine, RoutineKind, Tag, TagScope,
};
pub use error::{ImportError, ImportResult, Stage};
pub use importer::{HierarchyRefresh, ImportObserver, ImportReport, Importer, NoRefresh};
pub use mapper::{map_document, MappedDocument};
pub use reader::{read_document, RawDocument, Vendor, XmlNode, XmlReader};
pub use writer::{ApplyContext, ControllerLocks, IdempotentWriter, RawBlob, WriteOutcome};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
