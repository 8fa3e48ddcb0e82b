// 🚨 Import Errors
// One typed error per pipeline failure mode, tagged with the stage that raised it

use crate::entities::EntityKind;
use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// STAGES
// ============================================================================

/// Pipeline stage that produced an error or log event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Reader,
    Mapper,
    Differ,
    Writer,
    Coordinator,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Reader => "reader",
            Stage::Mapper => "mapper",
            Stage::Differ => "differ",
            Stage::Writer => "writer",
            Stage::Coordinator => "coordinator",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// IMPORT ERROR
// ============================================================================

#[derive(Debug, Error)]
pub enum ImportError {
    /// The bytes are not well-formed XML
    #[error("malformed document at byte {position}: {detail}")]
    MalformedDocument { detail: String, position: u64 },

    /// Well-formed XML, but not an export layout we have a schema for
    #[error("unsupported schema version '{found}': {detail}")]
    UnsupportedSchemaVersion { found: String, detail: String },

    #[error("{kind} is missing required field '{field}' at {path}")]
    MissingField {
        kind: EntityKind,
        field: String,
        path: String,
    },

    #[error("duplicate key '{key}' in scope {scope}")]
    DuplicateKey { scope: String, key: String },

    /// Transient storage failure; the whole import may be retried
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The apply transaction was rolled back
    #[error("atomic apply failed for controller '{controller}': {detail}")]
    AtomicApplyFailed { controller: String, detail: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported file type {path}: expected a .L5X export")]
    UnsupportedFileType { path: PathBuf },

    #[error("import cancelled before apply")]
    Cancelled,
}

impl ImportError {
    pub fn stage(&self) -> Stage {
        match self {
            ImportError::MalformedDocument { .. } | ImportError::UnsupportedSchemaVersion { .. } => {
                Stage::Reader
            }
            ImportError::MissingField { .. } | ImportError::DuplicateKey { .. } => Stage::Mapper,
            ImportError::StorageUnavailable(_) | ImportError::AtomicApplyFailed { .. } => {
                Stage::Writer
            }
            ImportError::Io { .. } | ImportError::UnsupportedFileType { .. } | ImportError::Cancelled => {
                Stage::Coordinator
            }
        }
    }

    /// Only transient storage failures are worth re-running the import for.
    /// Mapper errors mean the export itself needs fixing.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ImportError::StorageUnavailable(_))
    }

    pub(crate) fn malformed(detail: impl Into<String>, position: u64) -> Self {
        ImportError::MalformedDocument {
            detail: detail.into(),
            position,
        }
    }

    pub(crate) fn missing(kind: EntityKind, field: &str, path: &str) -> Self {
        ImportError::MissingField {
            kind,
            field: field.to_string(),
            path: path.to_string(),
        }
    }

    pub(crate) fn duplicate(scope: &str, key: &str) -> Self {
        ImportError::DuplicateKey {
            scope: scope.to_string(),
            key: key.to_string(),
        }
    }

    /// Classify a SQLite error raised while opening or reading the store
    pub(crate) fn storage(err: rusqlite::Error) -> Self {
        ImportError::StorageUnavailable(err.to_string())
    }

    /// Classify a SQLite error raised inside the apply transaction.
    /// Lock contention and I/O faults stay retryable; everything else aborts the apply.
    pub(crate) fn apply(controller: &str, err: rusqlite::Error) -> Self {
        if is_transient(&err) {
            ImportError::StorageUnavailable(err.to_string())
        } else {
            ImportError::AtomicApplyFailed {
                controller: controller.to_string(),
                detail: err.to_string(),
            }
        }
    }
}

fn is_transient(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => matches!(
            e.code,
            rusqlite::ErrorCode::DatabaseBusy
                | rusqlite::ErrorCode::DatabaseLocked
                | rusqlite::ErrorCode::CannotOpen
                | rusqlite::ErrorCode::SystemIoFailure
        ),
        _ => false,
    }
}

pub type ImportResult<T> = std::result::Result<T, ImportError>;
