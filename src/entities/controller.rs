// 🎛️ Controller Entity
// Root of a controller's asset hierarchy; one per export

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Controller {
    /// Unique key across the store
    pub name: String,

    /// Catalog number, e.g. "1756-L83E"
    pub processor_type: Option<String>,

    /// Firmware revision: `MajorRev.MinorRev`, or the export's `SoftwareRevision`
    pub revision: Option<String>,

    /// Remaining controller attributes (Use, CommPath, ...)
    pub attributes: BTreeMap<String, String>,

    pub description: Option<String>,

    /// Sections we do not model (DataTypes, Modules, Tasks, ...), kept verbatim
    pub extensions: Vec<String>,
}

impl Controller {
    /// Join `MajorRev`/`MinorRev` when both are present, otherwise fall back
    pub fn firmware_revision(
        major: Option<&str>,
        minor: Option<&str>,
        software_revision: Option<&str>,
    ) -> Option<String> {
        match (major, minor) {
            (Some(major), Some(minor)) => Some(format!("{}.{}", major.trim(), minor.trim())),
            (Some(major), None) => Some(major.trim().to_string()),
            _ => software_revision.map(|r| r.trim().to_string()),
        }
    }
}
