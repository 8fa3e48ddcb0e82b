// 🪜 Routine Entity
// Routine bodies are stored, never interpreted

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoutineKind {
    Ladder,
    StructuredText,
    FunctionBlock,
    Sequential,
    /// Vendor code we have no name for
    Other(String),
}

impl RoutineKind {
    /// Map the L5X `Type` attribute
    pub fn from_code(code: &str) -> RoutineKind {
        match code.trim().to_ascii_uppercase().as_str() {
            "RLL" => RoutineKind::Ladder,
            "ST" => RoutineKind::StructuredText,
            "FBD" => RoutineKind::FunctionBlock,
            "SFC" => RoutineKind::Sequential,
            _ => RoutineKind::Other(code.trim().to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Routine {
    /// Unique within the program
    pub name: String,
    pub routine_kind: RoutineKind,

    /// Ordered body elements (RLLContent, STContent, ...) as canonical XML
    pub content: Vec<String>,

    pub attributes: BTreeMap<String, String>,
    pub description: Option<String>,
}
