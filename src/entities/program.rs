use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    /// Unique within the controller
    pub name: String,
    pub program_type: Option<String>,
    pub main_routine: Option<String>,
    pub disabled: bool,
    /// Class, UseAsFolder, TestEdits, ...
    pub attributes: BTreeMap<String, String>,
    pub description: Option<String>,
    pub extensions: Vec<String>,
}
