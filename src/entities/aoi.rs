// 🧩 Add-On Instruction Definition
// Reusable parameterized logic block; parameter order is significant

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParameterDirection {
    Input,
    Output,
    InOut,
    Other(String),
}

impl ParameterDirection {
    /// Map the L5X `Usage` attribute
    pub fn from_usage(usage: &str) -> ParameterDirection {
        match usage.trim() {
            "Input" => ParameterDirection::Input,
            "Output" => ParameterDirection::Output,
            "InOut" => ParameterDirection::InOut,
            other => ParameterDirection::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AoiParameter {
    pub name: String,
    pub data_type: String,
    pub direction: ParameterDirection,
    pub required: bool,
    pub attributes: BTreeMap<String, String>,
    pub description: Option<String>,
    /// Default data and anything else under the parameter, kept verbatim
    pub extensions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AoiDefinition {
    /// Unique within the controller
    pub name: String,
    pub revision: String,
    pub parameters: Vec<AoiParameter>,

    /// Vendor, ExecutePrescan, CreatedDate, ...
    pub attributes: BTreeMap<String, String>,
    pub description: Option<String>,

    /// LocalTags, Routines and anything else not modelled
    pub extensions: Vec<String>,
}
