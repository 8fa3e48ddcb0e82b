// 🏷️ Tag Entity

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where a tag is declared. Part of the key, so moving a tag is remove + create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TagScope {
    Controller,
    Program(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Unique within its scope
    pub name: String,
    pub data_type: String,
    pub scope: TagScope,

    /// Base, Alias, Produced, Consumed
    pub tag_type: Option<String>,

    /// Scalar value read out of `data`, when there is one
    pub initial_value: Option<String>,

    /// Every `Data` element (L5K text, Decorated arrays and structures) as canonical XML
    pub data: Vec<String>,

    /// Dimensions, AliasFor, Radix, ExternalAccess, Constant, ...
    pub attributes: BTreeMap<String, String>,

    pub description: Option<String>,
    pub extensions: Vec<String>,
}
