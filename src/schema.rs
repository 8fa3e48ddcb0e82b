// 📐 Schema Descriptions
// Explicit per-kind description of the L5X layout: which attributes are required,
// which are optional, and which child elements the mapper interprets.
// Everything not listed as a known child is preserved as an opaque payload;
// undeclared attributes are kept as a sorted map, minus the volatile ones.

use crate::entities::{sha256_hex, EntityKind};
use crate::error::{ImportError, ImportResult};
use crate::reader::XmlNode;
use serde::Serialize;
use std::collections::BTreeMap;

// ============================================================================
// ELEMENT SCHEMA
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ElementSchema {
    /// Kind reported in `MissingField` errors
    pub kind: EntityKind,
    pub element: &'static str,
    /// Wrapper element the entities live under, e.g. `Programs`
    pub container: Option<&'static str>,
    pub required: &'static [&'static str],
    pub optional: &'static [&'static str],
    /// Child elements consumed by the mapper
    pub children: &'static [&'static str],
}

pub const CONTROLLER: ElementSchema = ElementSchema {
    kind: EntityKind::Controller,
    element: "Controller",
    container: None,
    required: &["Name"],
    optional: &["ProcessorType", "MajorRev", "MinorRev"],
    children: &["Description", "Programs", "Tags", "AddOnInstructionDefinitions"],
};

pub const PROGRAM: ElementSchema = ElementSchema {
    kind: EntityKind::Program,
    element: "Program",
    container: Some("Programs"),
    required: &["Name"],
    optional: &["Type", "MainRoutineName", "Disabled"],
    children: &["Description", "Routines", "Tags"],
};

pub const ROUTINE: ElementSchema = ElementSchema {
    kind: EntityKind::Routine,
    element: "Routine",
    container: Some("Routines"),
    required: &["Name", "Type"],
    optional: &[],
    // every other child is routine content
    children: &["Description"],
};

pub const TAG: ElementSchema = ElementSchema {
    kind: EntityKind::Tag,
    element: "Tag",
    container: Some("Tags"),
    required: &["Name", "DataType"],
    optional: &["TagType"],
    children: &["Description", "Data"],
};

pub const AOI: ElementSchema = ElementSchema {
    kind: EntityKind::Aoi,
    element: "AddOnInstructionDefinition",
    container: Some("AddOnInstructionDefinitions"),
    required: &["Name"],
    optional: &["Revision"],
    children: &["Description", "Parameters"],
};

pub const AOI_PARAMETER: ElementSchema = ElementSchema {
    kind: EntityKind::Aoi,
    element: "Parameter",
    container: Some("Parameters"),
    required: &["Name", "DataType", "Usage"],
    optional: &["Required"],
    children: &["Description"],
};

pub const ALL: [&ElementSchema; 6] = [&CONTROLLER, &PROGRAM, &ROUTINE, &TAG, &AOI, &AOI_PARAMETER];

/// Rewritten by the engineering tool on every save; never part of entity content
pub const VOLATILE_ATTRIBUTES: &[&str] = &["LastModifiedDate", "LastModifiedBy", "EditedDate"];

#[derive(Serialize)]
struct SchemaSet<'a> {
    vendor: &'a str,
    elements: &'a [&'a ElementSchema],
    volatile: &'a [&'a str],
}

/// SHA-256 over the Rockwell schema tables. Changes whenever a table changes.
pub fn fingerprint() -> String {
    let set = SchemaSet {
        vendor: "rockwell",
        elements: &ALL,
        volatile: VOLATILE_ATTRIBUTES,
    };
    // Derived Serialize over static strings cannot fail
    sha256_hex(serde_json::to_string(&set).unwrap_or_default().as_bytes())
}

// ============================================================================
// CHECKED VIEW
// ============================================================================

/// An element paired with its schema and its path in the document.
/// All attribute access in the mapper goes through here.
pub struct SchemaView<'a> {
    pub schema: &'static ElementSchema,
    pub node: &'a XmlNode,
    pub path: String,
}

impl<'a> SchemaView<'a> {
    /// Check required attributes up front and build the element path
    pub fn bind(
        schema: &'static ElementSchema,
        node: &'a XmlNode,
        parent_path: &str,
    ) -> ImportResult<Self> {
        let bare_path = format!("{}/{}", parent_path, schema.element);
        for field in schema.required {
            if node.attr(field).map_or(true, |v| v.trim().is_empty()) {
                return Err(ImportError::missing(schema.kind, field, &bare_path));
            }
        }

        let path = match node.attr("Name") {
            Some(name) => format!("{}[@Name='{}']", bare_path, name.trim()),
            None => bare_path,
        };

        Ok(SchemaView { schema, node, path })
    }

    /// A required attribute; presence was checked in `bind`
    pub fn required(&self, field: &str) -> ImportResult<&'a str> {
        debug_assert!(
            self.schema.required.contains(&field),
            "{} is not a required attribute of {}",
            field,
            self.schema.element
        );
        self.node
            .attr(field)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ImportError::missing(self.schema.kind, field, &self.path))
    }

    /// An optional attribute; blank values read as absent
    pub fn optional(&self, field: &str) -> Option<&'a str> {
        debug_assert!(
            self.schema.optional.contains(&field),
            "{} is not an optional attribute of {}",
            field,
            self.schema.element
        );
        self.node.attr(field).map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn child(&self, name: &str) -> Option<&'a XmlNode> {
        debug_assert!(self.schema.children.contains(&name));
        self.node.child(name)
    }

    /// Attributes outside the schema, volatile ones dropped
    pub fn attributes(&self) -> BTreeMap<String, String> {
        self.node
            .attributes
            .iter()
            .filter(|(k, _)| {
                let k = k.as_str();
                !self.schema.required.contains(&k)
                    && !self.schema.optional.contains(&k)
                    && !VOLATILE_ATTRIBUTES.contains(&k)
            })
            .map(|(k, v)| (k.clone(), v.trim().to_string()))
            .collect()
    }

    /// Text of the `Description` child, if any
    pub fn description(&self) -> Option<String> {
        self.child("Description")
            .map(|d| d.text.trim().to_string())
            .filter(|d| !d.is_empty())
    }

    /// Child elements the schema does not interpret, in document order
    pub fn unknown_children(&self) -> impl Iterator<Item = &'a XmlNode> + 'a {
        let known = self.schema.children;
        self.node
            .children
            .iter()
            .filter(move |c| !known.contains(&c.name.as_str()))
    }

    /// Unknown children serialized for storage
    pub fn extensions(&self) -> Vec<String> {
        self.unknown_children().map(XmlNode::to_canonical_xml).collect()
    }

    /// Entity elements under `container/element` of this node
    pub fn members(&self, schema: &'static ElementSchema) -> Vec<&'a XmlNode> {
        let container = match schema.container {
            Some(container) => container,
            None => return Vec::new(),
        };
        self.node
            .children_named(container)
            .flat_map(|c| c.children_named(schema.element))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &str, attrs: &[(&str, &str)]) -> XmlNode {
        let mut n = XmlNode::new(name);
        for (k, v) in attrs {
            n.attributes.insert(k.to_string(), v.to_string());
        }
        n
    }

    #[test]
    fn test_bind_reports_missing_required() {
        let routine = node("Routine", &[("Name", "R1")]);
        let err = SchemaView::bind(&ROUTINE, &routine, "/Root/Programs/Program[@Name='Main']/Routines")
            .err()
            .unwrap();
        match err {
            ImportError::MissingField { kind, field, path } => {
                assert_eq!(kind, EntityKind::Routine);
                assert_eq!(field, "Type");
                assert_eq!(path, "/Root/Programs/Program[@Name='Main']/Routines/Routine");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_blank_required_attribute_counts_as_missing() {
        let tag = node("Tag", &[("Name", "  "), ("DataType", "DINT")]);
        assert!(SchemaView::bind(&TAG, &tag, "/Root/Tags").is_err());
    }

    #[test]
    fn test_path_includes_name_predicate() {
        let tag = node("Tag", &[("Name", "Temp1"), ("DataType", "REAL")]);
        let view = SchemaView::bind(&TAG, &tag, "/Root/Tags").unwrap();
        assert_eq!(view.path, "/Root/Tags/Tag[@Name='Temp1']");
        assert_eq!(view.required("DataType").unwrap(), "REAL");
        assert_eq!(view.optional("TagType"), None);
    }

    #[test]
    fn test_unknown_children_are_preserved_in_order() {
        let mut tag = node("Tag", &[("Name", "T"), ("DataType", "DINT")]);
        tag.children.push(node("Comments", &[]));
        tag.children.push(node("Description", &[]));
        tag.children.push(node("Alarm", &[("Limit", "5")]));

        let view = SchemaView::bind(&TAG, &tag, "/Root").unwrap();
        assert_eq!(view.extensions(), vec!["<Comments/>".to_string(), "<Alarm Limit=\"5\"/>".to_string()]);
    }

    #[test]
    fn test_members_walks_container() {
        let mut controller = node("Controller", &[("Name", "C1")]);
        let mut programs = node("Programs", &[]);
        programs.children.push(node("Program", &[("Name", "A")]));
        programs.children.push(node("Program", &[("Name", "B")]));
        controller.children.push(programs);

        let view = SchemaView::bind(&CONTROLLER, &controller, "").unwrap();
        assert_eq!(view.members(&PROGRAM).len(), 2);
        assert!(view.members(&AOI).is_empty());
    }

    #[test]
    fn test_undeclared_attributes_are_kept_volatile_ones_dropped() {
        let tag = node(
            "Tag",
            &[
                ("Name", "Buf"),
                ("DataType", "DINT"),
                ("TagType", "Base"),
                ("Dimensions", " 3 "),
                ("AliasFor", "Local:1:I.Data.0"),
                ("LastModifiedDate", "Mon Jan 06 10:00:00 2025"),
            ],
        );
        let view = SchemaView::bind(&TAG, &tag, "/Root").unwrap();
        let attributes = view.attributes();

        assert_eq!(attributes.len(), 2);
        assert_eq!(attributes["Dimensions"], "3");
        assert_eq!(attributes["AliasFor"], "Local:1:I.Data.0");
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let a = fingerprint();
        assert_eq!(a, fingerprint());
        assert_eq!(a.len(), 64);
        assert!(ALL.iter().any(|s| s.kind == EntityKind::Aoi && s.element == "Parameter"));
    }
}
