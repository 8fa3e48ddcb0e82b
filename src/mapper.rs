// 🗺️ Schema Mapper
// Raw element tree → normalized entity set (Controller → Programs → Routines → Tags → AOIs)
//
// Pure: the same document always maps to the same entity set, byte for byte.
// Fails on the first missing required field or duplicate key; never returns a partial set.

use crate::entities::{
    AoiDefinition, AoiParameter, Controller, Entity, EntityBody, EntityKey, EntityKind,
    ParameterDirection, Program, Routine, RoutineKind, Tag, TagScope,
};
use crate::error::{ImportError, ImportResult};
use crate::reader::{RawDocument, Vendor, XmlNode};
use crate::schema::{SchemaView, AOI, AOI_PARAMETER, CONTROLLER, PROGRAM, ROUTINE, TAG};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

// ============================================================================
// OUTPUT
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct MappedDocument {
    pub controller: String,
    pub vendor: Vendor,
    pub schema_revision: String,

    /// Root `ExportDate`; changes on every export so it is kept out of entity content
    pub export_date: Option<String>,

    /// Ordered by kind, then key
    pub entities: Vec<Entity>,
}

impl MappedDocument {
    pub fn controller_key(&self) -> EntityKey {
        EntityKey::controller(&self.controller)
    }

    pub fn get(&self, key: &EntityKey) -> Option<&Entity> {
        self.entities.iter().find(|e| &e.key == key)
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        self.entities.iter().filter(|e| e.kind() == kind).count()
    }

    /// (child, parent) pairs of the scope hierarchy
    pub fn relationships(&self) -> Vec<(EntityKey, EntityKey)> {
        self.entities
            .iter()
            .filter_map(|e| e.scope().map(|parent| (e.key.clone(), parent)))
            .collect()
    }
}

// ============================================================================
// COLLECTOR
// ============================================================================

/// Entities keyed by scope path; a second insert of the same key is a mapping error
#[derive(Default)]
struct EntitySet {
    entities: BTreeMap<EntityKey, Entity>,
}

impl EntitySet {
    fn insert(&mut self, entity: Entity) -> ImportResult<()> {
        match self.entities.entry(entity.key.clone()) {
            Entry::Occupied(_) => {
                let scope = entity
                    .scope()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "/".to_string());
                Err(ImportError::duplicate(
                    &scope,
                    &format!("{}:{}", entity.kind(), entity.body.name()),
                ))
            }
            Entry::Vacant(slot) => {
                slot.insert(entity);
                Ok(())
            }
        }
    }

    fn into_ordered(self) -> Vec<Entity> {
        let mut entities: Vec<Entity> = self.entities.into_values().collect();
        // BTreeMap already yields key order; the sort is stable so keys stay ordered within a kind
        entities.sort_by_key(|e| e.kind());
        entities
    }
}

// ============================================================================
// MAPPER
// ============================================================================

pub fn map_document(doc: &RawDocument) -> ImportResult<MappedDocument> {
    let root = &doc.root;
    let root_path = format!("/{}", root.name);

    let controllers: Vec<&XmlNode> = root.children_named(CONTROLLER.element).collect();
    let controller_node = match controllers.as_slice() {
        [] => {
            return Err(ImportError::missing(
                EntityKind::Controller,
                CONTROLLER.element,
                &root_path,
            ))
        }
        [single] => *single,
        _ => return Err(ImportError::duplicate(&root_path, CONTROLLER.element)),
    };

    let controller = SchemaView::bind(&CONTROLLER, controller_node, &root_path)?;
    let controller_name = controller.required("Name")?.to_string();
    let controller_key = EntityKey::controller(&controller_name);

    let mut set = EntitySet::default();
    set.insert(Entity::new(
        controller_key.clone(),
        EntityBody::Controller(Controller {
            name: controller_name.clone(),
            processor_type: controller.optional("ProcessorType").map(str::to_string),
            revision: Controller::firmware_revision(
                controller.optional("MajorRev"),
                controller.optional("MinorRev"),
                root.attr("SoftwareRevision"),
            ),
            attributes: controller.attributes(),
            description: controller.description(),
            extensions: controller.extensions(),
        }),
    ))?;

    for node in controller.members(&PROGRAM) {
        map_program(&mut set, &controller_key, node, &format!("{}/Programs", controller.path))?;
    }

    for node in controller.members(&TAG) {
        map_tag(
            &mut set,
            &controller_key,
            TagScope::Controller,
            node,
            &format!("{}/Tags", controller.path),
        )?;
    }

    for node in controller.members(&AOI) {
        map_aoi(
            &mut set,
            &controller_key,
            node,
            &format!("{}/AddOnInstructionDefinitions", controller.path),
        )?;
    }

    Ok(MappedDocument {
        controller: controller_name,
        vendor: doc.vendor,
        schema_revision: doc.schema_revision.clone(),
        export_date: root
            .attr("ExportDate")
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty()),
        entities: set.into_ordered(),
    })
}

fn map_program(
    set: &mut EntitySet,
    controller_key: &EntityKey,
    node: &XmlNode,
    parent_path: &str,
) -> ImportResult<()> {
    let view = SchemaView::bind(&PROGRAM, node, parent_path)?;
    let name = view.required("Name")?.to_string();
    let key = controller_key.child(EntityKind::Program, &name);

    set.insert(Entity::new(
        key.clone(),
        EntityBody::Program(Program {
            name: name.clone(),
            program_type: view.optional("Type").map(str::to_string),
            main_routine: view.optional("MainRoutineName").map(str::to_string),
            disabled: view
                .optional("Disabled")
                .map_or(false, |d| d.eq_ignore_ascii_case("true")),
            attributes: view.attributes(),
            description: view.description(),
            extensions: view.extensions(),
        }),
    ))?;

    let routines_path = format!("{}/Routines", view.path);
    for routine in view.members(&ROUTINE) {
        map_routine(set, &key, routine, &routines_path)?;
    }

    let tags_path = format!("{}/Tags", view.path);
    for tag in view.members(&TAG) {
        map_tag(set, &key, TagScope::Program(name.clone()), tag, &tags_path)?;
    }

    Ok(())
}

fn map_routine(
    set: &mut EntitySet,
    program_key: &EntityKey,
    node: &XmlNode,
    parent_path: &str,
) -> ImportResult<()> {
    let view = SchemaView::bind(&ROUTINE, node, parent_path)?;
    let name = view.required("Name")?;

    set.insert(Entity::new(
        program_key.child(EntityKind::Routine, name),
        EntityBody::Routine(Routine {
            name: name.to_string(),
            routine_kind: RoutineKind::from_code(view.required("Type")?),
            // body elements are opaque; unknown_children is everything but Description
            content: view.extensions(),
            attributes: view.attributes(),
            description: view.description(),
        }),
    ))
}

fn map_tag(
    set: &mut EntitySet,
    scope_key: &EntityKey,
    scope: TagScope,
    node: &XmlNode,
    parent_path: &str,
) -> ImportResult<()> {
    let view = SchemaView::bind(&TAG, node, parent_path)?;
    let name = view.required("Name")?;

    set.insert(Entity::new(
        scope_key.child(EntityKind::Tag, name),
        EntityBody::Tag(Tag {
            name: name.to_string(),
            data_type: view.required("DataType")?.to_string(),
            scope,
            tag_type: view.optional("TagType").map(str::to_string),
            initial_value: initial_value(node),
            data: node
                .children_named("Data")
                .map(XmlNode::to_canonical_xml)
                .collect(),
            attributes: view.attributes(),
            description: view.description(),
            extensions: view.extensions(),
        }),
    ))
}

/// `Data/Value` text first, then the decorated `DataValue@Value` form
fn initial_value(tag: &XmlNode) -> Option<String> {
    for data in tag.children_named("Data") {
        if let Some(value) = data.child("Value").map(|v| v.text.trim()).filter(|v| !v.is_empty()) {
            return Some(value.to_string());
        }
        if data.attr("Format") == Some("Decorated") {
            let decorated = data
                .child("DataValue")
                .and_then(|dv| dv.attr("Value"))
                .map(str::trim)
                .filter(|v| !v.is_empty());
            if let Some(value) = decorated {
                return Some(value.to_string());
            }
        }
    }
    None
}

fn map_aoi(
    set: &mut EntitySet,
    controller_key: &EntityKey,
    node: &XmlNode,
    parent_path: &str,
) -> ImportResult<()> {
    let view = SchemaView::bind(&AOI, node, parent_path)?;
    let name = view.required("Name")?;
    let key = controller_key.child(EntityKind::Aoi, name);

    let parameters_path = format!("{}/Parameters", view.path);
    let mut seen = BTreeSet::new();
    let mut parameters = Vec::new();
    for param in view.members(&AOI_PARAMETER) {
        let p = SchemaView::bind(&AOI_PARAMETER, param, &parameters_path)?;
        let param_name = p.required("Name")?;
        if !seen.insert(param_name) {
            return Err(ImportError::duplicate(
                key.as_str(),
                &format!("Parameter:{}", param_name),
            ));
        }
        parameters.push(AoiParameter {
            name: param_name.to_string(),
            data_type: p.required("DataType")?.to_string(),
            direction: ParameterDirection::from_usage(p.required("Usage")?),
            required: p
                .optional("Required")
                .map_or(false, |r| r.eq_ignore_ascii_case("true")),
            attributes: p.attributes(),
            description: p.description(),
            extensions: p.extensions(),
        });
    }

    set.insert(Entity::new(
        key,
        EntityBody::Aoi(AoiDefinition {
            name: name.to_string(),
            revision: view.optional("Revision").unwrap_or_default().to_string(),
            parameters,
            attributes: view.attributes(),
            description: view.description(),
            extensions: view.extensions(),
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::read_document;
    use crate::test_fixtures::*;

    fn map(xml: &str) -> ImportResult<MappedDocument> {
        map_document(&read_document(xml.as_bytes()).unwrap())
    }

    #[test]
    fn test_maps_full_hierarchy() {
        let doc = map(PLANT_V1).unwrap();

        assert_eq!(doc.controller, "C1");
        assert_eq!(doc.export_date.as_deref(), Some("Mon Jan 06 10:00:00 2025"));
        assert_eq!(doc.count(EntityKind::Controller), 1);
        assert_eq!(doc.count(EntityKind::Program), 1);
        assert_eq!(doc.count(EntityKind::Routine), 2);
        assert_eq!(doc.count(EntityKind::Tag), 3);
        assert_eq!(doc.count(EntityKind::Aoi), 1);

        let kinds: Vec<EntityKind> = doc.entities.iter().map(|e| e.kind()).collect();
        let mut sorted = kinds.clone();
        sorted.sort();
        assert_eq!(kinds, sorted, "entities must come out Controller → Program → Routine → Tag → AOI");

        let controller = doc.get(&EntityKey::controller("C1")).unwrap();
        match &controller.body {
            EntityBody::Controller(c) => {
                assert_eq!(c.processor_type.as_deref(), Some("1756-L83E"));
                assert_eq!(c.revision.as_deref(), Some("32.11"));
            }
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn test_tag_fields_and_scopes() {
        let doc = map(PLANT_V1).unwrap();
        let program_key = EntityKey::controller("C1").child(EntityKind::Program, "Main");

        let temp = doc.get(&program_key.child(EntityKind::Tag, "Temp1")).unwrap();
        match &temp.body {
            EntityBody::Tag(t) => {
                assert_eq!(t.data_type, "REAL");
                assert_eq!(t.scope, TagScope::Program("Main".to_string()));
                assert_eq!(t.initial_value.as_deref(), Some("21.5"));
                assert_eq!(t.description.as_deref(), Some("Tank temperature"));
            }
            other => panic!("unexpected body {:?}", other),
        }

        let run = doc
            .get(&EntityKey::controller("C1").child(EntityKind::Tag, "Run"))
            .unwrap();
        match &run.body {
            EntityBody::Tag(t) => {
                assert_eq!(t.scope, TagScope::Controller);
                assert_eq!(t.initial_value.as_deref(), Some("0"));
            }
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn test_routine_content_is_opaque_and_ordered() {
        let doc = map(PLANT_V1).unwrap();
        let key = EntityKey::controller("C1")
            .child(EntityKind::Program, "Main")
            .child(EntityKind::Routine, "MainRoutine");
        match &doc.get(&key).unwrap().body {
            EntityBody::Routine(r) => {
                assert_eq!(r.routine_kind, RoutineKind::Ladder);
                assert_eq!(r.content.len(), 1);
                assert!(r.content[0].starts_with("<RLLContent>"));
                assert!(r.content[0].contains("XIC(Run)OTE(Pump)"));
            }
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn test_tag_data_payloads_are_kept() {
        let xml = r#"<RSLogix5000Content SchemaRevision="1.0"><Controller Name="C1"><Tags>
          <Tag Name="Buf" DataType="DINT" Dimensions="3" Radix="Decimal" LastModifiedDate="x">
            <Data Format="L5K"><![CDATA[[1,2,3]]]></Data>
            <Data Format="Decorated"><Array DataType="DINT" Dimensions="3" Radix="Decimal">
              <Element Index="[0]" Value="1"/><Element Index="[1]" Value="2"/><Element Index="[2]" Value="3"/>
            </Array></Data>
          </Tag>
        </Tags></Controller></RSLogix5000Content>"#;
        let doc = map(xml).unwrap();
        let key = EntityKey::controller("C1").child(EntityKind::Tag, "Buf");
        match &doc.get(&key).unwrap().body {
            EntityBody::Tag(t) => {
                assert_eq!(t.initial_value, None);
                assert_eq!(t.data.len(), 2);
                assert_eq!(t.data[0], "<Data Format=\"L5K\">[1,2,3]</Data>");
                assert!(t.data[1].contains("<Element Index=\"[2]\" Value=\"3\"/>"));
                assert_eq!(t.attributes.get("Dimensions").map(String::as_str), Some("3"));
                assert_eq!(t.attributes.get("Radix").map(String::as_str), Some("Decimal"));
                assert!(!t.attributes.contains_key("LastModifiedDate"));
            }
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn test_undeclared_program_attributes_are_content() {
        let doc = map(PLANT_V1).unwrap();
        let controller = doc.get(&EntityKey::controller("C1")).unwrap();
        match &controller.body {
            EntityBody::Controller(c) => assert_eq!(c.attributes.get("Use").map(String::as_str), Some("Target")),
            other => panic!("unexpected body {:?}", other),
        }

        let xml = r#"<RSLogix5000Content SchemaRevision="1.0"><Controller Name="C1"><Programs>
          <Program Name="Main" Class="Safety" UseAsFolder="false"/>
        </Programs></Controller></RSLogix5000Content>"#;
        let doc = map(xml).unwrap();
        let program = doc
            .get(&EntityKey::controller("C1").child(EntityKind::Program, "Main"))
            .unwrap();
        match &program.body {
            EntityBody::Program(p) => {
                assert_eq!(p.attributes.len(), 2);
                assert_eq!(p.attributes["Class"], "Safety");
            }
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn test_aoi_parameters_keep_order() {
        let doc = map(PLANT_V1).unwrap();
        let key = EntityKey::controller("C1").child(EntityKind::Aoi, "Valve");
        match &doc.get(&key).unwrap().body {
            EntityBody::Aoi(a) => {
                assert_eq!(a.revision, "1.2");
                let names: Vec<&str> = a.parameters.iter().map(|p| p.name.as_str()).collect();
                assert_eq!(names, vec!["Open", "Opened", "Cmd"]);
                assert_eq!(a.parameters[1].direction, ParameterDirection::Output);
                assert_eq!(a.parameters[2].direction, ParameterDirection::InOut);
                assert!(a.parameters[0].required);
            }
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn test_unknown_elements_are_preserved() {
        let doc = map(PLANT_V1).unwrap();
        let controller = doc.get(&EntityKey::controller("C1")).unwrap();
        assert!(controller
            .body
            .extensions()
            .iter()
            .any(|x| x.contains("<SafetyInfo") && x.contains("SafetyLocked=\"false\"")));
    }

    #[test]
    fn test_duplicate_tag_in_program_scope() {
        let err = map(DUPLICATE_TAG).unwrap_err();
        match err {
            ImportError::DuplicateKey { scope, key } => {
                assert_eq!(scope, "Controller:C1/Program:Main");
                assert_eq!(key, "Tag:Temp1");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_same_tag_name_in_different_scopes_is_fine() {
        let xml = r#"<RSLogix5000Content SchemaRevision="1.0">
          <Controller Name="C1">
            <Tags><Tag Name="Temp1" DataType="REAL"/></Tags>
            <Programs><Program Name="Main"><Tags><Tag Name="Temp1" DataType="REAL"/></Tags></Program></Programs>
          </Controller>
        </RSLogix5000Content>"#;
        assert_eq!(map(xml).unwrap().count(EntityKind::Tag), 2);
    }

    #[test]
    fn test_missing_required_field() {
        let xml = r#"<RSLogix5000Content SchemaRevision="1.0">
          <Controller Name="C1"><Programs><Program Name="Main">
            <Routines><Routine Name="R1"/></Routines>
          </Program></Programs></Controller>
        </RSLogix5000Content>"#;
        match map(xml).unwrap_err() {
            ImportError::MissingField { kind, field, path } => {
                assert_eq!(kind, EntityKind::Routine);
                assert_eq!(field, "Type");
                assert_eq!(
                    path,
                    "/RSLogix5000Content/Controller[@Name='C1']/Programs/Program[@Name='Main']/Routines/Routine"
                );
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_controller_is_required_and_unique() {
        let none = map(r#"<RSLogix5000Content SchemaRevision="1.0"/>"#).unwrap_err();
        assert!(matches!(none, ImportError::MissingField { kind: EntityKind::Controller, .. }));

        let two = map(
            r#"<RSLogix5000Content SchemaRevision="1.0"><Controller Name="A"/><Controller Name="B"/></RSLogix5000Content>"#,
        )
        .unwrap_err();
        assert!(matches!(two, ImportError::DuplicateKey { .. }));

        let unnamed = map(r#"<RSLogix5000Content SchemaRevision="1.0"><Controller/></RSLogix5000Content>"#)
            .unwrap_err();
        assert!(matches!(unnamed, ImportError::MissingField { ref field, .. } if field == "Name"));
    }

    #[test]
    fn test_duplicate_aoi_parameter() {
        let xml = r#"<RSLogix5000Content SchemaRevision="1.0"><Controller Name="C1">
          <AddOnInstructionDefinitions><AddOnInstructionDefinition Name="V"><Parameters>
            <Parameter Name="P" DataType="BOOL" Usage="Input"/>
            <Parameter Name="P" DataType="BOOL" Usage="Output"/>
          </Parameters></AddOnInstructionDefinition></AddOnInstructionDefinitions>
        </Controller></RSLogix5000Content>"#;
        assert!(matches!(map(xml).unwrap_err(), ImportError::DuplicateKey { .. }));
    }

    #[test]
    fn test_mapping_is_pure_and_format_insensitive() {
        let a = map(PLANT_V1).unwrap();
        let b = map(PLANT_V1).unwrap();
        assert_eq!(a, b);

        let reformatted = map(PLANT_V1_REFORMATTED).unwrap();
        let hashes = |d: &MappedDocument| -> Vec<(String, String)> {
            d.entities
                .iter()
                .map(|e| (e.key.to_string(), e.content_hash()))
                .collect()
        };
        assert_eq!(hashes(&a), hashes(&reformatted));
    }

    #[test]
    fn test_relationships_follow_scope_paths() {
        let doc = map(PLANT_V1).unwrap();
        let rels = doc.relationships();
        let program = EntityKey::controller("C1").child(EntityKind::Program, "Main");
        assert!(rels
            .iter()
            .any(|(child, parent)| parent == &program && child.as_str().ends_with("Routine:MainRoutine")));
        assert_eq!(rels.len(), doc.entities.len() - 1);
    }
}
