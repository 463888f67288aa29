//! Schema catalog
//!
//! In-memory description of the server's work item schema: field
//! definitions, link type ends, the area and iteration hierarchies and the
//! connection facts (current user, product) a query may refer to.
//! Catalogs are loaded from JSON.

use crate::error::Result;
use crate::types::{DataType, FieldTag, FieldType, FieldUsage};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Well-known field ids
pub mod core_fields {
    pub const ID: i32 = -3;
    pub const AREA_ID: i32 = -2;
    pub const AREA_PATH: i32 = -7;
    pub const TEAM_PROJECT: i32 = -42;
    pub const ITERATION_ID: i32 = -104;
    pub const ITERATION_PATH: i32 = -105;
    pub const TITLE: i32 = 1;
    pub const STATE: i32 = 2;
    pub const ASSIGNED_TO: i32 = 24;
    pub const WORK_ITEM_TYPE: i32 = 25;
    pub const HISTORY: i32 = 54;
    pub const LINK_TYPE: i32 = 100;
}

/// Field definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub id: i32,
    /// Friendly name, e.g. `Assigned To`
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub usage: FieldUsage,
    #[serde(default = "default_true")]
    pub queryable: bool,
    #[serde(default = "default_true")]
    pub sortable: bool,
    /// Filled from the catalog key on load
    #[serde(skip)]
    pub reference_name: String,
}

fn default_true() -> bool {
    true
}

impl FieldDefinition {
    pub fn tag(&self) -> FieldTag {
        FieldTag(self.id)
    }

    /// Data type of the field's values
    pub fn data_type(&self) -> DataType {
        if self.id == core_fields::LINK_TYPE {
            return DataType::String;
        }
        match self.field_type {
            FieldType::String
            | FieldType::PlainText
            | FieldType::Html
            | FieldType::TreePath
            | FieldType::History => DataType::String,
            FieldType::Integer | FieldType::Double => DataType::Numeric,
            FieldType::DateTime => DataType::Date,
            FieldType::Guid => DataType::Guid,
            FieldType::Boolean => DataType::Bool,
        }
    }

    pub fn is_link_field(&self) -> bool {
        self.usage == FieldUsage::WorkItemLink
    }
}

/// Link topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LinkTopology {
    #[default]
    Network,
    DirectedNetwork,
    Dependency,
    Tree,
}

/// One end of a link type, e.g. `System.LinkTypes.Hierarchy-Forward`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkTypeEnd {
    pub id: i32,
    pub name: String,
    #[serde(default)]
    pub reference_name: String,
    #[serde(default)]
    pub is_forward: bool,
    #[serde(default)]
    pub topology: LinkTopology,
}

impl LinkTypeEnd {
    fn matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
            || (!self.reference_name.is_empty() && self.reference_name.eq_ignore_ascii_case(name))
    }
}

/// Node of the area or iteration hierarchy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    pub id: i32,
    pub name: String,
    #[serde(default)]
    pub children: Vec<TreeNode>,
}

/// Which hierarchy a path refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeKind {
    Area,
    Iteration,
}

/// Schema catalog
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub product: String,
    #[serde(default)]
    pub current_user: String,
    /// Keyed by reference name, in declaration order
    #[serde(default)]
    pub fields: IndexMap<String, FieldDefinition>,
    #[serde(default)]
    pub link_types: Vec<LinkTypeEnd>,
    /// Area roots, one per team project
    #[serde(default)]
    pub areas: Vec<TreeNode>,
    #[serde(default)]
    pub iterations: Vec<TreeNode>,
}

impl Catalog {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let mut catalog: Catalog = serde_json::from_str(json)?;
        catalog.fill_reference_names();
        Ok(catalog)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        Self::from_json_str(&data)
    }

    fn fill_reference_names(&mut self) {
        for (reference_name, field) in self.fields.iter_mut() {
            field.reference_name = reference_name.clone();
        }
    }

    /// Add a field definition
    pub fn add_field(
        &mut self,
        reference_name: &str,
        name: &str,
        id: i32,
        field_type: FieldType,
    ) -> &mut FieldDefinition {
        self.fields
            .entry(reference_name.to_string())
            .or_insert_with(|| FieldDefinition {
                id,
                name: name.to_string(),
                field_type,
                usage: FieldUsage::WorkItem,
                queryable: true,
                sortable: true,
                reference_name: reference_name.to_string(),
            })
    }

    /// Catalog holding the core system fields and nothing else
    pub fn with_core_fields() -> Self {
        let mut catalog = Catalog::default();
        catalog.add_field("System.Id", "ID", core_fields::ID, FieldType::Integer);
        catalog.add_field("System.Title", "Title", core_fields::TITLE, FieldType::String);
        catalog.add_field("System.State", "State", core_fields::STATE, FieldType::String);
        catalog.add_field("System.AssignedTo", "Assigned To", core_fields::ASSIGNED_TO, FieldType::String);
        catalog.add_field("System.WorkItemType", "Work Item Type", core_fields::WORK_ITEM_TYPE, FieldType::String);
        catalog.add_field("System.TeamProject", "Team Project", core_fields::TEAM_PROJECT, FieldType::String);
        catalog.add_field("System.AreaPath", "Area Path", core_fields::AREA_PATH, FieldType::TreePath);
        catalog.add_field("System.AreaId", "Area ID", core_fields::AREA_ID, FieldType::Integer);
        catalog.add_field("System.IterationPath", "Iteration Path", core_fields::ITERATION_PATH, FieldType::TreePath);
        catalog.add_field("System.IterationId", "Iteration ID", core_fields::ITERATION_ID, FieldType::Integer);
        catalog.add_field("System.History", "History", core_fields::HISTORY, FieldType::History).sortable = false;
        let link_type = catalog.add_field(
            "System.Links.LinkType",
            "Link Type",
            core_fields::LINK_TYPE,
            FieldType::Integer,
        );
        link_type.usage = FieldUsage::WorkItemLink;
        catalog
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    /// Field by reference name or friendly name, case-insensitively
    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.get(name).or_else(|| {
            self.fields.values().find(|f| {
                f.reference_name.eq_ignore_ascii_case(name) || f.name.eq_ignore_ascii_case(name)
            })
        })
    }

    pub fn field_by_id(&self, id: i32) -> Option<&FieldDefinition> {
        self.fields.values().find(|f| f.id == id)
    }

    pub fn field_by_tag(&self, tag: FieldTag) -> Option<&FieldDefinition> {
        self.field_by_id(tag.0)
    }

    /// Work item fields in declaration order
    pub fn work_item_fields(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.fields.values().filter(|f| f.usage == FieldUsage::WorkItem)
    }

    pub fn link_type_end(&self, name: &str) -> Option<&LinkTypeEnd> {
        self.link_types.iter().find(|end| end.matches(name))
    }

    /// Node id for a backslash separated path, `None` if the path is unknown
    pub fn tree_id(&self, path: &str, kind: TreeKind) -> Option<i32> {
        let roots = match kind {
            TreeKind::Area => &self.areas,
            TreeKind::Iteration => &self.iterations,
        };
        let mut segments = path.split('\\').map(str::trim);
        let first = segments.next()?;
        let mut node = roots.iter().find(|n| n.name.eq_ignore_ascii_case(first))?;
        for segment in segments {
            node = node
                .children
                .iter()
                .find(|n| n.name.eq_ignore_ascii_case(segment))?;
        }
        Some(node.id)
    }
}
