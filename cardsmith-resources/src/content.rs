//! Typed resource content
//!
//! Every resource kind has one content type. [`ResourceContent`] is the closed
//! union of them, built from raw JSON with [`ResourceContent::parse`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::kind::ResourceKind;

/// A field declared on a card type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomField {
    /// Name of the field type backing this field
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub is_calculated: bool,
    #[serde(default = "default_true")]
    pub is_editable: bool,
}

fn default_true() -> bool {
    true
}

impl CustomField {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: None,
            description: None,
            is_calculated: false,
            is_editable: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardType {
    pub name: String,
    /// Name of the workflow cards of this type follow
    pub workflow: String,
    #[serde(default)]
    pub custom_fields: Vec<CustomField>,
    #[serde(default)]
    pub always_visible_fields: Vec<String>,
    #[serde(default)]
    pub optionally_visible_fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldType {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub data_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowState {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowTransition {
    pub name: String,
    #[serde(default)]
    pub from_state: Vec<String>,
    pub to_state: String,
}

impl WorkflowTransition {
    /// A transition with no source state (or the empty one) enters the workflow.
    pub fn is_initial(&self) -> bool {
        self.from_state.is_empty() || self.from_state.iter().any(String::is_empty)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub name: String,
    #[serde(default)]
    pub states: Vec<WorkflowState>,
    #[serde(default)]
    pub transitions: Vec<WorkflowTransition>,
}

impl Workflow {
    /// Target states of every initial transition, in declaration order
    pub fn initial_states(&self) -> Vec<&str> {
        self.transitions
            .iter()
            .filter(|t| t.is_initial())
            .map(|t| t.to_state.as_str())
            .collect()
    }

    /// The state new cards start in
    pub fn initial_state(&self) -> Option<&str> {
        self.initial_states().into_iter().next()
    }

    pub fn has_state(&self, state: &str) -> bool {
        self.states.iter().any(|s| s.name == state)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkType {
    pub name: String,
    #[serde(default)]
    pub outbound_display_name: String,
    #[serde(default)]
    pub inbound_display_name: String,
    #[serde(default)]
    pub source_card_types: Vec<String>,
    #[serde(default)]
    pub destination_card_types: Vec<String>,
    #[serde(default)]
    pub enable_link_description: bool,
}

/// Metadata of a folder resource: `template.json` or `report.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderMetadata {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// Content of kinds whose shape is owned by an outside tool
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenericResource {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Content of any resource, one variant per kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResourceContent {
    CardType(CardType),
    FieldType(FieldType),
    Workflow(Workflow),
    LinkType(LinkType),
    Template(FolderMetadata),
    Report(FolderMetadata),
    Calculation(GenericResource),
    GraphModel(GenericResource),
    GraphView(GenericResource),
}

impl ResourceContent {
    /// Build typed content of `kind` from JSON
    pub fn parse(kind: ResourceKind, json: Value) -> serde_json::Result<Self> {
        Ok(match kind {
            ResourceKind::CardTypes => Self::CardType(serde_json::from_value(json)?),
            ResourceKind::FieldTypes => Self::FieldType(serde_json::from_value(json)?),
            ResourceKind::Workflows => Self::Workflow(serde_json::from_value(json)?),
            ResourceKind::LinkTypes => Self::LinkType(serde_json::from_value(json)?),
            ResourceKind::Templates => Self::Template(serde_json::from_value(json)?),
            ResourceKind::Reports => Self::Report(serde_json::from_value(json)?),
            ResourceKind::Calculations => Self::Calculation(serde_json::from_value(json)?),
            ResourceKind::GraphModels => Self::GraphModel(serde_json::from_value(json)?),
            ResourceKind::GraphViews => Self::GraphView(serde_json::from_value(json)?),
        })
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::CardType(_) => ResourceKind::CardTypes,
            Self::FieldType(_) => ResourceKind::FieldTypes,
            Self::Workflow(_) => ResourceKind::Workflows,
            Self::LinkType(_) => ResourceKind::LinkTypes,
            Self::Template(_) => ResourceKind::Templates,
            Self::Report(_) => ResourceKind::Reports,
            Self::Calculation(_) => ResourceKind::Calculations,
            Self::GraphModel(_) => ResourceKind::GraphModels,
            Self::GraphView(_) => ResourceKind::GraphViews,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::CardType(c) => &c.name,
            Self::FieldType(f) => &f.name,
            Self::Workflow(w) => &w.name,
            Self::LinkType(l) => &l.name,
            Self::Template(m) | Self::Report(m) => &m.name,
            Self::Calculation(g) | Self::GraphModel(g) | Self::GraphView(g) => &g.name,
        }
    }

    /// Replace the stored name
    pub fn set_name(&mut self, name: impl Into<String>) {
        let name = name.into();
        match self {
            Self::CardType(c) => c.name = name,
            Self::FieldType(f) => f.name = name,
            Self::Workflow(w) => w.name = name,
            Self::LinkType(l) => l.name = name,
            Self::Template(m) | Self::Report(m) => m.name = name,
            Self::Calculation(g) | Self::GraphModel(g) | Self::GraphView(g) => g.name = name,
        }
    }

    pub fn as_card_type(&self) -> Option<&CardType> {
        match self {
            Self::CardType(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_workflow(&self) -> Option<&Workflow> {
        match self {
            Self::Workflow(w) => Some(w),
            _ => None,
        }
    }

    pub fn as_field_type(&self) -> Option<&FieldType> {
        match self {
            Self::FieldType(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_template(&self) -> Option<&FolderMetadata> {
        match self {
            Self::Template(m) => Some(m),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn workflow() -> Workflow {
        serde_json::from_value(json!({
            "name": "proj/workflows/simple",
            "states": [
                {"name": "Draft", "category": "initial"},
                {"name": "Approved", "category": "closed"}
            ],
            "transitions": [
                {"name": "Approve", "fromState": ["Draft"], "toState": "Approved"},
                {"name": "Create", "fromState": [""], "toState": "Draft"},
                {"name": "Restart", "fromState": [], "toState": "Approved"}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_initial_states() {
        let wf = workflow();
        assert_eq!(wf.initial_states(), vec!["Draft", "Approved"]);
        assert_eq!(wf.initial_state(), Some("Draft"));
        assert!(wf.has_state("Approved"));
        assert!(!wf.has_state("Deleted"));
    }

    #[test]
    fn test_workflow_without_initial_transition() {
        let wf = Workflow {
            name: "w".into(),
            states: vec![],
            transitions: vec![WorkflowTransition {
                name: "Move".into(),
                from_state: vec!["A".into()],
                to_state: "B".into(),
            }],
        };
        assert_eq!(wf.initial_state(), None);
    }

    #[test]
    fn test_custom_field_defaults() {
        let field: CustomField =
            serde_json::from_value(json!({"name": "proj/fieldTypes/owner"})).unwrap();
        assert!(!field.is_calculated);
        assert!(field.is_editable);
    }

    #[test]
    fn test_parse_picks_variant_by_kind() {
        let content = ResourceContent::parse(
            ResourceKind::CardTypes,
            json!({"name": "proj/cardTypes/page", "workflow": "proj/workflows/simple"}),
        )
        .unwrap();
        assert_eq!(content.kind(), ResourceKind::CardTypes);
        assert_eq!(content.name(), "proj/cardTypes/page");
        assert_eq!(
            content.as_card_type().unwrap().workflow,
            "proj/workflows/simple"
        );

        // A card type without a workflow is not a card type
        assert!(
            ResourceContent::parse(ResourceKind::CardTypes, json!({"name": "x"})).is_err()
        );
    }

    #[test]
    fn test_generic_content_keeps_extra_fields() {
        let content = ResourceContent::parse(
            ResourceKind::GraphViews,
            json!({"name": "proj/graphViews/v", "direction": "LR"}),
        )
        .unwrap();
        let out = serde_json::to_value(&content).unwrap();
        assert_eq!(out["direction"], "LR");
        assert_eq!(out["name"], "proj/graphViews/v");
    }
}
