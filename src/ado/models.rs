//! Wire types for the Azure DevOps test plan and work item APIs.
//!
//! Every optional field defaults when absent; a missing field is never an error.

use crate::steps::Step;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Work item type name that marks a test case
pub const TEST_CASE_TYPE: &str = "Test Case";

/// Work item field reference names
pub mod fields {
    pub const WORK_ITEM_TYPE: &str = "System.WorkItemType";
    pub const TITLE: &str = "System.Title";
    pub const STATE: &str = "System.State";
    pub const ASSIGNED_TO: &str = "System.AssignedTo";
    pub const AREA_PATH: &str = "System.AreaPath";
    pub const ITERATION_PATH: &str = "System.IterationPath";
    pub const PRIORITY: &str = "Microsoft.VSTS.Common.Priority";
    pub const STEPS: &str = "Microsoft.VSTS.TCM.Steps";

    /// Fields requested for a full test case fetch
    pub const DETAIL: &[&str] = &[
        WORK_ITEM_TYPE,
        TITLE,
        STATE,
        ASSIGNED_TO,
        AREA_PATH,
        ITERATION_PATH,
        PRIORITY,
        STEPS,
    ];
}

/// `{ "value": [...], "count": n }` envelope used by list endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IdentityRef {
    pub display_name: Option<String>,
    pub unique_name: Option<String>,
}

/// Minimal `{id, name}` reference
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityRef {
    pub id: u32,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TestPlan {
    pub id: u32,
    pub name: String,
    pub state: Option<String>,
    pub iteration: Option<String>,
    pub area_path: Option<String>,
    pub owner: Option<IdentityRef>,
    pub root_suite: Option<EntityRef>,
}

impl TestPlan {
    /// Root suite id declared by the plan, or the plan id by convention.
    pub fn root_suite_id(&self) -> u32 {
        self.root_suite
            .as_ref()
            .map(|r| r.id)
            .filter(|id| *id > 0)
            .unwrap_or(self.id)
    }

    pub fn owner_name(&self) -> Option<&str> {
        self.owner.as_ref().and_then(|o| o.display_name.as_deref())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SuiteKind {
    #[default]
    #[serde(rename = "staticTestSuite")]
    Static,
    #[serde(rename = "dynamicTestSuite")]
    Dynamic,
    #[serde(rename = "requirementTestSuite")]
    RequirementBased,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TestSuite {
    pub id: u32,
    pub name: String,
    pub suite_type: SuiteKind,
    pub parent_suite: Option<EntityRef>,
    /// Direct children, only populated when the request asked for expansion
    pub children: Vec<TestSuite>,
}

impl TestSuite {
    /// Parent suite id. A suite that names itself as parent is a root.
    pub fn parent_id(&self) -> Option<u32> {
        self.parent_suite
            .as_ref()
            .map(|p| p.id)
            .filter(|id| *id > 0 && *id != self.id)
    }
}

/// A work item with the requested fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkItem {
    pub id: u32,
    pub fields: Map<String, Value>,
    /// Pre-parsed steps, when the source already provides them
    pub steps: Option<Vec<Step>>,
}

impl WorkItem {
    /// Read a field as text. Identity fields yield their display name.
    pub fn field_str(&self, name: &str) -> Option<String> {
        match self.fields.get(name)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Object(obj) => obj
                .get("displayName")
                .or_else(|| obj.get("uniqueName"))
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => None,
        }
        .filter(|s| !s.is_empty())
    }

    pub fn field_i64(&self, name: &str) -> Option<i64> {
        match self.fields.get(name)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn work_item_type(&self) -> Option<String> {
        self.field_str(fields::WORK_ITEM_TYPE)
    }
}
