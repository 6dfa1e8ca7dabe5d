//! Test case id resolution for suite listing records.
//!
//! The listing returns the test case id in one of four places. Each place is
//! a [`ReferenceShape`] variant; resolution walks them in priority order and
//! takes the first that holds a positive integer.

use serde_json::Value;

/// A location in a reference record that may carry the test case id.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReferenceShape<'a> {
    /// `workItem.id`
    WorkItem(&'a Value),
    /// `pointAssignments[0].testCase.id`
    PointAssignment(&'a Value),
    /// `id`
    Direct(&'a Value),
    /// `testCaseReference.id`
    TestCaseReference(&'a Value),
}

impl<'a> ReferenceShape<'a> {
    /// The raw id value held by this shape
    fn raw_id(&self) -> &'a Value {
        match self {
            ReferenceShape::WorkItem(v)
            | ReferenceShape::PointAssignment(v)
            | ReferenceShape::Direct(v)
            | ReferenceShape::TestCaseReference(v) => v,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ReferenceShape::WorkItem(_) => "workItem",
            ReferenceShape::PointAssignment(_) => "pointAssignment",
            ReferenceShape::Direct(_) => "direct",
            ReferenceShape::TestCaseReference(_) => "testCaseReference",
        }
    }

    /// The id, if this shape holds a finite positive integer
    pub fn id(&self) -> Option<u32> {
        positive_id(self.raw_id())
    }
}

/// Shapes present in `record`, highest priority first.
pub fn shapes(record: &Value) -> Vec<ReferenceShape<'_>> {
    let mut found = Vec::with_capacity(4);

    if let Some(id) = record.get("workItem").and_then(|w| w.get("id")) {
        found.push(ReferenceShape::WorkItem(id));
    }
    if let Some(id) = record
        .get("pointAssignments")
        .and_then(|p| p.get(0))
        .and_then(|p| p.get("testCase"))
        .and_then(|t| t.get("id"))
    {
        found.push(ReferenceShape::PointAssignment(id));
    }
    if let Some(id) = record.get("id") {
        found.push(ReferenceShape::Direct(id));
    }
    if let Some(id) = record.get("testCaseReference").and_then(|t| t.get("id")) {
        found.push(ReferenceShape::TestCaseReference(id));
    }

    found
}

/// Resolve the canonical test case id, or `None` when no shape yields one.
///
/// `None` means drop the reference: substituting a default would fetch some
/// other test case's details.
pub fn resolve_test_case_id(record: &Value) -> Option<u32> {
    shapes(record).iter().find_map(ReferenceShape::id)
}

fn positive_id(value: &Value) -> Option<u32> {
    let id = match value {
        Value::Number(n) => match n.as_u64() {
            Some(id) => id,
            None => {
                let f = n.as_f64()?;
                if !f.is_finite() || f.fract() != 0.0 || f <= 0.0 || f > u32::MAX as f64 {
                    return None;
                }
                f as u64
            }
        },
        Value::String(s) => s.trim().parse::<u64>().ok()?,
        _ => return None,
    };
    u32::try_from(id).ok().filter(|id| *id > 0)
}
