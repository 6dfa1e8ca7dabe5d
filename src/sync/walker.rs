//! Suite tree discovery for a plan.
//!
//! First the flat per-plan listing is tried. When it errors or comes back
//! empty, the tree is rebuilt from the root suite, resolving each node's
//! children by (a) filtering the expanded per-plan listing on parent id, then
//! (b) fetching the node with its children inlined. Nodes already collected
//! are never descended again, which keeps disagreeing strategies from
//! looping.

use crate::ado::models::{TestPlan, TestSuite};
use crate::ado::{RemoteError, TestManagementApi};
use serde::Serialize;
use std::collections::HashMap;

/// How the suite list of a plan was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WalkStrategy {
    DirectListing,
    RootWithChildren,
}

/// Suites of one plan, indexed by id, in discovery order.
#[derive(Debug, Default)]
pub struct SuiteArena {
    suites: Vec<TestSuite>,
    index: HashMap<u32, usize>,
}

impl SuiteArena {
    /// Add a suite. Returns false (and keeps the first copy) if the id is
    /// already present.
    pub fn insert(&mut self, suite: TestSuite) -> bool {
        if self.index.contains_key(&suite.id) {
            return false;
        }
        self.index.insert(suite.id, self.suites.len());
        self.suites.push(suite);
        true
    }

    pub fn contains(&self, suite_id: u32) -> bool {
        self.index.contains_key(&suite_id)
    }

    pub fn get(&self, suite_id: u32) -> Option<&TestSuite> {
        self.index.get(&suite_id).map(|&i| &self.suites[i])
    }

    pub fn len(&self) -> usize {
        self.suites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.suites.is_empty()
    }

    pub fn into_suites(self) -> Vec<TestSuite> {
        self.suites
    }
}

/// Flattened suite tree of a plan
#[derive(Debug, Clone)]
pub struct PlanTree {
    pub plan: TestPlan,
    pub suites: Vec<TestSuite>,
    pub strategy: WalkStrategy,
}

/// Discover every suite of `plan`, root included.
///
/// Fails only when neither the flat listing nor the root suite can be read.
pub async fn walk_plan(api: &dyn TestManagementApi, plan: &TestPlan) -> Result<PlanTree, RemoteError> {
    match api.list_suites(plan.id, false).await {
        Ok(suites) if !suites.is_empty() => {
            let mut arena = SuiteArena::default();
            for suite in suites {
                arena.insert(suite);
            }
            tracing::debug!(
                "Plan {}: direct listing returned {} suites",
                plan.id,
                arena.len()
            );
            return Ok(PlanTree {
                plan: plan.clone(),
                suites: arena.into_suites(),
                strategy: WalkStrategy::DirectListing,
            });
        }
        Ok(_) => tracing::info!(
            "Plan {}: direct suite listing is empty, walking from the root suite",
            plan.id
        ),
        Err(e) => tracing::warn!(
            "Plan {}: direct suite listing failed ({}), walking from the root suite",
            plan.id,
            e
        ),
    }

    let root = api.get_suite(plan.id, plan.root_suite_id(), true).await?;
    let arena = walk_from_root(api, plan.id, root).await;

    Ok(PlanTree {
        plan: plan.clone(),
        suites: arena.into_suites(),
        strategy: WalkStrategy::RootWithChildren,
    })
}

async fn walk_from_root(api: &dyn TestManagementApi, plan_id: u32, root: TestSuite) -> SuiteArena {
    // Fetched once per walk; a failure only disables strategy (a)
    let expanded = match api.list_suites(plan_id, true).await {
        Ok(suites) => suites,
        Err(e) => {
            tracing::debug!("Plan {}: expanded suite listing failed: {}", plan_id, e);
            Vec::new()
        }
    };

    let mut arena = SuiteArena::default();
    let mut pending = vec![root];

    while let Some(node) = pending.pop() {
        let node_id = node.id;
        if !arena.insert(node) {
            tracing::debug!("Plan {}: suite {} already visited, skipping", plan_id, node_id);
            continue;
        }

        let children = resolve_children(api, plan_id, &arena, node_id, &expanded).await;
        // Reverse so the first child is processed next (pre-order)
        for child in children.into_iter().rev() {
            if !arena.contains(child.id) {
                pending.push(child);
            }
        }
    }

    arena
}

/// Direct children of a node; an empty list when neither strategy answers.
async fn resolve_children(
    api: &dyn TestManagementApi,
    plan_id: u32,
    arena: &SuiteArena,
    node_id: u32,
    expanded: &[TestSuite],
) -> Vec<TestSuite> {
    let by_parent: Vec<TestSuite> = expanded
        .iter()
        .filter(|s| s.id != node_id && s.parent_id() == Some(node_id))
        .cloned()
        .collect();
    if !by_parent.is_empty() {
        return by_parent;
    }

    if let Some(node) = arena.get(node_id) {
        if !node.children.is_empty() {
            return without_self(node.children.clone(), node_id);
        }
    }

    match api.get_suite(plan_id, node_id, true).await {
        Ok(suite) => without_self(suite.children, node_id),
        Err(e) => {
            tracing::debug!(
                "Plan {}: children of suite {} unavailable ({}), treating as leaf",
                plan_id,
                node_id,
                e
            );
            Vec::new()
        }
    }
}

fn without_self(children: Vec<TestSuite>, node_id: u32) -> Vec<TestSuite> {
    children.into_iter().filter(|c| c.id != node_id).collect()
}
