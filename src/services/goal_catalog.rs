//! Versioned goal catalog.
//!
//! Goals form a partial order through their prerequisites. A catalog is
//! validated once when it is built: ids are unique, every prerequisite
//! exists, the prerequisite graph is acyclic and morphological patterns are
//! valid regular expressions.

use regex::Regex;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Domain, Goal, GoalId, PatternKind};
use crate::services::table_registry::{TableRegistry, VersionedTable};

const BUILTIN_CATALOG: &str = include_str!("../../data/goal_catalog_v1.yaml");

/// Depth-first search for a prerequisite cycle. On success `path` holds the
/// cycle.
fn detect_cycle_util<'a>(
    node: &'a GoalId,
    graph: &HashMap<&'a GoalId, Vec<&'a GoalId>>,
    visited: &mut HashSet<&'a GoalId>,
    rec_stack: &mut HashSet<&'a GoalId>,
    path: &mut Vec<&'a GoalId>,
) -> bool {
    visited.insert(node);
    rec_stack.insert(node);
    path.push(node);

    if let Some(neighbors) = graph.get(node) {
        for &neighbor in neighbors {
            if !visited.contains(neighbor) {
                if detect_cycle_util(neighbor, graph, visited, rec_stack, path) {
                    return true;
                }
            } else if rec_stack.contains(neighbor) {
                if let Some(cycle_start) = path.iter().position(|id| *id == neighbor) {
                    path.drain(0..cycle_start);
                    return true;
                }
            }
        }
    }

    rec_stack.remove(node);
    path.pop();
    false
}

/// Find one prerequisite cycle, if any.
pub fn detect_cycle(goals: &[Goal]) -> Option<Vec<GoalId>> {
    let graph: HashMap<&GoalId, Vec<&GoalId>> = goals
        .iter()
        .map(|g| (&g.id, g.prerequisites.iter().collect()))
        .collect();

    let mut visited = HashSet::new();
    let mut rec_stack = HashSet::new();

    for goal in goals {
        if !visited.contains(&goal.id) {
            let mut path = Vec::new();
            if detect_cycle_util(&goal.id, &graph, &mut visited, &mut rec_stack, &mut path) {
                return Some(path.into_iter().cloned().collect());
            }
        }
    }
    None
}

#[derive(Debug, Clone)]
pub struct GoalCatalog {
    version: u32,
    goals: Vec<Goal>,
    positions: HashMap<GoalId, usize>,
}

impl VersionedTable for GoalCatalog {
    const TABLE: &'static str = "goal catalog";

    fn version(&self) -> u32 {
        self.version
    }
}

impl GoalCatalog {
    pub fn new(version: u32, goals: Vec<Goal>) -> DomainResult<Self> {
        let mut positions = HashMap::with_capacity(goals.len());
        for (i, goal) in goals.iter().enumerate() {
            goal.validate().map_err(DomainError::CatalogInvalid)?;
            if goal.is_open_conversation() {
                return Err(DomainError::CatalogInvalid(format!(
                    "goal id {} is reserved",
                    goal.id
                )));
            }
            if positions.insert(goal.id.clone(), i).is_some() {
                return Err(DomainError::CatalogInvalid(format!(
                    "duplicate goal id {}",
                    goal.id
                )));
            }
        }

        for goal in &goals {
            for prerequisite in &goal.prerequisites {
                if !positions.contains_key(prerequisite) {
                    return Err(DomainError::CatalogInvalid(format!(
                        "goal {} requires unknown goal {prerequisite}",
                        goal.id
                    )));
                }
            }
            for pattern in &goal.patterns {
                if pattern.kind == PatternKind::Morphological {
                    for form in &pattern.forms {
                        Regex::new(form).map_err(|e| {
                            DomainError::CatalogInvalid(format!(
                                "goal {} pattern '{}': {e}",
                                goal.id, pattern.label
                            ))
                        })?;
                    }
                }
            }
        }

        if let Some(cycle) = detect_cycle(&goals) {
            let cycle: Vec<&str> = cycle.iter().map(GoalId::as_str).collect();
            return Err(DomainError::CatalogInvalid(format!(
                "prerequisite cycle: {}",
                cycle.join(" -> ")
            )));
        }

        Ok(Self {
            version,
            goals,
            positions,
        })
    }

    pub fn builtin() -> DomainResult<Self> {
        Self::from_yaml(BUILTIN_CATALOG)
    }

    pub fn from_yaml(yaml: &str) -> DomainResult<Self> {
        #[derive(Deserialize)]
        struct Raw {
            version: u32,
            goals: Vec<Goal>,
        }
        let raw: Raw = serde_yaml::from_str(yaml)?;
        Self::new(raw.version, raw.goals)
    }

    /// Goals in catalog order.
    pub fn goals(&self) -> &[Goal] {
        &self.goals
    }

    pub fn get(&self, id: &GoalId) -> Option<&Goal> {
        self.positions.get(id).map(|i| &self.goals[*i])
    }

    /// Catalog position, the final tie-break everywhere goals are ranked.
    pub fn position(&self, id: &GoalId) -> Option<usize> {
        self.positions.get(id).copied()
    }

    pub fn for_domain(&self, domain: Domain) -> impl Iterator<Item = &Goal> {
        self.goals.iter().filter(move |g| g.domain == domain)
    }

    pub fn len(&self) -> usize {
        self.goals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.goals.is_empty()
    }
}

pub type GoalCatalogRegistry = TableRegistry<GoalCatalog>;
