// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unit dependency graph: cycle detection and BFS layering.

use choo_core::Unit;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use thiserror::Error;

/// A dependency cycle across units. Fatal before dispatching any unit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("dependency cycle: {}", cycle.join(" -> "))]
pub struct CycleError {
    /// The cycle path, first node repeated at the end.
    pub cycle: Vec<String>,
}

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("duplicate unit id {id:?}")]
    DuplicateUnit { id: String },

    #[error(transparent)]
    Cycle(#[from] CycleError),
}

/// Directed graph over unit ids, edges pointing dependency → dependent.
#[derive(Debug, Clone)]
pub struct UnitGraph {
    /// Unit ids in insertion order.
    ids: Vec<String>,
    /// id → its dependencies.
    deps: BTreeMap<String, BTreeSet<String>>,
    /// id → units that depend on it.
    dependents: BTreeMap<String, BTreeSet<String>>,
    /// id → BFS level (0 = no dependencies).
    levels: HashMap<String, usize>,
}

impl UnitGraph {
    pub fn build(units: &[Unit]) -> Result<Self, GraphError> {
        let mut ids = Vec::with_capacity(units.len());
        let mut deps: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut dependents: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

        for unit in units {
            if deps.contains_key(&unit.id) {
                return Err(GraphError::DuplicateUnit { id: unit.id.clone() });
            }
            ids.push(unit.id.clone());
            deps.insert(unit.id.clone(), unit.depends_on.clone());
            dependents.entry(unit.id.clone()).or_default();
        }
        for unit in units {
            for dep in &unit.depends_on {
                dependents.entry(dep.clone()).or_default().insert(unit.id.clone());
            }
        }

        let mut graph = Self { ids, deps, dependents, levels: HashMap::new() };
        if let Some(cycle) = graph.find_cycle() {
            return Err(CycleError { cycle }.into());
        }
        graph.levels = graph.compute_levels();
        Ok(graph)
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn dependencies(&self, id: &str) -> impl Iterator<Item = &str> {
        self.deps.get(id).into_iter().flatten().map(String::as_str)
    }

    pub fn dependents(&self, id: &str) -> impl Iterator<Item = &str> {
        self.dependents.get(id).into_iter().flatten().map(String::as_str)
    }

    /// BFS level: 0 for units with no deps, otherwise one past the
    /// deepest dependency. Consumed by the web visualization and as the
    /// scheduler's primary tie-break.
    pub fn level(&self, id: &str) -> usize {
        self.levels.get(id).copied().unwrap_or(0)
    }

    /// Units grouped by level, ids sorted within each level.
    pub fn layers(&self) -> Vec<Vec<String>> {
        let Some(max) = self.levels.values().max().copied() else {
            return Vec::new();
        };
        let mut layers = vec![Vec::new(); max + 1];
        for id in &self.ids {
            layers[self.level(id)].push(id.clone());
        }
        for layer in &mut layers {
            layer.sort();
        }
        layers
    }

    /// All transitive dependents of `id`.
    pub fn descendants(&self, id: &str) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        let mut queue: VecDeque<&str> = self.dependents(id).collect();
        while let Some(next) = queue.pop_front() {
            if out.insert(next.to_string()) {
                queue.extend(self.dependents(next));
            }
        }
        out
    }

    fn compute_levels(&self) -> HashMap<String, usize> {
        let mut levels: HashMap<String, usize> = HashMap::new();
        let mut remaining: VecDeque<&String> = self.ids.iter().collect();
        // Acyclic by construction, so this terminates.
        while let Some(id) = remaining.pop_front() {
            let dep_levels: Option<Vec<usize>> = self
                .deps
                .get(id)
                .map(|deps| deps.iter().map(|d| levels.get(d).copied()).collect::<Option<_>>())
                .unwrap_or(Some(Vec::new()));
            match dep_levels {
                Some(resolved) => {
                    let level = resolved.iter().max().map(|m| m + 1).unwrap_or(0);
                    levels.insert(id.clone(), level);
                }
                None => remaining.push_back(id),
            }
        }
        levels
    }

    /// DFS three-color search; returns the cycle path when one exists.
    fn find_cycle(&self) -> Option<Vec<String>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            White,
            Grey,
            Black,
        }

        fn visit(
            id: &str,
            deps: &BTreeMap<String, BTreeSet<String>>,
            marks: &mut HashMap<String, Mark>,
            stack: &mut Vec<String>,
        ) -> Option<Vec<String>> {
            marks.insert(id.to_string(), Mark::Grey);
            stack.push(id.to_string());
            for dep in deps.get(id).into_iter().flatten() {
                match marks.get(dep.as_str()).copied().unwrap_or(Mark::White) {
                    Mark::Grey => {
                        let start = stack.iter().position(|x| x == dep).unwrap_or(0);
                        let mut cycle = stack[start..].to_vec();
                        cycle.push(dep.clone());
                        return Some(cycle);
                    }
                    Mark::White => {
                        if let Some(cycle) = visit(dep, deps, marks, stack) {
                            return Some(cycle);
                        }
                    }
                    Mark::Black => {}
                }
            }
            stack.pop();
            marks.insert(id.to_string(), Mark::Black);
            None
        }

        let mut marks = HashMap::new();
        for id in &self.ids {
            if marks.get(id.as_str()).copied().unwrap_or(Mark::White) == Mark::White {
                let mut stack = Vec::new();
                if let Some(cycle) = visit(id, &self.deps, &mut marks, &mut stack) {
                    return Some(cycle);
                }
            }
        }
        None
    }
}

#[cfg(test)]
#[path = "graph_tests.rs"]
mod tests;
