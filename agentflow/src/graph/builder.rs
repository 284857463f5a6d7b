//! Graph builder with validation.

use super::engine::GraphEngine;
use super::step::{EndStep, Step};
use super::END;
use crate::errors::{ContractErrorInfo, CycleDetectedError, PipelineValidationError};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Builder for a validated [`GraphEngine`].
#[derive(Debug, Clone)]
pub struct GraphBuilder {
    name: String,
    /// Nodes in insertion order.
    nodes: Vec<(String, Arc<dyn Step>)>,
    edges: Vec<(String, String)>,
    entry_point: Option<String>,
}

impl GraphBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
            edges: Vec::new(),
            entry_point: None,
        }
    }

    /// Adds a named step.
    ///
    /// # Errors
    ///
    /// Returns an error if a step with the same name was already added.
    pub fn add_node(
        mut self,
        name: impl Into<String>,
        step: Arc<dyn Step>,
    ) -> Result<Self, PipelineValidationError> {
        let name = name.into();
        if self.has_node(&name) {
            return Err(PipelineValidationError::new(format!(
                "Step '{name}' is already defined in graph '{}'",
                self.name
            ))
            .with_steps(vec![name.clone()])
            .with_error_info(
                ContractErrorInfo::new("GRAPH-DUPLICATE-NODE", format!("Duplicate step '{name}'"))
                    .with_fix_hint("Give every step in a graph a unique name."),
            ));
        }
        self.nodes.push((name, step));
        Ok(self)
    }

    /// Declares that `to` runs after `from`. Both names are checked at build time.
    #[must_use]
    pub fn add_edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        let edge = (from.into(), to.into());
        if !self.edges.contains(&edge) {
            self.edges.push(edge);
        }
        self
    }

    /// Names the expected entry step. Build fails if it is not the inferred entry.
    #[must_use]
    pub fn with_entry_point(mut self, name: impl Into<String>) -> Self {
        self.entry_point = Some(name.into());
        self
    }

    /// Returns the graph name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of steps added so far.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Validates the graph and computes its execution order.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph is empty, an edge names an unknown step, the
    /// terminal step has outgoing edges, the graph has a cycle, or there is not
    /// exactly one entry step.
    pub fn build(mut self) -> Result<GraphEngine, PipelineValidationError> {
        if self.nodes.is_empty() {
            return Err(PipelineValidationError::new(format!("Graph '{}' has no steps", self.name))
                .with_error_info(
                    ContractErrorInfo::new("GRAPH-EMPTY", "Cannot build an empty graph")
                        .with_fix_hint("Add at least one step before building."),
                ));
        }

        if !self.has_node(END) && self.edges.iter().any(|(_, to)| to == END) {
            self.nodes.push((END.to_string(), Arc::new(EndStep)));
        }

        self.check_edges()?;
        self.detect_cycles()?;
        // Acyclic with a single entry means every step is reachable from it.
        let entry = self.find_entry()?;

        let order = self.topological_order();
        let mut steps: HashMap<String, Arc<dyn Step>> = self.nodes.into_iter().collect();
        let ordered = order
            .into_iter()
            .filter_map(|name| steps.remove(&name).map(|step| (name, step)))
            .collect();

        Ok(GraphEngine::new(self.name, entry, ordered, self.edges))
    }

    fn has_node(&self, name: &str) -> bool {
        self.nodes.iter().any(|(n, _)| n == name)
    }

    fn successors<'a>(&'a self, node: &str) -> impl Iterator<Item = &'a str> + 'a {
        let node = node.to_string();
        self.edges
            .iter()
            .filter(move |(from, _)| *from == node)
            .map(|(_, to)| to.as_str())
    }

    fn check_edges(&self) -> Result<(), PipelineValidationError> {
        for (from, to) in &self.edges {
            for endpoint in [from, to] {
                if !self.has_node(endpoint) {
                    return Err(PipelineValidationError::new(format!(
                        "Edge '{from}' -> '{to}' references unknown step '{endpoint}'"
                    ))
                    .with_steps(vec![from.clone(), to.clone()])
                    .with_error_info(
                        ContractErrorInfo::new(
                            "GRAPH-MISSING-NODE",
                            format!("Step '{endpoint}' not found"),
                        )
                        .with_fix_hint("Add the step with add_node before building."),
                    ));
                }
            }
            if from == END {
                return Err(PipelineValidationError::new(format!(
                    "The terminal step cannot have outgoing edges ('{from}' -> '{to}')"
                ))
                .with_steps(vec![from.clone(), to.clone()])
                .with_error_info(
                    ContractErrorInfo::new("GRAPH-END", "Terminal step has a successor")
                        .with_fix_hint("Remove edges leaving the terminal step."),
                ));
            }
        }
        Ok(())
    }

    /// Detects cycles in the edge set.
    fn detect_cycles(&self) -> Result<(), CycleDetectedError> {
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();
        let mut path = Vec::new();

        for (name, _) in &self.nodes {
            if !visited.contains(name.as_str()) {
                if let Some(cycle) = self.dfs_cycle(name, &mut visited, &mut rec_stack, &mut path)
                {
                    return Err(CycleDetectedError::new(cycle));
                }
            }
        }

        Ok(())
    }

    fn dfs_cycle(
        &self,
        node: &str,
        visited: &mut HashSet<String>,
        rec_stack: &mut HashSet<String>,
        path: &mut Vec<String>,
    ) -> Option<Vec<String>> {
        visited.insert(node.to_string());
        rec_stack.insert(node.to_string());
        path.push(node.to_string());

        for next in self.successors(node) {
            if !visited.contains(next) {
                if let Some(cycle) = self.dfs_cycle(next, visited, rec_stack, path) {
                    return Some(cycle);
                }
            } else if rec_stack.contains(next) {
                let start = path.iter().position(|n| n == next).unwrap_or(0);
                let mut cycle = path[start..].to_vec();
                cycle.push(next.to_string());
                return Some(cycle);
            }
        }

        path.pop();
        rec_stack.remove(node);
        None
    }

    fn find_entry(&self) -> Result<String, PipelineValidationError> {
        let targets: HashSet<&str> = self.edges.iter().map(|(_, to)| to.as_str()).collect();
        let entries: Vec<String> = self
            .nodes
            .iter()
            .map(|(name, _)| name.clone())
            .filter(|name| !targets.contains(name.as_str()))
            .collect();

        let entry = match entries.as_slice() {
            [single] => single.clone(),
            _ => {
                return Err(PipelineValidationError::new(format!(
                    "Graph '{}' must have exactly one entry step, found {}",
                    self.name,
                    entries.len()
                ))
                .with_steps(entries)
                .with_error_info(
                    ContractErrorInfo::new("GRAPH-ENTRY", "Ambiguous or missing entry step")
                        .with_fix_hint("Connect every step except the first to a predecessor."),
                ));
            }
        };

        if let Some(expected) = &self.entry_point {
            if *expected != entry {
                return Err(PipelineValidationError::new(format!(
                    "Declared entry '{expected}' differs from inferred entry '{entry}'"
                ))
                .with_steps(vec![expected.clone(), entry])
                .with_error_info(
                    ContractErrorInfo::new("GRAPH-ENTRY", "Declared entry is not the entry step")
                        .with_fix_hint("Remove edges into the declared entry or fix its name."),
                ));
            }
        }

        Ok(entry)
    }

    /// Kahn's algorithm; ties go to the earlier-inserted step. The terminal step runs last.
    fn topological_order(&self) -> Vec<String> {
        let position: HashMap<&str, usize> = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, (name, _))| (name.as_str(), i))
            .collect();
        let mut in_degree: Vec<usize> = vec![0; self.nodes.len()];
        for (_, to) in &self.edges {
            if let Some(&i) = position.get(to.as_str()) {
                in_degree[i] += 1;
            }
        }

        let mut ready: Vec<usize> = (0..self.nodes.len()).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(self.nodes.len());
        while !ready.is_empty() {
            ready.sort_unstable();
            let current = ready.remove(0);
            let name = self.nodes[current].0.as_str();
            order.push(name.to_string());
            for next in self.successors(name) {
                if let Some(&i) = position.get(next) {
                    in_degree[i] -= 1;
                    if in_degree[i] == 0 {
                        ready.push(i);
                    }
                }
            }
        }

        if let Some(end) = order.iter().position(|n| n == END) {
            let end = order.remove(end);
            order.push(end);
        }
        order
    }
}
