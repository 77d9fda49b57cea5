//! Dependency graph over composite assertions
//!
//! A composite depends on every bare member that is itself asserted as a
//! composite in the same scope. Kahn's algorithm assigns each assertion a
//! depth; assertions of equal depth form one batch:
//! 1. Batch 0 holds composites whose members are all plain roles
//! 2. Batch n holds composites whose deepest composite member sits in batch n-1
//! 3. Anything left unvisited lies on a cycle and is reported by DFS

use super::types::CompositeAssertion;
use std::collections::{HashMap, VecDeque};
use thiserror::Error;
use tracing::warn;

/// Graph-related errors
#[derive(Debug, Error, PartialEq)]
pub enum GraphError {
    /// Composite roles contain each other
    #[error("Circular composite dependency: {0}")]
    CircularDependency(String),

    /// Malformed assertion
    #[error("Invalid composite: {0}")]
    InvalidComposite(String),
}

#[derive(Debug, Clone)]
struct GraphNode {
    /// Position in the assertion list
    index: usize,

    /// Composite members this node must wait for
    dependencies: Vec<String>,
}

/// Composite assertions of one scope, batched by dependency depth
#[derive(Debug, Clone, Default)]
pub struct CompositePlan {
    assertions: Vec<CompositeAssertion>,
    batches: Vec<Vec<usize>>,
}

impl CompositePlan {
    /// Build the plan
    ///
    /// Repeated assertions for the same name collapse into the last one.
    ///
    /// # Errors
    ///
    /// Returns an error if an assertion is malformed or composites form a cycle.
    pub fn build(assertions: Vec<CompositeAssertion>) -> Result<Self, GraphError> {
        let assertions = Self::collapse_duplicates(assertions)?;

        let names: HashMap<&str, usize> = assertions
            .iter()
            .enumerate()
            .map(|(idx, a)| (a.name.as_str(), idx))
            .collect();

        let nodes: Vec<GraphNode> = assertions
            .iter()
            .enumerate()
            .map(|(index, assertion)| {
                let mut dependencies: Vec<String> = Vec::new();
                for member in assertion.local_members() {
                    if names.contains_key(member) && !dependencies.iter().any(|d| d == member) {
                        dependencies.push(member.to_string());
                    }
                }
                GraphNode {
                    index,
                    dependencies,
                }
            })
            .collect();

        let batches = Self::layer(&assertions, &nodes, &names)?;

        Ok(Self {
            assertions,
            batches,
        })
    }

    fn collapse_duplicates(
        assertions: Vec<CompositeAssertion>,
    ) -> Result<Vec<CompositeAssertion>, GraphError> {
        let mut collapsed: Vec<CompositeAssertion> = Vec::with_capacity(assertions.len());
        let mut seen: HashMap<String, usize> = HashMap::new();

        for assertion in assertions {
            assertion
                .validate()
                .map_err(GraphError::InvalidComposite)?;

            match seen.get(&assertion.name) {
                Some(&idx) => {
                    if collapsed[idx].members != assertion.members {
                        warn!(
                            "Composite {} declared more than once, keeping the last declaration",
                            assertion.name
                        );
                    }
                    collapsed[idx] = assertion;
                }
                None => {
                    seen.insert(assertion.name.clone(), collapsed.len());
                    collapsed.push(assertion);
                }
            }
        }

        Ok(collapsed)
    }

    /// Kahn's algorithm, processed level by level
    fn layer(
        assertions: &[CompositeAssertion],
        nodes: &[GraphNode],
        names: &HashMap<&str, usize>,
    ) -> Result<Vec<Vec<usize>>, GraphError> {
        let mut in_degree: Vec<usize> = nodes.iter().map(|n| n.dependencies.len()).collect();
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
        for node in nodes {
            for dep in &node.dependencies {
                dependents[names[dep.as_str()]].push(node.index);
            }
        }

        let mut current: VecDeque<usize> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, degree)| **degree == 0)
            .map(|(idx, _)| idx)
            .collect();

        let mut batches = Vec::new();
        let mut visited = 0;

        while !current.is_empty() {
            let mut batch: Vec<usize> = current.drain(..).collect();
            batch.sort_unstable();
            visited += batch.len();

            for &idx in &batch {
                for &dependent in &dependents[idx] {
                    in_degree[dependent] -= 1;
                    if in_degree[dependent] == 0 {
                        current.push_back(dependent);
                    }
                }
            }

            batches.push(batch);
        }

        if visited != nodes.len() {
            let cycle = Self::find_cycle(assertions, nodes, names)
                .unwrap_or_else(|| "unknown cycle".to_string());
            return Err(GraphError::CircularDependency(cycle));
        }

        Ok(batches)
    }

    /// DFS with three colours; returns the first cycle as `a -> b -> a`
    fn find_cycle(
        assertions: &[CompositeAssertion],
        nodes: &[GraphNode],
        names: &HashMap<&str, usize>,
    ) -> Option<String> {
        // 0 = unvisited, 1 = on stack, 2 = done
        let mut state = vec![0u8; nodes.len()];
        let mut path: Vec<usize> = Vec::new();

        for start in 0..nodes.len() {
            if state[start] == 0 {
                if let Some(cycle) = Self::dfs(start, nodes, names, &mut state, &mut path) {
                    return Some(
                        cycle
                            .iter()
                            .map(|&idx| assertions[idx].name.as_str())
                            .collect::<Vec<_>>()
                            .join(" -> "),
                    );
                }
            }
        }
        None
    }

    fn dfs(
        node: usize,
        nodes: &[GraphNode],
        names: &HashMap<&str, usize>,
        state: &mut [u8],
        path: &mut Vec<usize>,
    ) -> Option<Vec<usize>> {
        match state[node] {
            1 => {
                let start = path.iter().position(|&n| n == node)?;
                let mut cycle = path[start..].to_vec();
                cycle.push(node);
                return Some(cycle);
            }
            2 => return None,
            _ => {}
        }

        state[node] = 1;
        path.push(node);

        for dep in &nodes[node].dependencies {
            if let Some(cycle) = Self::dfs(names[dep.as_str()], nodes, names, state, path) {
                return Some(cycle);
            }
        }

        state[node] = 2;
        path.pop();
        None
    }

    /// Assertions grouped by depth, members before the composites holding them
    pub fn batches(&self) -> Vec<Vec<&CompositeAssertion>> {
        self.batches
            .iter()
            .map(|batch| batch.iter().map(|&idx| &self.assertions[idx]).collect())
            .collect()
    }

    /// All assertions in emission order, duplicates collapsed
    pub fn assertions(&self) -> &[CompositeAssertion] {
        &self.assertions
    }

    pub fn is_empty(&self) -> bool {
        self.assertions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.assertions.len()
    }
}
