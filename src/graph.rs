//! Resource dependency graph.
//!
//! Resources live in an arena indexed by declaration order; key resources
//! are additionally indexed by path. Each resource depends on its nearest
//! ancestor key resource, if the working set has one. The edge direction
//! follows the ancestor's desired state: a present key is reconciled
//! before what lies below it, an absent key after.

use crate::path::RegistryPath;
use crate::resource::{Ensure, RegistryValueResource, Resource};
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone)]
struct Node {
    resource: Resource,
    owner: Option<usize>,
    dependencies: Vec<usize>,
    dependents: Vec<usize>,
}

/// Arena of resources with ordering edges.
#[derive(Debug, Clone, Default)]
pub struct ResourceGraph {
    nodes: Vec<Node>,
    keys: HashMap<RegistryPath, usize>,
}

impl ResourceGraph {
    /// Builds the graph for a working set, in declaration order.
    pub fn build(resources: &[Resource]) -> Self {
        let mut graph = Self::default();
        for resource in resources {
            graph.push(resource.clone(), None);
        }
        for index in 0..graph.nodes.len() {
            if let Some(owner) = graph.nearest_key(&graph.nodes[index].resource) {
                graph.link(owner, index);
            }
        }
        graph
    }

    /// Appends a resource owned by the key at `owner`, e.g. a value
    /// generated by purging. Returns its index.
    pub fn add_child(&mut self, owner: usize, resource: Resource) -> usize {
        let index = self.push(resource, Some(owner));
        self.link(owner, index);
        index
    }

    fn push(&mut self, resource: Resource, owner: Option<usize>) -> usize {
        let index = self.nodes.len();
        if let Resource::Key(key) = &resource {
            self.keys.entry(key.path.clone()).or_insert(index);
        }
        self.nodes.push(Node {
            resource,
            owner,
            dependencies: Vec::new(),
            dependents: Vec::new(),
        });
        index
    }

    fn nearest_key(&self, resource: &Resource) -> Option<usize> {
        let mut candidate = resource.owner_path();
        while let Some(path) = candidate {
            if let Some(&index) = self.keys.get(&path) {
                return Some(index);
            }
            candidate = path.parent();
        }
        None
    }

    fn link(&mut self, owner: usize, child: usize) {
        self.nodes[child].owner = Some(owner);
        let (first, then) = match self.nodes[owner].resource.ensure() {
            Ensure::Present => (owner, child),
            Ensure::Absent => (child, owner),
        };
        self.nodes[then].dependencies.push(first);
        self.nodes[first].dependents.push(then);
    }

    /// Number of resources.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the graph holds no resources.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The resource at `index`.
    pub fn resource(&self, index: usize) -> &Resource {
        &self.nodes[index].resource
    }

    /// Index of the nearest ancestor key resource.
    pub fn owner(&self, index: usize) -> Option<usize> {
        self.nodes[index].owner
    }

    /// Resources that must be reconciled before the one at `index`.
    pub fn dependencies(&self, index: usize) -> &[usize] {
        &self.nodes[index].dependencies
    }

    /// Resources that must be reconciled after the one at `index`.
    pub fn dependents(&self, index: usize) -> &[usize] {
        &self.nodes[index].dependents
    }

    /// Index of the key resource declared at `path`.
    pub fn key_index(&self, path: &RegistryPath) -> Option<usize> {
        self.keys.get(path).copied()
    }

    /// Value resources held directly by the key at `index`.
    pub fn values_of(&self, index: usize) -> Vec<&RegistryValueResource> {
        let key_path = self.nodes[index].resource.path();
        self.nodes
            .iter()
            .filter_map(|node| match &node.resource {
                Resource::Value(value) if value.key_path() == *key_path => Some(value),
                _ => None,
            })
            .collect()
    }
}

/// Kahn's algorithm over a [`ResourceGraph`] that may grow while it runs.
///
/// Among ready resources the lowest index goes first, so the order is the
/// declaration order wherever the edges allow it.
#[derive(Debug, Clone, Default)]
pub struct Schedule {
    waiting: Vec<usize>,
    done: Vec<bool>,
    ready: BTreeSet<usize>,
}

impl Schedule {
    /// Starts scheduling every resource of `graph`.
    pub fn new(graph: &ResourceGraph) -> Self {
        let mut schedule = Self::default();
        for index in 0..graph.len() {
            schedule.track(graph, index);
        }
        schedule
    }

    /// Adds a resource appended to the graph after the schedule started.
    pub fn track(&mut self, graph: &ResourceGraph, index: usize) {
        if self.waiting.len() <= index {
            self.waiting.resize(index + 1, 0);
            self.done.resize(index + 1, false);
        }
        let waiting = graph
            .dependencies(index)
            .iter()
            .filter(|&&dependency| !self.done.get(dependency).copied().unwrap_or(false))
            .count();
        self.waiting[index] = waiting;
        if waiting == 0 {
            self.ready.insert(index);
        }
    }

    /// Takes the next ready resource.
    pub fn next(&mut self) -> Option<usize> {
        self.ready.pop_first()
    }

    /// Marks a resource finished, releasing its dependents.
    pub fn complete(&mut self, graph: &ResourceGraph, index: usize) {
        self.done[index] = true;
        for &dependent in graph.dependents(index) {
            if self.done[dependent] || self.waiting[dependent] == 0 {
                continue;
            }
            self.waiting[dependent] -= 1;
            if self.waiting[dependent] == 0 {
                self.ready.insert(dependent);
            }
        }
    }

    /// Resources that never became ready.
    pub fn unfinished(&self) -> Vec<usize> {
        (0..self.done.len())
            .filter(|&index| !self.done[index] && !self.ready.contains(&index))
            .collect()
    }

    /// Full order for a graph that does not change, as a convenience for
    /// planning and tests.
    pub fn order(graph: &ResourceGraph) -> Vec<usize> {
        let mut schedule = Self::new(graph);
        let mut order = Vec::with_capacity(graph.len());
        while let Some(index) = schedule.next() {
            schedule.complete(graph, index);
            order.push(index);
        }
        order
    }
}
