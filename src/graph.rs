use std::collections::HashMap;
use crate::errors::{GroundingError, GroundingResult};

pub type BusIndex = usize;
pub type BranchIndex = usize;

#[derive(Debug, Clone)]
pub struct BusNode {
    pub name: String,
    pub degree: usize,
}

#[derive(Debug, Clone)]
pub struct BranchEdge {
    pub name: String,
    pub nodes: (BusIndex, BusIndex),
}

impl BranchEdge {
    /// Endpoint pair with the smaller index first; parallel branches share it.
    pub fn key(&self) -> (BusIndex, BusIndex) {
        let (a, b) = self.nodes;
        (a.min(b), a.max(b))
    }

    pub fn other_end(&self, bus: BusIndex) -> BusIndex {
        match self.nodes.0 == bus {
            true => self.nodes.1,
            false => self.nodes.0,
        }
    }
}

/// Branches sharing one unordered bus pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParallelGroup {
    pub buses: (BusIndex, BusIndex),
    pub branches: Vec<BranchIndex>,
}

/// Index arena over buses and branches. Adding never invalidates existing indices.
#[derive(Debug, Clone, Default)]
pub struct NetworkGraph {
    pub nodes: Vec<BusNode>,
    pub edges: Vec<BranchEdge>,
    adjacency: Vec<Vec<BranchIndex>>,
    bus_lookup: HashMap<String, BusIndex>,
    branch_lookup: HashMap<String, BranchIndex>,
}

impl NetworkGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a graph from bus names and `(branch, from, to)` triples.
    pub fn build<'a>(
        buses: impl IntoIterator<Item = &'a str>,
        branches: impl IntoIterator<Item = (&'a str, &'a str, &'a str)>,
    ) -> GroundingResult<Self> {
        let mut graph = Self::new();
        for bus in buses {
            graph.add_bus(bus);
        }
        for (name, from, to) in branches {
            graph.add_branch(name, from, to)?;
        }
        Ok(graph)
    }

    pub fn add_bus(&mut self, name: &str) -> BusIndex {
        if let Some(&idx) = self.bus_lookup.get(name) {
            return idx;
        }
        let idx = self.nodes.len();
        self.nodes.push(BusNode {
            name: name.to_string(),
            degree: 0,
        });
        self.adjacency.push(Vec::new());
        self.bus_lookup.insert(name.to_string(), idx);
        idx
    }

    pub fn add_branch(&mut self, name: &str, from: &str, to: &str) -> GroundingResult<BranchIndex> {
        let lookup = |bus: &str| {
            self.bus_index(bus).ok_or_else(|| GroundingError::UnknownBus {
                entity: "Branch",
                name: name.to_string(),
                bus: bus.to_string(),
            })
        };
        let nodes = (lookup(from)?, lookup(to)?);

        let idx = self.edges.len();
        self.nodes[nodes.0].degree += 1;
        self.nodes[nodes.1].degree += 1;
        self.adjacency[nodes.0].push(idx);
        if nodes.1 != nodes.0 {
            self.adjacency[nodes.1].push(idx);
        }
        self.edges.push(BranchEdge {
            name: name.to_string(),
            nodes,
        });
        self.branch_lookup.insert(name.to_string(), idx);
        Ok(idx)
    }

    pub fn bus_index(&self, name: &str) -> Option<BusIndex> {
        self.bus_lookup.get(name).copied()
    }

    pub fn branch_index(&self, name: &str) -> Option<BranchIndex> {
        self.branch_lookup.get(name).copied()
    }

    pub fn bus(&self, idx: BusIndex) -> &BusNode {
        &self.nodes[idx]
    }

    pub fn branch(&self, idx: BranchIndex) -> &BranchEdge {
        &self.edges[idx]
    }

    pub fn connections_at(&self, idx: BusIndex) -> &[BranchIndex] {
        &self.adjacency[idx]
    }

    /// Names of the branches touching `bus`, in the order they were added.
    pub fn incident_branches(&self, bus: &str) -> Vec<&str> {
        self.bus_index(bus)
            .map(|idx| {
                self.connections_at(idx)
                    .iter()
                    .map(|&b| self.edges[b].name.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn endpoints(&self, branch: &str) -> Option<(&str, &str)> {
        self.branch_index(branch).map(|idx| {
            let (a, b) = self.edges[idx].nodes;
            (self.nodes[a].name.as_str(), self.nodes[b].name.as_str())
        })
    }

    /// Every branch on the same unordered bus pair as `branch`, itself included, by name.
    pub fn parallel_group(&self, branch: &str) -> Vec<&str> {
        let Some(idx) = self.branch_index(branch) else {
            return Vec::new();
        };
        let key = self.edges[idx].key();
        let mut members: Vec<&str> = self.connections_at(key.0)
            .iter()
            .filter(|&&b| self.edges[b].key() == key)
            .map(|&b| self.edges[b].name.as_str())
            .collect();
        members.sort_unstable();
        members
    }

    pub fn parallel_groups(&self) -> Vec<ParallelGroup> {
        let mut groups: HashMap<(BusIndex, BusIndex), Vec<BranchIndex>> = HashMap::new();
        for (idx, edge) in self.edges.iter().enumerate() {
            groups.entry(edge.key()).or_default().push(idx);
        }
        let mut groups: Vec<ParallelGroup> = groups
            .into_iter()
            .map(|(buses, branches)| ParallelGroup {
                buses,
                branches: self.sorted_by_name(branches),
            })
            .collect();
        groups.sort_by(|a, b| self.edges[a.branches[0]].name.cmp(&self.edges[b.branches[0]].name));
        groups
    }

    /// Adjacent buses of `bus` with the branch group reaching each. Groups
    /// are ordered by their first branch name so traversal is reproducible
    /// however the graph was assembled. Self-loops are skipped.
    pub fn neighbours(&self, bus: BusIndex) -> Vec<(BusIndex, Vec<BranchIndex>)> {
        let mut by_bus: HashMap<BusIndex, Vec<BranchIndex>> = HashMap::new();
        for &b in self.connections_at(bus) {
            let other = self.edges[b].other_end(bus);
            if other != bus {
                by_bus.entry(other).or_default().push(b);
            }
        }
        let mut neighbours: Vec<(BusIndex, Vec<BranchIndex>)> = by_bus
            .into_iter()
            .map(|(other, branches)| (other, self.sorted_by_name(branches)))
            .collect();
        neighbours.sort_by(|a, b| self.edges[a.1[0]].name.cmp(&self.edges[b.1[0]].name));
        neighbours
    }

    fn sorted_by_name(&self, mut branches: Vec<BranchIndex>) -> Vec<BranchIndex> {
        branches.sort_by(|&a, &b| self.edges[a].name.cmp(&self.edges[b].name));
        branches
    }
}
