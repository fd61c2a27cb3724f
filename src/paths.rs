use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::debug;
use crate::errors::{GroundingError, GroundingResult};
use crate::graph::{BranchIndex, BusIndex, NetworkGraph};
use crate::network::Network;

/// One parallel group crossed by a path, oriented from the source side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathSegment {
    pub from_bus: String,
    pub to_bus: String,
    pub branches: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Path {
    pub name: String,
    pub source: String,
    pub fault: String,
    pub segments: Vec<PathSegment>,
}

impl Path {
    pub fn name_for(source: &str, fault: &str) -> String {
        format!("{source}->{fault}")
    }

    /// Resolves the path from a named source to a named fault.
    pub fn between(network: &Network, source: &str, fault: &str) -> GroundingResult<Self> {
        let source_bus = &network
            .source(source)
            .ok_or_else(|| GroundingError::not_found("source", source))?
            .bus;
        let fault_bus = &network
            .fault(fault)
            .ok_or_else(|| GroundingError::not_found("fault", fault))?
            .bus;
        Ok(Self {
            name: Self::name_for(source, fault),
            source: source.to_string(),
            fault: fault.to_string(),
            segments: resolve(network.graph(), source_bus, fault_bus)?,
        })
    }

    /// True when source and fault sit on the same bus.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn branches(&self) -> impl Iterator<Item = &str> {
        self.segments
            .iter()
            .flat_map(|segment| segment.branches.iter().map(String::as_str))
    }
}

/// Breadth-first search from `source_bus` to `fault_bus`, one step per
/// parallel group, so the route with the fewest groups wins. Equal-length
/// routes resolve to the one reached through the lowest branch name.
pub fn resolve(graph: &NetworkGraph, source_bus: &str, fault_bus: &str) -> GroundingResult<Vec<PathSegment>> {
    let start = graph
        .bus_index(source_bus)
        .ok_or_else(|| GroundingError::not_found("bus", source_bus))?;
    let goal = graph
        .bus_index(fault_bus)
        .ok_or_else(|| GroundingError::not_found("bus", fault_bus))?;
    if start == goal {
        return Ok(Vec::new());
    }

    let mut previous: HashMap<BusIndex, (BusIndex, Vec<BranchIndex>)> = HashMap::new();
    let mut visited = HashSet::from([start]);
    let mut queue = VecDeque::from([start]);
    while let Some(bus) = queue.pop_front() {
        if bus == goal {
            break;
        }
        for (next, group) in graph.neighbours(bus) {
            if visited.insert(next) {
                previous.insert(next, (bus, group));
                queue.push_back(next);
            }
        }
    }

    if !visited.contains(&goal) {
        return Err(GroundingError::Unreachable {
            from: source_bus.to_string(),
            to: fault_bus.to_string(),
        });
    }

    let mut segments = Vec::new();
    let mut bus = goal;
    while let Some((prev, group)) = previous.remove(&bus) {
        segments.push(PathSegment {
            from_bus: graph.bus(prev).name.clone(),
            to_bus: graph.bus(bus).name.clone(),
            branches: group.iter().map(|&b| graph.branch(b).name.clone()).collect(),
        });
        bus = prev;
    }
    segments.reverse();
    debug!(source_bus, fault_bus, segments = segments.len(), "resolved path");
    Ok(segments)
}
