//! The network: name-keyed buses, branches, sources and faults, with the
//! cached paths and per-fault results derived from them.
//!
//! The index graph is built on first use and then kept up to date as
//! buses and branches are added. Removing either drops it, and it is
//! rebuilt on the next access. Any topology change clears the path cache.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;
use tracing::{debug, warn};
use crate::component::{Branch, BranchType, Bus, BusType, Fault, Source};
use crate::errors::{ErrorKind, GroundingError, GroundingResult};
use crate::graph::NetworkGraph;
use crate::paths::Path;
use crate::result::FaultResult;
use crate::units::Frequency;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Network {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    frequencies: Vec<Frequency>,
    buses: BTreeMap<String, Bus>,
    branches: BTreeMap<String, Branch>,
    sources: BTreeMap<String, Source>,
    faults: BTreeMap<String, Fault>,
    #[serde(default)]
    paths: BTreeMap<String, Path>,
    #[serde(default)]
    results: BTreeMap<String, FaultResult>,
    #[serde(default)]
    active_fault: Option<String>,
    #[serde(skip)]
    graph: OnceLock<NetworkGraph>,
}

impl Network {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Builds `bus1..busN` joined in series by `branch1..branchN-1`, every
    /// element on the same type and resistivity.
    pub fn chain(
        name: &str,
        frequencies: &[f64],
        number_buses: usize,
        bus_type: &BusType,
        branch_type: &BranchType,
        branch_lengths: &[f64],
        specific_earth_resistance: f64,
    ) -> GroundingResult<Self> {
        let needed = number_buses.saturating_sub(1);
        if branch_lengths.len() < needed {
            return Err(GroundingError::MissingBranchLengths {
                needed,
                supplied: branch_lengths.len(),
            });
        }

        let mut network = Self::new(name);
        network.set_frequencies(frequencies)?;
        for i in 1..=number_buses {
            network.add_bus(Bus::new(&format!("bus{i}"), bus_type.clone(), specific_earth_resistance))?;
        }
        for (i, &length) in branch_lengths.iter().take(needed).enumerate() {
            network.add_branch(Branch::new(
                &format!("branch{}", i + 1),
                branch_type.clone(),
                &format!("bus{}", i + 1),
                &format!("bus{}", i + 2),
                length,
                specific_earth_resistance,
            ))?;
        }
        Ok(network)
    }

    /// Replaces the analysis frequencies. Sorted ascending, duplicates dropped.
    pub fn set_frequencies(&mut self, frequencies: &[f64]) -> GroundingResult<()> {
        if frequencies.is_empty() {
            return Err(GroundingError::EmptyFrequencies);
        }
        let mut frequencies = Frequency::list(frequencies)?;
        frequencies.sort();
        frequencies.dedup();
        self.frequencies = frequencies;
        Ok(())
    }

    pub fn frequencies(&self) -> &[Frequency] {
        &self.frequencies
    }

    pub fn graph(&self) -> &NetworkGraph {
        self.graph.get_or_init(|| {
            let mut graph = NetworkGraph::new();
            for name in self.buses.keys() {
                graph.add_bus(name);
            }
            for branch in self.branches.values() {
                if let Err(e) = graph.add_branch(&branch.name, &branch.from_bus, &branch.to_bus) {
                    warn!(error = %e, "branch left out of network graph");
                }
            }
            graph
        })
    }

    fn topology_changed(&mut self) {
        self.paths.clear();
    }

    fn reset_graph(&mut self) {
        self.graph = OnceLock::new();
        self.topology_changed();
    }

    fn require_bus(&self, entity: &'static str, name: &str, bus: &str) -> GroundingResult<()> {
        match self.buses.contains_key(bus) {
            true => Ok(()),
            false => Err(GroundingError::UnknownBus {
                entity,
                name: name.to_string(),
                bus: bus.to_string(),
            }),
        }
    }

    pub fn add_bus(&mut self, bus: Bus) -> GroundingResult<()> {
        if self.buses.contains_key(&bus.name) {
            return Err(GroundingError::DuplicateName {
                kind: "bus",
                name: bus.name,
            });
        }
        if let Some(graph) = self.graph.get_mut() {
            graph.add_bus(&bus.name);
        }
        self.buses.insert(bus.name.clone(), bus);
        self.topology_changed();
        Ok(())
    }

    pub fn add_branch(&mut self, branch: Branch) -> GroundingResult<()> {
        if self.branches.contains_key(&branch.name) {
            return Err(GroundingError::DuplicateName {
                kind: "branch",
                name: branch.name,
            });
        }
        self.require_bus("Branch", &branch.name, &branch.from_bus)?;
        self.require_bus("Branch", &branch.name, &branch.to_bus)?;
        if let Some(graph) = self.graph.get_mut() {
            graph.add_branch(&branch.name, &branch.from_bus, &branch.to_bus)?;
        }
        self.branches.insert(branch.name.clone(), branch);
        self.topology_changed();
        Ok(())
    }

    pub fn remove_branch(&mut self, name: &str) -> GroundingResult<Branch> {
        let branch = self
            .branches
            .remove(name)
            .ok_or_else(|| GroundingError::not_found("branch", name))?;
        self.reset_graph();
        Ok(branch)
    }

    /// Refused while any branch, source or fault still sits on the bus.
    pub fn remove_bus(&mut self, name: &str) -> GroundingResult<Bus> {
        if !self.buses.contains_key(name) {
            return Err(GroundingError::not_found("bus", name));
        }
        let referrer = self
            .branches
            .values()
            .find(|b| b.from_bus == name || b.to_bus == name)
            .map(|b| ("branch", &b.name))
            .or_else(|| self.sources.values().find(|s| s.bus == name).map(|s| ("source", &s.name)))
            .or_else(|| self.faults.values().find(|f| f.bus == name).map(|f| ("fault", &f.name)));
        if let Some((entity, referrer)) = referrer {
            return Err(GroundingError::BusInUse {
                bus: name.to_string(),
                entity,
                name: referrer.clone(),
            });
        }
        let bus = self
            .buses
            .remove(name)
            .ok_or_else(|| GroundingError::not_found("bus", name))?;
        self.reset_graph();
        Ok(bus)
    }

    pub fn add_source(&mut self, source: Source) -> GroundingResult<()> {
        if self.sources.contains_key(&source.name) {
            return Err(GroundingError::DuplicateName {
                kind: "source",
                name: source.name,
            });
        }
        self.require_bus("Source", &source.name, &source.bus)?;
        self.sources.insert(source.name.clone(), source);
        Ok(())
    }

    /// Faults are always added inactive; see [`Network::set_active_fault`].
    pub fn add_fault(&mut self, mut fault: Fault) -> GroundingResult<()> {
        if self.faults.contains_key(&fault.name) {
            return Err(GroundingError::DuplicateName {
                kind: "fault",
                name: fault.name,
            });
        }
        self.require_bus("Fault", &fault.name, &fault.bus)?;
        fault.set_active(false);
        self.faults.insert(fault.name.clone(), fault);
        Ok(())
    }

    /// Activates `name` and deactivates every other fault.
    pub fn set_active_fault(&mut self, name: &str) -> GroundingResult<()> {
        if !self.faults.contains_key(name) {
            return Err(GroundingError::not_found("fault", name));
        }
        for (fault_name, fault) in self.faults.iter_mut() {
            fault.set_active(fault_name == name);
        }
        self.active_fault = Some(name.to_string());
        Ok(())
    }

    pub fn active_fault(&self) -> Option<&Fault> {
        self.active_fault.as_deref().and_then(|name| self.faults.get(name))
    }

    /// Cached path for `(source, fault)`, resolving and caching it on a miss.
    pub fn path_between(&mut self, source: &str, fault: &str) -> GroundingResult<&Path> {
        let name = Path::name_for(source, fault);
        if !self.paths.contains_key(&name) {
            let path = Path::between(self, source, fault)?;
            self.paths.insert(name.clone(), path);
        }
        self.paths
            .get(&name)
            .ok_or_else(|| GroundingError::not_found("path", &name))
    }

    /// Resolves and caches a path for every (source, fault) pair. Pairs with
    /// no connection are skipped and returned.
    pub fn define_paths(&mut self) -> GroundingResult<Vec<GroundingError>> {
        let pairs: Vec<(String, String)> = self
            .sources
            .keys()
            .flat_map(|source| self.faults.keys().map(move |fault| (source.clone(), fault.clone())))
            .collect();
        let mut skipped = Vec::new();
        for (source, fault) in pairs {
            match self.path_between(&source, &fault) {
                Ok(path) => debug!(path = %path.name, segments = path.segments.len(), "path defined"),
                Err(e) if e.kind() == ErrorKind::Connectivity => {
                    warn!(source = %source, fault = %fault, "no path between source and fault");
                    skipped.push(e);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(skipped)
    }

    pub fn path(&self, name: &str) -> Option<&Path> {
        self.paths.get(name)
    }

    pub fn paths(&self) -> &BTreeMap<String, Path> {
        &self.paths
    }

    pub fn result(&self, fault: &str) -> Option<&FaultResult> {
        self.results.get(fault)
    }

    pub fn results(&self) -> &BTreeMap<String, FaultResult> {
        &self.results
    }

    pub(crate) fn store_result(&mut self, result: FaultResult) {
        self.results.insert(result.fault.clone(), result);
    }

    pub fn bus(&self, name: &str) -> Option<&Bus> {
        self.buses.get(name)
    }

    pub fn branch(&self, name: &str) -> Option<&Branch> {
        self.branches.get(name)
    }

    pub fn source(&self, name: &str) -> Option<&Source> {
        self.sources.get(name)
    }

    pub fn fault(&self, name: &str) -> Option<&Fault> {
        self.faults.get(name)
    }

    pub fn buses(&self) -> &BTreeMap<String, Bus> {
        &self.buses
    }

    pub fn branches(&self) -> &BTreeMap<String, Branch> {
        &self.branches
    }

    pub fn sources(&self) -> &BTreeMap<String, Source> {
        &self.sources
    }

    pub fn faults(&self) -> &BTreeMap<String, Fault> {
        &self.faults
    }

    /// Checks every bus and branch formula against its parameters without
    /// touching any cache.
    pub(crate) fn check_formulas(&self) -> GroundingResult<()> {
        for bus in self.buses.values() {
            bus.check_formula()?;
        }
        for branch in self.branches.values() {
            branch.check_formulas()?;
        }
        Ok(())
    }

    pub(crate) fn buses_mut(&mut self) -> impl Iterator<Item = &mut Bus> {
        self.buses.values_mut()
    }

    pub(crate) fn branches_mut(&mut self) -> impl Iterator<Item = &mut Branch> {
        self.branches.values_mut()
    }
}
