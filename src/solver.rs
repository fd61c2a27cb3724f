//! Fault solver.
//!
//! A run refreshes every impedance cache, resolves one path per source,
//! then solves each analysis frequency on its own:
//!
//! 1. collapse every parallel group ([`reduce_group`](crate::reduce::reduce_group)),
//! 2. build the grounding ladder at the fault bus and read off its input
//!    impedance,
//! 3. per source, cascade the path and take the reduction factor
//!    `r = (Z_loop - Z_M) / Z_loop`,
//! 4. superpose the earth currents `r · k · I_src` into the ladder and the
//!    metallic returns `(1 - r) · k · I_src` along each path.
//!
//! Failures confined to one frequency or one source become
//! [`SolveWarning`]s on the result; everything else aborts the run.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};
use crate::component::Fault;
use crate::errors::{ErrorKind, GroundingError, GroundingResult};
use crate::graph::{BusIndex, NetworkGraph};
use crate::network::Network;
use crate::paths::Path;
use crate::reduce::{reduction_factor, Distribution, GroundingTree, GroupMember, ReducedNetwork};
use crate::result::{
    rms, FaultResult, ResultBranch, ResultBus, ResultGroundingImpedance, ResultReductionFactor, SolveWarning,
};
use crate::spectrum::Spectrum;
use crate::units::{Frequency, Impedance, ZERO};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaultSolver {
    /// Solve frequencies on the rayon pool. Needs the `parallel` feature.
    pub parallel: bool,
    /// Slack before a reduction factor outside [0, 1] is reported.
    pub range_tolerance: f64,
}

impl Default for FaultSolver {
    fn default() -> Self {
        Self::new()
    }
}

/// One source's share of a single frequency's solution.
#[derive(Debug, Clone, PartialEq)]
pub struct Contribution {
    pub source: String,
    /// Source current scaled by the fault.
    pub injected: Complex64,
    pub reduction_factor: Complex64,
    /// Part of `injected` returning through earth at the fault bus.
    pub earth_current: Complex64,
    /// Metallic return along the path, per branch index.
    pub return_current: Vec<Complex64>,
}

impl Contribution {
    fn new(route: &Route, injected: Complex64, reduction_factor: Complex64, reduced: &ReducedNetwork<'_>) -> Self {
        let earth_current = reduction_factor * injected;
        let metallic = injected - earth_current;
        let mut return_current = vec![ZERO; reduced.graph.edges.len()];
        if metallic != ZERO {
            for &(from, to) in &route.segments {
                reduced.spread(to, from, metallic, &mut return_current);
            }
        }
        Self {
            source: route.source.clone(),
            injected,
            reduction_factor,
            earth_current,
            return_current,
        }
    }
}

/// A resolved path expressed in graph indices.
#[derive(Debug, Clone)]
struct Route {
    source: String,
    bus: BusIndex,
    segments: Vec<(BusIndex, BusIndex)>,
}

impl Route {
    fn from_path(network: &Network, graph: &NetworkGraph, path: &Path) -> GroundingResult<Self> {
        let index = |bus: &str| {
            graph
                .bus_index(bus)
                .ok_or_else(|| GroundingError::not_found("bus", bus))
        };
        let source = network
            .source(&path.source)
            .ok_or_else(|| GroundingError::not_found("source", &path.source))?;
        Ok(Self {
            source: path.source.clone(),
            bus: index(&source.bus)?,
            segments: path
                .segments
                .iter()
                .map(|segment| Ok((index(&segment.from_bus)?, index(&segment.to_bus)?)))
                .collect::<GroundingResult<_>>()?,
        })
    }
}

#[derive(Debug, Clone)]
struct FrequencySolution {
    reduction_factor: f64,
    grounding_impedance: Complex64,
    distribution: Distribution,
}

/// Fault-level reduction factor: earth share of the superposed injection.
fn combined_reduction_factor(contributions: &[Contribution]) -> f64 {
    match contributions {
        [] => 1.0,
        [only] => only.reduction_factor.norm(),
        many => {
            let injected: Complex64 = many.iter().map(|c| c.injected).sum();
            match injected.norm() == 0.0 {
                true => many.iter().map(|c| c.reduction_factor).sum::<Complex64>().norm() / many.len() as f64,
                false => many.iter().map(|c| c.earth_current).sum::<Complex64>().norm() / injected.norm(),
            }
        }
    }
}

fn not_evaluated(entity: &str, name: &str, f: Frequency) -> GroundingError {
    GroundingError::Arithmetic {
        context: format!("{entity} `{name}` has no evaluated impedance"),
        frequency: Some(f.hz()),
    }
}

fn solve_frequency(
    network: &Network,
    graph: &NetworkGraph,
    fault: &Fault,
    fault_bus: BusIndex,
    routes: &[Route],
    f: Frequency,
) -> GroundingResult<FrequencySolution> {
    let earth = graph
        .nodes
        .iter()
        .map(|node| {
            network
                .bus(&node.name)
                .and_then(|bus| bus.impedance_at(f))
                .ok_or_else(|| not_evaluated("bus", &node.name, f))
        })
        .collect::<GroundingResult<Vec<_>>>()?;
    let reduced = ReducedNetwork::new(graph, earth, |b| {
        let name = &graph.branch(b).name;
        let branch = network
            .branch(name)
            .ok_or_else(|| GroundingError::not_found("branch", name))?;
        Ok(GroupMember {
            self_impedance: branch
                .self_impedance_at(f)
                .ok_or_else(|| not_evaluated("branch", name, f))?,
            mutual_impedance: branch
                .mutual_impedance_at(f)
                .ok_or_else(|| not_evaluated("branch", name, f))?,
            coefficient: branch.parallel_coefficient,
        })
    })?;

    let tree = GroundingTree::build(&reduced, fault_bus)?;
    let Impedance::Finite(grounding_impedance) = tree.input_impedance() else {
        return Err(GroundingError::arithmetic(format!(
            "fault bus `{}` has no path to earth",
            graph.bus(fault_bus).name
        )));
    };

    let scaling = fault.scaling(f);
    let mut contributions = Vec::with_capacity(routes.len());
    for route in routes {
        let injected = network
            .source(&route.source)
            .map_or(ZERO, |source| source.current(f) * scaling);
        let path = match route.segments.is_empty() {
            true => None,
            false => Some(reduced.path_impedance(&route.segments)?),
        };
        let r = reduction_factor(path.as_ref(), reduced.earth[fault_bus], reduced.earth[route.bus])?;
        contributions.push(Contribution::new(route, injected, r, &reduced));
    }

    let earth_current: Complex64 = contributions.iter().map(|c| c.earth_current).sum();
    let mut distribution = tree.distribute(&reduced, earth_current)?;
    for contribution in &contributions {
        for (total, part) in distribution.branch_current.iter_mut().zip(&contribution.return_current) {
            *total += part;
        }
    }

    let reduction_factor = combined_reduction_factor(&contributions);
    debug!(frequency = f.hz(), reduction_factor, sources = contributions.len(), "frequency solved");
    Ok(FrequencySolution {
        reduction_factor,
        grounding_impedance,
        distribution,
    })
}

impl FaultSolver {
    pub fn new() -> Self {
        Self {
            parallel: false,
            range_tolerance: 1e-9,
        }
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_range_tolerance(mut self, tolerance: f64) -> Self {
        self.range_tolerance = tolerance;
        self
    }

    /// Activates `fault`, solves every analysis frequency and stores the
    /// result on the network, replacing any earlier one for that fault.
    /// A run that fails with an error leaves the active fault unchanged.
    pub fn run(&self, network: &mut Network, fault: &str) -> GroundingResult<FaultResult> {
        if network.fault(fault).is_none() {
            return Err(GroundingError::not_found("fault", fault));
        }
        if network.frequencies().is_empty() {
            return Err(GroundingError::NoFrequencies(network.name.clone()));
        }
        network.check_formulas()?;

        let frequencies = network.frequencies().to_vec();
        let mut failed: BTreeMap<Frequency, GroundingError> = BTreeMap::new();
        for bus in network.buses_mut() {
            for (f, e) in bus.refresh_impedance(&frequencies)? {
                failed.entry(f).or_insert(e);
            }
        }
        for branch in network.branches_mut() {
            for (f, e) in branch.refresh_impedances(&frequencies)? {
                failed.entry(f).or_insert(e);
            }
        }

        let mut warnings = Vec::new();
        let mut paths = Vec::new();
        let sources: Vec<(String, String)> = network
            .sources()
            .values()
            .map(|s| (s.name.clone(), s.bus.clone()))
            .collect();
        for (source, bus) in sources {
            match network.path_between(&source, fault) {
                Ok(path) => paths.push(path.clone()),
                Err(e) if e.kind() == ErrorKind::Connectivity => {
                    warn!(source = %source, fault, error = %e, "source cannot reach fault, contribution skipped");
                    warnings.push(SolveWarning::UnreachableSource { source, bus });
                }
                Err(e) => return Err(e),
            }
        }
        network.set_active_fault(fault)?;

        let result = {
            let network: &Network = network;
            let graph = network.graph();
            let active = network
                .fault(fault)
                .ok_or_else(|| GroundingError::not_found("fault", fault))?;
            let fault_bus = graph
                .bus_index(&active.bus)
                .ok_or_else(|| GroundingError::not_found("bus", &active.bus))?;
            let routes = paths
                .iter()
                .map(|path| Route::from_path(network, graph, path))
                .collect::<GroundingResult<Vec<_>>>()?;

            let pending: Vec<Frequency> = frequencies
                .iter()
                .filter(|f| !failed.contains_key(f))
                .copied()
                .collect();
            let solved = self.solve_all(&pending, |f| {
                solve_frequency(network, graph, active, fault_bus, &routes, f)
            });

            let mut outcomes: BTreeMap<Frequency, GroundingResult<FrequencySolution>> =
                failed.into_iter().map(|(f, e)| (f, Err(e))).collect();
            outcomes.extend(solved);
            self.assemble(network, graph, active, outcomes, warnings)
        };

        info!(
            fault,
            fault_bus = %result.fault_bus,
            frequencies = result.reduction_factor.values.len(),
            warnings = result.warnings.len(),
            "fault run complete"
        );
        network.store_result(result.clone());
        Ok(result)
    }

    #[cfg(feature = "parallel")]
    fn solve_all<F>(&self, frequencies: &[Frequency], solve: F) -> Vec<(Frequency, GroundingResult<FrequencySolution>)>
    where
        F: Fn(Frequency) -> GroundingResult<FrequencySolution> + Sync + Send,
    {
        use rayon::prelude::*;
        match self.parallel {
            true => frequencies.par_iter().map(|&f| (f, solve(f))).collect(),
            false => frequencies.iter().map(|&f| (f, solve(f))).collect(),
        }
    }

    #[cfg(not(feature = "parallel"))]
    fn solve_all<F>(&self, frequencies: &[Frequency], solve: F) -> Vec<(Frequency, GroundingResult<FrequencySolution>)>
    where
        F: Fn(Frequency) -> GroundingResult<FrequencySolution>,
    {
        if self.parallel {
            debug!("parallel solving requested but the `parallel` feature is disabled");
        }
        frequencies.iter().map(|&f| (f, solve(f))).collect()
    }

    fn assemble(
        &self,
        network: &Network,
        graph: &NetworkGraph,
        fault: &Fault,
        outcomes: BTreeMap<Frequency, GroundingResult<FrequencySolution>>,
        mut warnings: Vec<SolveWarning>,
    ) -> FaultResult {
        let mut reduction = Spectrum::new();
        let mut impedance = Spectrum::new();
        let mut bus_voltage = vec![Spectrum::new(); graph.nodes.len()];
        let mut bus_current = vec![Spectrum::new(); graph.nodes.len()];
        let mut branch_current = vec![Spectrum::new(); graph.edges.len()];

        for (f, outcome) in outcomes {
            let solution = match outcome {
                Ok(solution) => solution,
                Err(e) => {
                    let e = e.at_frequency(f.hz());
                    warn!(fault = %fault.name, frequency = f.hz(), error = %e, "frequency skipped");
                    warnings.push(SolveWarning::FrequencyFailed {
                        frequency: f.hz(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };
            let rf = solution.reduction_factor;
            if rf < -self.range_tolerance || rf > 1.0 + self.range_tolerance {
                warn!(fault = %fault.name, frequency = f.hz(), reduction_factor = rf, "reduction factor outside [0, 1]");
                warnings.push(SolveWarning::ReductionFactorOutOfRange {
                    frequency: f.hz(),
                    value: rf,
                });
            }
            reduction.insert(f, rf);
            impedance.insert(f, solution.grounding_impedance);
            let d = solution.distribution;
            for (idx, (v, i)) in d.bus_voltage.into_iter().zip(d.bus_current).enumerate() {
                bus_voltage[idx].insert(f, v);
                bus_current[idx].insert(f, i);
            }
            for (idx, i) in d.branch_current.into_iter().enumerate() {
                branch_current[idx].insert(f, i);
            }
        }

        let buses = network
            .buses()
            .keys()
            .filter_map(|name| graph.bus_index(name).map(|idx| (name, idx)))
            .map(|(name, idx)| ResultBus {
                name: name.clone(),
                uepr: rms(&bus_voltage[idx]),
                ia: rms(&bus_current[idx]),
                uepr_freq: bus_voltage[idx].clone(),
                ia_freq: bus_current[idx].clone(),
            })
            .collect();
        let branches = network
            .branches()
            .keys()
            .filter_map(|name| graph.branch_index(name).map(|idx| (name, idx)))
            .map(|(name, idx)| ResultBranch {
                name: name.clone(),
                i_s: rms(&branch_current[idx]),
                i_s_freq: branch_current[idx].clone(),
            })
            .collect();

        FaultResult {
            fault: fault.name.clone(),
            fault_bus: fault.bus.clone(),
            buses,
            branches,
            reduction_factor: ResultReductionFactor {
                fault_bus: fault.bus.clone(),
                values: reduction,
            },
            grounding_impedance: ResultGroundingImpedance {
                fault_bus: fault.bus.clone(),
                values: impedance,
            },
            warnings,
        }
    }
}

/// Runs `fault` with the default solver configuration.
pub fn run_fault(network: &mut Network, fault: &str) -> GroundingResult<FaultResult> {
    FaultSolver::default().run(network, fault)
}
