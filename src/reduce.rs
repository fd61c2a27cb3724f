use num_complex::Complex64;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::debug;
use crate::errors::{GroundingError, GroundingResult};
use crate::graph::{BranchIndex, BusIndex, NetworkGraph};
use crate::units::{checked_div, combine_parallel_many, combine_series, Impedance, ONE, ZERO};

/// One branch of a parallel group at a single frequency.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupMember {
    pub self_impedance: Impedance,
    pub mutual_impedance: Impedance,
    pub coefficient: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupReduction {
    pub self_impedance: Impedance,
    pub mutual_impedance: Complex64,
    /// Fraction of the group current carried by each member, in member order.
    pub shares: Vec<Complex64>,
}

/// Collapses a parallel group. Member admittance is `c / Z`; open members
/// and members with a zero coefficient carry nothing. A lone conducting
/// member passes through unchanged whatever its coefficient. The
/// equivalent mutual impedance weights each member's mutual impedance by
/// the square of its current share.
pub fn reduce_group(members: &[GroupMember]) -> GroundingResult<GroupReduction> {
    let conducting: Vec<(usize, Complex64)> = members
        .iter()
        .enumerate()
        .filter_map(|(i, member)| match member.self_impedance {
            Impedance::Finite(z) if member.coefficient > 0.0 => Some((i, z)),
            _ => None,
        })
        .collect();

    let mut shares = vec![ZERO; members.len()];
    let self_impedance = match conducting.as_slice() {
        [] => return Ok(GroupReduction {
            self_impedance: Impedance::Open,
            mutual_impedance: ZERO,
            shares,
        }),
        &[(only, z)] => {
            shares[only] = ONE;
            z
        }
        many => {
            let mut admittances = Vec::with_capacity(many.len());
            for &(i, z) in many {
                let y = checked_div(Complex64::new(members[i].coefficient, 0.0), z, "branch admittance")?;
                admittances.push((i, y));
            }
            let total: Complex64 = admittances.iter().map(|(_, y)| y).sum();
            let z_eq = checked_div(ONE, total, "parallel group admittance")?;
            for (i, y) in admittances {
                shares[i] = y * z_eq;
            }
            z_eq
        }
    };

    let mutual_impedance = members
        .iter()
        .zip(&shares)
        .filter_map(|(member, share)| member.mutual_impedance.finite().map(|zm| share * share * zm))
        .sum();

    Ok(GroupReduction {
        self_impedance: Impedance::Finite(self_impedance),
        mutual_impedance,
        shares,
    })
}

/// Series self impedance and summed mutual coupling of a whole path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathImpedance {
    pub self_impedance: Impedance,
    pub mutual_impedance: Complex64,
}

pub fn cascade<'a>(segments: impl IntoIterator<Item = &'a GroupReduction>) -> PathImpedance {
    segments.into_iter().fold(
        PathImpedance {
            self_impedance: Impedance::Finite(ZERO),
            mutual_impedance: ZERO,
        },
        |acc, segment| PathImpedance {
            self_impedance: combine_series(acc.self_impedance, segment.self_impedance),
            mutual_impedance: acc.mutual_impedance + segment.mutual_impedance,
        },
    )
}

/// Complex share of the injected current returning through earth at the
/// fault bus. The loop closes through the earth impedances at both ends.
pub fn reduction_factor(
    path: Option<&PathImpedance>,
    fault_earth: Impedance,
    source_earth: Impedance,
) -> GroundingResult<Complex64> {
    let Some(path) = path else {
        return Ok(ONE);
    };
    match (path.self_impedance, fault_earth, source_earth) {
        (Impedance::Finite(z_s), Impedance::Finite(z_f), Impedance::Finite(z_src)) => {
            let z_loop = z_s + z_f + z_src;
            checked_div(z_loop - path.mutual_impedance, z_loop, "reduction factor loop")
        }
        _ => Ok(ONE),
    }
}

#[derive(Debug, Clone)]
pub struct ReducedGroup {
    pub branches: Vec<BranchIndex>,
    pub reduction: GroupReduction,
}

/// A network's impedances at one frequency: bus earth impedances and every
/// parallel group already collapsed.
#[derive(Debug, Clone)]
pub struct ReducedNetwork<'g> {
    pub graph: &'g NetworkGraph,
    pub earth: Vec<Impedance>,
    groups: HashMap<(BusIndex, BusIndex), ReducedGroup>,
}

impl<'g> ReducedNetwork<'g> {
    pub fn new<F>(graph: &'g NetworkGraph, earth: Vec<Impedance>, member: F) -> GroundingResult<Self>
    where
        F: Fn(BranchIndex) -> GroundingResult<GroupMember>,
    {
        let mut groups = HashMap::new();
        for group in graph.parallel_groups() {
            let members = group
                .branches
                .iter()
                .map(|&b| member(b))
                .collect::<GroundingResult<Vec<_>>>()?;
            let reduction = reduce_group(&members)?;
            groups.insert(
                group.buses,
                ReducedGroup {
                    branches: group.branches,
                    reduction,
                },
            );
        }
        Ok(Self { graph, earth, groups })
    }

    pub fn group(&self, a: BusIndex, b: BusIndex) -> Option<&ReducedGroup> {
        self.groups.get(&(a.min(b), a.max(b)))
    }

    pub fn path_impedance(&self, segments: &[(BusIndex, BusIndex)]) -> GroundingResult<PathImpedance> {
        let reductions = segments
            .iter()
            .map(|&(a, b)| {
                self.group(a, b)
                    .map(|g| &g.reduction)
                    .ok_or_else(|| GroundingError::Unreachable {
                        from: self.graph.bus(a).name.clone(),
                        to: self.graph.bus(b).name.clone(),
                    })
            })
            .collect::<GroundingResult<Vec<_>>>()?;
        Ok(cascade(reductions))
    }

    /// Adds `current` flowing from `from` to `to` through the group joining
    /// them, split by share and signed by each branch's from→to direction.
    pub fn spread(&self, from: BusIndex, to: BusIndex, current: Complex64, branch_current: &mut [Complex64]) {
        let Some(group) = self.group(from, to) else {
            return;
        };
        for (&b, share) in group.branches.iter().zip(&group.reduction.shares) {
            let sign = match self.graph.branch(b).nodes.0 == from {
                true => 1.0,
                false => -1.0,
            };
            branch_current[b] += share * current * sign;
        }
    }
}

#[derive(Debug, Clone)]
struct TreeNode {
    bus: BusIndex,
    parent: Option<usize>,
    link: Complex64,
    children: Vec<usize>,
    input: Impedance,
}

/// Voltages and currents produced by one earth current entering the fault bus.
#[derive(Debug, Clone, PartialEq)]
pub struct Distribution {
    pub bus_voltage: Vec<Complex64>,
    pub bus_current: Vec<Complex64>,
    pub branch_current: Vec<Complex64>,
}

impl Distribution {
    pub fn zeros(buses: usize, branches: usize) -> Self {
        Self {
            bus_voltage: vec![ZERO; buses],
            bus_current: vec![ZERO; buses],
            branch_current: vec![ZERO; branches],
        }
    }

    pub fn add_scaled(&mut self, other: &Distribution, factor: Complex64) {
        let pairs = [
            (&mut self.bus_voltage, &other.bus_voltage),
            (&mut self.bus_current, &other.bus_current),
            (&mut self.branch_current, &other.branch_current),
        ];
        for (into, from) in pairs {
            for (x, y) in into.iter_mut().zip(from) {
                *x += y * factor;
            }
        }
    }
}

/// Breadth-first spanning tree of conducting groups rooted at the fault
/// bus, read as a ladder: each bus earths through its own impedance in
/// parallel with the links to its children.
#[derive(Debug, Clone)]
pub struct GroundingTree {
    nodes: Vec<TreeNode>,
}

impl GroundingTree {
    pub fn build(reduced: &ReducedNetwork<'_>, root: BusIndex) -> GroundingResult<Self> {
        let graph = reduced.graph;
        let mut nodes = vec![TreeNode {
            bus: root,
            parent: None,
            link: ZERO,
            children: Vec::new(),
            input: Impedance::Open,
        }];
        let mut visited = HashSet::from([root]);
        let mut queue = VecDeque::from([0usize]);
        while let Some(at) = queue.pop_front() {
            let bus = nodes[at].bus;
            for (next, _) in graph.neighbours(bus) {
                let Some(link) = reduced
                    .group(bus, next)
                    .and_then(|g| g.reduction.self_impedance.finite())
                else {
                    continue;
                };
                if !visited.insert(next) {
                    if nodes[at].parent.map(|p| nodes[p].bus) != Some(next) {
                        debug!(from = %graph.bus(bus).name, to = %graph.bus(next).name, "group closes a loop, left out of grounding tree");
                    }
                    continue;
                }
                let child = nodes.len();
                nodes.push(TreeNode {
                    bus: next,
                    parent: Some(at),
                    link,
                    children: Vec::new(),
                    input: Impedance::Open,
                });
                nodes[at].children.push(child);
                queue.push_back(child);
            }
        }

        for at in (0..nodes.len()).rev() {
            let mut terms = vec![reduced.earth[nodes[at].bus]];
            for &child in &nodes[at].children {
                terms.push(match nodes[child].input {
                    Impedance::Finite(z) => Impedance::Finite(nodes[child].link + z),
                    Impedance::Open => Impedance::Open,
                });
            }
            nodes[at].input = combine_parallel_many(&terms)?;
        }
        Ok(Self { nodes })
    }

    /// Grounding impedance seen at the fault bus.
    pub fn input_impedance(&self) -> Impedance {
        self.nodes[0].input
    }

    pub fn distribute(&self, reduced: &ReducedNetwork<'_>, earth_current: Complex64) -> GroundingResult<Distribution> {
        let graph = reduced.graph;
        let mut out = Distribution::zeros(graph.nodes.len(), graph.edges.len());
        if earth_current == ZERO {
            return Ok(out);
        }
        let Impedance::Finite(z_g) = self.input_impedance() else {
            return Err(GroundingError::arithmetic(format!(
                "bus `{}` has no path to earth",
                graph.bus(self.nodes[0].bus).name
            )));
        };

        let mut voltage = vec![ZERO; self.nodes.len()];
        let mut inflow = vec![ZERO; self.nodes.len()];
        voltage[0] = z_g * earth_current;
        inflow[0] = earth_current;
        for at in 0..self.nodes.len() {
            let node = &self.nodes[at];
            let mut outflow = ZERO;
            for &child in &node.children {
                let Impedance::Finite(z_child) = self.nodes[child].input else {
                    continue;
                };
                let link = self.nodes[child].link;
                let current = checked_div(voltage[at], link + z_child, "grounding ladder")?;
                voltage[child] = voltage[at] - link * current;
                inflow[child] = current;
                outflow += current;
                reduced.spread(node.bus, self.nodes[child].bus, current, &mut out.branch_current);
            }
            out.bus_voltage[node.bus] = voltage[at];
            if !reduced.earth[node.bus].is_open() {
                out.bus_current[node.bus] = inflow[at] - outflow;
            }
        }
        Ok(out)
    }
}
