/// strategies.rs
use proptest::prelude::*;
use num_complex::Complex64;
use ground_solve::graph::*;
use ground_solve::reduce::*;
use ground_solve::units::*;

/// Generate finite impedances with a passive (non-negative) real part
pub fn impedance_strategy() -> impl Strategy<Value = Impedance> {
    (1e-3_f64..1e3_f64, -1e3_f64..1e3_f64)
        .prop_map(|(re, im)| Impedance::Finite(Complex64::new(re, im)))
}

/// Finite impedances mixed with the occasional open circuit
pub fn impedance_or_open_strategy() -> impl Strategy<Value = Impedance> {
    prop_oneof![
        4 => impedance_strategy(),
        1 => Just(Impedance::Open),
    ]
}

/// Analysis frequencies from DC up to the 20th harmonic of 50 Hz
pub fn frequency_strategy() -> impl Strategy<Value = f64> {
    0.0_f64..1000.0_f64
}

/// Cable-like parallel group members: resistive-inductive self impedance,
/// inductive mutual impedance no larger than the self reactance
pub fn cable_member_strategy() -> impl Strategy<Value = GroupMember> {
    (0.01_f64..2.0, 0.01_f64..5.0, 0.0_f64..1.0, 0.05_f64..=1.0).prop_map(|(r, x, coupling, coefficient)| {
        GroupMember {
            self_impedance: Impedance::Finite(Complex64::new(r, x)),
            mutual_impedance: Impedance::Finite(Complex64::new(0.0, coupling * x)),
            coefficient,
        }
    })
}

/// Generate arbitrary bus/branch graphs; branches never loop on one bus
pub fn arbitrary_network_graph() -> impl Strategy<Value = NetworkGraph> {
    prop::collection::vec("[a-z]{1,5}", 2..=10)
        .prop_map(|mut names| {
            names.sort();
            names.dedup();
            names
        })
        .prop_filter("need two distinct buses", |names| names.len() >= 2)
        .prop_flat_map(|names| {
            let count = names.len();
            prop::collection::vec(
                (0usize..count, 0usize..count).prop_filter("distinct buses", |(a, b)| a != b),
                0..=15,
            )
            .prop_map(move |edges| (names.clone(), edges))
        })
        .prop_map(|(names, edges)| {
            let mut graph = NetworkGraph::new();
            for name in &names {
                graph.add_bus(name);
            }
            for (i, (a, b)) in edges.into_iter().enumerate() {
                graph.add_branch(&format!("B{i:02}"), &names[a], &names[b]).unwrap();
            }
            graph
        })
}

/// Lengths (km) of a cable chain with two to eight buses
pub fn chain_lengths_strategy() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(0.1_f64..5.0_f64, 1..=7)
}
