use proptest::prelude::*;
use ground_solve::result::SolveWarning;
use ground_solve::solver::*;

mod common;
use common::*;
use common::strategies::*;

const FREQUENCIES: [f64; 3] = [0.0, 50.0, 250.0];

proptest! {
#![proptest_config(ProptestConfig::with_cases(64))]

#[test]
fn prop_reduction_factor_within_unit_interval(
    lengths in chain_lengths_strategy(),
    resistivity in 10.0_f64..1000.0,
    fault_pick in any::<prop::sample::Index>()
) {
    let mut net = cable_chain(&FREQUENCIES, &lengths, resistivity);
    let fault = format!("fault{}", fault_pick.index(lengths.len() + 1) + 1);
    let result = run_fault(&mut net, &fault).unwrap();

    for (_, &rf) in &result.reduction_factor.values {
        prop_assert!(rf >= 0.0, "reduction factor {} below zero", rf);
        prop_assert!(rf <= 1.0 + 1e-9, "reduction factor {} above one", rf);
    }
    let has_out_of_range_warning = result
        .warnings
        .iter()
        .any(|w| matches!(w, SolveWarning::ReductionFactorOutOfRange { .. }));
    prop_assert!(!has_out_of_range_warning);
}

#[test]
fn prop_grounding_impedance_bounded_by_local_earth(
    lengths in chain_lengths_strategy(),
    resistivity in 10.0_f64..1000.0,
    fault_pick in any::<prop::sample::Index>()
) {
    let mut net = cable_chain(&FREQUENCIES, &lengths, resistivity);
    let bus = fault_pick.index(lengths.len() + 1) + 1;
    let result = run_fault(&mut net, &format!("fault{bus}")).unwrap();
    for f in FREQUENCIES {
        let z_g = result.grounding_impedance_at(f).unwrap().norm();
        let z_e = (1.0_f64 + (f / 50.0).powi(2)).sqrt();
        prop_assert!(z_g <= z_e * (1.0 + EPSILON_STRICT), "{} Hz: |Z_G| {} > |Z_E| {}", f, z_g, z_e);
    }
}

}
