use num_complex::Complex64;
use approx::assert_relative_eq;
use ground_solve::component::*;
use ground_solve::formula::Parameters;
use ground_solve::network::Network;
use ground_solve::spectrum::Spectrum;
use ground_solve::units::*;

pub mod strategies;

/// Epsilon for strict arithmetic comparisons (commutativity, linearity)
///
/// Used when comparing results that should be mathematically identical
/// but may round differently. Example: `z1 ∥ z2` vs `z2 ∥ z1`
pub const EPSILON_STRICT: f64 = 1e-9;

/// Epsilon for relaxed comparisons (superposition across separate runs)
pub const EPSILON_RELAXED: f64 = 1e-7;

/// Epsilon for physical property comparisons
///
/// Used for reduction factors and grounding impedances where a small
/// accumulated error is acceptable.
pub const EPSILON_PHYSICAL: f64 = 1e-6;

/// Asserts two complex numbers are approximately equal within a tolerance
///
/// # Panics
/// Panics if the relative or absolute difference of either part exceeds epsilon
pub fn assert_complex_eq(actual: Complex64, expected: Complex64, epsilon: f64) {
    assert_relative_eq!(actual.re, expected.re, epsilon = epsilon,
        max_relative = epsilon);
    assert_relative_eq!(actual.im, expected.im, epsilon = epsilon,
        max_relative = epsilon);
}

/// Asserts two impedances are approximately equal, handling the Open variant
///
/// # Behavior
/// - If both are Finite, compares complex values with epsilon tolerance
/// - If both are Open, passes (exact match)
/// - If variants differ, panics with descriptive message
pub fn assert_impedance_eq(actual: Impedance, expected: Impedance, epsilon: f64) {
    match (&actual, &expected) {
        (Impedance::Finite(actual_z), Impedance::Finite(expected_z)) => {
            assert_complex_eq(*actual_z, *expected_z, epsilon);
        }
        (Impedance::Open, Impedance::Open) => {}
        (actual, expected) => {
            panic!(
                "Impedance mismatch: expected {:?}, got {:?}",
                expected, actual
            );
        }
    }
}

pub fn hz(value: f64) -> Frequency {
    Frequency::new(value).unwrap()
}

pub fn params(pairs: &[(&str, f64)]) -> Parameters {
    pairs.iter().map(|(name, value)| (name.to_string(), *value)).collect()
}

pub fn scalings(pairs: &[(f64, f64)]) -> Spectrum<f64> {
    Spectrum::from_hz(pairs.iter().copied()).unwrap()
}

pub fn currents(pairs: &[(f64, f64)]) -> Spectrum<Complex64> {
    Spectrum::from_hz(pairs.iter().map(|&(f, i)| (f, Complex64::new(i, 0.0)))).unwrap()
}

/// Station earthing: `1 + j·f/50` ohm
pub fn station_bus_type() -> BusType {
    BusType::new("BusTypeFormulaTest", "Grounded", 230.0, "rho * 0 + 1 + I * f * 1/50").unwrap()
}

/// Substation with a meshed earthing grid: `0.1 + j·f/50` ohm
pub fn substation_bus_type() -> BusType {
    BusType::new("BusTypeFormulaTestUW", "Grounded", 230.0, "rho * 0 + 0.1 + I * f * 1/50").unwrap()
}

/// Shielded cable, per unit length
pub fn cable_type() -> BranchType {
    BranchType::new(
        "TestBranchType",
        true,
        "(rho * 0 + 0.25 + I * f * 0.012)*l",
        "(rho * 0 + 0.0 + I * f * 0.010)*l",
    )
    .unwrap()
}

/// Overhead line without earth wire: carries no earth current
pub fn overhead_line_type() -> BranchType {
    BranchType::new("OHLine", false, "NaN", "NaN").unwrap()
}

/// bus1 (source) ═ branch1/branch2 ═ bus2 ─ bus3 ─ bus4 ═ branch5(0.8)/branch6(0.2) ═ bus5
/// ─ bus6 ┄ branch8 (overhead, NaN) ┄ bus7 ─ bus8 ═ branch10/branch11 ═ bus9
///
/// One fault per bus (`fault1`..`fault9`), one source `source1` at bus1.
pub fn bus7_network(frequencies: &[f64]) -> Network {
    let mut net = Network::new("MyTestNetwork").with_description("That's my first test network");
    net.set_frequencies(frequencies).unwrap();

    net.add_bus(Bus::new("bus1", substation_bus_type(), 100.0)).unwrap();
    net.add_bus(Bus::new("bus2", station_bus_type(), 150.0)).unwrap();
    for i in 3..=9 {
        net.add_bus(Bus::new(&format!("bus{i}"), station_bus_type(), 100.0)).unwrap();
    }

    let cable = cable_type();
    let branches = [
        ("branch1", "bus1", "bus2", 200.0, 1.0),
        ("branch2", "bus1", "bus2", 200.0, 1.0),
        ("branch3", "bus2", "bus3", 100.0, 1.0),
        ("branch4", "bus3", "bus4", 100.0, 1.0),
        ("branch5", "bus4", "bus5", 100.0, 0.8),
        ("branch6", "bus4", "bus5", 100.0, 0.2),
        ("branch7", "bus5", "bus6", 100.0, 1.0),
        ("branch9", "bus7", "bus8", 100.0, 1.0),
        ("branch10", "bus8", "bus9", 100.0, 1.0),
        ("branch11", "bus8", "bus9", 100.0, 1.0),
    ];
    for (name, from, to, rho, coefficient) in branches {
        net.add_branch(
            Branch::new(name, cable.clone(), from, to, 1.0, rho).with_parallel_coefficient(coefficient),
        )
        .unwrap();
    }
    net.add_branch(Branch::new("branch8", overhead_line_type(), "bus6", "bus7", 1.0, 100.0))
        .unwrap();

    for i in 1..=9 {
        net.add_fault(
            Fault::new(&format!("fault{i}"), &format!("bus{i}"), scalings(&[(0.0, 1.0), (50.0, 1.0), (250.0, 1.0)]))
                .with_description("A fault at bus"),
        )
        .unwrap();
    }
    net.add_source(Source::new(
        "source1",
        "bus1",
        currents(&[(0.0, 10.0), (50.0, 60.0), (250.0, 60.0), (350.0, 60.0)]),
    ))
    .unwrap();
    net
}

/// `bus1 ─ bus2 ─ … ─ busN` of cables with a fault on every bus and one
/// source at bus1.
pub fn cable_chain(frequencies: &[f64], lengths: &[f64], resistivity: f64) -> Network {
    let mut net = Network::chain(
        "chain",
        frequencies,
        lengths.len() + 1,
        &station_bus_type(),
        &cable_type(),
        lengths,
        resistivity,
    )
    .unwrap();
    let flat: Vec<(f64, f64)> = frequencies.iter().map(|&f| (f, 1.0)).collect();
    for i in 1..=lengths.len() + 1 {
        net.add_fault(Fault::new(&format!("fault{i}"), &format!("bus{i}"), scalings(&flat))).unwrap();
    }
    let injected: Vec<(f64, f64)> = frequencies.iter().map(|&f| (f, 100.0)).collect();
    net.add_source(Source::new("source1", "bus1", currents(&injected))).unwrap();
    net
}
