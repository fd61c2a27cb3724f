use ground_solve::component::*;
use ground_solve::network::Network;
use ground_solve::result::*;
use ground_solve::solver::*;

mod common;
use common::*;

#[test]
fn fault_result_survives_json_round_trip() {
    let mut net = bus7_network(&[0.0, 50.0, 250.0]);
    let result = run_fault(&mut net, "fault4").unwrap();
    let json = serde_json::to_string(&result).unwrap();
    let restored: FaultResult = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, result);
}

#[test]
fn spectrum_is_keyed_by_frequency_text() {
    let mut net = bus7_network(&[50.0, 250.0]);
    let result = run_fault(&mut net, "fault1").unwrap();
    let value = serde_json::to_value(&result.reduction_factor).unwrap();
    assert_eq!(value["fault_bus"], "bus1");
    assert_eq!(value["values"]["50"], 1.0);
    assert_eq!(value["values"]["250"], 1.0);
}

#[test]
fn warnings_are_tagged_by_kind() {
    let warning = SolveWarning::UnreachableSource {
        source: "s2".to_string(),
        bus: "island".to_string(),
    };
    let value = serde_json::to_value(&warning).unwrap();
    assert_eq!(value["kind"], "unreachable_source");
    assert_eq!(value["bus"], "island");
}

#[test]
fn network_round_trip_keeps_definitions_and_results() {
    let mut net = bus7_network(&[0.0, 50.0, 250.0]);
    net.define_paths().unwrap();
    let expected = run_fault(&mut net, "fault9").unwrap();
    let json = serde_json::to_string(&net).unwrap();

    let mut restored: Network = serde_json::from_str(&json).unwrap();
    assert_eq!(serde_json::to_string(&restored).unwrap(), json);
    assert_eq!(restored.branch("branch5"), net.branch("branch5"));
    assert_eq!(restored.paths().len(), 9);
    assert_eq!(restored.active_fault().map(|f| f.name.as_str()), Some("fault9"));
    assert_eq!(restored.graph().endpoints("branch8"), Some(("bus6", "bus7")));

    let rerun = run_fault(&mut restored, "fault9").unwrap();
    assert_eq!(rerun, expected);
}

#[test]
fn malformed_formula_fails_deserialization() {
    let json = r#"{
        "name": "broken",
        "system_type": "Grounded",
        "voltage_level": 230.0,
        "impedance_formula": "1 + (rho"
    }"#;
    let err = serde_json::from_str::<BusType>(json).unwrap_err();
    assert!(err.to_string().contains("1 + (rho"), "{err}");

    let ok = r#"{
        "name": "fine",
        "system_type": "Grounded",
        "voltage_level": 230.0,
        "impedance_formula": "rho * 0 + 1 + I * f * 1/50"
    }"#;
    let bus_type: BusType = serde_json::from_str(ok).unwrap();
    assert_eq!(bus_type, station_bus_type_named("fine"));
}

fn station_bus_type_named(name: &str) -> BusType {
    BusType {
        name: name.to_string(),
        ..station_bus_type()
    }
}

#[test]
fn branch_coefficient_defaults_to_one() {
    let mut branch = serde_json::to_value(
        Branch::new("b", cable_type(), "bus1", "bus2", 1.0, 100.0).with_parallel_coefficient(0.4),
    )
    .unwrap();
    branch.as_object_mut().unwrap().remove("parallel_coefficient");
    let restored: Branch = serde_json::from_value(branch).unwrap();
    assert_eq!(restored.parallel_coefficient, 1.0);
}

#[test]
fn solver_configuration_fills_defaults() {
    let solver: FaultSolver = serde_json::from_str(r#"{"parallel": true}"#).unwrap();
    assert_eq!(solver, FaultSolver::new().with_parallel(true));
    let solver: FaultSolver = serde_json::from_str("{}").unwrap();
    assert_eq!(solver, FaultSolver::default());
}
