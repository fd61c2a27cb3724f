use proptest::prelude::*;
use ground_solve::component::*;
use ground_solve::errors::*;
use ground_solve::graph::*;
use ground_solve::network::Network;

mod common;
use common::*;
use common::strategies::*;

proptest! {

#[test]
fn prop_adjacency_is_bidirectional(
    graph in arbitrary_network_graph()
) {
    for (idx, edge) in graph.edges.iter().enumerate() {
        prop_assert!(graph.connections_at(edge.nodes.0).contains(&idx));
        prop_assert!(graph.connections_at(edge.nodes.1).contains(&idx));
    }
}

#[test]
fn prop_degree_matches_incident_branches(
    graph in arbitrary_network_graph()
) {
    for node in &graph.nodes {
        prop_assert_eq!(node.degree, graph.incident_branches(&node.name).len());
    }
}

#[test]
fn prop_parallel_group_is_shared_by_its_members(
    graph in arbitrary_network_graph()
) {
    for edge in &graph.edges {
        let group = graph.parallel_group(&edge.name);
        prop_assert!(group.contains(&edge.name.as_str()));
        for member in &group {
            prop_assert_eq!(&graph.parallel_group(member), &group);
        }
    }
}

#[test]
fn prop_parallel_groups_partition_branches(
    graph in arbitrary_network_graph()
) {
    let groups = graph.parallel_groups();
    let total: usize = groups.iter().map(|g| g.branches.len()).sum();
    prop_assert_eq!(total, graph.edges.len());
    for group in &groups {
        for &b in &group.branches {
            prop_assert_eq!(graph.branch(b).key(), group.buses);
        }
    }
}

#[test]
fn prop_neighbours_are_symmetric(
    graph in arbitrary_network_graph()
) {
    for idx in 0..graph.nodes.len() {
        for (other, branches) in graph.neighbours(idx) {
            let back = graph.neighbours(other);
            let reverse = back.iter().find(|(bus, _)| *bus == idx);
            prop_assert!(reverse.is_some());
            prop_assert_eq!(&reverse.unwrap().1, &branches);
        }
    }
}

}

#[test]
fn endpoints_keep_branch_direction() {
    let net = bus7_network(&[50.0]);
    let graph = net.graph();
    assert_eq!(graph.endpoints("branch8"), Some(("bus6", "bus7")));
    assert_eq!(graph.endpoints("missing"), None);
    assert_eq!(graph.parallel_group("branch6"), vec!["branch5", "branch6"]);
    assert_eq!(graph.parallel_group("branch10"), vec!["branch10", "branch11"]);
    assert_eq!(graph.parallel_group("branch3"), vec!["branch3"]);

    let mut incident = graph.incident_branches("bus8");
    incident.sort_unstable();
    assert_eq!(incident, vec!["branch10", "branch11", "branch9"]);
}

#[test]
fn branch_to_unknown_bus_is_rejected() {
    let mut net = Network::new("net");
    net.add_bus(Bus::new("bus1", station_bus_type(), 100.0)).unwrap();
    let err = net
        .add_branch(Branch::new("b1", cable_type(), "bus1", "nowhere", 1.0, 100.0))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ReferentialIntegrity);
    assert!(net.branch("b1").is_none());
}

#[test]
fn duplicate_names_are_rejected() {
    let mut net = bus7_network(&[50.0]);
    let err = net.add_bus(Bus::new("bus3", station_bus_type(), 10.0)).unwrap_err();
    assert_eq!(
        err,
        GroundingError::DuplicateName {
            kind: "bus",
            name: "bus3".to_string()
        }
    );
    let err = net
        .add_branch(Branch::new("branch1", cable_type(), "bus1", "bus2", 1.0, 100.0))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Input);
}

#[test]
fn graph_grows_incrementally_without_reindexing() {
    let mut net = bus7_network(&[50.0]);
    let before = net.graph().bus_index("bus4");
    net.add_bus(Bus::new("bus10", station_bus_type(), 100.0)).unwrap();
    net.add_branch(Branch::new("branch12", cable_type(), "bus9", "bus10", 1.0, 100.0))
        .unwrap();
    let graph = net.graph();
    assert_eq!(graph.bus_index("bus4"), before);
    assert_eq!(graph.endpoints("branch12"), Some(("bus9", "bus10")));
    assert_eq!(graph.edges.len(), 12);
}

#[test]
fn bus_removal_refused_while_referenced() {
    let mut net = bus7_network(&[50.0]);
    let err = net.remove_bus("bus9").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ReferentialIntegrity);

    net.remove_branch("branch10").unwrap();
    net.remove_branch("branch11").unwrap();
    let err = net.remove_bus("bus9").unwrap_err();
    assert!(matches!(err, GroundingError::BusInUse { entity: "fault", .. }));

    let err = net.remove_branch("branch10").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Lookup);
    assert!(net.graph().branch_index("branch10").is_none());
    assert!(net.graph().incident_branches("bus9").is_empty());
}

#[test]
fn chain_assistant_builds_series_network() {
    let lengths: Vec<f64> = (0..30).map(|x| (x + 1) as f64 / 10.0).collect();
    let net = Network::chain("Network2", &[50.0, 250.0], 30, &station_bus_type(), &cable_type(), &lengths, 100.0)
        .unwrap();
    assert_eq!(net.buses().len(), 30);
    assert_eq!(net.branches().len(), 29);
    assert_eq!(net.graph().endpoints("branch29"), Some(("bus29", "bus30")));
    assert_eq!(net.branch("branch3").unwrap().length, 0.3);

    let err = Network::chain("short", &[50.0], 5, &station_bus_type(), &cable_type(), &[1.0, 1.0], 100.0)
        .unwrap_err();
    assert_eq!(err, GroundingError::MissingBranchLengths { needed: 4, supplied: 2 });
}
