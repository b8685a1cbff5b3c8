use amlgraph_core::{
    degree::directed_configuration_model,
    error::GenError,
    graph::TransactionGraph,
    rng::{RngBank, StageRng, StageSlot},
};

const FIXTURE_IN: [usize; 12] = [2, 2, 0, 0, 0, 0, 0, 0, 0, 0, 1, 1];
const FIXTURE_OUT: [usize; 12] = [0, 0, 2, 1, 1, 0, 0, 0, 1, 1, 0, 0];

fn rng(seed: u64) -> StageRng {
    RngBank::new(seed).for_stage(StageSlot::Graph)
}

#[test]
fn fixture_degrees_are_reproduced_exactly() {
    for seed in 0..20 {
        let g = directed_configuration_model(&FIXTURE_IN, &FIXTURE_OUT, &mut rng(seed)).unwrap();
        assert_eq!(g.num_nodes, 12);
        assert_eq!(g.edges.len(), 6);
        for node in 0..12 {
            assert_eq!(g.in_degree(node), FIXTURE_IN[node], "in-degree of {node}, seed {seed}");
            assert_eq!(g.out_degree(node), FIXTURE_OUT[node], "out-degree of {node}, seed {seed}");
        }
        assert!(g.self_loops().is_empty());
    }
}

#[test]
fn total_degrees_survive_self_loop_swaps() {
    let in_deg = [10, 1, 3, 0, 0, 0, 0, 0, 0, 0, 0, 0];
    let out_deg = [2, 10, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0];
    let g = directed_configuration_model(&in_deg, &out_deg, &mut rng(0)).unwrap();
    assert_eq!(g.degree(0), 12);
    assert_eq!(g.degree(1), 11);
    assert_eq!(g.degree(2), 5);
    for node in 3..12 {
        assert_eq!(g.degree(node), 0);
    }
}

#[test]
fn self_loops_are_swapped_away_when_possible() {
    for seed in 0..50 {
        let g = directed_configuration_model(&[1, 1], &[1, 1], &mut rng(seed)).unwrap();
        assert!(g.self_loops().is_empty(), "seed {seed}: {:?}", g.edges);
    }
}

#[test]
fn unresolvable_self_loop_is_kept() {
    let g = directed_configuration_model(&[1], &[1], &mut rng(3)).unwrap();
    assert_eq!(g.edges, vec![(0, 0)]);
    assert_eq!(g.self_loops().len(), 1);

    // Seeding the transaction graph drops it.
    let mut graph = TransactionGraph::new();
    graph.add_account("bank".into(), "US".into(), "I".into(), 10.0, None, None);
    assert_eq!(graph.seed_base_edges(&g).unwrap(), 1);
    assert_eq!(graph.num_edges(), 0);
}

#[test]
fn shorter_sequence_is_padded_with_zeros() {
    let g = directed_configuration_model(&[0, 1, 1], &[2], &mut rng(1)).unwrap();
    assert_eq!(g.num_nodes, 3);
    assert_eq!(g.out_degree(0), 2);
    assert_eq!(g.in_degree(1), 1);
    assert_eq!(g.in_degree(2), 1);
}

#[test]
fn unbalanced_sequences_are_rejected() {
    let err = directed_configuration_model(&[2, 1], &[1, 1], &mut rng(0)).unwrap_err();
    assert!(matches!(err, GenError::DegreeMismatch { in_sum: 3, out_sum: 2 }));
}

#[test]
fn same_seed_same_edge_list() {
    let a = directed_configuration_model(&FIXTURE_IN, &FIXTURE_OUT, &mut rng(42)).unwrap();
    let b = directed_configuration_model(&FIXTURE_IN, &FIXTURE_OUT, &mut rng(42)).unwrap();
    assert_eq!(a.edges, b.edges);
}
