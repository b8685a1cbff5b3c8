use amlgraph_core::{
    error::GenError,
    graph::TransactionGraph,
    params::AlertParamRow,
    registry::CandidateRegistry,
    rng::{RngBank, StageRng, StageSlot},
    typology::{validate_alert_row, AlertSubgraph, AmlTypologyKind, TypologyInjector, TypologyRequest, TypologyShape},
};
use std::collections::BTreeSet;

const THRESHOLD: usize = 3;
const MARGIN: f64 = 0.1;
const STEPS: u64 = 100;

/// `per_bank` accounts per bank. In every bank the first two accounts are
/// hubs, each receiving from the next three accounts.
fn world(banks: &[&str], per_bank: usize) -> (TransactionGraph, CandidateRegistry) {
    let mut graph = TransactionGraph::new();
    let mut registry = CandidateRegistry::new(THRESHOLD);
    for bank in banks {
        let first = graph.num_accounts();
        for _ in 0..per_bank {
            let id = graph.add_account(bank.to_string(), "US".into(), "I".into(), 1000.0, None, None);
            registry.register(id, bank.to_string());
        }
        for hub in first..first + 2 {
            for src in first + 2..first + 5 {
                graph.add_edge(src, hub, None, None).unwrap();
            }
        }
    }
    registry.index_hubs(&graph);
    (graph, registry)
}

fn request(kind: AmlTypologyKind, num_accounts: usize, period: u64, bank: Option<&str>) -> TypologyRequest {
    TypologyRequest {
        kind,
        num_accounts,
        min_amount: 100.0,
        max_amount: 1000.0,
        period,
        bank_id: bank.map(str::to_string),
        schedule_id: 2,
        is_sar: true,
    }
}

fn rng(seed: u64) -> StageRng {
    RngBank::new(seed).for_stage(StageSlot::Typology)
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(1.0)
}

fn inject(
    req: &TypologyRequest,
    graph: &mut TransactionGraph,
    registry: &mut CandidateRegistry,
    seed: u64,
) -> AlertSubgraph {
    let mut injector = TypologyInjector::new(MARGIN, STEPS);
    injector.inject(req, graph, registry, &mut rng(seed)).unwrap().clone()
}

#[test]
fn cycle_amounts_decay_around_the_ring() {
    for seed in 0..10 {
        let (mut graph, mut registry) = world(&["a"], 10);
        let alert = inject(&request(AmlTypologyKind::Cycle, 5, 20, Some("a")), &mut graph, &mut registry, seed);

        assert_eq!(alert.edges.len(), 5);
        for pair in alert.edges.windows(2) {
            assert_eq!(pair[0].bene, pair[1].orig);
            assert!(close(pair[1].amount, pair[0].amount * (1.0 - MARGIN)));
            assert!(pair[0].step < pair[1].step, "steps must be distinct when the period allows");
        }
        assert_eq!(alert.edges[4].bene, alert.edges[0].orig);
        assert!(alert.edges.iter().all(|e| e.step >= alert.start && e.step <= alert.end));
        assert_eq!(alert.end - alert.start + 1, 20);
    }
}

#[test]
fn short_cycle_steps_are_non_decreasing() {
    let (mut graph, mut registry) = world(&["a"], 10);
    let alert = inject(&request(AmlTypologyKind::Cycle, 6, 3, Some("a")), &mut graph, &mut registry, 4);
    assert!(alert.edges.windows(2).all(|p| p[0].step <= p[1].step));
}

#[test]
fn scatter_gather_straddles_the_midpoint() {
    for seed in 0..10 {
        let (mut graph, mut registry) = world(&["a"], 10);
        let alert = inject(
            &request(AmlTypologyKind::ScatterGather, 5, 10, Some("a")),
            &mut graph,
            &mut registry,
            seed,
        );
        let TypologyShape::ScatterGather { origin, intermediates, beneficiary } = &alert.shape else {
            panic!("wrong shape {:?}", alert.shape);
        };
        assert_eq!(intermediates.len(), 3);
        assert_eq!(alert.edges.len(), 6);

        let mid = alert.start + 5;
        for hop in intermediates {
            let scatter = alert.edges.iter().find(|e| e.orig == *origin && e.bene == *hop).unwrap();
            let gather = alert.edges.iter().find(|e| e.orig == *hop && e.bene == *beneficiary).unwrap();
            assert!(scatter.step < mid);
            assert!(gather.step >= mid && gather.step <= alert.end);
            assert!(gather.amount < scatter.amount);
            assert!(close(gather.amount, scatter.amount * (1.0 - MARGIN)));
        }
    }
}

#[test]
fn gather_scatter_collects_then_pays_out() {
    let (mut graph, mut registry) = world(&["a"], 10);
    let alert = inject(&request(AmlTypologyKind::GatherScatter, 5, 10, Some("a")), &mut graph, &mut registry, 1);
    let TypologyShape::GatherScatter { originators, hub, beneficiaries } = &alert.shape else {
        panic!("wrong shape {:?}", alert.shape);
    };
    assert_eq!(originators.len(), 2);
    assert_eq!(beneficiaries.len(), 2);
    assert_eq!(alert.main, *hub);

    let mid = alert.start + 5;
    let incoming: Vec<_> = alert.edges.iter().filter(|e| e.bene == *hub).collect();
    let outgoing: Vec<_> = alert.edges.iter().filter(|e| e.orig == *hub).collect();
    assert_eq!(incoming.len(), 2);
    assert_eq!(outgoing.len(), 2);
    assert!(incoming.iter().all(|e| e.step < mid));
    assert!(outgoing.iter().all(|e| e.step >= mid));
    assert!(close(outgoing[0].amount, incoming[0].amount * (1.0 - MARGIN)));
}

#[test]
fn fan_in_gathers_on_a_hub_with_one_amount() {
    let (mut graph, mut registry) = world(&["a"], 10);
    let alert = inject(&request(AmlTypologyKind::FanIn, 4, 10, Some("a")), &mut graph, &mut registry, 2);
    assert!(alert.main < 2, "main must be one of the hubs");
    assert_eq!(alert.members.len(), 4);
    assert_eq!(alert.edges.len(), 3);
    assert!(alert.edges.iter().all(|e| e.bene == alert.main));
    let amount = alert.edges[0].amount;
    assert!(alert.edges.iter().all(|e| e.amount == amount));
    assert_eq!(alert.model_id, 2);
}

#[test]
fn external_fan_out_pays_into_another_bank() {
    let (mut graph, mut registry) = world(&["a", "b"], 10);
    let alert = inject(&request(AmlTypologyKind::FanOut, 4, 10, None), &mut graph, &mut registry, 3);
    let main_bank = alert.members[&alert.main].clone();
    for edge in &alert.edges {
        assert_eq!(edge.orig, alert.main);
        assert_ne!(alert.members[&edge.bene], main_bank);
    }
}

#[test]
fn bipartite_and_stack_wire_complete_layers() {
    let (mut graph, mut registry) = world(&["a", "b"], 20);
    let bipartite = inject(&request(AmlTypologyKind::Bipartite, 5, 10, None), &mut graph, &mut registry, 5);
    assert_eq!(bipartite.edges.len(), 2 * 3);

    let stack = inject(&request(AmlTypologyKind::Stack, 7, 10, None), &mut graph, &mut registry, 6);
    let TypologyShape::Stack { originators, intermediates, beneficiaries } = &stack.shape else {
        panic!("wrong shape {:?}", stack.shape);
    };
    assert_eq!((originators.len(), intermediates.len(), beneficiaries.len()), (2, 2, 3));
    assert_eq!(stack.edges.len(), 2 * 2 + 2 * 3);
    // Two banks: the middle tier sits in the other one.
    let orig_bank = &stack.members[&originators[0]];
    assert!(intermediates.iter().all(|a| &stack.members[a] != orig_bank));
    assert!(beneficiaries.iter().all(|a| &stack.members[a] == orig_bank));
}

#[test]
fn internal_random_walk_never_pays_itself() {
    let (mut graph, mut registry) = world(&["a"], 10);
    let alert = inject(&request(AmlTypologyKind::Random, 4, 10, Some("a")), &mut graph, &mut registry, 8);
    let TypologyShape::Walk { path } = &alert.shape else {
        panic!("wrong shape {:?}", alert.shape);
    };
    assert_eq!(path.len(), 4);
    assert_eq!(alert.edges.len(), 3);
    for (edge, hop) in alert.edges.iter().zip(path.windows(2)) {
        assert_ne!(edge.orig, edge.bene);
        assert_eq!((edge.orig, edge.bene), (hop[0], hop[1]));
    }
}

#[test]
fn instances_never_share_members() {
    let (mut graph, mut registry) = world(&["a", "b"], 30);
    let mut injector = TypologyInjector::new(MARGIN, STEPS);
    let mut rng = rng(11);
    for _ in 0..3 {
        for kind in AmlTypologyKind::ALL {
            let req = request(kind, 4, 10, None);
            if let Err(e) = injector.inject(&req, &mut graph, &mut registry, &mut rng) {
                assert!(e.is_resource_exhaustion(), "unexpected error {e}");
            }
        }
    }

    let mut seen = BTreeSet::new();
    for alert in injector.alerts() {
        for &account in alert.members.keys() {
            assert!(seen.insert(account), "account {account} claimed twice");
            assert!(!registry.is_available(account));
            assert!(graph.account(account).is_sar);
        }
    }
    let ids: Vec<u64> = injector.alerts().iter().map(|a| a.alert_id).collect();
    assert_eq!(ids, (0..ids.len() as u64).collect::<Vec<_>>());
}

#[test]
fn exhausted_plan_leaves_everything_untouched() {
    let (mut graph, mut registry) = world(&["a"], 6);
    let edges_before = graph.num_edges();
    let mut injector = TypologyInjector::new(MARGIN, STEPS);
    let err = injector
        .inject(&request(AmlTypologyKind::Bipartite, 10, 10, Some("a")), &mut graph, &mut registry, &mut rng(0))
        .unwrap_err();
    assert!(matches!(err, GenError::InsufficientCandidates { .. }));
    assert_eq!(registry.available(), 6);
    assert_eq!(graph.num_edges(), edges_before);
    assert!(injector.alerts().is_empty());
}

#[test]
fn unknown_bank_is_rejected() {
    let (mut graph, mut registry) = world(&["a"], 10);
    let mut injector = TypologyInjector::new(MARGIN, STEPS);
    let err = injector
        .inject(&request(AmlTypologyKind::Cycle, 3, 10, Some("zz")), &mut graph, &mut registry, &mut rng(0))
        .unwrap_err();
    assert!(matches!(err, GenError::NoSuchBank { ref bank_id } if bank_id == "zz"));
}

#[test]
fn non_sar_instances_leave_flags_clear() {
    let (mut graph, mut registry) = world(&["a"], 10);
    let mut req = request(AmlTypologyKind::Bipartite, 4, 10, Some("a"));
    req.is_sar = false;
    let alert = inject(&req, &mut graph, &mut registry, 9);
    assert!(!alert.is_sar);
    assert!(alert.members.keys().all(|&a| !graph.account(a).is_sar));
}

fn row(typology: &str, min_accounts: usize, min_period: u64, max_period: u64) -> AlertParamRow {
    AlertParamRow {
        count: 1,
        typology: typology.into(),
        schedule_id: 2,
        min_accounts,
        max_accounts: min_accounts + 2,
        min_amount: 100.0,
        max_amount: 1000.0,
        min_period,
        max_period,
        bank_id: None,
        is_sar: true,
    }
}

#[test]
fn alert_rows_are_validated_by_kind() {
    assert_eq!(validate_alert_row(&row("cycle", 3, 5, 10), 1, STEPS).unwrap(), Some(AmlTypologyKind::Cycle));
    assert_eq!(validate_alert_row(&row("smurfing", 3, 5, 10), 1, STEPS).unwrap(), None);

    let err = validate_alert_row(&row("scatter_gather", 5, 1, 10), 2, STEPS).unwrap_err();
    assert!(matches!(err, GenError::InvalidRow { row: 2, .. }));
    let err = validate_alert_row(&row("stack", 2, 5, 10), 3, STEPS).unwrap_err();
    assert!(matches!(err, GenError::InvalidRow { row: 3, .. }));
    let err = validate_alert_row(&row("fan_in", 3, 5, 200), 4, STEPS).unwrap_err();
    assert!(matches!(err, GenError::InvalidRow { row: 4, .. }));
}
