use amlgraph_core::{
    config::GeneratorConfig,
    engine::{GeneratedDataset, GraphEngine},
    error::GenError,
    export::{alert_member_rows, normal_model_rows, transaction_rows, write_dataset},
    params::{AlertParamRow, GeneratorInputs},
    typology::AmlTypologyKind,
};
use std::collections::{BTreeMap, BTreeSet};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn run_default() -> (GraphEngine, GeneratedDataset) {
    init_logging();
    let mut engine = GraphEngine::build(GeneratorConfig::default_test());
    let dataset = engine.run(GeneratorInputs::default_test()).expect("default run");
    (engine, dataset)
}

#[test]
fn default_world_runs_end_to_end() {
    let (_, data) = run_default();
    let summary = &data.summary;

    assert_eq!(summary.accounts, 240);
    assert_eq!(summary.banks, 2);
    assert!(summary.hubs > 0);
    assert_eq!(summary.total_edges, data.graph.num_edges());
    assert_eq!(summary.active_edges, data.graph.active_edges().count());

    let expected: BTreeMap<AmlTypologyKind, usize> = [
        (AmlTypologyKind::FanIn, 2),
        (AmlTypologyKind::FanOut, 2),
        (AmlTypologyKind::Cycle, 2),
        (AmlTypologyKind::Bipartite, 1),
        (AmlTypologyKind::Stack, 1),
        (AmlTypologyKind::Random, 1),
        (AmlTypologyKind::ScatterGather, 1),
        (AmlTypologyKind::GatherScatter, 1),
    ]
    .into_iter()
    .collect();
    let mut realized = 0;
    for (kind, requested) in expected {
        let f = summary.typology(kind);
        assert_eq!(f.requested, requested, "{}", kind.name());
        assert!(f.realized <= f.requested);
        realized += f.realized;
    }
    assert_eq!(data.alerts.len(), realized);
    assert!(realized > 0);

    let motifs: usize = summary.normal_models.values().map(|f| f.realized).sum();
    assert_eq!(data.normal_models.len(), motifs);
}

#[test]
fn alert_members_never_overlap_motifs_or_each_other() {
    let (_, data) = run_default();
    let motif_members: BTreeSet<usize> = data.normal_models.iter().flat_map(|m| m.members.iter().copied()).collect();

    let mut seen = BTreeSet::new();
    for alert in &data.alerts {
        for &account in alert.members.keys() {
            assert!(seen.insert(account), "account {account} in two alerts");
            assert!(!motif_members.contains(&account), "account {account} in a motif and an alert");
            assert_eq!(data.graph.account(account).bank_id, alert.members[&account]);
        }
    }
}

#[test]
fn motif_and_typology_edges_are_active_and_typed() {
    let (_, data) = run_default();
    let edges = data.graph.edges();

    for alert in &data.alerts {
        for edge in &alert.edges {
            let stored = &edges[edge.edge_id as usize];
            assert!(stored.active);
            assert_eq!(stored.amount, Some(edge.amount));
            assert_eq!(stored.step, Some(edge.step));
        }
    }
    for model in &data.normal_models {
        for edge in edges {
            if model.members.contains(&edge.orig) && model.members.contains(&edge.bene) {
                assert!(edge.active, "edge {} inside model {} is inactive", edge.id, model.id);
            }
        }
    }
    for edge in data.graph.active_edges() {
        let ttype = edge.tx_type.as_deref();
        assert!(matches!(ttype, Some("TRANSFER") | Some("WIRE")), "edge {} typed {ttype:?}", edge.id);
    }
}

#[test]
fn only_active_edges_are_exported() {
    let (_, data) = run_default();
    let rows = transaction_rows(&data.graph);
    assert_eq!(rows.len(), data.graph.active_edges().count());
    assert!(rows.len() < data.graph.num_edges(), "some base edges should stay inactive");
    let edges = data.graph.edges();
    assert!(rows.iter().all(|r| edges[r.id as usize].active));
}

#[test]
fn sar_flags_match_sar_alerts() {
    let (_, data) = run_default();
    let sar_members: BTreeSet<usize> = data
        .alerts
        .iter()
        .filter(|a| a.is_sar)
        .flat_map(|a| a.members.keys().copied())
        .collect();
    let flagged: BTreeSet<usize> = data.graph.accounts().iter().filter(|a| a.is_sar).map(|a| a.id).collect();
    assert_eq!(flagged, sar_members);
    assert_eq!(data.summary.sar_accounts, flagged.len());
}

#[test]
fn member_tables_have_one_row_per_member() {
    let (_, data) = run_default();

    let alert_rows = alert_member_rows(&data.alerts);
    let members: usize = data.alerts.iter().map(|a| a.members.len()).sum();
    assert_eq!(alert_rows.len(), members);
    assert_eq!(alert_rows.iter().filter(|r| r.is_main).count(), data.alerts.len());
    assert!(alert_rows.iter().all(|r| r.min_amount <= r.max_amount));

    let model_rows = normal_model_rows(&data.normal_models);
    let members: usize = data.normal_models.iter().map(|m| m.members.len()).sum();
    assert_eq!(model_rows.len(), members);
    assert!(model_rows.iter().all(|r| !r.is_sar));
}

#[test]
fn event_log_brackets_the_stages_in_order() {
    let (engine, _) = run_default();
    let log = engine.event_log();
    assert_eq!(log.first().map(|e| e.event_type.as_str()), Some("run_initialized"));
    assert_eq!(log.last().map(|e| e.event_type.as_str()), Some("run_completed"));

    let mut stages: Vec<&str> = Vec::new();
    for entry in log {
        if stages.last() != Some(&entry.stage.as_str()) {
            stages.push(entry.stage.as_str());
        }
    }
    assert_eq!(stages, vec!["engine", "accounts", "graph", "nomination", "typology", "activation", "engine"]);
    assert!(log.iter().enumerate().all(|(i, e)| e.seq == i as u64));
}

#[test]
fn unbalanced_degree_table_fails_before_any_stage() {
    init_logging();
    let mut inputs = GeneratorInputs::default_test();
    inputs.degrees[0].in_degree += 1;
    let mut engine = GraphEngine::build(GeneratorConfig::default_test());
    let err = engine.run(inputs).unwrap_err();
    assert!(matches!(err, GenError::DegreeMismatch { .. }));
    assert!(engine.event_log().is_empty());
}

#[test]
fn account_count_must_tile_the_degree_table() {
    let mut inputs = GeneratorInputs::default_test();
    inputs.accounts[0].count += 1;
    let err = GraphEngine::build(GeneratorConfig::default_test()).run(inputs).unwrap_err();
    assert!(matches!(err, GenError::NotATileMultiple { accounts: 241, length: 10 }));
}

#[test]
fn margin_ratio_outside_unit_interval_is_rejected() {
    let mut config = GeneratorConfig::default_test();
    config.default.margin_ratio = 1.5;
    let err = GraphEngine::build(config).run(GeneratorInputs::default_test()).unwrap_err();
    assert!(matches!(err, GenError::InvalidMarginRatio { .. }));
}

#[test]
fn alert_row_naming_an_unknown_bank_is_rejected() {
    let mut inputs = GeneratorInputs::default_test();
    inputs.alert_patterns[0].bank_id = Some("bank_z".into());
    let err = GraphEngine::build(GeneratorConfig::default_test()).run(inputs).unwrap_err();
    assert!(matches!(err, GenError::NoSuchBank { ref bank_id } if bank_id == "bank_z"));
}

#[test]
fn unknown_typology_rows_are_skipped() {
    let mut inputs = GeneratorInputs::default_test();
    inputs.alert_patterns.push(AlertParamRow {
        count: 3,
        typology: "smurfing".into(),
        schedule_id: 2,
        min_accounts: 3,
        max_accounts: 3,
        min_amount: 100.0,
        max_amount: 200.0,
        min_period: 5,
        max_period: 5,
        bank_id: None,
        is_sar: true,
    });
    let data = GraphEngine::build(GeneratorConfig::default_test()).run(inputs).expect("run");
    assert!(!data.summary.typologies.contains_key("smurfing"));
    assert!(data.alerts.iter().all(|a| AmlTypologyKind::ALL.contains(&a.kind)));
}

#[test]
fn dataset_lands_on_disk() {
    let (engine, data) = run_default();
    let dir = std::env::temp_dir().join(format!("amlgraph-pipeline-{}", std::process::id()));
    let output = engine.config().output.clone();
    write_dataset(&dir, &output, &data).expect("write dataset");

    let read = |file: &str| std::fs::read_to_string(dir.join(file)).expect("read back");
    assert!(read(&output.accounts).starts_with("ACCOUNT_ID,CUSTOMER_ID,"));
    assert_eq!(read(&output.transactions).lines().count(), data.summary.active_edges + 1);
    assert!(read(&output.alert_members).starts_with("alertID,reason,"));
    assert!(read(&output.normal_models).starts_with("modelID,type,"));
    let summary: serde_json::Value = serde_json::from_str(&read(&output.summary)).expect("summary json");
    assert_eq!(summary["accounts"], 240);

    let _ = std::fs::remove_dir_all(&dir);
}
