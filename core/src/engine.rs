//! The generator engine: runs the pipeline end to end.
//!
//! EXECUTION ORDER (fixed, documented, never reordered):
//!   1. Accounts     : account rows into the arena and bank pools
//!   2. Graph        : degree sequences, configuration model, hub index
//!   3. Nomination   : normal motifs on the base graph
//!   4. Typology     : AML typology injection into the remaining pool
//!   5. Activation   : motif/typology edges active, transaction types
//!
//! RULES:
//!   - Stages run exactly once each, in registration order.
//!   - Every input is validated before the first stage mutates anything.
//!   - All randomness flows through the RngBank.
//!   - All stage outcomes are recorded in the event log.

use crate::{
    account_stage::AccountStage,
    activation_stage::ActivationStage,
    config::GeneratorConfig,
    degree::get_in_and_out_degrees,
    error::{GenError, GenResult},
    event::{EventLogEntry, GenEvent},
    graph::TransactionGraph,
    graph_stage::GraphStage,
    nomination_stage::NominationStage,
    normal_model::NormalModel,
    params::GeneratorInputs,
    rng::RngBank,
    stage::{GenContext, GenStage},
    summary::RunSummary,
    typology::{validate_alert_row, AlertSubgraph},
    typology_stage::TypologyStage,
    types::BankId,
};
use std::collections::BTreeSet;

/// Everything one successful run produced.
#[derive(Debug, Clone)]
pub struct GeneratedDataset {
    pub graph: TransactionGraph,
    pub normal_models: Vec<NormalModel>,
    pub alerts: Vec<AlertSubgraph>,
    pub summary: RunSummary,
}

pub struct GraphEngine {
    pub rng_bank: RngBank,
    config: GeneratorConfig,
    stages: Vec<Box<dyn GenStage>>,
    event_log: Vec<EventLogEntry>,
}

impl GraphEngine {
    pub fn new(config: GeneratorConfig) -> Self {
        Self {
            rng_bank: RngBank::new(config.seed()),
            config,
            stages: Vec::new(),
            event_log: Vec::new(),
        }
    }

    /// Build an engine with every stage registered.
    /// Call this instead of new() + manual register() calls.
    pub fn build(config: GeneratorConfig) -> Self {
        let mut engine = GraphEngine::new(config);

        // EXECUTION ORDER: fixed, documented, never reordered.
        engine.register(Box::new(AccountStage::new()));
        engine.register(Box::new(GraphStage::new()));
        engine.register(Box::new(NominationStage::new()));
        engine.register(Box::new(TypologyStage::new()));
        engine.register(Box::new(ActivationStage::new()));
        engine
    }

    /// Register a stage. Call in the documented execution order.
    pub fn register(&mut self, stage: Box<dyn GenStage>) {
        self.stages.push(stage);
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn event_log(&self) -> &[EventLogEntry] {
        &self.event_log
    }

    /// Validate the inputs, then run every stage once.
    pub fn run(&mut self, inputs: GeneratorInputs) -> GenResult<GeneratedDataset> {
        validate_inputs(&self.config, &inputs)?;
        self.event_log.clear();

        let mut ctx = GenContext::new(self.config.clone(), inputs);
        let init_event = GenEvent::RunInitialized {
            simulation_name: self.config.general.simulation_name.clone(),
            seed: self.rng_bank.master_seed(),
        };
        push_event(&mut self.event_log, "engine", &init_event)?;
        log::info!(
            "engine: starting '{}' with seed {}",
            self.config.general.simulation_name,
            self.rng_bank.master_seed()
        );

        for stage in &mut self.stages {
            let mut rng = self.rng_bank.for_stage(stage.slot());
            let events = stage.run(&mut ctx, &mut rng)?;
            for event in &events {
                push_event(&mut self.event_log, stage.name(), event)?;
            }
        }

        let done = GenEvent::RunCompleted {
            accounts: ctx.graph.num_accounts(),
            edges: ctx.graph.num_edges(),
            active_edges: ctx.graph.active_edges().count(),
            normal_models: ctx.normal_models.len(),
            alerts: ctx.alerts.len(),
        };
        push_event(&mut self.event_log, "engine", &done)?;

        Ok(GeneratedDataset {
            graph: ctx.graph,
            normal_models: ctx.normal_models,
            alerts: ctx.alerts,
            summary: ctx.summary,
        })
    }
}

fn push_event(log: &mut Vec<EventLogEntry>, stage: &str, event: &GenEvent) -> GenResult<()> {
    let entry = EventLogEntry {
        seq: log.len() as u64,
        stage: stage.to_string(),
        event_type: event.type_name().to_string(),
        payload: serde_json::to_string(event)?,
    };
    log.push(entry);
    Ok(())
}

/// Reject every configuration error before the graph is touched.
pub fn validate_inputs(config: &GeneratorConfig, inputs: &GeneratorInputs) -> GenResult<()> {
    config.validate()?;
    get_in_and_out_degrees(&inputs.degrees, inputs.total_accounts())?;

    let mut banks: BTreeSet<BankId> = BTreeSet::new();
    for (idx, row) in inputs.accounts.iter().enumerate() {
        if !(row.min_balance <= row.max_balance) {
            return Err(GenError::InvalidRow {
                table: "account table",
                row: idx + 1,
                reason: format!("min_balance ({}) exceeds max_balance ({})", row.min_balance, row.max_balance),
            });
        }
        if row.count > 0 {
            banks.insert(row.bank_id.clone().unwrap_or_else(|| config.default.bank_id.clone()));
        }
    }

    for (idx, row) in inputs.alert_patterns.iter().enumerate() {
        if validate_alert_row(row, idx + 1, config.total_steps())?.is_none() {
            continue;
        }
        if let Some(bank) = &row.bank_id {
            if !banks.contains(bank) {
                return Err(GenError::NoSuchBank { bank_id: bank.clone() });
            }
        }
    }

    if inputs.tx_types.iter().all(|row| row.frequency == 0) {
        return Err(GenError::InvalidConfig(
            "transaction type table needs at least one positive frequency".into(),
        ));
    }
    Ok(())
}
