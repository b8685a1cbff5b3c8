//! Stage trait and the shared generation context.
//!
//! RULE: Every pipeline stage implements GenStage.
//! The engine runs each registered stage exactly once, in
//! registration order. Execution order is fixed and documented
//! in engine.rs.

use crate::{
    config::GeneratorConfig,
    error::GenResult,
    event::GenEvent,
    graph::TransactionGraph,
    normal_model::NormalModel,
    params::GeneratorInputs,
    registry::CandidateRegistry,
    rng::{StageRng, StageSlot},
    summary::RunSummary,
    typology::AlertSubgraph,
};

/// State threaded through the pipeline. Stages only ever append to it:
/// later stages read what earlier ones produced.
pub struct GenContext {
    pub config: GeneratorConfig,
    pub inputs: GeneratorInputs,
    pub graph: TransactionGraph,
    pub registry: CandidateRegistry,
    pub normal_models: Vec<NormalModel>,
    pub alerts: Vec<AlertSubgraph>,
    pub summary: RunSummary,
}

impl GenContext {
    pub fn new(config: GeneratorConfig, inputs: GeneratorInputs) -> Self {
        let registry = CandidateRegistry::new(config.degree_threshold());
        let summary = RunSummary::new(&config);
        Self {
            config,
            inputs,
            graph: TransactionGraph::new(),
            registry,
            normal_models: Vec::new(),
            alerts: Vec::new(),
            summary,
        }
    }
}

/// The contract every pipeline stage must fulfill.
pub trait GenStage {
    /// Unique stable name for this stage.
    fn name(&self) -> &'static str;

    /// RNG slot this stage draws from.
    fn slot(&self) -> StageSlot;

    /// Run the stage once over the shared context.
    ///
    /// Returns the events to append to the run's event log.
    fn run(&mut self, ctx: &mut GenContext, rng: &mut StageRng) -> GenResult<Vec<GenEvent>>;
}
