use crate::{
    degree::{directed_configuration_model, get_in_and_out_degrees},
    error::GenResult,
    event::GenEvent,
    graph::TransactionGraph,
    rng::{StageRng, StageSlot},
    stage::{GenContext, GenStage},
};

/// Builds the base transaction topology from the degree table and indexes
/// the hub accounts typologies draw their main account from.
pub struct GraphStage;

impl GraphStage {
    pub fn new() -> Self {
        Self
    }
}

impl Default for GraphStage {
    fn default() -> Self {
        Self::new()
    }
}

/// Log fan-in/fan-out pattern counts for every threshold from 2 up to
/// `threshold`, and return the event for `threshold` itself.
pub(crate) fn count_fan_patterns(graph: &TransactionGraph, threshold: usize, phase: &str) -> GenEvent {
    for th in 2..=threshold {
        let (fan_in, fan_out) = graph.fan_pattern_counts(th);
        log::info!("{phase}: fan-in / fan-out patterns with {th} neighbors: {fan_in} / {fan_out}");
    }
    let (fan_in, fan_out) = graph.fan_pattern_counts(threshold);
    GenEvent::FanPatternsCounted { phase: phase.to_string(), threshold, fan_in, fan_out }
}

impl GenStage for GraphStage {
    fn name(&self) -> &'static str {
        "graph"
    }

    fn slot(&self) -> StageSlot {
        StageSlot::Graph
    }

    fn run(&mut self, ctx: &mut GenContext, rng: &mut StageRng) -> GenResult<Vec<GenEvent>> {
        let sequences = get_in_and_out_degrees(&ctx.inputs.degrees, ctx.graph.num_accounts())?;
        let base = directed_configuration_model(&sequences.in_degrees, &sequences.out_degrees, rng)?;
        let self_loops_dropped = ctx.graph.seed_base_edges(&base)?;
        ctx.registry.index_hubs(&ctx.graph);

        let nodes = ctx.graph.num_accounts();
        let edges = ctx.graph.num_edges();
        let hubs = ctx.registry.hubs().len();
        let threshold = ctx.registry.threshold();
        ctx.summary.base_edges = edges;
        ctx.summary.self_loops_dropped = self_loops_dropped;
        ctx.summary.hubs = hubs;
        log::info!(
            "graph: {nodes} nodes, {edges} base edges ({} stubs, {self_loops_dropped} self loops dropped), {hubs} hubs at threshold {threshold}",
            base.edges.len()
        );

        let mut events = vec![
            GenEvent::BaseGraphBuilt { nodes, edges, self_loops_dropped },
            GenEvent::HubsIndexed { threshold, hubs },
        ];
        if let Some(th) = ctx.config.validation_threshold {
            events.push(count_fan_patterns(&ctx.graph, th, "graph"));
        }
        Ok(events)
    }
}
