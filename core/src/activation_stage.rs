use crate::{
    error::GenResult,
    event::GenEvent,
    rng::{StageRng, StageSlot},
    stage::{GenContext, GenStage},
};

/// Activates motif and typology edges and assigns each active edge a
/// transaction type. Base edges outside every motif stay inactive.
pub struct ActivationStage;

impl ActivationStage {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ActivationStage {
    fn default() -> Self {
        Self::new()
    }
}

impl GenStage for ActivationStage {
    fn name(&self) -> &'static str {
        "activation"
    }

    fn slot(&self) -> StageSlot {
        StageSlot::Activation
    }

    fn run(&mut self, ctx: &mut GenContext, rng: &mut StageRng) -> GenResult<Vec<GenEvent>> {
        let mut normal = 0;
        for model in &ctx.normal_models {
            normal += ctx.graph.activate_induced(&model.members);
        }
        let mut alert = 0;
        for subgraph in &ctx.alerts {
            alert += ctx.graph.activate_ids(&subgraph.edge_ids());
        }

        let tx_types: Vec<(String, u64)> = ctx
            .inputs
            .tx_types
            .iter()
            .map(|row| (row.ttype.clone(), row.frequency))
            .collect();
        for edge in ctx.graph.edges_mut().filter(|e| e.active) {
            edge.tx_type = rng.weighted(&tx_types).cloned();
        }

        let total_active = ctx.graph.active_edges().count();
        ctx.summary.total_edges = ctx.graph.num_edges();
        ctx.summary.active_edges = total_active;
        ctx.summary.sar_accounts = ctx.graph.accounts().iter().filter(|a| a.is_sar).count();
        log::info!(
            "activation: {total_active} of {} edges active ({normal} motif, {alert} typology)",
            ctx.graph.num_edges()
        );

        Ok(vec![GenEvent::EdgesActivated { normal, alert, total_active }])
    }
}
