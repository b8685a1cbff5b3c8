use crate::{
    error::GenResult,
    event::GenEvent,
    nominator::Nominator,
    rng::{StageRng, StageSlot},
    stage::{GenContext, GenStage},
};

/// Assigns normal motifs to the base graph and withdraws every motif
/// member from the typology candidate pool.
pub struct NominationStage;

impl NominationStage {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NominationStage {
    fn default() -> Self {
        Self::new()
    }
}

impl GenStage for NominationStage {
    fn name(&self) -> &'static str {
        "nomination"
    }

    fn slot(&self) -> StageSlot {
        StageSlot::Nomination
    }

    // Nomination is fully determined by the base graph; the stage RNG is
    // unused but keeps its slot.
    fn run(&mut self, ctx: &mut GenContext, _rng: &mut StageRng) -> GenResult<Vec<GenEvent>> {
        let mut nominator = Nominator::new(&ctx.graph, ctx.config.degree_threshold());
        for row in &ctx.inputs.normal_models {
            nominator.initialize_count(row.kind, row.count, row.schedule_id);
        }
        nominator.build_normal_models()?;
        let quotas = nominator.quotas().to_vec();
        let models = nominator.into_book().into_models();

        let mut events = Vec::with_capacity(models.len() + quotas.len());
        for model in &models {
            for &account in &model.members {
                ctx.graph.account_mut(account).normal_models.push(model.id);
                ctx.registry.remove(account);
            }
            events.push(GenEvent::NormalModelCreated {
                model_id: model.id,
                kind: model.kind,
                main: model.main,
                members: model.members.len(),
            });
        }

        for quota in &quotas {
            let realized = models.iter().filter(|m| m.kind == quota.kind).count();
            ctx.summary.record_normal(quota.kind, quota.requested, realized);
            if realized < quota.requested {
                log::warn!(
                    "nomination: {} realized {realized} of {} requested models",
                    quota.kind.name(),
                    quota.requested
                );
            }
            events.push(GenEvent::NominationConcluded {
                kind: quota.kind,
                requested: quota.requested,
                realized,
            });
        }

        log::info!(
            "nomination: {} normal models, {} accounts left for typologies",
            models.len(),
            ctx.registry.available()
        );
        ctx.normal_models = models;
        Ok(events)
    }
}
