use crate::{
    error::GenResult,
    event::GenEvent,
    graph_stage::count_fan_patterns,
    rng::{StageRng, StageSlot},
    stage::{GenContext, GenStage},
    typology::{AmlTypologyKind, TypologyInjector, TypologyRequest},
};

/// Injects every requested AML typology instance, row by row.
///
/// Running out of candidates skips the instance with a warning, except on
/// the very first instance: an empty first draw means the pool could never
/// host the batch.
pub struct TypologyStage;

impl TypologyStage {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TypologyStage {
    fn default() -> Self {
        Self::new()
    }
}

impl GenStage for TypologyStage {
    fn name(&self) -> &'static str {
        "typology"
    }

    fn slot(&self) -> StageSlot {
        StageSlot::Typology
    }

    fn run(&mut self, ctx: &mut GenContext, rng: &mut StageRng) -> GenResult<Vec<GenEvent>> {
        let mut injector = TypologyInjector::new(ctx.config.margin_ratio(), ctx.config.total_steps());
        let mut events = Vec::new();
        let mut first = true;

        for row in &ctx.inputs.alert_patterns {
            // Unknown names were reported during input validation.
            let Some(kind) = AmlTypologyKind::from_name(&row.typology) else {
                continue;
            };
            for _ in 0..row.count {
                let request = TypologyRequest::draw(kind, row, rng);
                ctx.summary.request_typology(kind);
                match injector.inject(&request, &mut ctx.graph, &mut ctx.registry, rng) {
                    Ok(alert) => {
                        ctx.summary.realize_typology(kind);
                        events.push(GenEvent::AlertInjected {
                            alert_id: alert.alert_id,
                            typology: kind,
                            main: alert.main,
                            members: alert.members.len(),
                            edges: alert.edges.len(),
                            start: alert.start,
                            end: alert.end,
                            is_sar: alert.is_sar,
                        });
                    }
                    Err(e) if e.is_resource_exhaustion() && !first => {
                        log::warn!("typology: skipped {} instance: {e}", kind.name());
                        events.push(GenEvent::AlertSkipped { typology: kind, reason: e.to_string() });
                    }
                    Err(e) => return Err(e),
                }
                first = false;
            }
        }

        ctx.alerts = injector.into_alerts();
        log::info!(
            "typology: injected {} alerts, {} accounts left in the pool",
            ctx.alerts.len(),
            ctx.registry.available()
        );
        if let Some(th) = ctx.config.validation_threshold {
            events.push(count_fan_patterns(&ctx.graph, th, "typology"));
            let alerted = ctx
                .alerts
                .iter()
                .filter(|a| ctx.graph.in_degree(a.main) >= th || ctx.graph.out_degree(a.main) >= th)
                .count();
            log::info!("typology: {alerted} alert main accounts reach {th} neighbors");
        }
        Ok(events)
    }
}
