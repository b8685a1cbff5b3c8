//! End-of-run summary written next to the output tables.

use crate::config::GeneratorConfig;
use crate::normal_model::NormalModelKind;
use crate::typology::AmlTypologyKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fulfillment {
    pub requested: usize,
    pub realized: usize,
}

impl Fulfillment {
    pub fn shortfall(&self) -> usize {
        self.requested.saturating_sub(self.realized)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub simulation_name: String,
    pub seed: u64,
    pub total_steps: u64,
    pub degree_threshold: usize,
    pub accounts: usize,
    pub banks: usize,
    pub base_edges: usize,
    pub self_loops_dropped: usize,
    pub hubs: usize,
    /// Keyed by motif type name.
    pub normal_models: BTreeMap<String, Fulfillment>,
    /// Keyed by typology name.
    pub typologies: BTreeMap<String, Fulfillment>,
    pub total_edges: usize,
    pub active_edges: usize,
    pub sar_accounts: usize,
}

impl RunSummary {
    pub fn new(config: &GeneratorConfig) -> Self {
        Self {
            simulation_name: config.general.simulation_name.clone(),
            seed: config.seed(),
            total_steps: config.total_steps(),
            degree_threshold: config.degree_threshold(),
            ..Self::default()
        }
    }

    pub fn record_normal(&mut self, kind: NormalModelKind, requested: usize, realized: usize) {
        let entry = self.normal_models.entry(kind.name().to_string()).or_default();
        entry.requested += requested;
        entry.realized += realized;
    }

    pub fn request_typology(&mut self, kind: AmlTypologyKind) {
        self.typologies.entry(kind.name().to_string()).or_default().requested += 1;
    }

    pub fn realize_typology(&mut self, kind: AmlTypologyKind) {
        self.typologies.entry(kind.name().to_string()).or_default().realized += 1;
    }

    pub fn normal(&self, kind: NormalModelKind) -> Fulfillment {
        self.normal_models.get(kind.name()).copied().unwrap_or_default()
    }

    pub fn typology(&self, kind: AmlTypologyKind) -> Fulfillment {
        self.typologies.get(kind.name()).copied().unwrap_or_default()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
