//! The generation event log.
//!
//! RULE: Every observable outcome of a stage is recorded as a GenEvent.
//! Two runs with the same seed and inputs must produce byte-identical
//! logs, so payloads only carry ordered, deterministic data.

use crate::normal_model::NormalModelKind;
use crate::typology::AmlTypologyKind;
use crate::types::{AccountId, Step};
use serde::{Deserialize, Serialize};

/// Every event emitted during a generator run.
/// Variants may be appended, never removed or reordered.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GenEvent {
    // ── Engine events ──────────────────────────────
    RunInitialized {
        simulation_name: String,
        seed: u64,
    },
    RunCompleted {
        accounts: usize,
        edges: usize,
        active_edges: usize,
        normal_models: usize,
        alerts: usize,
    },

    // ── Accounts and base graph ────────────────────
    AccountsLoaded {
        accounts: usize,
        banks: usize,
    },
    BaseGraphBuilt {
        nodes: usize,
        edges: usize,
        self_loops_dropped: usize,
    },
    HubsIndexed {
        threshold: usize,
        hubs: usize,
    },
    FanPatternsCounted {
        phase: String,
        threshold: usize,
        fan_in: usize,
        fan_out: usize,
    },

    // ── Nomination events ──────────────────────────
    NormalModelCreated {
        model_id: u64,
        kind: NormalModelKind,
        main: AccountId,
        members: usize,
    },
    NominationConcluded {
        kind: NormalModelKind,
        requested: usize,
        realized: usize,
    },

    // ── Typology events ────────────────────────────
    AlertInjected {
        alert_id: u64,
        typology: AmlTypologyKind,
        main: AccountId,
        members: usize,
        edges: usize,
        start: Step,
        end: Step,
        is_sar: bool,
    },
    AlertSkipped {
        typology: AmlTypologyKind,
        reason: String,
    },

    // ── Activation events ──────────────────────────
    EdgesActivated {
        normal: usize,
        alert: usize,
        total_active: usize,
    },
}

impl GenEvent {
    /// Stable string name for the event_type column.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::RunInitialized { .. } => "run_initialized",
            Self::RunCompleted { .. } => "run_completed",
            Self::AccountsLoaded { .. } => "accounts_loaded",
            Self::BaseGraphBuilt { .. } => "base_graph_built",
            Self::HubsIndexed { .. } => "hubs_indexed",
            Self::FanPatternsCounted { .. } => "fan_patterns_counted",
            Self::NormalModelCreated { .. } => "normal_model_created",
            Self::NominationConcluded { .. } => "nomination_concluded",
            Self::AlertInjected { .. } => "alert_injected",
            Self::AlertSkipped { .. } => "alert_skipped",
            Self::EdgesActivated { .. } => "edges_activated",
        }
    }
}

/// One entry of the in-memory event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub seq: u64,
    pub stage: String,
    pub event_type: String,
    pub payload: String, // JSON-serialized GenEvent
}
