//! AML typology injector: carves laundering subgraphs out of the
//! remaining account pool.
//!
//! RULE: Members are planned first, claimed from the registry in one
//! call, and only then wired with edges. A plan that runs out of
//! candidates leaves the registry and the graph untouched.
//!
//! RULE: An instance is external when its row names no bank and at least
//! two banks still have available accounts. External instances spread
//! their members across banks; internal ones stay inside one bank.

use crate::amount::{RandomAmount, RoundedAmount};
use crate::error::{GenError, GenResult};
use crate::graph::TransactionGraph;
use crate::params::AlertParamRow;
use crate::registry::CandidateRegistry;
use crate::rng::StageRng;
use crate::types::{AccountId, BankId, EdgeId, Step};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmlTypologyKind {
    FanOut,
    FanIn,
    Cycle,
    Bipartite,
    Stack,
    Random,
    ScatterGather,
    GatherScatter,
}

impl AmlTypologyKind {
    pub const ALL: [AmlTypologyKind; 8] = [
        Self::FanOut,
        Self::FanIn,
        Self::Cycle,
        Self::Bipartite,
        Self::Stack,
        Self::Random,
        Self::ScatterGather,
        Self::GatherScatter,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::FanOut => "fan_out",
            Self::FanIn => "fan_in",
            Self::Cycle => "cycle",
            Self::Bipartite => "bipartite",
            Self::Stack => "stack",
            Self::Random => "random",
            Self::ScatterGather => "scatter_gather",
            Self::GatherScatter => "gather_scatter",
        }
    }

    /// Alert model id written to the alert-member table.
    pub fn model_id(&self) -> u32 {
        match self {
            Self::FanOut => 1,
            Self::FanIn => 2,
            Self::Cycle => 3,
            Self::Bipartite => 4,
            Self::Stack => 5,
            Self::Random => 6,
            Self::ScatterGather => 7,
            Self::GatherScatter => 8,
        }
    }

    /// Smallest member count that still produces at least one edge.
    pub fn min_accounts(&self) -> usize {
        match self {
            Self::Stack | Self::ScatterGather | Self::GatherScatter => 3,
            _ => 2,
        }
    }

    /// Kinds whose edges straddle the midpoint need two distinct halves.
    pub fn min_period(&self) -> Step {
        match self {
            Self::ScatterGather | Self::GatherScatter => 2,
            _ => 1,
        }
    }
}

/// Check one alert row before anything is mutated. Returns None for an
/// unknown typology name, which the caller skips.
pub fn validate_alert_row(row: &AlertParamRow, index: usize, total_steps: Step) -> GenResult<Option<AmlTypologyKind>> {
    let Some(kind) = AmlTypologyKind::from_name(&row.typology) else {
        log::warn!("typology: unknown AML typology name '{}' in row {index}, skipped", row.typology);
        return Ok(None);
    };
    let invalid = |reason: String| GenError::InvalidRow { table: "alert pattern table", row: index, reason };

    if row.min_accounts < kind.min_accounts() || row.min_accounts > row.max_accounts {
        return Err(invalid(format!(
            "{} needs {} <= min_accounts ({}) <= max_accounts ({})",
            kind.name(),
            kind.min_accounts(),
            row.min_accounts,
            row.max_accounts
        )));
    }
    if row.min_period < kind.min_period() || row.min_period > row.max_period || row.max_period > total_steps {
        return Err(invalid(format!(
            "{} needs {} <= min_period ({}) <= max_period ({}) <= total steps ({total_steps})",
            kind.name(),
            kind.min_period(),
            row.min_period,
            row.max_period
        )));
    }
    if !(row.min_amount >= 0.0 && row.min_amount <= row.max_amount && row.max_amount.is_finite()) {
        return Err(invalid(format!(
            "amount range [{}, {}] is invalid",
            row.min_amount, row.max_amount
        )));
    }
    Ok(Some(kind))
}

/// One typology instance, with its member count and period already drawn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypologyRequest {
    pub kind: AmlTypologyKind,
    pub num_accounts: usize,
    pub min_amount: f64,
    pub max_amount: f64,
    pub period: Step,
    pub bank_id: Option<BankId>,
    pub schedule_id: u32,
    pub is_sar: bool,
}

impl TypologyRequest {
    pub fn draw(kind: AmlTypologyKind, row: &AlertParamRow, rng: &mut StageRng) -> Self {
        let num_accounts = rng.range_inclusive(row.min_accounts as u64, row.max_accounts as u64) as usize;
        let period = rng.range_inclusive(row.min_period, row.max_period);
        Self {
            kind,
            num_accounts,
            min_amount: row.min_amount,
            max_amount: row.max_amount,
            period,
            bank_id: row.bank_id.clone(),
            schedule_id: row.schedule_id,
            is_sar: row.is_sar,
        }
    }
}

/// Member layout of one instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum TypologyShape {
    FanIn { main: AccountId, originators: Vec<AccountId> },
    FanOut { main: AccountId, beneficiaries: Vec<AccountId> },
    Bipartite { originators: Vec<AccountId>, beneficiaries: Vec<AccountId> },
    Stack {
        originators: Vec<AccountId>,
        intermediates: Vec<AccountId>,
        beneficiaries: Vec<AccountId>,
    },
    /// Consecutive accounts in `path` are joined by one hop each.
    Walk { path: Vec<AccountId> },
    Cycle { ring: Vec<AccountId> },
    ScatterGather { origin: AccountId, intermediates: Vec<AccountId>, beneficiary: AccountId },
    GatherScatter { originators: Vec<AccountId>, hub: AccountId, beneficiaries: Vec<AccountId> },
}

impl TypologyShape {
    pub fn main(&self) -> Option<AccountId> {
        match self {
            Self::FanIn { main, .. } | Self::FanOut { main, .. } => Some(*main),
            Self::Bipartite { originators, .. } | Self::Stack { originators, .. } => originators.first().copied(),
            Self::Walk { path } => path.first().copied(),
            Self::Cycle { ring } => ring.first().copied(),
            Self::ScatterGather { origin, .. } => Some(*origin),
            Self::GatherScatter { hub, .. } => Some(*hub),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertEdge {
    pub edge_id: EdgeId,
    pub orig: AccountId,
    pub bene: AccountId,
    pub amount: f64,
    pub step: Step,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertSubgraph {
    pub alert_id: u64,
    pub kind: AmlTypologyKind,
    pub model_id: u32,
    pub schedule_id: u32,
    pub start: Step,
    pub end: Step,
    pub is_sar: bool,
    pub main: AccountId,
    pub members: BTreeMap<AccountId, BankId>,
    pub edges: Vec<AlertEdge>,
    pub shape: TypologyShape,
}

impl AlertSubgraph {
    pub fn edge_ids(&self) -> Vec<EdgeId> {
        self.edges.iter().map(|e| e.edge_id).collect()
    }

    /// Smallest and largest amount on edges touching `account`.
    pub fn amount_range(&self, account: AccountId) -> Option<(f64, f64)> {
        self.edges
            .iter()
            .filter(|e| e.orig == account || e.bene == account)
            .map(|e| e.amount)
            .fold(None, |acc, a| match acc {
                None => Some((a, a)),
                Some((lo, hi)) => Some((lo.min(a), hi.max(a))),
            })
    }
}

// ── Member planning ─────────────────────────────────────────────────────────

/// Draws members for one instance without touching the registry. Accounts
/// picked earlier in the same plan are excluded from later draws.
struct MemberPicker<'r> {
    registry: &'r CandidateRegistry,
    taken: BTreeSet<AccountId>,
    banks: BTreeMap<AccountId, BankId>,
    order: Vec<AccountId>,
}

impl<'r> MemberPicker<'r> {
    fn new(registry: &'r CandidateRegistry) -> Self {
        Self { registry, taken: BTreeSet::new(), banks: BTreeMap::new(), order: Vec::new() }
    }

    fn record(&mut self, account: AccountId, bank: BankId) {
        self.taken.insert(account);
        self.banks.insert(account, bank);
        self.order.push(account);
    }

    fn pick(&mut self, bank: &str, n: usize, rng: &mut StageRng) -> GenResult<Vec<AccountId>> {
        let picked = self.registry.sample_excluding(Some(bank), n, &self.taken, rng)?;
        for &account in &picked {
            self.record(account, bank.to_string());
        }
        Ok(picked)
    }

    fn pick_one(&mut self, bank: &str, rng: &mut StageRng) -> GenResult<AccountId> {
        let picked = self.pick(bank, 1, rng)?;
        picked.first().copied().ok_or_else(|| GenError::InsufficientCandidates {
            pool: bank.to_string(),
            requested: 1,
            available: 0,
        })
    }

    /// Main account from the hub pool. Returns the hub and its bank.
    fn hub(&mut self, bank: Option<&str>, rng: &mut StageRng) -> GenResult<(AccountId, BankId)> {
        let hub = self.registry.sample_hub(bank, &self.taken, rng)?;
        let hub_bank = self
            .registry
            .bank_of(hub)
            .cloned()
            .ok_or(GenError::UnknownAccount { account: hub })?;
        self.record(hub, hub_bank.clone());
        Ok((hub, hub_bank))
    }
}

fn choose_bank(candidates: &[BankId], rng: &mut StageRng) -> GenResult<BankId> {
    rng.choose(candidates)
        .cloned()
        .ok_or_else(|| GenError::InsufficientCandidates { pool: "*".into(), requested: 1, available: 0 })
}

// ── Injector ────────────────────────────────────────────────────────────────

pub struct TypologyInjector {
    margin_ratio: f64,
    total_steps: Step,
    next_alert_id: u64,
    alerts: Vec<AlertSubgraph>,
}

impl TypologyInjector {
    pub fn new(margin_ratio: f64, total_steps: Step) -> Self {
        Self { margin_ratio, total_steps, next_alert_id: 0, alerts: Vec::new() }
    }

    pub fn alerts(&self) -> &[AlertSubgraph] {
        &self.alerts
    }

    pub fn into_alerts(self) -> Vec<AlertSubgraph> {
        self.alerts
    }

    /// Plan, claim and wire one typology instance.
    pub fn inject(
        &mut self,
        request: &TypologyRequest,
        graph: &mut TransactionGraph,
        registry: &mut CandidateRegistry,
        rng: &mut StageRng,
    ) -> GenResult<&AlertSubgraph> {
        if let Some(bank) = request.bank_id.as_deref() {
            if !registry.knows_bank(bank) {
                return Err(GenError::NoSuchBank { bank_id: bank.to_string() });
            }
        }
        if request.period < request.kind.min_period() || request.period > self.total_steps {
            return Err(GenError::InvalidConfig(format!(
                "{} period {} must be within [{}, {}]",
                request.kind.name(),
                request.period,
                request.kind.min_period(),
                self.total_steps
            )));
        }
        if request.num_accounts < request.kind.min_accounts() {
            return Err(GenError::InvalidConfig(format!(
                "{} needs at least {} accounts, got {}",
                request.kind.name(),
                request.kind.min_accounts(),
                request.num_accounts
            )));
        }
        let external = request.bank_id.is_none() && registry.banks().len() >= 2;

        let start = rng.range_inclusive(0, self.total_steps - request.period);
        let end = start + request.period - 1;

        let (shape, members) = self.plan(request, external, registry, rng)?;
        let main = shape.main().ok_or(GenError::InsufficientCandidates {
            pool: request.bank_id.clone().unwrap_or_else(|| "*".into()),
            requested: request.num_accounts,
            available: 0,
        })?;
        let claimed: Vec<AccountId> = members.keys().copied().collect();
        registry.claim(&claimed)?;

        let edges = self.wire(&shape, request, start, end, graph, rng)?;
        if request.is_sar {
            for &account in members.keys() {
                graph.account_mut(account).is_sar = true;
            }
        }

        let alert = AlertSubgraph {
            alert_id: self.next_alert_id,
            kind: request.kind,
            model_id: request.kind.model_id(),
            schedule_id: request.schedule_id,
            start,
            end,
            is_sar: request.is_sar,
            main,
            members,
            edges,
            shape,
        };
        self.next_alert_id += 1;
        log::debug!(
            "typology: alert {} {} with {} members and {} edges in steps [{start}, {end}]{}",
            alert.alert_id,
            alert.kind.name(),
            alert.members.len(),
            alert.edges.len(),
            if external { " across banks" } else { "" }
        );
        self.alerts.push(alert);
        Ok(&self.alerts[self.alerts.len() - 1])
    }

    fn plan(
        &self,
        request: &TypologyRequest,
        external: bool,
        registry: &CandidateRegistry,
        rng: &mut StageRng,
    ) -> GenResult<(TypologyShape, BTreeMap<AccountId, BankId>)> {
        let n = request.num_accounts;
        let named = request.bank_id.as_deref();
        let mut picker = MemberPicker::new(registry);

        let shape = match request.kind {
            AmlTypologyKind::FanIn | AmlTypologyKind::FanOut => {
                let (main, main_bank) = picker.hub(named, rng)?;
                let satellites = n - 1;
                let sub_bank = if external {
                    let eligible: Vec<BankId> = registry
                        .banks()
                        .into_iter()
                        .filter(|b| *b != main_bank && registry.pool_size(b) >= satellites)
                        .collect();
                    if eligible.is_empty() {
                        return Err(GenError::NoEligibleBank { exclude: main_bank, needed: satellites });
                    }
                    choose_bank(&eligible, rng)?
                } else {
                    main_bank
                };
                let others = picker.pick(&sub_bank, satellites, rng)?;
                if request.kind == AmlTypologyKind::FanIn {
                    TypologyShape::FanIn { main, originators: others }
                } else {
                    TypologyShape::FanOut { main, beneficiaries: others }
                }
            }

            AmlTypologyKind::Bipartite => {
                let banks = registry.banks();
                let orig_bank = match named {
                    Some(bank) => bank.to_string(),
                    None => choose_bank(&banks, rng)?,
                };
                let bene_bank = if external {
                    let others: Vec<BankId> = banks.into_iter().filter(|b| *b != orig_bank).collect();
                    choose_bank(&others, rng)?
                } else {
                    orig_bank.clone()
                };
                let num_orig = n / 2;
                let originators = picker.pick(&orig_bank, num_orig, rng)?;
                let beneficiaries = picker.pick(&bene_bank, n - num_orig, rng)?;
                TypologyShape::Bipartite { originators, beneficiaries }
            }

            AmlTypologyKind::Stack => {
                let [orig_bank, mid_bank, bene_bank] = self.layer_banks(external, named, registry, rng)?;
                let tier = n / 3;
                let originators = picker.pick(&orig_bank, tier, rng)?;
                let intermediates = picker.pick(&mid_bank, tier, rng)?;
                let beneficiaries = picker.pick(&bene_bank, n - 2 * tier, rng)?;
                TypologyShape::Stack { originators, intermediates, beneficiaries }
            }

            AmlTypologyKind::Random => {
                let path = if external {
                    let banks = registry.banks();
                    let mut path = Vec::with_capacity(n);
                    for bank in banks.iter().cycle().take(n) {
                        path.push(picker.pick_one(bank, rng)?);
                    }
                    path
                } else {
                    let (main, main_bank) = picker.hub(named, rng)?;
                    let others = picker.pick(&main_bank, n - 1, rng)?;
                    let mut path = vec![main];
                    for _ in 0..n - 1 {
                        let prev = path[path.len() - 1];
                        let choices: Vec<AccountId> = others.iter().copied().filter(|&a| a != prev).collect();
                        match rng.choose(&choices) {
                            Some(&next) => path.push(next),
                            None => break,
                        }
                    }
                    path
                };
                TypologyShape::Walk { path }
            }

            AmlTypologyKind::Cycle => {
                let ring = if external {
                    let mut banks = registry.banks();
                    let mut ring = Vec::with_capacity(n);
                    let mut remaining = n;
                    while let Some(bank) = banks.pop() {
                        let share = remaining / (banks.len() + 1);
                        let picked = picker.pick(&bank, share, rng)?;
                        remaining -= picked.len();
                        ring.extend(picked);
                    }
                    ring
                } else {
                    let (main, main_bank) = picker.hub(named, rng)?;
                    let mut ring = vec![main];
                    ring.extend(picker.pick(&main_bank, n - 1, rng)?);
                    ring
                };
                TypologyShape::Cycle { ring }
            }

            AmlTypologyKind::ScatterGather => {
                let [orig_bank, mid_bank, bene_bank] = self.layer_banks(external, named, registry, rng)?;
                let origin = picker.pick_one(&orig_bank, rng)?;
                let intermediates = picker.pick(&mid_bank, n - 2, rng)?;
                let beneficiary = picker.pick_one(&bene_bank, rng)?;
                TypologyShape::ScatterGather { origin, intermediates, beneficiary }
            }

            AmlTypologyKind::GatherScatter => {
                let [orig_bank, mid_bank, bene_bank] = self.layer_banks(external, named, registry, rng)?;
                let side = (n - 1) / 2;
                let originators = picker.pick(&orig_bank, side, rng)?;
                let hub = picker.pick_one(&mid_bank, rng)?;
                let beneficiaries = picker.pick(&bene_bank, side, rng)?;
                TypologyShape::GatherScatter { originators, hub, beneficiaries }
            }
        };

        Ok((shape, picker.banks))
    }

    /// Originator, intermediate and beneficiary banks for layered shapes.
    /// External instances use three distinct banks when available, else two
    /// with the beneficiaries back in the originator bank.
    fn layer_banks(
        &self,
        external: bool,
        named: Option<&str>,
        registry: &CandidateRegistry,
        rng: &mut StageRng,
    ) -> GenResult<[BankId; 3]> {
        let banks = registry.banks();
        if !external {
            let bank = match named {
                Some(bank) => bank.to_string(),
                None => choose_bank(&banks, rng)?,
            };
            return Ok([bank.clone(), bank.clone(), bank]);
        }
        if banks.len() >= 3 {
            let picked = rng.sample(&banks, 3);
            Ok([picked[0].clone(), picked[1].clone(), picked[2].clone()])
        } else {
            let picked = rng.sample(&banks, 2);
            Ok([picked[0].clone(), picked[1].clone(), picked[0].clone()])
        }
    }

    fn wire(
        &self,
        shape: &TypologyShape,
        request: &TypologyRequest,
        start: Step,
        end: Step,
        graph: &mut TransactionGraph,
        rng: &mut StageRng,
    ) -> GenResult<Vec<AlertEdge>> {
        let random = RandomAmount::new(request.min_amount, request.max_amount);
        let keep = 1.0 - self.margin_ratio;
        let mut edges = Vec::new();
        let mut add = |orig: AccountId, bene: AccountId, amount: f64, step: Step| -> GenResult<()> {
            let edge_id = graph.add_edge(orig, bene, Some(amount), Some(step))?;
            edges.push(AlertEdge { edge_id, orig, bene, amount, step });
            Ok(())
        };

        match shape {
            TypologyShape::FanIn { main, originators } => {
                let amount = RoundedAmount::new(request.min_amount, request.max_amount).draw(rng);
                for &orig in originators {
                    add(orig, *main, amount, rng.range_inclusive(start, end))?;
                }
            }
            TypologyShape::FanOut { main, beneficiaries } => {
                let amount = RoundedAmount::new(request.min_amount, request.max_amount).draw(rng);
                for &bene in beneficiaries {
                    add(*main, bene, amount, rng.range_inclusive(start, end))?;
                }
            }
            TypologyShape::Bipartite { originators, beneficiaries } => {
                for &orig in originators {
                    for &bene in beneficiaries {
                        add(orig, bene, random.draw(rng), rng.range_inclusive(start, end))?;
                    }
                }
            }
            TypologyShape::Stack { originators, intermediates, beneficiaries } => {
                for (senders, receivers) in [(originators, intermediates), (intermediates, beneficiaries)] {
                    for &orig in senders {
                        for &bene in receivers {
                            add(orig, bene, random.draw(rng), rng.range_inclusive(start, end))?;
                        }
                    }
                }
            }
            TypologyShape::Walk { path } => {
                let amount = random.draw(rng);
                for hop in path.windows(2) {
                    add(hop[0], hop[1], amount, rng.range_inclusive(start, end))?;
                }
            }
            TypologyShape::Cycle { ring } => {
                let n = ring.len();
                let period = end - start + 1;
                // Distinct steps whenever the window is wide enough.
                let mut steps: Vec<Step> = if period >= n as Step {
                    let window: Vec<Step> = (start..=end).collect();
                    rng.sample(&window, n)
                } else {
                    (0..n).map(|_| rng.range_inclusive(start, end)).collect()
                };
                steps.sort_unstable();
                let mut amount = random.draw(rng);
                for (i, &step) in steps.iter().enumerate() {
                    add(ring[i], ring[(i + 1) % n], amount, step)?;
                    amount *= keep;
                }
            }
            TypologyShape::ScatterGather { origin, intermediates, beneficiary } => {
                let mid = start + (end - start + 1) / 2;
                for &hop in intermediates {
                    let scatter = random.draw(rng);
                    add(*origin, hop, scatter, rng.range_inclusive(start, mid - 1))?;
                    add(hop, *beneficiary, scatter * keep, rng.range_inclusive(mid, end))?;
                }
            }
            TypologyShape::GatherScatter { originators, hub, beneficiaries } => {
                let mid = start + (end - start + 1) / 2;
                let amount = random.draw(rng);
                for &orig in originators {
                    add(orig, *hub, amount, rng.range_inclusive(start, mid - 1))?;
                }
                for &bene in beneficiaries {
                    add(*hub, bene, amount * keep, rng.range_inclusive(mid, end))?;
                }
            }
        }
        Ok(edges)
    }
}
