//! Normal (non-laundering) transaction motifs.

use crate::types::AccountId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalModelKind {
    FanIn,
    FanOut,
    Forward,
    Single,
    Mutual,
    Periodical,
}

impl NormalModelKind {
    pub const ALL: [NormalModelKind; 6] = [
        Self::FanIn,
        Self::FanOut,
        Self::Forward,
        Self::Single,
        Self::Mutual,
        Self::Periodical,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::FanIn => "fan_in",
            Self::FanOut => "fan_out",
            Self::Forward => "forward",
            Self::Single => "single",
            Self::Mutual => "mutual",
            Self::Periodical => "periodical",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalModel {
    pub id: u64,
    pub kind: NormalModelKind,
    pub members: BTreeSet<AccountId>,
    pub main: AccountId,
    pub schedule_id: u32,
}

impl NormalModel {
    pub fn is_main(&self, account: AccountId) -> bool {
        account == self.main
    }

    pub fn members_without_main(&self) -> BTreeSet<AccountId> {
        self.members.iter().copied().filter(|&a| a != self.main).collect()
    }

    /// True when every account in `accounts` is a member.
    pub fn covers(&self, accounts: &[AccountId]) -> bool {
        accounts.iter().all(|a| self.members.contains(a))
    }
}

/// Realized motifs, indexed by `(main account, kind)`.
#[derive(Debug, Clone, Default)]
pub struct ModelBook {
    models: Vec<NormalModel>,
    by_main: BTreeMap<(AccountId, NormalModelKind), Vec<usize>>,
    next_id: u64,
}

impl ModelBook {
    /// Model ids start at 1.
    pub fn new() -> Self {
        Self { next_id: 1, ..Self::default() }
    }

    pub fn insert(
        &mut self,
        kind: NormalModelKind,
        main: AccountId,
        members: BTreeSet<AccountId>,
        schedule_id: u32,
    ) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.by_main.entry((main, kind)).or_default().push(self.models.len());
        self.models.push(NormalModel { id, kind, members, main, schedule_id });
        id
    }

    /// Models of `kind` whose main account is `main`.
    pub fn centered(&self, main: AccountId, kind: NormalModelKind) -> impl Iterator<Item = &NormalModel> {
        self.by_main
            .get(&(main, kind))
            .into_iter()
            .flatten()
            .map(|&idx| &self.models[idx])
    }

    pub(crate) fn centered_indices(&self, main: AccountId, kind: NormalModelKind) -> Vec<usize> {
        self.by_main.get(&(main, kind)).cloned().unwrap_or_default()
    }

    /// Whether some `kind` motif centered on `main` already contains every
    /// account in `accounts`.
    pub fn in_relationship(&self, kind: NormalModelKind, main: AccountId, accounts: &[AccountId]) -> bool {
        self.centered(main, kind).any(|m| m.covers(accounts))
    }

    pub(crate) fn model_mut(&mut self, idx: usize) -> &mut NormalModel {
        &mut self.models[idx]
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn models(&self) -> &[NormalModel] {
        &self.models
    }

    pub fn into_models(self) -> Vec<NormalModel> {
        self.models
    }
}
