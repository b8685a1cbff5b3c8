//! Account and transaction arena shared by every pipeline stage.
//!
//! Accounts and edges are referenced by dense integer ids. Stages never
//! delete from the arena: accounts are loaded once, edges are appended by
//! the graph builder and the typology injector, and activation only flips
//! flags.

use crate::degree::BaseMultigraph;
use crate::error::{GenError, GenResult};
use crate::types::{AccountId, BankId, EdgeId, Step};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub bank_id: BankId,
    pub country: String,
    pub business_type: String,
    pub init_balance: f64,
    pub open_step: Option<Step>,
    pub close_step: Option<Step>,
    pub is_sar: bool,
    /// Ids of normal models this account is a member of.
    pub normal_models: Vec<u64>,
}

impl Account {
    pub fn customer_id(&self) -> String {
        format!("C_{}", self.id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub orig: AccountId,
    pub bene: AccountId,
    pub amount: Option<f64>,
    pub step: Option<Step>,
    pub active: bool,
    pub tx_type: Option<String>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct TransactionGraph {
    accounts: Vec<Account>,
    edges: Vec<Edge>,
    out_edges: Vec<Vec<usize>>,
    successors: Vec<BTreeSet<AccountId>>,
    predecessors: Vec<BTreeSet<AccountId>>,
    next_edge_id: EdgeId,
}

impl TransactionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an account. Ids are assigned densely in load order.
    pub fn add_account(
        &mut self,
        bank_id: BankId,
        country: String,
        business_type: String,
        init_balance: f64,
        open_step: Option<Step>,
        close_step: Option<Step>,
    ) -> AccountId {
        let id = self.accounts.len();
        self.accounts.push(Account {
            id,
            bank_id,
            country,
            business_type,
            init_balance,
            open_step,
            close_step,
            is_sar: false,
            normal_models: Vec::new(),
        });
        self.out_edges.push(Vec::new());
        self.successors.push(BTreeSet::new());
        self.predecessors.push(BTreeSet::new());
        id
    }

    /// Copy the configuration-model topology into the arena.
    ///
    /// Parallel edges collapse into one base edge and unresolved
    /// self-loops are dropped. Returns the number of dropped self-loops.
    pub fn seed_base_edges(&mut self, base: &BaseMultigraph) -> GenResult<usize> {
        if base.num_nodes != self.accounts.len() {
            return Err(GenError::AccountCountMismatch {
                nodes: base.num_nodes,
                accounts: self.accounts.len(),
            });
        }
        let mut dropped = 0;
        for &(orig, bene) in &base.edges {
            if orig == bene {
                log::warn!("graph: dropping self loop from/to {orig}");
                dropped += 1;
                continue;
            }
            if self.successors[orig].contains(&bene) {
                continue;
            }
            self.add_edge(orig, bene, None, None)?;
        }
        Ok(dropped)
    }

    /// Append a transaction edge with a freshly allocated id.
    pub fn add_edge(
        &mut self,
        orig: AccountId,
        bene: AccountId,
        amount: Option<f64>,
        step: Option<Step>,
    ) -> GenResult<EdgeId> {
        self.check_account(orig)?;
        self.check_account(bene)?;
        if orig == bene {
            return Err(GenError::SelfTransaction { account: orig });
        }
        let id = self.next_edge_id;
        self.next_edge_id += 1;
        self.out_edges[orig].push(self.edges.len());
        self.edges.push(Edge {
            id,
            orig,
            bene,
            amount,
            step,
            active: false,
            tx_type: None,
        });
        self.successors[orig].insert(bene);
        self.predecessors[bene].insert(orig);
        Ok(id)
    }

    pub fn check_account(&self, account: AccountId) -> GenResult<()> {
        if account < self.accounts.len() {
            Ok(())
        } else {
            Err(GenError::UnknownAccount { account })
        }
    }

    pub fn num_accounts(&self) -> usize {
        self.accounts.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    pub fn account(&self, id: AccountId) -> &Account {
        &self.accounts[id]
    }

    pub fn account_mut(&mut self, id: AccountId) -> &mut Account {
        &mut self.accounts[id]
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn active_edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(|e| e.active)
    }

    /// Distinct accounts this account sends to.
    pub fn successors(&self, id: AccountId) -> &BTreeSet<AccountId> {
        &self.successors[id]
    }

    /// Distinct accounts this account receives from.
    pub fn predecessors(&self, id: AccountId) -> &BTreeSet<AccountId> {
        &self.predecessors[id]
    }

    pub fn in_degree(&self, id: AccountId) -> usize {
        self.predecessors[id].len()
    }

    pub fn out_degree(&self, id: AccountId) -> usize {
        self.successors[id].len()
    }

    /// Accounts with at least `threshold` distinct senders, and with at
    /// least `threshold` distinct receivers.
    pub fn fan_pattern_counts(&self, threshold: usize) -> (usize, usize) {
        let fan_in = self.predecessors.iter().filter(|p| p.len() >= threshold).count();
        let fan_out = self.successors.iter().filter(|s| s.len() >= threshold).count();
        (fan_in, fan_out)
    }

    /// Activate every edge whose endpoints both lie in `members`.
    /// Returns how many edges flipped from inactive to active.
    pub fn activate_induced(&mut self, members: &BTreeSet<AccountId>) -> usize {
        let mut flipped = 0;
        for &orig in members {
            for &idx in &self.out_edges[orig] {
                let edge = &mut self.edges[idx];
                if !edge.active && members.contains(&edge.bene) {
                    edge.active = true;
                    flipped += 1;
                }
            }
        }
        flipped
    }

    /// Activate the edges with the given ids.
    pub fn activate_ids(&mut self, ids: &[EdgeId]) -> usize {
        let mut flipped = 0;
        for &id in ids {
            // Edge ids are allocated densely, so the id is the arena index.
            if let Some(edge) = self.edges.get_mut(id as usize) {
                if !edge.active {
                    edge.active = true;
                    flipped += 1;
                }
            }
        }
        flipped
    }

    pub fn edges_mut(&mut self) -> impl Iterator<Item = &mut Edge> {
        self.edges.iter_mut()
    }
}
