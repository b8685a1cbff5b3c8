//! Candidate registry: the pool of accounts not yet claimed by any
//! motif or typology.
//!
//! RULE: Accounts leave the registry only through `remove` or `claim`.
//! There is no way back in. Both the bank index and the hub index are
//! updated in the same call so they never disagree.

use crate::error::{GenError, GenResult};
use crate::graph::TransactionGraph;
use crate::rng::StageRng;
use crate::types::{AccountId, BankId};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default)]
pub struct CandidateRegistry {
    threshold: usize,
    bank_to_accts: BTreeMap<BankId, BTreeSet<AccountId>>,
    acct_to_bank: BTreeMap<AccountId, BankId>,
    hubs: BTreeSet<AccountId>,
    known_banks: BTreeSet<BankId>,
}

impl CandidateRegistry {
    pub fn new(threshold: usize) -> Self {
        Self { threshold, ..Self::default() }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn register(&mut self, account: AccountId, bank: BankId) {
        self.known_banks.insert(bank.clone());
        self.bank_to_accts.entry(bank.clone()).or_default().insert(account);
        self.acct_to_bank.insert(account, bank);
    }

    /// Rebuild the hub index from the base graph: available accounts whose
    /// distinct in- or out-neighbour count meets the threshold.
    pub fn index_hubs(&mut self, graph: &TransactionGraph) {
        self.hubs = self
            .acct_to_bank
            .keys()
            .copied()
            .filter(|&a| {
                graph.in_degree(a) >= self.threshold || graph.out_degree(a) >= self.threshold
            })
            .collect();
    }

    /// Withdraw an account from every pool. No-op if already withdrawn.
    pub fn remove(&mut self, account: AccountId) {
        self.hubs.remove(&account);
        if let Some(bank) = self.acct_to_bank.remove(&account) {
            if let Some(pool) = self.bank_to_accts.get_mut(&bank) {
                pool.remove(&account);
            }
        }
    }

    /// Remove-or-fail for a whole member set. Either every account is
    /// available and all are removed, or nothing changes.
    pub fn claim(&mut self, accounts: &[AccountId]) -> GenResult<()> {
        let mut seen = BTreeSet::new();
        for &account in accounts {
            if !self.is_available(account) || !seen.insert(account) {
                return Err(GenError::DuplicateClaim { account });
            }
        }
        for &account in accounts {
            self.remove(account);
        }
        Ok(())
    }

    pub fn is_available(&self, account: AccountId) -> bool {
        self.acct_to_bank.contains_key(&account)
    }

    pub fn is_hub(&self, account: AccountId) -> bool {
        self.hubs.contains(&account)
    }

    pub fn bank_of(&self, account: AccountId) -> Option<&BankId> {
        self.acct_to_bank.get(&account)
    }

    pub fn hubs(&self) -> &BTreeSet<AccountId> {
        &self.hubs
    }

    /// Banks that still have at least one available account.
    pub fn banks(&self) -> Vec<BankId> {
        self.bank_to_accts
            .iter()
            .filter(|(_, pool)| !pool.is_empty())
            .map(|(bank, _)| bank.clone())
            .collect()
    }

    /// Whether the bank was ever registered, even if its pool is now empty.
    pub fn knows_bank(&self, bank: &str) -> bool {
        self.known_banks.contains(bank)
    }

    pub fn pool_size(&self, bank: &str) -> usize {
        self.bank_to_accts.get(bank).map_or(0, BTreeSet::len)
    }

    pub fn available(&self) -> usize {
        self.acct_to_bank.len()
    }

    /// Uniform sample of `n` available accounts from one bank.
    pub fn sample(&self, bank: &str, n: usize, rng: &mut StageRng) -> GenResult<Vec<AccountId>> {
        self.sample_excluding(Some(bank), n, &BTreeSet::new(), rng)
    }

    /// Uniform sample of `n` available accounts from any bank.
    pub fn sample_any(&self, n: usize, rng: &mut StageRng) -> GenResult<Vec<AccountId>> {
        self.sample_excluding(None, n, &BTreeSet::new(), rng)
    }

    /// Sample from a bank pool (or the whole registry) while skipping
    /// accounts already picked for the same instance.
    pub fn sample_excluding(
        &self,
        bank: Option<&str>,
        n: usize,
        exclude: &BTreeSet<AccountId>,
        rng: &mut StageRng,
    ) -> GenResult<Vec<AccountId>> {
        let pool: Vec<AccountId> = match bank {
            Some(bank) => self
                .bank_to_accts
                .get(bank)
                .map(|accts| accts.iter().copied().filter(|a| !exclude.contains(a)).collect())
                .unwrap_or_default(),
            None => self
                .acct_to_bank
                .keys()
                .copied()
                .filter(|a| !exclude.contains(a))
                .collect(),
        };
        if n > pool.len() {
            return Err(GenError::InsufficientCandidates {
                pool: bank.unwrap_or("*").to_string(),
                requested: n,
                available: pool.len(),
            });
        }
        Ok(rng.sample(&pool, n))
    }

    /// Draw one main account from the hub pool, optionally limited to a bank.
    pub fn sample_hub(
        &self,
        bank: Option<&str>,
        exclude: &BTreeSet<AccountId>,
        rng: &mut StageRng,
    ) -> GenResult<AccountId> {
        let pool: Vec<AccountId> = self
            .hubs
            .iter()
            .copied()
            .filter(|a| !exclude.contains(a))
            .filter(|a| bank.map_or(true, |b| self.acct_to_bank.get(a).map(String::as_str) == Some(b)))
            .collect();
        rng.choose(&pool).copied().ok_or_else(|| GenError::NoHubCandidates {
            pool: bank.unwrap_or("*").to_string(),
            threshold: self.threshold,
        })
    }
}
