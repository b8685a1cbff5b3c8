//! Motif nominator: assigns normal transaction motifs to accounts of the
//! base graph.
//!
//! The driver walks the motif types round-robin (in the order they first
//! appeared in the parameter table) until every quota is spent or its
//! candidates run out. Each type pulls centers from a candidate ring; after
//! a motif is realized the center either stays in the ring (more work left)
//! or is retired. Fan-in and fan-out centers that are retired from one role
//! are promoted into the "alt" ring of the complementary role.

use crate::error::{GenError, GenResult};
use crate::graph::TransactionGraph;
use crate::normal_model::{ModelBook, NormalModelKind};
use crate::types::AccountId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Circular candidate list with a cursor. Retiring swaps the last item
/// into the cursor slot, so removal is O(1) and the cursor never dangles.
#[derive(Debug, Clone, Default)]
struct CandidateRing {
    items: Vec<AccountId>,
    cursor: usize,
}

impl CandidateRing {
    fn new(items: Vec<AccountId>) -> Self {
        Self { items, cursor: 0 }
    }

    /// Item under the cursor, wrapping to the front past the end.
    fn current(&mut self) -> Option<AccountId> {
        if self.cursor >= self.items.len() {
            self.cursor = 0;
        }
        self.items.get(self.cursor).copied()
    }

    fn advance(&mut self) {
        self.cursor += 1;
    }

    fn retire(&mut self, account: AccountId) {
        if self.items.get(self.cursor) == Some(&account) {
            self.items.swap_remove(self.cursor);
        } else {
            self.remove_value(account);
        }
    }

    fn remove_value(&mut self, account: AccountId) {
        if let Some(pos) = self.items.iter().position(|&a| a == account) {
            self.items.swap_remove(pos);
        }
    }

    fn push(&mut self, account: AccountId) {
        self.items.push(account);
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingSource {
    Primary,
    Alt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Nomination {
    pub account: AccountId,
    pub source: RingSource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quota {
    pub kind: NormalModelKind,
    pub requested: usize,
    pub remaining: usize,
    pub used: usize,
    pub schedule_id: u32,
}

pub struct Nominator<'g> {
    graph: &'g TransactionGraph,
    threshold: usize,
    quotas: Vec<Quota>,
    book: ModelBook,
    fan_in: CandidateRing,
    fan_out: CandidateRing,
    alt_fan_in: CandidateRing,
    alt_fan_out: CandidateRing,
    forward: CandidateRing,
    single: CandidateRing,
    mutual: CandidateRing,
    periodical: CandidateRing,
}

impl<'g> Nominator<'g> {
    pub fn new(graph: &'g TransactionGraph, threshold: usize) -> Self {
        let accounts = 0..graph.num_accounts();
        let sorted_by = |filter: &dyn Fn(AccountId) -> bool, key: &dyn Fn(AccountId) -> usize| {
            let mut ids: Vec<AccountId> = accounts.clone().filter(|&a| filter(a)).collect();
            ids.sort_by_key(|&a| key(a));
            ids
        };

        let fan_in = sorted_by(&|a| graph.in_degree(a) >= threshold, &|a| graph.out_degree(a));
        let fan_out = sorted_by(&|a| graph.out_degree(a) >= threshold, &|a| graph.in_degree(a));
        let forward = sorted_by(
            &|a| graph.in_degree(a) >= 1 && graph.out_degree(a) >= 1,
            &|a| graph.in_degree(a).max(graph.out_degree(a)),
        );
        let single = sorted_by(&|a| graph.out_degree(a) >= 1, &|a| graph.out_degree(a));

        Self {
            graph,
            threshold,
            quotas: Vec::new(),
            book: ModelBook::new(),
            fan_in: CandidateRing::new(fan_in),
            fan_out: CandidateRing::new(fan_out),
            alt_fan_in: CandidateRing::default(),
            alt_fan_out: CandidateRing::default(),
            forward: CandidateRing::new(forward),
            mutual: CandidateRing::new(single.clone()),
            periodical: CandidateRing::new(single.clone()),
            single: CandidateRing::new(single),
        }
    }

    /// Add `count` to the quota of `kind`. Repeated rows accumulate.
    pub fn initialize_count(&mut self, kind: NormalModelKind, count: usize, schedule_id: u32) {
        match self.quotas.iter_mut().find(|q| q.kind == kind) {
            Some(q) => {
                q.requested += count;
                q.remaining += count;
            }
            None => self.quotas.push(Quota {
                kind,
                requested: count,
                remaining: count,
                used: 0,
                schedule_id,
            }),
        }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn quotas(&self) -> &[Quota] {
        &self.quotas
    }

    pub fn book(&self) -> &ModelBook {
        &self.book
    }

    pub fn into_book(self) -> ModelBook {
        self.book
    }

    pub fn number_unused(&self) -> usize {
        self.quotas.iter().map(|q| q.remaining).sum()
    }

    pub fn has_more(&self) -> bool {
        self.number_unused() > 0
    }

    pub fn remaining(&self, kind: NormalModelKind) -> usize {
        self.quota(kind).map_or(0, |q| q.remaining)
    }

    pub fn candidate_count(&self, kind: NormalModelKind) -> usize {
        match kind {
            NormalModelKind::FanIn => self.fan_in.len() + self.alt_fan_in.len(),
            NormalModelKind::FanOut => self.fan_out.len() + self.alt_fan_out.len(),
            NormalModelKind::Forward => self.forward.len(),
            NormalModelKind::Single => self.single.len(),
            NormalModelKind::Mutual => self.mutual.len(),
            NormalModelKind::Periodical => self.periodical.len(),
        }
    }

    fn quota(&self, kind: NormalModelKind) -> Option<&Quota> {
        self.quotas.iter().find(|q| q.kind == kind)
    }

    fn quota_mut(&mut self, kind: NormalModelKind) -> Option<&mut Quota> {
        self.quotas.iter_mut().find(|q| q.kind == kind)
    }

    fn ring_mut(&mut self, kind: NormalModelKind, source: RingSource) -> &mut CandidateRing {
        match (kind, source) {
            (NormalModelKind::FanIn, RingSource::Primary) => &mut self.fan_in,
            (NormalModelKind::FanIn, RingSource::Alt) => &mut self.alt_fan_in,
            (NormalModelKind::FanOut, RingSource::Primary) => &mut self.fan_out,
            (NormalModelKind::FanOut, RingSource::Alt) => &mut self.alt_fan_out,
            (NormalModelKind::Forward, _) => &mut self.forward,
            (NormalModelKind::Single, _) => &mut self.single,
            (NormalModelKind::Mutual, _) => &mut self.mutual,
            (NormalModelKind::Periodical, _) => &mut self.periodical,
        }
    }

    // ── Candidate traversal ────────────────────────────────────────────────

    /// Next center for `kind`, or None once the type is concluded.
    /// The quota is charged by `choose_normal_model`, not here.
    pub fn next(&mut self, kind: NormalModelKind) -> Option<Nomination> {
        let picked = self.take(kind);
        if picked.is_none() {
            if let Some(quota) = self.quota_mut(kind) {
                log::info!(
                    "nomination: {} concluded with {} of {} realized",
                    kind.name(),
                    quota.used,
                    quota.requested
                );
                quota.remaining = 0;
            }
        }
        picked
    }

    fn charge(&mut self, kind: NormalModelKind) {
        if let Some(quota) = self.quota_mut(kind) {
            quota.remaining = quota.remaining.saturating_sub(1);
            quota.used += 1;
        }
    }

    fn take(&mut self, kind: NormalModelKind) -> Option<Nomination> {
        if let Some(account) = self.ring_mut(kind, RingSource::Primary).current() {
            match kind {
                NormalModelKind::FanIn => self.fan_out.remove_value(account),
                NormalModelKind::FanOut => self.fan_in.remove_value(account),
                _ => {}
            }
            return Some(Nomination { account, source: RingSource::Primary });
        }
        if matches!(kind, NormalModelKind::FanIn | NormalModelKind::FanOut) {
            if let Some(account) = self.ring_mut(kind, RingSource::Alt).current() {
                return Some(Nomination { account, source: RingSource::Alt });
            }
        }
        None
    }

    /// Retire a center that has no work left, otherwise move the cursor on.
    fn post(&mut self, kind: NormalModelKind, nomination: Nomination) {
        let account = nomination.account;
        let done = self.is_done(account, kind);
        let ring = self.ring_mut(kind, nomination.source);
        if !done {
            ring.advance();
            return;
        }
        ring.retire(account);

        if nomination.source == RingSource::Primary {
            match kind {
                NormalModelKind::FanIn if !self.is_done(account, NormalModelKind::FanOut) => {
                    self.alt_fan_out.push(account)
                }
                NormalModelKind::FanOut if !self.is_done(account, NormalModelKind::FanIn) => {
                    self.alt_fan_in.push(account)
                }
                _ => {}
            }
        }
    }

    // ── Completion tests ───────────────────────────────────────────────────

    pub fn is_done(&self, account: AccountId, kind: NormalModelKind) -> bool {
        match kind {
            NormalModelKind::FanIn => {
                self.is_done_fan(account, kind, self.graph.predecessors(account))
            }
            NormalModelKind::FanOut => {
                self.is_done_fan(account, kind, self.graph.successors(account))
            }
            NormalModelKind::Forward => self.first_uncovered_forward(account).is_none(),
            NormalModelKind::Single | NormalModelKind::Mutual | NormalModelKind::Periodical => {
                self.first_unpaired_successor(kind, account).is_none()
            }
        }
    }

    /// Done when `(absorbed mod threshold) + unabsorbed < threshold`, i.e.
    /// too few spare neighbours remain to form another full fan.
    fn is_done_fan(&self, account: AccountId, kind: NormalModelKind, neighbors: &BTreeSet<AccountId>) -> bool {
        let absorbed = neighbors
            .iter()
            .filter(|&&n| self.book.in_relationship(kind, account, &[account, n]))
            .count();
        let unabsorbed = neighbors.len() - absorbed;
        (absorbed % self.threshold) + unabsorbed < self.threshold
    }

    fn first_uncovered_forward(&self, account: AccountId) -> Option<(AccountId, AccountId)> {
        let preds = self.graph.predecessors(account);
        let succs = self.graph.successors(account);
        preds
            .iter()
            .flat_map(|&p| succs.iter().map(move |&s| (p, s)))
            .find(|&(p, s)| {
                !self
                    .book
                    .in_relationship(NormalModelKind::Forward, account, &[account, p, s])
            })
    }

    fn first_unpaired_successor(&self, kind: NormalModelKind, account: AccountId) -> Option<AccountId> {
        self.graph
            .successors(account)
            .iter()
            .copied()
            .find(|&s| !self.book.in_relationship(kind, account, &[account, s]))
    }

    // ── Fan breakdown ──────────────────────────────────────────────────────

    pub fn fan_in_breakdown(&self, hub: AccountId) -> GenResult<BTreeSet<AccountId>> {
        self.fan_breakdown_candidates(NormalModelKind::FanIn, hub, self.graph.predecessors(hub))
    }

    pub fn fan_out_breakdown(&self, hub: AccountId) -> GenResult<BTreeSet<AccountId>> {
        self.fan_breakdown_candidates(NormalModelKind::FanOut, hub, self.graph.successors(hub))
    }

    /// Neighbours not yet in a fan clump on `hub`, topped up to the
    /// threshold by taking one member at a time from oversized clumps.
    fn fan_breakdown_candidates(
        &self,
        kind: NormalModelKind,
        hub: AccountId,
        neighbors: &BTreeSet<AccountId>,
    ) -> GenResult<BTreeSet<AccountId>> {
        let mut clumps: Vec<BTreeSet<AccountId>> = self
            .book
            .centered(hub, kind)
            .map(|m| m.members_without_main())
            .collect();
        let clumped: BTreeSet<AccountId> = clumps.iter().flatten().copied().collect();
        let mut candidates: BTreeSet<AccountId> = neighbors.difference(&clumped).copied().collect();

        while candidates.len() < self.threshold {
            let mut touched = false;
            for clump in clumps.iter_mut() {
                if candidates.len() >= self.threshold {
                    break;
                }
                if clump.len() > self.threshold {
                    if let Some(member) = clump.pop_last() {
                        candidates.insert(member);
                        touched = true;
                    }
                }
            }
            if !touched {
                return Err(GenError::BreakdownInvariantViolation {
                    account: hub,
                    threshold: self.threshold,
                });
            }
        }
        Ok(candidates)
    }

    // ── Driver ─────────────────────────────────────────────────────────────

    /// Round-robin over the motif types until every quota is spent.
    pub fn build_normal_models(&mut self) -> GenResult<()> {
        while self.has_more() {
            for idx in 0..self.quotas.len() {
                let kind = self.quotas[idx].kind;
                if self.quotas[idx].remaining > 0 {
                    self.choose_normal_model(kind)?;
                }
            }
        }
        log::info!("nomination: generated {} normal models", self.book.len());
        Ok(())
    }

    /// Nominate one center for `kind` and realize one motif on it.
    /// Returns the new model id, or None if the type has concluded.
    pub fn choose_normal_model(&mut self, kind: NormalModelKind) -> GenResult<Option<u64>> {
        let Some(nomination) = self.next(kind) else {
            return Ok(None);
        };
        let center = nomination.account;

        let members: Option<BTreeSet<AccountId>> = match kind {
            NormalModelKind::FanIn | NormalModelKind::FanOut => {
                let candidates = if kind == NormalModelKind::FanIn {
                    self.fan_in_breakdown(center)?
                } else {
                    self.fan_out_breakdown(center)?
                };
                for idx in self.book.centered_indices(center, kind) {
                    self.book
                        .model_mut(idx)
                        .members
                        .retain(|m| !candidates.contains(m));
                }
                let mut members = candidates;
                members.insert(center);
                Some(members)
            }
            NormalModelKind::Forward => self
                .first_uncovered_forward(center)
                .map(|(p, s)| [center, p, s].into_iter().collect()),
            NormalModelKind::Single | NormalModelKind::Mutual | NormalModelKind::Periodical => self
                .first_unpaired_successor(kind, center)
                .map(|s| [center, s].into_iter().collect()),
        };

        let model_id = match members {
            Some(members) => {
                let schedule_id = self.quota(kind).map_or(0, |q| q.schedule_id);
                let size = members.len();
                let id = self.book.insert(kind, center, members, schedule_id);
                self.charge(kind);
                log::debug!(
                    "nomination: {} model {id} on account {center} with {size} members",
                    kind.name()
                );
                Some(id)
            }
            None => {
                log::debug!("nomination: account {center} has no {} work left", kind.name());
                None
            }
        };

        self.post(kind, nomination);
        Ok(model_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_with(n: usize) -> TransactionGraph {
        let mut g = TransactionGraph::new();
        for _ in 0..n {
            g.add_account("bank".into(), "US".into(), "I".into(), 100.0, None, None);
        }
        g
    }

    /// Account 0 receives from accounts 1..=n.
    fn fan_in_star(n: usize) -> TransactionGraph {
        let mut g = graph_with(n + 1);
        for src in 1..=n {
            g.add_edge(src, 0, None, None).unwrap();
        }
        g
    }

    #[test]
    fn breakdown_keeps_every_unclaimed_neighbour() {
        let g = fan_in_star(5);
        let nominator = Nominator::new(&g, 3);
        let candidates = nominator.fan_in_breakdown(0).unwrap();
        assert!(candidates.len() >= 3);
        assert_eq!(candidates, (1..=5).collect());
    }

    #[test]
    fn breakdown_reclaims_one_member_from_oversized_clump() {
        let g = fan_in_star(7);
        let mut nominator = Nominator::new(&g, 3);
        let clump: BTreeSet<AccountId> = [0, 1, 2, 3, 4, 5].into_iter().collect();
        nominator.book.insert(NormalModelKind::FanIn, 0, clump, 1);

        let candidates = nominator.fan_in_breakdown(0).unwrap();
        assert_eq!(candidates.len(), 3);
        assert!(candidates.contains(&6) && candidates.contains(&7));
        let reclaimed: Vec<_> = candidates.iter().filter(|&&a| a <= 5).collect();
        assert_eq!(reclaimed.len(), 1);
    }

    #[test]
    fn breakdown_without_donor_is_an_invariant_violation() {
        let g = fan_in_star(5);
        let mut nominator = Nominator::new(&g, 3);
        let clump: BTreeSet<AccountId> = [0, 1, 2, 3].into_iter().collect();
        nominator.book.insert(NormalModelKind::FanIn, 0, clump, 1);

        assert!(matches!(
            nominator.fan_in_breakdown(0),
            Err(GenError::BreakdownInvariantViolation { account: 0, threshold: 3 })
        ));
    }

    #[test]
    fn fan_completion_uses_modulo_arithmetic() {
        let g = fan_in_star(7);
        let mut nominator = Nominator::new(&g, 3);
        assert!(!nominator.is_done(0, NormalModelKind::FanIn));

        // 5 absorbed, 2 spare: 5 % 3 + 2 = 4 >= 3
        nominator
            .book
            .insert(NormalModelKind::FanIn, 0, [0, 1, 2, 3, 4, 5].into_iter().collect(), 1);
        assert!(!nominator.is_done(0, NormalModelKind::FanIn));

        // 6 absorbed, 1 spare: 6 % 3 + 1 = 1 < 3
        nominator
            .book
            .insert(NormalModelKind::FanIn, 0, [0, 6].into_iter().collect(), 1);
        assert!(nominator.is_done(0, NormalModelKind::FanIn));
    }

    #[test]
    fn ring_wraps_and_retires_in_place() {
        let mut ring = CandidateRing::new(vec![10, 20, 30]);
        assert_eq!(ring.current(), Some(10));
        ring.advance();
        ring.advance();
        ring.advance();
        assert_eq!(ring.current(), Some(10));
        ring.retire(10);
        assert_eq!(ring.current(), Some(30));
        ring.remove_value(20);
        ring.retire(30);
        assert_eq!(ring.current(), None);
    }

    #[test]
    fn taking_a_fan_in_center_removes_it_from_fan_out() {
        // Account 0 both receives from 1..=3 and sends to 4..=6.
        let mut g = graph_with(7);
        for src in 1..=3 {
            g.add_edge(src, 0, None, None).unwrap();
        }
        for dst in 4..=6 {
            g.add_edge(0, dst, None, None).unwrap();
        }
        let mut nominator = Nominator::new(&g, 3);
        nominator.initialize_count(NormalModelKind::FanIn, 1, 1);
        nominator.initialize_count(NormalModelKind::FanOut, 1, 1);
        assert_eq!(nominator.candidate_count(NormalModelKind::FanOut), 1);

        nominator.choose_normal_model(NormalModelKind::FanIn).unwrap();
        // Retired as fan-in center, promoted into the fan-out alt ring.
        assert_eq!(nominator.fan_out.len(), 0);
        assert_eq!(nominator.alt_fan_out.len(), 1);

        let id = nominator.choose_normal_model(NormalModelKind::FanOut).unwrap();
        assert!(id.is_some());
        assert!(!nominator.has_more());
    }
}
