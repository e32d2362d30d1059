//! Modified-Entry Index (C2): an auxiliary ordered index of mempool entries
//! whose cached ancestor aggregates are stale because some of their
//! ancestors have already been selected into the block.

use crate::mempool::{AncestorScore, Mempool, ModifiedEntry};
use emberchain_core::TxId;
use std::collections::{BTreeSet, HashMap};

#[derive(Default)]
pub struct ModifiedEntryIndex {
    by_txid: HashMap<TxId, ModifiedEntry>,
    by_score: BTreeSet<(AncestorScore, TxId)>,
}

impl ModifiedEntryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, txid: &TxId) -> bool {
        self.by_txid.contains_key(txid)
    }

    pub fn get(&self, txid: &TxId) -> Option<&ModifiedEntry> {
        self.by_txid.get(txid)
    }

    pub fn is_empty(&self) -> bool {
        self.by_txid.is_empty()
    }

    /// Best-scored modified entry, if any.
    pub fn peek_best(&self) -> Option<TxId> {
        self.by_score.iter().next_back().map(|(_, txid)| *txid)
    }

    pub fn erase(&mut self, txid: &TxId) -> Option<ModifiedEntry> {
        if let Some(entry) = self.by_txid.remove(txid) {
            self.by_score.remove(&(entry.score(), *txid));
            Some(entry)
        } else {
            None
        }
    }

    fn reposition(&mut self, old_score: AncestorScore, entry: ModifiedEntry) {
        self.by_score.remove(&(old_score, entry.txid));
        self.by_score.insert((entry.score(), entry.txid));
        self.by_txid.insert(entry.txid, entry);
    }

    /// Apply the committed ancestors' (size, fee, sigops) contribution to
    /// descendant `txid`, inserting it fresh from the mempool if it isn't
    /// tracked yet. Re-architecture note: removes and reinserts into the
    /// sorted view rather than mutating a multi-index container in place.
    pub fn update_for_committed_ancestor(
        &mut self,
        mempool: &Mempool,
        txid: &TxId,
        committed_size: usize,
        committed_fee: u64,
        committed_sig_checks: u64,
    ) {
        if let Some(existing) = self.by_txid.get(txid).cloned() {
            let old_score = existing.score();
            let mut updated = existing;
            updated.decrement(committed_size, committed_fee, committed_sig_checks);
            self.reposition(old_score, updated);
        } else if let Some(mempool_entry) = mempool.get(txid) {
            let mut fresh = ModifiedEntry::from_entry(&mempool_entry);
            fresh.decrement(committed_size, committed_fee, committed_sig_checks);
            self.by_score.insert((fresh.score(), fresh.txid));
            self.by_txid.insert(*txid, fresh);
        }
    }
}
