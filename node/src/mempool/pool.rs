//! A concrete, in-process mempool: enough of an ancestor-score index and
//! ancestor/descendant graph walk to exercise the selector and broadcast
//! coordinator against real data. Admission policy is deliberately thin —
//! duplicate and missing-parent rejection only, no RBF or fee-floor DoS
//! throttling.

use super::entry::{AncestorScore, MempoolEntry};
use dashmap::DashMap;
use emberchain_core::{Transaction, TxId};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashSet};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MempoolError {
    #[error("transaction {0} already in mempool")]
    Duplicate(TxId),
    #[error("transaction {0} references unknown parent {1}")]
    MissingParent(TxId, TxId),
    #[error("transaction {0} not found in mempool")]
    NotFound(TxId),
}

pub struct Mempool {
    entries: DashMap<TxId, MempoolEntry>,
    /// (ancestor-score, txid) mirrors the "ordered set keyed by stable
    /// reference with a separate sorted view" shape: the map above owns the
    /// data, this set only orders it.
    ordered: RwLock<BTreeSet<(AncestorScore, TxId)>>,
    parents: RwLock<std::collections::HashMap<TxId, HashSet<TxId>>>,
    children: RwLock<std::collections::HashMap<TxId, HashSet<TxId>>>,
    unbroadcast: RwLock<HashSet<TxId>>,
}

impl Default for Mempool {
    fn default() -> Self {
        Self::new()
    }
}

impl Mempool {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            ordered: RwLock::new(BTreeSet::new()),
            parents: RwLock::new(std::collections::HashMap::new()),
            children: RwLock::new(std::collections::HashMap::new()),
            unbroadcast: RwLock::new(HashSet::new()),
        }
    }

    pub fn exists(&self, txid: &TxId) -> bool {
        self.entries.contains_key(txid)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, txid: &TxId) -> Option<MempoolEntry> {
        self.entries.get(txid).map(|e| e.clone())
    }

    /// Insert `tx` with its precomputed `sig_checks`/`fee`. Parents are the
    /// in-mempool transactions it spends from; ancestor aggregates are
    /// recomputed transitively so the ordered index stays correct.
    pub fn insert(
        &self,
        tx: Transaction,
        sig_checks: u64,
        fee: u64,
        parent_txids: &[TxId],
    ) -> Result<TxId, MempoolError> {
        let txid = tx.txid();
        if self.entries.contains_key(&txid) {
            return Err(MempoolError::Duplicate(txid));
        }
        for parent in parent_txids {
            if !self.entries.contains_key(parent) {
                return Err(MempoolError::MissingParent(txid, *parent));
            }
        }

        let mut entry = MempoolEntry::new(tx, sig_checks, fee);

        let ancestors = self.calculate_ancestor_txids(parent_txids);
        let mut ancestor_size = entry.size;
        let mut ancestor_fee = entry.modified_fee;
        let mut ancestor_sig = entry.sig_checks;
        for anc in &ancestors {
            if let Some(a) = self.entries.get(anc) {
                ancestor_size += a.size;
                ancestor_fee += a.modified_fee;
                ancestor_sig += a.sig_checks;
            }
        }
        entry.ancestor_size = ancestor_size;
        entry.ancestor_modified_fee = ancestor_fee;
        entry.ancestor_sig_checks = ancestor_sig;
        entry.ancestor_count = ancestors.len() + 1;

        {
            let mut parents = self.parents.write();
            parents.insert(txid, parent_txids.iter().copied().collect());
            let mut children = self.children.write();
            for parent in parent_txids {
                children.entry(*parent).or_default().insert(txid);
            }
        }

        self.ordered.write().insert((entry.ancestor_score(), txid));
        self.entries.insert(txid, entry);
        Ok(txid)
    }

    /// Runs the same admission checks `insert` would, without committing.
    /// The broadcast coordinator's test-mode acceptance pass (§4.6 step 2a).
    pub fn test_accept(&self, tx: &Transaction, parent_txids: &[TxId]) -> Result<(), MempoolError> {
        let txid = tx.txid();
        if self.entries.contains_key(&txid) {
            return Err(MempoolError::Duplicate(txid));
        }
        for parent in parent_txids {
            if !self.entries.contains_key(parent) {
                return Err(MempoolError::MissingParent(txid, *parent));
            }
        }
        Ok(())
    }

    pub fn remove(&self, txid: &TxId) -> Result<MempoolEntry, MempoolError> {
        let (_, entry) = self
            .entries
            .remove(txid)
            .ok_or(MempoolError::NotFound(*txid))?;
        self.ordered.write().remove(&(entry.ancestor_score(), *txid));

        let mut parents = self.parents.write();
        let mut children = self.children.write();
        if let Some(my_parents) = parents.remove(txid) {
            for p in my_parents {
                if let Some(kids) = children.get_mut(&p) {
                    kids.remove(txid);
                }
            }
        }
        children.remove(txid);

        self.unbroadcast.write().remove(txid);
        Ok(entry)
    }

    /// Best-scored entry not in `exclude`, by the native ancestor-score
    /// ordering — the iterator `mi` the selector advances.
    pub fn peek_best(&self, exclude: &HashSet<TxId>) -> Option<TxId> {
        self.peek_best_filtered(|txid| !exclude.contains(txid))
    }

    /// Best-scored entry for which `keep` returns true. Used by the selector
    /// to skip entries that migrated into the modified-entry index or were
    /// marked failed, without materializing a fresh exclusion set per call.
    pub fn peek_best_filtered(&self, keep: impl Fn(&TxId) -> bool) -> Option<TxId> {
        self.ordered
            .read()
            .iter()
            .rev()
            .map(|(_, txid)| *txid)
            .find(|txid| keep(txid))
    }

    /// All mempool-resident ancestors of `txid`'s direct parents, transitively.
    fn calculate_ancestor_txids(&self, direct_parents: &[TxId]) -> HashSet<TxId> {
        let parents = self.parents.read();
        let mut seen: HashSet<TxId> = HashSet::new();
        let mut queue: Vec<TxId> = direct_parents.to_vec();
        while let Some(p) = queue.pop() {
            if seen.insert(p) {
                if let Some(grandparents) = parents.get(&p) {
                    queue.extend(grandparents.iter().copied());
                }
            }
        }
        seen
    }

    /// Full unconfirmed-ancestor closure of `txid` (excludes `txid` itself).
    pub fn calculate_ancestors(&self, txid: &TxId) -> HashSet<TxId> {
        let parents = self.parents.read();
        let mut seen = HashSet::new();
        let mut queue: Vec<TxId> = parents.get(txid).cloned().unwrap_or_default().into_iter().collect();
        while let Some(p) = queue.pop() {
            if seen.insert(p) {
                if let Some(grandparents) = parents.get(&p) {
                    queue.extend(grandparents.iter().copied());
                }
            }
        }
        seen
    }

    /// Full in-mempool descendant closure of `txid` (excludes `txid` itself).
    pub fn calculate_descendants(&self, txid: &TxId) -> HashSet<TxId> {
        let children = self.children.read();
        let mut seen = HashSet::new();
        let mut queue: Vec<TxId> = children.get(txid).cloned().unwrap_or_default().into_iter().collect();
        while let Some(c) = queue.pop() {
            if seen.insert(c) {
                if let Some(grandchildren) = children.get(&c) {
                    queue.extend(grandchildren.iter().copied());
                }
            }
        }
        seen
    }

    pub fn add_unbroadcast(&self, txid: TxId) {
        self.unbroadcast.write().insert(txid);
    }

    pub fn is_unbroadcast(&self, txid: &TxId) -> bool {
        self.unbroadcast.read().contains(txid)
    }
}
