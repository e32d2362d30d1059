//! Mempool entry types and the ancestor-score ordering they're indexed by.

use emberchain_core::{Transaction, TxId};
use std::sync::Arc;

/// A mempool-resident transaction plus the aggregate statistics the selector
/// reads without re-walking the dependency graph on every comparison.
#[derive(Debug, Clone)]
pub struct MempoolEntry {
    pub tx: Arc<Transaction>,
    pub txid: TxId,
    pub size: usize,
    pub sig_checks: u64,
    pub fee: u64,
    /// Fee after any priority adjustment; equal to `fee` unless the pool
    /// applies one (this pool does not, but the field exists for the
    /// ancestor-score formula to stay stable if one is added later).
    pub modified_fee: u64,
    pub ancestor_size: usize,
    pub ancestor_modified_fee: u64,
    pub ancestor_sig_checks: u64,
    pub ancestor_count: usize,
}

impl MempoolEntry {
    pub fn new(tx: Transaction, sig_checks: u64, fee: u64) -> Self {
        let txid = tx.txid();
        let size = tx.serialized_size();
        Self {
            tx: Arc::new(tx),
            txid,
            size,
            sig_checks,
            fee,
            modified_fee: fee,
            ancestor_size: size,
            ancestor_modified_fee: fee,
            ancestor_sig_checks: sig_checks,
            ancestor_count: 1,
        }
    }

    pub fn ancestor_score(&self) -> AncestorScore {
        AncestorScore::new(self.ancestor_modified_fee, self.ancestor_size, self.txid)
    }
}

/// Ratio of ancestor modified fee to ancestor size, compared as a cross
/// multiplication to avoid floating point, tie-broken by TxId so the order
/// is total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AncestorScore {
    pub fee: u64,
    pub size: usize,
    pub tie_break: TxId,
}

impl AncestorScore {
    pub fn new(fee: u64, size: usize, tie_break: TxId) -> Self {
        Self { fee, size, tie_break }
    }
}

impl PartialOrd for AncestorScore {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AncestorScore {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // fee / size  vs  other.fee / other.size, via cross multiplication.
        let lhs = self.fee as u128 * other.size as u128;
        let rhs = other.fee as u128 * self.size as u128;
        lhs.cmp(&rhs).then_with(|| self.tie_break.cmp(&other.tie_break))
    }
}

/// A projection of a `MempoolEntry` whose ancestor aggregates have been
/// decremented by the contributions of ancestors already placed in the
/// block under construction. Entries are removed and reinserted on mutation
/// rather than mutated in place, matching an ordered-set-plus-stable-key
/// design rather than a multi-indexed container.
#[derive(Debug, Clone)]
pub struct ModifiedEntry {
    pub txid: TxId,
    pub size: usize,
    pub modified_fee: u64,
    pub sig_checks: u64,
}

impl ModifiedEntry {
    pub fn from_entry(entry: &MempoolEntry) -> Self {
        Self {
            txid: entry.txid,
            size: entry.ancestor_size,
            modified_fee: entry.ancestor_modified_fee,
            sig_checks: entry.ancestor_sig_checks,
        }
    }

    pub fn score(&self) -> AncestorScore {
        AncestorScore::new(self.modified_fee, self.size, self.txid)
    }

    /// Subtract a committed ancestor's individual contribution. Saturating:
    /// rounding and double-counting across overlapping packages must never
    /// underflow these aggregates.
    pub fn decrement(&mut self, size: usize, fee: u64, sig_checks: u64) {
        self.size = self.size.saturating_sub(size);
        self.modified_fee = self.modified_fee.saturating_sub(fee);
        self.sig_checks = self.sig_checks.saturating_sub(sig_checks);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emberchain_core::{OutPoint, TxIn, TxOut};

    fn tx(seed: u8) -> Transaction {
        Transaction::new(
            1,
            vec![TxIn::new(OutPoint::new(TxId([seed; 32]), 0), vec![], 0xffff_ffff)],
            vec![TxOut::new(1000, vec![])],
            0,
        )
    }

    #[test]
    fn higher_feerate_scores_higher() {
        let cheap = MempoolEntry::new(tx(1), 1, 100);
        let rich = MempoolEntry::new(tx(2), 1, 10_000);
        assert!(rich.ancestor_score() > cheap.ancestor_score());
    }

    #[test]
    fn equal_feerate_ties_break_by_txid() {
        let mut a = MempoolEntry::new(tx(1), 1, 1000);
        let mut b = MempoolEntry::new(tx(2), 1, 1000);
        a.ancestor_size = 100;
        a.ancestor_modified_fee = 100;
        b.ancestor_size = 100;
        b.ancestor_modified_fee = 100;
        let ordered = a.ancestor_score().cmp(&b.ancestor_score());
        assert_eq!(ordered, a.txid.cmp(&b.txid));
    }

    #[test]
    fn decrement_does_not_underflow() {
        let mut m = ModifiedEntry {
            txid: TxId([9u8; 32]),
            size: 50,
            modified_fee: 10,
            sig_checks: 1,
        };
        m.decrement(1000, 1000, 10);
        assert_eq!(m.size, 0);
        assert_eq!(m.modified_fee, 0);
        assert_eq!(m.sig_checks, 0);
    }
}
