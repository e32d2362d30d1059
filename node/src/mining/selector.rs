//! Package Selector (C3): the main `addPackageTxs` loop. Repeatedly chooses
//! the best-scored candidate between the mempool's native ancestor-score
//! index and the modified-entry index, validates it, and commits it.

use super::accountant::ResourceAccountant;
use super::modified_index::ModifiedEntryIndex;
use crate::mempool::Mempool;
use emberchain_core::TxId;
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, trace};

const CONSECUTIVE_FAILURE_BUDGET: u32 = 1000;
/// Locktimes below this threshold are interpreted as block heights, at or
/// above it as unix timestamps — the same split Bitcoin-derived consensus
/// rules use for `nLockTime`.
const LOCKTIME_THRESHOLD: u32 = 500_000_000;

#[derive(Debug, Error)]
pub enum SelectorError {
    #[error("mempool entry {0} referenced by selection is missing")]
    MissingEntry(TxId),
}

#[derive(Debug, Clone, Copy)]
pub struct SelectorConfig {
    /// Fee-rate floor in satoshis per kilobyte; packages below it are rejected.
    pub block_min_fee_rate: u64,
    /// Emit a debug log line per committed transaction.
    pub print_priority: bool,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            block_min_fee_rate: 1000,
            print_priority: false,
        }
    }
}

/// A committed transaction and the individual (not ancestor) stats it
/// contributed, in the order selection placed it — ancestors before
/// descendants, prior to canonical sort.
#[derive(Debug, Clone)]
pub struct SelectedEntry {
    pub txid: TxId,
    pub size: usize,
    pub sig_checks: u64,
    pub fee: u64,
}

pub struct SelectionResult {
    pub entries: Vec<SelectedEntry>,
    pub in_block: HashSet<TxId>,
}

/// Runs one `addPackageTxs` pass to completion against `mempool`, committing
/// into `accountant` as it goes. `height` and `lock_time_cutoff` feed the
/// per-candidate contextual finality check (§4.3 step 6).
pub fn select_packages(
    mempool: &Mempool,
    accountant: &mut ResourceAccountant,
    config: &SelectorConfig,
    height: u64,
    lock_time_cutoff: u64,
) -> Result<SelectionResult, SelectorError> {
    let mut in_block: HashSet<TxId> = HashSet::new();
    let mut failed_tx: HashSet<TxId> = HashSet::new();
    let mut modified = ModifiedEntryIndex::new();
    let mut entries = Vec::new();
    let mut consecutive_failures: u32 = 0;

    loop {
        // Step 1: the mempool-native candidate, skipping anything that has
        // gone stale — already placed, migrated into the modified index, or
        // previously rejected this pass.
        let mempool_candidate = mempool.peek_best_filtered(|txid| {
            !in_block.contains(txid) && !modified.contains(txid) && !failed_tx.contains(txid)
        });

        // Step 2: pick the best candidate between C2 and the mempool.
        let modified_best = modified.peek_best();
        let (txid, using_modified) = match (modified_best, mempool_candidate) {
            (None, None) => break,
            (Some(m), None) => (m, true),
            (None, Some(t)) => (t, false),
            (Some(m), Some(t)) => {
                let m_score = modified.get(&m).expect("just peeked").score();
                let t_entry = mempool.get(&t).ok_or(SelectorError::MissingEntry(t))?;
                if m_score > t_entry.ancestor_score() {
                    (m, true)
                } else {
                    (t, false)
                }
            }
        };

        let (package_size, package_fee, package_sig_checks) = if using_modified {
            let m = modified.get(&txid).expect("selected from modified index");
            (m.size, m.modified_fee, m.sig_checks)
        } else {
            let e = mempool.get(&txid).ok_or(SelectorError::MissingEntry(txid))?;
            (e.ancestor_size, e.ancestor_modified_fee, e.ancestor_sig_checks)
        };

        // Step 3: score gate.
        if package_fee * 1000 < config.block_min_fee_rate * package_size as u64 {
            trace!(%txid, package_fee, package_size, "package below min fee rate, rejecting");
            reject(&mut modified, &mut failed_tx, txid, using_modified);
            continue;
        }

        // Step 4: fit gate.
        if !accountant.fits(package_size, package_sig_checks) {
            trace!(%txid, package_size, package_sig_checks, "package does not fit, rejecting");
            reject(&mut modified, &mut failed_tx, txid, using_modified);
            consecutive_failures += 1;
            if consecutive_failures > CONSECUTIVE_FAILURE_BUDGET && accountant.near_full() {
                break;
            }
            continue;
        }

        // Step 5: compute the concrete ancestor-closed package to add.
        let mut package: HashSet<TxId> = mempool.calculate_ancestors(&txid);
        package.retain(|t| !in_block.contains(t));
        package.insert(txid);

        // Step 6: contextual check + size accounting over individual sizes.
        let mut sum_sizes = 0usize;
        let mut contextual_ok = true;
        for member in &package {
            let Some(member_entry) = mempool.get(member) else {
                contextual_ok = false;
                break;
            };
            if !is_final_tx(&member_entry.tx, height, lock_time_cutoff) {
                contextual_ok = false;
                break;
            }
            sum_sizes += member_entry.size;
        }
        if !contextual_ok || accountant.would_exceed_generated_size(sum_sizes) {
            trace!(%txid, "package failed contextual check, rejecting");
            reject(&mut modified, &mut failed_tx, txid, using_modified);
            continue;
        }

        // Step 7: commit in ancestor-count ascending order (a valid
        // topological order within an ancestor-closed set).
        let mut ordered: Vec<TxId> = package.into_iter().collect();
        ordered.sort_by_key(|t| mempool.get(t).map(|e| e.ancestor_count).unwrap_or(0));
        let mut committed_this_round = Vec::with_capacity(ordered.len());
        for member in ordered {
            let Some(member_entry) = mempool.get(&member) else {
                continue;
            };
            accountant.commit(member_entry.size, member_entry.sig_checks, member_entry.fee);
            in_block.insert(member);
            modified.erase(&member);
            if config.print_priority {
                debug!(%member, fee = member_entry.fee, size = member_entry.size, "committed transaction to template");
            }
            entries.push(SelectedEntry {
                txid: member,
                size: member_entry.size,
                sig_checks: member_entry.sig_checks,
                fee: member_entry.fee,
            });
            committed_this_round.push((member, member_entry));
        }
        consecutive_failures = 0;

        // Step 8: update descendants of everything just committed.
        for (committed, committed_entry) in committed_this_round {
            for descendant in mempool.calculate_descendants(&committed) {
                if in_block.contains(&descendant) {
                    continue;
                }
                modified.update_for_committed_ancestor(
                    mempool,
                    &descendant,
                    committed_entry.size,
                    committed_entry.modified_fee,
                    committed_entry.sig_checks,
                );
            }
        }
    }

    Ok(SelectionResult { entries, in_block })
}

fn reject(
    modified: &mut ModifiedEntryIndex,
    failed_tx: &mut HashSet<TxId>,
    txid: TxId,
    using_modified: bool,
) {
    if using_modified {
        modified.erase(&txid);
    }
    failed_tx.insert(txid);
}

/// Standard locktime finality check: final if zero, below the height/time
/// threshold appropriate to its encoding, or if all inputs are sequence-final.
fn is_final_tx(tx: &emberchain_core::Transaction, height: u64, lock_time_cutoff: u64) -> bool {
    if tx.lock_time == 0 {
        return true;
    }
    let threshold = if tx.lock_time < LOCKTIME_THRESHOLD {
        height
    } else {
        lock_time_cutoff
    };
    if (tx.lock_time as u64) < threshold {
        return true;
    }
    tx.inputs().iter().all(|input| input.sequence == 0xffff_ffff)
}

#[cfg(test)]
mod tests {
    use super::*;
    use emberchain_core::{OutPoint, Transaction, TxIn, TxOut};

    fn tx(seed: u8, prevout: OutPoint, size_pad: usize) -> Transaction {
        Transaction::new(
            1,
            vec![TxIn::new(prevout, vec![0u8; size_pad], 0xffff_ffff)],
            vec![TxOut::new(1000, vec![seed])],
            0,
        )
    }

    fn root(seed: u8) -> Transaction {
        tx(seed, OutPoint::new(TxId([0xaa; 32]), seed as u32), 0)
    }

    // S1 — parent-child priority inversion.
    #[test]
    fn s1_parent_child_priority_inversion() {
        let pool = Mempool::new();
        let p = root(1);
        let p_id = p.txid();
        pool.insert(p, 0, 1000, &[]).unwrap();
        let c = tx(2, OutPoint::new(p_id, 0), 0);
        let c_id = c.txid();
        pool.insert(c, 0, 10_000, &[p_id]).unwrap();

        let mut accountant = ResourceAccountant::new(1_000_000, 10_000, 1000);
        let config = SelectorConfig {
            block_min_fee_rate: 0,
            print_priority: false,
        };
        let result = select_packages(&pool, &mut accountant, &config, 100, 0).unwrap();
        let order: Vec<TxId> = result.entries.iter().map(|e| e.txid).collect();
        assert_eq!(order, vec![p_id, c_id]);
    }

    // S2 — stale descendant rescoring.
    #[test]
    fn s2_stale_descendant_rescoring() {
        let pool = Mempool::new();
        let a = root(1);
        let a_id = a.txid();
        pool.insert(a, 0, 100, &[]).unwrap();
        let b = tx(2, OutPoint::new(a_id, 0), 0);
        let b_id = b.txid();
        pool.insert(b, 0, 10_000, &[a_id]).unwrap();
        let d = tx(3, OutPoint::new(a_id, 0), 0);
        let d_id = d.txid();
        pool.insert(d, 0, 50, &[a_id]).unwrap();

        let mut accountant = ResourceAccountant::new(1_000_000, 10_000, 1000);
        let config = SelectorConfig {
            block_min_fee_rate: 0,
            print_priority: false,
        };
        let result = select_packages(&pool, &mut accountant, &config, 100, 0).unwrap();
        let selected: HashSet<TxId> = result.entries.iter().map(|e| e.txid).collect();
        assert!(selected.contains(&a_id));
        assert!(selected.contains(&b_id));
        assert!(selected.contains(&d_id));
    }

    // S3 — size cap terminates selection once the block is full.
    #[test]
    fn s3_size_cap_stops_selection() {
        let pool = Mempool::new();
        for i in 0..10u8 {
            let t = tx(i, OutPoint::new(TxId([0xaa; 32]), i as u32), 150);
            let _ = pool.insert(t, 0, (10 - i as u64) * 1_000_000, &[]).unwrap();
        }
        let mut accountant = ResourceAccountant::new(2000, 10_000, 1000);
        let config = SelectorConfig {
            block_min_fee_rate: 0,
            print_priority: false,
        };
        let result = select_packages(&pool, &mut accountant, &config, 100, 0).unwrap();
        assert!(result.entries.len() < 10);
        assert!(accountant.block_size() <= 2000);
    }

    #[test]
    fn empty_mempool_yields_no_entries() {
        let pool = Mempool::new();
        let mut accountant = ResourceAccountant::new(1_000_000, 10_000, 1000);
        let config = SelectorConfig::default();
        let result = select_packages(&pool, &mut accountant, &config, 1, 0).unwrap();
        assert!(result.entries.is_empty());
    }

    #[test]
    fn below_min_fee_rate_package_is_rejected() {
        let pool = Mempool::new();
        let t = root(1);
        let _ = pool.insert(t, 0, 1, &[]).unwrap();
        let mut accountant = ResourceAccountant::new(1_000_000, 10_000, 1000);
        let config = SelectorConfig {
            block_min_fee_rate: 1_000_000,
            print_priority: false,
        };
        let result = select_packages(&pool, &mut accountant, &config, 100, 0).unwrap();
        assert!(result.entries.is_empty());
    }
}
