//! Template Assembler (C5): orchestrates the resource accountant, selector,
//! and coinbase builder, populates the header, and runs the final consensus
//! sanity check.

use super::accountant::{ResourceAccountant, FIT_MARGIN_BYTES};
use super::coinbase::{build_coinbase_transaction, CoinbaseError, CoinbaseParams};
use super::merkle::calculate_merkle_root;
use super::selector::{select_packages, SelectedEntry, SelectorConfig, SelectorError};
use crate::chain::{BlockValidator, ChainTip, ConsensusParams, ValidityOptions};
use crate::mempool::Mempool;
use emberchain_core::{Block, BlockHeader, Transaction};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("selection failed: {0}")]
    Selection(#[from] SelectorError),
    #[error("coinbase construction failed: {0}")]
    Coinbase(#[from] CoinbaseError),
    #[error("assembled block failed the consensus validity check: {0}")]
    InvalidBlock(String),
}

#[derive(Debug, Clone)]
pub struct TemplateConfig {
    pub excessive_block_size: usize,
    /// `None` derives the ceiling straight from `excessive_block_size`
    /// (1000-byte margin); `Some(v)` is an explicit user override of the
    /// generated-block-size target (3000-byte margin, applied on top of the
    /// `excessive_block_size` cap).
    pub max_generated_block_size_override: Option<usize>,
    pub selector: SelectorConfig,
    pub enable_miner_fund: bool,
    /// Dev-network-only override of the header version; `None` uses 1.
    pub block_version_override: Option<u32>,
}

impl TemplateConfig {
    /// Mirrors `DefaultOptions`: with no override, the ceiling is
    /// `excessive_block_size - 1000`. With a user override, the 3000-byte
    /// safety margin is applied to the *user's* value first
    /// (`user_value - 3000`), and only then is the result capped by
    /// `excessive_block_size - 1000`. The asymmetry between the 1000-byte and
    /// 3000-byte margins is preserved faithfully per the recorded design
    /// decision — it is observable behavior in the source this was derived
    /// from, not a bug to silently fix — but the *order* (margin before cap,
    /// not cap before margin) matters: reversing it changes the result
    /// whenever the excessive-derived ceiling is the binding constraint.
    pub fn resolved_max_generated_size(&self) -> usize {
        let excessive_derived = self.excessive_block_size.saturating_sub(1000);
        match self.max_generated_block_size_override {
            Some(user_value) => {
                let adjusted = if user_value > 3000 { user_value - 3000 } else { user_value };
                adjusted.min(excessive_derived)
            }
            None => excessive_derived,
        }
    }
}

/// Assembles a new block template against the given tip, mempool, and
/// consensus/validator collaborators.
pub fn create_new_block(
    tip: &dyn ChainTip,
    consensus: &dyn ConsensusParams,
    mempool: &Mempool,
    validator: &dyn BlockValidator,
    config: &TemplateConfig,
    miner_script_pubkey: Vec<u8>,
    extra_nonce: u32,
    adjusted_time: u64,
) -> Result<Block, TemplateError> {
    let start = std::time::Instant::now();

    // Step 2: capture the tip.
    let height = tip.height() + 1;
    let max_generated_size = config.resolved_max_generated_size();
    let max_sig_checks = consensus.max_block_sig_checks(max_generated_size);

    // Step 3: populate header fields ahead of selection.
    let median_time_past = tip.median_time_past();
    let timestamp = adjusted_time.max(median_time_past + 1);
    let bits = consensus.next_work_required(tip, timestamp);
    let epoch_interval = consensus.epoch_interval();
    let epoch_block_hash = if epoch_interval > 0 && height % epoch_interval == 0 {
        tip.block_hash()
    } else {
        tip.epoch_block_hash()
    };
    // lockTimeCutoff feeds the selector's per-candidate contextual check;
    // the source never visibly initializes it before addPackageTxs, so it's
    // set explicitly here to the tip's median time past (§9 decision).
    let lock_time_cutoff = median_time_past;

    // Step 4: run the selector.
    let mut accountant = ResourceAccountant::new(max_generated_size, max_sig_checks, FIT_MARGIN_BYTES);
    let selection = select_packages(mempool, &mut accountant, &config.selector, height, lock_time_cutoff)?;

    // Step 5: canonical ordering, positions >= 1 (the coinbase occupies 0).
    let mut entries: Vec<SelectedEntry> = selection.entries;
    entries.sort_by_key(|e| e.txid);

    // Step 6: synthesize and place the coinbase.
    let total_fees = accountant.total_fees();
    let required_outputs = if config.enable_miner_fund {
        consensus.miner_fund_outputs(tip, consensus.subsidy(height, bits) + total_fees / 2)
    } else {
        Vec::new()
    };
    let coinbase = build_coinbase_transaction(CoinbaseParams {
        height,
        subsidy: consensus.subsidy(height, bits),
        total_fees,
        miner_script_pubkey,
        required_outputs,
        extra_nonce,
        excessive_block_size: config.excessive_block_size as u64,
    })?;

    let mut transactions: Vec<Transaction> = Vec::with_capacity(entries.len() + 1);
    transactions.push(coinbase);
    for entry in &entries {
        if let Some(mempool_entry) = mempool.get(&entry.txid) {
            transactions.push((*mempool_entry.tx).clone());
        }
    }

    let txids: Vec<_> = transactions.iter().map(|t| t.txid()).collect();
    let merkle_root = calculate_merkle_root(&txids);

    let header = BlockHeader {
        version: config.block_version_override.unwrap_or(1),
        prev_block_hash: tip.block_hash(),
        merkle_root,
        timestamp,
        bits,
        nonce: 0,
        height,
        epoch_block_hash,
        extended_metadata_hash: [0u8; 32],
    };
    let block = Block::new(header, transactions);

    // Step 7: process-wide observables.
    crate::stats::record_last_block(block.transactions.len() as u64, block.serialized_size() as u64);

    // Step 8: final consensus sanity check, PoW and Merkle-root disabled —
    // the miner sets those. This is the one fatal path: an internal
    // invariant is broken if a template we just built fails this.
    debug_assert!(
        block.header.merkle_root == calculate_merkle_root(&block.txids()),
        "merkle root must match the transactions just assembled"
    );
    let validity_opts = ValidityOptions {
        skip_proof_of_work: true,
        skip_merkle_root: true,
    };
    if let Err(reason) = validator.test_block_validity(&block, tip, validity_opts) {
        tracing::error!(%reason, "assembled block failed final consensus validity check");
        return Err(TemplateError::InvalidBlock(reason));
    }

    info!(
        height,
        tx_count = block.transactions.len(),
        total_fees,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "block template assembled"
    );
    debug!(merkle_root = %hex::encode(merkle_root), "template merkle root");

    Ok(block)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::fixtures::{AlwaysInvalid, AlwaysValid, FixedConsensus, FixedTip};
    use emberchain_core::{OutPoint, TxId, TxIn, TxOut};

    fn tip() -> FixedTip {
        FixedTip {
            height: 99,
            block_hash: [7u8; 32],
            median_time_past: 1_000,
            epoch_block_hash: [9u8; 32],
        }
    }

    fn consensus() -> FixedConsensus {
        FixedConsensus {
            subsidy: 5_000_000_000,
            bits: 0x1d00ffff,
            sig_checks_per_byte: 1,
            epoch_interval: 10,
            required_outputs: vec![],
        }
    }

    fn default_config() -> TemplateConfig {
        TemplateConfig {
            excessive_block_size: 32_000_000,
            max_generated_block_size_override: Some(8_000_000),
            selector: SelectorConfig {
                block_min_fee_rate: 0,
                print_priority: false,
            },
            enable_miner_fund: false,
            block_version_override: None,
        }
    }

    // Idempotence of empty-mempool template.
    #[test]
    fn empty_mempool_yields_coinbase_only_template() {
        let mempool = Mempool::new();
        let block = create_new_block(
            &tip(),
            &consensus(),
            &mempool,
            &AlwaysValid,
            &default_config(),
            vec![0xaa],
            1,
            2_000,
        )
        .unwrap();
        assert_eq!(block.transactions.len(), 1);
        assert!(block.transactions[0].is_coinbase());
    }

    // S6 — epoch boundary.
    #[test]
    fn s6_epoch_boundary_links_to_prev_block_hash() {
        let mempool = Mempool::new();
        let t = FixedTip {
            height: 9,
            block_hash: [7u8; 32],
            median_time_past: 1_000,
            epoch_block_hash: [9u8; 32],
        };
        // height = 10 is epochSize(10) * 1 -> epoch boundary.
        let block = create_new_block(
            &t,
            &consensus(),
            &mempool,
            &AlwaysValid,
            &default_config(),
            vec![0xaa],
            1,
            2_000,
        )
        .unwrap();
        assert_eq!(block.header.epoch_block_hash, t.block_hash);
    }

    #[test]
    fn non_epoch_boundary_inherits_prev_epoch_hash() {
        let mempool = Mempool::new();
        let t = FixedTip {
            height: 10,
            block_hash: [7u8; 32],
            median_time_past: 1_000,
            epoch_block_hash: [9u8; 32],
        };
        // height = 11 is not a multiple of 10.
        let block = create_new_block(
            &t,
            &consensus(),
            &mempool,
            &AlwaysValid,
            &default_config(),
            vec![0xaa],
            1,
            2_000,
        )
        .unwrap();
        assert_eq!(block.header.epoch_block_hash, t.epoch_block_hash);
    }

    #[test]
    fn timestamp_never_goes_below_median_time_past_plus_one() {
        let mempool = Mempool::new();
        let block = create_new_block(
            &tip(),
            &consensus(),
            &mempool,
            &AlwaysValid,
            &default_config(),
            vec![0xaa],
            1,
            0, // far earlier than median_time_past
        )
        .unwrap();
        assert_eq!(block.header.timestamp, tip().median_time_past + 1);
    }

    #[test]
    fn failed_validity_check_surfaces_as_error() {
        let mempool = Mempool::new();
        let result = create_new_block(
            &tip(),
            &consensus(),
            &mempool,
            &AlwaysInvalid,
            &default_config(),
            vec![0xaa],
            1,
            2_000,
        );
        assert!(matches!(result, Err(TemplateError::InvalidBlock(_))));
    }

    #[test]
    fn resolved_max_generated_size_applies_margin_before_cap() {
        // excessive_derived = 6000 - 1000 = 5000 is the binding constraint;
        // the 3000-byte margin must be applied to user_value (10000 - 3000 =
        // 7000) *before* the min, giving min(7000, 5000) = 5000 — not
        // min(10000, 5000) - 3000 = 2000.
        let config = TemplateConfig {
            excessive_block_size: 6000,
            max_generated_block_size_override: Some(10_000),
            selector: SelectorConfig::default(),
            enable_miner_fund: false,
            block_version_override: None,
        };
        assert_eq!(config.resolved_max_generated_size(), 5000);
    }

    #[test]
    fn selected_transactions_are_canonically_sorted_after_coinbase() {
        let mempool = Mempool::new();
        let a = Transaction::new(
            1,
            vec![TxIn::new(OutPoint::new(TxId::from_bytes([0xaa; 32]), 0), vec![], 0xffff_ffff)],
            vec![TxOut::new(1000, vec![1])],
            0,
        );
        let b = Transaction::new(
            1,
            vec![TxIn::new(OutPoint::new(TxId::from_bytes([0xaa; 32]), 1), vec![], 0xffff_ffff)],
            vec![TxOut::new(1000, vec![2])],
            0,
        );
        mempool.insert(a.clone(), 0, 500, &[]).unwrap();
        mempool.insert(b.clone(), 0, 500, &[]).unwrap();

        let block = create_new_block(
            &tip(),
            &consensus(),
            &mempool,
            &AlwaysValid,
            &default_config(),
            vec![0xaa],
            1,
            2_000,
        )
        .unwrap();
        let non_coinbase = &block.transactions[1..];
        let mut sorted = non_coinbase.to_vec();
        sorted.sort_by_key(|t| t.txid());
        assert_eq!(non_coinbase, sorted.as_slice());
    }
}
