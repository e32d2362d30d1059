//! Coinbase Builder (C4): the first transaction, with required protocol
//! outputs, size-padding, and extra-nonce rolling for the miner search.

use super::merkle::calculate_merkle_root;
use emberchain_core::{Block, OutPoint, Transaction, TxIn, TxOut};
use thiserror::Error;

/// Coinbase transactions below this serialized size are padded; a handful
/// of legacy consensus rules key off a minimum transaction size.
pub const MIN_TX_SIZE: usize = 100;
/// Maximum length of the coinbase's unlocking script.
pub const MAX_COINBASE_SCRIPT_SIG_SIZE: usize = 100;

#[derive(Debug, Error)]
pub enum CoinbaseError {
    #[error("coinbase script_sig length {0} exceeds the {1}-byte maximum")]
    ScriptSigTooLarge(usize, usize),
    #[error("required outputs total {required} exceeds the miner's available reward {available}")]
    RequiredOutputsExceedReward { required: u64, available: u64 },
}

/// Process-owned extra-nonce state. Not a function-local static: callers
/// serialize their own mining loop and tests can run concurrently without
/// sharing state.
#[derive(Debug, Default)]
pub struct ExtraNonceState {
    extra_nonce: u32,
    last_prev_hash: Option<[u8; 32]>,
}

impl ExtraNonceState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bumps the extra-nonce, resetting to 1 if `prev_hash` differs from the
    /// last call's (a new tip). Returns the new value to embed in the script.
    pub fn increment(&mut self, prev_hash: [u8; 32]) -> u32 {
        if self.last_prev_hash != Some(prev_hash) {
            self.extra_nonce = 0;
            self.last_prev_hash = Some(prev_hash);
        }
        self.extra_nonce += 1;
        self.extra_nonce
    }

    pub fn current(&self) -> u32 {
        self.extra_nonce
    }
}

fn build_script_sig(height: u64, extra_nonce: u32, excessive_block_size: u64) -> Vec<u8> {
    let mut script = Vec::new();
    script.extend_from_slice(&height.to_le_bytes());
    script.extend_from_slice(&extra_nonce.to_le_bytes());
    script.extend_from_slice(&excessive_block_size.to_le_bytes());
    script
}

/// Pads `tx`'s coinbase input script_sig with zero bytes one at a time until
/// the transaction's serialized size reaches `min_size`, re-measuring after
/// each byte. Unlike Bitcoin's CScript push opcodes, this codebase's wire
/// format prefixes a fixed-width length, so there's no opcode-width boundary
/// to special-case — but padding iteratively keeps this correct regardless
/// of the serializer's encoding.
fn pad_to_min_size(tx: &mut Transaction, min_size: usize) -> Result<(), CoinbaseError> {
    while tx.serialized_size() < min_size {
        tx.inputs[0].script_sig.push(0u8);
        if tx.inputs[0].script_sig.len() > MAX_COINBASE_SCRIPT_SIG_SIZE {
            return Err(CoinbaseError::ScriptSigTooLarge(
                tx.inputs[0].script_sig.len(),
                MAX_COINBASE_SCRIPT_SIG_SIZE,
            ));
        }
    }
    Ok(())
}

/// Unspendable marker output: protocol prefix plus block height, zero value.
fn marker_output(height: u64) -> TxOut {
    let mut script = vec![0x6a]; // OP_RETURN-style marker prefix
    script.extend_from_slice(&height.to_le_bytes());
    TxOut::new(0, script)
}

pub struct CoinbaseParams {
    pub height: u64,
    pub subsidy: u64,
    pub total_fees: u64,
    pub miner_script_pubkey: Vec<u8>,
    /// Protocol-required `(script_pubkey, amount)` pairs, deducted from the
    /// miner's own output.
    pub required_outputs: Vec<(Vec<u8>, u64)>,
    pub extra_nonce: u32,
    pub excessive_block_size: u64,
}

/// Builds the coinbase transaction per §4.4: marker output, miner reward
/// output (subsidy plus half the fee pool, required outputs deducted), then
/// the required outputs themselves.
pub fn build_coinbase_transaction(params: CoinbaseParams) -> Result<Transaction, CoinbaseError> {
    let fee_reward = params.total_fees / 2; // remainder burned by construction
    let miner_available = params.subsidy + fee_reward;
    let required_total: u64 = params.required_outputs.iter().map(|(_, amount)| amount).sum();
    if required_total > miner_available {
        return Err(CoinbaseError::RequiredOutputsExceedReward {
            required: required_total,
            available: miner_available,
        });
    }
    let miner_amount = miner_available - required_total;

    let script_sig = build_script_sig(params.height, params.extra_nonce, params.excessive_block_size);
    if script_sig.len() > MAX_COINBASE_SCRIPT_SIG_SIZE {
        return Err(CoinbaseError::ScriptSigTooLarge(
            script_sig.len(),
            MAX_COINBASE_SCRIPT_SIG_SIZE,
        ));
    }

    let mut outputs = vec![marker_output(params.height), TxOut::new(miner_amount, params.miner_script_pubkey)];
    for (script_pubkey, amount) in params.required_outputs {
        outputs.push(TxOut::new(amount, script_pubkey));
    }

    let mut tx = Transaction::new(
        1,
        vec![TxIn::new(OutPoint::coinbase(), script_sig, 0xffff_ffff)],
        outputs,
        0,
    );
    pad_to_min_size(&mut tx, MIN_TX_SIZE)?;
    Ok(tx)
}

/// IncrementExtraNonce: the miner-side nonce-rolling primitive, run between
/// proof-of-work attempts against an already-assembled template without
/// re-running package selection. On each call: bumps the extra-nonce,
/// rebuilds the coinbase's unlocking script, re-pads it to the minimum
/// transaction size, replaces `block.transactions[0]`, and recomputes the
/// Merkle root in place.
pub fn roll_extra_nonce(
    block: &mut Block,
    state: &mut ExtraNonceState,
    height: u64,
    excessive_block_size: u64,
) -> Result<(), CoinbaseError> {
    let nonce = state.increment(block.header.prev_block_hash);
    let script_sig = build_script_sig(height, nonce, excessive_block_size);
    if script_sig.len() > MAX_COINBASE_SCRIPT_SIG_SIZE {
        return Err(CoinbaseError::ScriptSigTooLarge(
            script_sig.len(),
            MAX_COINBASE_SCRIPT_SIG_SIZE,
        ));
    }
    block.transactions[0].inputs[0].script_sig = script_sig;
    pad_to_min_size(&mut block.transactions[0], MIN_TX_SIZE)?;
    block.header.merkle_root = calculate_merkle_root(&block.txids());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_params() -> CoinbaseParams {
        CoinbaseParams {
            height: 100,
            subsidy: 5_000_000_000,
            total_fees: 0,
            miner_script_pubkey: vec![0xaa],
            required_outputs: vec![],
            extra_nonce: 1,
            excessive_block_size: 32_000_000,
        }
    }

    #[test]
    fn coinbase_reaches_min_size() {
        let tx = build_coinbase_transaction(base_params()).unwrap();
        assert!(tx.serialized_size() >= MIN_TX_SIZE);
    }

    #[test]
    fn coinbase_padding_pins_exact_min_size() {
        // Pinning test per the design decision to reproduce the padding
        // arithmetic exactly rather than leave it unverified.
        let tx = build_coinbase_transaction(base_params()).unwrap();
        assert_eq!(tx.serialized_size(), MIN_TX_SIZE);
    }

    #[test]
    fn miner_reward_includes_half_the_fees() {
        let mut params = base_params();
        params.total_fees = 1000;
        let tx = build_coinbase_transaction(params).unwrap();
        assert_eq!(tx.outputs[1].value, 5_000_000_000 + 500);
    }

    #[test]
    fn required_outputs_deduct_from_miner_reward() {
        let mut params = base_params();
        params.total_fees = 1000;
        params.required_outputs = vec![(vec![0xbb], 200)];
        let tx = build_coinbase_transaction(params).unwrap();
        assert_eq!(tx.outputs[1].value, 5_000_000_000 + 500 - 200);
        assert_eq!(tx.outputs[2].value, 200);
    }

    #[test]
    fn required_outputs_exceeding_reward_is_rejected() {
        let mut params = base_params();
        params.subsidy = 100;
        params.required_outputs = vec![(vec![0xbb], 1000)];
        assert!(matches!(
            build_coinbase_transaction(params),
            Err(CoinbaseError::RequiredOutputsExceedReward { .. })
        ));
    }

    #[test]
    fn coinbase_output_sum_never_exceeds_subsidy_plus_half_fees() {
        let mut params = base_params();
        params.total_fees = 777;
        params.required_outputs = vec![(vec![0xbb], 1)];
        let tx = build_coinbase_transaction(params).unwrap();
        let reward_outputs: u64 = tx.outputs[1..].iter().map(|o| o.value).sum();
        assert_eq!(reward_outputs, 5_000_000_000 + 777 / 2);
    }

    #[test]
    fn extra_nonce_resets_on_tip_change() {
        let mut state = ExtraNonceState::new();
        let tip_a = [1u8; 32];
        let tip_b = [2u8; 32];
        assert_eq!(state.increment(tip_a), 1);
        assert_eq!(state.increment(tip_a), 2);
        assert_eq!(state.increment(tip_b), 1);
    }

    fn block_with_coinbase(prev_block_hash: [u8; 32]) -> Block {
        let coinbase = build_coinbase_transaction(base_params()).unwrap();
        let header = emberchain_core::BlockHeader {
            version: 1,
            prev_block_hash,
            merkle_root: [0u8; 32],
            timestamp: 0,
            bits: 0x1d00ffff,
            nonce: 0,
            height: 100,
            epoch_block_hash: [0u8; 32],
            extended_metadata_hash: [0u8; 32],
        };
        Block::new(header, vec![coinbase])
    }

    #[test]
    fn roll_extra_nonce_replaces_coinbase_and_merkle_root() {
        let mut state = ExtraNonceState::new();
        let mut block = block_with_coinbase([7u8; 32]);
        let original_coinbase = block.transactions[0].clone();
        let original_root = block.header.merkle_root;

        roll_extra_nonce(&mut block, &mut state, 100, 32_000_000).unwrap();

        assert_ne!(block.transactions[0], original_coinbase);
        assert_ne!(block.header.merkle_root, original_root);
        assert_eq!(
            block.header.merkle_root,
            calculate_merkle_root(&block.txids())
        );
        assert_eq!(state.current(), 1);
    }

    #[test]
    fn roll_extra_nonce_resets_counter_on_tip_change() {
        let mut state = ExtraNonceState::new();
        let mut block = block_with_coinbase([7u8; 32]);
        roll_extra_nonce(&mut block, &mut state, 100, 32_000_000).unwrap();
        roll_extra_nonce(&mut block, &mut state, 100, 32_000_000).unwrap();
        assert_eq!(state.current(), 2);

        block.header.prev_block_hash = [8u8; 32];
        roll_extra_nonce(&mut block, &mut state, 100, 32_000_000).unwrap();
        assert_eq!(state.current(), 1);
    }
}
