//! Trait boundaries standing in for chain state, the UTXO set, and consensus
//! parameter tables. The selector and assembler are written against these
//! traits so they can be tested without a running node.

use emberchain_core::{Block, TxId};

/// A snapshot of the active chain tip.
pub trait ChainTip: Send + Sync {
    fn height(&self) -> u64;
    fn block_hash(&self) -> [u8; 32];
    fn median_time_past(&self) -> u64;
    fn epoch_block_hash(&self) -> [u8; 32];
}

/// Consensus parameter lookups: subsidy, next-work target, sigcheck ceiling,
/// epoch cadence, and the protocol-required coinbase outputs.
pub trait ConsensusParams: Send + Sync {
    fn subsidy(&self, height: u64, bits: u32) -> u64;
    fn next_work_required(&self, tip: &dyn ChainTip, time: u64) -> u32;
    fn max_block_sig_checks(&self, max_size: usize) -> u64;
    fn epoch_interval(&self) -> u64;
    /// `(script_pubkey, amount)` pairs a miner-fund-style policy mandates,
    /// deducted from the miner's own coinbase output.
    fn miner_fund_outputs(&self, tip: &dyn ChainTip, coinbase_value: u64) -> Vec<(Vec<u8>, u64)>;
}

/// Narrow UTXO-set probe: only the question the broadcast coordinator needs.
pub trait UtxoView: Send + Sync {
    fn is_unspent(&self, txid: &TxId, vout: u32) -> bool;
}

/// Options for the final consensus validity check invoked by the assembler.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidityOptions {
    pub skip_proof_of_work: bool,
    pub skip_merkle_root: bool,
}

pub trait BlockValidator: Send + Sync {
    fn test_block_validity(
        &self,
        block: &Block,
        tip: &dyn ChainTip,
        opts: ValidityOptions,
    ) -> Result<(), String>;
}
