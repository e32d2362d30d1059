use clap::Parser;
use emberchain_node::chain::{BlockValidator, ChainTip, ConsensusParams, ValidityOptions};
use emberchain_node::config::{self, Cli};
use emberchain_node::mining::{create_new_block, roll_extra_nonce, ExtraNonceState};
use emberchain_node::{logging, Mempool};
use std::time::{SystemTime, UNIX_EPOCH};

/// How many extra-nonce rolls to try against one assembled template before
/// giving up and asking the caller to reassemble (new tip, refreshed mempool
/// selection). A real miner rolls until proof-of-work succeeds or the tip
/// changes; this demo binary just bounds the search so it terminates.
const EXTRA_NONCE_SEARCH_ATTEMPTS: u32 = 8;

/// Minimal standing-in chain state for the demo binary: a node embedding
/// this crate would instead wire in its real chain/UTXO/validator stack
/// behind the same traits (§4.8).
struct GenesisTip;

impl ChainTip for GenesisTip {
    fn height(&self) -> u64 {
        0
    }
    fn block_hash(&self) -> [u8; 32] {
        [0u8; 32]
    }
    fn median_time_past(&self) -> u64 {
        now()
    }
    fn epoch_block_hash(&self) -> [u8; 32] {
        [0u8; 32]
    }
}

struct StaticConsensus;

impl ConsensusParams for StaticConsensus {
    fn subsidy(&self, _height: u64, _bits: u32) -> u64 {
        5_000_000_000
    }
    fn next_work_required(&self, _tip: &dyn ChainTip, _time: u64) -> u32 {
        0x1d00ffff
    }
    fn max_block_sig_checks(&self, max_size: usize) -> u64 {
        max_size as u64 / 100
    }
    fn epoch_interval(&self) -> u64 {
        10_000
    }
    fn miner_fund_outputs(&self, _tip: &dyn ChainTip, _coinbase_value: u64) -> Vec<(Vec<u8>, u64)> {
        Vec::new()
    }
}

struct AcceptAllValidator;

impl BlockValidator for AcceptAllValidator {
    fn test_block_validity(
        &self,
        _block: &emberchain_core::Block,
        _tip: &dyn ChainTip,
        _opts: ValidityOptions,
    ) -> Result<(), String> {
        Ok(())
    }
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the epoch")
        .as_secs()
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let node_config = config::load(&cli)?;
    logging::init_tracing(&node_config.log_filter);

    tracing::info!(selector = ?node_config.selector, "starting block template assembler");

    let mempool = Mempool::new();
    let tip = GenesisTip;
    let consensus = StaticConsensus;
    let validator = AcceptAllValidator;
    let mut extra_nonce = ExtraNonceState::new();
    let template_config = node_config.to_template_config();

    // Assemble the template once: package selection, coinbase synthesis,
    // header population. Re-run only on a new tip or mempool change.
    let mut block = create_new_block(
        &tip,
        &consensus,
        &mempool,
        &validator,
        &template_config,
        vec![0u8; 20],
        extra_nonce.current(),
        now(),
    )?;

    tracing::info!(
        height = block.header.height,
        tx_count = block.transactions.len(),
        size = block.serialized_size(),
        "assembled template"
    );

    // IncrementExtraNonce nonce-search loop: roll the coinbase's extra-nonce
    // and recompute the Merkle root on the already-assembled template,
    // without re-running selection, the way a miner searches for
    // proof-of-work between template refreshes.
    for attempt in 1..=EXTRA_NONCE_SEARCH_ATTEMPTS {
        roll_extra_nonce(
            &mut block,
            &mut extra_nonce,
            block.header.height,
            template_config.excessive_block_size as u64,
        )?;
        tracing::debug!(
            attempt,
            extra_nonce = extra_nonce.current(),
            merkle_root = %hex::encode(block.header.merkle_root),
            "rolled extra-nonce"
        );
    }

    Ok(())
}
