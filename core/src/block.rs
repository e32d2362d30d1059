use crate::hash::{sha256d, TxId};
use crate::tx::Transaction;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub version: u32,
    pub prev_block_hash: [u8; 32],
    pub merkle_root: [u8; 32],
    pub timestamp: u64,
    pub bits: u32,
    pub nonce: u32,
    pub height: u64,
    /// Hash of the most recent epoch-boundary block; re-anchored every
    /// `epoch_interval` blocks (§4.5 step 3).
    pub epoch_block_hash: [u8; 32],
    /// Hash of out-of-band block metadata (not consensus transaction data).
    pub extended_metadata_hash: [u8; 32],
}

impl BlockHeader {
    pub fn hash(&self) -> [u8; 32] {
        let bytes = bincode::serialize(self).expect("header serialization is infallible");
        sha256d(&bytes)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn new(header: BlockHeader, transactions: Vec<Transaction>) -> Self {
        Self {
            header,
            transactions,
        }
    }

    pub fn hash(&self) -> [u8; 32] {
        self.header.hash()
    }

    pub fn txids(&self) -> Vec<TxId> {
        self.transactions.iter().map(|tx| tx.txid()).collect()
    }

    pub fn serialized_size(&self) -> usize {
        bincode::serialized_size(self).expect("block serialization is infallible") as usize
    }
}
