use crate::hash::{sha256d, TxId};
use serde::{Deserialize, Serialize};

/// Reference to a prior transaction's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    pub txid: TxId,
    pub vout: u32,
}

impl OutPoint {
    pub fn new(txid: TxId, vout: u32) -> Self {
        Self { txid, vout }
    }

    pub fn coinbase() -> Self {
        Self {
            txid: TxId([0u8; 32]),
            vout: u32::MAX,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxIn {
    pub prevout: OutPoint,
    pub script_sig: Vec<u8>,
    pub sequence: u32,
}

impl TxIn {
    pub fn new(prevout: OutPoint, script_sig: Vec<u8>, sequence: u32) -> Self {
        Self {
            prevout,
            script_sig,
            sequence,
        }
    }

    pub fn prev_tx_hash(&self) -> TxId {
        self.prevout.txid
    }

    pub fn prev_output_index(&self) -> u32 {
        self.prevout.vout
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOut {
    pub value: u64,
    pub script_pubkey: Vec<u8>,
}

impl TxOut {
    pub fn new(value: u64, script_pubkey: Vec<u8>) -> Self {
        Self {
            value,
            script_pubkey,
        }
    }

    pub fn value(&self) -> u64 {
        self.value
    }
}

/// An immutable transaction. Fee is not a field here: it depends on the
/// previous outputs an input spends, which only a UTXO view or mempool entry
/// knows about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    pub lock_time: u32,
}

impl Transaction {
    pub fn new(version: u32, inputs: Vec<TxIn>, outputs: Vec<TxOut>, lock_time: u32) -> Self {
        Self {
            version,
            inputs,
            outputs,
            lock_time,
        }
    }

    pub fn inputs(&self) -> &[TxIn] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[TxOut] {
        &self.outputs
    }

    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].prevout == OutPoint::coinbase()
    }

    /// Transaction identifier: double-SHA256 of the canonical serialization.
    pub fn txid(&self) -> TxId {
        let bytes = bincode::serialize(self).expect("transaction serialization is infallible");
        TxId(sha256d(&bytes))
    }

    /// Serialized byte length, the size figure the resource accountant and
    /// mempool entries track.
    pub fn serialized_size(&self) -> usize {
        bincode::serialized_size(self).expect("transaction serialization is infallible") as usize
    }

    pub fn total_output_value(&self) -> u64 {
        self.outputs.iter().map(|o| o.value).sum()
    }
}
