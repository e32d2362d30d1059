//! Core chain types shared by the mempool, the template assembler and the
//! broadcast path: transactions, blocks, and the hashing primitives they're
//! built on.

pub mod block;
pub mod hash;
pub mod tx;

pub use block::{Block, BlockHeader};
pub use hash::TxId;
pub use tx::{OutPoint, Transaction, TxIn, TxOut};
