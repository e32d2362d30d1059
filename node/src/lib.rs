//! Block template assembler: ancestor-feerate package selection over a
//! mempool, coinbase construction, header assembly, and the adjoining
//! transaction-broadcast path.

pub mod broadcast;
pub mod chain;
pub mod config;
pub mod logging;
pub mod mempool;
pub mod mining;
pub mod stats;

pub use broadcast::{broadcast_transaction, BroadcastError, BroadcastRequest, RelayHandle};
pub use config::{NodeConfig, SelectorOptions};
pub use mempool::Mempool;
pub use mining::{create_new_block, TemplateConfig, TemplateError};
