pub mod accountant;
pub mod coinbase;
pub mod merkle;
pub mod modified_index;
pub mod selector;
pub mod template;

pub use accountant::ResourceAccountant;
pub use coinbase::{build_coinbase_transaction, roll_extra_nonce, CoinbaseError, CoinbaseParams, ExtraNonceState};
pub use merkle::calculate_merkle_root;
pub use modified_index::ModifiedEntryIndex;
pub use selector::{select_packages, SelectorConfig, SelectorError};
pub use template::{create_new_block, TemplateConfig, TemplateError};
