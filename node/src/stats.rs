//! Process-wide observables updated after each template assembly. Readers
//! tolerate torn reads, so plain atomics stand in for a mutex-guarded struct.

use std::sync::atomic::{AtomicU64, Ordering};

static LAST_BLOCK_TX_COUNT: AtomicU64 = AtomicU64::new(0);
static LAST_BLOCK_SIZE: AtomicU64 = AtomicU64::new(0);

pub fn record_last_block(tx_count: u64, size: u64) {
    LAST_BLOCK_TX_COUNT.store(tx_count, Ordering::Relaxed);
    LAST_BLOCK_SIZE.store(size, Ordering::Relaxed);
}

pub fn last_block_tx_count() -> u64 {
    LAST_BLOCK_TX_COUNT.load(Ordering::Relaxed)
}

pub fn last_block_size() -> u64 {
    LAST_BLOCK_SIZE.load(Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_overwrite_previous_values() {
        record_last_block(3, 1500);
        assert_eq!(last_block_tx_count(), 3);
        assert_eq!(last_block_size(), 1500);
        record_last_block(7, 2200);
        assert_eq!(last_block_tx_count(), 7);
        assert_eq!(last_block_size(), 2200);
    }
}
