//! Resource Accountant (C1): tracks running block size, sigcheck count and
//! fee sum, and answers fit-queries against the configured ceilings.

/// Reserve carved out for the coinbase before any transaction is selected.
pub const COINBASE_SIZE_RESERVE: usize = 1000;
pub const COINBASE_SIGOP_RESERVE: u64 = 100;
/// Margin `fits()` holds back from `maxGeneratedSize`, absorbing coinbase
/// size variation between package-fit reservation and the coinbase's actual
/// final size. Distinct from the 1000/3000-byte margin `TemplateConfig`
/// applies when deriving `maxGeneratedSize` itself from `excessiveBlockSize`.
pub const FIT_MARGIN_BYTES: usize = 1000;

pub struct ResourceAccountant {
    block_size: usize,
    block_sig_ops: u64,
    total_fees: u64,
    max_generated_size: usize,
    max_sig_checks: u64,
    /// Absorbs coinbase-size variation between the package-fit reservation
    /// and the coinbase's actual final size. Must stay >= 1000 bytes.
    margin: usize,
}

impl ResourceAccountant {
    pub fn new(max_generated_size: usize, max_sig_checks: u64, margin: usize) -> Self {
        Self {
            block_size: COINBASE_SIZE_RESERVE,
            block_sig_ops: COINBASE_SIGOP_RESERVE,
            total_fees: 0,
            max_generated_size,
            max_sig_checks,
            margin,
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn block_sig_ops(&self) -> u64 {
        self.block_sig_ops
    }

    pub fn total_fees(&self) -> u64 {
        self.total_fees
    }

    /// True iff adding a package of `package_size`/`package_sig_ops` still
    /// leaves room under both ceilings. Package-level, not individual-level:
    /// reserves space for ancestors not yet committed in this iteration.
    pub fn fits(&self, package_size: usize, package_sig_ops: u64) -> bool {
        let size_ceiling = self.max_generated_size.saturating_sub(self.margin);
        self.block_size + package_size < size_ceiling
            && self.block_sig_ops + package_sig_ops < self.max_sig_checks
    }

    /// True once the block is close enough to full that further fit-gate
    /// failures should trip the selector's early-termination rule.
    pub fn near_full(&self) -> bool {
        self.block_size > self.max_generated_size.saturating_sub(1000)
    }

    /// Step 6's hard ceiling check: would committing `additional_size` more
    /// bytes of ancestor-closed package push the block at or past the cap.
    pub fn would_exceed_generated_size(&self, additional_size: usize) -> bool {
        self.block_size + additional_size >= self.max_generated_size
    }

    /// Records an entry's *individual* size/sigops/fee after it's committed.
    /// Individual, not ancestor-aggregate, because ancestors are committed
    /// once each even though they contribute to many descendants' packages.
    pub fn commit(&mut self, size: usize, sig_ops: u64, fee: u64) {
        self.block_size += size;
        self.block_sig_ops += sig_ops;
        self.total_fees += fee;
    }
}
