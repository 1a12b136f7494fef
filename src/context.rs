//! Pool execution context.

/// Identifies the batch size and seed for which a pool's results were
/// computed.
///
/// The context is set at most once per pool; every store in the pool shares
/// its `batch_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolContext {
    /// Rows per batch, positive
    pub batch_size: usize,
    /// Seed of the run that produced the stored outputs
    pub seed: u64,
}

impl PoolContext {
    /// Create a context
    pub fn new(batch_size: usize, seed: u64) -> Self {
        PoolContext { batch_size, seed }
    }
}
