//! Resource walker budgets
//!
//! A budget decides whether a walker may run given its estimated cost, and absorbs the
//! actual cost afterwards. Pure policy, no I/O.

/// Consumable, estimable remote API quota
pub trait ResourceWalkerBudget: Send {
    /// Cost actually incurred by one execution
    type Usage: Clone + Send + Sync;

    /// Cost a walker expects to incur before running
    type EstimatedUsage: Send + Sync;

    /// Whether a walker with this estimated cost may run now
    fn may_execute(&self, estimated: &Self::EstimatedUsage) -> bool;

    /// Account for an execution (successful or failed)
    fn integrate(&mut self, usage: Self::Usage);
}

/// Budget that never says no
#[derive(Debug, Clone, Copy, Default)]
pub struct UnlimitedBudget;

impl ResourceWalkerBudget for UnlimitedBudget {
    type Usage = ();
    type EstimatedUsage = ();

    fn may_execute(&self, _estimated: &()) -> bool {
        true
    }

    fn integrate(&mut self, _usage: ()) {}
}

/// Point-based quota, the shape most tracker rate limits take
///
/// `reserve` points are never handed out so interactive users of the same token keep
/// some headroom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaBudget {
    remaining: u64,
    reserve: u64,
}

impl QuotaBudget {
    pub fn new(remaining: u64) -> Self {
        Self {
            remaining,
            reserve: 0,
        }
    }

    pub fn with_reserve(mut self, reserve: u64) -> Self {
        self.reserve = reserve;
        self
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Add points back, e.g. after the tracker's rate limit window reset
    pub fn replenish(&mut self, points: u64) {
        self.remaining = self.remaining.saturating_add(points);
    }
}

impl ResourceWalkerBudget for QuotaBudget {
    type Usage = u64;
    type EstimatedUsage = u64;

    fn may_execute(&self, estimated: &u64) -> bool {
        estimated.saturating_add(self.reserve) <= self.remaining
    }

    fn integrate(&mut self, usage: u64) {
        self.remaining = self.remaining.saturating_sub(usage);
    }
}
