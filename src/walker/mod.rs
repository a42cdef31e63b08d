//! Budget-gated incremental fetching
//!
//! Remote data is pulled by resource walkers, one per paginated remote resource. Each
//! walker carries a persisted priority; the load-balanced fetcher drains all walkers of a
//! batch of projects in priority order against one shared budget, so quota is shared
//! fairly across projects and skipped walkers grow more urgent over time.

mod budget;
mod cursor;
mod fetcher;

pub use budget::{QuotaBudget, ResourceWalkerBudget, UnlimitedBudget};
pub use cursor::{
    CursorResourceWalker, CursorResourceWalkerData, CursorWalkerExecutor, ResourceWalker,
    WalkerOutcome, WalkerSettings,
};
pub use fetcher::{FetchSummary, LoadBalancedDataFetcher, WalkerStrategy};
