pub mod guard;
pub mod policy;
pub mod stats;
pub mod sweeper;

pub use guard::WriteGuard;
pub use stats::{StatsAggregator, UsageStats};
pub use sweeper::RetentionSweeper;
