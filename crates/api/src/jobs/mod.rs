//! Background job scheduler and job implementations.

mod cleanup_calls;
mod pool_metrics;
mod scheduler;

pub use cleanup_calls::CleanupCallsJob;
pub use pool_metrics::PoolMetricsJob;
pub use scheduler::JobScheduler;
