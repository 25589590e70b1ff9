pub mod manager;
pub mod sweep;

pub use manager::{EdgeFilter, LifecycleManager};
pub use sweep::SweepRunner;
