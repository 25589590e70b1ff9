pub mod ceq;
pub mod pillars;

pub use ceq::{CeqScorer, GameCeq};
