pub mod confidence;
pub mod rules;

pub use rules::{DetectionBatch, EdgeDetector};
