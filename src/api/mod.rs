pub mod latency;
pub mod routes;

pub use routes::{serve, ApiState};
