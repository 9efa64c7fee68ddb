pub mod rope;

pub use rope::{FastRoPEOps, RoPEParams};
