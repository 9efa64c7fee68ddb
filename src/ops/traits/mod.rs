pub mod attention;
pub mod norm;
pub mod position;

pub use attention::{AttentionMask, FastAttentionOps};
pub use norm::FastNormOps;
pub use position::{FastRoPEOps, RoPEParams};
