pub mod cpu;
pub mod impl_generic;
pub mod traits;

pub use traits::FastAttentionOps;
pub use traits::FastNormOps;
pub use traits::FastRoPEOps;
pub use traits::{AttentionMask, RoPEParams};
