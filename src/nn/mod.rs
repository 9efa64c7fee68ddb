//! Neural network modules built on the fused ops

mod layernorm;
mod rmsnorm;
mod rope;

pub use layernorm::LayerNorm;
pub use rmsnorm::RmsNorm;
pub use rope::RoPE;
