pub mod blocked;
pub mod decode;
pub mod host_mask;
pub mod sdpa;
pub mod simd;
