//! # fastops
//!
//! **Fused transformer primitives on numr: rotary embeddings, attention, normalization.**
//!
//! fastops adds four hot-path transformer operations on top of numr's tensors and
//! runtime clients. Each op is a single call that behaves as one primitive: inputs
//! are validated up front, intermediates are evaluated in f32 (f64 stays f64), and
//! the result comes back in the caller's dtype.
//!
//! ## Relationship to numr
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                   fastops ◄── YOU ARE HERE               │
//! │        (RoPE, scaled dot-product attention, norms)       │
//! └──────────────────────────┬──────────────────────────────┘
//! │                      numr                                │
//! │        (tensors, ops, runtime, dtype conversion)         │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design
//!
//! - **Extension traits**: `FastRoPEOps`, `FastAttentionOps`, `FastNormOps` implemented on numr's clients
//! - **impl_generic**: Composite ops composed from numr primitives, same on all backends
//! - **CPU kernels**: Fused single-query decode and memory-efficient blocked attention (SIMD + rayon)
//! - **nn**: `RmsNorm`, `LayerNorm`, `RoPE` modules configured from [`config::FastConfig`]

pub mod config;
pub mod error;
pub mod nn;
pub mod ops;

// Re-export primary fastops traits
pub use error::{Error, Result};
pub use ops::{AttentionMask, FastAttentionOps, FastNormOps, FastRoPEOps, RoPEParams};

// Re-export numr types that users will commonly need
pub use numr::dtype::DType;
pub use numr::error::{Error as NumrError, Result as NumrResult};
pub use numr::runtime::{Runtime, RuntimeClient};
pub use numr::tensor::Tensor;
