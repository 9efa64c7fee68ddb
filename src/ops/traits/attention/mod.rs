pub mod sdpa;

pub use sdpa::{AttentionMask, FastAttentionOps};
