pub mod mask;
pub mod sdpa;
pub mod shape;

pub use mask::{broadcast_mask_shape, causal_visible, mask_to_additive};
pub use sdpa::scaled_dot_product_attention_impl;
pub use shape::{AttentionPath, MAX_KV_BLOCK, SdpaDims, select_attention_path, validate_sdpa};
