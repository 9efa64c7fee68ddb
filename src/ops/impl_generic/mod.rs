pub mod attention;
pub mod norm;
pub mod position;
pub mod precision;

pub use attention::scaled_dot_product_attention_impl;
pub use norm::{layer_norm_impl, rms_norm_impl};
pub use position::{rope_frequencies, rope_impl, rope_tables};
