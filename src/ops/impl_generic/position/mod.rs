pub mod rope;

pub use rope::{rope_frequencies, rope_impl, rope_tables};
