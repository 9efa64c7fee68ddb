pub mod attention;
pub(crate) mod host;
pub mod norm;
pub mod position;
