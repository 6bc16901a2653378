pub mod digest;
pub mod splice;

pub use digest::{ascii_safe, format, format_plain};
pub use splice::splice;
