//! Summary statistics helpers.

pub mod utils;

pub use utils::{entropy, fivenum, format_runtime, mean, variance};
