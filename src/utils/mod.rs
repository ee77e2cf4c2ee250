//! Geometry helpers shared by the counting strategies
mod utils;

pub use self::utils::*;
