//! Pipeline module - sweep execution and result persistence.

mod aggregate;
mod manifest;
mod sweep;

pub use aggregate::*;
pub use manifest::*;
pub use sweep::*;
