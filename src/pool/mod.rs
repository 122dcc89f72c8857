//! Pool module - parallel execution of sweep units.

mod worker;

pub use worker::*;
