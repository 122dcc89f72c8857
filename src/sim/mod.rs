//! Sim module - the discrete-event model of one run.

mod event_queue;
mod policy;
mod population;
mod quality;
mod query;
mod scheduler;

pub use event_queue::*;
pub use policy::*;
pub use population::*;
pub use quality::{
    placeholder_factory, ConstantQuality, PlaceholderQuality, QualityFactory, QualityMetric,
};
pub use query::{QueryState, Transition};
pub use scheduler::*;
