//! Core domain: entities, error kinds, and the port traits that decouple
//! the decision engine from its broker, collector, scorer, and
//! persistence collaborators.

pub mod errors;
pub mod ports;
pub mod types;
