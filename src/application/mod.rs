//! Decision-engine core: indicators, collectors, sentiment aggregation,
//! the fused Decider, risk gate, order manager, and the Supervisor that
//! wires them together into a running pipeline (§4).

pub mod aggregator;
pub mod collectors;
pub mod decider;
pub mod indicators;
pub mod market_store;
pub mod order_manager;
pub mod risk_gate;
pub mod scorer;
pub mod supervisor;
