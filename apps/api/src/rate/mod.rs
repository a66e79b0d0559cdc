// Rate optimization engine
// Pipeline: market data → range → win curve → strategy selection → recommendation.
// The win model and market source are injected; nothing here holds global state.

pub mod curve;
pub mod handlers;
pub mod optimizer;
pub mod position;
pub mod range;
pub mod reasoning;
pub mod strategy;
pub mod win_model;

#[cfg(test)]
pub(crate) mod fixtures;
