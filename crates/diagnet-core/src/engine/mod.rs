//! The diagnosis engine.
//!
//! This module provides:
//! - **errors**: Error types and per-disease query diagnostics
//! - **config**: Tunable constants with validation
//! - **knowledge**: The disease → symptom knowledge model
//! - **network** / **cpd**: Network structure and noisy-OR table synthesis
//! - **validate**: Structural checks run before a model is published
//! - **factor** / **inference**: Exact inference by variable elimination
//! - **overlap**: Symptom-overlap ranking
//! - **snapshot** / **diagnosis**: Published snapshots and the coordinator

pub mod config;
pub mod cpd;
pub mod diagnosis;
pub mod errors;
pub mod factor;
pub mod inference;
pub mod knowledge;
pub mod network;
pub mod overlap;
pub mod snapshot;
pub mod validate;
