//! Synthetic AML transaction-graph generator.
//!
//! Builds a random directed account graph from a degree table, assigns
//! normal transaction motifs to it, injects AML typology subgraphs into
//! the accounts no motif claimed, and activates the resulting edges.

pub mod account_stage;
pub mod activation_stage;
pub mod amount;
pub mod config;
pub mod degree;
pub mod engine;
pub mod error;
pub mod event;
pub mod export;
pub mod graph;
pub mod graph_stage;
pub mod nomination_stage;
pub mod nominator;
pub mod normal_model;
pub mod params;
pub mod registry;
pub mod rng;
pub mod stage;
pub mod summary;
pub mod typology;
pub mod typology_stage;
pub mod types;
