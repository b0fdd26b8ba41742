//! Shared types for the cut-based technology mapping pipeline.
//!
//! This crate holds the pieces every stage of the pipeline agrees on —
//! the packed node/polarity handle, the error enum, the driver-facing
//! [`Config`], and the trait boundary toward an externally supplied cell
//! library — but it does not itself build a subject graph or run a
//! match. That lives in `techmap_core`.

pub mod cell;
mod config;
mod cost;
mod error;
mod handle;

pub use cell::{
    Cell, CellId, CellLibrary, PatternGraph, PatternInput, PatternLeaf, PatternNode,
    PatternNodeId,
};
pub use config::{Config, ConfigBuilder, Dedupe};
pub use cost::{AreaCostPolicy, Cost, CostPolicy};
pub use error::MapError;
pub use handle::{Handle, NodeId};
