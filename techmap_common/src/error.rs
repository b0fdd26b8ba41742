//! Error types at the crate's library boundaries.

use crate::handle::NodeId;
use thiserror::Error;

/// Fatal, driver-reportable conditions raised by the mapping pipeline.
///
/// Precondition violations on the subject-graph invariants are
/// programmer errors, not runtime conditions a driver can recover from,
/// and are asserted via `debug_assert!`/`contracts` instead of being
/// represented here.
#[derive(Debug, Error)]
pub enum MapError {
    /// A polarity of a node was requested from a [`crate::Cell`] match
    /// table but no library cell had been recorded for it.
    #[error("node {node:?} has no recorded match for polarity inv={inv}")]
    MissingMatch {
        /// The node whose match was requested.
        node: NodeId,
        /// The requested polarity.
        inv: bool,
    },
    /// A handle referred to a node slot outside the graph's arena.
    #[error("handle refers to out-of-range node {0:?}")]
    InvalidHandle(NodeId),
    /// A cut-enumeration bound fell outside the supported range.
    #[error("cut bound k={k} out of range (2..=20)")]
    InvalidCutBound {
        /// The offending bound.
        k: u32,
    },
    /// A constant-zero source was needed during map generation but no
    /// constant-realizing cell was ever recorded in the `MapRecord`.
    #[error("no cell recorded for constant zero")]
    MissingConstZeroCell,
    /// Same as [`MapError::MissingConstZeroCell`], for the constant one.
    #[error("no cell recorded for constant one")]
    MissingConstOneCell,
    /// A DFF's data-register cell was requested for a polarity with no
    /// recorded match.
    #[error("dff #{index} has no recorded cell match for polarity inv={inv}")]
    MissingDffMatch {
        /// Index of the offending DFF.
        index: u32,
        /// The requested polarity.
        inv: bool,
    },
    /// A latch's data-register cell was requested for a polarity with
    /// no recorded match.
    #[error("latch #{index} has no recorded cell match for polarity inv={inv}")]
    MissingLatchMatch {
        /// Index of the offending latch.
        index: u32,
        /// The requested polarity.
        inv: bool,
    },
}
