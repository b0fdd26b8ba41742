//! The cut-based technology-mapping engine: subject graph, cut
//! enumerator, pattern matcher, map recorder/generator, and the
//! minimum-depth labeler used as a depth lower bound.
//!
//! This crate only ever borrows the cell library and cost policy it is
//! driven with (see [`techmap_common`]); it never constructs one.

pub mod cut;
pub mod graph;
pub mod mapgen;
pub mod mindepth;
pub mod pattern;
pub mod record;

pub use cut::{Cut, CutEnumerator, CutVisitor};
pub use graph::{Dff, DffId, ExprNode, Latch, LatchId, NodeKind, Port, SubjectGraph};
pub use mapgen::{MapGenerator, MappedCellId, MappedInstance, MappedNetlist, MappedRegister};
pub use mindepth::MinDepthLabeler;
pub use pattern::{Match, PatternMatcher};
pub use record::MapRecord;
