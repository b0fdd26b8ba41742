//! Trait boundary toward the externally supplied cell library.
//!
//! A cell library (Liberty/Mislib-style readers, vendor cell
//! descriptions) and the pattern graphs it exposes for each cell are
//! deliberately out of scope for this crate — they are read-only
//! artifacts built elsewhere. The pipeline only ever needs to ask a
//! library "what cell is this id" and to walk a pattern graph's
//! structure during matching, so that is all these traits expose.

use std::fmt::Debug;

/// Opaque identifier for a library cell, as assigned by the library.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellId(pub u32);

/// A single library cell (its pin count is all the matcher needs; a
/// real library attaches far more — area, timing arcs, function).
pub trait Cell: Debug {
    /// This cell's identifier within its library.
    fn id(&self) -> CellId;
    /// A human-readable name, for diagnostics.
    fn name(&self) -> &str;
    /// Number of input pins, i.e. the leaf count of this cell's
    /// pattern graph.
    fn input_count(&self) -> usize;
}

/// Identifies a node within one cell's pattern graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PatternNodeId(pub u32);

/// One leaf of a pattern graph: a reference to the `index`-th input pin
/// of the cell this pattern belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PatternLeaf {
    /// Position of the referenced pin among the cell's inputs.
    pub index: usize,
}

/// A pattern-graph input: which node to match, with which polarity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PatternInput {
    /// The pattern node supplying this input.
    pub node: PatternNodeId,
    /// Whether this input is read inverted.
    pub inv: bool,
}

/// The shape of one node in a pattern graph: either a leaf (pin
/// reference) or a two-input AND/XOR gate over two other pattern
/// nodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PatternNode {
    /// A reference to one of the cell's input pins.
    Leaf(PatternLeaf),
    /// A two-input AND of two pattern-node inputs.
    And(PatternInput, PatternInput),
    /// A two-input XOR of two pattern-node inputs.
    Xor(PatternInput, PatternInput),
}

/// The structural template a cell implements, matched against subject
/// graph cuts by the pattern matcher.
pub trait PatternGraph: Debug {
    /// The cell this pattern graph implements.
    fn cell_id(&self) -> CellId;
    /// The pattern node that must be bound to the cut's root.
    fn root(&self) -> PatternNodeId;
    /// Looks up the shape of a pattern node.
    fn node(&self, id: PatternNodeId) -> PatternNode;
    /// Number of leaves (= the cell's input pin count).
    fn leaf_count(&self) -> usize;
    /// Whether this cell's output is the complement of its root
    /// pattern node's natural value (e.g. a NAND2 cell is modeled with
    /// the same `And` root as AND2, with this set to `true`).
    fn output_inv(&self) -> bool {
        false
    }
}

/// A library of cells and the pattern graphs they match against.
pub trait CellLibrary {
    /// Looks up a cell by id.
    fn cell(&self, id: CellId) -> Option<&dyn Cell>;
    /// All pattern graphs available for matching, in no particular
    /// order; the pattern matcher tries each in turn.
    fn patterns(&self) -> &[Box<dyn PatternGraph>];
}
