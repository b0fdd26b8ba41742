//! `MapRecord`: the per-node best-match table the pattern matcher
//! writes into and the map generator reads back out of.
//!
//! A pure container — it never decides which match is best, that is
//! the driver's job via [`techmap_common::CostPolicy`]. Sized to
//! `2 * node_count` (and `2 * dff_count`, `2 * latch_count`) once at
//! `init` and never resized afterward, since the subject graph it
//! describes is immutable for the duration of a mapping run.

use techmap_common::{CellId, NodeId};

use crate::cut::Cut;
use crate::graph::{DffId, LatchId, SubjectGraph};

#[derive(Clone, Debug, Default)]
struct NodeInfo {
    cut: Option<Cut>,
    cell: Option<CellId>,
}

/// The best-known cell match for every `(node, polarity)` pair, plus
/// the two constant cells and per-DFF/per-latch matches.
#[derive(Clone, Debug)]
pub struct MapRecord {
    node_info: Vec<NodeInfo>,
    dff_info: Vec<NodeInfo>,
    latch_info: Vec<NodeInfo>,
    const0: Option<CellId>,
    const1: Option<CellId>,
}

impl MapRecord {
    /// Allocates a record sized for `graph`. All slots start empty.
    #[must_use]
    pub fn init(graph: &SubjectGraph) -> Self {
        Self {
            node_info: vec![NodeInfo::default(); graph.node_count() * 2],
            dff_info: vec![NodeInfo::default(); graph.dffs().len() * 2],
            latch_info: vec![NodeInfo::default(); graph.latches().len() * 2],
            const0: None,
            const1: None,
        }
    }

    fn node_slot(node: NodeId, inv: bool) -> usize {
        node.raw() as usize * 2 + usize::from(inv)
    }

    fn dff_slot(dff: DffId, inv: bool) -> usize {
        dff.0 as usize * 2 + usize::from(inv)
    }

    fn latch_slot(latch: LatchId, inv: bool) -> usize {
        latch.0 as usize * 2 + usize::from(inv)
    }

    /// Records the cell implementing the constant-zero source.
    pub fn set_const0(&mut self, cell: CellId) {
        self.const0 = Some(cell);
    }

    /// Records the cell implementing the constant-one source.
    pub fn set_const1(&mut self, cell: CellId) {
        self.const1 = Some(cell);
    }

    /// The cell implementing the constant-zero source, if recorded.
    #[must_use]
    pub fn const0_cell(&self) -> Option<CellId> {
        self.const0
    }

    /// The cell implementing the constant-one source, if recorded.
    #[must_use]
    pub fn const1_cell(&self) -> Option<CellId> {
        self.const1
    }

    /// Records the winning cell+cut for `(node, inv)`.
    pub fn set_logic_match(&mut self, node: NodeId, inv: bool, cut: Cut, cell: CellId) {
        let slot = &mut self.node_info[Self::node_slot(node, inv)];
        slot.cut = Some(cut);
        slot.cell = Some(cell);
    }

    /// Records that `(node, inv)` is realized by inverting the opposite
    /// polarity's match: a synthetic single-leaf cut naming
    /// `(node, !inv)`, paired with the supplied inverter cell. This is
    /// the only case where a recorded cut's leaf is the node's own
    /// opposite polarity rather than a genuine fan-in boundary.
    pub fn set_inv_match(&mut self, node: NodeId, inv: bool, inverter_cell: CellId) {
        let leaf_cut = Cut::single_leaf(node, !inv);
        let slot = &mut self.node_info[Self::node_slot(node, inv)];
        slot.cut = Some(leaf_cut);
        slot.cell = Some(inverter_cell);
    }

    /// Records the winning cell for a DFF's data-register output at
    /// the given polarity.
    pub fn set_dff_match(&mut self, dff: DffId, inv: bool, cell: CellId) {
        self.dff_info[Self::dff_slot(dff, inv)].cell = Some(cell);
    }

    /// Records the winning cell for a latch's output at the given
    /// polarity.
    pub fn set_latch_match(&mut self, latch: LatchId, inv: bool, cell: CellId) {
        self.latch_info[Self::latch_slot(latch, inv)].cell = Some(cell);
    }

    /// The cell matched for `(node, inv)`, if any.
    #[must_use]
    pub fn get_node_cell(&self, node: NodeId, inv: bool) -> Option<CellId> {
        self.node_info[Self::node_slot(node, inv)].cell
    }

    /// The cut matched for `(node, inv)`, if any.
    #[must_use]
    pub fn get_node_match(&self, node: NodeId, inv: bool) -> Option<&Cut> {
        self.node_info[Self::node_slot(node, inv)].cut.as_ref()
    }

    /// The cell matched for a DFF's output at the given polarity.
    #[must_use]
    pub fn get_dff_cell(&self, dff: DffId, inv: bool) -> Option<CellId> {
        self.dff_info[Self::dff_slot(dff, inv)].cell
    }

    /// The cell matched for a latch's output at the given polarity.
    #[must_use]
    pub fn get_latch_cell(&self, latch: LatchId, inv: bool) -> Option<CellId> {
        self.latch_info[Self::latch_slot(latch, inv)].cell
    }
}

impl Cut {
    /// Builds a synthetic single-leaf cut naming `(node, inv)`, used
    /// by [`MapRecord::set_inv_match`] to represent "just invert the
    /// opposite polarity's match".
    #[must_use]
    pub fn single_leaf(node: NodeId, inv: bool) -> Self {
        Self::from_leaves(vec![techmap_common::Handle::from_node(node, inv)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::SubjectGraph;

    #[test]
    fn starts_with_every_slot_empty() {
        let mut g = SubjectGraph::new();
        let a = g.new_input();
        g.new_output(a);
        let record = MapRecord::init(&g);
        let node = a.node().unwrap();
        assert!(record.get_node_cell(node, false).is_none());
        assert!(record.get_node_cell(node, true).is_none());
    }

    #[test]
    fn inv_match_is_a_single_leaf_cut_of_the_opposite_polarity() {
        let mut g = SubjectGraph::new();
        let a = g.new_input();
        let node = a.node().unwrap();
        let mut record = MapRecord::init(&g);
        record.set_inv_match(node, true, CellId(42));
        let cut = record
            .get_node_match(node, true)
            .expect("inv match records a cut");
        assert_eq!(cut.leaf_count(), 1);
        assert_eq!(cut.leaves()[0].node(), Some(node));
        assert!(cut.leaves()[0].inv());
        assert_eq!(record.get_node_cell(node, true), Some(CellId(42)));
    }

    #[test]
    fn const_cells_are_independent_of_node_slots() {
        let g = SubjectGraph::new();
        let mut record = MapRecord::init(&g);
        record.set_const0(CellId(1));
        record.set_const1(CellId(2));
        assert_eq!(record.const0_cell(), Some(CellId(1)));
        assert_eq!(record.const1_cell(), Some(CellId(2)));
    }
}
