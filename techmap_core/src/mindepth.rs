//! Minimum-depth labeling: a depth lower bound and tie-break criterion
//! for depth-oriented mapping.
//!
//! A single forward sweep in topological order. For each logic node,
//! `d = max(fanin depths)` is the trial value; the node keeps depth `d`
//! if some k-feasible cut covers it with every leaf at depth `<= d - 1`
//! (a wider cut reaching further back than its immediate fanins), and
//! otherwise gets depth `d + 1` (only its direct two fanins, already at
//! depth `<= d`, can realize it). `d == 0` can never have a feasible
//! sub-cut (no leaf can sit at depth `<= -1`), so such nodes go straight
//! to depth `1`. Rather than reimplementing the frontier search this
//! check reuses the [`CutEnumerator`]'s own per-node cut table: "does
//! some k-feasible cut stay within depth `d - 1`" is a scan of cuts
//! already on file for that node, skipping the ever-present trivial
//! self-singleton (it names no fanin, so it can't bound anything).

use techmap_common::{Handle, MapError, NodeId};

use crate::cut::CutEnumerator;
use crate::graph::{NodeKind, SubjectGraph};

/// Computes, for every logic node, the minimum depth achievable by any
/// k-feasible cover rooted at that node.
pub struct MinDepthLabeler<'g> {
    enumerator: CutEnumerator<'g>,
}

impl<'g> MinDepthLabeler<'g> {
    /// Builds a labeler bounded to cuts of at most `k` leaves.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::InvalidCutBound`] if `k` is outside
    /// `2..=20`.
    pub fn new(graph: &'g SubjectGraph, k: u32) -> Result<Self, MapError> {
        Ok(Self {
            enumerator: CutEnumerator::new(graph, k)?,
        })
    }

    /// Runs the full sweep, returning the per-node depth (indexed by
    /// [`NodeId::raw`]; inputs and PPIs read `0`) and the graph's
    /// overall maximum depth.
    pub fn label(&mut self) -> (Vec<u32>, u32) {
        let graph = self.enumerator.graph();
        let mut depths = vec![0u32; graph.node_count()];
        let nodes: Vec<(NodeId, NodeKind)> = graph.logic_list().collect();

        for (node, kind) in nodes {
            if !matches!(kind, NodeKind::And | NodeKind::Xor) {
                continue;
            }
            let (f0, f1) = graph.logic_fanins(node);
            let d = Self::fanin_depth(&depths, f0).max(Self::fanin_depth(&depths, f1));
            let depth = if d > 0 && self.find_k_cut(node, &depths, d - 1) {
                d
            } else {
                d + 1
            };
            depths[node.raw() as usize] = depth;
        }

        let max_depth = depths.iter().copied().max().unwrap_or(0);
        (depths, max_depth)
    }

    fn fanin_depth(depths: &[u32], h: Handle) -> u32 {
        h.node().map_or(0, |n| depths[n.raw() as usize])
    }

    /// Whether any k-feasible, non-trivial cut of `node` has every
    /// leaf at depth `<= ceiling`.
    fn find_k_cut(&mut self, node: NodeId, depths: &[u32], ceiling: u32) -> bool {
        self.enumerator.cuts_for(node).skip(1).any(|cut| {
            cut.leaves()
                .iter()
                .all(|leaf| Self::fanin_depth(depths, *leaf) <= ceiling)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::SubjectGraph;
    use techmap_common::Handle;

    #[test]
    fn inputs_are_depth_zero() {
        let mut g = SubjectGraph::new();
        let a = g.new_input();
        g.new_output(a);
        let mut labeler = MinDepthLabeler::new(&g, 4).unwrap();
        let (depths, max_depth) = labeler.label();
        assert_eq!(depths[a.node().unwrap().raw() as usize], 0);
        assert_eq!(max_depth, 0);
    }

    #[test]
    fn and_of_two_inputs_is_depth_one_at_any_useful_k() {
        let mut g = SubjectGraph::new();
        let a = g.new_input();
        let b = g.new_input();
        let ab = g.new_and(a, b);
        g.new_output(ab);

        let mut labeler = MinDepthLabeler::new(&g, 6).unwrap();
        let (depths, max_depth) = labeler.label();
        assert_eq!(depths[ab.node().unwrap().raw() as usize], 1);
        assert_eq!(max_depth, 1);
    }

    #[test]
    fn wide_k_collapses_a_balanced_and_tree_to_depth_one() {
        let mut g = SubjectGraph::new();
        let vars: Vec<Handle> = (0..8).map(|_| g.new_input()).collect();
        let root = g.new_and_tree(&vars);
        g.new_output(root);

        // k=8 can cover all eight inputs in a single cut.
        let mut labeler = MinDepthLabeler::new(&g, 8).unwrap();
        let (depths, max_depth) = labeler.label();
        assert_eq!(depths[root.node().unwrap().raw() as usize], 1);
        assert_eq!(max_depth, 1);
    }

    #[test]
    fn narrow_k_forces_multiple_depth_levels() {
        let mut g = SubjectGraph::new();
        let vars: Vec<Handle> = (0..8).map(|_| g.new_input()).collect();
        let root = g.new_and_tree(&vars);
        g.new_output(root);

        // k=2 cannot cover eight inputs in one cut; depth must grow.
        let mut labeler = MinDepthLabeler::new(&g, 2).unwrap();
        let (depths, max_depth) = labeler.label();
        assert!(max_depth > 1);
        assert!(depths[root.node().unwrap().raw() as usize] > 1);
    }

    #[test]
    fn min_depth_is_monotonically_non_decreasing_along_fanin_edges() {
        let mut g = SubjectGraph::new();
        let a = g.new_input();
        let b = g.new_input();
        let c = g.new_input();
        let ab = g.new_and(a, b);
        let abc = g.new_and(ab, c);
        g.new_output(abc);

        let mut labeler = MinDepthLabeler::new(&g, 2).unwrap();
        let (depths, _) = labeler.label();
        let d_ab = depths[ab.node().unwrap().raw() as usize];
        let d_abc = depths[abc.node().unwrap().raw() as usize];
        assert!(d_abc > d_ab);
    }

    #[test]
    fn rejects_out_of_range_k() {
        let g = SubjectGraph::new();
        assert!(MinDepthLabeler::new(&g, 1).is_err());
        assert!(MinDepthLabeler::new(&g, 21).is_err());
    }
}
