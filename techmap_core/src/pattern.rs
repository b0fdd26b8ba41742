//! Structural/Boolean pattern matching of cuts against library cells.
//!
//! Matching walks the pattern graph and the subject graph together,
//! recording bindings in a map and an explicit undo queue so a failed
//! attempt rolls back in time proportional to the bindings it made,
//! not to the size of the pattern library. AND tries both child
//! orderings (commutativity); XOR tries both orderings *and* both ways
//! of splitting the required output inversion across its two children,
//! since XOR alone can absorb an inversion into either child exactly
//! once — AND cannot, so an inverted request at an AND node fails
//! outright (a NAND-like cell is instead modeled as an AND-rooted
//! pattern with [`PatternGraph::output_inv`] set).

use ahash::AHashMap;
use techmap_common::{
    CellId, Handle, PatternGraph, PatternInput, PatternLeaf, PatternNode, PatternNodeId as PatNodeId,
};

use crate::graph::{NodeKind, SubjectGraph};

/// The result of a successful match: which subject handle fills each
/// of the cell's input pins.
#[derive(Clone, Debug)]
pub struct Match {
    /// The matched cell.
    pub cell_id: CellId,
    /// `leaves[i]` is the subject handle bound to the cell's `i`-th
    /// input pin.
    pub leaves: Vec<Handle>,
}

/// Matches cuts against one cell's pattern graph, reusing its internal
/// scratch state (the binding maps and undo queue) across calls.
///
/// Two maps enforce the spec's bijective-binding requirement in both
/// directions: `bound` (pattern node → subject handle) keeps a pattern
/// node from binding to two different subject values across an
/// attempt, and `bound_rev` (subject handle → pattern node) keeps a
/// subject value — in particular two distinct pattern leaves — from
/// being claimed by more than one pattern node at once.
pub struct PatternMatcher<'p> {
    pattern: &'p dyn PatternGraph,
    bound: AHashMap<PatNodeId, Handle>,
    bound_rev: AHashMap<Handle, PatNodeId>,
    clear_queue: Vec<PatNodeId>,
}

impl<'p> PatternMatcher<'p> {
    /// Creates a matcher for a single cell's pattern graph.
    #[must_use]
    pub fn new(pattern: &'p dyn PatternGraph) -> Self {
        Self {
            pattern,
            bound: AHashMap::default(),
            bound_rev: AHashMap::default(),
            clear_queue: Vec::new(),
        }
    }

    /// Attempts to match `pattern` against the subject value `root`.
    ///
    /// On success, returns the per-pin leaf bindings and clears all
    /// matcher state ready for the next attempt. On failure, all
    /// speculative bindings are rolled back before returning `None`.
    pub fn match_pattern(&mut self, graph: &SubjectGraph, root: Handle) -> Option<Match> {
        self.bound.clear();
        self.bound_rev.clear();
        self.clear_queue.clear();
        let mut leaves: Vec<Option<Handle>> = vec![None; self.pattern.leaf_count()];
        let target = if self.pattern.output_inv() {
            !root
        } else {
            root
        };
        if self.bind(graph, target, self.pattern.root(), &mut leaves) {
            let leaves = leaves
                .into_iter()
                .enumerate()
                .map(|(i, l)| l.unwrap_or_else(|| panic!("pattern leaf {i} never bound")))
                .collect();
            Some(Match {
                cell_id: self.pattern.cell_id(),
                leaves,
            })
        } else {
            None
        }
    }

    fn bind(
        &mut self,
        graph: &SubjectGraph,
        h: Handle,
        pat: PatNodeId,
        leaves: &mut [Option<Handle>],
    ) -> bool {
        if let Some(&existing) = self.bound.get(&pat) {
            return existing == h;
        }
        if let Some(&existing_pat) = self.bound_rev.get(&h) {
            // `h` is already claimed by a different pattern node: binding it
            // again here would violate the bijective pattern<->subject
            // correspondence, even if this pattern node's own shape would
            // otherwise accept `h`.
            return existing_pat == pat;
        }
        let ok = match self.pattern.node(pat) {
            PatternNode::Leaf(PatternLeaf { index }) => match leaves[index] {
                Some(prior) => prior == h,
                None => {
                    leaves[index] = Some(h);
                    true
                }
            },
            PatternNode::And(p0, p1) => self.bind_and(graph, h, p0, p1, leaves),
            PatternNode::Xor(p0, p1) => self.bind_xor(graph, h, p0, p1, leaves),
        };
        if ok {
            self.bound.insert(pat, h);
            self.bound_rev.insert(h, pat);
            self.clear_queue.push(pat);
        }
        ok
    }

    fn bind_and(
        &mut self,
        graph: &SubjectGraph,
        h: Handle,
        p0: PatternInput,
        p1: PatternInput,
        leaves: &mut [Option<Handle>],
    ) -> bool {
        if h.inv() {
            return false;
        }
        let Some(n) = h.node() else { return false };
        if !matches!(graph.kind(n), NodeKind::And) {
            return false;
        }
        let (f0, f1) = graph.logic_fanins(n);
        self.try_pair(graph, p0, f0, p1, f1, leaves)
            || self.try_pair(graph, p0, f1, p1, f0, leaves)
    }

    fn bind_xor(
        &mut self,
        graph: &SubjectGraph,
        h: Handle,
        p0: PatternInput,
        p1: PatternInput,
        leaves: &mut [Option<Handle>],
    ) -> bool {
        let Some(n) = h.node() else { return false };
        if !matches!(graph.kind(n), NodeKind::Xor) {
            return false;
        }
        let (f0, f1) = graph.logic_fanins(n);
        debug_assert!(!f0.inv() && !f1.inv(), "xor fanins are stored uninverted");
        let n0 = f0.node().expect("xor fanin is never constant after folding");
        let n1 = f1.node().expect("xor fanin is never constant after folding");
        let r = h.inv();

        let combos = [
            (Handle::from_node(n0, r), Handle::from_node(n1, false)),
            (Handle::from_node(n0, false), Handle::from_node(n1, r)),
        ];
        for &(ha, hb) in &combos {
            if self.try_pair(graph, p0, ha, p1, hb, leaves) {
                return true;
            }
            if self.try_pair(graph, p0, hb, p1, ha, leaves) {
                return true;
            }
        }
        false
    }

    fn try_pair(
        &mut self,
        graph: &SubjectGraph,
        pa: PatternInput,
        ha: Handle,
        pb: PatternInput,
        hb: Handle,
        leaves: &mut [Option<Handle>],
    ) -> bool {
        let checkpoint = self.clear_queue.len();
        let ha = if pa.inv { !ha } else { ha };
        let hb = if pb.inv { !hb } else { hb };
        if self.bind(graph, ha, pa.node, leaves) && self.bind(graph, hb, pb.node, leaves) {
            return true;
        }
        self.rollback_to(checkpoint, leaves);
        false
    }

    fn rollback_to(&mut self, checkpoint: usize, leaves: &mut [Option<Handle>]) {
        while self.clear_queue.len() > checkpoint {
            let pat = self
                .clear_queue
                .pop()
                .expect("checkpoint invariant keeps the queue non-empty here");
            if let Some(h) = self.bound.remove(&pat) {
                self.bound_rev.remove(&h);
            }
            if let PatternNode::Leaf(PatternLeaf { index }) = self.pattern.node(pat) {
                leaves[index] = None;
            }
        }
    }
}
