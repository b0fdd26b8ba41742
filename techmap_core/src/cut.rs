//! k-feasible cut enumeration.
//!
//! Cuts are enumerated bottom-up: each logic node's cuts are the
//! cartesian merge of its two fanins' cuts (or, for a fanin left
//! un-expanded, the trivial one-leaf cut naming that fanin directly),
//! kept only where the merged leaf set stays within `k`. Every node
//! additionally always has the singleton cut naming itself. This
//! produces exactly the set of k-feasible cuts a frontier/backtracking
//! search would, without needing a packed per-node mark bitfield: the
//! per-node cut table here *is* the externalized scratch state, held
//! in the enumerator rather than on the node.

use ahash::AHashSet;
use itertools::iproduct;
use smallvec::SmallVec;
use techmap_common::{Handle, MapError, NodeId};

use crate::graph::{NodeKind, SubjectGraph};

/// A k-feasible cut: an ordered, duplicate-free set of leaf handles.
///
/// Leaves are kept in ascending order by the underlying node id so
/// that two cuts with the same leaf set always compare and hash
/// equal regardless of the order their leaves were discovered in.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Cut {
    leaves: SmallVec<[Handle; 20]>,
}

impl Cut {
    fn singleton(root: NodeId) -> Self {
        let mut leaves = SmallVec::new();
        leaves.push(Handle::from_node(root, false));
        Self { leaves }
    }

    /// Builds a cut directly from an explicit leaf list, used for the
    /// synthetic single-leaf cuts `MapRecord::set_inv_match` records.
    #[must_use]
    pub fn from_leaves(leaves: Vec<Handle>) -> Self {
        Self {
            leaves: SmallVec::from_vec(leaves),
        }
    }

    /// Number of leaves in this cut.
    #[must_use]
    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }

    /// The leaves, in canonical ascending order.
    #[must_use]
    pub fn leaves(&self) -> &[Handle] {
        &self.leaves
    }

    /// `true` if every leaf of `self` also appears (by node) in `other`.
    #[must_use]
    pub fn leaf_nodes_subset_of(&self, other: &Cut) -> bool {
        self.leaves.iter().all(|l| {
            other
                .leaves
                .iter()
                .any(|o| o.node() == l.node())
        })
    }

    fn merge(a: &Cut, b: &Cut, k: u32) -> Option<Cut> {
        let mut seen: AHashSet<NodeId> = AHashSet::default();
        let mut leaves: SmallVec<[Handle; 20]> = SmallVec::new();
        for &h in a.leaves.iter().chain(b.leaves.iter()) {
            let n = h.node().expect("cut leaves always reference a node");
            if seen.insert(n) {
                leaves.push(h);
            }
        }
        if leaves.len() as u32 > k {
            return None;
        }
        leaves.sort_by_key(|h| h.node().map(|n| n.raw()).unwrap_or(u32::MAX));
        Some(Cut { leaves })
    }
}

/// Hooks a driver implements to receive enumerated cuts.
///
/// `found_trivial` is always called exactly once per node, before any
/// `found` calls for that node, for the always-present singleton cut.
/// Every `found`/`found_trivial` call for a node is bracketed between
/// that node's `node_init` and `node_end`.
#[allow(unused_variables)]
pub trait CutVisitor {
    /// Called once before any node is processed.
    fn all_init(&mut self, graph: &SubjectGraph, k: u32) {}
    /// Called before a node's cuts are emitted; `pos` is this node's
    /// position in topological order.
    fn node_init(&mut self, node: NodeId, pos: usize) {}
    /// The always-present trivial singleton cut `{node}`.
    fn found_trivial(&mut self, root: NodeId) {}
    /// A non-trivial cut with 2..=k distinct leaves.
    fn found(&mut self, root: NodeId, leaves: &[Handle]) {}
    /// Called after all of a node's cuts have been emitted.
    fn node_end(&mut self, node: NodeId, pos: usize, cut_count: usize) {}
    /// Called once after every node has been processed.
    fn all_end(&mut self, graph: &SubjectGraph, k: u32, total_cuts: usize) {}
}

/// Enumerates k-feasible cuts over a [`SubjectGraph`].
///
/// The per-node cut table is held here, external to [`SubjectGraph`]'s
/// own node storage, per the externalized-scratch-state design this
/// crate follows throughout.
pub struct CutEnumerator<'g> {
    graph: &'g SubjectGraph,
    k: u32,
    table: Vec<Vec<Cut>>,
    computed: bool,
}

impl<'g> CutEnumerator<'g> {
    /// Builds an enumerator for `graph` bounded to cuts of at most `k`
    /// leaves.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::InvalidCutBound`] if `k` is outside
    /// `2..=20`.
    pub fn new(graph: &'g SubjectGraph, k: u32) -> Result<Self, MapError> {
        if !(2..=20).contains(&k) {
            return Err(MapError::InvalidCutBound { k });
        }
        Ok(Self {
            graph,
            k,
            table: vec![Vec::new(); graph.node_count()],
            computed: false,
        })
    }

    /// The subject graph this enumerator was built over.
    #[must_use]
    pub fn graph(&self) -> &'g SubjectGraph {
        self.graph
    }

    /// The cut-size bound this enumerator was built with.
    #[must_use]
    pub fn k(&self) -> u32 {
        self.k
    }

    /// Runs the full sweep, bracketed by `all_init`/`all_end`, emitting
    /// every enumerated cut to `visitor`, and returns the total cut
    /// count summed across every node (the same total passed to
    /// `all_end`).
    pub fn enumerate<V: CutVisitor>(&mut self, visitor: &mut V) -> usize {
        tracing::debug!(k = self.k, nodes = self.graph.node_count(), "starting cut enumeration sweep");
        let start = std::time::Instant::now();
        visitor.all_init(self.graph, self.k);
        let mut total = 0usize;
        for (pos, (node, kind)) in self.graph.logic_list().enumerate() {
            if matches!(kind, NodeKind::Output) {
                continue;
            }
            visitor.node_init(node, pos);
            let cuts = self.cuts_of(node, kind);
            visitor.found_trivial(node);
            let mut count = 1usize;
            for cut in cuts.iter().skip(1) {
                visitor.found(node, cut.leaves());
                count += 1;
            }
            total += count;
            visitor.node_end(node, pos, count);
        }
        self.computed = true;
        visitor.all_end(self.graph, self.k, total);
        tracing::debug!(total_cuts = total, elapsed = ?start.elapsed(), "cut enumeration sweep complete");
        total
    }

    /// Lazily enumerated cuts of `node`, driving one full sweep (cached
    /// for subsequent calls) the first time it is invoked.
    pub fn cuts_for(&mut self, node: NodeId) -> impl Iterator<Item = &Cut> {
        if !self.computed {
            self.compute_all();
        }
        self.table[node.raw() as usize].iter()
    }

    fn compute_all(&mut self) {
        let nodes: Vec<(NodeId, NodeKind)> = self.graph.logic_list().collect();
        for (node, kind) in nodes {
            if matches!(kind, NodeKind::Output) {
                continue;
            }
            let cuts = self.cuts_of(node, kind);
            self.table[node.raw() as usize] = cuts;
        }
        self.computed = true;
    }

    fn cuts_of(&mut self, node: NodeId, kind: NodeKind) -> Vec<Cut> {
        if !self.table[node.raw() as usize].is_empty() {
            return self.table[node.raw() as usize].clone();
        }
        let mut cuts = vec![Cut::singleton(node)];
        if let NodeKind::And | NodeKind::Xor = kind {
            let (f0, f1) = self.graph.logic_fanins(node);
            let side0 = self.side_cuts(f0);
            let side1 = self.side_cuts(f1);
            let mut seen: AHashSet<Vec<u32>> = AHashSet::default();
            seen.insert(Self::sig(&cuts[0]));
            for (a, b) in iproduct!(&side0, &side1) {
                if let Some(merged) = Cut::merge(a, b, self.k) {
                    let sig = Self::sig(&merged);
                    if seen.insert(sig) {
                        cuts.push(merged);
                    }
                }
            }
        }
        self.table[node.raw() as usize] = cuts.clone();
        cuts
    }

    /// Cuts usable as one side of a merge for fanin `h`: either the
    /// expanded cuts of the node it references (skipping that node's
    /// own singleton, already representable as the direct leaf option
    /// below) or, always, the option of truncating here and leaving
    /// `h`'s node as a leaf.
    fn side_cuts(&mut self, h: Handle) -> Vec<Cut> {
        let mut out = Vec::new();
        if let Some(n) = h.node() {
            out.push(Cut::singleton_handle(n, h.inv()));
            let kind = self.graph.kind(n);
            if let NodeKind::And | NodeKind::Xor = kind {
                let sub = self.cuts_of(n, kind);
                out.extend(sub.into_iter().filter(|c| c.leaf_count() > 1));
            }
        }
        out
    }

    fn sig(cut: &Cut) -> Vec<u32> {
        ahash_sig(cut)
    }
}

impl Cut {
    fn singleton_handle(node: NodeId, inv: bool) -> Self {
        let mut leaves = SmallVec::new();
        leaves.push(Handle::from_node(node, inv));
        Self { leaves }
    }
}

/// Parallel cut enumeration across independent output roots, available
/// behind the `rayon` feature.
///
/// `CutEnumerator::enumerate` sweeps the whole graph once in
/// topological order through a single `&mut self` cut table; that's
/// the right shape for the common case but serializes roots that don't
/// actually depend on each other. This module instead keys the cut
/// table by a concurrent map so sibling output roots can be swept on
/// separate rayon threads, falling back to whichever root gets there
/// first whenever two roots share a fanin.
#[cfg(feature = "rayon")]
pub mod parallel {
    use std::sync::Arc;

    use dashmap::DashMap;
    use rayon::prelude::*;

    use super::{ahash_sig, iproduct, AHashSet, Cut};
    use crate::graph::{NodeKind, SubjectGraph};
    use techmap_common::{Handle, MapError, NodeId};

    /// Shared cache of a node's fully-enumerated cuts. Whichever root
    /// reaches a node first computes and writes it; every other root
    /// that later fans into the same node reads the cached value
    /// instead of recomputing it. Matches the teacher's use of
    /// `dashmap` for exactly this kind of guarded shared cache, rather
    /// than a single `Mutex` around the whole table.
    pub type Cover = DashMap<NodeId, Arc<Vec<Cut>>>;

    /// Enumerates cuts for every node reachable from `graph`'s primary
    /// outputs, processing independent outputs on separate rayon
    /// threads and sharing already-computed fanin cuts through `cache`.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::InvalidCutBound`] if `k` is outside
    /// `2..=20`.
    pub fn enumerate_outputs(graph: &SubjectGraph, k: u32, cache: &Cover) -> Result<(), MapError> {
        if !(2..=20).contains(&k) {
            return Err(MapError::InvalidCutBound { k });
        }
        graph.outputs().par_iter().for_each(|&out| {
            if let Some(n) = graph.output_fanin(out).node() {
                cuts_of_cached(graph, k, cache, n);
            }
        });
        Ok(())
    }

    fn cuts_of_cached(graph: &SubjectGraph, k: u32, cache: &Cover, node: NodeId) -> Arc<Vec<Cut>> {
        if let Some(existing) = cache.get(&node) {
            return existing.clone();
        }
        let kind = graph.kind(node);
        let mut cuts = vec![Cut::singleton(node)];
        if let NodeKind::And | NodeKind::Xor = kind {
            let (f0, f1) = graph.logic_fanins(node);
            let side0 = side_cuts_cached(graph, k, cache, f0);
            let side1 = side_cuts_cached(graph, k, cache, f1);
            let mut seen: AHashSet<Vec<u32>> = AHashSet::default();
            seen.insert(ahash_sig(&cuts[0]));
            for (a, b) in iproduct!(&side0, &side1) {
                if let Some(merged) = Cut::merge(a, b, k) {
                    if seen.insert(ahash_sig(&merged)) {
                        cuts.push(merged);
                    }
                }
            }
        }
        cache.entry(node).or_insert_with(|| Arc::new(cuts)).clone()
    }

    fn side_cuts_cached(graph: &SubjectGraph, k: u32, cache: &Cover, h: Handle) -> Vec<Cut> {
        let mut out = Vec::new();
        if let Some(n) = h.node() {
            out.push(Cut::singleton_handle(n, h.inv()));
            if let NodeKind::And | NodeKind::Xor = graph.kind(n) {
                let sub = cuts_of_cached(graph, k, cache, n);
                out.extend(sub.iter().filter(|c| c.leaf_count() > 1).cloned());
            }
        }
        out
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn matches_sequential_enumeration_on_a_shared_fanin() {
            let mut g = SubjectGraph::new();
            let a = g.new_input();
            let b = g.new_input();
            let c = g.new_input();
            let ab = g.new_and(a, b);
            let x = g.new_and(ab, c);
            let y = g.new_and(ab, !c);
            g.new_output(x);
            g.new_output(y);

            let cache = Cover::new();
            enumerate_outputs(&g, 4, &cache).unwrap();

            let mut sequential = super::super::CutEnumerator::new(&g, 4).unwrap();
            let x_node = x.node().unwrap();
            let y_node = y.node().unwrap();
            let want_x: AHashSet<Vec<Handle>> = sequential
                .cuts_for(x_node)
                .map(|c| c.leaves().to_vec())
                .collect();
            let want_y: AHashSet<Vec<Handle>> = sequential
                .cuts_for(y_node)
                .map(|c| c.leaves().to_vec())
                .collect();

            let got_x: AHashSet<Vec<Handle>> = cache
                .get(&x_node)
                .unwrap()
                .iter()
                .map(|c| c.leaves().to_vec())
                .collect();
            let got_y: AHashSet<Vec<Handle>> = cache
                .get(&y_node)
                .unwrap()
                .iter()
                .map(|c| c.leaves().to_vec())
                .collect();
            assert_eq!(got_x, want_x);
            assert_eq!(got_y, want_y);
        }

        #[test]
        fn rejects_out_of_range_k() {
            let g = SubjectGraph::new();
            let cache = Cover::new();
            assert!(enumerate_outputs(&g, 0, &cache).is_err());
            assert!(enumerate_outputs(&g, 64, &cache).is_err());
        }
    }
}

fn ahash_sig(cut: &Cut) -> Vec<u32> {
    cut.leaves.iter().map(|h| h.node().unwrap().raw()).collect()
}
