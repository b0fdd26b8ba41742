//! The subject graph: a two-input AND/XOR DAG with sequential elements.
//!
//! Constant folding happens at construction time in [`SubjectGraph::and`]
//! and [`SubjectGraph::xor`] (and therefore in every multi-input helper
//! built on top of them), so a fully built graph never contains a gate
//! with a constant operand. AND's two fanins are stored in a canonical
//! (ascending) order so that two structurally identical ANDs built in
//! either child order compare equal; XOR absorbs the polarity of both
//! of its operands onto its own output, so a XOR node's two stored
//! fanins are never themselves inverted.

use std::sync::RwLock;

use ahash::AHashMap;
use contracts::{debug_ensures, debug_requires};
use techmap_common::{Handle, NodeId};

/// The structural role of a subject-graph node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// A primary input, or the pseudo-primary-input presented by a
    /// DFF/latch output — either way, a source with no fanin.
    Input,
    /// A primary output. Its only fanin is the handle it exports.
    Output,
    /// A two-input AND gate.
    And,
    /// A two-input XOR gate.
    Xor,
}

#[derive(Clone, Debug)]
struct Node {
    kind: NodeKind,
    fanin0: Handle,
    fanin1: Handle,
    /// Only meaningful for [`NodeKind::Input`]: whether the external
    /// driver supplies both polarities of this signal for free.
    bipol: bool,
}

/// A multi-bit port: a name paired with the ordered node ids carrying
/// its bits. Input ports reference [`NodeKind::Input`] nodes; output
/// ports reference [`NodeKind::Output`] nodes.
#[derive(Clone, Debug)]
pub struct Port {
    /// The port's declared name.
    pub name: String,
    /// The bits of the port, most-significant or least-significant
    /// first as the caller chose when building it.
    pub bits: Vec<NodeId>,
}

/// Identifies a flip-flop within a [`SubjectGraph`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DffId(pub u32);

/// Identifies a latch within a [`SubjectGraph`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LatchId(pub u32);

/// An edge-triggered flip-flop. `output` is an [`NodeKind::Input`] node
/// representing the registered value as seen by its fanout.
#[derive(Clone, Debug)]
pub struct Dff {
    /// The value latched on the active clock edge.
    pub data: Handle,
    /// The node presenting the registered value to the rest of the
    /// graph.
    pub output: NodeId,
    /// The clock.
    pub clock: Handle,
    /// Optional asynchronous clear.
    pub clear: Option<Handle>,
    /// Optional asynchronous preset.
    pub preset: Option<Handle>,
}

/// A level-sensitive latch. `output` is an [`NodeKind::Input`] node
/// representing the latched value as seen by its fanout.
#[derive(Clone, Debug)]
pub struct Latch {
    /// The value passed through while `enable` is active.
    pub data: Handle,
    /// The node presenting the latched value to the rest of the
    /// graph.
    pub output: NodeId,
    /// The enable signal.
    pub enable: Handle,
    /// Optional asynchronous clear.
    pub clear: Option<Handle>,
    /// Optional asynchronous preset.
    pub preset: Option<Handle>,
}

/// A minimal boolean-expression tree, used by [`SubjectGraph::new_expr`]
/// to lower an externally elaborated expression in one call.
#[derive(Clone, Debug)]
pub enum ExprNode {
    /// A reference to the `index`-th previously built input handle.
    Var(usize),
    /// A boolean constant.
    Const(bool),
    /// Logical negation.
    Not(Box<ExprNode>),
    /// A (possibly multi-input) conjunction.
    And(Vec<ExprNode>),
    /// A (possibly multi-input) disjunction.
    Or(Vec<ExprNode>),
    /// A (possibly multi-input) parity.
    Xor(Vec<ExprNode>),
}

/// A two-input AND/XOR DAG with sequential elements.
///
/// Nodes are appended in creation order and a node's fanins always
/// refer to already-created nodes, so `nodes` is trivially kept in
/// topological order (invariant I2) without a separate sort pass.
#[derive(Debug, Default)]
pub struct SubjectGraph {
    nodes: Vec<Node>,
    inputs: Vec<NodeId>,
    outputs: Vec<NodeId>,
    ports: Vec<Port>,
    dffs: Vec<Dff>,
    latches: Vec<Latch>,
    /// Cached topological level per node; `None` whenever the graph has
    /// been mutated since the last [`SubjectGraph::level`] call. A
    /// `RwLock` rather than a `RefCell` keeps `SubjectGraph` `Sync` so the
    /// `rayon` cut-enumeration path can share a `&SubjectGraph` across
    /// worker threads.
    levels: RwLock<Option<Vec<u32>>>,
}

impl SubjectGraph {
    /// Creates an empty subject graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of nodes, including inputs, outputs and PPIs.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// The structural kind of a node.
    #[must_use]
    pub fn kind(&self, node: NodeId) -> NodeKind {
        self.nodes[node.raw() as usize].kind
    }

    /// The two fanins of an AND/XOR node. Panics if `node` is not a
    /// logic node.
    #[must_use]
    pub fn logic_fanins(&self, node: NodeId) -> (Handle, Handle) {
        let n = &self.nodes[node.raw() as usize];
        debug_assert!(matches!(n.kind, NodeKind::And | NodeKind::Xor));
        (n.fanin0, n.fanin1)
    }

    /// The single fanin of an output node. Panics if `node` is not an
    /// output.
    #[must_use]
    pub fn output_fanin(&self, node: NodeId) -> Handle {
        let n = &self.nodes[node.raw() as usize];
        debug_assert!(matches!(n.kind, NodeKind::Output));
        n.fanin0
    }

    /// All nodes in topological order, paired with their ids.
    pub fn logic_list(&self) -> impl Iterator<Item = (NodeId, NodeKind)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (NodeId::from_raw(i as u32), n.kind))
    }

    /// Dense list of true primary inputs (DFF/latch outputs are
    /// excluded — see [`SubjectGraph::dffs`]/[`SubjectGraph::latches`]).
    #[must_use]
    pub fn inputs(&self) -> &[NodeId] {
        &self.inputs
    }

    /// List of primary outputs, in declaration order.
    #[must_use]
    pub fn outputs(&self) -> &[NodeId] {
        &self.outputs
    }

    /// All declared ports.
    #[must_use]
    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    /// All flip-flops.
    #[must_use]
    pub fn dffs(&self) -> &[Dff] {
        &self.dffs
    }

    /// All latches.
    #[must_use]
    pub fn latches(&self) -> &[Latch] {
        &self.latches
    }

    fn push_node(&mut self, kind: NodeKind, fanin0: Handle, fanin1: Handle) -> NodeId {
        let id = NodeId::from_raw(self.nodes.len() as u32);
        self.nodes.push(Node {
            kind,
            fanin0,
            fanin1,
            bipol: false,
        });
        *self.levels.get_mut().expect("level cache lock is never poisoned") = None;
        id
    }

    /// Creates a new primary input, returning its positive handle.
    pub fn new_input(&mut self) -> Handle {
        self.new_input_with_bipol(false)
    }

    /// Creates a new primary input whose driver supplies both
    /// polarities for free, returning its positive handle.
    pub fn new_bipol_input(&mut self) -> Handle {
        self.new_input_with_bipol(true)
    }

    fn new_input_with_bipol(&mut self, bipol: bool) -> Handle {
        let id = self.push_node(NodeKind::Input, Handle::ZERO, Handle::ZERO);
        self.nodes[id.raw() as usize].bipol = bipol;
        self.inputs.push(id);
        Handle::from_node(id, false)
    }

    /// Whether `node`'s driver supplies both polarities for free.
    /// Only meaningful for [`NodeKind::Input`] nodes; always `false`
    /// for everything else.
    #[must_use]
    pub fn is_bipol(&self, node: NodeId) -> bool {
        self.nodes[node.raw() as usize].bipol
    }

    /// This node's topological level: `0` for inputs, `max(fanin
    /// levels) + 1` for logic nodes, lazily computed and cached until
    /// the next mutating call.
    #[must_use]
    pub fn level(&self, node: NodeId) -> u32 {
        self.ensure_levels();
        self.levels
            .read()
            .expect("level cache lock is never poisoned")
            .as_ref()
            .expect("just computed")[node.raw() as usize]
    }

    /// The maximum level of any driver of a primary output or a
    /// DFF/latch data input — the graph's overall reported level.
    #[must_use]
    pub fn max_level(&self) -> u32 {
        self.ensure_levels();
        let levels = self.levels.read().expect("level cache lock is never poisoned");
        let levels = levels.as_ref().expect("just computed");
        let driver_level = |h: Handle| -> u32 {
            h.node().map_or(0, |n| levels[n.raw() as usize])
        };
        let mut max = 0;
        for &out in &self.outputs {
            max = max.max(driver_level(self.output_fanin(out)));
        }
        for dff in &self.dffs {
            max = max.max(driver_level(dff.data));
        }
        for latch in &self.latches {
            max = max.max(driver_level(latch.data));
        }
        max
    }

    fn ensure_levels(&self) {
        if self
            .levels
            .read()
            .expect("level cache lock is never poisoned")
            .is_some()
        {
            return;
        }
        tracing::trace!(nodes = self.nodes.len(), "recomputing subject graph levels");
        let mut levels = vec![0u32; self.nodes.len()];
        for (id, kind) in self.logic_list() {
            if let NodeKind::And | NodeKind::Xor = kind {
                let (f0, f1) = self.logic_fanins(id);
                let l0 = f0.node().map_or(0, |n| levels[n.raw() as usize]);
                let l1 = f1.node().map_or(0, |n| levels[n.raw() as usize]);
                levels[id.raw() as usize] = l0.max(l1) + 1;
            }
        }
        *self
            .levels
            .write()
            .expect("level cache lock is never poisoned") = Some(levels);
    }

    /// Creates a new primary output driven by `driver`.
    #[debug_requires(self.handle_in_range(driver), "driver must reference a node already in this graph")]
    pub fn new_output(&mut self, driver: Handle) -> NodeId {
        let id = self.push_node(NodeKind::Output, driver, Handle::ZERO);
        self.outputs.push(id);
        id
    }

    fn handle_in_range(&self, h: Handle) -> bool {
        match h.node() {
            None => true,
            Some(n) => (n.raw() as usize) < self.nodes.len(),
        }
    }

    /// Builds a two-input AND, folding constants and normalizing fanin
    /// order so that `and(a, b)` and `and(b, a)` always produce the
    /// same handle.
    #[debug_requires(self.handle_in_range(h1) && self.handle_in_range(h2))]
    #[debug_ensures(self.handle_in_range(ret))]
    pub fn new_and(&mut self, h1: Handle, h2: Handle) -> Handle {
        if h1.is_const0() || h2.is_const0() {
            return Handle::ZERO;
        }
        if h1.is_const1() {
            return h2;
        }
        if h2.is_const1() {
            return h1;
        }
        if h1 == h2 {
            return h1;
        }
        if h1 == !h2 {
            return Handle::ZERO;
        }
        let (lo, hi) = if h1 <= h2 { (h1, h2) } else { (h2, h1) };
        let id = self.push_node(NodeKind::And, lo, hi);
        Handle::from_node(id, false)
    }

    /// Builds a two-input OR via De Morgan's law over [`Self::new_and`],
    /// inheriting its constant-folding and canonical ordering.
    pub fn new_or(&mut self, h1: Handle, h2: Handle) -> Handle {
        !self.new_and(!h1, !h2)
    }

    /// Builds a two-input XOR, folding constants and absorbing both
    /// operands' polarity onto the output so the stored fanins are
    /// never themselves inverted.
    #[debug_requires(self.handle_in_range(h1) && self.handle_in_range(h2))]
    #[debug_ensures(self.handle_in_range(ret))]
    pub fn new_xor(&mut self, h1: Handle, h2: Handle) -> Handle {
        if h1.is_const(){
            return if h1.is_const1() { !h2 } else { h2 };
        }
        if h2.is_const() {
            return if h2.is_const1() { !h1 } else { h1 };
        }
        if h1.normalize() == h2.normalize() {
            return Handle::from(h1.inv() ^ h2.inv());
        }
        let a = h1.normalize();
        let b = h2.normalize();
        let out_inv = h1.inv() ^ h2.inv();
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let id = self.push_node(NodeKind::Xor, lo, hi);
        Handle::from_node(id, out_inv)
    }

    /// Lowers a multi-input conjunction via a balanced, range-subdivided
    /// reduction tree after filtering identity (`1`) operands and
    /// short-circuiting on an annihilating (`0`) operand — the same
    /// shape as [`Self::new_or_tree`]/[`Self::new_xor_tree`].
    pub fn new_and_tree(&mut self, operands: &[Handle]) -> Handle {
        let mut kept: Vec<Handle> = Vec::with_capacity(operands.len());
        for &h in operands {
            if h.is_const0() {
                return Handle::ZERO;
            }
            if !h.is_const1() {
                kept.push(h);
            }
        }
        if kept.is_empty() {
            return Handle::ONE;
        }
        self.reduce_tree(&kept, 0, kept.len(), &mut Self::new_and)
    }

    /// Lowers a multi-input disjunction the same way as
    /// [`Self::new_and_tree`], with `0`/`1` roles swapped.
    pub fn new_or_tree(&mut self, operands: &[Handle]) -> Handle {
        let mut kept: Vec<Handle> = Vec::with_capacity(operands.len());
        for &h in operands {
            if h.is_const1() {
                return Handle::ONE;
            }
            if !h.is_const0() {
                kept.push(h);
            }
        }
        if kept.is_empty() {
            return Handle::ZERO;
        }
        self.reduce_tree(&kept, 0, kept.len(), &mut Self::new_or)
    }

    /// Lowers a multi-input parity. Constant operands are folded out,
    /// each `1` operand flipping a running inversion that is applied to
    /// the final result.
    pub fn new_xor_tree(&mut self, operands: &[Handle]) -> Handle {
        let mut kept: Vec<Handle> = Vec::with_capacity(operands.len());
        let mut inv = false;
        for &h in operands {
            if h.is_const() {
                inv ^= h.is_const1();
            } else {
                kept.push(h);
            }
        }
        let base = if kept.is_empty() {
            Handle::ZERO
        } else {
            self.reduce_tree(&kept, 0, kept.len(), &mut Self::new_xor)
        };
        if inv {
            !base
        } else {
            base
        }
    }

    /// Recursively subdivides `operands[start..end]` into two halves,
    /// combining each half's result with `op`, bounding tree depth at
    /// `O(log n)` instead of folding left-to-right.
    fn reduce_tree<F: FnMut(&mut Self, Handle, Handle) -> Handle>(
        &mut self,
        operands: &[Handle],
        start: usize,
        end: usize,
        op: &mut F,
    ) -> Handle {
        debug_assert!(start < end);
        if end - start == 1 {
            return operands[start];
        }
        let mid = start + (end - start) / 2;
        let lhs = self.reduce_tree(operands, start, mid, op);
        let rhs = self.reduce_tree(operands, mid, end, op);
        op(self, lhs, rhs)
    }

    /// Lowers a small boolean-expression tree using the constant-folding
    /// constructors above.
    pub fn new_expr(&mut self, expr: &ExprNode, vars: &[Handle]) -> Handle {
        match expr {
            ExprNode::Var(i) => vars[*i],
            ExprNode::Const(b) => {
                if *b {
                    Handle::ONE
                } else {
                    Handle::ZERO
                }
            }
            ExprNode::Not(inner) => !self.new_expr(inner, vars),
            ExprNode::And(items) => {
                let handles: Vec<Handle> = items.iter().map(|e| self.new_expr(e, vars)).collect();
                self.new_and_tree(&handles)
            }
            ExprNode::Or(items) => {
                let handles: Vec<Handle> = items.iter().map(|e| self.new_expr(e, vars)).collect();
                self.new_or_tree(&handles)
            }
            ExprNode::Xor(items) => {
                let handles: Vec<Handle> = items.iter().map(|e| self.new_expr(e, vars)).collect();
                self.new_xor_tree(&handles)
            }
        }
    }

    /// Registers a flip-flop, creating its output PPI node.
    pub fn new_dff(
        &mut self,
        data: Handle,
        clock: Handle,
        clear: Option<Handle>,
        preset: Option<Handle>,
    ) -> (NodeId, DffId) {
        let output = self.push_node(NodeKind::Input, Handle::ZERO, Handle::ZERO);
        let id = DffId(self.dffs.len() as u32);
        self.dffs.push(Dff {
            data,
            output,
            clock,
            clear,
            preset,
        });
        (output, id)
    }

    /// Registers a latch, creating its output PPI node.
    pub fn new_latch(
        &mut self,
        data: Handle,
        enable: Handle,
        clear: Option<Handle>,
        preset: Option<Handle>,
    ) -> (NodeId, LatchId) {
        let output = self.push_node(NodeKind::Input, Handle::ZERO, Handle::ZERO);
        let id = LatchId(self.latches.len() as u32);
        self.latches.push(Latch {
            data,
            output,
            enable,
            clear,
            preset,
        });
        (output, id)
    }

    /// Declares a named port over the given bits.
    #[debug_requires(bits.iter().all(|n| (n.raw() as usize) < self.nodes.len()), "port body must reference existing nodes")]
    pub fn add_port(&mut self, name: impl Into<String>, bits: Vec<NodeId>) {
        self.ports.push(Port {
            name: name.into(),
            bits,
        });
    }

    /// Declares a single-bit named port.
    pub fn add_port_bit(&mut self, name: impl Into<String>, node: NodeId) {
        self.add_port(name, vec![node]);
    }

    /// Deep-copies this graph, returning the copy along with the
    /// old-to-new id remap used to translate any externally held
    /// [`NodeId`]/[`Handle`] values.
    #[must_use]
    pub fn deep_copy(&self) -> (Self, Vec<NodeId>) {
        tracing::debug!(nodes = self.nodes.len(), "deep-copying subject graph");
        let remap: Vec<NodeId> = (0..self.nodes.len() as u32).map(NodeId::from_raw).collect();
        let translate = |h: Handle| -> Handle {
            match h.node() {
                None => h,
                Some(n) => Handle::from_node(remap[n.raw() as usize], h.inv()),
            }
        };
        let nodes = self
            .nodes
            .iter()
            .map(|n| Node {
                kind: n.kind,
                fanin0: translate(n.fanin0),
                fanin1: translate(n.fanin1),
                bipol: n.bipol,
            })
            .collect();
        let copy = Self {
            nodes,
            inputs: self.inputs.clone(),
            outputs: self.outputs.clone(),
            ports: self.ports.clone(),
            levels: RwLock::new(None),
            dffs: self
                .dffs
                .iter()
                .map(|d| Dff {
                    data: translate(d.data),
                    output: d.output,
                    clock: translate(d.clock),
                    clear: d.clear.map(translate),
                    preset: d.preset.map(translate),
                })
                .collect(),
            latches: self
                .latches
                .iter()
                .map(|l| Latch {
                    data: translate(l.data),
                    output: l.output,
                    enable: translate(l.enable),
                    clear: l.clear.map(translate),
                    preset: l.preset.map(translate),
                })
                .collect(),
        };
        (copy, remap)
    }
}

/// Every node reachable, backward, from `from` through logic fanins —
/// used by tests to check structural properties without duplicating
/// the cut enumerator.
#[must_use]
pub fn ancestors_closure(graph: &SubjectGraph, from: NodeId) -> AHashMap<NodeId, ()> {
    let mut seen = AHashMap::default();
    let mut stack = vec![from];
    while let Some(n) = stack.pop() {
        if seen.insert(n, ()).is_some() {
            continue;
        }
        if let NodeKind::And | NodeKind::Xor = graph.kind(n) {
            let (f0, f1) = graph.logic_fanins(n);
            if let Some(n0) = f0.node() {
                stack.push(n0);
            }
            if let Some(n1) = f1.node() {
                stack.push(n1);
            }
        }
    }
    seen
}

impl From<bool> for Handle {
    fn from(b: bool) -> Self {
        if b {
            Handle::ONE
        } else {
            Handle::ZERO
        }
    }
}
