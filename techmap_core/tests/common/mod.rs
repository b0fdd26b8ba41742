//! Shared fixtures for `techmap_core` integration tests: a tiny mock
//! cell library plus builders for the canonical end-to-end networks,
//! reused across the scenario and property test files the way
//! `svql_driver`'s integration tests share one `lazy_static!` fixture
//! block.

use techmap_common::{
    AreaCostPolicy, Cell, CellId, CellLibrary, CostPolicy, Handle, MapError, NodeId, PatternGraph,
    PatternInput, PatternLeaf, PatternNode, PatternNodeId,
};
use techmap_core::{
    Cut, CutEnumerator, DffId, MapGenerator, MappedNetlist, MapRecord, NodeKind, PatternMatcher,
    SubjectGraph,
};

/// Assert that a condition holds, with detailed error message.
#[macro_export]
macro_rules! assert_with_context {
    ($cond:expr, $context:expr) => {
        if !$cond {
            panic!(
                "Assertion failed: {}\nContext: {}",
                stringify!($cond),
                $context
            );
        }
    };
}

/// Assert that an invariant holds.
#[macro_export]
macro_rules! assert_invariant {
    ($cond:expr, $invariant_name:expr) => {
        if !$cond {
            panic!(
                "Invariant violated: {}\nCondition: {}",
                $invariant_name,
                stringify!($cond)
            );
        }
    };
}

pub const BUF: CellId = CellId(0);
pub const INV: CellId = CellId(1);
pub const AND2: CellId = CellId(2);
pub const XOR2: CellId = CellId(3);
pub const DFF: CellId = CellId(4);

#[derive(Debug)]
pub struct MockCell {
    id: CellId,
    name: &'static str,
    input_count: usize,
}

impl Cell for MockCell {
    fn id(&self) -> CellId {
        self.id
    }
    fn name(&self) -> &str {
        self.name
    }
    fn input_count(&self) -> usize {
        self.input_count
    }
}

#[derive(Debug)]
pub struct And2Pattern;
impl PatternGraph for And2Pattern {
    fn cell_id(&self) -> CellId {
        AND2
    }
    fn root(&self) -> PatternNodeId {
        PatternNodeId(0)
    }
    fn node(&self, id: PatternNodeId) -> PatternNode {
        match id.0 {
            0 => PatternNode::And(
                PatternInput {
                    node: PatternNodeId(1),
                    inv: false,
                },
                PatternInput {
                    node: PatternNodeId(2),
                    inv: false,
                },
            ),
            1 => PatternNode::Leaf(PatternLeaf { index: 0 }),
            2 => PatternNode::Leaf(PatternLeaf { index: 1 }),
            _ => unreachable!("and2 pattern has exactly three nodes"),
        }
    }
    fn leaf_count(&self) -> usize {
        2
    }
}

#[derive(Debug)]
pub struct Xor2Pattern;
impl PatternGraph for Xor2Pattern {
    fn cell_id(&self) -> CellId {
        XOR2
    }
    fn root(&self) -> PatternNodeId {
        PatternNodeId(0)
    }
    fn node(&self, id: PatternNodeId) -> PatternNode {
        match id.0 {
            0 => PatternNode::Xor(
                PatternInput {
                    node: PatternNodeId(1),
                    inv: false,
                },
                PatternInput {
                    node: PatternNodeId(2),
                    inv: false,
                },
            ),
            1 => PatternNode::Leaf(PatternLeaf { index: 0 }),
            2 => PatternNode::Leaf(PatternLeaf { index: 1 }),
            _ => unreachable!("xor2 pattern has exactly three nodes"),
        }
    }
    fn leaf_count(&self) -> usize {
        2
    }
}

pub struct MockLibrary {
    cells: Vec<MockCell>,
    patterns: Vec<Box<dyn PatternGraph>>,
}

impl MockLibrary {
    pub fn new() -> Self {
        Self {
            cells: vec![
                MockCell {
                    id: BUF,
                    name: "BUF",
                    input_count: 1,
                },
                MockCell {
                    id: INV,
                    name: "INV",
                    input_count: 1,
                },
                MockCell {
                    id: AND2,
                    name: "AND2",
                    input_count: 2,
                },
                MockCell {
                    id: XOR2,
                    name: "XOR2",
                    input_count: 2,
                },
                MockCell {
                    id: DFF,
                    name: "DFF",
                    input_count: 1,
                },
            ],
            patterns: vec![Box::new(And2Pattern), Box::new(Xor2Pattern)],
        }
    }
}

impl CellLibrary for MockLibrary {
    fn cell(&self, id: CellId) -> Option<&dyn Cell> {
        self.cells
            .iter()
            .find(|c| c.id() == id)
            .map(|c| c as &dyn Cell)
    }

    fn patterns(&self) -> &[Box<dyn PatternGraph>] {
        &self.patterns
    }
}

fn map_logic_node(
    graph: &SubjectGraph,
    node: NodeId,
    cuts: &[Cut],
    library: &MockLibrary,
    cost_policy: &dyn CostPolicy,
    record: &mut MapRecord,
) {
    for &inv in &[false, true] {
        let mut best: Option<(techmap_common::Cost, CellId, Cut)> = None;
        for cut in cuts.iter().filter(|c| c.leaf_count() > 1) {
            for pattern in library.patterns() {
                let cell = library
                    .cell(pattern.cell_id())
                    .expect("library is internally consistent");
                if cell.input_count() != cut.leaf_count() {
                    continue;
                }
                let mut matcher = PatternMatcher::new(pattern.as_ref());
                let Some(m) = matcher.match_pattern(graph, Handle::from_node(node, inv)) else {
                    continue;
                };
                let cost = cost_policy.cost(cell, node, cut.leaf_count());
                if best
                    .as_ref()
                    .is_none_or(|(best_cost, ..)| cost_policy.better(cost, *best_cost))
                {
                    let mut leaves = m.leaves;
                    leaves.sort_by_key(|h| h.node().map(NodeId::raw).unwrap_or(u32::MAX));
                    best = Some((cost, cell.id(), Cut::from_leaves(leaves)));
                }
            }
        }
        match best {
            Some((_, cell_id, cut)) => record.set_logic_match(node, inv, cut, cell_id),
            None if inv => record.set_inv_match(node, true, INV),
            None => {}
        }
    }
}

fn map_primary_input(node: NodeId, record: &mut MapRecord) {
    record.set_logic_match(node, false, Cut::single_leaf(node, false), BUF);
    record.set_inv_match(node, true, INV);
}

/// Runs the whole pipeline (cut enumeration, pattern matching, map
/// generation) against `graph` using [`MockLibrary`], returning the
/// mapped netlist or the first fatal error encountered.
pub fn map_all(graph: &SubjectGraph, library: &MockLibrary) -> Result<MappedNetlist, MapError> {
    let cost_policy = AreaCostPolicy;
    let mut record = MapRecord::init(graph);
    record.set_const0(BUF);
    record.set_const1(BUF);

    for &input in graph.inputs() {
        map_primary_input(input, &mut record);
    }

    let mut enumerator = CutEnumerator::new(graph, 6)?;
    let logic_nodes: Vec<(NodeId, NodeKind)> = graph.logic_list().collect();
    for (node, kind) in logic_nodes {
        if !matches!(kind, NodeKind::And | NodeKind::Xor) {
            continue;
        }
        let cuts: Vec<Cut> = enumerator.cuts_for(node).cloned().collect();
        map_logic_node(graph, node, &cuts, library, &cost_policy, &mut record);
    }

    for (i, _dff) in graph.dffs().iter().enumerate() {
        record.set_dff_match(DffId(i as u32), false, DFF);
    }

    MapGenerator::generate(graph, &record)
}

pub fn empty_network() -> SubjectGraph {
    SubjectGraph::new()
}

pub fn buffer_network() -> SubjectGraph {
    let mut g = SubjectGraph::new();
    let a = g.new_input();
    let y = g.new_output(a);
    g.add_port_bit("a", a.node().unwrap());
    g.add_port_bit("y", y);
    g
}

pub fn inverter_network() -> SubjectGraph {
    let mut g = SubjectGraph::new();
    let a = g.new_input();
    let y = g.new_output(!a);
    g.add_port_bit("a", a.node().unwrap());
    g.add_port_bit("y", y);
    g
}

pub fn and2_network() -> SubjectGraph {
    let mut g = SubjectGraph::new();
    let a = g.new_input();
    let b = g.new_input();
    let ab = g.new_and(a, b);
    let y = g.new_output(ab);
    g.add_port_bit("a", a.node().unwrap());
    g.add_port_bit("b", b.node().unwrap());
    g.add_port_bit("y", y);
    g
}

pub fn full_adder_sum_network() -> SubjectGraph {
    let mut g = SubjectGraph::new();
    let a = g.new_input();
    let b = g.new_input();
    let c = g.new_input();
    let ab = g.new_xor(a, b);
    let s = g.new_xor(ab, c);
    let y = g.new_output(s);
    g.add_port_bit("a", a.node().unwrap());
    g.add_port_bit("b", b.node().unwrap());
    g.add_port_bit("c", c.node().unwrap());
    g.add_port_bit("s", y);
    g
}

pub fn registered_output_network() -> SubjectGraph {
    let mut g = SubjectGraph::new();
    let d = g.new_input();
    let clk = g.new_input();
    let (q, _dff_id) = g.new_dff(d, clk, None, None);
    g.add_port_bit("d", d.node().unwrap());
    g.add_port_bit("clk", clk.node().unwrap());
    g.add_port_bit("q", q);
    g
}

lazy_static::lazy_static! {
    /// One shared mock library instance for every scenario test, rather
    /// than rebuilding its cell/pattern vectors per case.
    pub static ref LIBRARY: MockLibrary = MockLibrary::new();
}
