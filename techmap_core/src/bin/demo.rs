//! Demonstration binary wiring the cut enumerator, pattern matcher, map
//! recorder and map generator together against a tiny in-memory cell
//! library. Takes no arguments and parses no flags; this is ambient
//! demo/test tooling standing in for an external driver, mirroring the
//! teacher's `svql_subgraph/src/bin/example*.rs` binaries, not a CLI
//! surface for the library itself.

use techmap_common::{
    AreaCostPolicy, Cell, CellId, CellLibrary, CostPolicy, Handle, NodeId, PatternGraph,
    PatternInput, PatternLeaf, PatternNode, PatternNodeId,
};
use techmap_core::{
    Cut, CutEnumerator, DffId, MapGenerator, MapRecord, NodeKind, PatternMatcher, SubjectGraph,
};

const BUF: CellId = CellId(0);
const INV: CellId = CellId(1);
const AND2: CellId = CellId(2);
const XOR2: CellId = CellId(3);
const DFF: CellId = CellId(4);

#[derive(Debug)]
struct MockCell {
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
struct And2Pattern;
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
struct Xor2Pattern;
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

struct MockLibrary {
    cells: Vec<MockCell>,
    patterns: Vec<Box<dyn PatternGraph>>,
}

impl MockLibrary {
    fn new() -> Self {
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

/// Matches every k-feasible cut of `node` against every pattern in
/// `library`, keeping the lowest-cost match for each polarity. A
/// polarity with no direct pattern match falls back to the opposite
/// polarity plus an inverter, per [`MapRecord::set_inv_match`].
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

/// Records the fallback BUF/INV realization every primary input needs:
/// the positive polarity is free (wired straight through by the map
/// generator), the negative polarity needs an inverter.
fn map_primary_input(node: NodeId, record: &mut MapRecord) {
    record.set_logic_match(node, false, Cut::single_leaf(node, false), BUF);
    record.set_inv_match(node, true, INV);
}

fn run_pipeline(graph: &SubjectGraph, library: &MockLibrary, label: &str) {
    let cost_policy = AreaCostPolicy;
    let mut record = MapRecord::init(graph);
    record.set_const0(BUF);
    record.set_const1(BUF);

    for &input in graph.inputs() {
        map_primary_input(input, &mut record);
    }

    let mut enumerator = CutEnumerator::new(graph, 6).expect("k=6 is in range");
    let mut total_cuts = 0usize;
    let logic_nodes: Vec<(NodeId, NodeKind)> = graph.logic_list().collect();
    for (node, kind) in logic_nodes {
        if !matches!(kind, NodeKind::And | NodeKind::Xor) {
            continue;
        }
        let cuts: Vec<Cut> = enumerator.cuts_for(node).cloned().collect();
        total_cuts += cuts.len();
        map_logic_node(graph, node, &cuts, library, &cost_policy, &mut record);
    }

    for (i, _dff) in graph.dffs().iter().enumerate() {
        record.set_dff_match(DffId(i as u32), false, DFF);
    }

    match MapGenerator::generate(graph, &record) {
        Ok(netlist) => {
            println!(
                "{label}: {total_cuts} cuts enumerated, {} combinational instances, {} dff(s), {} port(s)",
                netlist.instances.len(),
                netlist.dffs.len(),
                netlist.ports.len(),
            );
        }
        Err(err) => println!("{label}: map generation failed: {err}"),
    }
}

fn empty_network() -> SubjectGraph {
    SubjectGraph::new()
}

fn buffer_network() -> SubjectGraph {
    let mut g = SubjectGraph::new();
    let a = g.new_input();
    let y = g.new_output(a);
    g.add_port_bit("a", a.node().unwrap());
    g.add_port_bit("y", y);
    g
}

fn inverter_network() -> SubjectGraph {
    let mut g = SubjectGraph::new();
    let a = g.new_input();
    let y = g.new_output(!a);
    g.add_port_bit("a", a.node().unwrap());
    g.add_port_bit("y", y);
    g
}

fn and2_network() -> SubjectGraph {
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

fn full_adder_sum_network() -> SubjectGraph {
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

fn registered_output_network() -> SubjectGraph {
    let mut g = SubjectGraph::new();
    let d = g.new_input();
    let clk = g.new_input();
    let (q, _dff_id) = g.new_dff(d, clk, None, None);
    g.add_port_bit("d", d.node().unwrap());
    g.add_port_bit("clk", clk.node().unwrap());
    g.add_port_bit("q", q);
    g
}

fn main() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let library = MockLibrary::new();
    run_pipeline(&empty_network(), &library, "empty");
    run_pipeline(&buffer_network(), &library, "buffer");
    run_pipeline(&inverter_network(), &library, "inverter");
    run_pipeline(&and2_network(), &library, "and2");
    run_pipeline(&full_adder_sum_network(), &library, "full_adder_sum");
    run_pipeline(&registered_output_network(), &library, "registered_output");
}
