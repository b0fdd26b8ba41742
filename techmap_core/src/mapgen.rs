//! Map generation: back-tracing `MapRecord` matches into a mapped
//! netlist.
//!
//! Draining proceeds from an explicit work stack rather than recursion
//! — a cut's leaves are always strictly shallower nodes or PPIs (the
//! subject graph is acyclic and `MapRecord` only ever stores matches
//! rooted at already-processed nodes), so the stack depth is bounded
//! by the network's logic depth but never grows through actual
//! function-call recursion.

use ahash::AHashMap;
use techmap_common::{CellId, Handle, MapError, NodeId};

use crate::cut::Cut;
use crate::graph::{DffId, LatchId, NodeKind, SubjectGraph};
use crate::record::MapRecord;

/// Identifies one instantiated cell (or source wire) in a
/// [`MappedNetlist`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MappedCellId(u32);

/// One instantiated library cell, with its inputs wired to other
/// mapped cells in the cell's own pin order.
#[derive(Clone, Debug)]
pub struct MappedInstance {
    /// The instantiated cell.
    pub cell: CellId,
    /// This instance's inputs, in the cell's pin order.
    pub inputs: Vec<MappedCellId>,
}

/// One instantiated register (flip-flop or latch), separate from the
/// combinational [`MappedInstance`] list since its output feeds back
/// into the network as a source rather than being consumed downstream
/// like an ordinary cell.
#[derive(Clone, Debug)]
pub struct MappedRegister {
    /// The library cell realizing this register, as recorded by
    /// [`MapRecord::set_dff_match`]/[`MapRecord::set_latch_match`] for
    /// the register's natural (non-inverted) output polarity.
    pub cell: CellId,
    /// The mapped value driving the register's data input.
    pub data: MappedCellId,
    /// The control signal (clock for a DFF, enable for a latch).
    pub control: MappedCellId,
    /// Optional asynchronous clear.
    pub clear: Option<MappedCellId>,
    /// Optional asynchronous preset.
    pub preset: Option<MappedCellId>,
    /// The source id representing this register's output.
    pub output: MappedCellId,
}

/// A fully mapped netlist: instantiated cells, registers, and named
/// port bindings, all expressed in terms of [`MappedCellId`]s.
#[derive(Clone, Debug, Default)]
pub struct MappedNetlist {
    /// Combinational cell instances, in instantiation order (always
    /// after every one of their inputs).
    pub instances: Vec<MappedInstance>,
    /// Flip-flops.
    pub dffs: Vec<MappedRegister>,
    /// Latches.
    pub latches: Vec<MappedRegister>,
    /// Named port bindings, in declaration order; each bit maps to the
    /// mapped id realizing that bit's value.
    pub ports: Vec<(String, Vec<MappedCellId>)>,
}

/// Drives the back-trace request queue and accumulates a
/// [`MappedNetlist`].
pub struct MapGenerator {
    instances: Vec<MappedInstance>,
    dffs: Vec<MappedRegister>,
    latches: Vec<MappedRegister>,
    ports: Vec<(String, Vec<MappedCellId>)>,
    resolved: AHashMap<(NodeId, bool), MappedCellId>,
    const_cells: AHashMap<bool, MappedCellId>,
    next_id: u32,
}

enum Frame {
    Enter(NodeId, bool),
    Finish(NodeId, bool, CellId, Cut),
}

impl MapGenerator {
    fn new() -> Self {
        Self {
            instances: Vec::new(),
            dffs: Vec::new(),
            latches: Vec::new(),
            ports: Vec::new(),
            resolved: AHashMap::default(),
            const_cells: AHashMap::default(),
            next_id: 0,
        }
    }

    fn alloc_id(&mut self) -> MappedCellId {
        let id = MappedCellId(self.next_id);
        self.next_id += 1;
        id
    }

    fn resolve_const(&mut self, one: bool, record: &MapRecord) -> Result<MappedCellId, MapError> {
        if let Some(&id) = self.const_cells.get(&one) {
            return Ok(id);
        }
        let cell = if one {
            record.const1_cell().ok_or(MapError::MissingConstOneCell)?
        } else {
            record.const0_cell().ok_or(MapError::MissingConstZeroCell)?
        };
        let id = self.alloc_id();
        self.instances.push(MappedInstance {
            cell,
            inputs: Vec::new(),
        });
        self.const_cells.insert(one, id);
        Ok(id)
    }

    fn resolve_handle(
        &mut self,
        h: Handle,
        record: &MapRecord,
        graph: &SubjectGraph,
    ) -> Result<MappedCellId, MapError> {
        match h.node() {
            Some(n) => self.back_trace(n, h.inv(), record, graph),
            None => self.resolve_const(h.is_const1(), record),
        }
    }

    /// Resolves `(root, root_inv)` to a mapped id, instantiating every
    /// cell its match's cut transitively requires that is not already
    /// resolved.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::MissingMatch`] if `root` (or any node
    /// transitively required) has no recorded match for the polarity
    /// requested of it.
    pub fn back_trace(
        &mut self,
        root: NodeId,
        root_inv: bool,
        record: &MapRecord,
        graph: &SubjectGraph,
    ) -> Result<MappedCellId, MapError> {
        if let Some(&id) = self.resolved.get(&(root, root_inv)) {
            return Ok(id);
        }
        let mut stack = vec![Frame::Enter(root, root_inv)];
        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Enter(node, inv) => {
                    if self.resolved.contains_key(&(node, inv)) {
                        continue;
                    }
                    if matches!(graph.kind(node), NodeKind::Input) && !inv {
                        let id = self.alloc_id();
                        self.resolved.insert((node, false), id);
                        continue;
                    }
                    let cell = record
                        .get_node_cell(node, inv)
                        .ok_or(MapError::MissingMatch { node, inv })?;
                    let cut = record
                        .get_node_match(node, inv)
                        .ok_or(MapError::MissingMatch { node, inv })?
                        .clone();
                    let all_ready = cut
                        .leaves()
                        .iter()
                        .all(|l| self.leaf_ready(*l));
                    if all_ready {
                        let inputs = self.leaf_ids(&cut);
                        let id = self.alloc_id();
                        self.instances.push(MappedInstance { cell, inputs });
                        self.resolved.insert((node, inv), id);
                    } else {
                        stack.push(Frame::Finish(node, inv, cell, cut.clone()));
                        for leaf in cut.leaves() {
                            if !self.leaf_ready(*leaf) {
                                let ln = leaf.node().expect("cut leaves always reference a node");
                                stack.push(Frame::Enter(ln, leaf.inv()));
                            }
                        }
                    }
                }
                Frame::Finish(node, inv, cell, cut) => {
                    let inputs = self.leaf_ids(&cut);
                    let id = self.alloc_id();
                    self.instances.push(MappedInstance { cell, inputs });
                    self.resolved.insert((node, inv), id);
                }
            }
        }
        Ok(*self
            .resolved
            .get(&(root, root_inv))
            .expect("root is resolved once its work-stack frame drains"))
    }

    fn leaf_ready(&self, h: Handle) -> bool {
        match h.node() {
            Some(n) => self.resolved.contains_key(&(n, h.inv())),
            None => self.const_cells.contains_key(&h.is_const1()),
        }
    }

    fn leaf_ids(&self, cut: &Cut) -> Vec<MappedCellId> {
        cut.leaves()
            .iter()
            .map(|l| {
                *self
                    .resolved
                    .get(&(
                        l.node().expect("cut leaves always reference a node"),
                        l.inv(),
                    ))
                    .expect("leaf resolved before its parent is instantiated")
            })
            .collect()
    }

    /// Runs the full back-trace over `graph`'s primary outputs,
    /// DFF/latch data inputs and declared ports, producing the
    /// complete mapped netlist.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::MissingMatch`] (or the constant-cell
    /// variants) if any requested node has no recorded match.
    pub fn generate(graph: &SubjectGraph, record: &MapRecord) -> Result<MappedNetlist, MapError> {
        tracing::debug!(
            outputs = graph.outputs().len(),
            dffs = graph.dffs().len(),
            latches = graph.latches().len(),
            "starting map generation back-trace"
        );
        let start = std::time::Instant::now();
        let mut gen = Self::new();

        for output in graph.outputs() {
            let driver = graph.output_fanin(*output);
            gen.resolve_handle(driver, record, graph)?;
        }

        for (i, dff) in graph.dffs().iter().enumerate() {
            let dff_id = DffId(i as u32);
            let cell = record
                .get_dff_cell(dff_id, false)
                .ok_or(MapError::MissingDffMatch {
                    index: dff_id.0,
                    inv: false,
                })?;
            let data = gen.resolve_handle(dff.data, record, graph)?;
            let control = gen.resolve_handle(dff.clock, record, graph)?;
            let clear = dff
                .clear
                .map(|h| gen.resolve_handle(h, record, graph))
                .transpose()?;
            let preset = dff
                .preset
                .map(|h| gen.resolve_handle(h, record, graph))
                .transpose()?;
            let output = gen.back_trace(dff.output, false, record, graph)?;
            gen.dffs.push(MappedRegister {
                cell,
                data,
                control,
                clear,
                preset,
                output,
            });
        }

        for (i, latch) in graph.latches().iter().enumerate() {
            let latch_id = LatchId(i as u32);
            let cell = record
                .get_latch_cell(latch_id, false)
                .ok_or(MapError::MissingLatchMatch {
                    index: latch_id.0,
                    inv: false,
                })?;
            let data = gen.resolve_handle(latch.data, record, graph)?;
            let control = gen.resolve_handle(latch.enable, record, graph)?;
            let clear = latch
                .clear
                .map(|h| gen.resolve_handle(h, record, graph))
                .transpose()?;
            let preset = latch
                .preset
                .map(|h| gen.resolve_handle(h, record, graph))
                .transpose()?;
            let output = gen.back_trace(latch.output, false, record, graph)?;
            gen.latches.push(MappedRegister {
                cell,
                data,
                control,
                clear,
                preset,
                output,
            });
        }

        for port in graph.ports() {
            let mut bits = Vec::with_capacity(port.bits.len());
            for &node in &port.bits {
                let h = match graph.kind(node) {
                    NodeKind::Output => graph.output_fanin(node),
                    _ => Handle::from_node(node, false),
                };
                bits.push(gen.resolve_handle(h, record, graph)?);
            }
            gen.ports.push((port.name.clone(), bits));
        }

        tracing::debug!(
            instances = gen.instances.len(),
            elapsed = ?start.elapsed(),
            "map generation back-trace complete"
        );
        Ok(MappedNetlist {
            instances: gen.instances,
            dffs: gen.dffs,
            latches: gen.latches,
            ports: gen.ports,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cut::CutEnumerator;
    use crate::graph::SubjectGraph;
    use techmap_common::Handle;

    fn populate_buf_inv_matches(graph: &SubjectGraph, record: &mut MapRecord) {
        for node in graph.inputs() {
            record.set_logic_match(*node, false, Cut::single_leaf(*node, false), CellId(100));
            record.set_inv_match(*node, true, CellId(101));
        }
    }

    #[test]
    fn buffer_network_maps_end_to_end() {
        let mut g = SubjectGraph::new();
        let a = g.new_input();
        let out = g.new_output(a);
        g.add_port_bit("a", a.node().unwrap());
        g.add_port_bit("y", out);

        let mut record = MapRecord::init(&g);
        populate_buf_inv_matches(&g, &mut record);

        let netlist = MapGenerator::generate(&g, &record).expect("buffer network should map");
        assert_eq!(netlist.ports.len(), 2);
    }

    #[test]
    fn missing_match_is_reported_as_an_error() {
        let mut g = SubjectGraph::new();
        let a = g.new_input();
        let b = g.new_input();
        let and_ab = g.new_and(a, b);
        g.new_output(and_ab);

        let record = MapRecord::init(&g); // deliberately left empty
        let err = MapGenerator::generate(&g, &record).unwrap_err();
        assert!(matches!(err, MapError::MissingMatch { .. }));
    }

    #[test]
    fn and2_network_maps_with_a_single_and_instance() {
        let mut g = SubjectGraph::new();
        let a = g.new_input();
        let b = g.new_input();
        let and_ab = g.new_and(a, b);
        g.new_output(and_ab);

        let mut enumerator = CutEnumerator::new(&g, 6).unwrap();
        let and_node = and_ab.node().unwrap();
        let cut = enumerator
            .cuts_for(and_node)
            .max_by_key(Cut::leaf_count)
            .cloned()
            .unwrap();

        let mut record = MapRecord::init(&g);
        populate_buf_inv_matches(&g, &mut record);
        record.set_logic_match(and_node, false, cut, CellId(1));

        let netlist = MapGenerator::generate(&g, &record).expect("and2 should map");
        assert!(netlist
            .instances
            .iter()
            .any(|i| i.cell == CellId(1) && i.inputs.len() == 2));
    }

    #[test]
    fn registered_output_maps_one_dff_instance() {
        let mut g = SubjectGraph::new();
        let d = g.new_input();
        let clk = g.new_input();
        let (q_node, dff_id) = g.new_dff(d, clk, None, None);
        g.new_output(Handle::from_node(q_node, false));

        let mut record = MapRecord::init(&g);
        populate_buf_inv_matches(&g, &mut record);
        record.set_dff_match(dff_id, false, CellId(200));

        let netlist = MapGenerator::generate(&g, &record).expect("registered output should map");
        assert_eq!(netlist.dffs.len(), 1);
        assert_eq!(netlist.dffs[0].cell, CellId(200));
        assert!(netlist.instances.is_empty());
    }

    #[test]
    fn missing_dff_match_is_reported_as_an_error() {
        let mut g = SubjectGraph::new();
        let d = g.new_input();
        let clk = g.new_input();
        let (q_node, _dff_id) = g.new_dff(d, clk, None, None);
        g.new_output(Handle::from_node(q_node, false));

        let mut record = MapRecord::init(&g);
        populate_buf_inv_matches(&g, &mut record); // deliberately no DFF match

        let err = MapGenerator::generate(&g, &record).unwrap_err();
        assert!(matches!(err, MapError::MissingDffMatch { inv: false, .. }));
    }

    #[test]
    fn empty_network_maps_to_an_empty_netlist() {
        let g = SubjectGraph::new();
        let record = MapRecord::init(&g);
        let netlist = MapGenerator::generate(&g, &record).expect("empty network should map");
        assert!(netlist.instances.is_empty());
        assert!(netlist.dffs.is_empty());
        assert!(netlist.latches.is_empty());
        assert!(netlist.ports.is_empty());
    }
}
