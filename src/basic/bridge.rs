use std::collections::HashMap;

use nalgebra::DMatrix;
use tracing::{debug, warn};

use super::{
    config::PowerFlowConfig,
    error::{BridgeError, GraphError},
    graph::{ElementId, LineFlow, Netlist, Topology},
    newtonpf::{LoadFlowSolution, loadflow},
    solver::{DefaultSolver, Solve},
    system::{bus_col, flow_col, line_col},
};

/// Marshals the energized part of a [`Topology`] into solver matrices and
/// writes the solution back onto the elements.
pub struct SolverBridge<S: Solve = DefaultSolver> {
    solver: S,
    config: PowerFlowConfig,
    /// Outcome of the previous solve; warnings fire only when it flips to diverged.
    converged: bool,
}

impl Default for SolverBridge<DefaultSolver> {
    fn default() -> Self {
        Self::new(PowerFlowConfig::default())
    }
}

impl SolverBridge<DefaultSolver> {
    pub fn new(config: PowerFlowConfig) -> Self {
        Self::with_solver(config, DefaultSolver::default())
    }
}

/// Matrices for one solve plus the element behind every row.
struct Snapshot {
    bus: DMatrix<f64>,
    line: DMatrix<f64>,
    bus_ids: Vec<ElementId>,
    line_ids: Vec<ElementId>,
}

impl<S: Solve> SolverBridge<S> {
    pub fn with_solver(config: PowerFlowConfig, solver: S) -> Self {
        Self {
            solver,
            config,
            converged: true,
        }
    }

    pub fn config(&self) -> &PowerFlowConfig {
        &self.config
    }

    /// Whether the most recent successful solve met the tolerance.
    pub fn converged(&self) -> bool {
        self.converged
    }

    /// Runs one load flow over the island reachable from the swing bus.
    ///
    /// Buses are numbered densely in visitation order, afresh on every call.
    /// On success, solved bus quantities and sending-end line flows are
    /// written back and the netlist is returned. On failure nothing is modified.
    pub fn solve(&mut self, topology: &mut Topology) -> Result<Netlist, BridgeError> {
        let netlist = topology.connectivity_search()?;
        let snapshot = snapshot(topology, &netlist)?;
        let solution = loadflow(&snapshot.bus, &snapshot.line, &self.config, &mut self.solver)?;
        if solution.converged {
            debug!(
                iterations = solution.iterations,
                buses = snapshot.bus_ids.len(),
                lines = snapshot.line_ids.len(),
                "load flow converged"
            );
        } else if self.converged {
            warn!(
                iterations = solution.iterations,
                mismatch = solution.mismatch,
                "load flow did not converge, keeping best available state"
            );
        } else {
            debug!(
                iterations = solution.iterations,
                mismatch = solution.mismatch,
                "load flow still not converging"
            );
        }
        self.converged = solution.converged;
        write_back(topology, &snapshot, &solution);
        Ok(netlist)
    }
}

fn snapshot(topology: &Topology, netlist: &Netlist) -> Result<Snapshot, GraphError> {
    let mut bus = DMatrix::zeros(netlist.buses.len(), bus_col::COUNT);
    let mut index = HashMap::with_capacity(netlist.buses.len());
    for (row, &id) in netlist.buses.iter().enumerate() {
        let b = topology.bus(id).ok_or(GraphError::UnknownElement(id.index()))?;
        index.insert(id, row);
        bus[(row, bus_col::INDEX)] = row as f64;
        bus[(row, bus_col::VOLTAGE)] = b.voltage;
        bus[(row, bus_col::ANGLE)] = b.angle;
        bus[(row, bus_col::PGEN)] = b.pgen;
        bus[(row, bus_col::QGEN)] = b.qgen;
        bus[(row, bus_col::PLOAD)] = b.pload;
        bus[(row, bus_col::QLOAD)] = b.qload;
        bus[(row, bus_col::CONDUCTANCE)] = b.conductance;
        bus[(row, bus_col::SUSCEPTANCE)] = b.susceptance;
        bus[(row, bus_col::BUSTYPE)] = b.kind().code();
    }

    let mut line = DMatrix::zeros(netlist.lines.len(), line_col::COUNT);
    for (row, &id) in netlist.lines.iter().enumerate() {
        let l = topology.line(id).ok_or(GraphError::UnknownElement(id.index()))?;
        let terminal = |k: usize| -> Result<f64, GraphError> {
            let bus = *l.links().get(k).ok_or(GraphError::UnknownElement(id.index()))?;
            index
                .get(&bus)
                .map(|&i| i as f64)
                .ok_or(GraphError::UnknownElement(bus.index()))
        };
        line[(row, line_col::FROM)] = terminal(0)?;
        line[(row, line_col::TO)] = terminal(1)?;
        line[(row, line_col::RESISTANCE)] = l.resistance;
        line[(row, line_col::REACTANCE)] = l.reactance;
        line[(row, line_col::CHARGING)] = l.charging;
        line[(row, line_col::TAP)] = l.tap;
        line[(row, line_col::PHASE)] = l.phase;
    }

    Ok(Snapshot {
        bus,
        line,
        bus_ids: netlist.buses.clone(),
        line_ids: netlist.lines.clone(),
    })
}

fn write_back(topology: &mut Topology, snapshot: &Snapshot, solution: &LoadFlowSolution) {
    for (row, &id) in snapshot.bus_ids.iter().enumerate() {
        if let Some(b) = topology.bus_mut(id) {
            b.voltage = solution.bus[(row, bus_col::VOLTAGE)];
            b.angle = solution.bus[(row, bus_col::ANGLE)];
            b.pgen = solution.bus[(row, bus_col::PGEN)];
            b.qgen = solution.bus[(row, bus_col::QGEN)];
            b.pload = solution.bus[(row, bus_col::PLOAD)];
            b.qload = solution.bus[(row, bus_col::QLOAD)];
        }
    }

    let name_of = |row: f64| -> String {
        snapshot
            .bus_ids
            .get(row as usize)
            .and_then(|id| topology.get(*id))
            .map(|e| e.name().to_owned())
            .unwrap_or_default()
    };
    // Sending-end rows only: row 2k belongs to line k.
    let flows: Vec<(ElementId, LineFlow)> = solution
        .line_flow
        .row_iter()
        .step_by(2)
        .filter_map(|r| {
            let id = *snapshot.line_ids.get(r[flow_col::LINE] as usize)?;
            Some((
                id,
                LineFlow {
                    p: r[flow_col::P],
                    q: r[flow_col::Q],
                    from: name_of(r[flow_col::FROM]),
                    to: name_of(r[flow_col::TO]),
                },
            ))
        })
        .collect();
    for (id, flow) in flows {
        if let Some(l) = topology.line_mut(id) {
            l.flow = Some(flow);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic::{
        error::SolverError,
        graph::{BusNode, LineEdge},
        system::BusKind,
    };

    /// swing a -- l1 -- gen b -- l2 -- load c
    fn radial() -> (Topology, [ElementId; 5]) {
        let mut t = Topology::default();
        let a = t.insert_bus(BusNode::new("a", BusKind::Swing)).unwrap();
        let mut gen_bus = BusNode::new("b", BusKind::Generator);
        gen_bus.pgen = 1.0;
        let b = t.insert_bus(gen_bus).unwrap();
        let mut load = BusNode::new("c", BusKind::Load);
        load.pload = 1.0;
        let c = t.insert_bus(load).unwrap();
        let mut line = |name: &str, ends: &[ElementId]| {
            let mut l = LineEdge::new(name);
            l.resistance = 1e-6;
            l.reactance = 1e-5;
            l.charging = 0.0;
            let id = t.insert_line(l).unwrap();
            t.connect(id, ends).unwrap();
            id
        };
        let l1 = line("l1", &[a, b]);
        let l2 = line("l2", &[b, c]);
        (t, [a, b, c, l1, l2])
    }

    fn tight() -> PowerFlowConfig {
        PowerFlowConfig {
            tolerance: 1e-6,
            ..Default::default()
        }
    }

    #[test]
    fn radial_flows_written_back() {
        let (mut t, [a, b, c, l1, l2]) = radial();
        let netlist = SolverBridge::new(tight()).solve(&mut t).unwrap();
        assert_eq!(netlist.order, vec![a, l1, b, l2, c]);

        let f1 = t.line(l1).unwrap().flow.clone().unwrap();
        let f2 = t.line(l2).unwrap().flow.clone().unwrap();
        assert!(f1.p.abs() < 0.005);
        assert!((f2.p - 1.0).abs() < 0.005);
        assert_eq!((f2.from.as_str(), f2.to.as_str()), ("b", "c"));
        for id in [a, b, c] {
            let bus = t.bus(id).unwrap();
            assert!((bus.voltage - 1.0).abs() < 0.005);
            assert!(bus.angle.abs() < 0.005);
        }
        assert!((t.bus(c).unwrap().pload - 1.0).abs() < 0.005);
    }

    #[test]
    fn parallel_lines_get_their_own_flow() {
        let (mut t, [a, b, _, l1, _]) = radial();
        let mut weak = LineEdge::new("weak");
        weak.resistance = 1e-5;
        weak.reactance = 1e-4;
        weak.charging = 0.0;
        let weak = t.insert_line(weak).unwrap();
        t.connect(weak, &[a, b]).unwrap();
        // Make the swing supply the load through both parallel lines.
        t.bus_mut(b).unwrap().pgen = 0.0;

        SolverBridge::new(tight()).solve(&mut t).unwrap();
        let strong = t.line(l1).unwrap().flow.clone().unwrap();
        let weak = t.line(weak).unwrap().flow.clone().unwrap();
        assert!((strong.p + weak.p - 1.0).abs() < 0.01);
        // Ten times the impedance carries about a tenth of the strong line's share.
        assert!((strong.p / weak.p - 10.0).abs() < 0.5);
    }

    #[test]
    fn failure_leaves_state_untouched() {
        let (mut t, [a, b, c, l1, _]) = radial();
        let line = t.line_mut(l1).unwrap();
        line.resistance = 0.0;
        line.reactance = 0.0;
        let before = t.clone();
        let err = SolverBridge::new(tight()).solve(&mut t).unwrap_err();
        assert_eq!(err, BridgeError::NoSolution(SolverError::ZeroImpedance { line: 0 }));
        for id in [a, b, c] {
            assert_eq!(t.bus(id), before.bus(id));
        }
        assert!(t.line(l1).unwrap().flow.is_none());
    }

    #[test]
    fn convergence_state_tracks_each_solve() {
        let (mut t, ..) = radial();
        let mut bridge = SolverBridge::new(PowerFlowConfig {
            tolerance: 1e-14,
            max_it: 1,
            ..Default::default()
        });
        assert!(bridge.converged());
        bridge.solve(&mut t).unwrap();
        assert!(!bridge.converged());
        // A second diverged cycle still writes back and reports the same state.
        bridge.solve(&mut t).unwrap();
        assert!(!bridge.converged());

        let mut relaxed = SolverBridge::new(tight());
        relaxed.solve(&mut t).unwrap();
        assert!(relaxed.converged());
    }

    #[test]
    fn no_swing_is_a_topology_error() {
        let (mut t, [a, ..]) = radial();
        t.set_bus_kind(a, BusKind::Load).unwrap();
        assert_eq!(
            SolverBridge::default().solve(&mut t),
            Err(BridgeError::Topology(GraphError::NoSwingBus))
        );
    }

    #[test]
    fn half_built_line_is_ignored() {
        let (mut t, [_, _, c, ..]) = radial();
        let stub = t.insert_line(LineEdge::new("stub")).unwrap();
        t.connect(stub, &[c]).unwrap();
        let netlist = SolverBridge::new(tight()).solve(&mut t).unwrap();
        assert!(!netlist.contains(stub));
        assert!(t.line(stub).unwrap().flow.is_none());
    }
}
