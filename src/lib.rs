//! Live AC load flow over a mutable bus/line network.
//!
//! A [`PowerSystem`](prelude::PowerSystem) owns a worker thread that applies
//! queued commands to a [`Topology`](prelude::Topology) and re-solves the
//! energized island with Newton-Raphson every cycle. The solver is also
//! usable on its own through [`loadflow`](prelude::loadflow).

mod basic;
pub mod testcases;

pub mod prelude {
    use crate::basic;
    pub use basic::*;

    pub use bridge::SolverBridge;
    pub use command::{AttrValue, BusSpec, Command, CommandContext};
    pub use config::{EngineConfig, JacobianUpdate, PowerFlowConfig, TopologyConfig};
    pub use engine::{EngineState, PowerSystem, SolutionCallback, SolutionRecord};
    pub use error::{BridgeError, EngineError, GraphError, SolverError};
    pub use graph::{
        BusNode, Element, ElementId, LineEdge, LineFlow, Netlist, PendingConnections,
        SwingChange, SwingRegistry, Topology, VisitedSet,
    };
    pub use solver::{DefaultSolver, DenseLuSolver, Solve};
    pub use system::{BusKind, bus_col, flow_col, line_col};
}
