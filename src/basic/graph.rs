//! Live bus/line topology: an element arena with typed connections, a swing-bus
//! registry, pending connections for not-yet-created names and the
//! connectivity search that yields the solver's netlist.

pub mod elements;
pub mod pending;
pub mod search;
pub mod swing;
pub mod topology;

pub use elements::{BusNode, Element, ElementId, LINE_CAPACITY, LineEdge, LineFlow};
pub use pending::PendingConnections;
pub use search::{Netlist, VisitedSet};
pub use swing::{SwingChange, SwingRegistry};
pub use topology::Topology;
