//! Numeric representation of a network: matrix layouts and the admittance matrix.

pub mod admittance;
pub mod matrices;

pub use matrices::{BusKind, bus_col, flow_col, line_col};
