pub(crate) mod dsbus_dv;
pub(crate) mod newtonpf;
pub(crate) mod report;

pub mod bridge;
pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod solver;
pub(crate) mod sparse;
pub mod system;

pub use newtonpf::{LoadFlowSolution, loadflow};
