//! Error types for each layer of the engine.

use thiserror::Error;

/// Invalid construction or use of the element graph.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("invalid bus type code {0}, expected 1 (swing), 2 (generator) or 3 (load)")]
    InvalidBusType(f64),

    #[error("connecting {requested} more element(s) to `{name}` exceeds its capacity of {capacity}")]
    CapacityExceeded {
        name: String,
        capacity: usize,
        requested: usize,
    },

    #[error("cannot connect `{from}` to `{to}`: only bus-line connections are allowed")]
    IncompatibleConnection { from: String, to: String },

    #[error("no element with id {0}")]
    UnknownElement(usize),

    #[error("`{0}` is not a bus")]
    NotABus(String),

    #[error("an element named `{0}` already exists")]
    DuplicateName(String),

    #[error("no swing bus registered")]
    NoSwingBus,
}

/// Structural failure inside the load-flow solver.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    #[error("malformed input: {what}")]
    Shape { what: String },

    #[error("bus {bus} has unknown type code {code}")]
    InvalidBusType { bus: usize, code: f64 },

    #[error("no swing bus in bus data")]
    NoSwingBus,

    #[error("{count} swing buses in bus data, expected exactly one")]
    MultipleSwingBuses { count: usize },

    #[error("line {line} has zero series impedance")]
    ZeroImpedance { line: usize },

    #[error("jacobian is singular: {what}")]
    Singular { what: String },

    #[error("non-finite value in {what}")]
    NonFinite { what: &'static str },
}

/// Outcome of a failed bridge cycle. Element state is untouched in both cases.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BridgeError {
    #[error("no solution: {0}")]
    NoSolution(#[from] SolverError),

    #[error("topology error: {0}")]
    Topology(#[from] GraphError),
}

/// Errors surfaced by the engine's producer API.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("cannot have negative generation or load on bus `{name}`")]
    NegativePower { name: String },

    #[error("engine is {state:?}, cannot {action}")]
    InvalidState {
        state: crate::basic::engine::EngineState,
        action: &'static str,
    },

    #[error("failed to spawn engine thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

pub type GraphResult<T> = Result<T, GraphError>;
pub type SolverResult<T> = Result<T, SolverError>;
