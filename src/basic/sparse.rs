//! Small helpers on top of `nalgebra_sparse` used by the load-flow solver.

pub(crate) mod cast;
pub(crate) mod conj;
pub(crate) mod slice;
pub(crate) mod stack;
