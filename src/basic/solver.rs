use nalgebra_sparse::CscMatrix;

use super::error::SolverResult;

mod dense;
pub use dense::*;

#[cfg(feature = "rsparse")]
mod rsparse;
#[cfg(feature = "rsparse")]
pub use rsparse::*;

#[cfg(feature = "rsparse")]
pub type DefaultSolver = RSparseSolver;

#[cfg(not(feature = "rsparse"))]
pub type DefaultSolver = DenseLuSolver;

/// A trait for solving the square sparse linear systems formed by the Newton-Raphson step.
pub trait Solve {
    /// Solves `a * x = b`, overwriting `b` with `x`.
    ///
    /// Fails with [`SolverError::Singular`](super::error::SolverError::Singular)
    /// when the factorisation breaks down or yields non-finite values.
    fn solve(&mut self, a: &CscMatrix<f64>, b: &mut [f64]) -> SolverResult<()>;

    /// Drops any cached symbolic analysis. Called whenever the matrix pattern may change.
    fn reset(&mut self) {}
}
