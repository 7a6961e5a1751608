use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CscMatrix;

use super::Solve;
use crate::basic::error::{SolverError, SolverResult};

/// Dense LU fallback. Fine for the small islands an interactive session builds.
#[derive(Default)]
pub struct DenseLuSolver;

impl Solve for DenseLuSolver {
    fn solve(&mut self, a: &CscMatrix<f64>, b: &mut [f64]) -> SolverResult<()> {
        let n = a.nrows();
        if a.ncols() != n || b.len() != n {
            return Err(SolverError::Shape {
                what: format!("{}x{} system with rhs of {}", n, a.ncols(), b.len()),
            });
        }
        if n == 0 {
            return Ok(());
        }

        let dense = DMatrix::from(a);
        let rhs = DVector::from_column_slice(b);
        let x = dense.lu().solve(&rhs).ok_or_else(|| SolverError::Singular {
            what: "dense LU found a zero pivot".into(),
        })?;
        if x.iter().any(|v| !v.is_finite()) {
            return Err(SolverError::Singular {
                what: "dense LU produced non-finite values".into(),
            });
        }
        b.copy_from_slice(x.as_slice());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use nalgebra_sparse::CooMatrix;

    use super::*;

    #[test]
    fn solves_and_detects_singular() {
        let mut coo = CooMatrix::new(2, 2);
        coo.push(0, 0, 2.0);
        coo.push(1, 1, 4.0);
        let a = CscMatrix::from(&coo);
        let mut b = vec![2.0, 2.0];
        DenseLuSolver.solve(&a, &mut b).unwrap();
        assert_eq!(b, vec![1.0, 0.5]);

        let mut coo = CooMatrix::new(2, 2);
        coo.push(0, 0, 1.0);
        coo.push(0, 1, 1.0);
        let singular = CscMatrix::from(&coo);
        let mut b = vec![1.0, 1.0];
        assert!(matches!(
            DenseLuSolver.solve(&singular, &mut b),
            Err(SolverError::Singular { .. })
        ));
    }
}
