use nalgebra_sparse::CscMatrix;
use rsparse::{
    self,
    data::{self, Symb},
    lsolve, lu, sqr, usolve,
};

use super::Solve;
use crate::basic::error::{SolverError, SolverResult};

/// Sparse LU backend on `rsparse`. The symbolic analysis is cached until [`Solve::reset`].
#[derive(Default)]
pub struct RSparseSolver {
    symbolic: Option<Symb>,
}

impl Solve for RSparseSolver {
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

        let sprs = data::Sprs {
            m: n,
            n,
            p: a.col_offsets().iter().map(|&v| v as isize).collect(),
            i: a.row_indices().to_vec(),
            x: a.values().to_vec(),
            nzmax: a.nnz(),
        };
        let symbolic = self.symbolic.get_or_insert_with(|| sqr(&sprs, 1, false));
        let numeric = lu(&sprs, symbolic, 1e-6).map_err(|_| SolverError::Singular {
            what: "LU factorization failed".into(),
        })?;

        let mut x = vec![0.0; n];
        ipvec(&numeric.pinv, b, &mut x); // x = P*b
        lsolve(&numeric.l, &mut x); // x = L\x
        usolve(&numeric.u, &mut x); // x = U\x
        ipvec(&symbolic.q, &x, b); // b = Q*x

        if b.iter().all(|v| v.is_finite()) {
            Ok(())
        } else {
            Err(SolverError::Singular {
                what: "LU solve produced non-finite values".into(),
            })
        }
    }

    fn reset(&mut self) {
        self.symbolic = None;
    }
}

fn ipvec(p: &Option<Vec<isize>>, b: &[f64], x: &mut [f64]) {
    match p {
        Some(perm) => {
            for (k, &bk) in b.iter().enumerate() {
                x[perm[k] as usize] = bk;
            }
        }
        None => x.copy_from_slice(b),
    }
}
