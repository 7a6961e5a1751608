use nalgebra::Scalar;
use nalgebra_sparse::CscMatrix;

use crate::basic::error::{SolverError, SolverResult};

/// Concatenates CSC matrices side by side. All inputs must share a row count.
pub fn csc_hstack<T: Scalar>(matrices: &[&CscMatrix<T>]) -> SolverResult<CscMatrix<T>> {
    let Some(first) = matrices.first() else {
        return Ok(CscMatrix::zeros(0, 0));
    };
    let nrows = first.nrows();
    let ncols: usize = matrices.iter().map(|m| m.ncols()).sum();
    let nnz: usize = matrices.iter().map(|m| m.nnz()).sum();

    let mut offsets = Vec::with_capacity(ncols + 1);
    let mut indices = Vec::with_capacity(nnz);
    let mut values = Vec::with_capacity(nnz);
    offsets.push(0);
    for mat in matrices {
        if mat.nrows() != nrows {
            return Err(SolverError::Shape {
                what: format!("hstack: {} rows vs {}", mat.nrows(), nrows),
            });
        }
        let base = indices.len();
        offsets.extend(mat.col_offsets()[1..].iter().map(|x| x + base));
        indices.extend_from_slice(mat.row_indices());
        values.extend_from_slice(mat.values());
    }

    CscMatrix::try_from_csc_data(nrows, ncols, offsets, indices, values).map_err(|e| {
        SolverError::Shape {
            what: format!("hstack: {e}"),
        }
    })
}

/// Concatenates CSC matrices top to bottom. All inputs must share a column count.
pub fn csc_vstack<T: Scalar>(matrices: &[&CscMatrix<T>]) -> SolverResult<CscMatrix<T>> {
    let Some(first) = matrices.first() else {
        return Ok(CscMatrix::zeros(0, 0));
    };
    let ncols = first.ncols();
    if let Some(bad) = matrices.iter().find(|m| m.ncols() != ncols) {
        return Err(SolverError::Shape {
            what: format!("vstack: {} cols vs {}", bad.ncols(), ncols),
        });
    }
    let nrows: usize = matrices.iter().map(|m| m.nrows()).sum();
    let nnz: usize = matrices.iter().map(|m| m.nnz()).sum();

    let mut offsets = Vec::with_capacity(ncols + 1);
    let mut indices = Vec::with_capacity(nnz);
    let mut values = Vec::with_capacity(nnz);
    offsets.push(0);
    for col in 0..ncols {
        let mut row_base = 0;
        for mat in matrices {
            let (start, end) = (mat.col_offsets()[col], mat.col_offsets()[col + 1]);
            indices.extend(mat.row_indices()[start..end].iter().map(|r| r + row_base));
            values.extend_from_slice(&mat.values()[start..end]);
            row_base += mat.nrows();
        }
        offsets.push(indices.len());
    }

    CscMatrix::try_from_csc_data(nrows, ncols, offsets, indices, values).map_err(|e| {
        SolverError::Shape {
            what: format!("vstack: {e}"),
        }
    })
}

#[cfg(test)]
mod tests {
    use nalgebra::DMatrix;
    use nalgebra_sparse::CooMatrix;

    use super::*;

    fn csc(nrows: usize, ncols: usize, entries: &[(usize, usize, f64)]) -> CscMatrix<f64> {
        let mut coo = CooMatrix::new(nrows, ncols);
        for &(r, c, v) in entries {
            coo.push(r, c, v);
        }
        CscMatrix::from(&coo)
    }

    #[test]
    fn test_csc_hstack() {
        let a = csc(3, 2, &[(2, 1, 3.0)]);
        let b = csc(3, 3, &[(0, 0, 2.0), (1, 2, 4.0)]);
        let c = csc_hstack(&[&a, &b]).unwrap();
        assert_eq!((c.nrows(), c.ncols()), (3, 5));
        let d = DMatrix::from(&c);
        assert_eq!(d[(2, 1)], 3.0);
        assert_eq!(d[(0, 2)], 2.0);
        assert_eq!(d[(1, 4)], 4.0);
        assert_eq!(d.sum(), 9.0);
    }

    #[test]
    fn test_csc_vstack() {
        let a = csc(2, 2, &[(0, 0, 1.0), (1, 1, 2.0)]);
        let b = csc(1, 2, &[(0, 0, 5.0)]);
        let c = csc_vstack(&[&a, &b]).unwrap();
        assert_eq!((c.nrows(), c.ncols()), (3, 2));
        let d = DMatrix::from(&c);
        assert_eq!(d[(0, 0)], 1.0);
        assert_eq!(d[(1, 1)], 2.0);
        assert_eq!(d[(2, 0)], 5.0);
    }

    #[test]
    fn stacking_empty_blocks() {
        let a = csc(2, 2, &[(0, 1, 1.0)]);
        let empty_cols = csc(2, 0, &[]);
        let empty_rows = csc(0, 2, &[]);
        let h = csc_hstack(&[&a, &empty_cols]).unwrap();
        assert_eq!((h.nrows(), h.ncols()), (2, 2));
        let v = csc_vstack(&[&a, &empty_rows]).unwrap();
        assert_eq!((v.nrows(), v.ncols()), (2, 2));
        assert_eq!(v.nnz(), 1);
    }

    #[test]
    fn mismatched_rows_are_rejected() {
        let a = csc(2, 1, &[]);
        let b = csc(3, 1, &[]);
        assert!(matches!(csc_hstack(&[&a, &b]), Err(SolverError::Shape { .. })));
    }
}
