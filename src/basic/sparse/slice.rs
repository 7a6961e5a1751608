use nalgebra::{DVector, Scalar};
use nalgebra_sparse::{CooMatrix, CscMatrix};
use num_traits::{One, Zero};

/// Builds the 0/1 matrix that picks `picked` entries out of a vector of length `n`.
///
/// Row `k` has a single one in column `picked[k]`, so `S * x` is the reduced
/// vector and `S^T * y` scatters a reduced vector back with zeros elsewhere.
pub(crate) fn selection_matrix(picked: &[usize], n: usize) -> CscMatrix<f64> {
    let mut coo = CooMatrix::new(picked.len(), n);
    coo.reserve(picked.len());
    for (row, &col) in picked.iter().enumerate() {
        coo.push(row, col, 1.0);
    }
    CscMatrix::from(&coo)
}

/// Sparse diagonal matrix with `d` on the diagonal.
#[inline(always)]
pub(crate) fn diag<T: Scalar + One + Copy>(d: &DVector<T>) -> CscMatrix<T> {
    let mut m = CscMatrix::identity(d.len());
    m.values_mut().copy_from_slice(d.as_slice());
    m
}

/// Dense product `S * x` for a selection matrix, without going through a sparse-dense kernel.
pub(crate) fn reduce<T: Scalar + Zero + Copy>(sel: &CscMatrix<f64>, x: &DVector<T>) -> DVector<T> {
    let mut out = DVector::from_element(sel.nrows(), T::zero());
    for (row, col, _) in sel.triplet_iter() {
        out[row] = x[col];
    }
    out
}

/// Dense product `S^T * y` for a selection matrix.
pub(crate) fn expand<T: Scalar + Zero + Copy>(sel: &CscMatrix<f64>, y: &[T]) -> DVector<T> {
    let mut out = DVector::from_element(sel.ncols(), T::zero());
    for (row, col, _) in sel.triplet_iter() {
        out[col] = y[row];
    }
    out
}
