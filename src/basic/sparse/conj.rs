use nalgebra::Complex;
use nalgebra_sparse::{CooMatrix, CscMatrix};

/// Trait for computing the conjugate of a matrix.
pub(crate) trait Conjugate {
    type Mat;

    /// Returns the conjugate of the matrix.
    fn conjugate(&self) -> Self::Mat;

    /// Computes the conjugate of the matrix in-place.
    fn conjugate_mut(&mut self);
}

impl Conjugate for CscMatrix<Complex<f64>> {
    type Mat = CscMatrix<Complex<f64>>;

    fn conjugate(&self) -> Self::Mat {
        let mut out = self.clone();
        out.conjugate_mut();
        out
    }

    fn conjugate_mut(&mut self) {
        self.values_mut().iter_mut().for_each(|v| *v = v.conj());
    }
}

/// Trait for extracting the real and imaginary parts of a matrix.
///
/// Both parts keep the sparsity pattern of the source, explicit zeros included,
/// so a Jacobian assembled from them has the same structure on every iteration.
pub(crate) trait RealImage {
    type Mat;

    /// Returns the real and imaginary parts of the matrix.
    fn real_imag(&self) -> (Self::Mat, Self::Mat);
}

impl RealImage for CscMatrix<Complex<f64>> {
    type Mat = CscMatrix<f64>;

    fn real_imag(&self) -> (Self::Mat, Self::Mat) {
        let mut re = CooMatrix::new(self.nrows(), self.ncols());
        let mut im = CooMatrix::new(self.nrows(), self.ncols());
        re.reserve(self.nnz());
        im.reserve(self.nnz());
        for (r, c, v) in self.triplet_iter() {
            re.push(r, c, v.re);
            im.push(r, c, v.im);
        }
        (CscMatrix::from(&re), CscMatrix::from(&im))
    }
}
