use nalgebra::Complex;
use nalgebra_sparse::{CooMatrix, CscMatrix};

pub(crate) trait Cast<T> {
    type Mat;

    /// Returns the matrix with its values widened to `T`.
    fn cast(&self) -> Self::Mat;
}

impl Cast<Complex<f64>> for CscMatrix<f64> {
    type Mat = CscMatrix<Complex<f64>>;

    fn cast(&self) -> Self::Mat {
        // Triplets come from a valid matrix of the same shape, so every push is in bounds.
        let mut coo = CooMatrix::new(self.nrows(), self.ncols());
        for (r, c, v) in self.triplet_iter() {
            coo.push(r, c, Complex::new(*v, 0.0));
        }
        CscMatrix::from(&coo)
    }
}
