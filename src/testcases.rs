//! Reference networks in the matrix layout accepted by [`loadflow`](crate::prelude::loadflow).

use nalgebra::DMatrix;

/// WSCC 3-machine, 9-bus system on a 100 MVA base.
///
/// Returns `(bus, line)`. Bus 0 is the swing bus, buses 1 and 2 are generators.
pub fn wscc9() -> (DMatrix<f64>, DMatrix<f64>) {
    #[rustfmt::skip]
    let bus = DMatrix::from_row_slice(9, 10, &[
        0.0, 1.04,    0.0, 0.0,  0.0, 0.0,  0.0,  0.0, 0.0, 1.0,
        1.0, 1.02533, 0.0, 1.63, 0.0, 0.0,  0.0,  0.0, 0.0, 2.0,
        2.0, 1.02536, 0.0, 0.85, 0.0, 0.0,  0.0,  0.0, 0.0, 2.0,
        3.0, 1.0,     0.0, 0.0,  0.0, 0.0,  0.0,  0.0, 0.0, 3.0,
        4.0, 1.0,     0.0, 0.0,  0.0, 0.90, 0.30, 0.0, 0.0, 3.0,
        5.0, 1.0,     0.0, 0.0,  0.0, 0.0,  0.0,  0.0, 0.0, 3.0,
        6.0, 1.0,     0.0, 0.0,  0.0, 1.00, 0.35, 0.0, 0.0, 3.0,
        7.0, 1.0,     0.0, 0.0,  0.0, 0.0,  0.0,  0.0, 0.0, 3.0,
        8.0, 1.0,     0.0, 0.0,  0.0, 1.25, 0.50, 0.0, 0.0, 3.0,
    ]);
    #[rustfmt::skip]
    let line = DMatrix::from_row_slice(9, 7, &[
        0.0, 3.0, 0.0,    0.0576, 0.0,   1.0, 0.0,
        3.0, 4.0, 0.017,  0.092,  0.158, 1.0, 0.0,
        4.0, 5.0, 0.039,  0.17,   0.358, 1.0, 0.0,
        2.0, 5.0, 0.0,    0.0586, 0.0,   1.0, 0.0,
        5.0, 6.0, 0.0119, 0.1008, 0.209, 1.0, 0.0,
        6.0, 7.0, 0.0085, 0.072,  0.149, 1.0, 0.0,
        7.0, 1.0, 0.0,    0.0625, 0.0,   1.0, 0.0,
        7.0, 8.0, 0.032,  0.161,  0.306, 1.0, 0.0,
        8.0, 3.0, 0.01,   0.085,  0.176, 1.0, 0.0,
    ]);
    (bus, line)
}
