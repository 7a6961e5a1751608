use std::collections::HashMap;
use std::f64::consts::PI;

use derive_more::{Deref, From};
use nalgebra::{DMatrix, Vector2};
use nalgebra_sparse::{CooMatrix, CscMatrix};
use num_complex::Complex64;

use super::matrices::line_col;
use crate::basic::error::{SolverError, SolverResult};

/// Represents an admittance value in a power system.
///
/// `Admittance` is a wrapper around a complex number representing the series admittance of a branch.
#[derive(Clone, Copy, Default, PartialEq, Debug, Deref, From)]
pub struct Admittance(pub Complex64);

/// Represents a port with two bus positions, `[from, to]`.
#[derive(Default, Debug, Clone, Copy, PartialEq, Deref)]
pub struct Port2(pub Vector2<usize>);

/// Electrical model of one branch in internal bus positions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BranchModel {
    pub port: Port2,
    /// Series admittance `1 / (r + jx)`.
    pub y: Admittance,
    /// Total line charging susceptance; half is placed at each end.
    pub charging: f64,
    /// Complex tap `t * e^{j phi}`.
    pub tps: Complex64,
}

impl BranchModel {
    /// Shunt term at each terminal, `y + j b/2`.
    #[inline]
    pub fn terminal(&self) -> Complex64 {
        self.y.0 + Complex64::new(0.0, self.charging / 2.0)
    }

    /// `|t|^2`.
    #[inline]
    pub fn tap_norm_sqr(&self) -> f64 {
        (self.tps * self.tps.conj()).re
    }
}

/// Reads every row of the line matrix into a [`BranchModel`], mapping bus numbers to positions.
pub fn branch_models(
    line: &DMatrix<f64>,
    positions: &HashMap<i64, usize>,
) -> SolverResult<Vec<BranchModel>> {
    let position = |row: usize, col: usize| -> SolverResult<usize> {
        let number = line[(row, col)];
        positions
            .get(&(number as i64))
            .copied()
            .filter(|_| number.fract() == 0.0)
            .ok_or_else(|| SolverError::Shape {
                what: format!("line {row} refers to unknown bus {number}"),
            })
    };

    (0..line.nrows())
        .map(|row| {
            let from = position(row, line_col::FROM)?;
            let to = position(row, line_col::TO)?;
            let z = Complex64::new(line[(row, line_col::RESISTANCE)], line[(row, line_col::REACTANCE)]);
            if z.norm_sqr() == 0.0 {
                return Err(SolverError::ZeroImpedance { line: row });
            }
            let tap = match line[(row, line_col::TAP)] {
                t if t == 0.0 => 1.0,
                t => t,
            };
            let phase = line[(row, line_col::PHASE)] * PI / 180.0;
            let model = BranchModel {
                port: Port2(Vector2::new(from, to)),
                y: Admittance(z.inv()),
                charging: line[(row, line_col::CHARGING)],
                tps: Complex64::from_polar(tap, phase),
            };
            if !model.y.0.is_finite() || !model.tps.is_finite() || !model.charging.is_finite() {
                return Err(SolverError::NonFinite { what: "line data" });
            }
            Ok(model)
        })
        .collect()
}

/// Creates the nodal admittance matrix.
///
/// Each branch adds `(y + jb/2) / |t|^2` at the from-terminal, `y + jb/2` at the
/// to-terminal, `-y / conj(t)` at `(from, to)` and `-y / t` at `(to, from)`.
/// Each bus adds its own `g + jb` shunt on the diagonal.
pub fn create_y_bus(n_bus: usize, branches: &[BranchModel], shunts: &[Complex64]) -> CscMatrix<Complex64> {
    let mut coo = CooMatrix::new(n_bus, n_bus);
    coo.reserve(branches.len() * 4 + n_bus);
    for br in branches {
        let (f, t) = (br.port[0], br.port[1]);
        let y = br.y.0;
        coo.push(f, t, -y / br.tps.conj());
        coo.push(t, f, -y / br.tps);
        coo.push(f, f, br.terminal() / br.tap_norm_sqr());
        coo.push(t, t, br.terminal());
    }
    for (i, s) in shunts.iter().enumerate() {
        coo.push(i, i, *s);
    }
    CscMatrix::from(&coo)
}
