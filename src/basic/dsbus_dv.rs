use nalgebra::DVector;
use nalgebra_sparse::CscMatrix;
use num_complex::Complex64;

use crate::basic::sparse::{conj::Conjugate, slice::diag};

/// Partial derivatives of the complex bus injections `S = V * conj(Y V)`.
///
/// The derivatives are formed from rectangular perturbations of each bus voltage:
/// a change in angle moves `V_k` along `j V_k`, a change in magnitude moves it
/// along the unit phasor `e^{j theta_k}`. With `I = Y V` the two partials are
///
/// ```text
/// dS/dtheta = diag(conj(I) .* jV)       + diag(V) conj(Y) diag(conj(jV))
/// dS/d|V|   = diag(conj(I) .* e^{jth})  + diag(V) conj(Y) diag(e^{-jth})
/// ```
///
/// which is the same pair MATPOWER derives in complex matrix notation
/// (R. D. Zimmerman, "AC Power Flows, Generalized OPF Costs and their
/// Derivatives using Complex Matrix Notation", Technical Note 2, 2010).
///
/// # Arguments
///
/// * `y_bus` - nodal admittance matrix.
/// * `v` - bus voltages in rectangular form.
/// * `v_unit` - unit phasors `e^{j theta}` of the same buses.
///
/// # Returns
///
/// `(dS_dVa, dS_dVm)`, both `n x n` and sharing the pattern of `Y` plus the diagonal.
#[allow(non_snake_case)]
pub fn dSbus_dV(
    y_bus: &CscMatrix<Complex64>,
    v: &DVector<Complex64>,
    v_unit: &DVector<Complex64>,
) -> (CscMatrix<Complex64>, CscMatrix<Complex64>) {
    let ang_pert = v.map(|e| Complex64::i() * e);
    let i_conj = (y_bus * v).conjugate();
    let v_y_conj = &diag(v) * &y_bus.conjugate();

    let mutual_va = &v_y_conj * &diag(&ang_pert.conjugate());
    let mutual_vm = &v_y_conj * &diag(&v_unit.conjugate());
    let dS_dVa = &diag(&i_conj.component_mul(&ang_pert)) + &mutual_va;
    let dS_dVm = &diag(&i_conj.component_mul(v_unit)) + &mutual_vm;
    (dS_dVa, dS_dVm)
}
