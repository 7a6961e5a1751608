use std::collections::HashMap;
use std::time::{Duration, Instant};

use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CscMatrix;
use num_complex::Complex64;

use super::{
    config::{JacobianUpdate, PowerFlowConfig},
    dsbus_dv::dSbus_dV,
    error::{SolverError, SolverResult},
    solver::Solve,
    sparse::{
        cast::Cast,
        conj::RealImage,
        slice::{expand, reduce, selection_matrix},
        stack::{csc_hstack, csc_vstack},
    },
    system::{
        BusKind,
        admittance::{BranchModel, branch_models, create_y_bus},
        bus_col, flow_col, line_col,
    },
};

/// Result of one load-flow run.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadFlowSolution {
    /// Solved bus matrix, same layout as the input (angle in degrees).
    /// Generation and load columns are back-computed from the final injections.
    pub bus: DMatrix<f64>,
    /// `2m x 5` flow matrix, sending row then receiving row for each line.
    pub line_flow: DMatrix<f64>,
    pub iterations: usize,
    pub converged: bool,
    /// Final `max|dP| + max|dQ|`.
    pub mismatch: f64,
    pub p_loss: f64,
    pub q_loss: f64,
    /// Bus number of the swing bus.
    pub swing: i64,
    pub solve_time: Duration,
}

/// Per-bus scheduled generation and load.
struct Schedule {
    pg: DVector<f64>,
    qg: DVector<f64>,
    pl: DVector<f64>,
    ql: DVector<f64>,
}

/// Computed injections and the mismatch against the schedule.
struct Mismatch {
    dp: DVector<f64>,
    dq: DVector<f64>,
    p: DVector<f64>,
    q: DVector<f64>,
    total: f64,
}

/// Solves the AC load flow with the Newton-Raphson method.
///
/// `bus` is an `n x 10` matrix laid out per [`bus_col`], `line` an `m x 7`
/// matrix laid out per [`line_col`]. Swing buses hold voltage and angle,
/// generator buses hold real power and voltage magnitude, load buses hold
/// real and reactive power.
///
/// Each iteration solves `J dx = [dP_red; dQ_red]`, applies
/// `V += acc * dV` then clamps `V` to `[v_min, v_max]`, and applies
/// `theta += acc * dtheta`. Running out of iterations is reported through
/// [`LoadFlowSolution::converged`], not as an error. Errors are reserved for
/// malformed input and numerical breakdown.
///
/// ```
/// use livegrid::prelude::*;
/// use nalgebra::DMatrix;
///
/// let bus = DMatrix::from_row_slice(2, 10, &[
///     0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0,
///     1.0, 1.0, 0.0, 0.0, 0.0, 0.5, 0.1, 0.0, 0.0, 3.0,
/// ]);
/// let line = DMatrix::from_row_slice(1, 7, &[0.0, 1.0, 0.01, 0.05, 0.0, 1.0, 0.0]);
/// let cfg = PowerFlowConfig { tolerance: 1e-8, max_it: 20, ..Default::default() };
/// let sol = loadflow(&bus, &line, &cfg, &mut DefaultSolver::default()).unwrap();
/// assert!(sol.converged);
/// assert!(sol.bus[(1, bus_col::VOLTAGE)] < 1.0);
/// ```
pub fn loadflow<S: Solve>(
    bus: &DMatrix<f64>,
    line: &DMatrix<f64>,
    cfg: &PowerFlowConfig,
    solver: &mut S,
) -> SolverResult<LoadFlowSolution> {
    check_shapes(bus, line)?;
    let n = bus.nrows();

    let positions = bus_positions(bus)?;
    let kinds = bus_kinds(bus)?;
    let swing = swing_position(&kinds)?;

    // Unknown angles at every non-swing bus, unknown magnitudes at load buses only.
    let pqv: Vec<usize> = (0..n).filter(|&i| kinds[i] != BusKind::Swing).collect();
    let pq: Vec<usize> = (0..n).filter(|&i| kinds[i] == BusKind::Load).collect();
    let ang_red = selection_matrix(&pqv, n);
    let volt_red = selection_matrix(&pq, n);

    let branches = branch_models(line, &positions)?;
    let shunts: Vec<Complex64> = (0..n)
        .map(|i| Complex64::new(bus[(i, bus_col::CONDUCTANCE)], bus[(i, bus_col::SUSCEPTANCE)]))
        .collect();
    let y_bus = create_y_bus(n, &branches, &shunts);

    let column = |c: usize| DVector::from_fn(n, |i, _| bus[(i, c)]);
    let mut vm = column(bus_col::VOLTAGE);
    let mut va = column(bus_col::ANGLE).map(f64::to_radians);
    let mut schedule = Schedule {
        pg: column(bus_col::PGEN),
        qg: column(bus_col::QGEN),
        pl: column(bus_col::PLOAD),
        ql: column(bus_col::QLOAD),
    };

    solver.reset();
    let start = Instant::now();
    let mut state = mismatch(&y_bus, &kinds, &vm, &va, &schedule)?;
    let mut iterations = 0;
    let mut jacobian: Option<CscMatrix<f64>> = None;

    while state.total > cfg.tolerance && iterations < cfg.max_it {
        iterations += 1;
        let refresh = match cfg.jacobian {
            JacobianUpdate::EveryIteration => true,
            JacobianUpdate::EveryOtherIteration => iterations % 2 == 1,
        };
        let jac = match jacobian.take() {
            Some(jac) if !refresh => jac,
            _ => form_jacobian(&y_bus, &vm, &va, &ang_red, &volt_red)?,
        };

        let mut dx: Vec<f64> = reduce(&ang_red, &state.dp)
            .iter()
            .chain(reduce(&volt_red, &state.dq).iter())
            .copied()
            .collect();
        solver.solve(&jac, &mut dx)?;

        let d_ang = expand(&ang_red, &dx[..pqv.len()]);
        let d_v = expand(&volt_red, &dx[pqv.len()..]);

        // Accelerate, then clamp.
        let acc = cfg.acceleration;
        vm.zip_apply(&d_v, |v, dv| *v = (*v + acc * dv).max(cfg.v_min).min(cfg.v_max));
        va.zip_apply(&d_ang, |a, da| *a += acc * da);
        if vm.iter().chain(va.iter()).any(|x| !x.is_finite()) {
            return Err(SolverError::NonFinite { what: "voltage update" });
        }

        state = mismatch(&y_bus, &kinds, &vm, &va, &schedule)?;
        jacobian = Some(jac);
    }
    let solve_time = start.elapsed();
    let converged = state.total <= cfg.tolerance;

    back_compute(&kinds, &state, &mut schedule);

    let v = polar(&vm, &va);
    let (line_flow, p_loss, q_loss) = line_flows(line, &branches, &v);

    let mut solved = bus.clone();
    for i in 0..n {
        solved[(i, bus_col::VOLTAGE)] = vm[i];
        solved[(i, bus_col::ANGLE)] = va[i].to_degrees();
        solved[(i, bus_col::PGEN)] = schedule.pg[i];
        solved[(i, bus_col::QGEN)] = schedule.qg[i];
        solved[(i, bus_col::PLOAD)] = schedule.pl[i];
        solved[(i, bus_col::QLOAD)] = schedule.ql[i];
    }
    if solved.iter().chain(line_flow.iter()).any(|x| !x.is_finite()) {
        return Err(SolverError::NonFinite { what: "solution" });
    }

    Ok(LoadFlowSolution {
        bus: solved,
        line_flow,
        iterations,
        converged,
        mismatch: state.total,
        p_loss,
        q_loss,
        swing: bus[(swing, bus_col::INDEX)] as i64,
        solve_time,
    })
}

fn check_shapes(bus: &DMatrix<f64>, line: &DMatrix<f64>) -> SolverResult<()> {
    if bus.nrows() == 0 {
        return Err(SolverError::Shape {
            what: "bus matrix has no rows".into(),
        });
    }
    if bus.ncols() != bus_col::COUNT {
        return Err(SolverError::Shape {
            what: format!("bus matrix has {} columns, expected {}", bus.ncols(), bus_col::COUNT),
        });
    }
    if line.ncols() != line_col::COUNT {
        return Err(SolverError::Shape {
            what: format!("line matrix has {} columns, expected {}", line.ncols(), line_col::COUNT),
        });
    }
    if bus.iter().chain(line.iter()).any(|x| !x.is_finite()) {
        return Err(SolverError::NonFinite { what: "input data" });
    }
    Ok(())
}

/// Maps external bus numbers to dense positions.
fn bus_positions(bus: &DMatrix<f64>) -> SolverResult<HashMap<i64, usize>> {
    let mut positions = HashMap::with_capacity(bus.nrows());
    for i in 0..bus.nrows() {
        let number = bus[(i, bus_col::INDEX)];
        if number < 0.0 || number.fract() != 0.0 {
            return Err(SolverError::Shape {
                what: format!("bus row {i} has invalid number {number}"),
            });
        }
        if positions.insert(number as i64, i).is_some() {
            return Err(SolverError::Shape {
                what: format!("bus number {number} appears twice"),
            });
        }
    }
    Ok(positions)
}

fn bus_kinds(bus: &DMatrix<f64>) -> SolverResult<Vec<BusKind>> {
    (0..bus.nrows())
        .map(|i| {
            let code = bus[(i, bus_col::BUSTYPE)];
            BusKind::try_from(code).map_err(|_| SolverError::InvalidBusType { bus: i, code })
        })
        .collect()
}

fn swing_position(kinds: &[BusKind]) -> SolverResult<usize> {
    let mut swings = kinds
        .iter()
        .enumerate()
        .filter(|(_, k)| **k == BusKind::Swing)
        .map(|(i, _)| i);
    match (swings.next(), swings.count()) {
        (None, _) => Err(SolverError::NoSwingBus),
        (Some(i), 0) => Ok(i),
        (Some(_), rest) => Err(SolverError::MultipleSwingBuses { count: rest + 1 }),
    }
}

#[inline(always)]
fn polar(vm: &DVector<f64>, va: &DVector<f64>) -> DVector<Complex64> {
    vm.zip_map(va, Complex64::from_polar)
}

/// Evaluates `S = V conj(Y V)` and the scheduled-minus-computed mismatch.
///
/// Quantities that are not free variables carry no mismatch: both at the
/// swing bus, reactive power at generator buses.
fn mismatch(
    y_bus: &CscMatrix<Complex64>,
    kinds: &[BusKind],
    vm: &DVector<f64>,
    va: &DVector<f64>,
    schedule: &Schedule,
) -> SolverResult<Mismatch> {
    let v = polar(vm, va);
    let s = v.component_mul(&(y_bus * &v).conjugate());
    let p = s.map(|e| e.re);
    let q = s.map(|e| e.im);
    let mut dp = &schedule.pg - &schedule.pl - &p;
    let mut dq = &schedule.qg - &schedule.ql - &q;
    for (i, kind) in kinds.iter().enumerate() {
        match kind {
            BusKind::Swing => {
                dp[i] = 0.0;
                dq[i] = 0.0;
            }
            BusKind::Generator => dq[i] = 0.0,
            BusKind::Load => {}
        }
    }
    let total = dp.amax() + dq.amax();
    if !total.is_finite() {
        return Err(SolverError::NonFinite { what: "power mismatch" });
    }
    Ok(Mismatch { dp, dq, p, q, total })
}

/// Forms the reduced Jacobian `[J11 J12; J21 J22]` of `P, Q` against the unknown angles and magnitudes.
#[allow(non_snake_case)]
fn form_jacobian(
    y_bus: &CscMatrix<Complex64>,
    vm: &DVector<f64>,
    va: &DVector<f64>,
    ang_red: &CscMatrix<f64>,
    volt_red: &CscMatrix<f64>,
) -> SolverResult<CscMatrix<f64>> {
    let v_unit = va.map(|a| Complex64::from_polar(1.0, a));
    let v = v_unit.zip_map(vm, |u, m| u * m);
    let (dS_dVa, dS_dVm) = dSbus_dV(y_bus, &v, &v_unit);

    let (dS_dVa_re, dS_dVa_im) = (&dS_dVa * &ang_red.transpose().cast()).real_imag();
    let (dS_dVm_re, dS_dVm_im) = (&dS_dVm * &volt_red.transpose().cast()).real_imag();

    let J11 = ang_red * &dS_dVa_re;
    let J12 = ang_red * &dS_dVm_re;
    let J21 = volt_red * &dS_dVa_im;
    let J22 = volt_red * &dS_dVm_im;

    csc_vstack(&[&csc_hstack(&[&J11, &J12])?, &csc_hstack(&[&J21, &J22])?])
}

/// Rewrites generation and load so they reflect the final injections.
fn back_compute(kinds: &[BusKind], state: &Mismatch, schedule: &mut Schedule) {
    for (i, kind) in kinds.iter().enumerate() {
        match kind {
            BusKind::Swing | BusKind::Generator => {
                schedule.pg[i] = state.p[i] + schedule.pl[i];
                schedule.qg[i] = state.q[i] + schedule.ql[i];
            }
            BusKind::Load => {
                schedule.pl[i] = schedule.pg[i] - state.p[i];
                schedule.ql[i] = schedule.qg[i] - state.q[i];
            }
        }
    }
}

/// Complex flow at both ends of every line, plus total losses.
fn line_flows(
    line: &DMatrix<f64>,
    branches: &[BranchModel],
    v: &DVector<Complex64>,
) -> (DMatrix<f64>, f64, f64) {
    let mut flow = DMatrix::zeros(2 * branches.len(), flow_col::COUNT);
    let (mut p_loss, mut q_loss) = (0.0, 0.0);
    for (k, br) in branches.iter().enumerate() {
        let (vf, vt) = (v[br.port[0]], v[br.port[1]]);
        let half = Complex64::new(0.0, br.charging / 2.0);
        let sent = vf * ((vf - br.tps * vt) * br.y.0 + vf * half).conj() / br.tap_norm_sqr();
        let received = vt * ((vt - vf / br.tps) * br.y.0 + vt * half).conj();

        let (from, to) = (line[(k, line_col::FROM)], line[(k, line_col::TO)]);
        for (row, (a, b, s)) in [(from, to, sent), (to, from, received)].into_iter().enumerate() {
            let r = 2 * k + row;
            flow[(r, flow_col::LINE)] = k as f64;
            flow[(r, flow_col::FROM)] = a;
            flow[(r, flow_col::TO)] = b;
            flow[(r, flow_col::P)] = s.re;
            flow[(r, flow_col::Q)] = s.im;
        }
        p_loss += sent.re + received.re;
        q_loss += sent.im + received.im;
    }
    (flow, p_loss, q_loss)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic::solver::{DefaultSolver, DenseLuSolver};
    use crate::testcases;

    fn tight() -> PowerFlowConfig {
        PowerFlowConfig {
            tolerance: 1e-8,
            max_it: 30,
            v_min: 0.5,
            v_max: 1.5,
            ..Default::default()
        }
    }

    fn bus_rows(rows: &[[f64; 10]]) -> DMatrix<f64> {
        DMatrix::from_fn(rows.len(), 10, |r, c| rows[r][c])
    }

    fn line_rows(rows: &[[f64; 7]]) -> DMatrix<f64> {
        DMatrix::from_fn(rows.len(), 7, |r, c| rows[r][c])
    }

    #[test]
    fn wscc_nine_bus_converges() {
        let (bus, line) = testcases::wscc9();
        let sol = loadflow(&bus, &line, &tight(), &mut DefaultSolver::default()).unwrap();
        assert!(sol.converged, "mismatch {}", sol.mismatch);
        assert!(sol.iterations < 10);

        // Swing generation balances load plus losses.
        let generation: f64 = sol.bus.column(bus_col::PGEN).sum();
        let load: f64 = sol.bus.column(bus_col::PLOAD).sum();
        assert!((generation - load - sol.p_loss).abs() < 1e-6);
        assert!(sol.p_loss > 0.0);

        // Generator buses keep their voltage magnitude.
        assert!((sol.bus[(1, bus_col::VOLTAGE)] - 1.02533).abs() < 1e-12);
        assert!((sol.bus[(2, bus_col::VOLTAGE)] - 1.02536).abs() < 1e-12);
        // Swing holds its setpoint.
        assert_eq!(sol.bus[(0, bus_col::ANGLE)], 0.0);
        assert_eq!(sol.swing, 0);
        // Textbook result for the WSCC case: swing supplies about 0.72 p.u.
        assert!((sol.bus[(0, bus_col::PGEN)] - 0.716).abs() < 0.01);
    }

    #[test]
    fn backends_agree() {
        let (bus, line) = testcases::wscc9();
        let sparse = loadflow(&bus, &line, &tight(), &mut DefaultSolver::default()).unwrap();
        let dense = loadflow(&bus, &line, &tight(), &mut DenseLuSolver).unwrap();
        assert!((sparse.bus.clone() - dense.bus).amax() < 1e-9);
    }

    #[test]
    fn every_other_iteration_also_converges() {
        let (bus, line) = testcases::wscc9();
        let cfg = PowerFlowConfig {
            jacobian: JacobianUpdate::EveryOtherIteration,
            ..tight()
        };
        let sol = loadflow(&bus, &line, &cfg, &mut DefaultSolver::default()).unwrap();
        assert!(sol.converged);
    }

    #[test]
    fn iteration_budget_is_not_an_error() {
        let (bus, line) = testcases::wscc9();
        let cfg = PowerFlowConfig {
            max_it: 1,
            ..tight()
        };
        let sol = loadflow(&bus, &line, &cfg, &mut DefaultSolver::default()).unwrap();
        assert!(!sol.converged);
        assert_eq!(sol.iterations, 1);
    }

    #[test]
    fn radial_gen_and_load_scenario() {
        // swing - gen(pgen 1.0) - load(pload 1.0) with negligible impedance.
        let bus = bus_rows(&[
            [0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0],
            [1.0, 1.0, 0.0, 1.0, 0.2, 0.0, 0.0, 0.0, 0.0, 2.0],
            [2.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 3.0],
        ]);
        let line = line_rows(&[
            [0.0, 1.0, 1e-6, 1e-5, 0.0, 1.0, 0.0],
            [1.0, 2.0, 1e-6, 1e-5, 0.0, 1.0, 0.0],
        ]);
        let cfg = PowerFlowConfig {
            tolerance: 1e-6,
            ..Default::default()
        };
        let sol = loadflow(&bus, &line, &cfg, &mut DefaultSolver::default()).unwrap();
        assert!(sol.converged);
        assert_eq!(sol.line_flow.nrows(), 4);
        assert!(sol.line_flow[(0, flow_col::P)].abs() < 0.005);
        assert!((sol.line_flow[(2, flow_col::P)] - 1.0).abs() < 0.005);
        assert!((sol.line_flow[(3, flow_col::P)] + 1.0).abs() < 0.005);
        for i in 0..3 {
            assert!((sol.bus[(i, bus_col::VOLTAGE)] - 1.0).abs() < 0.005);
            assert!(sol.bus[(i, bus_col::ANGLE)].abs() < 0.005);
        }
        assert!(sol.bus[(0, bus_col::PGEN)].abs() < 0.005);
        assert!((sol.bus[(1, bus_col::PGEN)] - 1.0).abs() < 0.005);
        assert!((sol.bus[(2, bus_col::PLOAD)] - 1.0).abs() < 0.005);
    }

    #[test]
    fn voltage_is_clamped_after_acceleration() {
        // Heavy load pulls the PQ bus well below v_min.
        let bus = bus_rows(&[
            [0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0],
            [1.0, 1.0, 0.0, 0.0, 0.0, 2.0, 1.0, 0.0, 0.0, 3.0],
        ]);
        let line = line_rows(&[[0.0, 1.0, 0.02, 0.2, 0.0, 1.0, 0.0]]);
        let cfg = PowerFlowConfig {
            tolerance: 1e-8,
            max_it: 5,
            ..Default::default()
        };
        let sol = loadflow(&bus, &line, &cfg, &mut DefaultSolver::default()).unwrap();
        assert!(sol.bus[(1, bus_col::VOLTAGE)] >= 0.95);
        assert!(!sol.converged);
    }

    #[test]
    fn lone_swing_bus_is_trivially_solved() {
        let bus = bus_rows(&[[4.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0]]);
        let line = DMatrix::zeros(0, 7);
        let sol = loadflow(&bus, &line, &tight(), &mut DefaultSolver::default()).unwrap();
        assert!(sol.converged);
        assert_eq!(sol.iterations, 0);
        assert_eq!(sol.line_flow.nrows(), 0);
        assert_eq!(sol.swing, 4);
    }

    #[test]
    fn structural_errors() {
        let mut solver = DefaultSolver::default();
        let cfg = tight();
        let line = DMatrix::zeros(0, 7);

        let no_swing = bus_rows(&[[0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 3.0]]);
        assert_eq!(loadflow(&no_swing, &line, &cfg, &mut solver), Err(SolverError::NoSwingBus));

        let two_swings = bus_rows(&[
            [0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0],
            [1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0],
        ]);
        assert_eq!(
            loadflow(&two_swings, &line, &cfg, &mut solver),
            Err(SolverError::MultipleSwingBuses { count: 2 })
        );

        let bad_type = bus_rows(&[[0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 7.0]]);
        assert!(matches!(
            loadflow(&bad_type, &line, &cfg, &mut solver),
            Err(SolverError::InvalidBusType { bus: 0, .. })
        ));

        let narrow = DMatrix::zeros(1, 9);
        assert!(matches!(
            loadflow(&narrow, &line, &cfg, &mut solver),
            Err(SolverError::Shape { .. })
        ));
    }

    #[test]
    fn islanded_load_is_singular() {
        // Bus 2 is a load bus with no line: its Jacobian rows are all zero.
        let bus = bus_rows(&[
            [0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0],
            [1.0, 1.0, 0.0, 0.0, 0.0, 0.5, 0.0, 0.0, 0.0, 3.0],
            [2.0, 1.0, 0.0, 0.0, 0.0, 0.5, 0.0, 0.0, 0.0, 3.0],
        ]);
        let line = line_rows(&[[0.0, 1.0, 0.01, 0.1, 0.0, 1.0, 0.0]]);
        let result = loadflow(&bus, &line, &tight(), &mut DenseLuSolver);
        assert!(matches!(result, Err(SolverError::Singular { .. })));
    }
}
