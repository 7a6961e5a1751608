use std::fmt;

use tabled::{Table, Tabled, settings::Style};

use super::newtonpf::LoadFlowSolution;
use super::system::{bus_col, flow_col};

/// A float printed with a fixed number of decimal places.
#[derive(Clone, Copy, PartialEq, PartialOrd)]
pub(crate) struct FloatWrapper {
    pub(crate) value: f64,
    pub(crate) precision: usize,
}

impl FloatWrapper {
    pub fn new(value: f64, precision: usize) -> Self {
        FloatWrapper { value, precision }
    }
}

impl fmt::Display for FloatWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1$}", self.value, self.precision)
    }
}

impl fmt::Debug for FloatWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[derive(Debug, Tabled)]
pub(crate) struct BusRow {
    bus: i64,
    volts: FloatWrapper,
    angle: FloatWrapper,
    p_gen: FloatWrapper,
    q_gen: FloatWrapper,
    p_load: FloatWrapper,
    q_load: FloatWrapper,
}

#[derive(Debug, Tabled)]
pub(crate) struct FlowRow {
    line: i64,
    from_bus: i64,
    to_bus: i64,
    real: FloatWrapper,
    reactive: FloatWrapper,
}

impl LoadFlowSolution {
    /// Renders a load-flow study report: summary, bus table and line-flow table.
    pub fn report(&self) -> String {
        let w = |v: f64| FloatWrapper::new(v, 4);
        let buses: Vec<BusRow> = self
            .bus
            .row_iter()
            .map(|r| BusRow {
                bus: r[bus_col::INDEX] as i64,
                volts: w(r[bus_col::VOLTAGE]),
                angle: w(r[bus_col::ANGLE]),
                p_gen: w(r[bus_col::PGEN]),
                q_gen: w(r[bus_col::QGEN]),
                p_load: w(r[bus_col::PLOAD]),
                q_load: w(r[bus_col::QLOAD]),
            })
            .collect();
        let flows: Vec<FlowRow> = self
            .line_flow
            .row_iter()
            .map(|r| FlowRow {
                line: r[flow_col::LINE] as i64,
                from_bus: r[flow_col::FROM] as i64,
                to_bus: r[flow_col::TO] as i64,
                real: w(r[flow_col::P]),
                reactive: w(r[flow_col::Q]),
            })
            .collect();

        let mut out = String::new();
        out.push_str("LOAD-FLOW STUDY\n");
        out.push_str(&format!("swing bus                  : {}\n", self.swing));
        out.push_str(&format!("iterations                 : {}\n", self.iterations));
        out.push_str(&format!("solution time              : {:?}\n", self.solve_time));
        out.push_str(&format!("total real power losses    : {}\n", w(self.p_loss)));
        out.push_str(&format!("total reactive power losses: {}\n\n", w(self.q_loss)));
        out.push_str(&Table::new(buses).with(Style::markdown()).to_string());
        out.push_str("\n\n");
        out.push_str(&Table::new(flows).with(Style::markdown()).to_string());
        out.push('\n');
        if !self.converged {
            out.push_str(&format!(
                "\nnote: solution did not converge in {} iterations\n",
                self.iterations
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use crate::basic::{config::PowerFlowConfig, newtonpf::loadflow, solver::DefaultSolver};
    use crate::testcases;

    #[test]
    fn report_lists_buses_and_flows() {
        let (bus, line) = testcases::wscc9();
        let cfg = PowerFlowConfig {
            tolerance: 1e-8,
            ..Default::default()
        };
        let sol = loadflow(&bus, &line, &cfg, &mut DefaultSolver::default()).unwrap();
        let text = sol.report();
        assert!(text.contains("swing bus                  : 0"));
        assert!(text.contains("| bus |"));
        assert!(text.contains("from_bus"));
        assert!(text.contains("1.0400"));
        assert!(!text.contains("did not converge"));
    }

    #[test]
    fn report_flags_non_convergence() {
        let (bus, line) = testcases::wscc9();
        let cfg = PowerFlowConfig {
            tolerance: 1e-12,
            max_it: 1,
            ..Default::default()
        };
        let sol = loadflow(&bus, &line, &cfg, &mut DefaultSolver::default()).unwrap();
        assert!(sol.report().contains("did not converge in 1 iterations"));
    }
}
