//! Column layout of the numeric bus and line matrices exchanged with the solver.

use serde::{Deserialize, Serialize};

use crate::basic::error::GraphError;

/// Column indices of the `n x 10` bus matrix.
pub mod bus_col {
    pub const INDEX: usize = 0;
    pub const VOLTAGE: usize = 1;
    /// Degrees.
    pub const ANGLE: usize = 2;
    pub const PGEN: usize = 3;
    pub const QGEN: usize = 4;
    pub const PLOAD: usize = 5;
    pub const QLOAD: usize = 6;
    pub const CONDUCTANCE: usize = 7;
    pub const SUSCEPTANCE: usize = 8;
    pub const BUSTYPE: usize = 9;
    pub const COUNT: usize = 10;
}

/// Column indices of the `m x 7` line matrix.
pub mod line_col {
    pub const FROM: usize = 0;
    pub const TO: usize = 1;
    pub const RESISTANCE: usize = 2;
    pub const REACTANCE: usize = 3;
    pub const CHARGING: usize = 4;
    /// Zero is read as a nominal ratio of one.
    pub const TAP: usize = 5;
    /// Degrees.
    pub const PHASE: usize = 6;
    pub const COUNT: usize = 7;
}

/// Column indices of the `2m x 5` line-flow matrix. Row `2k` is the sending
/// end of line `k`, row `2k + 1` the receiving end.
pub mod flow_col {
    pub const LINE: usize = 0;
    pub const FROM: usize = 1;
    pub const TO: usize = 2;
    pub const P: usize = 3;
    pub const Q: usize = 4;
    pub const COUNT: usize = 5;
}

/// Bus classification used by the load flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusKind {
    /// Reference bus: fixed voltage and angle, absorbs the slack.
    Swing = 1,
    /// PV bus: fixed real power and voltage magnitude.
    Generator = 2,
    /// PQ bus: fixed real and reactive power.
    Load = 3,
}

impl BusKind {
    pub fn code(self) -> f64 {
        self as i64 as f64
    }
}

impl TryFrom<i64> for BusKind {
    type Error = GraphError;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(BusKind::Swing),
            2 => Ok(BusKind::Generator),
            3 => Ok(BusKind::Load),
            other => Err(GraphError::InvalidBusType(other as f64)),
        }
    }
}

impl TryFrom<f64> for BusKind {
    type Error = GraphError;

    fn try_from(code: f64) -> Result<Self, Self::Error> {
        if code.fract() != 0.0 {
            return Err(GraphError::InvalidBusType(code));
        }
        BusKind::try_from(code as i64).map_err(|_| GraphError::InvalidBusType(code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bus_kind_codes() {
        assert_eq!(BusKind::Swing.code(), 1.0);
        assert_eq!(BusKind::try_from(3.0), Ok(BusKind::Load));
        assert_eq!(BusKind::try_from(2_i64), Ok(BusKind::Generator));
        assert_eq!(BusKind::try_from(4.0), Err(GraphError::InvalidBusType(4.0)));
        assert_eq!(BusKind::try_from(1.5), Err(GraphError::InvalidBusType(1.5)));
    }
}
