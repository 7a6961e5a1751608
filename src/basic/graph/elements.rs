use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::basic::system::BusKind;

/// Number of terminals on a line.
pub const LINE_CAPACITY: usize = 2;

/// Opaque handle to an element slot in a [`Topology`](super::Topology).
///
/// Ids are never reused, so a stale id held after a decommission simply fails to resolve.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[display("#{_0}")]
pub struct ElementId(pub(crate) usize);

impl ElementId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Complex power leaving the sending end of a line, with both terminal bus names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineFlow {
    pub p: f64,
    pub q: f64,
    pub from: String,
    pub to: String,
}

/// A bus node. Angles are in degrees, powers and voltages in per unit.
#[derive(Debug, Clone, PartialEq)]
pub struct BusNode {
    pub(crate) name: String,
    pub(crate) kind: BusKind,
    pub pgen: f64,
    pub qgen: f64,
    pub pload: f64,
    pub qload: f64,
    pub voltage: f64,
    pub angle: f64,
    pub conductance: f64,
    pub susceptance: f64,
    pub(crate) links: Vec<ElementId>,
    pub(crate) capacity: usize,
}

impl BusNode {
    pub fn new(name: impl Into<String>, kind: BusKind) -> Self {
        Self {
            name: name.into(),
            kind,
            pgen: 0.0,
            qgen: 0.0,
            pload: 0.0,
            qload: 0.0,
            voltage: 1.0,
            angle: 0.0,
            conductance: 0.0,
            susceptance: 0.0,
            links: Vec::new(),
            capacity: 10,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bus type. Changed only through [`Topology::set_bus_kind`](super::Topology::set_bus_kind).
    pub fn kind(&self) -> BusKind {
        self.kind
    }

    pub fn links(&self) -> &[ElementId] {
        &self.links
    }

    fn attr_mut(&mut self, key: &str) -> Option<&mut f64> {
        Some(match key {
            "pgen" => &mut self.pgen,
            "qgen" => &mut self.qgen,
            "pload" => &mut self.pload,
            "qload" => &mut self.qload,
            "voltage" => &mut self.voltage,
            "angle" => &mut self.angle,
            "conductance" => &mut self.conductance,
            "susceptance" => &mut self.susceptance,
            _ => return None,
        })
    }
}

/// A line with at most two bus terminals. `links[0]` is the sending end.
///
/// When the line names its terminals at creation, `links` follows that
/// order no matter which bus shows up first.
#[derive(Debug, Clone, PartialEq)]
pub struct LineEdge {
    pub(crate) name: String,
    pub resistance: f64,
    pub reactance: f64,
    pub charging: f64,
    /// Off-nominal ratio; zero reads as one.
    pub tap: f64,
    /// Degrees.
    pub phase: f64,
    pub flow: Option<LineFlow>,
    pub(crate) links: Vec<ElementId>,
    pub(crate) declared: Vec<String>,
}

impl LineEdge {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resistance: 0.005,
            reactance: 0.02,
            charging: 0.1,
            tap: 1.0,
            phase: 0.0,
            flow: None,
            links: Vec::new(),
            declared: Vec::new(),
        }
    }

    /// Fixes the terminal order by bus name.
    pub fn with_terminals<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.declared = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn links(&self) -> &[ElementId] {
        &self.links
    }

    /// Terminal names given at creation, kept current across renames.
    pub fn declared_terminals(&self) -> &[String] {
        &self.declared
    }

    /// Position of `bus` among the declared terminals; undeclared names sort last.
    pub(crate) fn terminal_rank(&self, bus: &str) -> usize {
        self.declared
            .iter()
            .position(|d| d == bus)
            .unwrap_or(usize::MAX)
    }

    pub fn is_terminated(&self) -> bool {
        self.links.len() == LINE_CAPACITY
    }

    fn attr_mut(&mut self, key: &str) -> Option<&mut f64> {
        Some(match key {
            "resistance" => &mut self.resistance,
            "reactance" => &mut self.reactance,
            "charging" => &mut self.charging,
            "tap" => &mut self.tap,
            "phase" => &mut self.phase,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Bus(BusNode),
    Line(LineEdge),
}

impl Element {
    pub fn name(&self) -> &str {
        match self {
            Element::Bus(b) => &b.name,
            Element::Line(l) => &l.name,
        }
    }

    pub(crate) fn set_name(&mut self, name: String) {
        match self {
            Element::Bus(b) => b.name = name,
            Element::Line(l) => l.name = name,
        }
    }

    pub fn links(&self) -> &[ElementId] {
        match self {
            Element::Bus(b) => &b.links,
            Element::Line(l) => &l.links,
        }
    }

    pub(crate) fn links_mut(&mut self) -> &mut Vec<ElementId> {
        match self {
            Element::Bus(b) => &mut b.links,
            Element::Line(l) => &mut l.links,
        }
    }

    pub fn capacity(&self) -> usize {
        match self {
            Element::Bus(b) => b.capacity,
            Element::Line(_) => LINE_CAPACITY,
        }
    }

    pub fn is_bus(&self) -> bool {
        matches!(self, Element::Bus(_))
    }

    pub fn as_bus(&self) -> Option<&BusNode> {
        match self {
            Element::Bus(b) => Some(b),
            Element::Line(_) => None,
        }
    }

    pub fn as_line(&self) -> Option<&LineEdge> {
        match self {
            Element::Line(l) => Some(l),
            Element::Bus(_) => None,
        }
    }

    /// Sets a numeric attribute by name. Returns `false` when this kind of element has no such attribute.
    pub fn set_attr(&mut self, key: &str, value: f64) -> bool {
        let slot = match self {
            Element::Bus(b) => b.attr_mut(key),
            Element::Line(l) => l.attr_mut(key),
        };
        match slot {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let bus = BusNode::new("b", BusKind::Load);
        assert_eq!((bus.voltage, bus.angle), (1.0, 0.0));
        let line = LineEdge::new("l");
        assert_eq!(
            (line.resistance, line.reactance, line.charging, line.tap, line.phase),
            (0.005, 0.02, 0.1, 1.0, 0.0)
        );
        assert!(line.flow.is_none());
        assert!(!line.is_terminated());
    }

    #[test]
    fn attributes_are_scoped_by_kind() {
        let mut bus = Element::Bus(BusNode::new("b", BusKind::Load));
        assert!(bus.set_attr("pload", 0.4));
        assert!(!bus.set_attr("resistance", 0.1));
        assert!(!bus.set_attr("bogus", 1.0));
        assert_eq!(bus.as_bus().map(|b| b.pload), Some(0.4));

        let mut line = Element::Line(LineEdge::new("l"));
        assert!(line.set_attr("reactance", 0.3));
        assert!(!line.set_attr("pgen", 1.0));
        assert_eq!(line.as_line().map(|l| l.reactance), Some(0.3));
    }
}
