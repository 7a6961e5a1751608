use std::collections::HashMap;

use tracing::debug;

use super::{
    elements::{BusNode, Element, ElementId, LineEdge},
    pending::PendingConnections,
    swing::{SwingChange, SwingRegistry},
};
use crate::basic::{
    config::TopologyConfig,
    error::{GraphError, GraphResult},
    system::BusKind,
};

/// Owns every element of one network together with its name table, swing
/// registry and pending-connection table.
#[derive(Debug, Default, Clone)]
pub struct Topology {
    slots: Vec<Option<Element>>,
    names: HashMap<String, ElementId>,
    pub(crate) swing: SwingRegistry,
    pending: PendingConnections,
    config: TopologyConfig,
}

impl Topology {
    pub fn new(config: TopologyConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Adds a bus under its own name. A swing bus takes over the registry.
    pub fn insert_bus(&mut self, mut bus: BusNode) -> GraphResult<ElementId> {
        bus.capacity = self.config.bus_capacity;
        bus.links.clear();
        let kind = bus.kind;
        let id = self.insert(Element::Bus(bus))?;
        if kind == BusKind::Swing {
            self.promote(id);
        }
        Ok(id)
    }

    pub fn insert_line(&mut self, mut line: LineEdge) -> GraphResult<ElementId> {
        line.links.clear();
        self.insert(Element::Line(line))
    }

    fn insert(&mut self, element: Element) -> GraphResult<ElementId> {
        if self.names.contains_key(element.name()) {
            return Err(GraphError::DuplicateName(element.name().to_owned()));
        }
        let id = ElementId(self.slots.len());
        self.names.insert(element.name().to_owned(), id);
        self.slots.push(Some(element));
        Ok(id)
    }

    pub fn get(&self, id: ElementId) -> Option<&Element> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: ElementId) -> Option<&mut Element> {
        self.slots.get_mut(id.0).and_then(Option::as_mut)
    }

    fn element(&self, id: ElementId) -> GraphResult<&Element> {
        self.get(id).ok_or(GraphError::UnknownElement(id.0))
    }

    fn element_mut(&mut self, id: ElementId) -> GraphResult<&mut Element> {
        self.get_mut(id).ok_or(GraphError::UnknownElement(id.0))
    }

    pub fn bus(&self, id: ElementId) -> Option<&BusNode> {
        self.get(id).and_then(Element::as_bus)
    }

    pub fn bus_mut(&mut self, id: ElementId) -> Option<&mut BusNode> {
        match self.get_mut(id) {
            Some(Element::Bus(b)) => Some(b),
            _ => None,
        }
    }

    pub fn line(&self, id: ElementId) -> Option<&LineEdge> {
        self.get(id).and_then(Element::as_line)
    }

    pub fn line_mut(&mut self, id: ElementId) -> Option<&mut LineEdge> {
        match self.get_mut(id) {
            Some(Element::Line(l)) => Some(l),
            _ => None,
        }
    }

    pub fn lookup(&self, name: &str) -> Option<ElementId> {
        self.names.get(name).copied()
    }

    /// Live elements in creation order.
    pub fn elements(&self) -> impl Iterator<Item = (ElementId, &Element)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.as_ref().map(|e| (ElementId(i), e)))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn swing(&self) -> Option<ElementId> {
        self.swing.current()
    }

    pub fn pending(&self) -> &PendingConnections {
        &self.pending
    }

    pub fn pending_mut(&mut self) -> &mut PendingConnections {
        &mut self.pending
    }

    /// Relabels `from` as `to`. Refused when `to` is taken or `from` is unknown.
    ///
    /// Requesters waiting on `to` keep waiting: only a create resolves them.
    pub fn rename(&mut self, from: &str, to: &str) -> bool {
        if self.names.contains_key(to) {
            return false;
        }
        let Some(id) = self.names.remove(from) else {
            return false;
        };
        if let Some(element) = self.get_mut(id) {
            element.set_name(to.to_owned());
        }
        self.names.insert(to.to_owned(), id);
        self.pending.rename_requester(from, to);
        for slot in self.slots.iter_mut().flatten() {
            if let Element::Line(line) = slot {
                for d in line.declared.iter_mut().filter(|d| d.as_str() == from) {
                    *d = to.to_owned();
                }
            }
        }
        true
    }

    /// Connects `id` to every element in `targets`, symmetrically.
    ///
    /// Targets already connected (or repeated) are dropped. The batch is
    /// checked as a whole first: a bad target kind or an exceeded capacity on
    /// either side fails the call without writing any edge.
    pub fn connect(&mut self, id: ElementId, targets: &[ElementId]) -> GraphResult<()> {
        let node = self.element(id)?;
        let mut fresh: Vec<ElementId> = Vec::with_capacity(targets.len());
        for &t in targets {
            if node.links().contains(&t) || fresh.contains(&t) {
                continue;
            }
            let other = self.element(t)?;
            if t == id || node.is_bus() == other.is_bus() {
                return Err(GraphError::IncompatibleConnection {
                    from: node.name().to_owned(),
                    to: other.name().to_owned(),
                });
            }
            if other.links().len() >= other.capacity() {
                return Err(GraphError::CapacityExceeded {
                    name: other.name().to_owned(),
                    capacity: other.capacity(),
                    requested: 1,
                });
            }
            fresh.push(t);
        }
        if node.links().len() + fresh.len() > node.capacity() {
            return Err(GraphError::CapacityExceeded {
                name: node.name().to_owned(),
                capacity: node.capacity(),
                requested: fresh.len(),
            });
        }

        for &t in &fresh {
            self.element_mut(t)?.links_mut().push(id);
        }
        self.element_mut(id)?.links_mut().extend(fresh.iter().copied());
        self.order_terminals(id);
        for t in fresh {
            self.order_terminals(t);
        }
        Ok(())
    }

    /// Sorts a line's terminals into their declared order. Buses are left alone.
    fn order_terminals(&mut self, id: ElementId) {
        let Some(line) = self.line(id) else {
            return;
        };
        if line.declared.is_empty() {
            return;
        }
        let mut ranked: Vec<(usize, ElementId)> = line
            .links
            .iter()
            .map(|&b| {
                let rank = self
                    .get(b)
                    .map_or(usize::MAX, |bus| line.terminal_rank(bus.name()));
                (rank, b)
            })
            .collect();
        ranked.sort_by_key(|&(rank, _)| rank);
        if let Some(line) = self.line_mut(id) {
            line.links = ranked.into_iter().map(|(_, b)| b).collect();
        }
    }

    /// Removes the edge between `a` and `b` in both directions. Absent edges are ignored.
    pub fn disconnect(&mut self, a: ElementId, b: ElementId) {
        for (x, y) in [(a, b), (b, a)] {
            if let Some(e) = self.get_mut(x) {
                e.links_mut().retain(|l| *l != y);
            }
        }
    }

    /// Disconnects the element from all neighbours and removes it.
    ///
    /// Clears the swing registry if it held this bus and forgets any pending
    /// connection involving its name. Returns the removed element.
    pub fn decommission(&mut self, id: ElementId) -> Option<Element> {
        let mut element = self.slots.get_mut(id.0)?.take()?;
        for n in element.links_mut().drain(..) {
            if let Some(neighbour) = self.get_mut(n) {
                neighbour.links_mut().retain(|l| *l != id);
            }
        }
        self.names.remove(element.name());
        self.pending.purge(element.name());
        if self.swing.clear_if(id) {
            debug!(bus = element.name(), "swing bus decommissioned");
        }
        Some(element)
    }

    /// Changes a bus type and keeps the swing registry consistent.
    ///
    /// Promoting a bus to swing demotes the previous swing bus to generator.
    /// Demoting the current swing bus leaves the topology without one.
    pub fn set_bus_kind(&mut self, id: ElementId, kind: BusKind) -> GraphResult<SwingChange> {
        let bus = match self.element_mut(id)? {
            Element::Bus(b) => b,
            other => return Err(GraphError::NotABus(other.name().to_owned())),
        };
        if bus.kind == kind {
            return Ok(SwingChange::Unaffected);
        }
        bus.kind = kind;
        Ok(match kind {
            BusKind::Swing => SwingChange::Promoted {
                demoted: self.promote(id),
            },
            _ if self.swing.clear_if(id) => SwingChange::Cleared,
            _ => SwingChange::Unaffected,
        })
    }

    fn promote(&mut self, id: ElementId) -> Option<ElementId> {
        let demoted = self.swing.promote(id)?;
        if let Some(prev) = self.bus_mut(demoted) {
            prev.kind = BusKind::Generator;
            debug!(bus = prev.name(), "previous swing bus demoted to generator");
        }
        Some(demoted)
    }
}
