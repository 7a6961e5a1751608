use std::collections::HashSet;

use super::{
    elements::{Element, ElementId},
    topology::Topology,
};
use crate::basic::error::{GraphError, GraphResult};

/// Nodes already expanded by one connectivity search.
#[derive(Debug, Default)]
pub struct VisitedSet {
    seen: HashSet<ElementId>,
}

impl VisitedSet {
    /// Marks `id` as visited. Returns `false` on a repeat visit.
    pub fn visit(&mut self, id: ElementId) -> bool {
        self.seen.insert(id)
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.seen.contains(&id)
    }

    pub fn clear(&mut self) {
        self.seen.clear();
    }
}

/// The energized island: every element reachable from the swing bus through fully terminated lines.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Netlist {
    /// All elements in visitation order.
    pub order: Vec<ElementId>,
    pub buses: Vec<ElementId>,
    pub lines: Vec<ElementId>,
}

impl Netlist {
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.order.contains(&id)
    }
}

impl Topology {
    /// Depth-first walk from the swing bus over the bus/line graph.
    ///
    /// Elements come out in preorder, neighbours in connection order. A line
    /// with fewer than two terminals is never entered. Fails with
    /// [`GraphError::NoSwingBus`] when no swing bus is registered.
    pub fn connectivity_search(&self) -> GraphResult<Netlist> {
        let swing = self.swing().ok_or(GraphError::NoSwingBus)?;
        let mut visited = VisitedSet::default();
        let mut netlist = Netlist::default();
        let mut stack = vec![swing];

        while let Some(id) = stack.pop() {
            if visited.contains(id) {
                continue;
            }
            let Some(element) = self.get(id) else {
                continue;
            };
            match element {
                Element::Line(line) if !line.is_terminated() => continue,
                Element::Line(_) => netlist.lines.push(id),
                Element::Bus(_) => netlist.buses.push(id),
            }
            visited.visit(id);
            netlist.order.push(id);
            stack.extend(
                element
                    .links()
                    .iter()
                    .rev()
                    .filter(|n| !visited.contains(**n)),
            );
        }
        Ok(netlist)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic::{
        graph::{BusNode, LineEdge},
        system::BusKind,
    };

    #[test]
    fn no_swing_is_an_error() {
        let mut t = Topology::default();
        t.insert_bus(BusNode::new("b", BusKind::Load)).unwrap();
        assert_eq!(t.connectivity_search(), Err(GraphError::NoSwingBus));
    }

    #[test]
    fn unterminated_lines_are_excluded() {
        let mut t = Topology::default();
        let a = t.insert_bus(BusNode::new("a", BusKind::Swing)).unwrap();
        let b = t.insert_bus(BusNode::new("b", BusKind::Load)).unwrap();
        let full = t.insert_line(LineEdge::new("full")).unwrap();
        let half = t.insert_line(LineEdge::new("half")).unwrap();
        t.connect(full, &[a, b]).unwrap();
        t.connect(half, &[b]).unwrap();

        let net = t.connectivity_search().unwrap();
        assert_eq!(net.order, vec![a, full, b]);
        assert_eq!(net.buses, vec![a, b]);
        assert_eq!(net.lines, vec![full]);
        assert!(!net.contains(half));
    }

    #[test]
    fn islands_and_loops() {
        let mut t = Topology::default();
        let a = t.insert_bus(BusNode::new("a", BusKind::Swing)).unwrap();
        let b = t.insert_bus(BusNode::new("b", BusKind::Load)).unwrap();
        let c = t.insert_bus(BusNode::new("c", BusKind::Load)).unwrap();
        let island = t.insert_bus(BusNode::new("island", BusKind::Load)).unwrap();
        let mut line = |name: &str, ends: &[ElementId]| {
            let id = t.insert_line(LineEdge::new(name)).unwrap();
            t.connect(id, ends).unwrap();
            id
        };
        let ab = line("ab", &[a, b]);
        let bc = line("bc", &[b, c]);
        let ca = line("ca", &[c, a]);

        let net = t.connectivity_search().unwrap();
        // a -> ab -> b -> bc -> c -> ca, with ca already reaching a visited bus.
        assert_eq!(net.order, vec![a, ab, b, bc, c, ca]);
        assert_eq!(net.len(), 6);
        assert!(!net.contains(island));
    }
}
