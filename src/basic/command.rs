//! Mutation requests applied to a [`Topology`] by the engine thread.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{
    engine::SolutionCallback,
    graph::{BusNode, ElementId, LineEdge, Topology},
    system::BusKind,
};

/// Parameters of a new bus.
///
/// ```
/// use livegrid::prelude::*;
///
/// let spec = BusSpec::new("gen-1").pgen(0.8).connect(["feeder"]);
/// assert_eq!(spec.resolved_kind(), BusKind::Generator);
/// assert_eq!(BusSpec::new("sink").pload(0.5).resolved_kind(), BusKind::Load);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusSpec {
    pub name: String,
    #[serde(default)]
    pub pgen: f64,
    #[serde(default)]
    pub qgen: f64,
    #[serde(default)]
    pub pload: f64,
    #[serde(default)]
    pub qload: f64,
    #[serde(default)]
    pub bustype: Option<BusKind>,
    #[serde(default)]
    pub connections: Vec<String>,
}

impl BusSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pgen: 0.0,
            qgen: 0.0,
            pload: 0.0,
            qload: 0.0,
            bustype: None,
            connections: Vec::new(),
        }
    }

    pub fn pgen(mut self, v: f64) -> Self {
        self.pgen = v;
        self
    }

    pub fn qgen(mut self, v: f64) -> Self {
        self.qgen = v;
        self
    }

    pub fn pload(mut self, v: f64) -> Self {
        self.pload = v;
        self
    }

    pub fn qload(mut self, v: f64) -> Self {
        self.qload = v;
        self
    }

    pub fn kind(mut self, kind: BusKind) -> Self {
        self.bustype = Some(kind);
        self
    }

    pub fn connect<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.connections.extend(names.into_iter().map(Into::into));
        self
    }

    /// The explicit bus type, or generator when it produces power and load otherwise.
    pub fn resolved_kind(&self) -> BusKind {
        match self.bustype {
            Some(kind) => kind,
            None if self.pgen > 0.0 || self.qgen > 0.0 => BusKind::Generator,
            None => BusKind::Load,
        }
    }

    fn build(&self) -> BusNode {
        let mut bus = BusNode::new(self.name.clone(), self.resolved_kind());
        bus.pgen = self.pgen;
        bus.qgen = self.qgen;
        bus.pload = self.pload;
        bus.qload = self.qload;
        bus
    }
}

/// Value of one attribute change in an [`Command::Edit`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Number(f64),
    Kind(BusKind),
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Number(v)
    }
}

impl From<BusKind> for AttrValue {
    fn from(k: BusKind) -> Self {
        AttrValue::Kind(k)
    }
}

pub enum Command {
    CreateBus(BusSpec),
    CreateLine {
        name: String,
        connections: Vec<String>,
    },
    Decommission {
        name: String,
    },
    Rename {
        from: String,
        to: String,
    },
    Edit {
        name: String,
        changes: BTreeMap<String, AttrValue>,
    },
    SetSolutionCallback(SolutionCallback),
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::CreateBus(spec) => f.debug_tuple("CreateBus").field(spec).finish(),
            Command::CreateLine { name, connections } => f
                .debug_struct("CreateLine")
                .field("name", name)
                .field("connections", connections)
                .finish(),
            Command::Decommission { name } => {
                f.debug_struct("Decommission").field("name", name).finish()
            }
            Command::Rename { from, to } => f
                .debug_struct("Rename")
                .field("from", from)
                .field("to", to)
                .finish(),
            Command::Edit { name, changes } => f
                .debug_struct("Edit")
                .field("name", name)
                .field("changes", changes)
                .finish(),
            Command::SetSolutionCallback(_) => f.write_str("SetSolutionCallback(..)"),
        }
    }
}

/// State a command may touch.
pub struct CommandContext<'a> {
    pub topology: &'a mut Topology,
    pub callback: &'a mut Option<SolutionCallback>,
}

impl Command {
    /// Applies the command. Never fails: problems are logged and the rest of the command proceeds.
    pub fn apply(self, ctx: &mut CommandContext<'_>) {
        let topology = &mut *ctx.topology;
        match self {
            Command::CreateBus(spec) => match topology.insert_bus(spec.build()) {
                Ok(id) => resolve_connections(topology, id, &spec.name, &spec.connections),
                Err(err) => warn!(%err, "create bus ignored"),
            },
            Command::CreateLine { name, connections } => {
                let line = LineEdge::new(name.clone()).with_terminals(connections.iter().cloned());
                match topology.insert_line(line) {
                    Ok(id) => resolve_connections(topology, id, &name, &connections),
                    Err(err) => warn!(%err, "create line ignored"),
                }
            }
            Command::Decommission { name } => match topology.lookup(&name) {
                Some(id) => {
                    topology.decommission(id);
                }
                None => {
                    topology.pending_mut().purge(&name);
                    debug!(%name, "decommission of unknown element ignored");
                }
            },
            Command::Rename { from, to } => {
                if !topology.rename(&from, &to) {
                    debug!(%from, %to, "rename ignored");
                }
            }
            Command::Edit { name, changes } => edit(topology, &name, changes),
            Command::SetSolutionCallback(cb) => *ctx.callback = Some(cb),
        }
    }
}

/// Connects a freshly created element to the named targets that exist, parks
/// the rest in the pending table and picks up requesters that were waiting for it.
fn resolve_connections(topology: &mut Topology, id: ElementId, name: &str, connections: &[String]) {
    let mut targets = Vec::with_capacity(connections.len());
    for target in connections {
        match topology.lookup(target) {
            Some(t) => targets.push(t),
            None => topology.pending_mut().register(target, name),
        }
    }
    for requester in topology.pending_mut().take(name) {
        if let Some(r) = topology.lookup(&requester) {
            targets.push(r);
        }
    }
    for t in targets {
        if let Err(err) = topology.connect(id, &[t]) {
            warn!(element = name, %err, "connection refused");
        }
    }
}

fn edit(topology: &mut Topology, name: &str, changes: BTreeMap<String, AttrValue>) {
    let Some(id) = topology.lookup(name) else {
        debug!(element = name, "edit of unknown element ignored");
        return;
    };
    for (key, value) in changes {
        match (key.as_str(), value) {
            ("bustype", AttrValue::Kind(kind)) => set_kind(topology, id, name, kind),
            ("bustype", AttrValue::Number(code)) => match BusKind::try_from(code) {
                Ok(kind) => set_kind(topology, id, name, kind),
                Err(err) => warn!(element = name, %err, "bustype edit ignored"),
            },
            (key, AttrValue::Number(v)) => {
                let applied = topology.get_mut(id).is_some_and(|e| e.set_attr(key, v));
                if !applied {
                    debug!(element = name, key, "skipping unknown attribute");
                }
            }
            (key, AttrValue::Kind(_)) => debug!(element = name, key, "skipping non-numeric value"),
        }
    }
}

fn set_kind(topology: &mut Topology, id: ElementId, name: &str, kind: BusKind) {
    match topology.set_bus_kind(id, kind) {
        Ok(change) => debug!(element = name, ?kind, ?change, "bus type changed"),
        Err(err) => debug!(element = name, %err, "bustype edit ignored"),
    }
}
