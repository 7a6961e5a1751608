//! The power system engine: a worker thread that owns the topology, applies
//! queued commands and runs one load flow per cycle.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{
    bridge::SolverBridge,
    command::{AttrValue, BusSpec, Command, CommandContext},
    config::EngineConfig,
    error::EngineError,
    graph::{Element, LineFlow, Netlist, Topology},
    system::BusKind,
};

/// Receives the solution records of every successful cycle.
pub type SolutionCallback = Box<dyn FnMut(&[SolutionRecord]) + Send>;

/// Snapshot of one element after a successful solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SolutionRecord {
    Bus {
        name: String,
        voltage: f64,
        angle: f64,
        pgen: f64,
        qgen: f64,
        pload: f64,
        qload: f64,
        bustype: BusKind,
    },
    Line {
        name: String,
        /// `None` until the line has been part of a solved island.
        flow: Option<LineFlow>,
    },
}

impl SolutionRecord {
    pub fn kind(&self) -> &'static str {
        match self {
            SolutionRecord::Bus { .. } => "bus",
            SolutionRecord::Line { .. } => "line",
        }
    }

    pub fn name(&self) -> &str {
        match self {
            SolutionRecord::Bus { name, .. } | SolutionRecord::Line { name, .. } => name,
        }
    }

    fn of(element: &Element) -> Self {
        match element {
            Element::Bus(b) => SolutionRecord::Bus {
                name: b.name().to_owned(),
                voltage: b.voltage,
                angle: b.angle,
                pgen: b.pgen,
                qgen: b.qgen,
                pload: b.pload,
                qload: b.qload,
                bustype: b.kind(),
            },
            Element::Line(l) => SolutionRecord::Line {
                name: l.name().to_owned(),
                flow: l.flow.clone(),
            },
        }
    }
}

fn records(topology: &Topology, netlist: &Netlist) -> Vec<SolutionRecord> {
    netlist
        .order
        .iter()
        .filter_map(|id| topology.get(*id))
        .map(SolutionRecord::of)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Created, worker not yet spawned. Commands already queue up.
    Stopped,
    Running,
    /// Worker joined. Terminal.
    Finished,
}

/// Live load-flow engine.
///
/// Producers enqueue commands from any thread; a single worker thread owns
/// the [`Topology`], applies commands in FIFO order and runs one solve per
/// cycle. Callers never touch the topology directly.
///
/// ```no_run
/// use livegrid::prelude::*;
///
/// let mut ps = PowerSystem::new(EngineConfig::default());
/// ps.add_bus(BusSpec::new("slack").kind(BusKind::Swing).connect(["l1"])).unwrap();
/// ps.add_line("l1", ["slack", "town"]);
/// ps.add_bus(BusSpec::new("town").pload(0.4).qload(0.1)).unwrap();
/// ps.set_solution_callback(|records| {
///     for r in records {
///         println!("{} {}", r.kind(), r.name());
///     }
/// });
/// ps.start().unwrap();
/// std::thread::sleep(std::time::Duration::from_millis(300));
/// let topology = ps.stop().unwrap();
/// assert_eq!(topology.len(), 3);
/// ```
pub struct PowerSystem {
    config: EngineConfig,
    sender: Sender<Command>,
    receiver: Mutex<Option<Receiver<Command>>>,
    running: Arc<AtomicBool>,
    solution: Arc<AtomicBool>,
    names: AtomicUsize,
    state: EngineState,
    handle: Option<JoinHandle<Topology>>,
}

impl Default for PowerSystem {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl PowerSystem {
    pub fn new(config: EngineConfig) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            config,
            sender,
            receiver: Mutex::new(Some(receiver)),
            running: Arc::new(AtomicBool::new(false)),
            solution: Arc::new(AtomicBool::new(false)),
            names: AtomicUsize::new(0),
            state: EngineState::Stopped,
            handle: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == EngineState::Running
    }

    /// Whether the latest cycle produced a usable solution.
    pub fn solution(&self) -> bool {
        self.solution.load(Ordering::Acquire)
    }

    /// Spawns the worker thread.
    pub fn start(&mut self) -> Result<(), EngineError> {
        let invalid = EngineError::InvalidState {
            state: self.state,
            action: "start",
        };
        if self.state != EngineState::Stopped {
            return Err(invalid);
        }
        let receiver = self
            .receiver
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(receiver) = receiver else {
            return Err(invalid);
        };

        let worker = Worker {
            receiver,
            running: self.running.clone(),
            solution: self.solution.clone(),
            config: self.config.clone(),
        };
        self.running.store(true, Ordering::Release);
        let handle = thread::Builder::new()
            .name("livegrid-engine".into())
            .spawn(move || worker.run());
        match handle {
            Ok(handle) => {
                self.handle = Some(handle);
                self.state = EngineState::Running;
                info!("power system engine started");
                Ok(())
            }
            Err(err) => {
                self.running.store(false, Ordering::Release);
                Err(err.into())
            }
        }
    }

    /// Asks the worker to finish its current cycle and waits for it.
    ///
    /// Returns the final topology, or `None` if the engine was not running or the worker panicked.
    pub fn stop(&mut self) -> Option<Topology> {
        if self.state != EngineState::Running {
            return None;
        }
        self.running.store(false, Ordering::Release);
        self.state = EngineState::Finished;
        let joined = self.handle.take()?.join();
        info!("power system engine stopped");
        match joined {
            Ok(topology) => Some(topology),
            Err(_) => {
                warn!("engine thread panicked");
                None
            }
        }
    }

    /// Enqueues a command for the next cycle.
    pub fn submit(&self, command: Command) {
        if let Err(err) = self.sender.send(command) {
            warn!(command = ?err.0, "engine is gone, command dropped");
        }
    }

    /// Enqueues a new bus after checking its setpoints and settling its bus type.
    pub fn add_bus(&self, mut spec: BusSpec) -> Result<(), EngineError> {
        if [spec.pgen, spec.qgen, spec.pload, spec.qload]
            .iter()
            .any(|v| *v < 0.0)
        {
            return Err(EngineError::NegativePower { name: spec.name });
        }
        spec.bustype = Some(spec.resolved_kind());
        self.submit(Command::CreateBus(spec));
        Ok(())
    }

    pub fn add_line<I, S>(&self, name: impl Into<String>, connections: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.submit(Command::CreateLine {
            name: name.into(),
            connections: connections.into_iter().map(Into::into).collect(),
        });
    }

    pub fn edit_element<K: Into<String>, V: Into<AttrValue>>(
        &self,
        name: impl Into<String>,
        changes: impl IntoIterator<Item = (K, V)>,
    ) {
        let changes: BTreeMap<String, AttrValue> = changes
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.submit(Command::Edit {
            name: name.into(),
            changes,
        });
    }

    pub fn decommission(&self, name: impl Into<String>) {
        self.submit(Command::Decommission { name: name.into() });
    }

    pub fn rename(&self, from: impl Into<String>, to: impl Into<String>) {
        self.submit(Command::Rename {
            from: from.into(),
            to: to.into(),
        });
    }

    pub fn set_solution_callback<F>(&self, callback: F)
    where
        F: FnMut(&[SolutionRecord]) + Send + 'static,
    {
        self.submit(Command::SetSolutionCallback(Box::new(callback)));
    }

    /// A fresh name `tag0`, `tag1`, ... unique within this engine.
    pub fn unique_name(&self, tag: &str) -> String {
        let n = self.names.fetch_add(1, Ordering::Relaxed);
        format!("{tag}{n}")
    }
}

impl Drop for PowerSystem {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Everything the worker thread owns.
struct Worker {
    receiver: Receiver<Command>,
    running: Arc<AtomicBool>,
    solution: Arc<AtomicBool>,
    config: EngineConfig,
}

impl Worker {
    fn run(self) -> Topology {
        let mut topology = Topology::new(self.config.topology.clone());
        let mut bridge = SolverBridge::new(self.config.powerflow.clone());
        let mut callback: Option<SolutionCallback> = None;
        let timeout = self.config.poll_timeout();

        while self.running.load(Ordering::Acquire) {
            let mut batch = Vec::new();
            match self.receiver.recv_timeout(timeout) {
                Ok(command) => batch.push(command),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => thread::sleep(timeout),
            }
            batch.extend(self.receiver.try_iter());

            let mut ctx = CommandContext {
                topology: &mut topology,
                callback: &mut callback,
            };
            for command in batch {
                debug!(?command, "applying");
                command.apply(&mut ctx);
            }

            match bridge.solve(&mut topology) {
                Ok(netlist) => {
                    self.solution.store(true, Ordering::Release);
                    if let Some(cb) = callback.as_mut() {
                        cb(&records(&topology, &netlist));
                    }
                }
                Err(err) => {
                    self.solution.store(false, Ordering::Release);
                    debug!(%err, "no solution this cycle");
                }
            }
        }
        topology
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic::graph::BusNode;

    #[test]
    fn record_shape() {
        let bus = Element::Bus(BusNode::new("b", BusKind::Load));
        let record = SolutionRecord::of(&bus);
        assert_eq!(record.kind(), "bus");
        assert_eq!(record.name(), "b");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["kind"], "bus");
        assert_eq!(json["bustype"], "load");

        let line = SolutionRecord::Line {
            name: "l".into(),
            flow: None,
        };
        let json = serde_json::to_value(&line).unwrap();
        assert_eq!(json["kind"], "line");
        assert!(json["flow"].is_null());
    }

    #[test]
    fn add_bus_validation() {
        let ps = PowerSystem::default();
        assert!(matches!(
            ps.add_bus(BusSpec::new("x").pload(-1.0)),
            Err(EngineError::NegativePower { name }) if name == "x"
        ));
        assert!(ps.add_bus(BusSpec::new("y").pgen(1.0)).is_ok());
    }

    #[test]
    fn unique_names_count_up() {
        let ps = PowerSystem::default();
        assert_eq!(ps.unique_name("bus"), "bus0");
        assert_eq!(ps.unique_name("line"), "line1");
    }

    #[test]
    fn lifecycle() {
        let mut ps = PowerSystem::new(EngineConfig {
            poll_timeout_ms: 5,
            ..Default::default()
        });
        assert_eq!(ps.state(), EngineState::Stopped);
        assert!(ps.stop().is_none());
        ps.start().unwrap();
        assert!(ps.is_running());
        assert!(matches!(
            ps.start(),
            Err(EngineError::InvalidState {
                state: EngineState::Running,
                ..
            })
        ));
        assert!(ps.stop().is_some());
        assert_eq!(ps.state(), EngineState::Finished);
        assert!(matches!(
            ps.start(),
            Err(EngineError::InvalidState {
                state: EngineState::Finished,
                ..
            })
        ));
    }
}
