//! Builds a small network out of order, edits it while the engine runs and
//! prints what the solution callback sees. Finishes with a standalone WSCC
//! 9-bus load flow report.
//!
//! `RUST_LOG=livegrid=debug cargo run --example live_grid`

use std::io;
use std::sync::mpsc;
use std::time::Duration;

use livegrid::prelude::*;
use livegrid::testcases;
use tracing::info;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(io::stderr)
        .init();

    let config = EngineConfig::from_json_str(r#"{ "poll_timeout_ms": 20 }"#)?;
    let mut ps = PowerSystem::new(config);

    let (tx, rx) = mpsc::channel();
    ps.set_solution_callback(move |records| {
        let _ = tx.send(records.to_vec());
    });

    // Lines first: they wait for their buses.
    let feeder = ps.unique_name("line");
    let tie = ps.unique_name("line");
    ps.add_line(&feeder, ["slack", "plant"]);
    ps.add_line(&tie, ["plant", "town"]);
    ps.add_bus(BusSpec::new("town").pload(0.9).qload(0.3))?;
    ps.add_bus(BusSpec::new("plant").pgen(0.6))?;
    ps.add_bus(BusSpec::new("slack").kind(BusKind::Swing))?;
    ps.start()?;

    print_cycle(&rx)?;

    info!("raising town load");
    ps.edit_element("town", [("pload", 1.2)]);
    ps.rename("town", "city");
    std::thread::sleep(Duration::from_millis(100));
    while rx.try_recv().is_ok() {}
    print_cycle(&rx)?;

    let topology = ps.stop();
    info!(elements = topology.map(|t| t.len()), "engine stopped");

    let (bus, line) = testcases::wscc9();
    let solution = loadflow(&bus, &line, &PowerFlowConfig::default(), &mut DefaultSolver::default())?;
    println!("{}", solution.report());
    Ok(())
}

fn print_cycle(rx: &mpsc::Receiver<Vec<SolutionRecord>>) -> Result<(), mpsc::RecvTimeoutError> {
    let records = rx.recv_timeout(Duration::from_secs(5))?;
    println!("{}", serde_json::to_string_pretty(&records).unwrap_or_default());
    Ok(())
}
