//! Fault-storm simulator for the containment runtime.

use std::sync::Arc;
use std::time::Duration;

use clap::{value_parser, Arg, ArgAction, Command};
use tracing_subscriber::EnvFilter;

use bulkhead_core::prelude::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Command::new("bulkhead-sim")
        .version(bulkhead_core::VERSION)
        .about("Containment runtime simulator")
        .arg_required_else_help(true)
        .subcommand(
            Command::new("storm")
                .about("Run a fault storm against a three-tier boundary tree")
                .arg(
                    Arg::new("clients")
                        .long("clients")
                        .default_value("3")
                        .value_parser(value_parser!(u64))
                        .help("Clients attached to the widget boundary"),
                )
                .arg(
                    Arg::new("faults")
                        .long("faults")
                        .default_value("8")
                        .value_parser(value_parser!(u64))
                        .help("Faults fired per client"),
                )
                .arg(
                    Arg::new("trip-threshold")
                        .long("trip-threshold")
                        .default_value("5")
                        .value_parser(value_parser!(usize))
                        .help("Recent violations before the circuit breaker trips"),
                )
                .arg(
                    Arg::new("window-secs")
                        .long("window-secs")
                        .default_value("600")
                        .value_parser(value_parser!(u64))
                        .help("Trailing window for the frequency check, in seconds"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output the report as JSON"),
                ),
        )
        .subcommand(
            Command::new("table").about("Print the static fault-to-action suggestion table"),
        );

    match cli.get_matches().subcommand() {
        Some(("storm", args)) => {
            let clients = *args.get_one::<u64>("clients").unwrap();
            let faults = *args.get_one::<u64>("faults").unwrap();
            let threshold = *args.get_one::<usize>("trip-threshold").unwrap();
            let window_secs = *args.get_one::<u64>("window-secs").unwrap();
            let json = args.get_flag("json");
            run_storm(clients, faults, threshold, window_secs, json).await?;
        }
        Some(("table", _)) => print_table(),
        _ => {}
    }

    Ok(())
}

async fn run_storm(
    clients: u64,
    faults: u64,
    threshold: usize,
    window_secs: u64,
    json: bool,
) -> anyhow::Result<()> {
    let config = ContainmentConfig::new()
        .with_trip_threshold(threshold)
        .with_violation_window(Duration::from_secs(window_secs))
        .with_decision_timeout(Duration::from_millis(250));
    let runtime = ContainmentRuntime::new(config, Arc::new(StaticInteractionPort))?;
    let coordinator = runtime.coordinator();

    coordinator
        .create_boundary(BoundarySpec::new("app", Severity::Critical))
        .await?;
    coordinator
        .create_boundary(BoundarySpec::new("session", Severity::Error).with_parent("app"))
        .await?;
    coordinator
        .create_boundary(
            BoundarySpec::new("widget", Severity::Warning)
                .with_parent("session")
                .with_fallback(FallbackAction::new("placeholder-widget", || async {
                    tracing::info!("widget placeholder rendered");
                })),
        )
        .await?;

    // The upper tiers carry one client each, like a real shell and screen.
    coordinator.attach_client("app", "app-shell").await?;
    coordinator
        .attach_client("session", "session-screen")
        .await?;

    let mut tasks = Vec::new();
    for client in 0..clients {
        let source = format!("client-{client}");
        coordinator.attach_client("widget", source.as_str()).await?;
        let registry = runtime.registry().clone();
        tasks.push(tokio::spawn(async move {
            let source = SourceId::new(source);
            for round in 0..faults {
                let fault = sample_fault(client * faults + round);
                // Each simulated operation fails; the error propagates as a
                // side channel and comes back to the client unchanged.
                let _: Result<(), Fault> = registry
                    .with_propagation(&source, async { Err(fault) })
                    .await;
            }
        }));
    }
    for task in tasks {
        task.await?;
    }

    let stats = coordinator.stats().await?;
    let snapshot = runtime.registry().snapshot().await?;
    runtime.shutdown().await;

    if json {
        let report = serde_json::json!({
            "clients": clients,
            "faults_per_client": faults,
            "coordinator": stats,
            "registry": snapshot,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Fault Storm Report");
        println!("==================");
        println!();
        println!("Clients: {clients}");
        println!("Faults per client: {faults}");
        println!();
        println!("Violations recorded: {}", stats.violations_recorded);
        println!("Breaker trips: {}", stats.breaker_trips);
        println!("Actions:");
        println!("  halt:     {}", stats.actions.halts);
        println!("  retry:    {}", stats.actions.retries);
        println!("  continue: {}", stats.actions.continues);
        println!("  escalate: {}", stats.actions.escalations);
        println!("  fallback: {}", stats.actions.fallbacks);
        println!();
        println!(
            "Registry: {} scopes, {} sources, {} routed, {} sunk",
            snapshot.scopes, snapshot.sources, snapshot.resolved, snapshot.sunk
        );
    }

    Ok(())
}

fn sample_fault(seed: u64) -> Fault {
    let message = format!("simulated fault {seed}");
    match seed % 6 {
        0 => Fault::Network(message),
        1 => Fault::Validation(message),
        2 => Fault::Persistence(message),
        3 => Fault::Client(message),
        4 => Fault::Capability(message),
        _ => Fault::Unknown(message),
    }
}

fn print_table() {
    let samples = [
        Fault::Validation(String::new()),
        Fault::Navigation(String::new()),
        Fault::Context(String::new()),
        Fault::Capability(String::new()),
        Fault::Persistence(String::new()),
        Fault::Client(String::new()),
        Fault::Device(String::new()),
        Fault::Network(String::new()),
        Fault::Unknown(String::new()),
    ];

    println!("Static suggestion table");
    println!("=======================");
    for fault in samples {
        println!(
            "  {:<12} -> {}",
            fault.kind(),
            StaticInteractionPort::suggestion(&fault)
        );
    }
}
