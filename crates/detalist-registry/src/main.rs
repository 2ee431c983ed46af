//! `detalist-sim`: runs seeded workloads against an in-memory registry

use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, Command};
use detalist_registry::test_harness::{run_simulator, SimulatorConfig};
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("detalist-sim")
        .version(detalist_registry::VERSION)
        .about("Detalist item registry workload simulator")
        .subcommand_required(true)
        .subcommand(
            Command::new("simulate")
                .about("Run a seeded random workload and audit the result")
                .arg(
                    Arg::new("operations")
                        .long("operations")
                        .default_value("1000")
                        .value_parser(value_parser!(u64))
                        .help("Number of registry operations to run"),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .default_value("42")
                        .value_parser(value_parser!(u64))
                        .help("Random seed for reproducibility"),
                )
                .arg(
                    Arg::new("failure-ratio")
                        .long("failure-ratio")
                        .default_value("0.2")
                        .value_parser(parse_ratio)
                        .help("Share of deliberately invalid operations"),
                )
                .arg(
                    Arg::new("stop-on-violation")
                        .long("stop-on-violation")
                        .action(ArgAction::SetTrue)
                        .help("Stop simulation on first violation"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
}

fn parse_ratio(raw: &str) -> Result<f64, String> {
    let ratio: f64 = raw.parse().map_err(|e| format!("{e}"))?;
    if (0.0..=1.0).contains(&ratio) {
        Ok(ratio)
    } else {
        Err(format!("{ratio} is not between 0 and 1"))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let matches = cli().get_matches();
    let Some(("simulate", args)) = matches.subcommand() else {
        anyhow::bail!("unknown subcommand");
    };

    let defaults = SimulatorConfig::default();
    let config = SimulatorConfig {
        seed: args.get_one::<u64>("seed").copied().unwrap_or(defaults.seed),
        operations: args
            .get_one::<u64>("operations")
            .copied()
            .unwrap_or(defaults.operations),
        failure_ratio: args
            .get_one::<f64>("failure-ratio")
            .copied()
            .unwrap_or(defaults.failure_ratio),
        stop_on_first_violation: args.get_flag("stop-on-violation"),
        ..defaults
    };

    let report = run_simulator(config).await.context("simulation aborted")?;

    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.generate_text());
    }

    std::process::exit(if report.passed() { 0 } else { 1 });
}
