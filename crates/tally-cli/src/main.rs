use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;
use std::time::Duration;
use tally_cli::{init_logging, load_config, FileConfig, SimulateOverrides};
use tally_harness::{run_async_stress, run_probe, run_simulator, run_stress, CounterMode};

fn cli() -> Command {
    Command::new("tally")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Race-free shared counter harness")
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines on stderr"),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("simulate")
                .about("Run the seeded race simulator")
                .arg(
                    Arg::new("config")
                        .long("config")
                        .value_parser(value_parser!(PathBuf))
                        .help("TOML file with [simulator] and [counter] tables"),
                )
                .arg(
                    Arg::new("threads")
                        .long("threads")
                        .value_parser(value_parser!(usize))
                        .help("Number of worker threads"),
                )
                .arg(
                    Arg::new("ops")
                        .long("ops")
                        .value_parser(value_parser!(u64))
                        .help("Operations per worker"),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .value_parser(value_parser!(u64))
                        .help("Random seed for reproducibility"),
                )
                .arg(
                    Arg::new("dwell-us")
                        .long("dwell-us")
                        .value_parser(value_parser!(u64))
                        .help("Pause between read and write inside each step"),
                )
                .arg(
                    Arg::new("unguarded")
                        .long("unguarded")
                        .action(ArgAction::SetTrue)
                        .help("Drive the unguarded counter instead"),
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
        .subcommand(
            Command::new("stress")
                .about("N threads x M increments, timed")
                .arg(
                    Arg::new("threads")
                        .long("threads")
                        .default_value("50")
                        .value_parser(value_parser!(usize))
                        .help("Number of threads (or tasks with --async)"),
                )
                .arg(
                    Arg::new("iterations")
                        .long("iterations")
                        .default_value("1000")
                        .value_parser(value_parser!(usize))
                        .help("Increments per thread"),
                )
                .arg(
                    Arg::new("async")
                        .long("async")
                        .action(ArgAction::SetTrue)
                        .help("Use the async counter on tokio tasks"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(
            Command::new("probe")
                .about("Check that critical sections never overlap")
                .arg(
                    Arg::new("threads")
                        .long("threads")
                        .default_value("8")
                        .value_parser(value_parser!(usize))
                        .help("Number of threads"),
                )
                .arg(
                    Arg::new("dwell-us")
                        .long("dwell-us")
                        .default_value("2000")
                        .value_parser(value_parser!(u64))
                        .help("Pause between read and write"),
                )
                .arg(
                    Arg::new("unguarded")
                        .long("unguarded")
                        .action(ArgAction::SetTrue)
                        .help("Probe the unguarded counter instead"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    init_logging(matches.get_flag("log-json"))?;

    let passed = match matches.subcommand() {
        Some(("simulate", args)) => simulate(args)?,
        Some(("stress", args)) => stress(args).await?,
        Some(("probe", args)) => probe(args)?,
        _ => unreachable!("subcommand_required"),
    };

    std::process::exit(if passed { 0 } else { 1 });
}

fn mode_of(args: &ArgMatches) -> CounterMode {
    if args.get_flag("unguarded") {
        CounterMode::Unguarded
    } else {
        CounterMode::Guarded
    }
}

fn simulate(args: &ArgMatches) -> anyhow::Result<bool> {
    let file = match args.get_one::<PathBuf>("config") {
        Some(path) => load_config(path)?,
        None => FileConfig::default(),
    };
    let overrides = SimulateOverrides {
        seed: args.get_one::<u64>("seed").copied(),
        threads: args.get_one::<usize>("threads").copied(),
        ops_per_thread: args.get_one::<u64>("ops").copied(),
        dwell_us: args.get_one::<u64>("dwell-us").copied(),
        unguarded: args.get_flag("unguarded"),
        stop_on_violation: args.get_flag("stop-on-violation"),
    };
    let config = file.into_simulator(&overrides);

    let report = run_simulator(&config)?;

    if args.get_flag("json") {
        println!("{}", report.to_json()?);
    } else {
        println!("{}", report.generate_text());
    }
    Ok(report.passed())
}

async fn stress(args: &ArgMatches) -> anyhow::Result<bool> {
    let threads = *args.get_one::<usize>("threads").unwrap_or(&50);
    let iterations = *args.get_one::<usize>("iterations").unwrap_or(&1000);

    let report = if args.get_flag("async") {
        run_async_stress(threads, iterations).await?
    } else {
        run_stress(threads, iterations)?
    };

    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Stress Test Report:");
        println!("  Workers: {}", report.workers);
        println!("  Iterations: {}", report.iterations);
        println!("  Expected: {}", report.expected);
        println!("  Final Value: {}", report.final_value);
        println!("  Contended Acquisitions: {}", report.contended);
        println!("  Elapsed: {}ms ({:.0} ops/sec)", report.elapsed_ms, report.ops_per_sec);
        println!("  Success: {}", report.success);
    }
    Ok(report.success)
}

fn probe(args: &ArgMatches) -> anyhow::Result<bool> {
    let threads = *args.get_one::<usize>("threads").unwrap_or(&8);
    let dwell_us = *args.get_one::<u64>("dwell-us").unwrap_or(&2000);

    let report = run_probe(mode_of(args), threads, Duration::from_micros(dwell_us))?;

    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Mutual Exclusion Probe:");
        println!("  Mode: {:?}", report.mode);
        println!("  Threads: {}", report.threads);
        println!("  Dwell: {}us", report.dwell_us);
        println!("  Overlapping Entries: {}", report.overlaps);
        println!("  Max Concurrency: {}", report.max_concurrency);
        println!("  Lost Updates: {}", report.lost_updates());
        println!("  Status: {}", if report.passed() { "PASSED" } else { "FAILED" });
    }
    Ok(report.passed())
}
