use biosim_common::{CHEMOSTAT_BULK, SoluteIndex};
use biosim_kernel::{Protocol, SimContext, World, WorldError};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "biosim-cli", about = "CLI tool for biosim protocols")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version info
    Info,
    /// Build the world from a protocol file and report on it
    Inspect {
        /// Path to the YAML protocol file
        protocol: PathBuf,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Step every bulk at the global time constraint
    Run {
        /// Path to the YAML protocol file
        protocol: PathBuf,
        /// Number of steps to take
        #[arg(short, long, default_value = "10")]
        steps: u64,
    },
}

#[derive(Debug, Serialize)]
struct BulkReport {
    name: String,
    constant: bool,
    dilution_rate: f64,
    time_constraint: f64,
    concentrations: BTreeMap<String, f64>,
}

#[derive(Debug, Serialize)]
struct DomainReport {
    name: String,
    grid: [u32; 3],
    resolution: f64,
    is_3d: bool,
    bulk: Option<String>,
}

#[derive(Debug, Serialize)]
struct WorldReport {
    chemostat: bool,
    bulks: Vec<BulkReport>,
    domains: Vec<DomainReport>,
    diagnostics: Vec<String>,
    bulk_time_constraint: Option<f64>,
    max_bulk_values: BTreeMap<String, f64>,
}

fn build_world(protocol: &Protocol) -> (SimContext, World, Vec<String>) {
    let ctx = protocol.context();
    let (world, report) = World::from_config(&ctx, protocol.world_root());
    let mut diagnostics: Vec<String> = report.diagnostics.iter().map(|d| d.to_string()).collect();

    if ctx.is_chemostat() && !world.contains_bulk(CHEMOSTAT_BULK) {
        tracing::warn!("chemostat scenario without a bulk named {CHEMOSTAT_BULK}");
        diagnostics.push(format!("chemostat scenario needs a bulk named {CHEMOSTAT_BULK}"));
    }
    for domain in world.domains() {
        if let Some(bulk) = domain.bulk() {
            if world.get_bulk(bulk).is_none() {
                diagnostics.push(format!(
                    "domain {} is linked to unknown bulk {bulk}",
                    domain.name()
                ));
            }
        }
    }
    (ctx, world, diagnostics)
}

fn solute_label(ctx: &SimContext, index: SoluteIndex) -> String {
    ctx.solutes()
        .name(index)
        .map(str::to_string)
        .unwrap_or_else(|| index.to_string())
}

/// Step every bulk at the global time constraint until `steps` are taken or
/// nothing is changing. Returns the number of steps taken.
fn run_world(world: &mut World, steps: u64) -> Result<u64, WorldError> {
    let mut elapsed = 0.0;
    for step in 1..=steps {
        if !world.bulks_changing() {
            println!("step {step}: bulks are steady, stopping");
            return Ok(step - 1);
        }
        let dt = world.bulk_time_constraint()?;
        if !dt.is_finite() {
            println!("step {step}: no bulk bounds the time step, stopping");
            return Ok(step - 1);
        }
        world.update_bulks(dt)?;
        elapsed += dt;
        let history = world.bulk_time_history();
        println!(
            "step {step}: t={elapsed} dt={} (previous {})",
            history.current, history.previous
        );
    }
    Ok(steps)
}

fn world_report(ctx: &SimContext, world: &mut World, diagnostics: Vec<String>) -> WorldReport {
    let solutes = ctx.solutes();
    let solute_name = |i| solute_label(ctx, i);

    let bulks = world
        .bulks()
        .iter()
        .map(|b| BulkReport {
            name: b.name().to_string(),
            constant: b.is_constant(),
            dilution_rate: b.dilution_rate(),
            time_constraint: b.time_constraint(),
            concentrations: b.solutes().map(|(i, s)| (solute_name(i), s.value)).collect(),
        })
        .collect();
    let domains = world
        .domains()
        .iter()
        .map(|d| DomainReport {
            name: d.name().to_string(),
            grid: d.grid().to_array(),
            resolution: d.resolution(),
            is_3d: d.is_3d(),
            bulk: d.bulk().map(str::to_string),
        })
        .collect();
    let max_bulk_values = solutes
        .indices()
        .map(|i| (solute_name(i), world.max_bulk_value(i)))
        .collect();

    WorldReport {
        chemostat: ctx.is_chemostat(),
        bulks,
        domains,
        diagnostics,
        bulk_time_constraint: world.bulk_time_constraint().ok(),
        max_bulk_values,
    }
}

fn print_report(report: &WorldReport) {
    println!("chemostat: {}", report.chemostat);
    println!("bulks: {}", report.bulks.len());
    for b in &report.bulks {
        println!(
            "  {} (D={}, constant={}, dt<={})",
            b.name, b.dilution_rate, b.constant, b.time_constraint
        );
        for (solute, value) in &b.concentrations {
            println!("    {solute} = {value}");
        }
    }
    println!("domains: {}", report.domains.len());
    for d in &report.domains {
        let [i, j, k] = d.grid;
        println!(
            "  {} ({i}x{j}x{k} @ {}, {}){}",
            d.name,
            d.resolution,
            if d.is_3d { "3D" } else { "2D" },
            d.bulk
                .as_ref()
                .map(|b| format!(" -> {b}"))
                .unwrap_or_default()
        );
    }
    match report.bulk_time_constraint {
        Some(t) => println!("bulk time constraint: {t}"),
        None => println!("bulk time constraint: n/a (no bulks)"),
    }
    for (solute, max) in &report.max_bulk_values {
        println!("max bulk {solute}: {max}");
    }
    for diag in &report.diagnostics {
        println!("diagnostic: {diag}");
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            println!("biosim-cli v{}", env!("CARGO_PKG_VERSION"));
        }
        Commands::Inspect { protocol, json } => {
            let protocol = Protocol::load(&protocol)?;
            let (ctx, mut world, diagnostics) = build_world(&protocol);
            let report = world_report(&ctx, &mut world, diagnostics);
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
        }
        Commands::Run { protocol, steps } => {
            let protocol = Protocol::load(&protocol)?;
            let (ctx, mut world, diagnostics) = build_world(&protocol);
            for diag in &diagnostics {
                println!("diagnostic: {diag}");
            }
            let taken = run_world(&mut world, steps)?;
            println!("took {taken} of {steps} steps");
            for i in ctx.solutes().indices() {
                println!("{}: {:?}", solute_label(&ctx, i), world.all_bulk_values(i));
            }
        }
    }

    Ok(())
}
