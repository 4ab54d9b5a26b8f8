use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use voxtrace::{AppConfig, Deck};
use voxtrace_core::{ComputeContext, CpuReferenceEngine, CrossSectionTable, TransportEngine};
use voxtrace_physics::MaterialDatabase;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Simulation deck (RON)
    #[arg(required_unless_present_any = ["list_devices", "list_elements", "list_processes"])]
    deck: Option<PathBuf>,

    /// Device index to bind the compute context to
    #[arg(long)]
    context: Option<u32>,

    /// Log verbosity, 0 (warnings) to 3 (everything)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=3))]
    verbosity: Option<u8>,

    /// Random seed, overrides the deck and config file
    #[arg(long)]
    seed: Option<u32>,

    /// Validate and initialize the deck without running it
    #[arg(long)]
    dry_run: bool,

    /// List available compute devices
    #[arg(long)]
    list_devices: bool,

    /// List chemical elements usable in material tables
    #[arg(long)]
    list_elements: bool,

    /// List the deck's materials with their derived properties
    #[arg(long)]
    list_materials: bool,

    /// List available physics processes
    #[arg(long)]
    list_processes: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = AppConfig::load()?;
    if let Some(context) = args.context {
        config.compute.context_index = context;
    }
    if let Some(verbosity) = args.verbosity {
        config.logging.verbosity = verbosity;
    }
    if let Some(seed) = args.seed {
        config.simulation.seed = Some(seed);
    }

    env_logger::Builder::new()
        .filter_level(config.logging.level_filter())
        .parse_default_env()
        .init();

    let engine: Arc<dyn TransportEngine> =
        Arc::new(CpuReferenceEngine::new(config.compute.device_count));

    if args.list_devices {
        let compute = ComputeContext::new(engine);
        for (index, name) in compute.devices()?.iter().enumerate() {
            println!("{index}: {name}");
        }
        return Ok(());
    }
    if args.list_elements || args.list_processes {
        if args.list_elements {
            for element in MaterialDatabase::available_elements() {
                println!(
                    "{:>3} {} ({} g/mol)",
                    element.atomic_number, element.name, element.molar_mass
                );
            }
        }
        if args.list_processes {
            for (process, particle) in CrossSectionTable::available_processes() {
                println!("{process} ({particle})");
            }
        }
        return Ok(());
    }

    let deck_path = args.deck.context("No deck given")?;
    let deck = Deck::from_file(&deck_path)?;

    if args.list_materials {
        for properties in voxtrace::material_catalogue(&deck)? {
            println!("{properties}");
        }
        return Ok(());
    }
    log::info!("Starting voxtrace with deck '{}'", deck.name);

    let mut sim = voxtrace::prepare_simulation(&deck, &config, engine)?;

    if args.dry_run {
        println!("Deck '{}' is valid (seed {:?})", deck.name, sim.seed());
        sim.release_context();
        return Ok(());
    }

    let report = sim.run()?;
    if let Ok(memory) = sim.compute().report_memory_usage() {
        log::info!("{memory}");
    }
    println!(
        "{}",
        ron::ser::to_string_pretty(&report, ron::ser::PrettyConfig::default())
            .context("Failed to serialize run report")?
    );
    sim.release_context();
    Ok(())
}
