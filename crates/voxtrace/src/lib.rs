//! # voxtrace - deck-driven Monte-Carlo transport runs
//!
//! Loads a simulation deck, configures a [`Simulation`] from it and dispatches
//! the run to the transport engine.

pub mod config;
pub mod deck;

use std::sync::Arc;

use anyhow::{Context, Result};

use voxtrace_core::{Simulation, TransportEngine};
use voxtrace_physics::{MaterialDatabase, MaterialProperties};

pub use config::AppConfig;
pub use deck::Deck;

/// Build and initialize a simulation from a deck
///
/// The configured seed, when set, overrides the deck's.
pub fn prepare_simulation(
    deck: &Deck,
    config: &AppConfig,
    engine: Arc<dyn TransportEngine>,
) -> Result<Simulation> {
    let mut sim = Simulation::new(engine);
    sim.set_verbosity_level(config.logging.verbosity);
    sim.compute_mut()?
        .select_context(config.compute.context_index)
        .context("Failed to select compute context")?;

    deck.apply(&mut sim)?;
    if let Some(seed) = config.simulation.seed {
        sim.set_seed(seed)?;
    }

    sim.initialize()
        .with_context(|| format!("Failed to initialize deck '{}'", deck.name))?;
    Ok(sim)
}

/// Properties of every material in the deck's material table, by name
pub fn material_catalogue(deck: &Deck) -> Result<Vec<MaterialProperties>> {
    let mut materials = MaterialDatabase::new();
    materials
        .load(&deck.materials)
        .with_context(|| format!("Failed to load {}", deck.materials.display()))?;
    materials
        .names()
        .map(|name| Ok(materials.material_properties(name)?))
        .collect()
}
