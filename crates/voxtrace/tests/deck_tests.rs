//! Integration tests for running simulation decks end to end
//!
//! These load the bundled sample deck, redirect its outputs to a temporary
//! directory and drive it through the CPU reference engine.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use voxtrace::config::{AppConfig, SimulationConfig};
use voxtrace::deck::PrimitiveDeck;
use voxtrace::{Deck, material_catalogue, prepare_simulation};
use voxtrace_core::phantom::{VoxelDataType, VoxelImage};
use voxtrace_core::{CpuReferenceEngine, Lifecycle, RunStatus, SimError, TransportEngine};
use voxtrace_physics::UnitValue;

fn sample_deck_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../decks/tube.ron")
}

/// The sample deck with its phantom written under `dir`
fn sample_deck(dir: &Path) -> Deck {
    let mut deck = Deck::from_file(sample_deck_path()).unwrap();
    let phantom = deck.phantom.as_mut().unwrap();
    phantom.image_file = dir.join("phantom.mhd");
    phantom.range_file = dir.join("range_phantom.txt");
    deck.sources[0].particles = 10_000;
    deck
}

fn engine() -> Arc<dyn TransportEngine> {
    Arc::new(CpuReferenceEngine::new(2))
}

// ============================================================================
// Sample deck
// ============================================================================

#[test]
fn test_sample_deck_runs() {
    let dir = tempfile::tempdir().unwrap();
    let deck = sample_deck(dir.path());

    let mut sim = prepare_simulation(&deck, &AppConfig::default(), engine()).unwrap();
    assert_eq!(sim.lifecycle(), Lifecycle::Initialized);
    assert_eq!(sim.seed(), Some(42));
    assert_eq!(sim.geometry().names().collect::<Vec<_>>(), vec!["phantom"]);
    assert_eq!(sim.cross_sections().bin_count(), 128);

    let report = sim.run().unwrap();
    assert_eq!(sim.lifecycle(), Lifecycle::Finished(RunStatus::Succeeded));
    assert_eq!(report.primaries, 10_000);
    assert_eq!(report.navigators, 1);
    assert!(report.mean_primary_energy_mev > 0.02 && report.mean_primary_energy_mev < 0.08);
    assert!(sim.compute().report_memory_usage().unwrap().allocated_bytes > 0);
}

#[test]
fn test_sample_phantom_contents() {
    let dir = tempfile::tempdir().unwrap();
    let deck = sample_deck(dir.path());
    let files = deck.phantom.as_ref().unwrap().build().unwrap();

    let image = VoxelImage::read(&files.image_file).unwrap();
    assert_eq!(image.dimensions, [64, 64, 64]);
    assert_eq!(image.data_type, VoxelDataType::UChar);
    assert_eq!(std::fs::metadata(&files.raw_file).unwrap().len(), 64 * 64 * 64);
    // Bone sphere drawn after the tube, centered at z = +8 mm
    assert_eq!(image.get(32, 32, 40), Some(2.0));
    assert_eq!(image.get(32, 32, 32), Some(1.0));
    assert_eq!(image.get(0, 0, 0), Some(0.0));

    let range = std::fs::read_to_string(&files.range_file).unwrap();
    assert_eq!(range, "0 0 Air\n1 1 Water\n2 2 Bone\n");
}

#[test]
fn test_config_seed_overrides_deck() {
    let dir = tempfile::tempdir().unwrap();
    let deck = sample_deck(dir.path());
    let config = AppConfig {
        simulation: SimulationConfig { seed: Some(7) },
        ..AppConfig::default()
    };

    let sim = prepare_simulation(&deck, &config, engine()).unwrap();
    assert_eq!(sim.seed(), Some(7));
}

#[test]
fn test_same_deck_same_report() {
    let dir = tempfile::tempdir().unwrap();
    let run = |sub: &str| {
        let deck = sample_deck(&dir.path().join(sub));
        let mut sim = prepare_simulation(&deck, &AppConfig::default(), engine()).unwrap();
        sim.run().unwrap()
    };
    assert_eq!(run("a"), run("b"));
}

#[test]
fn test_material_catalogue_of_sample_deck() {
    let deck = Deck::from_file(sample_deck_path()).unwrap();
    let catalogue = material_catalogue(&deck).unwrap();
    let names: Vec<_> = catalogue.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["Air", "Bone", "Lead", "Vacuum", "Water"]);

    let water = catalogue.iter().find(|m| m.name == "Water").unwrap();
    let lead = catalogue.iter().find(|m| m.name == "Lead").unwrap();
    assert!(lead.density > water.density);
    assert!(lead.radiation_length < water.radiation_length);
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_context_out_of_range() {
    let dir = tempfile::tempdir().unwrap();
    let deck = sample_deck(dir.path());
    let mut config = AppConfig::default();
    config.compute.context_index = 5;

    let err = prepare_simulation(&deck, &config, engine()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<SimError>(),
        Some(SimError::InvalidContextIndex { index: 5, available: 2 })
    ));
}

#[test]
fn test_unknown_phantom_material_fails_initialize() {
    let dir = tempfile::tempdir().unwrap();
    let mut deck = sample_deck(dir.path());
    deck.phantom
        .as_mut()
        .unwrap()
        .primitives
        .push(PrimitiveDeck::Sphere {
            radius: UnitValue::mm(2.0),
            label: 3.0,
            material: "Kryptonite".to_string(),
            position: None,
        });

    let err = prepare_simulation(&deck, &AppConfig::default(), engine()).unwrap_err();
    let sim_err = err.downcast_ref::<SimError>().unwrap();
    assert!(matches!(
        sim_err,
        SimError::UnknownMaterial { material } if material == "Kryptonite"
    ));
}

#[test]
fn test_cut_for_unknown_navigator_fails_initialize() {
    let dir = tempfile::tempdir().unwrap();
    let mut deck = sample_deck(dir.path());
    deck.cuts[1].scope = "head".to_string();

    let err = prepare_simulation(&deck, &AppConfig::default(), engine()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<SimError>(),
        Some(SimError::UnknownNavigator(name)) if name == "head"
    ));
}

#[test]
fn test_material_catalogue_needs_the_table() {
    let dir = tempfile::tempdir().unwrap();
    let mut deck = sample_deck(dir.path());
    deck.materials = dir.path().join("missing.dat");
    let err = material_catalogue(&deck).unwrap_err();
    assert!(err.to_string().contains("Failed to load"));
}
