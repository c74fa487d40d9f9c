//! Simulation engine and population management.
//!
//! This module provides the configuration, the population and its
//! demographic operations, the per-run stage loop and the multi-run driver.

pub mod builder;
pub mod engine;
pub mod parameters;
pub mod population;
pub mod run;

pub use builder::ConfigBuilder;
pub use engine::Simulation;
pub use parameters::{
    BitDistribution, Config, CrisisConfig, DemographyConfig, EvolutionConfig, ExecutionConfig,
    GenomeConfig, RecordingConfig, ReproductionMode, ResourceConfig, Snapshots, StarvationConfig,
};
pub use population::{make_genome, Population, PopulationParams};
pub use run::{Run, RunStatus};
