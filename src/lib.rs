//! AEGIS: an age-structured evolutionary simulator with bit-string genomes.
//!
//! Individuals carry two chromosomes of fixed-width bit loci. Survival loci
//! set the probability of surviving each age, reproduction loci the
//! probability of reproducing at each adult age, and neutral loci evolve
//! without selection as a baseline. A run steps a population through a
//! fixed number of stages of ageing, resource-limited reproduction and
//! death, recording demographic series and, at snapshot stages, the full
//! population for genotype and fitness statistics.

pub mod analysis;
pub mod errors;
pub mod evolution;
pub mod genome;
pub mod prelude;
pub mod simulation;
pub mod storage;

pub use errors::{ConfigError, PopulationError, RecordError, SimulationError};
pub use simulation::{Config, Population, Run, Simulation};
pub use storage::{AverageRecord, Record, RecordValue};
