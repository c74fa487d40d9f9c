//! Error types shared across the crate.

use thiserror::Error;

/// Errors raised while validating or loading a configuration.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid probability for {0}: {1} (must be between 0.0 and 1.0)")]
    InvalidProbability(&'static str, f64),
    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: &'static str, reason: String },
    #[error("Overlapping genome map offsets: {0}")]
    OverlappingOffsets(String),
    #[error("Snapshot stage {stage} outside run of {n_stages} stages")]
    SnapshotOutOfRange { stage: usize, n_stages: usize },
    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// Errors raised by population construction and manipulation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PopulationError {
    #[error("Per-individual vectors disagree: {ages} ages, {genomes} genomes, {generations} generations, {gentimes} gentimes")]
    LengthMismatch {
        ages: usize,
        genomes: usize,
        generations: usize,
        gentimes: usize,
    },
    #[error("Genome width {found} does not match chromosome layout (expected {expected})")]
    GenomeWidth { expected: usize, found: usize },
    #[error("Incompatible genome layouts: {0}")]
    IncompatibleLayout(String),
    #[error("Invalid mutation rate: {0}")]
    InvalidMutationRate(f64),
    #[error("Invalid recombination rate: {0}")]
    InvalidRecombinationRate(f64),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Errors raised by the statistics record.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RecordError {
    #[error("Unknown record key: {0}")]
    UnknownKey(String),
    #[error("Record key {0} is fixed by the genome layout")]
    ReadOnly(String),
    #[error("Record key {0} does not hold a numeric series")]
    NotASeries(String),
    #[error("Window size must be non-negative, got {0}")]
    NegativeWindow(i64),
    #[error("Type mismatch for record key {key}: expected {expected}")]
    TypeMismatch { key: String, expected: &'static str },
    #[error("Index {index} out of range for {what} (len = {len})")]
    OutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },
    #[error("Shape error: {0}")]
    Shape(String),
}

impl From<ndarray::ShapeError> for RecordError {
    fn from(e: ndarray::ShapeError) -> Self {
        RecordError::Shape(e.to_string())
    }
}

/// Top-level error for runs and simulations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimulationError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Population(#[from] PopulationError),
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error("Run {0} has already completed")]
    RunComplete(usize),
    #[error("Expected {expected} seed populations, got {found}")]
    SeedCount { expected: usize, found: usize },
    #[error("RNG state error: {0}")]
    RngState(String),
}
