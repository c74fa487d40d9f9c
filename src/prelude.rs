//! Commonly used imports for convenience.
//!
//! # Example
//!
//! ```
//! use aegis::prelude::*;
//!
//! let config = ConfigBuilder::new().stages(10).lifespan(10, 3).build().unwrap();
//! let genmap = config.genome_map().unwrap();
//! assert_eq!(genmap.len(), 10 + 7 + 10);
//! ```

pub use crate::errors::{ConfigError, PopulationError, RecordError, SimulationError};
pub use crate::genome::{GenomeMap, LocusType};
pub use crate::simulation::{
    Config, ConfigBuilder, Population, ReproductionMode, Run, RunStatus, Simulation, Snapshots,
};
pub use crate::storage::{AverageRecord, Record, RecordValue};
