//! Genome-level evolutionary operators.
//!
//! - **Mutation**: asymmetric per-bit flips
//! - **Recombination**: per-locus crossover between homologous chromosomes
//! - **Assortment**: one chromosome from each parent forms an offspring

pub mod mutation;
pub mod recombination;

pub use mutation::MutationModel;
pub use recombination::{assort, RecombinationModel};
