//! Genome layout and genotype decoding.

pub mod codec;
pub mod map;

pub use codec::{locus_state, locus_states, n_states, probability_table, state_to_probability};
pub use map::{GenomeMap, LocusType};
