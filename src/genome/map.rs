//! Genome map: the ordered list of locus labels carried by every chromosome.
//!
//! Labels encode both the locus type and the age it controls:
//! survival loci are labelled `0..max_ls`, reproduction loci
//! `repr_offset + age` for `age` in `maturity..max_ls`, and neutral loci
//! `neut_offset + i` for `i` in `0..n_neutral`. The physical order of the
//! labels along the chromosome is shuffled once per run; statistics are
//! always reported in label order.

use crate::errors::ConfigError;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kind of trait a locus encodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LocusType {
    Survival,
    Reproduction,
    Neutral,
}

/// Ordered locus labels plus the offsets needed to classify them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenomeMap {
    labels: Vec<usize>,
    repr_offset: usize,
    neut_offset: usize,
    /// Chromosome position of each label.
    positions: BTreeMap<usize, usize>,
}

impl GenomeMap {
    /// Build the canonical (unshuffled) map.
    pub fn new(
        max_ls: usize,
        maturity: usize,
        n_neutral: usize,
        repr_offset: usize,
        neut_offset: usize,
    ) -> Result<Self, ConfigError> {
        if repr_offset < max_ls {
            return Err(ConfigError::OverlappingOffsets(format!(
                "repr_offset {repr_offset} < max_ls {max_ls}"
            )));
        }
        let repr_end = repr_offset.checked_add(max_ls).ok_or_else(|| {
            ConfigError::OverlappingOffsets(format!("repr_offset {repr_offset} overflows"))
        })?;
        if neut_offset < repr_end {
            return Err(ConfigError::OverlappingOffsets(format!(
                "neut_offset {neut_offset} < repr_offset + max_ls {repr_end}"
            )));
        }
        if neut_offset.checked_add(n_neutral).is_none() {
            return Err(ConfigError::OverlappingOffsets(format!(
                "neut_offset {neut_offset} overflows"
            )));
        }
        let labels = (0..max_ls)
            .chain((maturity..max_ls).map(|a| repr_offset + a))
            .chain((0..n_neutral).map(|i| neut_offset + i))
            .collect();
        Ok(Self::from_labels(labels, repr_offset, neut_offset))
    }

    /// Wrap an explicit label order (e.g. one adopted from a seed population).
    pub fn from_labels(labels: Vec<usize>, repr_offset: usize, neut_offset: usize) -> Self {
        let mut map = Self {
            labels,
            repr_offset,
            neut_offset,
            positions: BTreeMap::new(),
        };
        map.reindex();
        map
    }

    fn reindex(&mut self) {
        self.positions = self
            .labels
            .iter()
            .enumerate()
            .map(|(pos, &label)| (label, pos))
            .collect();
    }

    /// Number of loci per chromosome.
    #[inline]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Labels in physical order.
    #[inline]
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    pub fn repr_offset(&self) -> usize {
        self.repr_offset
    }

    pub fn neut_offset(&self) -> usize {
        self.neut_offset
    }

    /// Chromosome position of a label.
    #[inline]
    pub fn position(&self, label: usize) -> Option<usize> {
        self.positions.get(&label).copied()
    }

    /// Classify a label.
    pub fn locus_type(&self, label: usize) -> LocusType {
        if label >= self.neut_offset {
            LocusType::Neutral
        } else if label >= self.repr_offset {
            LocusType::Reproduction
        } else {
            LocusType::Survival
        }
    }

    /// Positions that would sort the labels ascending.
    pub fn argsort(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.labels.len()).collect();
        order.sort_by_key(|&i| self.labels[i]);
        order
    }

    /// Positions of loci of one type, in label order.
    pub fn positions_of(&self, kind: LocusType) -> Vec<usize> {
        self.argsort()
            .into_iter()
            .filter(|&pos| self.locus_type(self.labels[pos]) == kind)
            .collect()
    }

    /// Randomise the physical order of the loci.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.labels.shuffle(rng);
        self.reindex();
    }
}
