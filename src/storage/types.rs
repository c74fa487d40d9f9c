//! Value types exchanged through the record's by-name accessors.

use crate::simulation::Population;
use ndarray::{Array, ArrayD, Dimension};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One value per locus class: survival, reproduction, neutral and all loci.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ByClass<T> {
    pub s: T,
    pub r: T,
    pub n: T,
    pub a: T,
}

/// Containers whose entries are addressed by a short tag.
pub trait Tagged<T> {
    fn slot_mut(&mut self, tag: &str) -> Option<&mut T>;
}

impl<T> ByClass<T> {
    /// Entries keyed by class tag, in tag order.
    pub fn entries(&self) -> [(&'static str, &T); 4] {
        [("a", &self.a), ("n", &self.n), ("r", &self.r), ("s", &self.s)]
    }
}

impl<T> Tagged<T> for ByClass<T> {
    fn slot_mut(&mut self, tag: &str) -> Option<&mut T> {
        match tag {
            "s" => Some(&mut self.s),
            "r" => Some(&mut self.r),
            "n" => Some(&mut self.n),
            "a" => Some(&mut self.a),
            _ => None,
        }
    }
}

/// One value per trait: survival and reproduction.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ByTrait<T> {
    pub surv: T,
    pub repr: T,
}

impl<T> ByTrait<T> {
    pub fn entries(&self) -> [(&'static str, &T); 2] {
        [("repr", &self.repr), ("surv", &self.surv)]
    }
}

impl<T> Tagged<T> for ByTrait<T> {
    fn slot_mut(&mut self, tag: &str) -> Option<&mut T> {
        match tag {
            "surv" => Some(&mut self.surv),
            "repr" => Some(&mut self.repr),
            _ => None,
        }
    }
}

/// A value read from or written to a record by key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RecordValue {
    Flag(bool),
    Count(usize),
    Float(f64),
    Labels(Vec<usize>),
    Array(ArrayD<f64>),
    /// Arrays keyed by locus class or trait
    Nested(BTreeMap<String, ArrayD<f64>>),
    Windows(BTreeMap<String, usize>),
    Snapshots(Vec<Option<Population>>),
}

impl RecordValue {
    pub fn as_array(&self) -> Option<&ArrayD<f64>> {
        match self {
            RecordValue::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_nested(&self) -> Option<&BTreeMap<String, ArrayD<f64>>> {
        match self {
            RecordValue::Nested(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_count(&self) -> Option<usize> {
        match self {
            RecordValue::Count(c) => Some(*c),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            RecordValue::Float(f) => Some(*f),
            RecordValue::Count(c) => Some(*c as f64),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            RecordValue::Flag(b) => Some(*b),
            _ => None,
        }
    }

    /// Whether this is a scalar that may live in the extension map.
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            RecordValue::Flag(_) | RecordValue::Count(_) | RecordValue::Float(_)
        )
    }
}

impl<D: Dimension> From<Array<f64, D>> for RecordValue {
    fn from(a: Array<f64, D>) -> Self {
        RecordValue::Array(a.into_dyn())
    }
}

impl From<bool> for RecordValue {
    fn from(b: bool) -> Self {
        RecordValue::Flag(b)
    }
}

impl From<usize> for RecordValue {
    fn from(c: usize) -> Self {
        RecordValue::Count(c)
    }
}

impl From<f64> for RecordValue {
    fn from(f: f64) -> Self {
        RecordValue::Float(f)
    }
}

impl From<Vec<usize>> for RecordValue {
    fn from(v: Vec<usize>) -> Self {
        RecordValue::Labels(v)
    }
}

impl<D: Dimension> From<&ByClass<Array<f64, D>>> for RecordValue {
    fn from(c: &ByClass<Array<f64, D>>) -> Self {
        RecordValue::Nested(
            c.entries()
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.clone().into_dyn()))
                .collect(),
        )
    }
}

impl<D: Dimension> From<&ByTrait<Array<f64, D>>> for RecordValue {
    fn from(t: &ByTrait<Array<f64, D>>) -> Self {
        RecordValue::Nested(
            t.entries()
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.clone().into_dyn()))
                .collect(),
        )
    }
}

/// Lifecycle of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RecordPhase {
    #[default]
    Accumulating,
    Finalised,
}
