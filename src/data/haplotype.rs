//! # Sample Definitions
//!
//! Sample identifier registry shared by readers and writers.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// A collection of samples
#[derive(Clone, Debug, Default)]
pub struct Samples {
    /// Sample IDs in file column order
    ids: Vec<Arc<str>>,
    /// Map from sample ID to column index for fast lookup
    id_to_idx: HashMap<Arc<str>, usize>,
}

impl Samples {
    /// Create from sample ID strings
    pub fn from_ids(ids: Vec<String>) -> Self {
        let ids: Vec<Arc<str>> = ids.into_iter().map(Arc::from).collect();
        let id_to_idx = ids
            .iter()
            .enumerate()
            .map(|(i, id)| (Arc::clone(id), i))
            .collect();
        Self { ids, id_to_idx }
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// All sample IDs in column order
    pub fn ids(&self) -> &[Arc<str>] {
        &self.ids
    }

    /// Column index of a sample ID
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.id_to_idx.get(id).copied()
    }

    /// Column indices of the samples NOT named in `exclude`, in order.
    ///
    /// This is the mask used to derive the sample-filtered view of a record.
    pub fn retained_indices(&self, exclude: &HashSet<String>) -> Vec<usize> {
        self.ids
            .iter()
            .enumerate()
            .filter(|(_, id)| !exclude.contains(id.as_ref()))
            .map(|(i, _)| i)
            .collect()
    }

    /// A new `Samples` holding only the given column indices
    pub fn subset(&self, keep: &[usize]) -> Samples {
        Samples::from_ids(keep.iter().map(|&i| self.ids[i].to_string()).collect())
    }
}
