//! # Marker Catalogs
//!
//! Pre-scan of one VCF input: the ordered marker list inside the run
//! interval, with by-identifier and by-position lookup. Duplicate markers,
//! duplicate identifiers, and out-of-order positions are input-integrity
//! errors that halt the run.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tracing::info_span;

use crate::config::ChromInterval;
use crate::data::marker::Marker;
use crate::data::ChromIdx;
use crate::error::{ReformError, Result};
use crate::io::vcf::VcfReader;

/// Ordered markers from one input file
#[derive(Clone, Debug, Default)]
pub struct MarkerCatalog {
    markers: Vec<Marker>,
    index: HashMap<Marker, usize>,
}

impl MarkerCatalog {
    /// Scan a VCF file, collecting every marker inside the interval
    pub fn scan(path: &Path, interval: &ChromInterval, chrom: ChromIdx) -> Result<Self> {
        info_span!("catalog_scan", path = ?path).in_scope(|| {
            let mut reader = VcfReader::open(path, interval.clone(), chrom)?;
            let mut catalog = Self::default();
            let mut prev_pos = 0u32;
            while let Some(rec) = reader.next_record()? {
                let marker = rec.marker().clone();
                if marker.pos < prev_pos {
                    return Err(ReformError::invalid_data(format!(
                        "marker positions out of order [{}]: {} after {}",
                        path.display(),
                        marker.pos,
                        prev_pos
                    )));
                }
                prev_pos = marker.pos;
                catalog.push(marker).map_err(|_| {
                    ReformError::invalid_data(format!(
                        "duplicate marker [{}] at position {}",
                        path.display(),
                        prev_pos
                    ))
                })?;
            }
            Ok(catalog)
        })
    }

    fn push(&mut self, marker: Marker) -> Result<()> {
        let idx = self.markers.len();
        if self.index.insert(marker.clone(), idx).is_some() {
            return Err(ReformError::invalid_data(format!(
                "duplicate marker at position {}",
                marker.pos
            )));
        }
        self.markers.push(marker);
        Ok(())
    }

    /// Number of markers
    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// Marker at a catalog index
    pub fn marker(&self, idx: usize) -> &Marker {
        &self.markers[idx]
    }

    /// Catalog index of a marker, if present
    pub fn index_of(&self, marker: &Marker) -> Option<usize> {
        self.index.get(marker).copied()
    }

    /// Iterate over markers in file order
    pub fn iter(&self) -> impl Iterator<Item = &Marker> {
        self.markers.iter()
    }

    /// Map from each identifier to the index of the marker carrying it.
    ///
    /// Fails if two markers share an identifier.
    pub fn id_map(&self) -> Result<HashMap<Arc<str>, usize>> {
        let mut map = HashMap::with_capacity(self.markers.len());
        for (idx, marker) in self.markers.iter().enumerate() {
            for id in &marker.ids {
                if let Some(prev) = map.insert(Arc::clone(id), idx) {
                    return Err(ReformError::invalid_data(format!(
                        "non-unique marker ID {} at positions {} and {}",
                        id, self.markers[prev].pos, marker.pos
                    )));
                }
            }
        }
        Ok(map)
    }

    /// Map from each position to the indices of the markers at that position
    pub fn pos_map(&self) -> HashMap<u32, Vec<usize>> {
        let mut map: HashMap<u32, Vec<usize>> = HashMap::with_capacity(self.markers.len());
        for (idx, marker) in self.markers.iter().enumerate() {
            map.entry(marker.pos).or_default().push(idx);
        }
        map
    }

    #[cfg(test)]
    pub(crate) fn from_markers(markers: Vec<Marker>) -> Result<Self> {
        let mut catalog = Self::default();
        for marker in markers {
            catalog.push(marker)?;
        }
        Ok(catalog)
    }
}
