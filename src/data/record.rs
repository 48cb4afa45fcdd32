//! # Genotype Records
//!
//! Per-marker genotype data: one allele byte per haplotype slot plus a
//! per-sample phased flag. Records are immutable after construction.

use crate::data::marker::Marker;
use crate::error::{ReformError, Result};

/// Sentinel allele byte for missing data
pub const MISSING_ALLELE: u8 = 255;

/// Genotypes for one marker over a fixed sample list.
///
/// For `n` samples the record holds `2n` allele bytes; sample `s` owns
/// haplotype slots `2s` and `2s + 1`.
#[derive(Clone, Debug, PartialEq)]
pub struct GtRecord {
    marker: Marker,
    alleles: Vec<u8>,
    phased: Vec<bool>,
}

impl GtRecord {
    /// Create a record; `alleles.len()` must equal `2 * phased.len()`
    pub fn new(marker: Marker, alleles: Vec<u8>, phased: Vec<bool>) -> Result<Self> {
        if alleles.len() != 2 * phased.len() {
            return Err(ReformError::invalid_data(format!(
                "genotype record with {} haplotypes for {} samples",
                alleles.len(),
                phased.len()
            )));
        }
        Ok(Self {
            marker,
            alleles,
            phased,
        })
    }

    /// The marker this record belongs to
    pub fn marker(&self) -> &Marker {
        &self.marker
    }

    /// Number of samples
    pub fn n_samples(&self) -> usize {
        self.phased.len()
    }

    /// Number of haplotype slots (`2 * n_samples`)
    pub fn n_haps(&self) -> usize {
        self.alleles.len()
    }

    /// Allele byte for a haplotype slot (`MISSING_ALLELE` if missing)
    pub fn allele(&self, hap: usize) -> u8 {
        self.alleles[hap]
    }

    /// First allele of a sample
    pub fn allele1(&self, sample: usize) -> u8 {
        self.alleles[2 * sample]
    }

    /// Second allele of a sample
    pub fn allele2(&self, sample: usize) -> u8 {
        self.alleles[2 * sample + 1]
    }

    /// Whether the sample's genotype is phased
    pub fn is_phased(&self, sample: usize) -> bool {
        self.phased[sample]
    }

    /// Restrict the record to the given sample indices, in order.
    ///
    /// Used to derive the sample-filtered view of a target record from the
    /// unfiltered record read from disk.
    pub fn restrict(&self, keep: &[usize]) -> GtRecord {
        let mut alleles = Vec::with_capacity(2 * keep.len());
        let mut phased = Vec::with_capacity(keep.len());
        for &s in keep {
            alleles.push(self.alleles[2 * s]);
            alleles.push(self.alleles[2 * s + 1]);
            phased.push(self.phased[s]);
        }
        GtRecord {
            marker: self.marker.clone(),
            alleles,
            phased,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::marker::Allele;
    use crate::data::ChromIdx;

    fn test_marker() -> Marker {
        Marker::new(
            ChromIdx(0),
            500,
            vec![],
            Allele::from_char('A'),
            vec![Allele::from_char('G')],
        )
    }

    #[test]
    fn test_accessors() {
        let rec = GtRecord::new(
            test_marker(),
            vec![0, 1, MISSING_ALLELE, MISSING_ALLELE, 1, 1],
            vec![true, false, true],
        )
        .unwrap();
        assert_eq!(rec.n_samples(), 3);
        assert_eq!(rec.n_haps(), 6);
        assert_eq!(rec.allele1(0), 0);
        assert_eq!(rec.allele2(0), 1);
        assert_eq!(rec.allele1(1), MISSING_ALLELE);
        assert!(rec.is_phased(0));
        assert!(!rec.is_phased(1));
    }

    #[test]
    fn test_restrict_keeps_order() {
        let rec = GtRecord::new(
            test_marker(),
            vec![0, 0, 0, 1, 1, 1],
            vec![true, true, false],
        )
        .unwrap();
        let sub = rec.restrict(&[2, 0]);
        assert_eq!(sub.n_samples(), 2);
        assert_eq!((sub.allele1(0), sub.allele2(0)), (1, 1));
        assert_eq!((sub.allele1(1), sub.allele2(1)), (0, 0));
        assert!(!sub.is_phased(0));
        assert!(sub.is_phased(1));
        assert_eq!(sub.marker(), rec.marker());
    }

    #[test]
    fn test_hap_count_mismatch_rejected() {
        let err = GtRecord::new(test_marker(), vec![0, 1, 0], vec![true]);
        assert!(err.is_err());
    }
}
