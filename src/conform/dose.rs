//! # Allele Dose Views
//!
//! For a chosen reference allele and one (possibly strand-flipped) genotype
//! record, an `AlleleDose` maps the record's allele indices onto the
//! reference marker's, tabulates the per-sample dose of the reference
//! allele, and counts observed copies of each reference allele.

use std::collections::HashMap;

use crate::data::marker::{Allele, Marker};
use crate::data::record::{GtRecord, MISSING_ALLELE};
use crate::error::{ReformError, Result};

/// Sentinel dose for samples with a missing genotype
pub const MISSING_DOSE: i8 = -1;

/// Dose and count view of one record against a reference marker
#[derive(Clone, Debug)]
pub struct AlleleDose {
    /// Map from record allele index to reference allele index
    allele_map: Vec<usize>,
    /// Record allele index carrying the chosen reference allele, if any
    record_allele: Option<usize>,
    /// Per-sample dose of the chosen reference allele (MISSING_DOSE if the
    /// sample's genotype is missing)
    dose: Vec<i8>,
    /// Observed copies of each reference allele over all non-missing
    /// haplotypes, indexed by reference allele
    counts: Vec<u32>,
}

impl AlleleDose {
    /// Build the view of `record` against `ref_marker`.
    ///
    /// With `flip` set, the record's marker is replaced by its strand
    /// complement before mapping; a flip that changes no allele is an
    /// inconsistent-data error, as is any record allele that is absent from
    /// the reference allele set.
    pub fn new(
        ref_marker: &Marker,
        ref_allele: usize,
        record: &GtRecord,
        flip: bool,
    ) -> Result<Self> {
        if ref_allele >= ref_marker.n_alleles() {
            return Err(ReformError::invalid_data(format!(
                "reference allele index {} out of range",
                ref_allele
            )));
        }
        let rec_marker = if flip {
            let flipped = record.marker().flip_strand();
            if flipped == *record.marker() {
                return Err(ReformError::invalid_data(
                    "inconsistent data: strand flip changes no alleles",
                ));
            }
            flipped
        } else {
            record.marker().clone()
        };

        let allele_map = allele_map(&rec_marker, ref_marker).ok_or_else(|| {
            ReformError::invalid_data(format!(
                "inconsistent data: alleles of {:?} are not a subset of {:?}",
                rec_marker, ref_marker
            ))
        })?;
        let record_allele = allele_map.iter().position(|&m| m == ref_allele);

        let mut dose = Vec::with_capacity(record.n_samples());
        for s in 0..record.n_samples() {
            let a1 = record.allele1(s);
            let a2 = record.allele2(s);
            if a1 == MISSING_ALLELE || a2 == MISSING_ALLELE {
                dose.push(MISSING_DOSE);
            } else {
                let target = record_allele.map(|a| a as u8);
                let d = (target == Some(a1)) as i8 + (target == Some(a2)) as i8;
                dose.push(d);
            }
        }

        let mut counts = vec![0u32; ref_marker.n_alleles()];
        for h in 0..record.n_haps() {
            let a = record.allele(h);
            if a != MISSING_ALLELE {
                counts[allele_map[a as usize]] += 1;
            }
        }

        Ok(Self {
            allele_map,
            record_allele,
            dose,
            counts,
        })
    }

    /// Number of samples in the view
    pub fn n_samples(&self) -> usize {
        self.dose.len()
    }

    /// Reference allele index for a record allele index
    pub fn mapped_allele(&self, record_allele: usize) -> usize {
        self.allele_map[record_allele]
    }

    /// Record allele index carrying the chosen reference allele
    pub fn record_allele(&self) -> Option<usize> {
        self.record_allele
    }

    /// Dose of the chosen reference allele for one sample
    pub fn dose(&self, sample: usize) -> i8 {
        self.dose[sample]
    }

    /// Observed copies of a reference allele
    pub fn count(&self, allele: usize) -> u32 {
        self.counts[allele]
    }

    /// Total non-missing haplotype alleles
    pub fn n_nonmissing_alleles(&self) -> u32 {
        self.counts.iter().sum()
    }

    /// Frequency of a reference allele, or NaN with no non-missing data
    pub fn allele_freq(&self, allele: usize) -> f64 {
        let den = self.n_nonmissing_alleles();
        if den == 0 {
            f64::NAN
        } else {
            f64::from(self.count(allele)) / f64::from(den)
        }
    }
}

/* maps every allele of `domain` to its index in `range`; None if an allele
is absent from `range` */
fn allele_map(domain: &Marker, range: &Marker) -> Option<Vec<usize>> {
    let range_map: HashMap<&Allele, usize> =
        range.alleles().enumerate().map(|(j, a)| (a, j)).collect();
    domain
        .alleles()
        .map(|a| range_map.get(a).copied())
        .collect()
}

/// Pearson correlation of two dose arrays over the samples where both doses
/// are non-missing. Returns 0.0 when either view is absent or the
/// correlation is undefined (no shared samples, or a constant array).
pub fn cor(x: Option<&AlleleDose>, y: Option<&AlleleDose>) -> f64 {
    let (x, y) = match (x, y) {
        (Some(x), Some(y)) => (x, y),
        _ => return 0.0,
    };
    assert_eq!(
        x.dose.len(),
        y.dose.len(),
        "inconsistent number of samples"
    );

    let mut cnt = 0i64;
    let mut sum_x = 0i64;
    let mut sum_y = 0i64;
    let mut sum_xx = 0i64;
    let mut sum_xy = 0i64;
    let mut sum_yy = 0i64;
    for (&dx, &dy) in x.dose.iter().zip(&y.dose) {
        if dx >= 0 && dy >= 0 {
            cnt += 1;
            let (vx, vy) = (i64::from(dx), i64::from(dy));
            sum_x += vx;
            sum_y += vy;
            sum_xx += vx * vx;
            sum_xy += vx * vy;
            sum_yy += vy * vy;
        }
    }
    if cnt == 0 || cnt * sum_xx == sum_x * sum_x || cnt * sum_yy == sum_y * sum_y {
        return 0.0;
    }
    let n = cnt as f64;
    let mean_x = sum_x as f64 / n;
    let mean_y = sum_y as f64 / n;
    let std_x = (sum_xx as f64 / n - mean_x * mean_x).sqrt();
    let std_y = (sum_yy as f64 / n - mean_y * mean_y).sqrt();
    let cov_xy = sum_xy as f64 / n - mean_x * mean_y;
    cov_xy / (std_x * std_y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ChromIdx;

    fn marker(alleles: &[&str]) -> Marker {
        Marker::new(
            ChromIdx(0),
            100,
            vec![],
            Allele::from_str(alleles[0]),
            alleles[1..].iter().map(|a| Allele::from_str(a)).collect(),
        )
    }

    fn record(marker: Marker, genotypes: &[(u8, u8)]) -> GtRecord {
        let mut alleles = Vec::new();
        for &(a1, a2) in genotypes {
            alleles.push(a1);
            alleles.push(a2);
        }
        GtRecord::new(marker, alleles, vec![true; genotypes.len()]).unwrap()
    }

    #[test]
    fn test_identity_view() {
        let m = marker(&["A", "G"]);
        let rec = record(m.clone(), &[(0, 0), (0, 1), (1, 1), (255, 255)]);
        let view = AlleleDose::new(&m, 0, &rec, false).unwrap();

        assert_eq!(view.record_allele(), Some(0));
        assert_eq!(
            (0..4).map(|s| view.dose(s)).collect::<Vec<_>>(),
            vec![2, 1, 0, MISSING_DOSE]
        );
        assert_eq!(view.count(0), 3);
        assert_eq!(view.count(1), 3);
        assert_eq!(view.n_nonmissing_alleles(), 6);
        assert!((view.allele_freq(0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_flipped_view_remaps_alleles() {
        // Reference A,G; record on the opposite strand as T,C
        let ref_m = marker(&["A", "G"]);
        let targ_m = marker(&["T", "C"]);
        let rec = record(targ_m, &[(0, 1), (1, 1)]);
        let view = AlleleDose::new(&ref_m, 0, &rec, true).unwrap();

        // Flipped record allele 0 (T->A) carries the reference allele
        assert_eq!(view.record_allele(), Some(0));
        assert_eq!(view.mapped_allele(0), 0);
        assert_eq!(view.mapped_allele(1), 1);
        assert_eq!(view.dose(0), 1);
        assert_eq!(view.dose(1), 0);
        assert_eq!(view.count(0), 1);
        assert_eq!(view.count(1), 3);
    }

    #[test]
    fn test_reversed_allele_order_maps() {
        // Record lists the same symbols with swapped ref/alt roles
        let ref_m = marker(&["A", "G"]);
        let targ_m = marker(&["G", "A"]);
        let rec = record(targ_m, &[(0, 1)]);
        let view = AlleleDose::new(&ref_m, 0, &rec, false).unwrap();
        assert_eq!(view.record_allele(), Some(1));
        assert_eq!(view.mapped_allele(0), 1);
        assert_eq!(view.dose(0), 1);
    }

    #[test]
    fn test_unmappable_alleles_fail() {
        let ref_m = marker(&["A", "G"]);
        let rec = record(marker(&["A", "C"]), &[(0, 1)]);
        assert!(AlleleDose::new(&ref_m, 0, &rec, false).is_err());
    }

    #[test]
    fn test_noop_flip_fails() {
        let ref_m = marker(&["AT", "ACG"]);
        let rec = record(marker(&["AT", "ACG"]), &[(0, 1)]);
        assert!(AlleleDose::new(&ref_m, 0, &rec, true).is_err());
    }

    #[test]
    fn test_absent_reference_allele() {
        // Record carries only the alternate allele symbol
        let ref_m = marker(&["A", "G"]);
        let targ_m = marker(&["G", "A"]);
        let rec = record(targ_m.clone(), &[(0, 0)]);
        let view = AlleleDose::new(&ref_m, 1, &rec, false).unwrap();
        assert_eq!(view.record_allele(), Some(0));

        // And a reference allele with no carrier in the record
        let view0 = AlleleDose::new(&ref_m, 0, &rec, false).unwrap();
        assert_eq!(view0.dose(0), 0);
        assert_eq!(view0.count(0), 0);
        assert_eq!(view0.count(1), 2);
    }

    fn dose_view(doses: &[i8]) -> AlleleDose {
        AlleleDose {
            allele_map: vec![0, 1],
            record_allele: Some(0),
            dose: doses.to_vec(),
            counts: vec![0, 0],
        }
    }

    #[test]
    fn test_cor_perfect_and_sign() {
        let x = dose_view(&[0, 1, 2, 0, 2]);
        let anti = dose_view(&[2, 1, 0, 2, 0]);
        assert!((cor(Some(&x), Some(&x)) - 1.0).abs() < 1e-12);
        assert!((cor(Some(&x), Some(&anti)) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_cor_guards() {
        let x = dose_view(&[0, 1, 2]);
        let constant = dose_view(&[1, 1, 1]);
        let missing = dose_view(&[MISSING_DOSE, MISSING_DOSE, MISSING_DOSE]);
        assert_eq!(cor(Some(&x), Some(&constant)), 0.0);
        assert_eq!(cor(Some(&constant), Some(&x)), 0.0);
        assert_eq!(cor(Some(&x), Some(&missing)), 0.0);
        assert_eq!(cor(None, Some(&x)), 0.0);
        assert_eq!(cor(Some(&x), None), 0.0);
    }

    #[test]
    fn test_cor_skips_missing_pairs() {
        let x = dose_view(&[0, MISSING_DOSE, 2, 1]);
        let y = dose_view(&[0, 2, 2, MISSING_DOSE]);
        // Only samples 0 and 2 are shared: doses (0,0) and (2,2)
        assert!((cor(Some(&x), Some(&y)) - 1.0).abs() < 1e-12);
    }
}
