//! # Matched Record Pairs
//!
//! A `RecordPair` joins the reference and target records for one matched
//! marker with up to three allele-dose views: the reference view and the
//! as-is / strand-flipped target views allowed by the allele-symbol strand
//! verdict. The pair also renders the conformed output record.

use std::fmt::Write as _;

use crate::conform::dose::{self, AlleleDose};
use crate::conform::phase::Phase;
use crate::data::record::{GtRecord, MISSING_ALLELE};
use crate::error::{ReformError, Result};

/// Reference and target data for one matched marker
#[derive(Clone, Debug)]
pub struct RecordPair {
    ref_rec: GtRecord,
    filt_targ: GtRecord,
    unfilt_targ: GtRecord,
    allele_strand: Phase,
    ref_dose: AlleleDose,
    /// Target view on the reported strand; present unless the allele
    /// verdict is OPPOSITE
    targ_dose: Option<AlleleDose>,
    /// Target view on the complemented strand; present unless the allele
    /// verdict is IDENTICAL
    flipped_dose: Option<AlleleDose>,
}

impl RecordPair {
    /// Build the pair and its dose views.
    ///
    /// `filt_targ` is the sample-filtered target record used for all
    /// statistics; `unfilt_targ` is the full record retained for output.
    pub fn new(
        ref_rec: GtRecord,
        filt_targ: GtRecord,
        unfilt_targ: GtRecord,
        allele_strand: Phase,
    ) -> Result<Self> {
        if filt_targ.marker() != unfilt_targ.marker() {
            return Err(ReformError::invalid_data(
                "inconsistent data: filtered and unfiltered target records disagree",
            ));
        }
        let ref_marker = ref_rec.marker().clone();
        let ref_dose = AlleleDose::new(&ref_marker, 0, &ref_rec, false)?;
        let targ_dose = match allele_strand {
            Phase::Unknown | Phase::Identical => {
                Some(AlleleDose::new(&ref_marker, 0, &filt_targ, false)?)
            }
            _ => None,
        };
        let flipped_dose = match allele_strand {
            Phase::Unknown | Phase::Opposite => {
                Some(AlleleDose::new(&ref_marker, 0, &filt_targ, true)?)
            }
            _ => None,
        };
        Ok(Self {
            ref_rec,
            filt_targ,
            unfilt_targ,
            allele_strand,
            ref_dose,
            targ_dose,
            flipped_dose,
        })
    }

    /// Allele-symbol strand verdict from the matcher
    pub fn allele_strand(&self) -> Phase {
        self.allele_strand
    }

    /// The sample-filtered target record
    pub fn targ(&self) -> &GtRecord {
        &self.filt_targ
    }

    /// The reference record
    pub fn ref_rec(&self) -> &GtRecord {
        &self.ref_rec
    }

    /// Reference-cohort frequency of a reference allele
    pub fn ref_freq(&self, allele: usize) -> f64 {
        self.ref_dose.allele_freq(allele)
    }

    /// Target-cohort frequency of a reference allele (as-is orientation)
    pub fn targ_freq(&self, allele: usize) -> f64 {
        self.targ_dose
            .as_ref()
            .map(|d| d.allele_freq(allele))
            .unwrap_or(f64::NAN)
    }

    /// z-statistic for equal reference-allele frequency, as-is orientation
    pub fn abs_z(&self) -> f64 {
        abs_z(Some(&self.ref_dose), self.targ_dose.as_ref())
    }

    /// z-statistic for equal reference-allele frequency, flipped orientation
    pub fn flipped_abs_z(&self) -> f64 {
        abs_z(Some(&self.ref_dose), self.flipped_dose.as_ref())
    }

    /// Reference-cohort dose correlation between two pairs
    pub fn ref_cor(x: &RecordPair, y: &RecordPair) -> f64 {
        dose::cor(Some(&x.ref_dose), Some(&y.ref_dose))
    }

    /// Target-cohort dose correlation between two pairs, each side in the
    /// requested orientation. 0.0 if a requested view is absent.
    pub fn target_cor(x: &RecordPair, flip_x: bool, y: &RecordPair, flip_y: bool) -> f64 {
        let vx = if flip_x { &x.flipped_dose } else { &x.targ_dose };
        let vy = if flip_y { &y.flipped_dose } else { &y.targ_dose };
        dose::cor(vx.as_ref(), vy.as_ref())
    }

    /// Render the conformed target record (as-is orientation) into `buf`
    pub fn format_target(&self, chrom_name: &str, buf: &mut String) -> Result<()> {
        let view = self.targ_dose.as_ref().ok_or_else(|| {
            ReformError::invalid_data("no same-strand view for an IDENTICAL marker")
        })?;
        self.format_record(view, chrom_name, buf);
        Ok(())
    }

    /// Render the strand-flipped conformed target record into `buf`
    pub fn format_flipped_target(&self, chrom_name: &str, buf: &mut String) -> Result<()> {
        let view = self.flipped_dose.as_ref().ok_or_else(|| {
            ReformError::invalid_data("no flipped-strand view for an OPPOSITE marker")
        })?;
        self.format_record(view, chrom_name, buf);
        Ok(())
    }

    /* CHROM..ALT come from the reference marker; genotypes from the
    unfiltered target record with alleles renamed through the view's map */
    fn format_record(&self, view: &AlleleDose, chrom_name: &str, buf: &mut String) {
        let ref_marker = self.ref_rec.marker();
        ref_marker.write_fixed_fields(chrom_name, buf);
        buf.push_str("\t.\tPASS\t");
        match ref_marker.end {
            Some(end) => {
                let _ = write!(buf, "END={}", end);
            }
            None => buf.push('.'),
        }
        buf.push_str("\tGT");
        for s in 0..self.unfilt_targ.n_samples() {
            let a1 = self.unfilt_targ.allele1(s);
            let a2 = self.unfilt_targ.allele2(s);
            let sep = if self.unfilt_targ.is_phased(s) { '|' } else { '/' };
            buf.push('\t');
            if a1 == MISSING_ALLELE {
                buf.push('.');
            } else {
                let _ = write!(buf, "{}", view.mapped_allele(a1 as usize));
            }
            buf.push(sep);
            if a2 == MISSING_ALLELE {
                buf.push('.');
            } else {
                let _ = write!(buf, "{}", view.mapped_allele(a2 as usize));
            }
        }
    }
}

/// Absolute two-proportion z-statistic on reference-allele counts.
///
/// An absent view or a view with no non-missing alleles is maximally
/// distant (+∞); a pooled count with no variation gives 0.
pub fn abs_z(a: Option<&AlleleDose>, b: Option<&AlleleDose>) -> f64 {
    let (a, b) = match (a, b) {
        (Some(a), Some(b)) => (a, b),
        _ => return f64::INFINITY,
    };
    let x_cnt = a.count(0);
    let y_cnt = b.count(0);
    let nx = a.n_nonmissing_alleles();
    let ny = b.n_nonmissing_alleles();
    if nx == 0 || ny == 0 {
        return f64::INFINITY;
    }
    if x_cnt + y_cnt == 0 || x_cnt + y_cnt == nx + ny {
        return 0.0;
    }
    let px = f64::from(x_cnt) / f64::from(nx);
    let py = f64::from(y_cnt) / f64::from(ny);
    let p = f64::from(x_cnt + y_cnt) / f64::from(nx + ny);
    let var = (1.0 / f64::from(nx) + 1.0 / f64::from(ny)) * p * (1.0 - p);
    (px - py).abs() / var.sqrt()
}
