//! # Sliding Window Engine
//!
//! Maintains a bounded window of matched record pairs, derives the
//! frequency verdict for each pair on entry, accumulates correlation
//! evidence across the window, and flushes finalized pairs in order. Half
//! of each window is retained into the next cycle so correlation evidence
//! from earlier anchors persists.

use tracing::debug;

use crate::conform::pair::RecordPair;
use crate::conform::phase::{effective_phase, Phase};
use crate::error::Result;

/// Number of pairs retained between window cycles; the window holds at most
/// twice this many pairs
pub const WINDOW_OVERLAP: usize = 100;

/// Required |z| separation between the two orientations
const MIN_Z_DIFF: f64 = 4.0;

/// Most contrary anchors a correlation verdict may tolerate
const MAX_INCONSISTENT_STRAND: usize = 1;

/// Required margin between agreeing and contrary anchor counts
const MIN_STRAND_DIFF: usize = 2;

/// One matched pair resident in the window with its three verdicts
#[derive(Clone, Debug)]
pub struct WindowSlot {
    /// Index into the matcher's outcome sequence, for ordered logging
    pub outcome_idx: usize,
    pub pair: RecordPair,
    pub allele_phase: Phase,
    pub freq_phase: Phase,
    pub cor_phase: Phase,
}

impl WindowSlot {
    /// Fused verdict controlling emission of this pair
    pub fn effective(&self, strict: bool) -> Phase {
        effective_phase(self.allele_phase, self.freq_phase, self.cor_phase, strict)
    }
}

/// Supplies matched record pairs in target order
pub trait PairSource {
    /// Next pair, or `None` when the matched sequence is exhausted
    fn next_pair(&mut self) -> Result<Option<(usize, RecordPair)>>;
}

/// The sliding window over matched pairs
pub struct ConformWindow {
    slots: Vec<WindowSlot>,
    overlap: usize,
    finished: bool,
}

impl ConformWindow {
    pub fn new() -> Self {
        Self::with_overlap(WINDOW_OVERLAP)
    }

    fn with_overlap(overlap: usize) -> Self {
        Self {
            slots: Vec::with_capacity(2 * overlap),
            overlap,
            finished: false,
        }
    }

    /// Whether the pair source has been exhausted
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Run one window cycle: flush the pairs leaving the window, refill
    /// from `source`, and re-run the correlation update over the residents.
    ///
    /// Returns the flushed slots in order. Retained slots keep their
    /// accumulated correlation verdicts.
    pub fn advance(&mut self, source: &mut dyn PairSource) -> Result<Vec<WindowSlot>> {
        let overlap = self.overlap.min(self.slots.len());
        let overlap_start = self.slots.len() - overlap;
        let flushed: Vec<WindowSlot> = self.slots.drain(..overlap_start).collect();

        while !self.finished && self.slots.len() < 2 * self.overlap {
            match source.next_pair()? {
                None => self.finished = true,
                Some((outcome_idx, pair)) => {
                    let allele_phase = pair.allele_strand();
                    let freq_phase = freq_phase(&pair);
                    self.slots.push(WindowSlot {
                        outcome_idx,
                        pair,
                        allele_phase,
                        freq_phase,
                        cor_phase: Phase::Unknown,
                    });
                }
            }
        }

        self.update_cor_phase();
        Ok(flushed)
    }

    /// Flush every remaining slot after the source is exhausted
    pub fn finish(&mut self) -> Vec<WindowSlot> {
        self.slots.drain(..).collect()
    }

    fn update_cor_phase(&mut self) {
        let counts: Vec<CorCounts> = (0..self.slots.len())
            .map(|j| self.cor_counts(j))
            .collect();
        let informative: usize = counts.iter().map(|c| c.informative).sum();
        debug!(
            window_len = self.slots.len(),
            informative, "correlation update"
        );
        for (slot, cc) in self.slots.iter_mut().zip(&counts) {
            slot.cor_phase = slot.cor_phase.merge(phase_from_cor_counts(cc));
        }
    }

    /* counts, over every anchor with a strong frequency verdict that does
    not contradict its allele verdict, how often the target-cohort
    correlation sign agrees with the reference-cohort sign under each
    orientation of the focus pair */
    fn cor_counts(&self, index: usize) -> CorCounts {
        let focus = &self.slots[index];
        let min_abs_ref_cor = min_abs_cor(
            focus.pair.ref_freq(0),
            focus.pair.ref_rec().n_samples(),
        );
        let min_abs_targ_cor =
            min_abs_cor(focus.pair.targ_freq(0), focus.pair.targ().n_samples());
        let mut same_cnt = 0usize;
        let mut opp_cnt = 0usize;
        let mut informative = 0usize;
        for (j, anchor) in self.slots.iter().enumerate() {
            if j == index
                || !anchor.freq_phase.is_aligned()
                || !(anchor.allele_phase == anchor.freq_phase
                    || anchor.allele_phase == Phase::Unknown)
            {
                continue;
            }
            let flip_anchor = anchor.freq_phase == Phase::Opposite;
            let ref_cor = RecordPair::ref_cor(&focus.pair, &anchor.pair);
            if ref_cor.abs() > min_abs_ref_cor {
                informative += 1;
                let cor = RecordPair::target_cor(&focus.pair, false, &anchor.pair, flip_anchor);
                let f_cor = RecordPair::target_cor(&focus.pair, true, &anchor.pair, flip_anchor);
                if ref_cor < -min_abs_ref_cor {
                    if cor < -min_abs_targ_cor {
                        same_cnt += 1;
                    }
                    if f_cor < -min_abs_targ_cor {
                        opp_cnt += 1;
                    }
                } else {
                    if cor > min_abs_targ_cor {
                        same_cnt += 1;
                    }
                    if f_cor > min_abs_targ_cor {
                        opp_cnt += 1;
                    }
                }
            }
        }
        CorCounts {
            same_cnt,
            opp_cnt,
            informative,
        }
    }
}

impl Default for ConformWindow {
    fn default() -> Self {
        Self::new()
    }
}

/// Frequency verdict for a pair.
///
/// A suppressed or empty view leaves the z-statistic non-finite, and the
/// frequency evidence then cannot discriminate orientations; the verdict is
/// UNKNOWN and fusion falls back on the other sources.
pub fn freq_phase(pair: &RecordPair) -> Phase {
    let abs_z = pair.abs_z();
    let flipped_abs_z = pair.flipped_abs_z();
    if !abs_z.is_finite() || !flipped_abs_z.is_finite() {
        return Phase::Unknown;
    }
    if flipped_abs_z >= abs_z + MIN_Z_DIFF {
        Phase::Identical
    } else if abs_z >= flipped_abs_z + MIN_Z_DIFF {
        Phase::Opposite
    } else {
        Phase::Unknown
    }
}

/*
 * Uses the approximation that for N sample pairs and small or moderate
 * correlation rho, the sample correlation is distributed normally about rho
 * with variance (1 - rho^2)^2 / (N - 1). See Fisher, Statistical Methods,
 * Experimental Design, and Scientific Inference, section 33 (p. 194).
 */
fn min_abs_cor(freq: f64, n_samples: usize) -> f64 {
    let min_high_freq_std_dev = 5.0;
    let min_low_freq_std_dev = 7.0;
    let std_dev = 1.0 / ((n_samples as f64) - 1.0).sqrt();
    if freq > 0.3 && freq < 0.7 {
        min_high_freq_std_dev * std_dev
    } else {
        min_low_freq_std_dev * std_dev
    }
}

struct CorCounts {
    same_cnt: usize,
    opp_cnt: usize,
    /// Anchors whose reference correlation cleared the threshold; kept for
    /// the per-window diagnostic
    informative: usize,
}

fn phase_from_cor_counts(cc: &CorCounts) -> Phase {
    if cc.opp_cnt <= MAX_INCONSISTENT_STRAND && cc.same_cnt >= cc.opp_cnt + MIN_STRAND_DIFF {
        Phase::Identical
    } else if cc.same_cnt <= MAX_INCONSISTENT_STRAND
        && cc.opp_cnt >= cc.same_cnt + MIN_STRAND_DIFF
    {
        Phase::Opposite
    } else if cc.same_cnt > MAX_INCONSISTENT_STRAND && cc.opp_cnt > MAX_INCONSISTENT_STRAND {
        Phase::Inconsistent
    } else {
        Phase::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::marker::{Allele, Marker};
    use crate::data::record::GtRecord;
    use crate::data::ChromIdx;

    fn marker(pos: u32, alleles: &[&str]) -> Marker {
        Marker::new(
            ChromIdx(0),
            pos,
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

    fn pair(
        pos: u32,
        ref_alleles: &[&str],
        targ_alleles: &[&str],
        ref_gt: &[(u8, u8)],
        targ_gt: &[(u8, u8)],
        strand: Phase,
    ) -> RecordPair {
        let ref_rec = record(marker(pos, ref_alleles), ref_gt);
        let targ_rec = record(marker(pos, targ_alleles), targ_gt);
        RecordPair::new(ref_rec, targ_rec.clone(), targ_rec, strand).unwrap()
    }

    /// 20 samples with `n_alt` homozygous-alt genotypes, the rest hom-ref
    fn split_genotypes(n_alt: usize) -> Vec<(u8, u8)> {
        let mut gt = vec![(0u8, 0u8); 20 - n_alt];
        gt.extend(vec![(1u8, 1u8); n_alt]);
        gt
    }

    struct VecSource {
        pairs: std::vec::IntoIter<(usize, RecordPair)>,
    }

    impl PairSource for VecSource {
        fn next_pair(&mut self) -> Result<Option<(usize, RecordPair)>> {
            Ok(self.pairs.next())
        }
    }

    fn source(pairs: Vec<RecordPair>) -> VecSource {
        VecSource {
            pairs: pairs
                .into_iter()
                .enumerate()
                .collect::<Vec<_>>()
                .into_iter(),
        }
    }

    #[test]
    fn test_freq_phase_suppressed_view_is_unknown() {
        // Identical allele symbols suppress the flipped view: frequency
        // evidence cannot discriminate, whatever the counts say
        let p = pair(
            100,
            &["A", "G"],
            &["A", "G"],
            &split_genotypes(16),
            &split_genotypes(4),
            Phase::Identical,
        );
        assert_eq!(freq_phase(&p), Phase::Unknown);
    }

    #[test]
    fn test_freq_phase_palindrome_resolved() {
        // S3: A/T palindrome with mirrored frequencies; the as-is z is
        // large, the flipped z is ~0
        let p = pair(
            100,
            &["A", "T"],
            &["A", "T"],
            &split_genotypes(4),
            &split_genotypes(16),
            Phase::Unknown,
        );
        assert_eq!(freq_phase(&p), Phase::Opposite);

        // Matching frequencies with the flipped counts also matching (a
        // balanced palindrome) leave the orientation open
        let q = pair(
            100,
            &["A", "T"],
            &["A", "T"],
            &split_genotypes(10),
            &split_genotypes(10),
            Phase::Unknown,
        );
        assert_eq!(freq_phase(&q), Phase::Unknown);

        // Matching as-is frequencies away from 0.5 are themselves evidence
        // for the reported orientation
        let r = pair(
            100,
            &["A", "T"],
            &["A", "T"],
            &split_genotypes(4),
            &split_genotypes(4),
            Phase::Unknown,
        );
        assert_eq!(freq_phase(&r), Phase::Identical);
    }

    #[test]
    fn test_freq_phase_empty_cohort_is_unknown() {
        let missing = vec![(255u8, 255u8); 20];
        let p = pair(
            100,
            &["A", "T"],
            &["A", "T"],
            &split_genotypes(4),
            &missing,
            Phase::Unknown,
        );
        assert_eq!(freq_phase(&p), Phase::Unknown);
    }

    #[test]
    fn test_min_abs_cor_bands() {
        let common = min_abs_cor(0.5, 101);
        let rare = min_abs_cor(0.1, 101);
        assert!((common - 0.5).abs() < 1e-12);
        assert!((rare - 0.7).abs() < 1e-12);
        // NaN frequency uses the conservative band
        assert!((min_abs_cor(f64::NAN, 101) - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_phase_from_cor_counts() {
        let cc = |same_cnt, opp_cnt| CorCounts {
            same_cnt,
            opp_cnt,
            informative: same_cnt + opp_cnt,
        };
        assert_eq!(phase_from_cor_counts(&cc(3, 0)), Phase::Identical);
        assert_eq!(phase_from_cor_counts(&cc(3, 1)), Phase::Identical);
        assert_eq!(phase_from_cor_counts(&cc(1, 4)), Phase::Opposite);
        assert_eq!(phase_from_cor_counts(&cc(4, 4)), Phase::Inconsistent);
        assert_eq!(phase_from_cor_counts(&cc(1, 0)), Phase::Unknown);
        assert_eq!(phase_from_cor_counts(&cc(2, 1)), Phase::Unknown);
    }

    /// 101 samples in three dose blocks: 61 hom-ref, 20 het, 20 hom-alt.
    /// Correlation thresholds require about a hundred samples before a
    /// sample correlation can clear them (7/sqrt(100) = 0.7).
    fn graded_genotypes() -> Vec<(u8, u8)> {
        let mut gt = vec![(0u8, 0u8); 61];
        gt.extend(vec![(0u8, 1u8); 20]);
        gt.extend(vec![(1u8, 1u8); 20]);
        gt
    }

    /// The same blocks with every genotype strand-swapped, so the dose
    /// pattern is mirrored sample-by-sample
    fn anti_graded_genotypes() -> Vec<(u8, u8)> {
        graded_genotypes()
            .into_iter()
            .map(|(a1, a2)| (1 - a1, 1 - a2))
            .collect()
    }

    #[test]
    fn test_window_correlation_confirms_palindrome() {
        // Four A/T palindromes whose target genotypes are mirrored
        // sample-by-sample. Each pair's mirrored frequencies give a strong
        // OPPOSITE frequency verdict, so every pair anchors the others; the
        // dose patterns correlate perfectly in both cohorts, and the
        // correlation verdicts confirm OPPOSITE.
        let pairs: Vec<RecordPair> = (0..4)
            .map(|i| {
                pair(
                    1000 + i,
                    &["A", "T"],
                    &["A", "T"],
                    &graded_genotypes(),
                    &anti_graded_genotypes(),
                    Phase::Unknown,
                )
            })
            .collect();
        for p in &pairs {
            assert!(p.abs_z() > 4.0);
            assert_eq!(freq_phase(p), Phase::Opposite);
        }

        let mut window = ConformWindow::with_overlap(4);
        let mut src = source(pairs);
        let flushed = window.advance(&mut src).unwrap();
        assert!(flushed.is_empty());
        assert!(window.is_finished());

        let slots = window.finish();
        assert_eq!(slots.len(), 4);
        for slot in &slots {
            // Three agreeing anchors, none contrary
            assert_eq!(slot.cor_phase, Phase::Opposite);
            assert_eq!(slot.effective(false), Phase::Opposite);
            assert_eq!(slot.effective(true), Phase::Opposite);
        }
    }

    #[test]
    fn test_window_conflicting_evidence_goes_inconsistent() {
        // Three mirrored anchors as above, plus a focus whose target allele
        // counts look mirrored (frequency verdict OPPOSITE) while its
        // per-sample doses still track the reference as-is (correlation
        // verdict IDENTICAL). The fused verdict drops the focus.
        let mut pairs: Vec<RecordPair> = (0..3)
            .map(|i| {
                pair(
                    1000 + i,
                    &["A", "T"],
                    &["A", "T"],
                    &graded_genotypes(),
                    &anti_graded_genotypes(),
                    Phase::Unknown,
                )
            })
            .collect();
        // 61 het samples where the reference is hom-ref, hom-alt elsewhere:
        // reference-allele frequency 0.30, dose correlation with the
        // reference pattern +0.92
        let mut low_but_tracking = vec![(0u8, 1u8); 61];
        low_but_tracking.extend(vec![(1u8, 1u8); 40]);
        pairs.push(pair(
            2000,
            &["A", "T"],
            &["A", "T"],
            &graded_genotypes(),
            &low_but_tracking,
            Phase::Unknown,
        ));

        let mut window = ConformWindow::with_overlap(4);
        let mut src = source(pairs);
        window.advance(&mut src).unwrap();
        let slots = window.finish();

        let focus = &slots[3];
        assert_eq!(focus.freq_phase, Phase::Opposite);
        assert_eq!(focus.cor_phase, Phase::Identical);
        assert_eq!(focus.effective(false), Phase::Inconsistent);
        assert_eq!(focus.effective(true), Phase::Inconsistent);
    }

    #[test]
    fn test_window_overlap_retention_and_flush_order() {
        // Seven pairs through a window of overlap 2 (capacity 4): flushes
        // must come out in order and retained slots carry verdicts forward
        let pairs: Vec<RecordPair> = (0..7)
            .map(|i| {
                pair(
                    100 + i,
                    &["A", "G"],
                    &["A", "G"],
                    &graded_genotypes(),
                    &graded_genotypes(),
                    Phase::Identical,
                )
            })
            .collect();

        let mut window = ConformWindow::with_overlap(2);
        let mut src = source(pairs);
        let mut flushed = Vec::new();
        while !window.is_finished() {
            flushed.extend(window.advance(&mut src).unwrap());
        }
        flushed.extend(window.finish());

        assert_eq!(flushed.len(), 7);
        let order: Vec<usize> = flushed.iter().map(|s| s.outcome_idx).collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4, 5, 6]);
        for slot in &flushed {
            assert_eq!(slot.allele_phase, Phase::Identical);
            assert_eq!(slot.effective(false), Phase::Identical);
        }
    }

    #[test]
    fn test_no_variation_short_circuit() {
        // Hom-ref everywhere: both z statistics degenerate, the allele
        // verdict carries the pair
        let p = pair(
            100,
            &["A", "G"],
            &["A", "G"],
            &vec![(0, 0); 20],
            &vec![(0, 0); 20],
            Phase::Identical,
        );
        assert_eq!(p.abs_z(), 0.0);
        assert_eq!(freq_phase(&p), Phase::Unknown);
        let slot = WindowSlot {
            outcome_idx: 0,
            allele_phase: p.allele_strand(),
            freq_phase: freq_phase(&p),
            cor_phase: Phase::Unknown,
            pair: p,
        };
        assert_eq!(slot.effective(false), Phase::Identical);
    }

    #[test]
    fn test_strict_unknown_allele_needs_evidence() {
        // A palindrome with balanced frequencies has no usable evidence and
        // is dropped in both modes
        let p = pair(
            100,
            &["A", "T"],
            &["A", "T"],
            &split_genotypes(10),
            &split_genotypes(10),
            Phase::Unknown,
        );
        let slot = WindowSlot {
            outcome_idx: 0,
            allele_phase: p.allele_strand(),
            freq_phase: freq_phase(&p),
            cor_phase: Phase::Unknown,
            pair: p,
        };
        assert_eq!(slot.effective(false), Phase::Unknown);
        assert_eq!(slot.effective(true), Phase::Unknown);
    }
}
