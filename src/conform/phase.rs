//! # Strand Phase Verdicts
//!
//! A `Phase` describes the relationship between the chromosome strands of a
//! reference and a target marker, as judged by one evidence source. The
//! merge operations combine verdicts from independent sources; INCONSISTENT
//! is absorbing.

/// Relationship between reference and target strands
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Target alleles are reported on the same strand as the reference
    Identical,
    /// Target alleles are reported on the opposite strand
    Opposite,
    /// Both orientations are consistent with the evidence
    Unknown,
    /// Neither orientation is consistent with the evidence
    Inconsistent,
}

impl Phase {
    /// Merge two verdicts from independent evidence sources.
    ///
    /// UNKNOWN defers to the other verdict; agreeing strong verdicts stand;
    /// disagreeing strong verdicts, or INCONSISTENT anywhere, give
    /// INCONSISTENT.
    pub fn merge(self, other: Phase) -> Phase {
        match self {
            Phase::Identical => match other {
                Phase::Identical | Phase::Unknown => Phase::Identical,
                _ => Phase::Inconsistent,
            },
            Phase::Opposite => match other {
                Phase::Opposite | Phase::Unknown => Phase::Opposite,
                _ => Phase::Inconsistent,
            },
            Phase::Unknown => other,
            Phase::Inconsistent => Phase::Inconsistent,
        }
    }

    /// True for the verdicts that let a variant pass into the output
    pub fn is_aligned(self) -> bool {
        matches!(self, Phase::Identical | Phase::Opposite)
    }

    /// Verdict rendering used in the marker log
    pub fn summary(self) -> &'static str {
        match self {
            Phase::Identical => "SAME_STRAND",
            Phase::Opposite => "OPPOSITE_STRAND",
            Phase::Unknown => "UNKNOWN_STRAND",
            Phase::Inconsistent => "INCONSISTENT_STRAND",
        }
    }

    /// PASS/FAIL disposition used in the marker log
    pub fn disposition(self) -> &'static str {
        if self.is_aligned() {
            "PASS"
        } else {
            "FAIL"
        }
    }
}

/// Effective verdict for a variant from its three component verdicts.
///
/// Outside strict mode an allele-symbol verdict other than UNKNOWN stands on
/// its own; otherwise the three sources are merged, frequency and
/// correlation first.
pub fn effective_phase(allele: Phase, freq: Phase, cor: Phase, strict: bool) -> Phase {
    if !strict && allele != Phase::Unknown {
        allele
    } else {
        allele.merge(freq.merge(cor))
    }
}
