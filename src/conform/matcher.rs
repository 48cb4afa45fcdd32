//! # Reference/Target Marker Matching
//!
//! Walks the target marker list and pairs each marker with the unique
//! reference marker whose alleles are compatible under some strand
//! orientation. Markers without a usable partner are rejected with a
//! per-marker reason; rejected markers do not stop the run.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::conform::index::MarkerCatalog;
use crate::conform::phase::Phase;
use crate::data::marker::{Allele, Marker};
use crate::error::Result;

/// Candidate lookup used to propose reference markers for a target marker
pub enum MatchStrategy {
    /// Match on shared identifiers
    ById(HashMap<Arc<str>, usize>),
    /// Match on position
    ByPos(HashMap<u32, Vec<usize>>),
}

impl MatchStrategy {
    /// Build the strategy for a reference catalog
    pub fn new(reference: &MarkerCatalog, match_by_id: bool) -> Result<Self> {
        if match_by_id {
            Ok(Self::ById(reference.id_map()?))
        } else {
            Ok(Self::ByPos(reference.pos_map()))
        }
    }

    /// Reference catalog indices proposed for a target marker
    fn candidates(&self, target: &Marker) -> Vec<usize> {
        match self {
            Self::ById(id_map) => {
                let mut matches = Vec::with_capacity(1);
                for id in &target.ids {
                    if let Some(&idx) = id_map.get(id) {
                        if !matches.contains(&idx) {
                            matches.push(idx);
                        }
                    }
                }
                matches
            }
            Self::ByPos(pos_map) => pos_map.get(&target.pos).cloned().unwrap_or_default(),
        }
    }
}

/// Why a target marker was dropped by the matcher
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectReason {
    /// No compatible reference marker
    NotInReference,
    /// More than one compatible reference marker
    MultipleRefMatches,
    /// Same reference marker as the previous accepted target marker
    DuplicateMarker,
    /// Reference partner precedes the previous accepted partner
    MarkerOutOfOrder,
}

impl RejectReason {
    /// Rendering used in the marker log INFO column
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotInReference => "NOT_IN_REFERENCE",
            Self::MultipleRefMatches => "MULTIPLE_REF_MATCHES",
            Self::DuplicateMarker => "DUPLICATE_MARKER",
            Self::MarkerOutOfOrder => "MARKER_OUT_OF_ORDER",
        }
    }
}

/// Outcome of matching one target marker, in target order
#[derive(Clone, Debug)]
pub enum MatchOutcome {
    /// Accepted pair with the allele-symbol strand verdict
    Matched {
        ref_idx: usize,
        targ_idx: usize,
        strand: Phase,
    },
    /// Rejected target marker
    Rejected {
        targ_idx: usize,
        reason: RejectReason,
    },
}

/// Strand relationship implied by allele symbols alone.
///
/// With A the reference allele set, B the target set, and B' the
/// strand-flipped target set: UNKNOWN when A covers both B and B',
/// IDENTICAL when only B, OPPOSITE when only B', INCONSISTENT otherwise.
pub fn strand(ref_marker: &Marker, targ_marker: &Marker) -> Phase {
    let ref_alleles: HashSet<&Allele> = ref_marker.alleles().collect();
    let flipped = targ_marker.flip_strand();
    let same_consistent = targ_marker.alleles().all(|a| ref_alleles.contains(a));
    let opp_consistent = flipped.alleles().all(|a| ref_alleles.contains(a));
    match (same_consistent, opp_consistent) {
        (true, true) => Phase::Unknown,
        (true, false) => Phase::Identical,
        (false, true) => Phase::Opposite,
        (false, false) => Phase::Inconsistent,
    }
}

/// Match every target marker against the reference catalog.
///
/// Returns one outcome per target marker, in target order. Accepted pairs
/// preserve reference order: a pair whose reference partner repeats or
/// precedes the previous accepted partner is rejected instead.
pub fn match_markers(
    reference: &MarkerCatalog,
    target: &MarkerCatalog,
    match_by_id: bool,
) -> Result<Vec<MatchOutcome>> {
    let strategy = MatchStrategy::new(reference, match_by_id)?;
    let mut outcomes = Vec::with_capacity(target.len());
    let mut prev_ref_idx: Option<usize> = None;

    for (targ_idx, targ_marker) in target.iter().enumerate() {
        let consistent: Vec<(usize, Phase)> = strategy
            .candidates(targ_marker)
            .into_iter()
            .map(|ref_idx| (ref_idx, strand(reference.marker(ref_idx), targ_marker)))
            .filter(|&(_, phase)| phase != Phase::Inconsistent)
            .collect();

        let outcome = match consistent.as_slice() {
            [] => MatchOutcome::Rejected {
                targ_idx,
                reason: RejectReason::NotInReference,
            },
            &[(ref_idx, strand)] => {
                if prev_ref_idx == Some(ref_idx) {
                    MatchOutcome::Rejected {
                        targ_idx,
                        reason: RejectReason::DuplicateMarker,
                    }
                } else if prev_ref_idx.is_some_and(|prev| ref_idx < prev) {
                    MatchOutcome::Rejected {
                        targ_idx,
                        reason: RejectReason::MarkerOutOfOrder,
                    }
                } else {
                    prev_ref_idx = Some(ref_idx);
                    MatchOutcome::Matched {
                        ref_idx,
                        targ_idx,
                        strand,
                    }
                }
            }
            _ => MatchOutcome::Rejected {
                targ_idx,
                reason: RejectReason::MultipleRefMatches,
            },
        };
        outcomes.push(outcome);
    }

    Ok(outcomes)
}
