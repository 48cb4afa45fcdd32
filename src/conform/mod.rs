//! # Strand-Alignment Engine
//!
//! The core of the crate: matching target markers to reference markers,
//! judging the strand relationship of each matched pair from allele
//! symbols, allele frequencies, and windowed dose correlations, and fusing
//! the three verdicts into the emission decision.

pub mod dose;
pub mod index;
pub mod matcher;
pub mod pair;
pub mod phase;
pub mod window;

pub use dose::AlleleDose;
pub use index::MarkerCatalog;
pub use matcher::{match_markers, strand, MatchOutcome, MatchStrategy, RejectReason};
pub use pair::RecordPair;
pub use phase::Phase;
pub use window::{ConformWindow, PairSource, WindowSlot};
