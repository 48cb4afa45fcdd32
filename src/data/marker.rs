//! # Marker Definitions
//!
//! Genomic marker (variant site) representation.

use std::fmt::Write as _;
use std::sync::Arc;

use crate::data::ChromIdx;

/// Allele representation
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Allele {
    /// Single nucleotide (A=0, C=1, G=2, T=3)
    Base(u8),
    /// Insertion/deletion, multi-base, or symbolic variant
    Seq(Arc<str>),
}

impl Allele {
    /// Create allele from a single character
    pub fn from_char(c: char) -> Self {
        match c {
            'A' | 'a' => Self::Base(0),
            'C' | 'c' => Self::Base(1),
            'G' | 'g' => Self::Base(2),
            'T' | 't' => Self::Base(3),
            _ => Self::Seq(c.to_string().into()),
        }
    }

    /// Create allele from a string
    pub fn from_str(s: &str) -> Self {
        if s.len() == 1 {
            Self::from_char(s.chars().next().unwrap_or('.'))
        } else {
            Self::Seq(s.into())
        }
    }

    /// Check if this is a single nucleotide
    pub fn is_snv(&self) -> bool {
        matches!(self, Self::Base(_))
    }

    /// Get complement (for strand flipping); non-SNV alleles are unchanged
    pub fn complement(&self) -> Self {
        match self {
            Self::Base(0) => Self::Base(3), // A -> T
            Self::Base(1) => Self::Base(2), // C -> G
            Self::Base(2) => Self::Base(1), // G -> C
            Self::Base(3) => Self::Base(0), // T -> A
            other => other.clone(),
        }
    }
}

impl std::fmt::Display for Allele {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Base(0) => write!(f, "A"),
            Self::Base(1) => write!(f, "C"),
            Self::Base(2) => write!(f, "G"),
            Self::Base(3) => write!(f, "T"),
            Self::Base(_) => write!(f, "N"),
            Self::Seq(s) => write!(f, "{}", s),
        }
    }
}

/// A genomic marker (variant site)
///
/// Equality is structural: two markers are equal only if chromosome,
/// position, identifiers, alleles, and end annotation all agree. The
/// streaming readers rely on this to detect records that disagree with the
/// pre-scanned catalogs.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Marker {
    /// Chromosome index
    pub chrom: ChromIdx,
    /// 1-based genomic position
    pub pos: u32,
    /// Variant IDs (rsIDs or similar); empty if the ID column is missing
    pub ids: Vec<Arc<str>>,
    /// Reference allele
    pub ref_allele: Allele,
    /// Alternate allele(s)
    pub alt_alleles: Vec<Allele>,
    /// END annotation from the INFO column, if present
    pub end: Option<u32>,
}

impl Marker {
    /// Create a new marker
    pub fn new(
        chrom: ChromIdx,
        pos: u32,
        ids: Vec<Arc<str>>,
        ref_allele: Allele,
        alt_alleles: Vec<Allele>,
    ) -> Self {
        Self {
            chrom,
            pos,
            ids,
            ref_allele,
            alt_alleles,
            end: None,
        }
    }

    /// Create a new marker with an END annotation
    pub fn with_end(
        chrom: ChromIdx,
        pos: u32,
        end: Option<u32>,
        ids: Vec<Arc<str>>,
        ref_allele: Allele,
        alt_alleles: Vec<Allele>,
    ) -> Self {
        Self {
            chrom,
            pos,
            ids,
            ref_allele,
            alt_alleles,
            end,
        }
    }

    /// Total number of alleles (ref + alts)
    pub fn n_alleles(&self) -> usize {
        1 + self.alt_alleles.len()
    }

    /// Get allele by index (0 = ref, 1+ = alt)
    pub fn allele(&self, idx: usize) -> Option<&Allele> {
        if idx == 0 {
            Some(&self.ref_allele)
        } else {
            self.alt_alleles.get(idx - 1)
        }
    }

    /// Iterate over all alleles in index order
    pub fn alleles(&self) -> impl Iterator<Item = &Allele> {
        std::iter::once(&self.ref_allele).chain(self.alt_alleles.iter())
    }

    /// Return the marker obtained by complementing every single-base allele.
    ///
    /// Non-SNV alleles are unchanged, so allele indices still correspond
    /// pointwise between `self` and the result.
    pub fn flip_strand(&self) -> Marker {
        Marker {
            chrom: self.chrom,
            pos: self.pos,
            ids: self.ids.clone(),
            ref_allele: self.ref_allele.complement(),
            alt_alleles: self.alt_alleles.iter().map(Allele::complement).collect(),
            end: self.end,
        }
    }

    /// Append the five fixed VCF columns (CHROM POS ID REF ALT) to `buf`
    pub fn write_fixed_fields(&self, chrom_name: &str, buf: &mut String) {
        let _ = write!(buf, "{}\t{}\t", chrom_name, self.pos);
        if self.ids.is_empty() {
            buf.push('.');
        } else {
            for (j, id) in self.ids.iter().enumerate() {
                if j > 0 {
                    buf.push(';');
                }
                buf.push_str(id);
            }
        }
        let _ = write!(buf, "\t{}\t", self.ref_allele);
        if self.alt_alleles.is_empty() {
            buf.push('.');
        } else {
            for (j, alt) in self.alt_alleles.iter().enumerate() {
                if j > 0 {
                    buf.push(',');
                }
                let _ = write!(buf, "{}", alt);
            }
        }
    }
}
