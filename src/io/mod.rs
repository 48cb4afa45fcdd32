//! # I/O Module
//!
//! Streaming VCF reading and conformed-output writing.

pub mod vcf;

pub use vcf::{VcfReader, VcfWriter};
