//! # Reform Library
//!
//! Reference-strand conformance for genotype VCF data: rewrites a target
//! VCF so that each surviving variant is allele- and strand-compatible
//! with a matching variant in a reference VCF, for downstream phasing and
//! imputation.
//!
//! ## Modules
//! - `config`: command-line parsing and validation
//! - `data`: markers, genotype records, samples, chromosome interning
//! - `error`: error types and result aliases
//! - `io`: streaming VCF reading and conformed-output writing
//! - `conform`: the strand-alignment engine
//! - `pipelines`: high-level workflow orchestration

pub mod config;
pub mod conform;
pub mod data;
pub mod error;
pub mod io;
pub mod pipelines;

// Re-export commonly used types
pub use config::{ChromInterval, Config};
pub use conform::{MarkerCatalog, Phase, RecordPair};
pub use data::marker::{Allele, Marker};
pub use data::record::GtRecord;
pub use error::{ReformError, Result};
pub use io::{VcfReader, VcfWriter};
pub use pipelines::ConformPipeline;
