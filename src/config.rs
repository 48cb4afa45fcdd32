//! # Configuration Logic
//!
//! Command-line parsing and validation. Arguments use the `key=value`
//! form: `reform ref=ref.vcf.gz gt=target.vcf.gz chrom=1 out=prefix`.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::error::{ReformError, Result};

/// Program version string written to the output header
pub const SOURCE_VERSION: &str = concat!("reform ", env!("CARGO_PKG_VERSION"));

/// A 1-based inclusive chromosome interval, `<chrom>` or
/// `<chrom>:<start>-<end>`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChromInterval {
    chrom: String,
    start: u32,
    end: u32,
}

impl ChromInterval {
    /// Parse an interval string
    pub fn parse(s: &str) -> Result<Self> {
        let malformed =
            || ReformError::config(format!("invalid \"chrom\" parameter: \"{}\"", s));
        let (chrom, range) = match s.split_once(':') {
            None => (s, None),
            Some((chrom, range)) => (chrom, Some(range)),
        };
        if chrom.is_empty() {
            return Err(malformed());
        }
        let (start, end) = match range {
            None => (1, u32::MAX),
            Some(range) => {
                let (start, end) = range.split_once('-').ok_or_else(malformed)?;
                let start: u32 = start.parse().map_err(|_| malformed())?;
                let end: u32 = end.parse().map_err(|_| malformed())?;
                if start < 1 || end < start {
                    return Err(malformed());
                }
                (start, end)
            }
        };
        Ok(Self {
            chrom: chrom.to_string(),
            start,
            end,
        })
    }

    /// Chromosome identifier
    pub fn chrom(&self) -> &str {
        &self.chrom
    }

    /// Whether a 1-based position lies inside the interval
    pub fn contains(&self, pos: u32) -> bool {
        pos >= self.start && pos <= self.end
    }
}

/// Runtime configuration parsed from the command line
#[derive(Clone, Debug)]
pub struct Config {
    /// Reference VCF file with GT data
    pub r#ref: PathBuf,
    /// Target VCF file with GT data
    pub gt: PathBuf,
    /// Chromosome or region to process
    pub chrom: String,
    /// Output file prefix
    pub out: String,
    /// Match target to reference markers by identifier (true) or position
    pub match_by_id: bool,
    /// Require frequency or correlation evidence for strand alignment
    pub strict: bool,
    /// File with sample IDs to exclude (one per line)
    pub excludesamples: Option<PathBuf>,
}

impl Config {
    /// Parse `key=value` command line arguments
    pub fn from_args<I>(args: I) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut map: HashMap<String, String> = HashMap::new();
        for arg in args {
            let arg = arg.as_ref();
            let (key, value) = arg
                .split_once('=')
                .ok_or_else(|| ReformError::config(format!("malformed argument: \"{}\"", arg)))?;
            if map.insert(key.to_string(), value.to_string()).is_some() {
                return Err(ReformError::config(format!("duplicate parameter: \"{}\"", key)));
            }
        }

        let mut required = |key: &str| -> Result<String> {
            map.remove(key)
                .ok_or_else(|| ReformError::config(format!("missing \"{}\" parameter", key)))
        };
        let r#ref = PathBuf::from(required("ref")?);
        let gt = PathBuf::from(required("gt")?);
        let chrom = required("chrom")?;
        let out = required("out")?;

        let match_by_id = match map.remove("match") {
            None => true,
            Some(v) if v.eq_ignore_ascii_case("ID") => true,
            Some(v) if v.eq_ignore_ascii_case("POS") => false,
            Some(v) => {
                return Err(ReformError::config(format!(
                    "\"match\" parameter must be ID or POS: \"{}\"",
                    v
                )))
            }
        };
        let strict = match map.remove("strict") {
            None => false,
            Some(v) if v.eq_ignore_ascii_case("true") => true,
            Some(v) if v.eq_ignore_ascii_case("false") => false,
            Some(v) => {
                return Err(ReformError::config(format!(
                    "\"strict\" parameter must be true or false: \"{}\"",
                    v
                )))
            }
        };
        let excludesamples = map.remove("excludesamples").map(PathBuf::from);

        if let Some(key) = map.keys().next() {
            return Err(ReformError::config(format!("unrecognized parameter: \"{}\"", key)));
        }

        Ok(Self {
            r#ref,
            gt,
            chrom,
            out,
            match_by_id,
            strict,
            excludesamples,
        })
    }

    /// Command line usage text
    pub fn usage() -> String {
        format!(
            "\nusage: reform [arguments]\n\n\
             where [arguments] have the format\n\
             \x20 ref=<reference VCF file with GT data>                         (required)\n\
             \x20 gt=<target VCF file with GT data>                             (required)\n\
             \x20 chrom=<[chrom] or [chrom]:[start]-[end]>                      (required)\n\
             \x20 out=<output file prefix>                                      (required)\n\
             \x20 match=<ID or POS (field for matching VCF records)>            (default: ID)\n\
             \x20 strict=<true if strand alignment requires MAF or R2 evidence> (default: false)\n\
             \x20 excludesamples=<file with 1 sample ID per line>               (optional)\n\n\
             Two output files are created:\n\
             \x20 <out prefix>.vcf.gz - reference-matched target data\n\
             \x20 <out prefix>.log    - summary of result for each target marker\n"
        )
    }

    /// The `<out>.vcf.gz` output path
    pub fn vcf_out(&self) -> PathBuf {
        PathBuf::from(format!("{}.vcf.gz", self.out))
    }

    /// The `<out>.log` output path
    pub fn log_out(&self) -> PathBuf {
        PathBuf::from(format!("{}.log", self.out))
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if !self.r#ref.exists() {
            return Err(ReformError::FileNotFound {
                path: self.r#ref.clone(),
            });
        }
        if !self.gt.exists() {
            return Err(ReformError::FileNotFound {
                path: self.gt.clone(),
            });
        }
        if let Some(ref path) = self.excludesamples {
            if !path.exists() {
                return Err(ReformError::FileNotFound { path: path.clone() });
            }
        }

        ChromInterval::parse(&self.chrom)?;

        if Path::new(&self.out).is_dir() {
            return Err(ReformError::config(format!(
                "\"out\" parameter cannot be a directory: \"{}\"",
                self.out
            )));
        }
        let vcf_out = self.vcf_out();
        let log_out = self.log_out();
        if vcf_out.exists() {
            return Err(ReformError::config(format!(
                "VCF output file already exists: {}",
                vcf_out.display()
            )));
        }
        for (output, label) in [(&vcf_out, "VCF"), (&log_out, "log")] {
            for (input, param) in [(&self.r#ref, "ref"), (&self.gt, "gt")] {
                if output == input {
                    return Err(ReformError::config(format!(
                        "output {} file equals \"{}\" file: {}",
                        label,
                        param,
                        input.display()
                    )));
                }
            }
        }

        Ok(())
    }

    /// Load sample IDs to exclude from the exclusion file.
    ///
    /// Returns an empty set if no exclusion file is specified.
    pub fn load_exclude_samples(&self) -> Result<HashSet<String>> {
        use std::fs::File;
        use std::io::{BufRead, BufReader};

        let mut exclude_set = HashSet::new();

        if let Some(ref path) = self.excludesamples {
            let file = File::open(path)?;
            let reader = BufReader::new(file);
            for line in reader.lines() {
                let line = line?;
                let id = line.trim();
                if !id.is_empty() && !id.starts_with('#') {
                    exclude_set.insert(id.to_string());
                }
            }
        }

        Ok(exclude_set)
    }
}
