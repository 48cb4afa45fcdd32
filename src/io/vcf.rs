//! # VCF Reading and Writing
//!
//! Streaming record reader over gzipped or plain VCF files, restricted to a
//! chromosome interval, plus the conformed-output writer. Uses the `noodles`
//! crate for bgzf compression and VCF header parsing.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use noodles::bgzf as bgzf_io;
use noodles::vcf::Header;
use tracing::info_span;

use crate::config::ChromInterval;
use crate::data::haplotype::Samples;
use crate::data::marker::{Allele, Marker};
use crate::data::record::{GtRecord, MISSING_ALLELE};
use crate::data::ChromIdx;
use crate::error::{ReformError, Result};

/// Maximum supported allele index (u8 limitation)
pub const MAX_ALLELE_INDEX: u16 = 254;

/// Streaming VCF record reader
///
/// Yields one `GtRecord` per data line whose CHROM/POS fall inside the
/// configured interval; other lines are skipped.
pub struct VcfReader {
    reader: Box<dyn BufRead + Send>,
    /// Samples after any exclusion filter
    samples: Arc<Samples>,
    /// Sample column indices to include (None = include all)
    include_sample_indices: Option<Vec<usize>>,
    interval: ChromInterval,
    chrom: ChromIdx,
    line: String,
    line_num: usize,
}

impl VcfReader {
    /// Open a VCF file and read the header
    pub fn open(path: &Path, interval: ChromInterval, chrom: ChromIdx) -> Result<Self> {
        info_span!("vcf_open", path = ?path).in_scope(|| {
            let file = File::open(path)?;

            // Check if gzipped
            let is_gzipped = path
                .extension()
                .map(|e| e == "gz" || e == "bgz")
                .unwrap_or(false);

            let reader: Box<dyn BufRead + Send> = if is_gzipped {
                Box::new(BufReader::new(bgzf_io::Reader::new(file)))
            } else {
                Box::new(BufReader::new(file))
            };

            Self::from_reader(reader, interval, chrom)
        })
    }

    /// Create from a reader, consuming the header lines
    pub fn from_reader(
        mut reader: Box<dyn BufRead + Send>,
        interval: ChromInterval,
        chrom: ChromIdx,
    ) -> Result<Self> {
        let mut header_str = String::new();
        let mut line_num = 0usize;
        loop {
            let mut line = String::new();
            let bytes_read = reader.read_line(&mut line)?;
            if bytes_read == 0 {
                break;
            }
            line_num += 1;
            if line.starts_with('#') {
                header_str.push_str(&line);
                if line.starts_with("#CHROM") {
                    break;
                }
            } else {
                return Err(ReformError::parse(line_num, "data line before #CHROM header"));
            }
        }

        let header: Header = header_str
            .parse()
            .map_err(|e: noodles::vcf::header::ParseError| ReformError::from(e))?;

        let sample_names: Vec<String> = header
            .sample_names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        let samples = Arc::new(Samples::from_ids(sample_names));

        Ok(Self {
            reader,
            samples,
            include_sample_indices: None,
            interval,
            chrom,
            line: String::new(),
            line_num,
        })
    }

    /// Restrict parsed genotypes to the samples NOT named in `exclude_ids`
    pub fn set_exclude_samples(&mut self, exclude_ids: &HashSet<String>) {
        if exclude_ids.is_empty() {
            self.include_sample_indices = None;
            return;
        }
        let include = self.samples.retained_indices(exclude_ids);
        self.samples = Arc::new(self.samples.subset(&include));
        self.include_sample_indices = Some(include);
    }

    /// Samples yielded by this reader (after any exclusion filter)
    pub fn samples(&self) -> Arc<Samples> {
        Arc::clone(&self.samples)
    }

    /// Read the next record inside the interval, or `None` at end of stream
    pub fn next_record(&mut self) -> Result<Option<GtRecord>> {
        loop {
            self.line.clear();
            let bytes_read = self.reader.read_line(&mut self.line)?;
            if bytes_read == 0 {
                return Ok(None);
            }
            self.line_num += 1;

            let line = self.line.trim_end();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            // Cheap interval screen on the first two columns before a full parse
            let mut cols = line.splitn(3, '\t');
            let chrom_field = cols.next().unwrap_or("");
            if chrom_field != self.interval.chrom() {
                continue;
            }
            let pos: u32 = cols
                .next()
                .and_then(|p| p.parse().ok())
                .ok_or_else(|| ReformError::parse(self.line_num, "invalid POS field"))?;
            if !self.interval.contains(pos) {
                continue;
            }

            let record = parse_record(
                line,
                pos,
                self.chrom,
                self.samples.len(),
                self.include_sample_indices.as_deref(),
                self.line_num,
            )?;
            return Ok(Some(record));
        }
    }
}

/// Parse a single VCF data line into a `GtRecord`
fn parse_record(
    line: &str,
    pos: u32,
    chrom: ChromIdx,
    n_samples: usize,
    include: Option<&[usize]>,
    line_num: usize,
) -> Result<GtRecord> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < 10 {
        return Err(ReformError::parse(
            line_num,
            format!("expected at least 10 fields, got {}", fields.len()),
        ));
    }

    // Parse ID (possibly several ;-separated identifiers)
    let ids: Vec<Arc<str>> = if fields[2] == "." {
        Vec::new()
    } else {
        fields[2].split(';').map(Arc::from).collect()
    };

    // Parse REF and ALT
    let ref_allele = Allele::from_str(fields[3]);
    let alt_alleles: Vec<Allele> = if fields[4] == "." {
        Vec::new()
    } else {
        fields[4].split(',').map(Allele::from_str).collect()
    };

    // Parse INFO for the END tag
    let info_field = fields[7];
    let end_pos: Option<u32> = if info_field == "." {
        None
    } else {
        info_field
            .split(';')
            .filter_map(|kv| kv.strip_prefix("END=").and_then(|v| v.parse().ok()))
            .next()
    };

    // Locate GT within FORMAT
    let gt_idx = fields[8]
        .split(':')
        .position(|f| f == "GT")
        .ok_or_else(|| ReformError::parse(line_num, "no GT field in FORMAT"))?;

    let marker = Marker::with_end(chrom, pos, end_pos, ids, ref_allele, alt_alleles);
    let n_alleles = marker.n_alleles();

    // Parse genotypes for the retained sample columns
    let sample_fields = &fields[9..];
    let mut alleles = Vec::with_capacity(2 * n_samples);
    let mut phased = Vec::with_capacity(n_samples);
    let mut push_sample = |column: usize| -> Result<()> {
        let sample_field = sample_fields.get(column).ok_or_else(|| {
            ReformError::parse(line_num, format!("missing genotype column {}", column + 10))
        })?;
        let gt_field = sample_field.split(':').nth(gt_idx).unwrap_or("./.");
        let (a1, a2, is_phased) = parse_genotype(gt_field);
        for a in [a1, a2] {
            if a != MISSING_ALLELE && a as usize >= n_alleles {
                return Err(ReformError::parse(
                    line_num,
                    format!("allele index {} out of range for {} alleles", a, n_alleles),
                ));
            }
        }
        alleles.push(a1);
        alleles.push(a2);
        phased.push(is_phased);
        Ok(())
    };
    match include {
        Some(include) => {
            for &column in include {
                push_sample(column)?;
            }
        }
        None => {
            for column in 0..n_samples {
                push_sample(column)?;
            }
        }
    }

    GtRecord::new(marker, alleles, phased)
}

/// Parse a genotype field (e.g., "0|1", "0/1", ".").
///
/// Returns (allele1, allele2, is_phased). If one allele of a diploid
/// genotype is missing, both are treated as missing. A haploid genotype is
/// stored with the allele in both slots.
fn parse_genotype(gt: &str) -> (u8, u8, bool) {
    let phased = gt.contains('|');
    let sep = if phased { '|' } else { '/' };

    let mut parts = gt.split(sep);
    let first = parts.next().unwrap_or(".");
    match parts.next() {
        None => {
            // Haploid genotype, e.g. "0" or "1"
            let a = parse_allele(first);
            (a, a, true)
        }
        Some(second) if parts.next().is_none() => {
            let a1 = parse_allele(first);
            let a2 = parse_allele(second);
            if a1 == MISSING_ALLELE || a2 == MISSING_ALLELE {
                (MISSING_ALLELE, MISSING_ALLELE, phased)
            } else {
                (a1, a2, phased)
            }
        }
        // Malformed (three or more alleles), treat as missing
        Some(_) => (MISSING_ALLELE, MISSING_ALLELE, phased),
    }
}

/// Parse a single allele string to a u8; 255 for missing (.)
#[inline]
fn parse_allele(s: &str) -> u8 {
    if s == "." || s.is_empty() {
        return MISSING_ALLELE;
    }

    // Fast path for single digit alleles (most common case)
    if s.len() == 1 {
        let c = s.as_bytes()[0];
        if c.is_ascii_digit() {
            return c - b'0';
        }
    }

    match s.parse::<u16>() {
        Ok(val) if val <= MAX_ALLELE_INDEX => val as u8,
        Ok(val) => {
            tracing::warn!(
                "allele index {} exceeds maximum supported value {}; treating as missing",
                val,
                MAX_ALLELE_INDEX
            );
            MISSING_ALLELE
        }
        Err(_) => MISSING_ALLELE,
    }
}

/// Conformed-output VCF writer
pub struct VcfWriter {
    writer: Box<dyn Write + Send>,
}

impl VcfWriter {
    /// Create a new VCF writer; output is bgzf-compressed for `.gz`/`.bgz`
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)?;

        let is_gzipped = path
            .extension()
            .map(|e| e == "gz" || e == "bgz")
            .unwrap_or(false);

        let writer: Box<dyn Write + Send> = if is_gzipped {
            Box::new(BufWriter::new(bgzf_io::Writer::new(file)))
        } else {
            Box::new(BufWriter::new(file))
        };

        Ok(Self { writer })
    }

    /// Write VCF meta-information lines and the header line.
    ///
    /// Only one FORMAT subfield, GT, is described.
    pub fn write_meta_lines_gt(&mut self, sample_ids: &[Arc<str>], source: &str) -> Result<()> {
        writeln!(self.writer, "##fileformat=VCFv4.2")?;
        writeln!(
            self.writer,
            "##filedate={}",
            chrono::Local::now().format("%Y%m%d")
        )?;
        writeln!(self.writer, "##source=\"{}\"", source)?;
        writeln!(
            self.writer,
            "##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">"
        )?;
        write!(
            self.writer,
            "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT"
        )?;
        for id in sample_ids {
            write!(self.writer, "\t{}", id)?;
        }
        writeln!(self.writer)?;
        Ok(())
    }

    /// Write one pre-rendered record line (without trailing newline)
    pub fn write_record_line(&mut self, line: &str) -> Result<()> {
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    /// Flush the writer
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

impl Drop for VcfWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const HEADER: &str = "##fileformat=VCFv4.2\n\
         ##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">\n\
         #CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tS1\tS2\n";

    fn reader_over(vcf: String, interval: &str) -> VcfReader {
        let interval = ChromInterval::parse(interval).unwrap();
        VcfReader::from_reader(Box::new(Cursor::new(vcf)), interval, ChromIdx(0)).unwrap()
    }

    #[test]
    fn test_parse_genotype() {
        assert_eq!(parse_genotype("0|1"), (0, 1, true));
        assert_eq!(parse_genotype("1/0"), (1, 0, false));
        assert_eq!(parse_genotype("./."), (255, 255, false));
        assert_eq!(parse_genotype(".|."), (255, 255, true));
        // One missing allele makes the genotype missing
        assert_eq!(parse_genotype("./1"), (255, 255, false));
        // Haploid is stored in both slots
        assert_eq!(parse_genotype("1"), (1, 1, true));
        assert_eq!(parse_genotype("."), (255, 255, true));
    }

    #[test]
    fn test_header_samples() {
        let reader = reader_over(HEADER.to_string(), "1");
        assert_eq!(reader.samples().len(), 2);
        assert_eq!(reader.samples().ids()[1].as_ref(), "S2");
    }

    #[test]
    fn test_interval_filtering() {
        let mut vcf = HEADER.to_string();
        vcf.push_str("1\t50\trs1\tA\tG\t.\tPASS\t.\tGT\t0|1\t1|1\n");
        vcf.push_str("2\t150\trs2\tA\tG\t.\tPASS\t.\tGT\t0|1\t1|1\n");
        vcf.push_str("1\t150\trs3\tA\tG\t.\tPASS\t.\tGT\t0|1\t1|1\n");
        vcf.push_str("1\t500\trs4\tA\tG\t.\tPASS\t.\tGT\t0|1\t1|1\n");

        let mut reader = reader_over(vcf, "1:100-200");
        let rec = reader.next_record().unwrap().unwrap();
        assert_eq!(rec.marker().pos, 150);
        assert_eq!(rec.marker().ids[0].as_ref(), "rs3");
        assert!(reader.next_record().unwrap().is_none());
    }

    #[test]
    fn test_record_parsing() {
        let mut vcf = HEADER.to_string();
        vcf.push_str("1\t100\trs1;alt1\tA\tG,T\t.\tPASS\tEND=105;X=1\tGT:DP\t0|2:9\t./1:3\n");
        let mut reader = reader_over(vcf, "1");
        let rec = reader.next_record().unwrap().unwrap();
        assert_eq!(rec.marker().ids.len(), 2);
        assert_eq!(rec.marker().n_alleles(), 3);
        assert_eq!(rec.marker().end, Some(105));
        assert_eq!((rec.allele1(0), rec.allele2(0)), (0, 2));
        assert_eq!((rec.allele1(1), rec.allele2(1)), (255, 255));
        assert!(rec.is_phased(0));
    }

    #[test]
    fn test_exclusion_mask() {
        let mut vcf = HEADER.to_string();
        vcf.push_str("1\t100\trs1\tA\tG\t.\tPASS\t.\tGT\t0|0\t1|1\n");
        let mut reader = reader_over(vcf, "1");
        let mut exclude = HashSet::new();
        exclude.insert("S1".to_string());
        reader.set_exclude_samples(&exclude);
        assert_eq!(reader.samples().len(), 1);
        let rec = reader.next_record().unwrap().unwrap();
        assert_eq!(rec.n_samples(), 1);
        assert_eq!((rec.allele1(0), rec.allele2(0)), (1, 1));
    }

    #[test]
    fn test_allele_index_out_of_range() {
        let mut vcf = HEADER.to_string();
        vcf.push_str("1\t100\trs1\tA\tG\t.\tPASS\t.\tGT\t0|3\t0|0\n");
        let mut reader = reader_over(vcf, "1");
        assert!(reader.next_record().is_err());
    }

    #[test]
    fn test_meta_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.vcf");
        {
            let mut writer = VcfWriter::create(&path).unwrap();
            let samples = Samples::from_ids(vec!["S1".to_string(), "S2".to_string()]);
            writer
                .write_meta_lines_gt(samples.ids(), "reform 0.1.0")
                .unwrap();
            writer.write_record_line("1\t5\t.\tA\tG\t.\tPASS\t.\tGT\t0|0\t0|1").unwrap();
        }
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "##fileformat=VCFv4.2");
        assert!(lines[1].starts_with("##filedate="));
        assert_eq!(lines[2], "##source=\"reform 0.1.0\"");
        assert!(lines[3].starts_with("##FORMAT=<ID=GT"));
        assert_eq!(
            lines[4],
            "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tS1\tS2"
        );
        assert_eq!(lines[5], "1\t5\t.\tA\tG\t.\tPASS\t.\tGT\t0|0\t0|1");
    }
}
