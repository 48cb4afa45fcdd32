//! # Conform Pipeline
//!
//! Orchestrates the conform workflow:
//! 1. Pre-scan both inputs into marker catalogs
//! 2. Match target markers to reference markers
//! 3. Stream the matched records through the sliding window
//! 4. Write the conformed VCF and the per-marker log
//!
//! The record streams are consumed in lockstep with the matched sequence;
//! a stream that fails to produce an expected record means an input file
//! changed between the pre-scan and the streaming pass, which is fatal.

use std::fs::File;
use std::io::{BufWriter, Write};

use tracing::{info, info_span};

use crate::config::{ChromInterval, Config, SOURCE_VERSION};
use crate::conform::index::MarkerCatalog;
use crate::conform::matcher::{match_markers, MatchOutcome, RejectReason};
use crate::conform::pair::RecordPair;
use crate::conform::phase::Phase;
use crate::conform::window::{ConformWindow, PairSource, WindowSlot};
use crate::data::marker::Marker;
use crate::data::record::GtRecord;
use crate::data::ChromIds;
use crate::error::{ReformError, Result};
use crate::io::vcf::{VcfReader, VcfWriter};

/// The conform workflow
pub struct ConformPipeline {
    config: Config,
}

impl ConformPipeline {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run the workflow to completion
    pub fn run(&self) -> Result<()> {
        let interval = ChromInterval::parse(&self.config.chrom)?;
        let mut chrom_ids = ChromIds::new();
        let chrom = chrom_ids.get_or_assign(interval.chrom());
        let chrom_name = interval.chrom().to_string();

        // Pre-scan both inputs
        let ref_catalog = MarkerCatalog::scan(&self.config.r#ref, &interval, chrom)?;
        let targ_catalog = MarkerCatalog::scan(&self.config.gt, &interval, chrom)?;
        info!(
            n_ref_markers = ref_catalog.len(),
            n_targ_markers = targ_catalog.len(),
            "marker catalogs scanned"
        );

        let outcomes = match_markers(&ref_catalog, &targ_catalog, self.config.match_by_id)?;
        let n_matched = outcomes
            .iter()
            .filter(|o| matches!(o, MatchOutcome::Matched { .. }))
            .count();
        info!(n_matched, "target markers matched to the reference");

        // Streaming readers: reference filtered at parse time, target read
        // unfiltered with the filtered view derived by masking
        let exclude = self.config.load_exclude_samples()?;
        let mut ref_reader = VcfReader::open(&self.config.r#ref, interval.clone(), chrom)?;
        ref_reader.set_exclude_samples(&exclude);
        let targ_reader = VcfReader::open(&self.config.gt, interval.clone(), chrom)?;
        let unfilt_samples = targ_reader.samples();
        let filt_indices = unfilt_samples.retained_indices(&exclude);
        let mask = if filt_indices.len() == unfilt_samples.len() {
            None
        } else {
            Some(filt_indices)
        };

        // Outputs
        let mut log = BufWriter::new(File::create(self.config.log_out())?);
        write_log_header(&mut log)?;
        let mut vcf = VcfWriter::create(&self.config.vcf_out())?;
        vcf.write_meta_lines_gt(unfilt_samples.ids(), SOURCE_VERSION)?;

        let mut feed = PairFeed {
            outcomes: &outcomes,
            ref_catalog: &ref_catalog,
            targ_catalog: &targ_catalog,
            ref_reader,
            targ_reader,
            mask,
            cursor: 0,
        };
        let mut emitter = Emitter {
            outcomes: &outcomes,
            targ_catalog: &targ_catalog,
            chrom_name: &chrom_name,
            strict: self.config.strict,
            log_cursor: 0,
            line_buf: String::new(),
            n_written: 0,
        };

        let span = info_span!("conform_windows");
        let _guard = span.enter();
        let mut window = ConformWindow::new();
        while !window.is_finished() {
            for slot in window.advance(&mut feed)? {
                emitter.emit(slot, &mut log, &mut vcf)?;
            }
        }
        for slot in window.finish() {
            emitter.emit(slot, &mut log, &mut vcf)?;
        }
        emitter.write_pending_rejections(outcomes.len(), &mut log)?;

        vcf.flush()?;
        log.flush()?;
        info!(
            n_targ_markers = targ_catalog.len(),
            n_matched,
            n_written = emitter.n_written,
            "conform finished"
        );
        Ok(())
    }
}

/// Streams matched record pairs by advancing both readers in lockstep with
/// the matched-marker sequence
struct PairFeed<'a> {
    outcomes: &'a [MatchOutcome],
    ref_catalog: &'a MarkerCatalog,
    targ_catalog: &'a MarkerCatalog,
    ref_reader: VcfReader,
    targ_reader: VcfReader,
    /// Sample columns of the filtered target view; None when no sample is
    /// excluded
    mask: Option<Vec<usize>>,
    cursor: usize,
}

impl PairSource for PairFeed<'_> {
    fn next_pair(&mut self) -> Result<Option<(usize, RecordPair)>> {
        while self.cursor < self.outcomes.len() {
            let outcome_idx = self.cursor;
            self.cursor += 1;
            if let MatchOutcome::Matched {
                ref_idx,
                targ_idx,
                strand,
            } = self.outcomes[outcome_idx]
            {
                let ref_marker = self.ref_catalog.marker(ref_idx);
                let targ_marker = self.targ_catalog.marker(targ_idx);
                let ref_rec = read_until(&mut self.ref_reader, ref_marker)?;
                let unfilt_targ = read_until(&mut self.targ_reader, targ_marker)?;
                let filt_targ = match &self.mask {
                    Some(keep) => unfilt_targ.restrict(keep),
                    None => unfilt_targ.clone(),
                };
                let pair = RecordPair::new(ref_rec, filt_targ, unfilt_targ, strand)?;
                return Ok(Some((outcome_idx, pair)));
            }
        }
        Ok(None)
    }
}

/* advances the reader past unmatched records until the expected marker
appears; running dry here means the file changed since the pre-scan */
fn read_until(reader: &mut VcfReader, marker: &Marker) -> Result<GtRecord> {
    while let Some(rec) = reader.next_record()? {
        if rec.marker() == marker {
            return Ok(rec);
        }
    }
    Err(ReformError::invalid_data(format!(
        "modification detected to an input VCF file: no record for marker at position {}",
        marker.pos
    )))
}

/// Writes the per-marker log in target order and the conformed records in
/// flush order
struct Emitter<'a> {
    outcomes: &'a [MatchOutcome],
    targ_catalog: &'a MarkerCatalog,
    chrom_name: &'a str,
    strict: bool,
    /// Next outcome index whose log line has not been written
    log_cursor: usize,
    line_buf: String,
    n_written: usize,
}

impl Emitter<'_> {
    fn emit(
        &mut self,
        slot: WindowSlot,
        log: &mut impl Write,
        vcf: &mut VcfWriter,
    ) -> Result<()> {
        self.write_pending_rejections(slot.outcome_idx, log)?;

        let effective = slot.effective(self.strict);
        self.line_buf.clear();
        slot.pair
            .targ()
            .marker()
            .write_fixed_fields(self.chrom_name, &mut self.line_buf);
        writeln!(
            log,
            "{}\t{}\t{}\t{}\t{}\t{}",
            self.line_buf,
            slot.allele_phase.summary(),
            slot.freq_phase.summary(),
            slot.cor_phase.summary(),
            effective.disposition(),
            effective.summary()
        )?;
        self.log_cursor = slot.outcome_idx + 1;

        match effective {
            Phase::Identical => {
                self.line_buf.clear();
                slot.pair.format_target(self.chrom_name, &mut self.line_buf)?;
                vcf.write_record_line(&self.line_buf)?;
                self.n_written += 1;
            }
            Phase::Opposite => {
                self.line_buf.clear();
                slot.pair
                    .format_flipped_target(self.chrom_name, &mut self.line_buf)?;
                vcf.write_record_line(&self.line_buf)?;
                self.n_written += 1;
            }
            Phase::Unknown | Phase::Inconsistent => {}
        }
        Ok(())
    }

    /// Write rejection lines for every outcome before `upto`, keeping the
    /// log in target-marker order
    fn write_pending_rejections(&mut self, upto: usize, log: &mut impl Write) -> Result<()> {
        while self.log_cursor < upto {
            if let MatchOutcome::Rejected { targ_idx, reason } = self.outcomes[self.log_cursor] {
                self.write_rejection(targ_idx, reason, log)?;
            }
            self.log_cursor += 1;
        }
        Ok(())
    }

    fn write_rejection(
        &mut self,
        targ_idx: usize,
        reason: RejectReason,
        log: &mut impl Write,
    ) -> Result<()> {
        self.line_buf.clear();
        self.targ_catalog
            .marker(targ_idx)
            .write_fixed_fields(self.chrom_name, &mut self.line_buf);
        writeln!(
            log,
            "{}\tNOT_PERFORMED\tNOT_PERFORMED\tNOT_PERFORMED\tREMOVED\t{}",
            self.line_buf,
            reason.as_str()
        )?;
        Ok(())
    }
}

fn write_log_header(log: &mut impl Write) -> Result<()> {
    writeln!(
        log,
        "CHROM\tPOS\tID\tREF\tALT\tALLELE\tFREQ\tR2\tSUMMARY\tINFO"
    )?;
    Ok(())
}
