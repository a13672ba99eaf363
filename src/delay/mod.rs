//! Delay extraction over SPEF files.
//!
//! Every net block of a SPEF source is turned into an [`RcNetwork`], its driver
//! and load pins are looked up through a [`PinRoles`] source and one
//! `<load> <driver> <delay>` line is written per load.
//!
//! # Example
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use elmore::delay::{DelayArgs, delay_main};
//! use elmore::rc_tree::DelayMetric;
//!
//! let args = DelayArgs {
//!     spef: vec!["design.spef".into()],
//!     netlist: Some("netlist_info.txt".into()),
//!     output: "delays".into(),
//!     r_unit: 1.0,
//!     c_unit: 1.0,
//!     metric: DelayMetric::Elmore,
//!     jobs: 1,
//!     report: None,
//! };
//!
//! delay_main(args)?;
//! # Ok(())
//! # }
//! ```

use std::{
    fs,
    io::{BufRead, BufWriter, Write},
    ops::AddAssign,
    path::{Path, PathBuf},
    time::Instant,
};

use anyhow::{Context, Result};
use clap::Parser;
use itertools::Itertools;
use log::{error, info};
use prettytable::*;
use rayon::prelude::*;

use crate::{
    AppError,
    netlist_info::NetInfo,
    rc_tree::{DelayMetric, RcNetwork, Units},
    report_writer,
    spef::SpefReader,
};

pub mod report;

pub use report::{
    ConnectivityRoles, DelayRecord, NetReport, PinRoles, UNREACHABLE_DELAY, report_network,
    write_records,
};

/// Networks handed to the worker pool at once when running in parallel.
const BATCH_SIZE: usize = 256;

/// Command-line arguments for the delay command.
#[derive(Parser, Debug)]
pub struct DelayArgs {
    /// SPEF parasitic files
    #[clap(required = true)]
    pub spef: Vec<PathBuf>,

    /// Netlist description listing the output and input pins of every net
    /// (default: pin directions from the *CONN sections)
    #[clap(long, short)]
    pub netlist: Option<PathBuf>,

    /// Directory receiving one <spef name>.txt delay table per SPEF file
    #[clap(long, short)]
    pub output: PathBuf,

    /// Resistance scale factor
    #[clap(long, default_value_t = 1.0)]
    pub r_unit: f64,

    /// Capacitance scale factor
    #[clap(long, default_value_t = 1.0)]
    pub c_unit: f64,

    /// Raw Elmore time constant or 50% threshold delay
    #[clap(long, value_enum, default_value_t = DelayMetric::Elmore)]
    pub metric: DelayMetric,

    /// Worker threads, 0 for one per core
    #[clap(long, short, default_value_t = 1)]
    pub jobs: usize,

    /// Summary table file (default: summary lines only)
    #[clap(long, short)]
    pub report: Option<PathBuf>,
}

/// Settings of one extraction run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtractOptions {
    pub units: Units,
    pub metric: DelayMetric,
    /// 1 runs sequentially, 0 uses the rayon default.
    pub jobs: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            units: Units::default(),
            metric: DelayMetric::default(),
            jobs: 1,
        }
    }
}

/// Counters of one extraction run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// `*D_NET` blocks opened, including unterminated ones.
    pub blocks: usize,
    pub records: usize,
    pub unmatched_nets: usize,
    pub unresolved_pins: usize,
    pub unreachable_loads: usize,
    pub redundant_edges: usize,
    pub skipped_lines: usize,
}

impl RunSummary {
    fn absorb(&mut self, report: &NetReport) {
        self.records += report.records.len();
        self.unmatched_nets += usize::from(!report.matched);
        self.unresolved_pins += report.unresolved_pins;
        self.unreachable_loads += report.unreachable_loads;
        self.redundant_edges += report.redundant_edges;
    }
}

impl AddAssign for RunSummary {
    fn add_assign(&mut self, other: Self) {
        self.blocks += other.blocks;
        self.records += other.records;
        self.unmatched_nets += other.unmatched_nets;
        self.unresolved_pins += other.unresolved_pins;
        self.unreachable_loads += other.unreachable_loads;
        self.redundant_edges += other.redundant_edges;
        self.skipped_lines += other.skipped_lines;
    }
}

/// Streams every network of `reader`, writing its delay records in block order.
pub fn extract_delays<R, P>(
    mut reader: SpefReader<R>,
    roles: &P,
    options: &ExtractOptions,
    writer: &mut dyn Write,
) -> Result<RunSummary>
where
    R: BufRead,
    P: PinRoles + ?Sized,
{
    let mut summary = RunSummary::default();
    let metric = options.metric;

    if options.jobs == 1 {
        for network in reader.by_ref() {
            let report = report_network(&network?, roles, metric);
            write_records(writer, &report.records)?;
            summary.absorb(&report);
        }
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.jobs)
            .build()?;
        let batches = reader.by_ref().chunks(BATCH_SIZE);

        for batch in &batches {
            let networks = batch.collect::<Result<Vec<RcNetwork>>>()?;
            let reports: Vec<NetReport> = pool.install(|| {
                networks
                    .par_iter()
                    .map(|network| report_network(network, roles, metric))
                    .collect()
            });

            for report in &reports {
                write_records(writer, &report.records)?;
                summary.absorb(report);
            }
        }
    }

    summary.blocks = reader.blocks_opened();
    summary.skipped_lines = reader.skipped_lines();
    Ok(summary)
}

/// Delay table path for a SPEF file: `<output_dir>/<file stem>.txt`.
pub fn output_path(output_dir: &Path, spef: &Path) -> PathBuf {
    let stem = spef
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "delays".to_owned());
    output_dir.join(format!("{}.txt", stem))
}

fn process_file<P: PinRoles + ?Sized>(
    spef: &Path,
    output_dir: &Path,
    roles: &P,
    options: &ExtractOptions,
) -> Result<(PathBuf, RunSummary)> {
    let reader = SpefReader::open(spef, options.units)?;

    let path = output_path(output_dir, spef);
    let file = fs::File::create(&path)
        .with_context(|| format!("Failed to create delay table {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    let summary = extract_delays(reader, roles, options, &mut writer)
        .with_context(|| format!("Failed to extract delays from {}", spef.display()))?;
    writer.flush()?;

    Ok((path, summary))
}

fn write_summary_table<W: Write>(writer: &mut W, runs: &[(PathBuf, RunSummary)]) -> Result<()> {
    let mut table = Table::new();
    table.set_titles(row![
        "SPEF",
        "Nets",
        "Records",
        "Unmatched nets",
        "Unresolved pins",
        "Unreachable loads",
        "Loop resistors",
        "Skipped lines",
    ]);
    table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);

    let mut total = RunSummary::default();
    for (spef, summary) in runs {
        table.add_row(summary_row(&spef.display().to_string(), summary));
        total += *summary;
    }
    if runs.len() > 1 {
        table.add_row(summary_row("Total", &total));
    }

    table.print(writer)?;
    Ok(())
}

fn summary_row(name: &str, summary: &RunSummary) -> Row {
    row![
        name,
        r->summary.blocks,
        r->summary.records,
        r->summary.unmatched_nets,
        r->summary.unresolved_pins,
        r->summary.unreachable_loads,
        r->summary.redundant_edges,
        r->summary.skipped_lines,
    ]
}

/// Extracts the delay tables of every SPEF file given.
///
/// A SPEF file that cannot be read is logged and skipped; the remaining files are
/// still processed and the run then fails with [`AppError::InputsFailed`].
pub fn delay_main(args: DelayArgs) -> Result<()> {
    let DelayArgs {
        spef,
        netlist,
        output,
        r_unit,
        c_unit,
        metric,
        jobs,
        report,
    } = args;

    let roles: Box<dyn PinRoles> = match netlist {
        Some(path) => {
            let info = NetInfo::read_file(&path)?;
            info!("{} nets read from {}", info.len(), path.display());
            Box::new(info)
        }
        None => Box::new(ConnectivityRoles),
    };

    let options = ExtractOptions {
        units: Units {
            resistance: r_unit,
            capacitance: c_unit,
        },
        metric,
        jobs,
    };

    fs::create_dir_all(&output)
        .with_context(|| format!("Failed to create output directory {}", output.display()))?;

    let mut runs = Vec::with_capacity(spef.len());
    let mut failed = 0;

    for spef_path in &spef {
        let start = Instant::now();

        match process_file(spef_path, &output, roles.as_ref(), &options) {
            Ok((path, summary)) => {
                println!("D_NET count: {}", summary.blocks);
                println!("Delays saved to {}", path.display());
                info!(
                    "{} processed in {:.3} s",
                    spef_path.display(),
                    start.elapsed().as_secs_f64()
                );
                runs.push((spef_path.clone(), summary));
            }
            Err(e) => {
                error!("{:#}", e);
                failed += 1;
            }
        }
    }

    if let Some(path) = report {
        let mut writer = report_writer(Some(path))?;
        write_summary_table(&mut writer, &runs)?;
    }

    if failed > 0 {
        return Err(AppError::InputsFailed {
            failed,
            total: spef.len(),
        }
        .into());
    }

    Ok(())
}
