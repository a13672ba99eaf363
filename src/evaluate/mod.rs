//! Comparison of a computed delay table against golden delays.
//!
//! Both tables hold `<load> <driver> <delay>` lines. Pairs whose golden delay is
//! below the tolerance are scored by absolute error, the others by relative error.

use std::{
    cmp,
    collections::HashMap,
    fmt,
    fs::File,
    io::{BufRead, BufReader, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};
use ordered_float::OrderedFloat;
use prettytable::*;
use rayon::prelude::*;

use crate::{Symbol, delay::UNREACHABLE_DELAY, lossy_lines, report_writer};

/// Delays keyed by `(load, driver)`; `None` marks a pair written as unreachable.
pub type DelayTable = HashMap<(Symbol, Symbol), Option<f64>>;

/// Command-line arguments for the evaluate command.
#[derive(Parser, Debug)]
pub struct EvaluateArgs {
    /// Computed delay table
    pub calculated: PathBuf,

    /// Golden delay table
    pub golden: PathBuf,

    /// Golden delays below this are compared by absolute error
    #[clap(long, short, default_value_t = 0.05)]
    pub tolerance: f64,

    /// Number of worst pairs listed
    #[clap(long, short, default_value_t = 10)]
    pub worst: usize,

    /// Report file (default: stdout)
    #[clap(long, short)]
    pub report: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Absolute,
    Relative,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Absolute => write!(f, "abs"),
            ErrorKind::Relative => write!(f, "rel"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PairError {
    pub load: Symbol,
    pub driver: Symbol,
    pub calculated: f64,
    pub golden: f64,
    pub error: f64,
    pub kind: ErrorKind,
}

#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    pub errors: Vec<PairError>,
    /// Computed pairs absent from the golden table.
    pub missing: usize,
    /// Pairs left out because either side is unreachable.
    pub unreachable: usize,
}

impl Evaluation {
    pub fn compared(&self) -> usize {
        self.errors.len()
    }

    fn mean_of(&self, kind: ErrorKind) -> f64 {
        let (sum, count) = self
            .errors
            .iter()
            .filter(|e| e.kind == kind)
            .fold((0.0, 0usize), |(sum, count), e| (sum + e.error, count + 1));

        if count == 0 { 0.0 } else { sum / count as f64 }
    }

    pub fn mean_absolute_error(&self) -> f64 {
        self.mean_of(ErrorKind::Absolute)
    }

    /// Mean relative error as a fraction, not a percentage.
    pub fn mean_relative_error(&self) -> f64 {
        self.mean_of(ErrorKind::Relative)
    }

    /// The `n` largest errors, largest first.
    pub fn worst(&self, n: usize) -> Vec<&PairError> {
        let mut sorted: Vec<&PairError> = self.errors.iter().collect();
        sorted.par_sort_unstable_by_key(|e| cmp::Reverse(OrderedFloat(e.error)));
        sorted.truncate(n);
        sorted
    }
}

pub fn parse_delay_table<R: BufRead>(reader: R) -> Result<DelayTable> {
    let mut table = DelayTable::new();

    for (number, line) in lossy_lines(reader).enumerate() {
        let line = line?;
        let mut fields = line.split_whitespace();

        let (Some(load), Some(driver), Some(delay)) = (fields.next(), fields.next(), fields.next())
        else {
            if !line.trim().is_empty() {
                debug!("line {}: skipping short line {:?}", number + 1, line);
            }
            continue;
        };

        match delay.parse::<f64>() {
            Ok(delay) => {
                let delay = (delay != UNREACHABLE_DELAY).then_some(delay);
                table.insert((load.into(), driver.into()), delay);
            }
            Err(_) => debug!("line {}: skipping unparsable delay {:?}", number + 1, delay),
        }
    }

    Ok(table)
}

pub fn read_delay_table(path: &Path) -> Result<DelayTable> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open delay table {}", path.display()))?;
    parse_delay_table(BufReader::new(file))
        .with_context(|| format!("Failed to read delay table {}", path.display()))
}

/// Scores every computed pair that also appears in `golden`.
pub fn compare(calculated: &DelayTable, golden: &DelayTable, tolerance: f64) -> Evaluation {
    let mut evaluation = Evaluation::default();

    for ((load, driver), &calculated) in calculated {
        let Some(&golden) = golden.get(&(load.clone(), driver.clone())) else {
            evaluation.missing += 1;
            continue;
        };

        let (Some(calculated), Some(golden)) = (calculated, golden) else {
            evaluation.unreachable += 1;
            continue;
        };

        let (error, kind) = if golden < tolerance || golden == 0.0 {
            ((calculated - golden).abs(), ErrorKind::Absolute)
        } else {
            (((calculated - golden) / golden).abs(), ErrorKind::Relative)
        };

        evaluation.errors.push(PairError {
            load: load.clone(),
            driver: driver.clone(),
            calculated,
            golden,
            error,
            kind,
        });
    }

    evaluation
}

pub fn write_evaluation<W: Write>(
    writer: &mut W,
    evaluation: &Evaluation,
    worst: usize,
) -> Result<()> {
    writeln!(writer, "Pairs compared: {}", evaluation.compared())?;
    writeln!(writer, "Pairs missing from golden: {}", evaluation.missing)?;
    writeln!(writer, "Unreachable pairs skipped: {}", evaluation.unreachable)?;
    writeln!(
        writer,
        "Average Absolute Error: {:.6}",
        evaluation.mean_absolute_error()
    )?;
    writeln!(
        writer,
        "Average Relative Error: {:.2}%",
        evaluation.mean_relative_error() * 100.0
    )?;

    let worst = evaluation.worst(worst);
    if worst.is_empty() {
        return Ok(());
    }

    let mut table = Table::new();
    table.set_titles(row!["Load", "Driver", "Calculated", "Golden", "Error", "Kind"]);
    table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
    for e in worst {
        table.add_row(row![
            e.load,
            e.driver,
            format!("{:.6}", e.calculated),
            format!("{:.6}", e.golden),
            format!("{:.6}", e.error),
            e.kind,
        ]);
    }

    writeln!(writer, "\nWorst pairs:")?;
    table.print(writer)?;
    Ok(())
}

pub fn evaluate_main(args: EvaluateArgs) -> Result<()> {
    let EvaluateArgs {
        calculated,
        golden,
        tolerance,
        worst,
        report,
    } = args;

    let mut writer = report_writer(report)?;

    let calculated_table = read_delay_table(&calculated)?;
    let golden_table = read_delay_table(&golden)?;
    info!(
        "{} computed and {} golden delays read",
        calculated_table.len(),
        golden_table.len()
    );

    let evaluation = compare(&calculated_table, &golden_table, tolerance);
    write_evaluation(&mut writer, &evaluation, worst)
}
