//! Elmore delay estimation from SPEF parasitics
//!
//! This library reads the per-net RC parasitics of a SPEF record, roots each RC
//! network at its driver pins and estimates the driver to load delay with the
//! Elmore time constant.
//!
//! # Main Workflows
//!
//! 1. **Delay extraction** ([`delay`]): stream the net blocks of SPEF files and
//!    write one `<load> <driver> <delay>` table per file
//! 2. **Evaluation** ([`evaluate`]): compare a delay table with golden delays
//!
//! # Usage Example
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use elmore::delay::{ExtractOptions, extract_delays};
//! use elmore::netlist_info::NetInfo;
//! use elmore::spef::SpefReader;
//! use std::path::Path;
//!
//! let options = ExtractOptions::default();
//! let roles = NetInfo::read_file(Path::new("netlist_info.txt"))?;
//! let reader = SpefReader::open(Path::new("design.spef"), options.units)?;
//!
//! let mut out = std::io::stdout();
//! let summary = extract_delays(reader, &roles, &options, &mut out)?;
//! println!("D_NET count: {}", summary.blocks);
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - **[`spef`]**: streaming SPEF reader and name map
//! - **[`rc_tree`]**: RC network model and the Elmore delay engine
//! - **[`netlist_info`]**: driver and load pins of each net
//! - **[`delay`]**: per-net delay reporting and the extraction driver
//! - **[`evaluate`]**: comparison against golden delays

use anyhow::Result;
use clap::Parser;
use std::{
    error::Error,
    fmt, fs,
    io::{self, BufRead, Write},
    path::PathBuf,
};
use string_cache::DefaultAtom;

pub mod delay;
pub mod evaluate;
pub mod netlist_info;
pub mod rc_tree;
pub mod spef;

pub use delay::{DelayArgs, delay_main};
pub use evaluate::{EvaluateArgs, evaluate_main};

/// Interned node, net and pin name.
pub type Symbol = DefaultAtom;

/// Application-level errors.
#[derive(Debug, PartialEq, Eq)]
pub enum AppError {
    /// Some input files could not be read; the others were processed.
    InputsFailed { failed: usize, total: usize },
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::InputsFailed { failed, total } => {
                write!(f, "{} of {} input files could not be processed", failed, total)
            }
        }
    }
}

impl Error for AppError {}

/// Report destination: the given file, or stdout.
pub fn report_writer(path: Option<PathBuf>) -> Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => Box::new(fs::File::create(path)?),
        None => Box::new(io::stdout()),
    })
}

/// Lines of a text source, with invalid UTF-8 replaced by U+FFFD.
///
/// Only errors of the underlying reader are returned as errors.
pub struct LossyLines<R> {
    reader: R,
    buf: Vec<u8>,
}

impl<R: BufRead> Iterator for LossyLines<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => None,
            Ok(_) => {
                if self.buf.last() == Some(&b'\n') {
                    self.buf.pop();
                    if self.buf.last() == Some(&b'\r') {
                        self.buf.pop();
                    }
                }
                Some(Ok(String::from_utf8_lossy(&self.buf).into_owned()))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

pub fn lossy_lines<R: BufRead>(reader: R) -> LossyLines<R> {
    LossyLines {
        reader,
        buf: Vec::new(),
    }
}

/// Command-line interface arguments.
#[derive(Debug, Parser)]
#[clap(
    name = "elmore",
    about = "Elmore delay estimation from SPEF parasitics"
)]
pub enum CLIArguments {
    /// Compute driver to load delays for every net of the given SPEF files.
    Delay(DelayArgs),
    /// Compare a delay table against golden delays.
    Evaluate(EvaluateArgs),
}
