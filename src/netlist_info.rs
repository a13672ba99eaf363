//! Driver and load pins of each net, read from a netlist description report.
//!
//! The report lists every net followed by its pins:
//!
//! ```text
//! Net name: {u_core/n_42}
//!     Output pin: u_core/u_inv/Z (INVX1)
//!     Input pin: u_core/u_nand/A (NAND2X1)
//!     Input pin: u_core/u_ff/D (DFFX1)
//! ```
//!
//! `Output` pins drive the net, `Input` pins load it.

use std::{
    collections::HashMap,
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use anyhow::{Context, Result};
use lazy_static::*;
use regex::Regex;

use crate::{Symbol, lossy_lines};

const NET_PREFIX: &str = "Net name:";
const OUTPUT_PREFIX: &str = "Output";
const INPUT_PREFIX: &str = "Input";

/// Pins of one net, in the order the report lists them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetIo {
    pub drivers: Vec<Symbol>,
    pub loads: Vec<Symbol>,
}

/// Net name to [`NetIo`] table.
#[derive(Debug, Clone, Default)]
pub struct NetInfo {
    nets: HashMap<Symbol, NetIo>,
}

impl NetInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read_file(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open netlist file {}", path.display()))?;
        Self::parse(BufReader::new(file))
            .with_context(|| format!("Failed to read netlist file {}", path.display()))
    }

    pub fn parse<R: BufRead>(reader: R) -> Result<Self> {
        let mut info = NetInfo::new();
        let mut current: Option<Symbol> = None;

        for line in lossy_lines(reader) {
            let line = line?;
            let line = line.trim_start();

            if let Some(rest) = line.strip_prefix(NET_PREFIX) {
                let name = net_name(rest);
                info.nets.insert(name.clone(), NetIo::default());
                current = Some(name);
                continue;
            }

            let Some(net) = current.as_ref() else {
                continue;
            };

            if line.starts_with(OUTPUT_PREFIX) {
                if let Some(pin) = pin_name(line) {
                    info.entry(net).drivers.push(pin);
                }
            } else if line.starts_with(INPUT_PREFIX) {
                if let Some(pin) = pin_name(line) {
                    info.entry(net).loads.push(pin);
                }
            }
        }

        Ok(info)
    }

    fn entry(&mut self, net: &Symbol) -> &mut NetIo {
        self.nets.entry(net.clone()).or_default()
    }

    pub fn insert(&mut self, net: Symbol, io: NetIo) {
        self.nets.insert(net, io);
    }

    pub fn get(&self, net: &Symbol) -> Option<&NetIo> {
        self.nets.get(net)
    }

    pub fn len(&self) -> usize {
        self.nets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nets.is_empty()
    }
}

fn net_name(rest: &str) -> Symbol {
    lazy_static! {
        static ref BRACED_RE: Regex = Regex::new(r"\{(.+?)\}").unwrap();
    }

    match BRACED_RE.captures(rest) {
        Some(c) => Symbol::from(&c[1]),
        None => Symbol::from(rest.trim()),
    }
}

/// Value after the first `:`, without a trailing `(CELL)` annotation and cut at the
/// first whitespace.
fn pin_name(line: &str) -> Option<Symbol> {
    lazy_static! {
        static ref CELL_RE: Regex = Regex::new(r"\([^()]*\)$").unwrap();
    }

    let (_, value) = line.split_once(':')?;
    let value = value.trim();
    let value = CELL_RE.replace(value, "");
    let pin = value.split_whitespace().next().unwrap_or_default();

    (!pin.is_empty()).then(|| Symbol::from(pin))
}
