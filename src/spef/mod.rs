//! Streaming reader for the net blocks of a SPEF parasitic record.
//!
//! # Format
//!
//! Only the parts of SPEF needed for RC delay estimation are interpreted:
//!
//! ```text
//! *NAME_MAP
//! *1 u_top/u_inv
//! *2 u_top/u_nand
//! *3 n_out
//!
//! *D_NET *3 0.0042
//! *CONN
//! *I *1:Z O *D INVX1
//! *I *2:A I *D NAND2X1
//! *CAP
//! 1 *1:Z 0.001
//! 2 *3:1 0.0012
//! *RES
//! 1 *1:Z *3:1 1.5
//! 2 *3:1 *2:A 0.75
//! *END
//! ```
//!
//! A `*D_NET` line opens a block; its second field is the net identifier, resolved
//! through the name map. Inside a block, `*CONN`, `*CAP` and `*RES` switch the
//! active section and every following line is handed to that section until the
//! next marker. `*END` closes the block and the finished [`RcNetwork`] is yielded.
//!
//! The `*NAME_MAP` section is consumed inline, so the record is read once, front to
//! back, without holding more than one net in memory.
//!
//! # Failure policy
//!
//! Short or unparsable lines inside a section are skipped and counted. Bytes that
//! are not valid UTF-8 are replaced, so they can only make a line malformed. Only
//! I/O errors from the underlying source are returned as errors.

pub mod name_map;
#[cfg(test)]
mod tests;

pub use name_map::{NAME_MAP_MARKER, NameMap, SectionLine};

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use anyhow::{Context, Result};
use log::{debug, warn};

use crate::{
    LossyLines, lossy_lines,
    rc_tree::{Direction, RcNetwork, Units},
};

pub const D_NET_MARKER: &str = "*D_NET";
pub const END_MARKER: &str = "*END";
pub const CONN_MARKER: &str = "*CONN";
pub const CAP_MARKER: &str = "*CAP";
pub const RES_MARKER: &str = "*RES";

/// Sub-section of an open `*D_NET` block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Connectivity,
    Capacitance,
    Resistance,
}

impl Section {
    fn from_marker(line: &str) -> Option<Self> {
        if line.starts_with(CONN_MARKER) {
            Some(Section::Connectivity)
        } else if line.starts_with(CAP_MARKER) {
            Some(Section::Capacitance)
        } else if line.starts_with(RES_MARKER) {
            Some(Section::Resistance)
        } else {
            None
        }
    }
}

#[derive(Debug)]
struct OpenBlock {
    network: RcNetwork,
    section: Option<Section>,
}

fn strip_star(token: &str) -> &str {
    token.strip_prefix('*').unwrap_or(token)
}

/// Iterator over the RC networks of a SPEF source, one per `*D_NET` block.
pub struct SpefReader<R> {
    lines: LossyLines<R>,
    names: NameMap,
    units: Units,
    in_name_map: bool,
    block: Option<OpenBlock>,
    line_number: usize,
    blocks_opened: usize,
    skipped_lines: usize,
    failed: bool,
}

impl SpefReader<BufReader<File>> {
    /// Opens a SPEF file for streaming.
    pub fn open(path: &Path, units: Units) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open SPEF file {}", path.display()))?;
        Ok(Self::new(BufReader::new(file), units))
    }
}

impl<R: BufRead> SpefReader<R> {
    pub fn new(reader: R, units: Units) -> Self {
        Self {
            lines: lossy_lines(reader),
            names: NameMap::new(),
            units,
            in_name_map: false,
            block: None,
            line_number: 0,
            blocks_opened: 0,
            skipped_lines: 0,
            failed: false,
        }
    }

    /// Starts from an already known name map. A `*NAME_MAP` section in the source
    /// still adds to it.
    pub fn with_name_map(mut self, names: NameMap) -> Self {
        self.names = names;
        self
    }

    pub fn names(&self) -> &NameMap {
        &self.names
    }

    /// Number of `*D_NET` blocks seen so far.
    pub fn blocks_opened(&self) -> usize {
        self.blocks_opened
    }

    /// Number of malformed section lines skipped so far.
    pub fn skipped_lines(&self) -> usize {
        self.skipped_lines
    }

    /// Advances the state machine by one line. Returns the network of a block
    /// closed by this line.
    pub fn feed_line(&mut self, line: &str) -> Option<RcNetwork> {
        self.line_number += 1;
        let line = line.trim();

        if self.in_name_map {
            if self.names.feed_line(line) != SectionLine::End {
                return None;
            }
            self.in_name_map = false;
        }

        if self.block.is_none() {
            if line.starts_with(NAME_MAP_MARKER) {
                self.in_name_map = true;
            } else if line.starts_with(D_NET_MARKER) {
                self.open_block(line);
            }
            return None;
        }

        if line.starts_with(END_MARKER) {
            return self.block.take().map(|block| block.network);
        }

        let block = self.block.as_mut()?;

        if line.starts_with(D_NET_MARKER) {
            warn!(
                "line {}: *D_NET inside net {} ignored (missing *END?)",
                self.line_number,
                block.network.name()
            );
            return None;
        }

        if let Some(section) = Section::from_marker(line) {
            block.section = Some(section);
            return None;
        }

        let accepted = match block.section {
            Some(Section::Connectivity) => {
                Self::connectivity_line(&mut block.network, line, &self.names)
            }
            Some(Section::Capacitance) => Self::capacitance_line(&mut block.network, line),
            Some(Section::Resistance) => Self::resistance_line(&mut block.network, line),
            None => true,
        };

        if !accepted {
            debug!("line {}: skipping malformed line {:?}", self.line_number, line);
            self.skipped_lines += 1;
        }

        None
    }

    fn open_block(&mut self, line: &str) {
        self.blocks_opened += 1;

        let id = match line.split_whitespace().nth(1) {
            Some(token) => strip_star(token),
            None => {
                warn!("line {}: *D_NET without net identifier", self.line_number);
                ""
            }
        };

        self.block = Some(OpenBlock {
            network: RcNetwork::new(self.names.resolve(id), self.units),
            section: None,
        });
    }

    /// `*I <id:port> <dir> ...` and `*P <port> <dir> ...`; other entries such as
    /// `*N` node coordinates are ignored.
    fn connectivity_line(network: &mut RcNetwork, line: &str, names: &NameMap) -> bool {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let kind = fields.first().copied();
        if !matches!(kind, Some("*I") | Some("*P")) {
            return true;
        }
        if fields.len() < 3 {
            return false;
        }

        let raw_node = strip_star(fields[1]);
        let direction = Direction::from_marker(fields[2]);

        if kind == Some("*P") {
            // port directions are stated from outside the design
            network.add_port(raw_node, direction.map(|d| d.reversed()), names);
        } else if !network.add_terminal(raw_node, direction, names) {
            debug!(
                "net {}: terminal {} has no name map entry, dropped",
                network.name(),
                raw_node
            );
        }
        true
    }

    /// `<index> <node> <value>`. Lines with two nodes are coupling capacitors, which
    /// do not contribute to the grounded RC tree.
    fn capacitance_line(network: &mut RcNetwork, line: &str) -> bool {
        let fields: Vec<&str> = line.split_whitespace().collect();
        match fields.len() {
            0..=2 => false,
            3 => match fields[2].parse::<f64>() {
                Ok(value) => {
                    network.set_capacitance(strip_star(fields[1]), value);
                    true
                }
                Err(_) => false,
            },
            _ => {
                debug!(
                    "net {}: coupling capacitor {} - {} skipped",
                    network.name(),
                    fields[1],
                    fields[2]
                );
                true
            }
        }
    }

    /// `<index> <node> <node> <value>`.
    fn resistance_line(network: &mut RcNetwork, line: &str) -> bool {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 4 {
            return false;
        }

        match fields[3].parse::<f64>() {
            Ok(value) => {
                network.add_resistor(strip_star(fields[1]), strip_star(fields[2]), value);
                true
            }
            Err(_) => false,
        }
    }

    fn unterminated_block(&mut self) {
        if let Some(block) = self.block.take() {
            warn!(
                "net {} not closed by *END before end of input, dropped",
                block.network.name()
            );
        }
    }
}

impl<R: BufRead> Iterator for SpefReader<R> {
    type Item = Result<RcNetwork>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        loop {
            match self.lines.next() {
                Some(Ok(line)) => {
                    if let Some(network) = self.feed_line(&line) {
                        return Some(Ok(network));
                    }
                }
                Some(Err(e)) => {
                    self.failed = true;
                    return Some(Err(anyhow::Error::new(e).context(format!(
                        "Failed to read SPEF input after line {}",
                        self.line_number
                    ))));
                }
                None => {
                    self.unterminated_block();
                    return None;
                }
            }
        }
    }
}
