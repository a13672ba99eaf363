//! The `*NAME_MAP` section of a SPEF file.
//!
//! SPEF writers shrink their output by replacing long hierarchical names with
//! `*<digits>` shorthands. [`NameMap`] holds that table and resolves shorthands
//! back to the names the rest of the flow (netlist info, reports) uses.

use std::{collections::HashMap, io::BufRead};

use anyhow::Result;
use lazy_static::*;
use regex::Regex;

use crate::{Symbol, lossy_lines};

/// Keyword opening the name map section.
pub const NAME_MAP_MARKER: &str = "*NAME_MAP";

/// Outcome of feeding one line of the name map section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionLine {
    /// The line was a `*<digits> <name>` entry.
    Entry,
    /// Blank line, the section continues.
    Blank,
    /// Any other line; the section is over and the line belongs to whatever follows.
    End,
}

/// Mapping from numeric shorthand identifiers to long hierarchical names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameMap {
    entries: HashMap<Symbol, Symbol>,
}

impl NameMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scans a whole SPEF source and returns the table found after `*NAME_MAP`.
    ///
    /// Sources without a name map produce an empty table.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut map = NameMap::new();
        let mut in_section = false;

        for line in lossy_lines(reader) {
            let line = line?;
            let line = line.trim();

            if !in_section {
                in_section = line.starts_with(NAME_MAP_MARKER);
                continue;
            }

            if map.feed_line(line) == SectionLine::End {
                break;
            }
        }

        Ok(map)
    }

    /// Feeds one (trimmed) line from inside the name map section.
    pub fn feed_line(&mut self, line: &str) -> SectionLine {
        lazy_static! {
            static ref ENTRY_RE: Regex = Regex::new(r"^\*(\d+)\s+(\S+)$").unwrap();
        }

        if line.is_empty() {
            return SectionLine::Blank;
        }

        match ENTRY_RE.captures(line) {
            Some(c) => {
                self.insert(&c[1], &c[2]);
                SectionLine::Entry
            }
            None => SectionLine::End,
        }
    }

    pub fn insert(&mut self, id: &str, name: &str) {
        self.entries.insert(Symbol::from(id), Symbol::from(name));
    }

    /// Long name for `id`, if the table has one.
    pub fn lookup(&self, id: &str) -> Option<&Symbol> {
        self.entries.get(&Symbol::from(id))
    }

    /// Long name for `id`, or `id` itself when it is not in the table.
    pub fn resolve(&self, id: &str) -> Symbol {
        self.lookup(id).cloned().unwrap_or_else(|| Symbol::from(id))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for NameMap {
    fn from_iter<T: IntoIterator<Item = (&'a str, &'a str)>>(iter: T) -> Self {
        let mut map = NameMap::new();
        for (id, name) in iter {
            map.insert(id, name);
        }
        map
    }
}
