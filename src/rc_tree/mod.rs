//! Per-net RC networks built from the `*CONN`, `*CAP` and `*RES` sections of a `*D_NET` block.
//!
//! # Overview
//!
//! An [`RcNetwork`] is an undirected resistor graph whose nodes carry a lumped
//! capacitance to ground. Nodes are identified by the raw SPEF node token with the
//! leading `*` removed (for example `12:Z` or `3:7`), which is how the `*CAP` and
//! `*RES` sections refer to them.
//!
//! Nodes that are net terminals additionally get a resolved pin identity
//! (`<instance>/<port>`), derived from the [`NameMap`] while scanning `*CONN`. Delay
//! reporting uses those identities to find the raw nodes for the driver and load
//! pins named by the netlist information.
//!
//! A network lives for exactly one `*D_NET` block: it is built while the block is
//! scanned, handed to the delay engine ([`elmore`]) once the block closes and then
//! dropped.
//!
//! # Example
//!
//! ```
//! use elmore::rc_tree::{RcNetwork, Units};
//!
//! let mut net = RcNetwork::new("n1".into(), Units::default());
//! net.add_resistor("1:1", "1:2", 2.0);
//! net.set_capacitance("1:2", 3.0);
//!
//! assert_eq!(net.edge_resistance("1:2", "1:1"), Some(2.0));
//! assert_eq!(net.node_capacitance("1:2"), 3.0);
//! ```

pub mod elmore;

pub use elmore::{DelayMetric, RootedTree, UNIT_SCALE, compute_delays};

use std::{collections::HashMap, fmt};

use petgraph::graph::{NodeIndex, UnGraph};

use crate::{Symbol, spef::NameMap};

/// Scale factors applied to raw `*RES` and `*CAP` values as they are stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Units {
    pub resistance: f64,
    pub capacitance: f64,
}

impl Default for Units {
    fn default() -> Self {
        Self {
            resistance: 1.0,
            capacitance: 1.0,
        }
    }
}

/// Direction marker of a `*CONN` terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Input,
    Output,
    Bidirectional,
}

impl Direction {
    /// Parses the `I` / `O` / `B` marker following a terminal token.
    pub fn from_marker(marker: &str) -> Option<Self> {
        match marker {
            "I" => Some(Direction::Input),
            "O" => Some(Direction::Output),
            "B" => Some(Direction::Bidirectional),
            _ => None,
        }
    }

    /// The same terminal seen from the other side of the design boundary.
    pub fn reversed(&self) -> Self {
        match self {
            Direction::Input => Direction::Output,
            Direction::Output => Direction::Input,
            Direction::Bidirectional => Direction::Bidirectional,
        }
    }

    /// Drives the net.
    pub fn drives(&self) -> bool {
        matches!(self, Direction::Output | Direction::Bidirectional)
    }

    /// Receives from the net.
    pub fn loads(&self) -> bool {
        matches!(self, Direction::Input | Direction::Bidirectional)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Input => write!(f, "I"),
            Direction::Output => write!(f, "O"),
            Direction::Bidirectional => write!(f, "B"),
        }
    }
}

/// A net terminal declared in `*CONN` whose name could be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Terminal {
    /// Raw node identifier, as used by `*CAP` and `*RES`.
    pub node: Symbol,
    /// Resolved pin name.
    pub pin: Symbol,
    /// Direction relative to the net: `Output` terminals drive it.
    pub direction: Option<Direction>,
}

/// Node weight of the resistor graph.
#[derive(Debug, Clone, PartialEq)]
pub struct RcNode {
    pub id: Symbol,
    /// Lumped capacitance to ground, already scaled. Zero unless set.
    pub capacitance: f64,
}

impl fmt::Display for RcNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// Resistor graph; edge weights are scaled resistances.
pub type RcGraph = UnGraph<RcNode, f64>;

/// RC parasitic network of a single net.
#[derive(Debug, Clone)]
pub struct RcNetwork {
    name: Symbol,
    units: Units,
    graph: RcGraph,
    nodes: HashMap<Symbol, NodeIndex>,
    terminals: Vec<Terminal>,
    terminal_index: HashMap<Symbol, usize>,
}

impl RcNetwork {
    pub fn new(name: Symbol, units: Units) -> Self {
        Self {
            name,
            units,
            graph: RcGraph::default(),
            nodes: HashMap::new(),
            terminals: Vec::new(),
            terminal_index: HashMap::new(),
        }
    }

    /// Resolved net name.
    pub fn name(&self) -> &Symbol {
        &self.name
    }

    pub fn units(&self) -> Units {
        self.units
    }

    /// Records the pin identity of an instance terminal token `<id>:<port>`.
    ///
    /// The identifier part is looked up in `names`; the terminal is dropped when it
    /// has no entry or when the token has no `:`. Returns whether a terminal was
    /// recorded. Restating a terminal overwrites its identity and direction.
    pub fn add_terminal(
        &mut self,
        raw_node: &str,
        direction: Option<Direction>,
        names: &NameMap,
    ) -> bool {
        let Some((id, port)) = raw_node.split_once(':') else {
            return false;
        };
        let Some(instance) = names.lookup(id) else {
            return false;
        };

        let pin = Symbol::from(format!("{}/{}", instance, port));
        self.record_terminal(raw_node, pin, direction);
        true
    }

    /// Records a top-level port terminal (`*P` entry).
    ///
    /// Ports have no instance part, so the identity is the resolved port name itself,
    /// falling back to the raw token when it is not in `names`.
    pub fn add_port(&mut self, raw_node: &str, direction: Option<Direction>, names: &NameMap) {
        let pin = names.resolve(raw_node);
        self.record_terminal(raw_node, pin, direction);
    }

    fn record_terminal(&mut self, raw_node: &str, pin: Symbol, direction: Option<Direction>) {
        let node = Symbol::from(raw_node);
        match self.terminal_index.get(&node) {
            Some(&i) => {
                self.terminals[i].pin = pin;
                self.terminals[i].direction = direction;
            }
            None => {
                self.terminal_index.insert(node.clone(), self.terminals.len());
                self.terminals.push(Terminal {
                    node,
                    pin,
                    direction,
                });
            }
        }
    }

    /// Stores `value × capacitance unit` as the node's lumped capacitance.
    pub fn set_capacitance(&mut self, node: &str, value: f64) {
        let ix = self.ensure_node(node);
        self.graph[ix].capacitance = value * self.units.capacitance;
    }

    /// Connects `a` and `b` with a resistor of `value × resistance unit`.
    ///
    /// Restating an existing resistor replaces its value.
    pub fn add_resistor(&mut self, a: &str, b: &str, value: f64) {
        let ia = self.ensure_node(a);
        let ib = self.ensure_node(b);
        self.graph.update_edge(ia, ib, value * self.units.resistance);
    }

    fn ensure_node(&mut self, node: &str) -> NodeIndex {
        let id = Symbol::from(node);
        if let Some(&ix) = self.nodes.get(&id) {
            return ix;
        }

        let ix = self.graph.add_node(RcNode {
            id: id.clone(),
            capacitance: 0.0,
        });
        self.nodes.insert(id, ix);
        ix
    }

    /// Scaled resistance between two nodes, in either order.
    pub fn edge_resistance(&self, a: &str, b: &str) -> Option<f64> {
        let ia = self.index_of(a)?;
        let ib = self.index_of(b)?;
        self.graph.find_edge(ia, ib).map(|e| self.graph[e])
    }

    /// Scaled lumped capacitance; zero for nodes without a `*CAP` entry.
    pub fn node_capacitance(&self, node: &str) -> f64 {
        self.index_of(node)
            .map(|ix| self.graph[ix].capacitance)
            .unwrap_or(0.0)
    }

    /// Nodes connected to `node` by a resistor.
    pub fn neighbors<'a>(&'a self, node: &str) -> impl Iterator<Item = &'a Symbol> {
        self.index_of(node)
            .into_iter()
            .flat_map(move |ix| self.graph.neighbors(ix))
            .map(move |n| &self.graph[n].id)
    }

    pub fn contains_node(&self, node: &str) -> bool {
        self.index_of(node).is_some()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn resistor_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Resolved pin name of a terminal node.
    pub fn pin_identity(&self, node: &str) -> Option<&Symbol> {
        self.terminal_index
            .get(&Symbol::from(node))
            .map(|&i| &self.terminals[i].pin)
    }

    /// Terminals in declaration order.
    pub fn terminals(&self) -> &[Terminal] {
        &self.terminals
    }

    /// Reverse of the pin identity table: pin name to raw node.
    ///
    /// Built fresh on every call. When two terminals share a pin name the one
    /// declared last wins.
    pub fn pin_lookup(&self) -> HashMap<Symbol, Symbol> {
        self.terminals
            .iter()
            .map(|t| (t.pin.clone(), t.node.clone()))
            .collect()
    }

    pub fn graph(&self) -> &RcGraph {
        &self.graph
    }

    pub fn index_of(&self, node: &str) -> Option<NodeIndex> {
        self.nodes.get(&Symbol::from(node)).copied()
    }
}
