//! Elmore delay estimation on a single [`RcNetwork`].
//!
//! The network is rooted at the driver node by an iterative depth-first traversal.
//! Every visited node records the node it was first reached from; nodes the
//! traversal never reaches stay unrooted and any load among them is reported as
//! unreachable.
//!
//! The delay to a load is the sum, over the edges of its root path, of the edge
//! resistance times the total capacitance downstream of that edge:
//!
//! ```text
//! T(load) = Σ R(u, v) · C_subtree(v)     for each (u, v) on driver → load
//! ```
//!
//! The network is not checked for cycles. A resistor closing a loop is simply not
//! part of the rooted tree (first visit wins); [`RootedTree::redundant_edges`]
//! tells how many were left out.

use std::{collections::HashMap, f64::consts::LN_2};

use clap::ValueEnum;
use petgraph::{
    graph::NodeIndex,
    visit::{VisitMap, Visitable},
};

use super::RcNetwork;
use crate::Symbol;

/// Scale applied to every delay after accumulation.
pub const UNIT_SCALE: f64 = 1e-6;

/// Which delay figure is derived from the Elmore time constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum DelayMetric {
    /// The raw Elmore time constant.
    #[default]
    Elmore,
    /// 50% threshold propagation delay, the time constant scaled by ln(2).
    Ln2,
}

impl DelayMetric {
    pub fn factor(&self) -> f64 {
        match self {
            DelayMetric::Elmore => 1.0,
            DelayMetric::Ln2 => LN_2,
        }
    }
}

/// An [`RcNetwork`] rooted at a driver node.
#[derive(Debug, Clone)]
pub struct RootedTree<'a> {
    network: &'a RcNetwork,
    root: NodeIndex,
    order: Vec<NodeIndex>,
    parent: Vec<Option<NodeIndex>>,
    subtree_capacitance: Vec<f64>,
}

impl<'a> RootedTree<'a> {
    /// Roots `network` at `driver`. Returns `None` when the driver is not a node of
    /// the network.
    pub fn new(network: &'a RcNetwork, driver: &str) -> Option<Self> {
        let root = network.index_of(driver)?;
        let graph = network.graph();
        let node_count = graph.node_count();

        let mut discovered = graph.visit_map();
        let mut parent = vec![None; node_count];
        let mut order = Vec::new();
        let mut stack = vec![(root, None)];

        while let Some((node, from)) = stack.pop() {
            if !discovered.visit(node) {
                continue;
            }
            parent[node.index()] = from;
            order.push(node);

            for neighbor in graph.neighbors(node) {
                if Some(neighbor) != from {
                    stack.push((neighbor, Some(node)));
                }
            }
        }

        // reverse visitation order puts every child before its parent
        let mut subtree_capacitance = vec![0.0; node_count];
        for &node in order.iter().rev() {
            let mut cap = graph[node].capacitance;
            for child in graph.neighbors(node) {
                if parent[child.index()] == Some(node) {
                    cap += subtree_capacitance[child.index()];
                }
            }
            subtree_capacitance[node.index()] = cap;
        }

        Some(Self {
            network,
            root,
            order,
            parent,
            subtree_capacitance,
        })
    }

    pub fn root(&self) -> &Symbol {
        &self.network.graph()[self.root].id
    }

    /// Nodes in visitation order, root first.
    pub fn visited(&self) -> impl Iterator<Item = &Symbol> {
        self.order.iter().map(|&ix| &self.network.graph()[ix].id)
    }

    pub fn is_reachable(&self, node: &str) -> bool {
        self.reached(node).is_some()
    }

    fn reached(&self, node: &str) -> Option<NodeIndex> {
        let ix = self.network.index_of(node)?;
        self.reached_index(ix).then_some(ix)
    }

    /// Total capacitance at and below `node`, or `None` when it is not reachable.
    pub fn subtree_capacitance(&self, node: &str) -> Option<f64> {
        self.reached(node).map(|ix| self.subtree_capacitance[ix.index()])
    }

    /// Node sequence from the root down to `node`.
    pub fn path_to(&self, node: &str) -> Option<Vec<&Symbol>> {
        let graph = self.network.graph();
        Some(
            self.path_indices(self.reached(node)?)
                .into_iter()
                .map(|ix| &graph[ix].id)
                .collect(),
        )
    }

    fn path_indices(&self, target: NodeIndex) -> Vec<NodeIndex> {
        let mut path = vec![target];
        let mut current = target;
        while let Some(up) = self.parent[current.index()] {
            path.push(up);
            current = up;
        }
        path.reverse();
        path
    }

    /// Delay from the root to `load`, or `None` when the load is unreachable.
    pub fn delay_to(&self, load: &str, metric: DelayMetric) -> Option<f64> {
        let graph = self.network.graph();
        let path = self.path_indices(self.reached(load)?);

        let time_constant: f64 = path
            .windows(2)
            .map(|edge| {
                let (u, v) = (edge[0], edge[1]);
                let resistance = graph.find_edge(u, v).map(|e| graph[e]).unwrap_or(0.0);
                resistance * self.subtree_capacitance[v.index()]
            })
            .sum();

        Some(time_constant * metric.factor() * UNIT_SCALE)
    }

    /// Resistors inside the reachable component that the rooted tree left out.
    pub fn redundant_edges(&self) -> usize {
        let graph = self.network.graph();
        let reachable = graph
            .edge_indices()
            .filter(|&e| {
                graph
                    .edge_endpoints(e)
                    .is_some_and(|(u, _)| self.reached_index(u))
            })
            .count();

        reachable + 1 - self.order.len()
    }

    fn reached_index(&self, ix: NodeIndex) -> bool {
        ix == self.root || self.parent[ix.index()].is_some()
    }
}

/// Computes the delay from `driver` to each of `loads`.
///
/// Loads that cannot be reached from the driver map to `None`, as do all loads when
/// the driver is not part of the network.
pub fn compute_delays(
    network: &RcNetwork,
    driver: &str,
    loads: &[Symbol],
    metric: DelayMetric,
) -> HashMap<Symbol, Option<f64>> {
    match RootedTree::new(network, driver) {
        Some(tree) => loads
            .iter()
            .map(|load| (load.clone(), tree.delay_to(load, metric)))
            .collect(),
        None => loads.iter().map(|load| (load.clone(), None)).collect(),
    }
}
