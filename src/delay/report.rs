//! Per-net delay reporting.
//!
//! Matches the driver and load pins a [`PinRoles`] source names for a net against
//! the pin identities of its [`RcNetwork`], runs the Elmore engine once per driver
//! and turns the result into [`DelayRecord`]s.

use std::{
    borrow::Cow,
    collections::HashMap,
    fmt,
    io::{self, Write},
};

use log::{debug, warn};

use crate::{
    Symbol,
    netlist_info::{NetInfo, NetIo},
    rc_tree::{DelayMetric, RcNetwork, RootedTree},
};

/// Delay written for a load the driver cannot reach.
pub const UNREACHABLE_DELAY: f64 = -1.0;

/// One line of the delay table.
#[derive(Debug, Clone, PartialEq)]
pub struct DelayRecord {
    pub load: Symbol,
    pub driver: Symbol,
    /// `None` when the load is unreachable; written as [`UNREACHABLE_DELAY`].
    pub delay: Option<f64>,
}

impl DelayRecord {
    pub fn is_unreachable(&self) -> bool {
        self.delay.is_none()
    }
}

impl fmt::Display for DelayRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let delay = self.delay.unwrap_or(UNREACHABLE_DELAY);
        write!(f, "{} {} {:.6}", self.load, self.driver, delay)
    }
}

/// Source of the driver and load pins of a net.
pub trait PinRoles: Sync {
    /// Pins of `network`, or `None` when the source has no entry for it.
    fn roles<'a>(&'a self, network: &RcNetwork) -> Option<Cow<'a, NetIo>>;
}

impl PinRoles for NetInfo {
    fn roles<'a>(&'a self, network: &RcNetwork) -> Option<Cow<'a, NetIo>> {
        self.get(network.name()).map(Cow::Borrowed)
    }
}

/// Takes pin roles from the direction markers of the `*CONN` section: output pins
/// drive, input pins load, bidirectional pins do both.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectivityRoles;

impl PinRoles for ConnectivityRoles {
    fn roles<'a>(&'a self, network: &RcNetwork) -> Option<Cow<'a, NetIo>> {
        let mut io = NetIo::default();
        for terminal in network.terminals() {
            let Some(direction) = terminal.direction else {
                continue;
            };
            if direction.drives() {
                io.drivers.push(terminal.pin.clone());
            }
            if direction.loads() {
                io.loads.push(terminal.pin.clone());
            }
        }
        Some(Cow::Owned(io))
    }
}

/// Delay records and diagnostics of one net.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetReport {
    pub net: Symbol,
    pub records: Vec<DelayRecord>,
    /// The role source had an entry for the net.
    pub matched: bool,
    pub unresolved_pins: usize,
    pub unreachable_loads: usize,
    /// Resistors dropped while rooting the network, summed over drivers.
    pub redundant_edges: usize,
}

/// Computes the delay table of one net.
pub fn report_network<P: PinRoles + ?Sized>(
    network: &RcNetwork,
    roles: &P,
    metric: DelayMetric,
) -> NetReport {
    let net = network.name();
    let mut report = NetReport {
        net: net.clone(),
        ..Default::default()
    };

    let Some(io) = roles.roles(network) else {
        warn!("net {} has no netlist information", net);
        return report;
    };
    report.matched = true;

    let pin_nodes = network.pin_lookup();
    let loads = resolve_pins(net, &io.loads, &pin_nodes, "load", &mut report);

    for driver in &io.drivers {
        let Some(driver_node) = pin_nodes.get(driver) else {
            warn!("net {}: driver pin {} not found among terminals", net, driver);
            report.unresolved_pins += 1;
            continue;
        };

        if loads.is_empty() {
            continue;
        }

        let tree = RootedTree::new(network, driver_node);
        if let Some(tree) = &tree {
            report.redundant_edges += tree.redundant_edges();
        }

        for (load, load_node) in &loads {
            // a bidirectional pin is listed on both sides
            if load == driver {
                continue;
            }

            let delay = tree.as_ref().and_then(|t| t.delay_to(load_node, metric));
            if delay.is_none() {
                debug!("net {}: {} unreachable from {}", net, load, driver);
                report.unreachable_loads += 1;
            }

            report.records.push(DelayRecord {
                load: load.clone(),
                driver: driver.clone(),
                delay,
            });
        }
    }

    if report.redundant_edges > 0 {
        debug!(
            "net {}: {} resistors close loops and were left out",
            net, report.redundant_edges
        );
    }

    report
}

fn resolve_pins(
    net: &Symbol,
    pins: &[Symbol],
    pin_nodes: &HashMap<Symbol, Symbol>,
    role: &str,
    report: &mut NetReport,
) -> Vec<(Symbol, Symbol)> {
    pins.iter()
        .filter_map(|pin| match pin_nodes.get(pin) {
            Some(node) => Some((pin.clone(), node.clone())),
            None => {
                warn!("net {}: {} pin {} not found among terminals", net, role, pin);
                report.unresolved_pins += 1;
                None
            }
        })
        .collect()
}

/// Writes records as `<load> <driver> <delay>` lines.
pub fn write_records(writer: &mut dyn Write, records: &[DelayRecord]) -> io::Result<()> {
    for record in records {
        writeln!(writer, "{}", record)?;
    }
    Ok(())
}
