//! Benchmarks for Elmore delay extraction
//!
//! Synthetic nets of increasing size are used for the engine alone and for the
//! full SPEF to delay table pipeline, sequential and parallel.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use elmore::Symbol;
use elmore::delay::{ConnectivityRoles, ExtractOptions, extract_delays};
use elmore::rc_tree::{DelayMetric, RcNetwork, Units, compute_delays};
use elmore::spef::SpefReader;
use std::io::{Cursor, sink};

/// Chain of `length` resistors from `0` to `length`.
fn chain(length: usize) -> RcNetwork {
    let mut net = RcNetwork::new("chain".into(), Units::default());
    for i in 0..length {
        net.add_resistor(&i.to_string(), &(i + 1).to_string(), 0.5);
        net.set_capacitance(&(i + 1).to_string(), 0.01);
    }
    net
}

/// Star with `fanout` two-segment branches hanging off the driver node `0`.
fn fan_out(fanout: usize) -> RcNetwork {
    let mut net = RcNetwork::new("fan_out".into(), Units::default());
    for i in 0..fanout {
        let mid = format!("m{}", i);
        let leaf = format!("l{}", i);
        net.add_resistor("0", &mid, 1.0);
        net.add_resistor(&mid, &leaf, 2.0);
        net.set_capacitance(&mid, 0.02);
        net.set_capacitance(&leaf, 0.05);
    }
    net
}

/// SPEF text with `nets` blocks, each driving `fanout` loads.
fn synthetic_spef(nets: usize, fanout: usize) -> String {
    let mut spef = String::from("*NAME_MAP\n*1 u_drv\n");
    for i in 0..fanout {
        spef.push_str(&format!("*{} u_load{}\n", i + 2, i));
    }

    for n in 0..nets {
        spef.push_str(&format!("\n*D_NET net{} 1.0\n*CONN\n*I *1:Z O\n", n));
        for i in 0..fanout {
            spef.push_str(&format!("*I *{}:A I\n", i + 2));
        }
        spef.push_str("*CAP\n");
        for i in 0..fanout {
            spef.push_str(&format!("{} *{}:A 0.01\n", i + 1, i + 2));
        }
        spef.push_str("*RES\n");
        for i in 0..fanout {
            spef.push_str(&format!("{} *1:Z *{}:A {}\n", i + 1, i + 2, 1.0 + i as f64));
        }
        spef.push_str("*END\n");
    }
    spef
}

fn bench_engine(c: &mut Criterion) {
    let mut group = c.benchmark_group("elmore_engine");

    for &size in &[100usize, 1_000, 10_000] {
        group.throughput(Throughput::Elements(size as u64));

        let net = chain(size);
        let loads = vec![Symbol::from(size.to_string())];
        group.bench_with_input(
            BenchmarkId::new("chain", size),
            &(net, loads),
            |b, (net, loads)| {
                b.iter(|| black_box(compute_delays(black_box(net), "0", loads, DelayMetric::Elmore)))
            },
        );

        let net = fan_out(size);
        let loads: Vec<Symbol> = (0..size).map(|i| Symbol::from(format!("l{}", i))).collect();
        group.bench_with_input(
            BenchmarkId::new("fan_out", size),
            &(net, loads),
            |b, (net, loads)| {
                b.iter(|| black_box(compute_delays(black_box(net), "0", loads, DelayMetric::Elmore)))
            },
        );
    }

    group.finish();
}

fn bench_extraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("spef_extraction");
    let spef = synthetic_spef(2_000, 8);
    group.throughput(Throughput::Bytes(spef.len() as u64));

    for &jobs in &[1usize, 0] {
        let options = ExtractOptions {
            jobs,
            ..Default::default()
        };
        let name = if jobs == 1 { "sequential" } else { "parallel" };

        group.bench_with_input(BenchmarkId::new(name, "2000x8"), &spef, |b, spef| {
            b.iter(|| {
                let reader = SpefReader::new(Cursor::new(spef.as_bytes()), options.units);
                extract_delays(reader, &ConnectivityRoles, &options, &mut sink())
                    .expect("extraction from memory cannot fail")
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_engine, bench_extraction);
criterion_main!(benches);
