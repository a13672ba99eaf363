use super::*;
use crate::{Symbol, rc_tree::Direction};
use std::io::{self, Cursor};

const TWO_NETS: &str = r#"*SPEF "IEEE 1481-1998"
*DESIGN "top"
*T_UNIT 1 NS
*C_UNIT 1 PF
*R_UNIT 1 OHM

*NAME_MAP

*1 u_inv
*2 u_nand
*3 u_buf
*10 n_a
*11 n_b

*PORTS
*4 I

*D_NET *10 0.005
*CONN
*I *1:Z O *C 1.0 2.0 *D INVX1
*I *2:A I *C 3.0 4.0 *D NAND2X1
*N *10:1 *C 2.0 3.0
*CAP
1 *1:Z 0.001
2 *10:1 0.002
3 *2:A 0.0015
*RES
1 *1:Z *10:1 2.0
2 *10:1 *2:A 4.0
*END

*D_NET *11 0.001
*CONN
*I *2:Z O
*I *3:A I
*I *99:A I
*CAP
1 *3:A 0.001
*RES
1 *2:Z *3:A 1.0
*END
"#;

fn read_all(input: &str) -> (Vec<RcNetwork>, usize, usize) {
    let mut reader = SpefReader::new(Cursor::new(input.to_owned()), Units::default());
    let nets = reader
        .by_ref()
        .collect::<Result<Vec<_>>>()
        .expect("reading from memory cannot fail");
    (nets, reader.blocks_opened(), reader.skipped_lines())
}

#[test]
fn reads_every_block() {
    let (nets, blocks, skipped) = read_all(TWO_NETS);

    assert_eq!(blocks, 2);
    assert_eq!(skipped, 0);
    assert_eq!(nets.len(), 2);
    assert_eq!(nets[0].name().as_ref(), "n_a");
    assert_eq!(nets[1].name().as_ref(), "n_b");
}

#[test]
fn sections_feed_the_network() {
    let (nets, _, _) = read_all(TWO_NETS);
    let net = &nets[0];

    assert_eq!(net.node_count(), 3);
    assert_eq!(net.resistor_count(), 2);
    assert_eq!(net.edge_resistance("10:1", "1:Z"), Some(2.0));
    assert_eq!(net.edge_resistance("2:A", "10:1"), Some(4.0));
    assert_eq!(net.node_capacitance("10:1"), 0.002);

    assert_eq!(net.pin_identity("1:Z").unwrap().as_ref(), "u_inv/Z");
    assert_eq!(net.pin_identity("2:A").unwrap().as_ref(), "u_nand/A");
    // *N entries are internal nodes, not terminals
    assert!(net.pin_identity("10:1").is_none());

    let directions: Vec<_> = net.terminals().iter().map(|t| t.direction).collect();
    assert_eq!(directions, vec![Some(Direction::Output), Some(Direction::Input)]);
}

#[test]
fn unmapped_terminal_is_dropped() {
    let (nets, _, skipped) = read_all(TWO_NETS);
    let net = &nets[1];

    assert_eq!(skipped, 0);
    assert_eq!(net.terminals().len(), 2);
    assert!(net.pin_identity("99:A").is_none());
}

#[test]
fn name_map_is_read_inline() {
    let mut reader = SpefReader::new(Cursor::new(TWO_NETS), Units::default());
    reader.next();

    assert_eq!(reader.names().len(), 5);
    assert_eq!(reader.names().resolve("4").as_ref(), "4");
}

#[test]
fn unmapped_net_identifier_keeps_its_token() {
    let input = "*D_NET *7 1.0\n*RES\n1 *7:1 *7:2 1.0\n*END\n";
    let (nets, blocks, _) = read_all(input);

    assert_eq!(blocks, 1);
    assert_eq!(nets[0].name().as_ref(), "7");
}

#[test]
fn malformed_lines_are_skipped() {
    let input = r#"
*D_NET n1 1.0
*CAP
1 *1:1
2 *1:2 abc
3 *1:3 0.5
*RES
1 *1:1 *1:2
2 *1:1 *1:3 nope
3 *1:1 *1:3 2.0
*END
"#;
    let (nets, blocks, skipped) = read_all(input);

    assert_eq!(blocks, 1);
    assert_eq!(skipped, 4);
    let net = &nets[0];
    assert_eq!(net.node_capacitance("1:3"), 0.5);
    assert_eq!(net.edge_resistance("1:1", "1:3"), Some(2.0));
    assert_eq!(net.edge_resistance("1:1", "1:2"), None);
}

#[test]
fn coupling_capacitors_are_not_grounded() {
    let input = "*D_NET n1 1.0\n*CAP\n1 *1:1 0.5\n2 *1:1 *9:4 0.25\n*END\n";
    let (nets, _, skipped) = read_all(input);

    assert_eq!(skipped, 0);
    assert_eq!(nets[0].node_capacitance("1:1"), 0.5);
    assert!(!nets[0].contains_node("9:4"));
}

#[test]
fn short_connectivity_line_is_malformed() {
    let input = "*D_NET n1 1.0\n*CONN\n*I *1:Z\n*END\n";
    let (nets, _, skipped) = read_all(input);

    assert_eq!(skipped, 1);
    assert!(nets[0].terminals().is_empty());
}

#[test]
fn ports_resolve_to_bare_names() {
    let input = r#"*NAME_MAP
*4 clk_in
*D_NET *4 1.0
*CONN
*P *4 I
*P rst O
*END
"#;
    let (nets, _, _) = read_all(input);
    let net = &nets[0];

    assert_eq!(net.name().as_ref(), "clk_in");
    assert_eq!(net.pin_identity("4").unwrap().as_ref(), "clk_in");
    assert_eq!(net.pin_identity("rst").unwrap().as_ref(), "rst");

    // an input port drives the net from outside
    let directions: Vec<_> = net.terminals().iter().map(|t| t.direction).collect();
    assert_eq!(directions, vec![Some(Direction::Output), Some(Direction::Input)]);
}

#[test]
fn lines_outside_blocks_are_ignored() {
    let input = r#"
*CAP
1 *1:1 5.0
*D_NET n1 1.0
*CAP
1 *1:1 1.0
*END
*RES
1 *1:1 *1:2 3.0
"#;
    let (nets, blocks, _) = read_all(input);

    assert_eq!(blocks, 1);
    assert_eq!(nets.len(), 1);
    assert_eq!(nets[0].node_capacitance("1:1"), 1.0);
    assert_eq!(nets[0].resistor_count(), 0);
}

#[test]
fn section_state_resets_on_block_open() {
    // the second block has no *RES marker; its line must not be read as a resistor
    let input = r#"
*D_NET n1 1.0
*RES
1 *1:1 *1:2 1.0
*END
*D_NET n2 1.0
1 *2:1 *2:2 1.0
*END
"#;
    let (nets, _, _) = read_all(input);

    assert_eq!(nets[0].resistor_count(), 1);
    assert_eq!(nets[1].resistor_count(), 0);
}

#[test]
fn nested_open_is_ignored() {
    let input = r#"
*D_NET n1 1.0
*RES
1 *1:1 *1:2 1.0
*D_NET n2 1.0
2 *1:2 *1:3 1.0
*END
"#;
    let (nets, blocks, _) = read_all(input);

    assert_eq!(blocks, 1);
    assert_eq!(nets.len(), 1);
    assert_eq!(nets[0].name().as_ref(), "n1");
    assert_eq!(nets[0].resistor_count(), 2);
}

#[test]
fn unterminated_block_is_dropped() {
    let input = "*D_NET n1 1.0\n*RES\n1 *1:1 *1:2 1.0\n";
    let (nets, blocks, _) = read_all(input);

    assert_eq!(blocks, 1);
    assert!(nets.is_empty());
}

#[test]
fn units_are_applied_while_reading() {
    let input = "*D_NET n1 1.0\n*CAP\n1 *1:2 3.0\n*RES\n1 *1:1 *1:2 2.0\n*END\n";
    let units = Units {
        resistance: 1000.0,
        capacitance: 1e-3,
    };
    let nets: Vec<_> = SpefReader::new(Cursor::new(input), units)
        .collect::<Result<_>>()
        .unwrap();

    assert_eq!(nets[0].edge_resistance("1:1", "1:2"), Some(2000.0));
    assert_eq!(nets[0].node_capacitance("1:2"), 3.0 * 1e-3);
}

#[test]
fn preset_name_map() {
    let names: NameMap = [("5", "u_ff")].into_iter().collect();
    let input = "*D_NET net9 1.0\n*CONN\n*I *5:Q O\n*END\n";
    let mut reader = SpefReader::new(Cursor::new(input), Units::default()).with_name_map(names);
    let net = reader.next().unwrap().unwrap();

    assert_eq!(
        net.pin_lookup().get(&Symbol::from("u_ff/Q")).map(|s| s.as_ref()),
        Some("5:Q")
    );
}

#[test]
fn indented_lines_are_accepted() {
    let input = "  *D_NET n1 1.0\n\t*RES\n   1 *1:1 *1:2 1.0\n  *END\n";
    let (nets, _, _) = read_all(input);
    assert_eq!(nets[0].resistor_count(), 1);
}

#[test]
fn read_error_ends_iteration() {
    struct Failing;

    impl io::Read for Failing {
        fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::other("disk on fire"))
        }
    }

    let mut reader = SpefReader::new(BufReader::new(Failing), Units::default());
    assert!(matches!(reader.next(), Some(Err(_))));
    assert!(reader.next().is_none());
}

#[test]
fn invalid_utf8_does_not_stop_the_stream() {
    let mut input = b"*SPEF \"IEEE 1481-1998\"\n*DESIGN \"caf\xe9\"\n".to_vec();
    input.extend_from_slice(
        b"*NAME_MAP\n*1 u_drv\n*2 u_a\n\n\
          *D_NET n1 0.5\n*CONN\n*I *1:Z O\n*I *2:A I\n\
          *CAP\n1 *2:A 0.5\n*RES\n1 *1:Z *2:A 2.0 // \xff\xfe\n*END\n",
    );

    let mut reader = SpefReader::new(Cursor::new(input), Units::default());
    let results: Vec<_> = reader.by_ref().collect();

    assert_eq!(results.len(), 1);
    let net = results[0].as_ref().unwrap();
    assert_eq!(net.name().as_ref(), "n1");
    assert_eq!(net.pin_identity("1:Z").unwrap().as_ref(), "u_drv/Z");
    assert_eq!(net.edge_resistance("1:Z", "2:A"), Some(2.0));
    assert_eq!(reader.blocks_opened(), 1);
}

#[test]
fn missing_file_is_an_error() {
    let result = SpefReader::open(Path::new("/nonexistent/design.spef"), Units::default());
    assert!(result.is_err());
}
