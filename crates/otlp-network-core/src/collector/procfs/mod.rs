//! Parsers for the Linux `/proc/net` family of files.
//!
//! Every parser is a pure function over file content, so they can be tested
//! with string fixtures and reused by any collector.

pub mod parser;

pub use parser::{
    NetDevStats, ParseError, SnmpTable, SnmpTableParser, Sockstat, SockstatProtocol,
    WirelessStats, parse_net_dev, parse_net_snmp, parse_single_int, parse_sockstat,
    parse_softnet_stat, parse_wireless,
};
