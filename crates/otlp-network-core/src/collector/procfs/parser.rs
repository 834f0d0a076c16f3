//! Parsers for `/proc` network files.
//!
//! These are pure functions that parse the content of various `/proc` files
//! into structured data. They are designed to be easily testable with string inputs.

use std::collections::{BTreeMap, HashMap};

use crate::collector::aggregate::CounterRecord;

/// Error type for parsing failures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("parse error: {message}")]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

// ============ SNMP-style header/value tables ============

/// Protocol label -> field name -> value, as read from `/proc/net/snmp`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnmpTable {
    tables: HashMap<String, HashMap<String, i64>>,
}

impl SnmpTable {
    /// Returns one field of one protocol table.
    pub fn get(&self, label: &str, field: &str) -> Option<i64> {
        self.tables.get(label)?.get(field).copied()
    }

    /// Returns every field parsed for `label`.
    pub fn table(&self, label: &str) -> Option<&HashMap<String, i64>> {
        self.tables.get(label)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Line-at-a-time parser for the alternating header/value table format.
///
/// ```text
/// Tcp: RtoAlgorithm RtoMin RtoMax MaxConn ActiveOpens ...
/// Tcp: 1 200 120000 -1 10 ...
/// ```
///
/// The most recent header stays current until the next header line. A value
/// line is merged against it when the labels match and dropped otherwise;
/// repeated value lines overwrite earlier ones. Individual values that are
/// not integers are skipped, the rest of the line is kept.
#[derive(Debug, Default)]
pub struct SnmpTableParser {
    /// Label and ordered field names of the most recent header line.
    header: Option<(String, Vec<String>)>,
    table: SnmpTable,
}

impl SnmpTableParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes one line of input.
    pub fn feed_line(&mut self, line: &str) {
        let mut tokens = line.split_whitespace();
        let (Some(first), Some(second)) = (tokens.next(), tokens.next()) else {
            return;
        };
        let label = first.strip_suffix(':').unwrap_or(first);

        if second.parse::<i64>().is_err() {
            let fields = std::iter::once(second)
                .chain(tokens)
                .map(str::to_string)
                .collect();
            self.header = Some((label.to_string(), fields));
            return;
        }

        let Some((header_label, fields)) = &self.header else {
            return;
        };
        if header_label != label {
            return;
        }

        let row = self.table.tables.entry(header_label.clone()).or_default();
        let values = std::iter::once(second).chain(tokens);
        for (field, raw) in fields.iter().zip(values) {
            if let Ok(value) = raw.parse::<i64>() {
                row.insert(field.clone(), value);
            }
        }
    }

    /// Returns the accumulated table.
    pub fn finish(self) -> SnmpTable {
        self.table
    }
}

/// Parses `/proc/net/snmp` content. Never fails: malformed content degrades
/// to missing fields.
pub fn parse_net_snmp(content: &str) -> SnmpTable {
    let mut parser = SnmpTableParser::new();
    for line in content.lines() {
        parser.feed_line(line);
    }
    parser.finish()
}

// ============ Network Device Parser ============

/// Per-interface counters from `/proc/net/dev`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetDevStats {
    pub interface: String,
    pub rx_bytes: u64,
    pub rx_packets: u64,
    pub rx_errs: u64,
    pub rx_drop: u64,
    pub tx_bytes: u64,
    pub tx_packets: u64,
    pub tx_errs: u64,
    pub tx_drop: u64,
}

/// Parses `/proc/net/dev` content.
///
/// Format: two header lines, then
/// `iface: rx_bytes rx_packets rx_errs rx_drop rx_fifo rx_frame rx_compressed rx_multicast tx_bytes tx_packets tx_errs tx_drop tx_fifo tx_colls tx_carrier tx_compressed`
pub fn parse_net_dev(content: &str) -> Result<Vec<NetDevStats>, ParseError> {
    let mut devices = Vec::new();

    for line in content.lines() {
        // Skip header lines
        if line.contains('|') || line.trim().is_empty() {
            continue;
        }

        let (interface, counters) = line
            .split_once(':')
            .ok_or_else(|| ParseError::new(format!("missing ':' in net/dev row {line:?}")))?;
        let interface = interface.trim();

        let values = counters
            .split_whitespace()
            .map(|v| v.parse::<u64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ParseError::new(format!("invalid counter for {interface}: {e}")))?;
        if values.len() < 16 {
            return Err(ParseError::new(format!(
                "not enough fields for {}: expected 16, got {}",
                interface,
                values.len()
            )));
        }

        devices.push(NetDevStats {
            interface: interface.to_string(),
            rx_bytes: values[0],
            rx_packets: values[1],
            rx_errs: values[2],
            rx_drop: values[3],
            tx_bytes: values[8],
            tx_packets: values[9],
            tx_errs: values[10],
            tx_drop: values[11],
        });
    }

    Ok(devices)
}

// ============ Softnet Parser ============

/// Parses `/proc/net/softnet_stat` into one counter record per CPU.
///
/// Each row is a list of hexadecimal columns: column 0 is packets processed,
/// column 1 packets dropped because the backlog was full, column 2 the number
/// of times the softirq ran out of budget ("time squeezed").
pub fn parse_softnet_stat(content: &str) -> Result<Vec<CounterRecord>, ParseError> {
    const COLUMNS: [&str; 3] = ["processed", "dropped", "squeezed"];

    let mut cpus = Vec::new();
    for (cpu, line) in content.lines().enumerate() {
        let columns: Vec<&str> = line.split_whitespace().collect();
        if columns.is_empty() {
            continue;
        }
        if columns.len() < COLUMNS.len() {
            return Err(ParseError::new(format!(
                "cpu {cpu}: expected at least {} columns, got {}",
                COLUMNS.len(),
                columns.len()
            )));
        }

        let mut record = CounterRecord::new();
        for (name, raw) in COLUMNS.iter().zip(&columns) {
            let value = i64::from_str_radix(raw, 16)
                .map_err(|_| ParseError::new(format!("cpu {cpu}: invalid hex {raw:?}")))?;
            record.insert(name, value);
        }
        cpus.push(record);
    }

    Ok(cpus)
}

// ============ Wireless Parser ============

/// Link statistics of one wireless interface from `/proc/net/wireless`.
#[derive(Debug, Clone, PartialEq)]
pub struct WirelessStats {
    pub interface: String,
    /// Link quality (driver-specific scale).
    pub link: f64,
    /// Signal level in dBm.
    pub level: f64,
    /// Noise level in dBm.
    pub noise: f64,
}

/// Parses `/proc/net/wireless` content.
///
/// Quality values may carry a trailing `.` flag (`50.`), which is stripped.
pub fn parse_wireless(content: &str) -> Result<Vec<WirelessStats>, ParseError> {
    let mut interfaces = Vec::new();

    for line in content.lines() {
        if line.contains('|') || line.trim().is_empty() {
            continue;
        }

        let (interface, rest) = line
            .split_once(':')
            .ok_or_else(|| ParseError::new(format!("missing ':' in wireless row {line:?}")))?;
        let interface = interface.trim();
        let fields: Vec<&str> = rest.split_whitespace().collect();
        if fields.len() < 4 {
            return Err(ParseError::new(format!(
                "not enough fields for {interface}: expected 4+, got {}",
                fields.len()
            )));
        }

        let quality = |idx: usize, name: &str| -> Result<f64, ParseError> {
            let raw = fields[idx].trim_end_matches('.');
            raw.parse()
                .map_err(|_| ParseError::new(format!("invalid {name} for {interface}: {raw:?}")))
        };

        interfaces.push(WirelessStats {
            interface: interface.to_string(),
            link: quality(1, "link")?,
            level: quality(2, "level")?,
            noise: quality(3, "noise")?,
        });
    }

    Ok(interfaces)
}

// ============ Sockstat Parser ============

/// Per-protocol row of `/proc/net/sockstat`, e.g. `TCP: inuse 10 orphan 0`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SockstatProtocol {
    pub protocol: String,
    pub fields: BTreeMap<String, i64>,
}

impl SockstatProtocol {
    pub fn get(&self, key: &str) -> Option<i64> {
        self.fields.get(key).copied()
    }
}

/// Parsed `/proc/net/sockstat`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sockstat {
    /// Total sockets in use (`sockets: used N`).
    pub used: Option<i64>,
    pub protocols: Vec<SockstatProtocol>,
}

impl Sockstat {
    /// Returns the row for `protocol` (`TCP`, `UDP`, ...).
    pub fn protocol(&self, protocol: &str) -> Option<&SockstatProtocol> {
        self.protocols.iter().find(|p| p.protocol == protocol)
    }
}

/// Parses `/proc/net/sockstat` content.
///
/// Format: `LABEL: key value key value ...`, one label per line.
pub fn parse_sockstat(content: &str) -> Result<Sockstat, ParseError> {
    let mut stats = Sockstat::default();

    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let (label, rest) = line
            .split_once(':')
            .ok_or_else(|| ParseError::new(format!("missing ':' in sockstat row {line:?}")))?;
        let tokens: Vec<&str> = rest.split_whitespace().collect();
        if tokens.len() % 2 != 0 {
            return Err(ParseError::new(format!(
                "{label}: odd number of key/value tokens"
            )));
        }

        let mut fields = BTreeMap::new();
        for pair in tokens.chunks(2) {
            let value = pair[1]
                .parse::<i64>()
                .map_err(|_| ParseError::new(format!("{label}: invalid {} {:?}", pair[0], pair[1])))?;
            fields.insert(pair[0].to_string(), value);
        }

        if label == "sockets" {
            stats.used = fields.get("used").copied();
        } else {
            stats.protocols.push(SockstatProtocol {
                protocol: label.to_string(),
                fields,
            });
        }
    }

    Ok(stats)
}

// ============ Control files ============

/// Parses a control file holding one integer, such as `nf_conntrack_count`.
pub fn parse_single_int(content: &str) -> Result<i64, ParseError> {
    let trimmed = content.trim();
    trimmed
        .parse()
        .map_err(|_| ParseError::new(format!("expected a single integer, got {trimmed:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::scenarios::{NET_DEV, NET_SOCKSTAT, NET_WIRELESS, SOFTNET_STAT};

    #[test]
    fn test_parse_net_snmp_tcp_table() {
        let content = "\
Tcp: ActiveOpens PassiveOpens CurrEstab RetransSegs
Tcp: 10 5 2 5
";
        let table = parse_net_snmp(content);
        let tcp = table.table("Tcp").unwrap();

        assert_eq!(tcp.len(), 4);
        assert_eq!(tcp["ActiveOpens"], 10);
        assert_eq!(tcp["PassiveOpens"], 5);
        assert_eq!(tcp["CurrEstab"], 2);
        assert_eq!(tcp["RetransSegs"], 5);
    }

    #[test]
    fn test_parse_net_snmp_mismatched_label_dropped() {
        let content = "\
Tcp: ActiveOpens PassiveOpens
Udp: 10 5
";
        let table = parse_net_snmp(content);
        assert!(table.table("Udp").is_none());
        assert!(table.table("Tcp").is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn test_parse_net_snmp_repeated_value_lines_last_write_wins() {
        let content = "\
Tcp: ActiveOpens PassiveOpens
Tcp: 10 5
Tcp: 11 6
Udp: InDatagrams
Udp: 7
";
        let table = parse_net_snmp(content);
        assert_eq!(table.get("Tcp", "ActiveOpens"), Some(11));
        assert_eq!(table.get("Tcp", "PassiveOpens"), Some(6));
        assert_eq!(table.get("Udp", "InDatagrams"), Some(7));
    }

    #[test]
    fn test_parse_net_snmp_header_survives_mismatched_value_line() {
        let content = "\
Tcp: CurrEstab
Udp: 1
Tcp: 4
";
        let table = parse_net_snmp(content);
        assert_eq!(table.get("Tcp", "CurrEstab"), Some(4));
        assert!(table.table("Udp").is_none());
    }

    #[test]
    fn test_parse_net_snmp_interleaved_blocks() {
        let content = "\
Tcp: ActiveOpens PassiveOpens
Udp: InDatagrams OutDatagrams
Tcp: 10 5
Udp: 7 8
";
        let table = parse_net_snmp(content);
        assert!(table.table("Tcp").is_none());
        assert_eq!(table.get("Udp", "InDatagrams"), Some(7));
        assert_eq!(table.get("Udp", "OutDatagrams"), Some(8));
    }

    #[test]
    fn test_parse_net_snmp_short_value_line_truncates() {
        let content = "\
Udp: InDatagrams NoPorts InErrors
Udp: 500 10
";
        let table = parse_net_snmp(content);
        assert_eq!(table.get("Udp", "InDatagrams"), Some(500));
        assert_eq!(table.get("Udp", "NoPorts"), Some(10));
        assert_eq!(table.get("Udp", "InErrors"), None);
    }

    #[test]
    fn test_parse_net_snmp_extra_values_ignored() {
        let content = "\
Udp: InDatagrams
Udp: 500 10 20
";
        let table = parse_net_snmp(content);
        assert_eq!(table.table("Udp").unwrap().len(), 1);
        assert_eq!(table.get("Udp", "InDatagrams"), Some(500));
    }

    #[test]
    fn test_parse_net_snmp_bad_value_skips_only_that_field() {
        let content = "\
Tcp: ActiveOpens PassiveOpens CurrEstab RetransSegs
Tcp: 10 oops 2 5
";
        let table = parse_net_snmp(content);
        assert_eq!(table.get("Tcp", "ActiveOpens"), Some(10));
        assert_eq!(table.get("Tcp", "PassiveOpens"), None);
        assert_eq!(table.get("Tcp", "CurrEstab"), Some(2));
        assert_eq!(table.get("Tcp", "RetransSegs"), Some(5));
    }

    #[test]
    fn test_parse_net_snmp_repeated_label_last_write_wins() {
        let content = "\
Tcp: CurrEstab RetransSegs
Tcp: 2 5
Tcp: CurrEstab
Tcp: 9
";
        let table = parse_net_snmp(content);
        assert_eq!(table.get("Tcp", "CurrEstab"), Some(9));
        assert_eq!(table.get("Tcp", "RetransSegs"), Some(5));
    }

    #[test]
    fn test_parse_net_snmp_negative_values() {
        let content = "\
Tcp: RtoAlgorithm MaxConn
Tcp: 1 -1
";
        let table = parse_net_snmp(content);
        assert_eq!(table.get("Tcp", "MaxConn"), Some(-1));
    }

    #[test]
    fn test_parse_net_snmp_ignores_short_lines() {
        let table = parse_net_snmp("Tcp:\n\n   \nTcp: CurrEstab\nTcp: 3\n");
        assert_eq!(table.get("Tcp", "CurrEstab"), Some(3));
    }

    #[test]
    fn test_parse_net_dev() {
        let devices = parse_net_dev(NET_DEV).unwrap();

        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].interface, "lo");
        assert_eq!(devices[0].rx_bytes, 1200);

        assert_eq!(devices[1].interface, "eth0");
        assert_eq!(devices[1].rx_bytes, 5000);
        assert_eq!(devices[1].rx_packets, 50);
        assert_eq!(devices[1].rx_errs, 1);
        assert_eq!(devices[1].rx_drop, 2);
        assert_eq!(devices[1].tx_bytes, 2000);
        assert_eq!(devices[1].tx_packets, 20);
        assert_eq!(devices[1].tx_errs, 3);
        assert_eq!(devices[1].tx_drop, 4);
    }

    #[test]
    fn test_parse_net_dev_truncated_row_is_malformed() {
        let content = "\
Inter-|   Receive |  Transmit
 face |bytes    packets|bytes    packets
  eth0: 5000 50 1 2
";
        let err = parse_net_dev(content).unwrap_err();
        assert!(err.message.contains("eth0"));
    }

    #[test]
    fn test_parse_net_dev_headers_only() {
        let content = "\
Inter-|   Receive |  Transmit
 face |bytes    packets|bytes    packets
";
        assert!(parse_net_dev(content).unwrap().is_empty());
    }

    #[test]
    fn test_parse_softnet_stat() {
        let cpus = parse_softnet_stat(SOFTNET_STAT).unwrap();

        assert_eq!(cpus.len(), 2);
        for cpu in &cpus {
            assert_eq!(cpu["processed"], 100);
            assert_eq!(cpu["dropped"], 1);
            assert_eq!(cpu["squeezed"], 2);
        }
    }

    #[test]
    fn test_parse_softnet_stat_invalid_hex() {
        let err = parse_softnet_stat("0000zz64 00000001 00000002\n").unwrap_err();
        assert!(err.message.contains("invalid hex"));
    }

    #[test]
    fn test_parse_softnet_stat_too_few_columns() {
        assert!(parse_softnet_stat("00000064 00000001\n").is_err());
    }

    #[test]
    fn test_parse_wireless() {
        let interfaces = parse_wireless(NET_WIRELESS).unwrap();

        assert_eq!(interfaces.len(), 1);
        assert_eq!(interfaces[0].interface, "wlan0");
        assert_eq!(interfaces[0].link, 50.0);
        assert_eq!(interfaces[0].level, -40.0);
        assert_eq!(interfaces[0].noise, -256.0);
    }

    #[test]
    fn test_parse_wireless_no_interfaces() {
        let content = "\
Inter-| sta-|   Quality        |   Discarded packets               | Missed | WE
 face | tus | link level noise |  nwid  crypt   frag  retry   misc | beacon | 22
";
        assert!(parse_wireless(content).unwrap().is_empty());
    }

    #[test]
    fn test_parse_sockstat() {
        let stats = parse_sockstat(NET_SOCKSTAT).unwrap();

        assert_eq!(stats.used, Some(100));
        assert_eq!(stats.protocol("TCP").unwrap().get("inuse"), Some(10));
        assert_eq!(stats.protocol("TCP").unwrap().get("tw"), Some(2));
        assert_eq!(stats.protocol("UDP").unwrap().get("inuse"), Some(5));
        assert_eq!(stats.protocol("FRAG").unwrap().get("memory"), Some(0));
        assert!(stats.protocol("SCTP").is_none());
    }

    #[test]
    fn test_parse_sockstat_odd_tokens() {
        assert!(parse_sockstat("TCP: inuse 10 orphan\n").is_err());
    }

    #[test]
    fn test_parse_sockstat_non_integer() {
        assert!(parse_sockstat("sockets: used many\n").is_err());
    }

    #[test]
    fn test_parse_single_int() {
        assert_eq!(parse_single_int("123\n"), Ok(123));
        assert_eq!(parse_single_int("  65536  "), Ok(65536));
        assert!(parse_single_int("").is_err());
        assert!(parse_single_int("12 13").is_err());
    }
}
