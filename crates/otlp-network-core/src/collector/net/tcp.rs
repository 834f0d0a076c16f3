//! TCP connection counters from `/proc/net/snmp`.

use std::sync::Arc;

use crate::collector::procfs::{SnmpTable, parse_net_snmp};
use crate::collector::source::ProcSource;
use crate::collector::traits::FileSystem;
use crate::error::SetupError;
use crate::telemetry::{CollectStatus, Instrument, Meter, Observer};

use super::CollectorKind;
use super::paths::SNMP;

struct TcpInstruments {
    current: Instrument<i64>,
    total: Instrument<i64>,
    retransmit: Instrument<i64>,
}

impl TcpInstruments {
    fn observe(&self, obs: &mut Observer<'_>, snmp: &SnmpTable) {
        if let Some(v) = snmp.get("Tcp", "CurrEstab") {
            obs.observe(&self.current, v, &[]);
        }

        let active = snmp.get("Tcp", "ActiveOpens");
        let passive = snmp.get("Tcp", "PassiveOpens");
        if active.is_some() || passive.is_some() {
            let total = active.unwrap_or(0).wrapping_add(passive.unwrap_or(0));
            obs.observe(&self.total, total, &[]);
        }

        if let Some(v) = snmp.get("Tcp", "RetransSegs") {
            obs.observe(&self.retransmit, v, &[]);
        }
    }
}

pub fn register<F: FileSystem + 'static>(
    meter: &mut Meter,
    source: Arc<ProcSource<F>>,
) -> Result<(), SetupError> {
    let instruments = TcpInstruments {
        current: meter
            .i64_gauge("tcp.connection.current")
            .with_description("Current TCP connections")
            .with_unit("{connection}")
            .build()?,
        total: meter
            .i64_counter("tcp.connection.total")
            .with_description("Total TCP connections opened")
            .build()?,
        retransmit: meter
            .i64_counter("tcp.retransmit")
            .with_description("TCP segments retransmitted")
            .build()?,
    };
    let ids = [
        instruments.current.id(),
        instruments.total.id(),
        instruments.retransmit.id(),
    ];

    meter.register_callback(CollectorKind::Tcp.name(), &ids, move |obs| {
        let Some(content) = source.read(SNMP)? else {
            return Ok(CollectStatus::Absent);
        };
        instruments.observe(obs, &parse_net_snmp(&content));
        Ok(CollectStatus::Reported)
    })
}

#[cfg(test)]
mod tests {
    use super::super::testing::collect_once;
    use super::*;
    use crate::collector::mock::MockFs;
    use crate::telemetry::{CollectOutcome, Value};

    #[test]
    fn test_tcp_from_snmp() {
        let pass = collect_once(&MockFs::network_host(), CollectorKind::Tcp);

        let value = |name: &str| pass.metric(name).and_then(|m| m.value(&[]));
        assert_eq!(value("tcp.connection.current"), Some(Value::I64(2)));
        assert_eq!(value("tcp.connection.total"), Some(Value::I64(15)));
        assert_eq!(value("tcp.retransmit"), Some(Value::I64(5)));
    }

    #[test]
    fn test_tcp_missing_snmp_is_absent() {
        let fs = MockFs::new();
        fs.add_dir("/proc/net");
        let pass = collect_once(&fs, CollectorKind::Tcp);

        assert!(pass.metrics.is_empty());
        assert!(matches!(
            pass.report("tcp").unwrap().outcome,
            CollectOutcome::Absent
        ));
    }

    #[test]
    fn test_tcp_partial_table() {
        let fs = MockFs::new();
        fs.add_file("/proc/net/snmp", "Tcp: CurrEstab\nTcp: 4\n");
        let pass = collect_once(&fs, CollectorKind::Tcp);

        assert_eq!(
            pass.metric("tcp.connection.current").unwrap().value(&[]),
            Some(Value::I64(4))
        );
        assert!(pass.metric("tcp.connection.total").is_none());
        assert!(pass.metric("tcp.retransmit").is_none());
    }

    #[test]
    fn test_tcp_reads_fresh_each_pass() {
        let fs = MockFs::network_host();
        let meter = super::super::testing::meter_with(
            &fs,
            &[CollectorKind::Tcp],
            Default::default(),
        );

        let first = meter.collect();
        fs.add_file(
            "/proc/net/snmp",
            "Tcp: CurrEstab RetransSegs\nTcp: 3 9\n",
        );
        let second = meter.collect();

        let current = |pass: &crate::telemetry::CollectionPass| {
            pass.metric("tcp.connection.current").unwrap().value(&[])
        };
        assert_eq!(current(&first), Some(Value::I64(2)));
        assert_eq!(current(&second), Some(Value::I64(3)));
    }
}
