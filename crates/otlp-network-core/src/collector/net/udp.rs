//! UDP datagram and drop counters from `/proc/net/snmp`.

use std::sync::Arc;

use crate::collector::procfs::{SnmpTable, parse_net_snmp};
use crate::collector::source::ProcSource;
use crate::collector::traits::FileSystem;
use crate::error::SetupError;
use crate::telemetry::{CollectStatus, Instrument, Meter, Observer};

use super::CollectorKind;
use super::paths::SNMP;

/// SNMP field, `udp.packets` attributes.
const PACKETS: [(&str, &[(&str, &str)]); 3] = [
    ("InDatagrams", &[("direction", "in"), ("type", "datagrams")]),
    ("OutDatagrams", &[("direction", "out"), ("type", "datagrams")]),
    ("InErrors", &[("type", "errors")]),
];

/// SNMP field, `udp.drops` reason.
const DROPS: [(&str, &str); 2] = [("NoPorts", "no_port"), ("RcvbufErrors", "rcv_buf")];

struct UdpInstruments {
    packets: Instrument<i64>,
    drops: Instrument<i64>,
}

impl UdpInstruments {
    fn observe(&self, obs: &mut Observer<'_>, snmp: &SnmpTable) {
        for (field, attributes) in PACKETS {
            if let Some(v) = snmp.get("Udp", field) {
                obs.observe(&self.packets, v, attributes);
            }
        }
        for (field, reason) in DROPS {
            if let Some(v) = snmp.get("Udp", field) {
                obs.observe(&self.drops, v, &[("reason", reason)]);
            }
        }
    }
}

pub fn register<F: FileSystem + 'static>(
    meter: &mut Meter,
    source: Arc<ProcSource<F>>,
) -> Result<(), SetupError> {
    let instruments = UdpInstruments {
        packets: meter
            .i64_counter("udp.packets")
            .with_description("UDP packets statistics")
            .with_attribute_keys(&["direction", "type"])
            .build()?,
        drops: meter
            .i64_counter("udp.drops")
            .with_description("UDP drops statistics")
            .with_attribute_keys(&["reason"])
            .build()?,
    };
    let ids = [instruments.packets.id(), instruments.drops.id()];

    meter.register_callback(CollectorKind::Udp.name(), &ids, move |obs| {
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
    use crate::telemetry::Value;

    #[test]
    fn test_udp_from_snmp() {
        let pass = collect_once(&MockFs::network_host(), CollectorKind::Udp);

        let packets = pass.metric("udp.packets").unwrap();
        assert_eq!(packets.points.len(), 3);
        assert_eq!(
            packets.value(&[("direction", "in"), ("type", "datagrams")]),
            Some(Value::I64(500))
        );
        assert_eq!(
            packets.value(&[("direction", "out"), ("type", "datagrams")]),
            Some(Value::I64(400))
        );
        assert_eq!(packets.value(&[("type", "errors")]), Some(Value::I64(5)));

        let drops = pass.metric("udp.drops").unwrap();
        assert_eq!(drops.value(&[("reason", "no_port")]), Some(Value::I64(10)));
        assert_eq!(drops.value(&[("reason", "rcv_buf")]), Some(Value::I64(2)));
    }

    #[test]
    fn test_udp_ignores_udplite_table() {
        let fs = MockFs::new();
        fs.add_file(
            "/proc/net/snmp",
            "UdpLite: InDatagrams NoPorts\nUdpLite: 9 9\n",
        );
        let pass = collect_once(&fs, CollectorKind::Udp);

        assert!(pass.metrics.is_empty());
        assert_eq!(pass.failures(), 0);
    }
}
