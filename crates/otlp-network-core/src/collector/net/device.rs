//! Per-interface traffic counters from `/proc/net/dev`.

use std::sync::Arc;

use crate::collector::procfs::{NetDevStats, parse_net_dev};
use crate::collector::source::ProcSource;
use crate::collector::traits::FileSystem;
use crate::error::SetupError;
use crate::telemetry::{CollectStatus, Instrument, Meter, Observer};

use super::paths::DEV;
use super::{CollectorKind, counter_value};

/// Settings of the device collector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceOptions {
    /// Skip interfaces whose name starts with `lo`.
    pub exclude_loopback: bool,
}

fn is_loopback(interface: &str) -> bool {
    interface.starts_with("lo")
}

struct DeviceInstruments {
    io: Instrument<i64>,
    packets: Instrument<i64>,
    errors: Instrument<i64>,
    dropped: Instrument<i64>,
}

impl DeviceInstruments {
    fn observe(&self, obs: &mut Observer<'_>, dev: &NetDevStats) {
        let name = dev.interface.as_str();
        let directions = [
            ("receive", [dev.rx_bytes, dev.rx_packets, dev.rx_errs, dev.rx_drop]),
            ("transmit", [dev.tx_bytes, dev.tx_packets, dev.tx_errs, dev.tx_drop]),
        ];

        for (direction, [bytes, packets, errors, dropped]) in directions {
            let attributes = [("interface", name), ("direction", direction)];
            obs.observe(&self.io, counter_value(bytes), &attributes);
            obs.observe(&self.packets, counter_value(packets), &attributes);
            obs.observe(&self.errors, counter_value(errors), &attributes);
            obs.observe(&self.dropped, counter_value(dropped), &attributes);
        }
    }
}

pub fn register<F: FileSystem + 'static>(
    meter: &mut Meter,
    source: Arc<ProcSource<F>>,
    options: DeviceOptions,
) -> Result<(), SetupError> {
    const KEYS: &[&str] = &["interface", "direction"];

    let instruments = DeviceInstruments {
        io: meter
            .i64_counter("device.io")
            .with_description("Network interface I/O")
            .with_unit("By")
            .with_attribute_keys(KEYS)
            .build()?,
        packets: meter
            .i64_counter("device.packets")
            .with_description("Network interface packets")
            .with_unit("{packets}")
            .with_attribute_keys(KEYS)
            .build()?,
        errors: meter
            .i64_counter("device.errors")
            .with_description("Network interface errors")
            .with_unit("{errors}")
            .with_attribute_keys(KEYS)
            .build()?,
        dropped: meter
            .i64_counter("device.dropped")
            .with_description("Network interface dropped packets")
            .with_unit("{packets}")
            .with_attribute_keys(KEYS)
            .build()?,
    };
    let ids = [
        instruments.io.id(),
        instruments.packets.id(),
        instruments.errors.id(),
        instruments.dropped.id(),
    ];

    meter.register_callback(CollectorKind::Device.name(), &ids, move |obs| {
        let Some(devices) = source.read_parsed(DEV, parse_net_dev)? else {
            return Ok(CollectStatus::Absent);
        };
        for dev in devices
            .iter()
            .filter(|d| !(options.exclude_loopback && is_loopback(&d.interface)))
        {
            instruments.observe(obs, dev);
        }
        Ok(CollectStatus::Reported)
    })
}

#[cfg(test)]
mod tests {
    use super::super::CollectorOptions;
    use super::super::testing::{collect_once, meter_with};
    use super::*;
    use crate::collector::mock::MockFs;
    use crate::telemetry::{CollectOutcome, Value};

    #[test]
    fn test_device_receive_and_transmit_are_distinct() {
        let pass = collect_once(&MockFs::network_host(), CollectorKind::Device);
        let io = pass.metric("device.io").unwrap();

        assert_eq!(
            io.value(&[("interface", "eth0"), ("direction", "receive")]),
            Some(Value::I64(5000))
        );
        assert_eq!(
            io.value(&[("interface", "eth0"), ("direction", "transmit")]),
            Some(Value::I64(2000))
        );
        // lo and eth0, both directions.
        assert_eq!(io.points.len(), 4);

        let dropped = pass.metric("device.dropped").unwrap();
        assert_eq!(
            dropped.value(&[("interface", "eth0"), ("direction", "transmit")]),
            Some(Value::I64(4))
        );
        let errors = pass.metric("device.errors").unwrap();
        assert_eq!(
            errors.value(&[("interface", "eth0"), ("direction", "receive")]),
            Some(Value::I64(1))
        );
    }

    #[test]
    fn test_device_exclude_loopback() {
        let options = CollectorOptions {
            device: DeviceOptions {
                exclude_loopback: true,
            },
        };
        let pass = meter_with(&MockFs::network_host(), &[CollectorKind::Device], options).collect();

        let io = pass.metric("device.io").unwrap();
        assert_eq!(io.points.len(), 2);
        assert!(io.points.iter().all(|p| p.attributes["interface"] == "eth0"));
    }

    #[test]
    fn test_device_counter_change_between_passes() {
        let fs = MockFs::network_host();
        let meter = meter_with(&fs, &[CollectorKind::Device], CollectorOptions::default());
        let rx = [("interface", "eth0"), ("direction", "receive")];

        let first = meter.collect();
        fs.add_file(
            "/proc/net/dev",
            crate::collector::mock::scenarios::NET_DEV.replace("5000", "6500"),
        );
        let second = meter.collect();

        assert_eq!(first.metric("device.io").unwrap().value(&rx), Some(Value::I64(5000)));
        assert_eq!(second.metric("device.io").unwrap().value(&rx), Some(Value::I64(6500)));
    }

    #[test]
    fn test_device_malformed_fails() {
        let fs = MockFs::new();
        fs.add_file("/proc/net/dev", "  eth0: 12 not-a-number\n");
        let pass = collect_once(&fs, CollectorKind::Device);

        assert!(pass.metrics.is_empty());
        assert!(matches!(
            pass.report("device").unwrap().outcome,
            CollectOutcome::Failed(crate::error::CollectError::Malformed { .. })
        ));
    }
}
