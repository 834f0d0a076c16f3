//! Socket usage from `/proc/net/sockstat`.

use std::sync::Arc;

use crate::collector::procfs::parse_sockstat;
use crate::collector::source::ProcSource;
use crate::collector::traits::FileSystem;
use crate::error::SetupError;
use crate::telemetry::{CollectStatus, Meter};

use super::CollectorKind;
use super::paths::SOCKSTAT;

pub fn register<F: FileSystem + 'static>(
    meter: &mut Meter,
    source: Arc<ProcSource<F>>,
) -> Result<(), SetupError> {
    let used = meter
        .i64_gauge("sockets.used")
        .with_description("Total number of used sockets")
        .build()?;
    let tcp_inuse = meter
        .i64_gauge("sockets.tcp.inuse")
        .with_description("Number of TCP sockets in use")
        .build()?;
    let udp_inuse = meter
        .i64_gauge("sockets.udp.inuse")
        .with_description("Number of UDP sockets in use")
        .build()?;
    let ids = [used.id(), tcp_inuse.id(), udp_inuse.id()];

    meter.register_callback(CollectorKind::Sockstat.name(), &ids, move |obs| {
        let Some(stats) = source.read_parsed(SOCKSTAT, parse_sockstat)? else {
            return Ok(CollectStatus::Absent);
        };

        if let Some(v) = stats.used {
            obs.observe(&used, v, &[]);
        }
        for (protocol, instrument) in [("TCP", &tcp_inuse), ("UDP", &udp_inuse)] {
            if let Some(v) = stats.protocol(protocol).and_then(|p| p.get("inuse")) {
                obs.observe(instrument, v, &[]);
            }
        }
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
    fn test_sockstat() {
        let pass = collect_once(&MockFs::network_host(), CollectorKind::Sockstat);

        let value = |name: &str| pass.metric(name).and_then(|m| m.value(&[]));
        assert_eq!(value("sockets.used"), Some(Value::I64(100)));
        assert_eq!(value("sockets.tcp.inuse"), Some(Value::I64(10)));
        assert_eq!(value("sockets.udp.inuse"), Some(Value::I64(5)));
    }

    #[test]
    fn test_sockstat_without_udp_row() {
        let fs = MockFs::new();
        fs.add_file("/proc/net/sockstat", "sockets: used 3\nTCP: inuse 1\n");
        let pass = collect_once(&fs, CollectorKind::Sockstat);

        assert_eq!(
            pass.metric("sockets.tcp.inuse").unwrap().value(&[]),
            Some(Value::I64(1))
        );
        assert!(pass.metric("sockets.udp.inuse").is_none());
    }
}
