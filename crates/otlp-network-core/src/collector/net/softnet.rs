//! Per-CPU packet processing counters from `/proc/net/softnet_stat`, summed
//! across CPUs.

use std::sync::Arc;

use tracing::debug;

use crate::collector::aggregate::sum_records;
use crate::collector::procfs::parse_softnet_stat;
use crate::collector::source::ProcSource;
use crate::collector::traits::FileSystem;
use crate::error::SetupError;
use crate::telemetry::{CollectStatus, Meter};

use super::CollectorKind;
use super::paths::SOFTNET_STAT;

pub fn register<F: FileSystem + 'static>(
    meter: &mut Meter,
    source: Arc<ProcSource<F>>,
) -> Result<(), SetupError> {
    let processed = meter
        .i64_counter("softnet.processed")
        .with_description("Number of packets processed by softnet")
        .build()?;
    let dropped = meter
        .i64_counter("softnet.dropped")
        .with_description("Number of packets dropped by softnet")
        .build()?;
    let squeezed = meter
        .i64_counter("softnet.squeezed")
        .with_description("Number of times softnet ran out of quota (time squeezed)")
        .build()?;
    let ids = [processed.id(), dropped.id(), squeezed.id()];

    meter.register_callback(CollectorKind::Softnet.name(), &ids, move |obs| {
        let Some(cpus) = source.read_parsed(SOFTNET_STAT, parse_softnet_stat)? else {
            return Ok(CollectStatus::Absent);
        };
        let totals = sum_records(&cpus);
        if totals.heterogeneous {
            debug!(cpus = totals.records, "softnet rows differ in shape");
        }

        obs.observe(&processed, totals.get("processed"), &[]);
        obs.observe(&dropped, totals.get("dropped"), &[]);
        obs.observe(&squeezed, totals.get("squeezed"), &[]);
        Ok(CollectStatus::Reported)
    })
}
