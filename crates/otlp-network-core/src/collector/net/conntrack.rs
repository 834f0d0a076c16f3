//! Connection tracking table usage from the netfilter sysctls.
//!
//! Both files disappear when `nf_conntrack` is not loaded, which is the
//! normal state on many hosts and inside most containers.

use std::sync::Arc;

use crate::collector::procfs::parse_single_int;
use crate::collector::source::ProcSource;
use crate::collector::traits::FileSystem;
use crate::error::SetupError;
use crate::telemetry::{CollectStatus, Meter};

use super::CollectorKind;
use super::paths::{CONNTRACK_COUNT, CONNTRACK_MAX};

pub fn register<F: FileSystem + 'static>(
    meter: &mut Meter,
    source: Arc<ProcSource<F>>,
) -> Result<(), SetupError> {
    let entries = meter
        .i64_gauge("conntrack.entries")
        .with_description("Number of entries in conntrack table")
        .build()?;
    let limit = meter
        .i64_gauge("conntrack.limit")
        .with_description("Limit of entries in conntrack table")
        .build()?;
    let ids = [entries.id(), limit.id()];

    meter.register_callback(CollectorKind::Conntrack.name(), &ids, move |obs| {
        let count = source.read_parsed(CONNTRACK_COUNT, parse_single_int)?;
        let max = source.read_parsed(CONNTRACK_MAX, parse_single_int)?;
        if count.is_none() && max.is_none() {
            return Ok(CollectStatus::Absent);
        }

        if let Some(count) = count {
            obs.observe(&entries, count, &[]);
        }
        if let Some(max) = max {
            obs.observe(&limit, max, &[]);
        }
        Ok(CollectStatus::Reported)
    })
}
