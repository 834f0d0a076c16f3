//! Wireless link statistics from `/proc/net/wireless`.

use std::sync::Arc;

use crate::collector::procfs::parse_wireless;
use crate::collector::source::ProcSource;
use crate::collector::traits::FileSystem;
use crate::error::SetupError;
use crate::telemetry::{CollectStatus, Meter};

use super::CollectorKind;
use super::paths::WIRELESS;

pub fn register<F: FileSystem + 'static>(
    meter: &mut Meter,
    source: Arc<ProcSource<F>>,
) -> Result<(), SetupError> {
    let signal = meter
        .f64_gauge("wifi.signal")
        .with_description("Wifi signal level (dBm)")
        .with_unit("dBm")
        .with_attribute_keys(&["interface"])
        .build()?;
    let quality = meter
        .f64_gauge("wifi.quality")
        .with_description("Wifi link quality")
        .with_attribute_keys(&["interface"])
        .build()?;
    let ids = [signal.id(), quality.id()];

    meter.register_callback(CollectorKind::Wifi.name(), &ids, move |obs| {
        let Some(interfaces) = source.read_parsed(WIRELESS, parse_wireless)? else {
            return Ok(CollectStatus::Absent);
        };
        for iface in &interfaces {
            let attributes = [("interface", iface.interface.as_str())];
            obs.observe(&signal, iface.level, &attributes);
            obs.observe(&quality, iface.link, &attributes);
        }
        Ok(CollectStatus::Reported)
    })
}
