//! Process uptime.

use std::time::Instant;

use crate::error::SetupError;
use crate::telemetry::{CollectStatus, Meter};

use super::CollectorKind;

pub fn register(meter: &mut Meter) -> Result<(), SetupError> {
    let uptime = meter
        .f64_counter("uptime")
        .with_description("The uptime of the application in seconds")
        .with_unit("s")
        .build()?;
    let started = Instant::now();

    meter.register_callback(CollectorKind::Uptime.name(), &[uptime.id()], move |obs| {
        obs.observe(&uptime, started.elapsed().as_secs_f64(), &[]);
        Ok(CollectStatus::Reported)
    })
}

#[cfg(test)]
mod tests {
    use super::super::testing::collect_once;
    use super::*;
    use crate::collector::mock::MockFs;

    #[test]
    fn test_uptime_reported() {
        let fs = MockFs::new();
        fs.add_dir("/proc");
        let pass = collect_once(&fs, CollectorKind::Uptime);
        let value = pass.metric("uptime").unwrap().value(&[]).unwrap().as_f64();
        assert!(value >= 0.0);
    }
}
