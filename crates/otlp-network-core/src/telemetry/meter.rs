//! Instrument registry and collection passes.
//!
//! The [`Meter`] is built once at startup: collectors create their
//! instruments through it and bind exactly one callback to them. After that it
//! is shared read-only (`Arc<Meter>`) by every reader, and [`Meter::collect`]
//! may run from several threads at once. A pass keeps all of its working
//! state on the stack of the calling thread.

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime};

use tracing::{debug, trace, warn};

use crate::error::{CollectError, SetupError};

use super::instrument::{Descriptor, InstrumentBuilder, InstrumentId, InstrumentKind, Value};
use super::observation::{Attributes, CollectStatus, Observation, Observer};

/// Instrumentation scope reported with every batch.
pub const SCOPE_NAME: &str = "otlp_network_core::collector";

static NEXT_METER_ID: AtomicU64 = AtomicU64::new(1);

/// Service identity attached to everything the meter produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub service_name: String,
    pub service_version: String,
}

impl Resource {
    pub fn new(service_name: impl Into<String>, service_version: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            service_version: service_version.into(),
        }
    }
}

impl Default for Resource {
    fn default() -> Self {
        Self::new("otlp-network", crate::VERSION)
    }
}

type Callback =
    Box<dyn Fn(&mut Observer<'_>) -> Result<CollectStatus, CollectError> + Send + Sync>;

struct Registration {
    name: String,
    instruments: Vec<InstrumentId>,
    callback: Callback,
}

/// Owner of all instruments and collector callbacks.
pub struct Meter {
    id: u64,
    resource: Resource,
    start_time: SystemTime,
    descriptors: Vec<Arc<Descriptor>>,
    /// Index into `registrations` of the collector each instrument is bound to.
    owners: Vec<Option<usize>>,
    registrations: Vec<Registration>,
}

impl Meter {
    pub fn new(resource: Resource) -> Self {
        Self {
            id: NEXT_METER_ID.fetch_add(1, Ordering::Relaxed),
            resource,
            start_time: SystemTime::now(),
            descriptors: Vec::new(),
            owners: Vec::new(),
            registrations: Vec::new(),
        }
    }

    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    /// Creation time, used as the start of every cumulative counter.
    pub fn start_time(&self) -> SystemTime {
        self.start_time
    }

    pub fn i64_counter(&mut self, name: impl Into<String>) -> InstrumentBuilder<'_, i64> {
        InstrumentBuilder::new(self, name.into(), InstrumentKind::Counter)
    }

    pub fn i64_gauge(&mut self, name: impl Into<String>) -> InstrumentBuilder<'_, i64> {
        InstrumentBuilder::new(self, name.into(), InstrumentKind::Gauge)
    }

    pub fn f64_counter(&mut self, name: impl Into<String>) -> InstrumentBuilder<'_, f64> {
        InstrumentBuilder::new(self, name.into(), InstrumentKind::Counter)
    }

    pub fn f64_gauge(&mut self, name: impl Into<String>) -> InstrumentBuilder<'_, f64> {
        InstrumentBuilder::new(self, name.into(), InstrumentKind::Gauge)
    }

    pub(crate) fn insert_instrument(
        &mut self,
        descriptor: Descriptor,
    ) -> Result<(InstrumentId, Arc<Descriptor>), SetupError> {
        if self.descriptors.iter().any(|d| d.name == descriptor.name) {
            return Err(SetupError::DuplicateInstrument(descriptor.name));
        }
        let id = InstrumentId {
            meter: self.id,
            index: self.descriptors.len(),
        };
        let descriptor = Arc::new(descriptor);
        self.descriptors.push(Arc::clone(&descriptor));
        self.owners.push(None);
        Ok((id, descriptor))
    }

    /// Binds `callback` to `instruments` under the collector name `name`.
    ///
    /// Each instrument can be bound to one collector only, and the set is
    /// fixed from here on.
    pub fn register_callback<F>(
        &mut self,
        name: impl Into<String>,
        instruments: &[InstrumentId],
        callback: F,
    ) -> Result<(), SetupError>
    where
        F: Fn(&mut Observer<'_>) -> Result<CollectStatus, CollectError> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.registrations.iter().any(|r| r.name == name) {
            return Err(SetupError::DuplicateCollector(name));
        }
        if instruments.is_empty() {
            return Err(SetupError::EmptyInstrumentSet { collector: name });
        }
        for id in instruments {
            if id.meter != self.id || id.index >= self.descriptors.len() {
                return Err(SetupError::UnknownInstrument { collector: name });
            }
            if let Some(owner) = self.owners[id.index] {
                return Err(SetupError::InstrumentAlreadyBound {
                    instrument: self.descriptors[id.index].name.clone(),
                    owner: self.registrations[owner].name.clone(),
                });
            }
        }

        let index = self.registrations.len();
        let mut bound = Vec::with_capacity(instruments.len());
        for id in instruments {
            // The same id listed twice binds once.
            if self.owners[id.index].is_none() {
                self.owners[id.index] = Some(index);
                bound.push(*id);
            }
        }
        self.registrations.push(Registration {
            name,
            instruments: bound,
            callback: Box::new(callback),
        });
        Ok(())
    }

    /// Names of the registered collectors, in registration order.
    pub fn collectors(&self) -> impl Iterator<Item = &str> {
        self.registrations.iter().map(|r| r.name.as_str())
    }

    pub fn instruments(&self) -> &[Arc<Descriptor>] {
        &self.descriptors
    }

    /// Runs every registered callback once and returns the combined result.
    ///
    /// A failing collector contributes nothing; all others are unaffected.
    pub fn collect(&self) -> CollectionPass {
        let time = SystemTime::now();
        let mut points: Vec<BTreeMap<Attributes, Value>> =
            vec![BTreeMap::new(); self.descriptors.len()];
        let mut reports = Vec::with_capacity(self.registrations.len());

        for registration in &self.registrations {
            let started = Instant::now();
            let outcome = match self.run_callback(registration) {
                Ok((status, observations)) => {
                    let count = observations.len();
                    for observation in observations {
                        // Last write wins for a repeated attribute set.
                        points[observation.instrument.index]
                            .insert(observation.attributes, observation.value);
                    }
                    match status {
                        CollectStatus::Reported => CollectOutcome::Reported {
                            observations: count,
                        },
                        CollectStatus::Absent => CollectOutcome::Absent,
                    }
                }
                Err(e) => CollectOutcome::Failed(e),
            };
            let elapsed = started.elapsed();

            match &outcome {
                CollectOutcome::Reported { observations } => trace!(
                    collector = %registration.name,
                    observations,
                    elapsed_us = elapsed.as_micros() as u64,
                    "collected"
                ),
                CollectOutcome::Absent => {
                    debug!(collector = %registration.name, "source not present, skipping")
                }
                CollectOutcome::Failed(e) => {
                    warn!(collector = %registration.name, error = %e, "collection failed")
                }
            }

            reports.push(CollectorReport {
                collector: registration.name.clone(),
                outcome,
                elapsed,
            });
        }

        let metrics = points
            .into_iter()
            .zip(&self.descriptors)
            .filter(|(points, _)| !points.is_empty())
            .map(|(points, descriptor)| MetricData {
                descriptor: Arc::clone(descriptor),
                points: points
                    .into_iter()
                    .map(|(attributes, value)| DataPoint { attributes, value })
                    .collect(),
            })
            .collect();

        CollectionPass {
            resource: self.resource.clone(),
            start_time: self.start_time,
            time,
            metrics,
            reports,
        }
    }

    fn run_callback(
        &self,
        registration: &Registration,
    ) -> Result<(CollectStatus, Vec<Observation>), CollectError> {
        let mut observer = Observer::new(
            &registration.name,
            &registration.instruments,
            &self.descriptors,
        );
        let status = panic::catch_unwind(AssertUnwindSafe(|| {
            (registration.callback)(&mut observer)
        }))
        .map_err(|payload| CollectError::Panicked(panic_message(payload.as_ref())))??;

        let observations = observer.finish().map_err(CollectError::Contract)?;
        if status == CollectStatus::Absent && !observations.is_empty() {
            return Err(CollectError::Contract(format!(
                "collector {:?} reported an absent source after recording {} observations",
                registration.name,
                observations.len()
            )));
        }
        Ok((status, observations))
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Everything one collection pass produced.
#[derive(Debug)]
pub struct CollectionPass {
    pub resource: Resource,
    /// Start of the cumulative window (meter creation).
    pub start_time: SystemTime,
    /// When this pass started.
    pub time: SystemTime,
    /// Instruments that received at least one observation, in creation order.
    pub metrics: Vec<MetricData>,
    /// One entry per registered collector, in registration order.
    pub reports: Vec<CollectorReport>,
}

impl CollectionPass {
    pub fn metric(&self, name: &str) -> Option<&MetricData> {
        self.metrics.iter().find(|m| m.descriptor.name == name)
    }

    pub fn report(&self, collector: &str) -> Option<&CollectorReport> {
        self.reports.iter().find(|r| r.collector == collector)
    }

    /// Number of collectors that failed in this pass.
    pub fn failures(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| matches!(r.outcome, CollectOutcome::Failed(_)))
            .count()
    }

    /// Total number of data points across all metrics.
    pub fn point_count(&self) -> usize {
        self.metrics.iter().map(|m| m.points.len()).sum()
    }
}

/// All points of one instrument, sorted by attribute set.
#[derive(Debug, Clone)]
pub struct MetricData {
    pub descriptor: Arc<Descriptor>,
    pub points: Vec<DataPoint>,
}

impl MetricData {
    /// Returns the value recorded under exactly `attributes`.
    pub fn value(&self, attributes: &[(&str, &str)]) -> Option<Value> {
        self.points
            .iter()
            .find(|p| {
                p.attributes.len() == attributes.len()
                    && attributes
                        .iter()
                        .all(|(k, v)| p.attributes.get(*k).map(String::as_str) == Some(*v))
            })
            .map(|p| p.value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataPoint {
    pub attributes: Attributes,
    pub value: Value,
}

/// How one collector fared in a pass.
#[derive(Debug)]
pub enum CollectOutcome {
    Reported { observations: usize },
    Absent,
    Failed(CollectError),
}

#[derive(Debug)]
pub struct CollectorReport {
    pub collector: String,
    pub outcome: CollectOutcome,
    pub elapsed: Duration,
}
