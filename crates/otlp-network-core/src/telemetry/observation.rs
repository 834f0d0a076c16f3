//! Observations emitted by collector callbacks during a pass.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::instrument::{Descriptor, Instrument, InstrumentId, Number, Value};

/// Attribute set of one observation, ordered by key.
pub type Attributes = BTreeMap<&'static str, String>;

/// One value reported for one instrument under one attribute set.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub instrument: InstrumentId,
    pub value: Value,
    pub attributes: Attributes,
}

/// What a callback found on this pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectStatus {
    /// The source was present; observations (possibly none) were recorded.
    Reported,
    /// The source does not exist on this host. Nothing was recorded.
    Absent,
}

/// Sink handed to a collector callback for a single pass.
///
/// Only instruments bound to the collector may be observed, and only with
/// attribute keys the instrument declared. Violations are remembered and turn
/// the collector's pass into a contract error once the callback returns.
pub struct Observer<'a> {
    collector: &'a str,
    bound: &'a [InstrumentId],
    descriptors: &'a [Arc<Descriptor>],
    observations: Vec<Observation>,
    violation: Option<String>,
}

impl<'a> Observer<'a> {
    pub(crate) fn new(
        collector: &'a str,
        bound: &'a [InstrumentId],
        descriptors: &'a [Arc<Descriptor>],
    ) -> Self {
        Self {
            collector,
            bound,
            descriptors,
            observations: Vec::new(),
            violation: None,
        }
    }

    /// Records `value` for `instrument` under `attributes`.
    pub fn observe<T: Number>(
        &mut self,
        instrument: &Instrument<T>,
        value: T,
        attributes: &[(&'static str, &str)],
    ) {
        if self.violation.is_some() {
            return;
        }
        let id = instrument.id();
        if !self.bound.contains(&id) {
            self.violation = Some(format!(
                "collector {:?} observed instrument {:?} it did not declare",
                self.collector,
                instrument.name()
            ));
            return;
        }

        let keys = &self.descriptors[id.index].attribute_keys;
        let mut set = Attributes::new();
        for &(key, value) in attributes {
            if !keys.contains(&key) {
                self.violation = Some(format!(
                    "collector {:?} used attribute {:?} on {:?}, declared keys are {:?}",
                    self.collector,
                    key,
                    instrument.name(),
                    keys
                ));
                return;
            }
            set.insert(key, value.to_string());
        }

        self.observations.push(Observation {
            instrument: id,
            value: value.into_value(),
            attributes: set,
        });
    }

    /// Number of observations recorded so far.
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub(crate) fn finish(self) -> Result<Vec<Observation>, String> {
        match self.violation {
            Some(violation) => Err(violation),
            None => Ok(self.observations),
        }
    }
}
