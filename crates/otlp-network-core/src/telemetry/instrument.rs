//! Instrument descriptors and typed handles.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::SetupError;

use super::meter::Meter;

/// Monotonic counter or point-in-time gauge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstrumentKind {
    Counter,
    Gauge,
}

/// Numeric type an instrument records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    I64,
    F64,
}

/// A single observed number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    I64(i64),
    F64(f64),
}

impl Value {
    pub fn as_f64(self) -> f64 {
        match self {
            Value::I64(v) => v as f64,
            Value::F64(v) => v,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::I64(v) => write!(f, "{v}"),
            Value::F64(v) => write!(f, "{v}"),
        }
    }
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for i64 {}
    impl Sealed for f64 {}
}

/// Number types an [`Instrument`] can record.
pub trait Number: sealed::Sealed + Copy + Send + Sync + 'static {
    const VALUE_TYPE: ValueType;
    fn into_value(self) -> Value;
}

impl Number for i64 {
    const VALUE_TYPE: ValueType = ValueType::I64;
    fn into_value(self) -> Value {
        Value::I64(self)
    }
}

impl Number for f64 {
    const VALUE_TYPE: ValueType = ValueType::F64;
    fn into_value(self) -> Value {
        Value::F64(self)
    }
}

/// Immutable description of an instrument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    pub name: String,
    pub kind: InstrumentKind,
    pub value_type: ValueType,
    /// UCUM unit, e.g. `By`, `s` or `{packets}`. Empty when dimensionless.
    pub unit: String,
    pub description: String,
    /// The only attribute keys observations of this instrument may carry.
    pub attribute_keys: Vec<&'static str>,
}

/// Identity of an instrument inside the meter that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstrumentId {
    pub(crate) meter: u64,
    pub(crate) index: usize,
}

/// Typed handle to a registered instrument.
///
/// Handles are cheap to clone and are captured by collector callbacks to
/// address their observations.
#[derive(Debug)]
pub struct Instrument<T> {
    id: InstrumentId,
    descriptor: Arc<Descriptor>,
    _number: PhantomData<fn(T)>,
}

impl<T> Clone for Instrument<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            descriptor: Arc::clone(&self.descriptor),
            _number: PhantomData,
        }
    }
}

impl<T> Instrument<T> {
    pub(crate) fn new(id: InstrumentId, descriptor: Arc<Descriptor>) -> Self {
        Self {
            id,
            descriptor,
            _number: PhantomData,
        }
    }

    pub fn id(&self) -> InstrumentId {
        self.id
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }
}

/// Builder returned by `Meter::i64_counter` and friends.
#[must_use = "instruments are only registered by `build`"]
pub struct InstrumentBuilder<'m, T> {
    meter: &'m mut Meter,
    name: String,
    kind: InstrumentKind,
    unit: String,
    description: String,
    attribute_keys: Vec<&'static str>,
    _number: PhantomData<fn(T)>,
}

impl<'m, T: Number> InstrumentBuilder<'m, T> {
    pub(crate) fn new(meter: &'m mut Meter, name: String, kind: InstrumentKind) -> Self {
        Self {
            meter,
            name,
            kind,
            unit: String::new(),
            description: String::new(),
            attribute_keys: Vec::new(),
            _number: PhantomData,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    /// Declares the attribute vocabulary of this instrument.
    pub fn with_attribute_keys(mut self, keys: &[&'static str]) -> Self {
        self.attribute_keys = keys.to_vec();
        self
    }

    /// Validates the descriptor and registers it with the meter.
    pub fn build(self) -> Result<Instrument<T>, SetupError> {
        if !is_valid_instrument_name(&self.name) {
            return Err(SetupError::InvalidInstrumentName(self.name));
        }
        for (i, key) in self.attribute_keys.iter().enumerate() {
            if !is_valid_attribute_key(key) || self.attribute_keys[..i].contains(key) {
                return Err(SetupError::InvalidAttributeKey {
                    instrument: self.name,
                    key: key.to_string(),
                });
            }
        }

        let descriptor = Descriptor {
            name: self.name,
            kind: self.kind,
            value_type: T::VALUE_TYPE,
            unit: self.unit,
            description: self.description,
            attribute_keys: self.attribute_keys,
        };
        let (id, descriptor) = self.meter.insert_instrument(descriptor)?;
        Ok(Instrument::new(id, descriptor))
    }
}

/// Instrument names start with a letter, are at most 255 characters long and
/// contain only ASCII alphanumerics, `_`, `.`, `-` and `/`.
pub fn is_valid_instrument_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    name.len() <= 255
        && first.is_ascii_alphabetic()
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-' | '/'))
}

/// Attribute keys double as Prometheus label names.
fn is_valid_attribute_key(key: &str) -> bool {
    let mut chars = key.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !key.starts_with("__")
}
