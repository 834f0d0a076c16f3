//! Instruments, collection passes and the readers that consume them.
//!
//! ```text
//!   PullReader (scrape) ──┐                ┌──> encode_text ──> /metrics
//!                         ├──> Meter::collect ──> CollectionPass
//!   PushReader (timer) ───┘                └──> MetricExporter ──> OTLP/HTTP
//! ```

pub mod exposition;
pub mod instrument;
pub mod meter;
pub mod observation;
pub mod otlp;
pub mod reader;

pub use exposition::{CONTENT_TYPE, ExpositionError, encode_text, prometheus_name};
pub use instrument::{
    Descriptor, Instrument, InstrumentBuilder, InstrumentId, InstrumentKind, Number, Value,
    ValueType,
};
pub use meter::{
    CollectOutcome, CollectionPass, CollectorReport, DataPoint, Meter, MetricData, Resource,
    SCOPE_NAME,
};
pub use observation::{Attributes, CollectStatus, Observation, Observer};
pub use otlp::{ExportError, MetricExporter, OtlpHttpExporter};
pub use reader::{PullReader, PushReader, Readers};
