//! Error types shared by the collection framework.

use std::io;
use std::path::PathBuf;

use crate::collector::procfs::ParseError;

/// Invalid setup detected while instruments and collectors are registered.
///
/// Always fatal: it is raised before the first collection pass.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("invalid instrument name {0:?}")]
    InvalidInstrumentName(String),
    #[error("instrument {instrument:?} declares invalid attribute key {key:?}")]
    InvalidAttributeKey { instrument: String, key: String },
    #[error("instrument {0:?} is already registered")]
    DuplicateInstrument(String),
    #[error("collector {0:?} is already registered")]
    DuplicateCollector(String),
    #[error("collector {collector:?} declares no instruments")]
    EmptyInstrumentSet { collector: String },
    #[error("collector {collector:?} references an instrument this meter did not create")]
    UnknownInstrument { collector: String },
    #[error("instrument {instrument:?} is already bound to collector {owner:?}")]
    InstrumentAlreadyBound { instrument: String, owner: String },
    #[error("proc mount point {0} does not exist")]
    MissingMountPoint(PathBuf),
}

/// Failure of a single collector during a single pass.
///
/// Scoped to the collector that raised it; sibling collectors in the same
/// pass are unaffected.
#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    #[error("malformed {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: ParseError,
    },
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{0}")]
    Contract(String),
    #[error("collector panicked: {0}")]
    Panicked(String),
}
