//! Network metrics collection from the Linux `/proc` filesystem.
//!
//! This module provides the collectors and everything they read through, with
//! support for mocking so tests never touch the host `/proc`.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     net::CollectorKind                      │
//! │   tcp  udp  device  softnet  conntrack  wifi  sockstat      │
//! │        │         │              │                           │
//! │  ┌─────▼─────┐ ┌─▼──────────┐ ┌─▼───────────┐               │
//! │  │  procfs   │ │ aggregate  │ │ ProcSource  │               │
//! │  │ (parsers) │ │ (per-CPU)  │ │ (fresh read)│               │
//! │  └───────────┘ └────────────┘ └──────┬──────┘               │
//! │                                      │                      │
//! │                               ┌──────▼──────┐               │
//! │                               │  FileSystem │ (trait)       │
//! │                               └──────┬──────┘               │
//! └──────────────────────────────────────┼──────────────────────┘
//!                                        │
//!                        ┌───────────────┼───────────────┐
//!                        │               │               │
//!                 ┌──────▼──────┐ ┌──────▼──────┐ ┌──────▼──────┐
//!                 │   RealFs    │ │   MockFs    │ │  Scenarios  │
//!                 │ (Linux)     │ │ (Testing)   │ │ (Fixtures)  │
//!                 └─────────────┘ └─────────────┘ └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```
//! use std::sync::Arc;
//! use otlp_network_core::collector::net::{CollectorKind, CollectorOptions};
//! use otlp_network_core::collector::{MockFs, ProcSource};
//! use otlp_network_core::telemetry::{Meter, Resource};
//!
//! let source = Arc::new(ProcSource::new(MockFs::network_host(), "/proc").unwrap());
//! let mut meter = Meter::new(Resource::default());
//! CollectorKind::Tcp
//!     .register(&mut meter, &source, &CollectorOptions::default())
//!     .unwrap();
//!
//! let pass = meter.collect();
//! assert!(pass.metric("tcp.connection.current").is_some());
//! ```

pub mod aggregate;
pub mod mock;
pub mod net;
pub mod procfs;
pub mod source;
pub mod traits;

pub use aggregate::{Aggregate, CounterRecord, sum_records};
pub use mock::MockFs;
pub use net::{CollectorKind, CollectorOptions, DeviceOptions};
pub use source::ProcSource;
pub use traits::{FileSystem, RealFs};
