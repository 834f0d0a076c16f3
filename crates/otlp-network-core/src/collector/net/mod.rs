//! Network collectors.
//!
//! Each collector owns a fixed set of instruments and a single callback that
//! re-reads its `/proc` source on every pass. The set of collectors is closed:
//! [`CollectorKind`] names all of them and knows how to register each one.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::collector::source::ProcSource;
use crate::collector::traits::FileSystem;
use crate::error::SetupError;
use crate::telemetry::Meter;

pub mod conntrack;
pub mod device;
pub mod sockstat;
pub mod softnet;
pub mod tcp;
pub mod udp;
pub mod uptime;
pub mod wifi;

pub use device::DeviceOptions;

/// Files read by the collectors, relative to the proc mount point.
pub mod paths {
    pub const SNMP: &str = "net/snmp";
    pub const DEV: &str = "net/dev";
    pub const SOFTNET_STAT: &str = "net/softnet_stat";
    pub const WIRELESS: &str = "net/wireless";
    pub const SOCKSTAT: &str = "net/sockstat";
    pub const CONNTRACK_COUNT: &str = "sys/net/netfilter/nf_conntrack_count";
    pub const CONNTRACK_MAX: &str = "sys/net/netfilter/nf_conntrack_max";
}

/// Every collector this crate provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CollectorKind {
    Uptime,
    Tcp,
    Udp,
    Device,
    Softnet,
    Conntrack,
    Wifi,
    Sockstat,
}

impl CollectorKind {
    pub const ALL: [CollectorKind; 8] = [
        CollectorKind::Uptime,
        CollectorKind::Tcp,
        CollectorKind::Udp,
        CollectorKind::Device,
        CollectorKind::Softnet,
        CollectorKind::Conntrack,
        CollectorKind::Wifi,
        CollectorKind::Sockstat,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CollectorKind::Uptime => "uptime",
            CollectorKind::Tcp => "tcp",
            CollectorKind::Udp => "udp",
            CollectorKind::Device => "device",
            CollectorKind::Softnet => "softnet",
            CollectorKind::Conntrack => "conntrack",
            CollectorKind::Wifi => "wifi",
            CollectorKind::Sockstat => "sockstat",
        }
    }

    /// Creates this collector's instruments on `meter` and binds its callback.
    pub fn register<F: FileSystem + 'static>(
        self,
        meter: &mut Meter,
        source: &Arc<ProcSource<F>>,
        options: &CollectorOptions,
    ) -> Result<(), SetupError> {
        let source = Arc::clone(source);
        match self {
            CollectorKind::Uptime => uptime::register(meter),
            CollectorKind::Tcp => tcp::register(meter, source),
            CollectorKind::Udp => udp::register(meter, source),
            CollectorKind::Device => device::register(meter, source, options.device),
            CollectorKind::Softnet => softnet::register(meter, source),
            CollectorKind::Conntrack => conntrack::register(meter, source),
            CollectorKind::Wifi => wifi::register(meter, source),
            CollectorKind::Sockstat => sockstat::register(meter, source),
        }
    }
}

impl fmt::Display for CollectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CollectorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CollectorKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| format!("unknown collector {s:?}"))
    }
}

/// Per-collector settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct CollectorOptions {
    pub device: DeviceOptions,
}

/// Clamps a kernel `u64` counter into the signed instrument range.
pub(crate) fn counter_value(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
