//! Prometheus text exposition of a collection pass.
//!
//! Every scrape builds a throwaway [`Registry`] from the pass, so nothing is
//! carried over between scrapes and removed interfaces disappear immediately.

use prometheus::{
    CounterVec, Encoder, GaugeVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};
use tracing::debug;

use super::instrument::{Descriptor, InstrumentKind, Value, ValueType};
use super::meter::{CollectionPass, MetricData};

/// Content type of the text format produced by [`encode_text`].
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

#[derive(Debug, thiserror::Error)]
pub enum ExpositionError {
    #[error("building metric {name}: {source}")]
    Metric {
        name: String,
        #[source]
        source: prometheus::Error,
    },
    #[error("encoding exposition: {0}")]
    Encode(#[from] prometheus::Error),
}

/// Renders `pass` in the Prometheus text format.
pub fn encode_text(pass: &CollectionPass) -> Result<String, ExpositionError> {
    let registry = Registry::new();

    let target_info = GaugeVec::new(
        Opts::new("target_info", "Target metadata"),
        &["service_name", "service_version"],
    )?;
    target_info
        .with_label_values(&[
            pass.resource.service_name.as_str(),
            pass.resource.service_version.as_str(),
        ])
        .set(1.0);
    registry.register(Box::new(target_info))?;

    for metric in &pass.metrics {
        register_metric(&registry, metric).map_err(|source| ExpositionError::Metric {
            name: metric.descriptor.name.clone(),
            source,
        })?;
    }

    let families = registry.gather();
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&families, &mut buffer)?;
    debug!(families = families.len(), bytes = buffer.len(), "encoded exposition");
    String::from_utf8(buffer)
        .map_err(|e| ExpositionError::Encode(prometheus::Error::Msg(e.to_string())))
}

fn register_metric(registry: &Registry, metric: &MetricData) -> prometheus::Result<()> {
    let descriptor = &metric.descriptor;
    let help = if descriptor.description.is_empty() {
        descriptor.name.as_str()
    } else {
        descriptor.description.as_str()
    };
    let opts = Opts::new(prometheus_name(descriptor), help);
    let keys = &descriptor.attribute_keys;

    match (descriptor.kind, descriptor.value_type) {
        (InstrumentKind::Counter, ValueType::I64) => {
            let vec = IntCounterVec::new(opts, keys)?;
            for (labels, value) in label_values(metric) {
                if let Value::I64(v) = value
                    && v >= 0
                {
                    vec.with_label_values(&labels).inc_by(v as u64);
                }
            }
            registry.register(Box::new(vec))
        }
        (InstrumentKind::Counter, ValueType::F64) => {
            let vec = CounterVec::new(opts, keys)?;
            for (labels, value) in label_values(metric) {
                let v = value.as_f64();
                if v.is_finite() && v >= 0.0 {
                    vec.with_label_values(&labels).inc_by(v);
                }
            }
            registry.register(Box::new(vec))
        }
        (InstrumentKind::Gauge, ValueType::I64) => {
            let vec = IntGaugeVec::new(opts, keys)?;
            for (labels, value) in label_values(metric) {
                if let Value::I64(v) = value {
                    vec.with_label_values(&labels).set(v);
                }
            }
            registry.register(Box::new(vec))
        }
        (InstrumentKind::Gauge, ValueType::F64) => {
            let vec = GaugeVec::new(opts, keys)?;
            for (labels, value) in label_values(metric) {
                vec.with_label_values(&labels).set(value.as_f64());
            }
            registry.register(Box::new(vec))
        }
    }
}

/// Label values of every point in declared key order; missing keys are empty.
fn label_values(metric: &MetricData) -> impl Iterator<Item = (Vec<&str>, Value)> + '_ {
    metric.points.iter().map(|point| {
        let labels = metric
            .descriptor
            .attribute_keys
            .iter()
            .map(|key| point.attributes.get(*key).map_or("", String::as_str))
            .collect();
        (labels, point.value)
    })
}

/// Maps an instrument to its Prometheus metric name.
///
/// `device.io` with unit `By` becomes `device_io_bytes_total`,
/// `wifi.signal` with unit `dBm` becomes `wifi_signal_dBm`.
pub fn prometheus_name(descriptor: &Descriptor) -> String {
    let mut name: String = descriptor
        .name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();

    if let Some(suffix) = unit_suffix(&descriptor.unit)
        && !name.ends_with(&format!("_{suffix}"))
    {
        name.push('_');
        name.push_str(&suffix);
    }
    if descriptor.kind == InstrumentKind::Counter {
        name.push_str("_total");
    }
    name
}

fn unit_suffix(unit: &str) -> Option<String> {
    match unit {
        "" | "1" => None,
        "By" => Some("bytes".to_string()),
        "s" => Some("seconds".to_string()),
        "ms" => Some("milliseconds".to_string()),
        u if u.starts_with('{') => None,
        u => {
            let cleaned: String = u
                .chars()
                .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
                .collect();
            (!cleaned.is_empty()).then_some(cleaned)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::{CollectStatus, Meter, Resource};

    fn descriptor(name: &str, kind: InstrumentKind, unit: &str) -> Descriptor {
        Descriptor {
            name: name.to_string(),
            kind,
            value_type: ValueType::I64,
            unit: unit.to_string(),
            description: String::new(),
            attribute_keys: Vec::new(),
        }
    }

    #[test]
    fn test_prometheus_name() {
        let cases = [
            ("device.io", InstrumentKind::Counter, "By", "device_io_bytes_total"),
            ("uptime", InstrumentKind::Counter, "s", "uptime_seconds_total"),
            ("device.packets", InstrumentKind::Counter, "{packets}", "device_packets_total"),
            ("tcp.connection.current", InstrumentKind::Gauge, "{connection}", "tcp_connection_current"),
            ("wifi.signal", InstrumentKind::Gauge, "dBm", "wifi_signal_dBm"),
            ("sockets.used", InstrumentKind::Gauge, "", "sockets_used"),
        ];
        for (name, kind, unit, expected) in cases {
            assert_eq!(prometheus_name(&descriptor(name, kind, unit)), expected, "{name}");
        }
    }

    #[test]
    fn test_encode_text() {
        let mut meter = Meter::new(Resource::new("otlp-network", "1.2.3"));
        let io = meter
            .i64_counter("device.io")
            .with_description("Bytes transferred")
            .with_unit("By")
            .with_attribute_keys(&["interface", "direction"])
            .build()
            .unwrap();
        let signal = meter
            .f64_gauge("wifi.signal")
            .with_unit("dBm")
            .with_attribute_keys(&["interface"])
            .build()
            .unwrap();
        let (h_io, h_signal) = (io.clone(), signal.clone());
        meter
            .register_callback("test", &[io.id(), signal.id()], move |obs| {
                obs.observe(&h_io, 5000, &[("interface", "eth0"), ("direction", "receive")]);
                obs.observe(&h_io, 2000, &[("interface", "eth0"), ("direction", "transmit")]);
                obs.observe(&h_io, -1, &[("interface", "bogus")]);
                obs.observe(&h_signal, -40.0, &[("interface", "wlan0")]);
                Ok(CollectStatus::Reported)
            })
            .unwrap();

        let text = encode_text(&meter.collect()).unwrap();

        assert!(text.contains("# HELP device_io_bytes_total Bytes transferred"));
        assert!(text.contains("# TYPE device_io_bytes_total counter"));
        assert!(
            text.contains(r#"device_io_bytes_total{direction="receive",interface="eth0"} 5000"#)
        );
        assert!(
            text.contains(r#"device_io_bytes_total{direction="transmit",interface="eth0"} 2000"#)
        );
        assert!(!text.contains("bogus"));
        assert!(text.contains("# HELP wifi_signal_dBm wifi.signal"));
        assert!(text.contains(r#"wifi_signal_dBm{interface="wlan0"} -40"#));
        assert!(
            text.contains(r#"target_info{service_name="otlp-network",service_version="1.2.3"} 1"#)
        );
    }

    #[test]
    fn test_encode_empty_pass_is_well_formed() {
        let meter = Meter::new(Resource::default());
        let text = encode_text(&meter.collect()).unwrap();
        assert!(text.starts_with("# HELP target_info"));
    }
}
