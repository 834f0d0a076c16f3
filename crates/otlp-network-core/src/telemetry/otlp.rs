//! OTLP/HTTP JSON metric export.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use tracing::{debug, warn};

use super::instrument::{InstrumentKind, Value};
use super::meter::{CollectionPass, DataPoint, MetricData, SCOPE_NAME};
use super::observation::Attributes;

/// Bytes of a rejected response body kept in [`ExportError::Status`].
const MAX_ERROR_BODY: usize = 256;

/// Cumulative aggregation temporality.
const TEMPORALITY_CUMULATIVE: i32 = 2;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("invalid OTLP endpoint {0:?}")]
    InvalidEndpoint(String),
    #[error("building http client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("encoding request: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("sending to {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("collection pass did not complete: {0}")]
    Collection(#[source] tokio::task::JoinError),
    #[error("{url} answered {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },
}

impl ExportError {
    /// Transport failures, throttling and server errors are worth another try.
    pub fn is_retryable(&self) -> bool {
        match self {
            ExportError::Transport { .. } => true,
            ExportError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Destination of the push reader.
#[async_trait]
pub trait MetricExporter: Send + Sync {
    async fn export(&self, pass: &CollectionPass) -> Result<(), ExportError>;
}

/// Ships passes to an OTLP/HTTP collector as JSON.
#[derive(Debug, Clone)]
pub struct OtlpHttpExporter {
    client: reqwest::Client,
    url: String,
    max_attempts: u32,
    initial_backoff: Duration,
}

impl OtlpHttpExporter {
    /// `endpoint` is `host:port` or a URL; `insecure` picks `http` when no
    /// scheme is given.
    pub fn new(endpoint: &str, insecure: bool, timeout: Duration) -> Result<Self, ExportError> {
        let url = metrics_url(endpoint, insecure)?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("otlp-network/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ExportError::Client)?;
        Ok(Self {
            client,
            url,
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
        })
    }

    pub fn with_retry(mut self, max_attempts: u32, initial_backoff: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.initial_backoff = initial_backoff;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn send(&self, body: &[u8]) -> Result<(), ExportError> {
        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_vec())
            .send()
            .await
            .map_err(|source| ExportError::Transport {
                url: self.url.clone(),
                source,
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let mut body = response.text().await.unwrap_or_default();
        truncate_at_char_boundary(&mut body, MAX_ERROR_BODY);
        Err(ExportError::Status {
            url: self.url.clone(),
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl MetricExporter for OtlpHttpExporter {
    async fn export(&self, pass: &CollectionPass) -> Result<(), ExportError> {
        let body = serde_json::to_vec(&ExportMetricsRequest::from_pass(pass))?;
        let mut backoff = self.initial_backoff;
        let mut attempt = 1;

        loop {
            match self.send(&body).await {
                Ok(()) => {
                    debug!(url = %self.url, bytes = body.len(), attempt, "exported metrics");
                    return Ok(());
                }
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    warn!(
                        error = %e,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        "export failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Shortens `s` to at most `max` bytes without splitting a character.
fn truncate_at_char_boundary(s: &mut String, max: usize) {
    if s.len() <= max {
        return;
    }
    let cut = (0..=max).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(0);
    s.truncate(cut);
}

/// Builds the full `/v1/metrics` URL for an endpoint setting.
pub fn metrics_url(endpoint: &str, insecure: bool) -> Result<String, ExportError> {
    let endpoint = endpoint.trim();
    if endpoint.is_empty() {
        return Err(ExportError::InvalidEndpoint(endpoint.to_string()));
    }

    let mut url = if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        let scheme = if insecure { "http" } else { "https" };
        format!("{scheme}://{endpoint}")
    };
    while url.ends_with('/') {
        url.pop();
    }
    if !url.ends_with("/v1/metrics") {
        url.push_str("/v1/metrics");
    }

    match reqwest::Url::parse(&url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") && parsed.has_host() => Ok(url),
        _ => Err(ExportError::InvalidEndpoint(endpoint.to_string())),
    }
}

// ============ OTLP JSON payload ============

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportMetricsRequest {
    resource_metrics: Vec<ResourceMetrics>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResourceMetrics {
    resource: ResourceJson,
    scope_metrics: Vec<ScopeMetrics>,
}

#[derive(Debug, Serialize)]
struct ResourceJson {
    attributes: Vec<KeyValue>,
}

#[derive(Debug, Serialize)]
struct KeyValue {
    key: String,
    value: AnyValue,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnyValue {
    string_value: String,
}

#[derive(Debug, Serialize)]
struct ScopeMetrics {
    scope: Scope,
    metrics: Vec<Metric>,
}

#[derive(Debug, Serialize)]
struct Scope {
    name: &'static str,
    version: String,
}

#[derive(Debug, Serialize)]
struct Metric {
    name: String,
    description: String,
    unit: String,
    #[serde(flatten)]
    data: MetricKind,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum MetricKind {
    Sum(Sum),
    Gauge(Gauge),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Sum {
    data_points: Vec<NumberDataPoint>,
    aggregation_temporality: i32,
    is_monotonic: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Gauge {
    data_points: Vec<NumberDataPoint>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NumberDataPoint {
    attributes: Vec<KeyValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    start_time_unix_nano: Option<String>,
    time_unix_nano: String,
    #[serde(flatten)]
    value: NumberValue,
}

#[derive(Debug, Serialize)]
enum NumberValue {
    #[serde(rename = "asInt")]
    AsInt(String),
    #[serde(rename = "asDouble")]
    AsDouble(f64),
}

impl ExportMetricsRequest {
    pub fn from_pass(pass: &CollectionPass) -> Self {
        let start = unix_nanos(pass.start_time);
        let time = unix_nanos(pass.time);
        let metrics = pass
            .metrics
            .iter()
            .filter_map(|metric| convert_metric(metric, &start, &time))
            .collect();

        Self {
            resource_metrics: vec![ResourceMetrics {
                resource: ResourceJson {
                    attributes: vec![
                        key_value("service.name", &pass.resource.service_name),
                        key_value("service.version", &pass.resource.service_version),
                    ],
                },
                scope_metrics: vec![ScopeMetrics {
                    scope: Scope {
                        name: SCOPE_NAME,
                        version: pass.resource.service_version.clone(),
                    },
                    metrics,
                }],
            }],
        }
    }
}

fn convert_metric(metric: &MetricData, start: &str, time: &str) -> Option<Metric> {
    let descriptor = &metric.descriptor;
    let cumulative = descriptor.kind == InstrumentKind::Counter;
    let data_points: Vec<NumberDataPoint> = metric
        .points
        .iter()
        .filter_map(|point| convert_point(point, cumulative.then_some(start), time))
        .collect();
    if data_points.is_empty() {
        return None;
    }

    let data = match descriptor.kind {
        InstrumentKind::Counter => MetricKind::Sum(Sum {
            data_points,
            aggregation_temporality: TEMPORALITY_CUMULATIVE,
            is_monotonic: true,
        }),
        InstrumentKind::Gauge => MetricKind::Gauge(Gauge { data_points }),
    };
    Some(Metric {
        name: descriptor.name.clone(),
        description: descriptor.description.clone(),
        unit: descriptor.unit.clone(),
        data,
    })
}

fn convert_point(point: &DataPoint, start: Option<&str>, time: &str) -> Option<NumberDataPoint> {
    let value = match point.value {
        Value::I64(v) => NumberValue::AsInt(v.to_string()),
        // JSON has no representation for NaN or infinities.
        Value::F64(v) if v.is_finite() => NumberValue::AsDouble(v),
        Value::F64(_) => return None,
    };
    Some(NumberDataPoint {
        attributes: attributes(&point.attributes),
        start_time_unix_nano: start.map(str::to_string),
        time_unix_nano: time.to_string(),
        value,
    })
}

fn attributes(attributes: &Attributes) -> Vec<KeyValue> {
    attributes.iter().map(|(k, v)| key_value(k, v)).collect()
}

fn key_value(key: &str, value: &str) -> KeyValue {
    KeyValue {
        key: key.to_string(),
        value: AnyValue {
            string_value: value.to_string(),
        },
    }
}

fn unix_nanos(time: SystemTime) -> String {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::{CollectStatus, Meter, Resource};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn sample_pass() -> CollectionPass {
        let mut meter = Meter::new(Resource::new("otlp-network", "0.2.0"));
        let io = meter
            .i64_counter("device.io")
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
            .register_callback("sample", &[io.id(), signal.id()], move |obs| {
                obs.observe(&h_io, 5000, &[("interface", "eth0"), ("direction", "receive")]);
                obs.observe(&h_signal, -40.5, &[("interface", "wlan0")]);
                obs.observe(&h_signal, f64::NAN, &[("interface", "wlan1")]);
                Ok(CollectStatus::Reported)
            })
            .unwrap();
        meter.collect()
    }

    #[test]
    fn test_metrics_url() {
        assert_eq!(
            metrics_url("collector:4318", true).unwrap(),
            "http://collector:4318/v1/metrics"
        );
        assert_eq!(
            metrics_url("collector:4318", false).unwrap(),
            "https://collector:4318/v1/metrics"
        );
        assert_eq!(
            metrics_url("https://otel.example.com/", true).unwrap(),
            "https://otel.example.com/v1/metrics"
        );
        assert_eq!(
            metrics_url("http://localhost:4318/v1/metrics", true).unwrap(),
            "http://localhost:4318/v1/metrics"
        );
        assert!(metrics_url("", true).is_err());
        assert!(metrics_url("ftp://collector", true).is_err());
    }

    #[test]
    fn test_request_json_shape() {
        let pass = sample_pass();
        let json = serde_json::to_value(ExportMetricsRequest::from_pass(&pass)).unwrap();

        let resource = &json["resourceMetrics"][0];
        assert_eq!(resource["resource"]["attributes"][0]["key"], "service.name");
        assert_eq!(
            resource["resource"]["attributes"][0]["value"]["stringValue"],
            "otlp-network"
        );

        let scope = &resource["scopeMetrics"][0];
        assert_eq!(scope["scope"]["name"], SCOPE_NAME);

        let io = &scope["metrics"][0];
        assert_eq!(io["name"], "device.io");
        assert_eq!(io["unit"], "By");
        assert_eq!(io["sum"]["aggregationTemporality"], 2);
        assert_eq!(io["sum"]["isMonotonic"], true);
        let point = &io["sum"]["dataPoints"][0];
        assert_eq!(point["asInt"], "5000");
        assert!(point["startTimeUnixNano"].is_string());
        assert_eq!(point["attributes"][0]["key"], "direction");

        let signal = &scope["metrics"][1];
        let points = signal["gauge"]["dataPoints"].as_array().unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0]["asDouble"], -40.5);
        assert!(points[0].get("startTimeUnixNano").is_none());
    }

    #[test]
    fn test_retryable_errors() {
        let status = |status| ExportError::Status {
            url: String::new(),
            status,
            body: String::new(),
        };
        assert!(status(503).is_retryable());
        assert!(status(429).is_retryable());
        assert!(!status(400).is_retryable());
        assert!(!ExportError::InvalidEndpoint(String::new()).is_retryable());
    }

    /// Answers each request with the next status from `statuses` (the last
    /// one repeats) and counts requests.
    async fn status_server(statuses: Vec<u16>) -> (String, Arc<AtomicUsize>) {
        status_server_with_body(statuses, String::new()).await
    }

    /// Like [`status_server`], with `body` in every response.
    async fn status_server_with_body(
        statuses: Vec<u16>,
        body: String,
    ) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);

        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    return;
                };
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let status = statuses[n.min(statuses.len() - 1)];

                let mut request = Vec::new();
                let mut buf = [0u8; 4096];
                loop {
                    let read = stream.read(&mut buf).await.unwrap_or(0);
                    if read == 0 {
                        break;
                    }
                    request.extend_from_slice(&buf[..read]);
                    if request_complete(&request) {
                        break;
                    }
                }

                let response = format!(
                    "HTTP/1.1 {status} X\r\ncontent-type: text/plain; charset=utf-8\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        (format!("http://{addr}"), hits)
    }

    fn request_complete(request: &[u8]) -> bool {
        let text = String::from_utf8_lossy(request);
        let Some((head, body)) = text.split_once("\r\n\r\n") else {
            return false;
        };
        let length = head
            .lines()
            .find_map(|l| {
                let (name, value) = l.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        body.len() >= length
    }

    #[tokio::test]
    async fn test_export_retries_server_errors() {
        let (endpoint, hits) = status_server(vec![503, 500, 200]).await;
        let exporter = OtlpHttpExporter::new(&endpoint, true, Duration::from_secs(5))
            .unwrap()
            .with_retry(3, Duration::from_millis(5));

        exporter.export(&sample_pass()).await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_export_gives_up_after_max_attempts() {
        let (endpoint, hits) = status_server(vec![503]).await;
        let exporter = OtlpHttpExporter::new(&endpoint, true, Duration::from_secs(5))
            .unwrap()
            .with_retry(2, Duration::from_millis(5));

        let err = exporter.export(&sample_pass()).await.unwrap_err();
        assert!(matches!(err, ExportError::Status { status: 503, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_export_does_not_retry_client_errors() {
        let (endpoint, hits) = status_server(vec![400]).await;
        let exporter = OtlpHttpExporter::new(&endpoint, true, Duration::from_secs(5))
            .unwrap()
            .with_retry(3, Duration::from_millis(5));

        assert!(exporter.export(&sample_pass()).await.is_err());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_export_error_body_cut_on_char_boundary() {
        // Byte 256 falls inside the two-byte 'é'.
        let body = format!("a{}", "é".repeat(200));
        let (endpoint, _) = status_server_with_body(vec![400], body).await;
        let exporter = OtlpHttpExporter::new(&endpoint, true, Duration::from_secs(5))
            .unwrap()
            .with_retry(1, Duration::from_millis(5));

        match exporter.export(&sample_pass()).await.unwrap_err() {
            ExportError::Status { status, body, .. } => {
                assert_eq!(status, 400);
                assert_eq!(body.len(), 255);
                assert!(body.starts_with('a'));
                assert!(body.ends_with('é'));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_truncate_at_char_boundary() {
        let mut short = "ok".to_string();
        truncate_at_char_boundary(&mut short, 256);
        assert_eq!(short, "ok");

        let mut s = "aéé".to_string();
        truncate_at_char_boundary(&mut s, 2);
        assert_eq!(s, "a");
        truncate_at_char_boundary(&mut s, 0);
        assert_eq!(s, "");
    }
}
