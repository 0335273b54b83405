//! Metrics for the aero telemetry link.
//!
//! Every metric the link layer records is declared here as a [`Metric`]
//! constant so names, units and label keys live in one place. The `metrics`
//! crate is re-exported; install any recorder (for example the Prometheus
//! exporter behind the `prometheus` feature) and call [`describe_metrics`].
//!
//! ```rust
//! use aero_metrics::{metric_defs, LinkLabels};
//!
//! let labels = LinkLabels::new("ground-station", "ground", "plane");
//! metrics::counter!(metric_defs::FRAMES_SENT.name, &labels.to_labels()).increment(1);
//! ```

pub use metrics;

use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};

/// Counter, gauge or histogram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// Monotonically increasing count.
    Counter,
    /// Value that can go up and down.
    Gauge,
    /// Distribution of observed values.
    Histogram,
}

impl MetricKind {
    /// Lowercase kind name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A metric declaration: name, kind, description, unit and expected label keys.
///
/// Built with const constructors so declarations can be `const` items.
#[derive(Debug, Clone)]
pub struct Metric {
    /// Dotted metric name, e.g. `aero.link.frames_sent`.
    pub name: &'static str,
    /// Counter, gauge or histogram.
    pub kind: MetricKind,
    /// Human readable description.
    pub description: &'static str,
    /// Unit of measurement, if any.
    pub unit: Option<Unit>,
    /// Label keys recorded with this metric.
    pub labels: &'static [&'static str],
}

impl Metric {
    const fn new(name: &'static str, kind: MetricKind) -> Self {
        Self {
            name,
            kind,
            description: "",
            unit: None,
            labels: &[],
        }
    }

    /// Declare a counter.
    pub const fn counter(name: &'static str) -> Self {
        Self::new(name, MetricKind::Counter)
    }

    /// Declare a gauge.
    pub const fn gauge(name: &'static str) -> Self {
        Self::new(name, MetricKind::Gauge)
    }

    /// Declare a histogram.
    pub const fn histogram(name: &'static str) -> Self {
        Self::new(name, MetricKind::Histogram)
    }

    /// Set the description.
    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Set the unit.
    pub const fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Set the expected label keys.
    pub const fn with_labels(mut self, labels: &'static [&'static str]) -> Self {
        self.labels = labels;
        self
    }

    /// Register the description with the installed recorder.
    pub fn describe(&self) {
        match (self.kind, self.unit) {
            (MetricKind::Counter, Some(unit)) => describe_counter!(self.name, unit, self.description),
            (MetricKind::Counter, None) => describe_counter!(self.name, self.description),
            (MetricKind::Gauge, Some(unit)) => describe_gauge!(self.name, unit, self.description),
            (MetricKind::Gauge, None) => describe_gauge!(self.name, self.description),
            (MetricKind::Histogram, Some(unit)) => {
                describe_histogram!(self.name, unit, self.description)
            }
            (MetricKind::Histogram, None) => describe_histogram!(self.name, self.description),
        }
    }
}

pub mod metric_defs {
    use super::{Metric, Unit};

    // ========================================================================
    // Standard Label Keys
    // ========================================================================

    pub const LINK_LABELS: &[&str] = &["link", "local", "remote"];

    // ========================================================================
    // Frame Metrics
    // ========================================================================

    pub const FRAMES_SENT: Metric = Metric::counter("aero.link.frames_sent")
        .with_description("Frames built and written to the transport")
        .with_unit(Unit::Count)
        .with_labels(LINK_LABELS);

    pub const FRAMES_RECEIVED: Metric = Metric::counter("aero.link.frames_received")
        .with_description("Frames accepted from the transport after checksum and parse checks")
        .with_unit(Unit::Count)
        .with_labels(LINK_LABELS);

    /// Labels: link, local, remote, reason
    pub const FRAMES_REJECTED: Metric = Metric::counter("aero.link.frames_rejected")
        .with_description("Candidate frames dropped by checksum or parse checks")
        .with_unit(Unit::Count)
        .with_labels(&["link", "local", "remote", "reason"]);

    pub const BYTES_DISCARDED: Metric = Metric::counter("aero.link.bytes_discarded")
        .with_description("Stream bytes skipped while searching for frame sentinels")
        .with_unit(Unit::Bytes)
        .with_labels(LINK_LABELS);

    /// Labels: link, local, remote, signature
    pub const SEGMENTS_RECEIVED: Metric = Metric::counter("aero.link.segments_received")
        .with_description("Decoded segments by signature")
        .with_unit(Unit::Count)
        .with_labels(&["link", "local", "remote", "signature"]);

    pub const FRAME_PAYLOAD_BYTES: Metric = Metric::histogram("aero.link.frame_payload_bytes")
        .with_description("Used payload bytes per sent frame")
        .with_unit(Unit::Bytes)
        .with_labels(LINK_LABELS);

    pub const PENDING_SEGMENTS: Metric = Metric::gauge("aero.link.pending_segments")
        .with_description("Segments held by the builder after the last send")
        .with_unit(Unit::Count)
        .with_labels(LINK_LABELS);

    pub const ALL: &[&Metric] = &[
        &FRAMES_SENT,
        &FRAMES_RECEIVED,
        &FRAMES_REJECTED,
        &BYTES_DISCARDED,
        &SEGMENTS_RECEIVED,
        &FRAME_PAYLOAD_BYTES,
        &PENDING_SEGMENTS,
    ];
}

/// Labels identifying one link: its configured name and both endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkLabels {
    pub link: String,
    pub local: String,
    pub remote: String,
}

impl LinkLabels {
    pub fn new(
        link: impl Into<String>,
        local: impl Into<String>,
        remote: impl Into<String>,
    ) -> Self {
        Self {
            link: link.into(),
            local: local.into(),
            remote: remote.into(),
        }
    }

    /// Labels in the `metrics` crate's (key, value) form.
    pub fn to_labels(&self) -> Vec<(&'static str, String)> {
        vec![
            ("link", self.link.clone()),
            ("local", self.local.clone()),
            ("remote", self.remote.clone()),
        ]
    }

    /// Labels plus one extra pair.
    pub fn with(&self, key: &'static str, value: impl Into<String>) -> Vec<(&'static str, String)> {
        let mut labels = self.to_labels();
        labels.push((key, value.into()));
        labels
    }
}

/// Describe every link metric. Call once after installing a recorder.
pub fn describe_metrics() {
    for metric in metric_defs::ALL {
        metric.describe();
    }
}

/// Install a Prometheus recorder serving `/metrics` on `addr`.
#[cfg(feature = "prometheus")]
pub fn install_prometheus(
    addr: std::net::SocketAddr,
) -> Result<(), metrics_exporter_prometheus::BuildError> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
}
