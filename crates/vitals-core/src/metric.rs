//! The wire-level metric record.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Metric kind. The two lowercase literals are part of the wire contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Instantaneous scalar; updates replace.
    Gauge,
    /// Accumulated integer; updates add.
    Counter,
}

impl MetricKind {
    /// Wire literal for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gauge => "gauge",
            Self::Counter => "counter",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gauge" => Ok(Self::Gauge),
            "counter" => Ok(Self::Counter),
            other => Err(UnknownKind(other.to_string())),
        }
    }
}

/// Error for a kind literal outside `{gauge, counter}`.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown metric kind: {0}")]
pub struct UnknownKind(pub String);

/// A single metric observation as it travels on the wire.
///
/// Exactly one of `value`/`delta` is populated, matching `kind`; the absent
/// field is omitted from the serialized JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    /// Metric name.
    pub id: String,
    /// Metric kind.
    #[serde(rename = "type")]
    pub kind: MetricKind,
    /// Gauge value, present iff `kind` is `gauge`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    /// Counter increment, present iff `kind` is `counter`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<i64>,
}

/// The validated payload of a [`Metric`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricPayload {
    /// Absolute gauge value.
    Gauge(f64),
    /// Counter increment.
    Counter(i64),
}

impl Metric {
    /// Create a gauge record.
    pub fn gauge(id: impl Into<String>, value: f64) -> Self {
        Self {
            id: id.into(),
            kind: MetricKind::Gauge,
            value: Some(value),
            delta: None,
        }
    }

    /// Create a counter record.
    pub fn counter(id: impl Into<String>, delta: i64) -> Self {
        Self {
            id: id.into(),
            kind: MetricKind::Counter,
            value: None,
            delta: Some(delta),
        }
    }

    /// Validate the record invariant and extract the payload.
    ///
    /// A gauge must carry `value`, a counter must carry `delta`, and the name
    /// must be non-empty.
    pub fn payload(&self) -> Result<MetricPayload, InvalidMetric> {
        if self.id.is_empty() {
            return Err(InvalidMetric::EmptyName);
        }

        match self.kind {
            MetricKind::Gauge => match self.value {
                Some(v) => Ok(MetricPayload::Gauge(v)),
                None => Err(InvalidMetric::MissingValue),
            },
            MetricKind::Counter => match self.delta {
                Some(d) => Ok(MetricPayload::Counter(d)),
                None => Err(InvalidMetric::MissingDelta),
            },
        }
    }
}

/// Validation failures for a metric record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidMetric {
    #[error("metric name must not be empty")]
    EmptyName,
    #[error("missing 'value' for gauge")]
    MissingValue,
    #[error("missing 'delta' for counter")]
    MissingDelta,
}

/// Format a gauge for the plain-text read endpoint.
///
/// Shortest round-trip decimal, so `23.5` renders as `23.5` and `42.0` as
/// `42`.
pub fn format_gauge(value: f64) -> String {
    if value == value.trunc() && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gauge_serializes_without_delta() {
        let m = Metric::gauge("Temp", 23.5);
        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(json, r#"{"id":"Temp","type":"gauge","value":23.5}"#);
    }

    #[test]
    fn counter_serializes_without_value() {
        let m = Metric::counter("Hits", 3);
        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(json, r#"{"id":"Hits","type":"counter","delta":3}"#);
    }

    #[test]
    fn wire_round_trip() {
        for m in [Metric::gauge("A", -1.25e-3), Metric::counter("B", i64::MAX)] {
            let json = serde_json::to_vec(&m).unwrap();
            let back: Metric = serde_json::from_slice(&json).unwrap();
            assert_eq!(back, m);
        }
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let err = serde_json::from_str::<Metric>(r#"{"id":"X","type":"histogram"}"#);
        assert!(err.is_err());
    }

    #[test]
    fn payload_validation() {
        assert_eq!(
            Metric::gauge("A", 1.0).payload().unwrap(),
            MetricPayload::Gauge(1.0)
        );
        assert_eq!(
            Metric::counter("B", 2).payload().unwrap(),
            MetricPayload::Counter(2)
        );

        let mut missing = Metric::gauge("A", 1.0);
        missing.value = None;
        assert_eq!(missing.payload(), Err(InvalidMetric::MissingValue));

        let unnamed = Metric::counter("", 1);
        assert_eq!(unnamed.payload(), Err(InvalidMetric::EmptyName));
    }

    #[test]
    fn kind_parsing_is_case_sensitive() {
        assert_eq!("gauge".parse::<MetricKind>().unwrap(), MetricKind::Gauge);
        assert_eq!(
            "counter".parse::<MetricKind>().unwrap(),
            MetricKind::Counter
        );
        assert!("Gauge".parse::<MetricKind>().is_err());
        assert!("histogram".parse::<MetricKind>().is_err());
    }

    #[test]
    fn gauge_formatting() {
        assert_eq!(format_gauge(23.5), "23.5");
        assert_eq!(format_gauge(42.0), "42");
        assert_eq!(format_gauge(-0.001), "-0.001");
        assert_eq!(format_gauge(4.2), "4.2");
    }
}
