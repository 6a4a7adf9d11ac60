//! OTLP/JSON metric export document.
//!
//! Shape:
//! `{"resourceMetrics":[{"scopeMetrics":[{"metrics":[Metric...]}]}]}`
//!
//! Each `Metric` carries exactly one data point. Integral values go out as
//! `asInt`, fractional ones as `asDouble`; attribute values are always strings.

use serde::{Deserialize, Serialize};

/// Top-level export body (one POST).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportMetricsRequest {
    pub resource_metrics: Vec<ResourceMetrics>,
}

impl ExportMetricsRequest {
    /// Wrap a batch under a single resource and scope.
    pub fn single_scope(metrics: Vec<Metric>) -> Self {
        Self {
            resource_metrics: vec![ResourceMetrics {
                scope_metrics: vec![ScopeMetrics { metrics }],
            }],
        }
    }

    /// Iterate over every metric in the document.
    pub fn metrics(&self) -> impl Iterator<Item = &Metric> {
        self.resource_metrics
            .iter()
            .flat_map(|r| r.scope_metrics.iter())
            .flat_map(|s| s.metrics.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceMetrics {
    pub scope_metrics: Vec<ScopeMetrics>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeMetrics {
    pub metrics: Vec<Metric>,
}

/// One named metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    pub unit: String,
    #[serde(flatten)]
    pub data: MetricData,
}

/// Metric payload, keyed by type in JSON (`"sum": {...}` / `"gauge": {...}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricData {
    Sum(Sum),
    Gauge(Gauge),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sum {
    pub data_points: Vec<NumberDataPoint>,
    pub aggregation_temporality: AggregationTemporality,
    pub is_monotonic: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gauge {
    pub data_points: Vec<NumberDataPoint>,
}

/// Only cumulative sums are exported: values are totals since process start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregationTemporality {
    #[serde(rename = "AGGREGATION_TEMPORALITY_CUMULATIVE")]
    Cumulative,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumberDataPoint {
    #[serde(flatten)]
    pub value: NumberValue,
    pub time_unix_nano: u64,
    pub attributes: Vec<KeyValue>,
}

impl NumberDataPoint {
    /// Look up a string attribute by key.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|kv| kv.key == key)
            .map(|kv| kv.value.string_value.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NumberValue {
    AsInt(u64),
    AsDouble(f64),
}

impl NumberValue {
    pub fn as_f64(self) -> f64 {
        match self {
            NumberValue::AsInt(v) => v as f64,
            NumberValue::AsDouble(v) => v,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: AnyValue,
}

impl KeyValue {
    pub fn string(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: AnyValue {
                string_value: value.into(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnyValue {
    pub string_value: String,
}

impl Metric {
    /// Monotonic cumulative sum with a single data point.
    pub fn sum(name: &str, unit: &str, value: NumberValue, time_unix_nano: u64, attributes: Vec<KeyValue>) -> Self {
        Self {
            name: name.to_string(),
            unit: unit.to_string(),
            data: MetricData::Sum(Sum {
                data_points: vec![NumberDataPoint { value, time_unix_nano, attributes }],
                aggregation_temporality: AggregationTemporality::Cumulative,
                is_monotonic: true,
            }),
        }
    }

    /// Gauge with a single data point.
    pub fn gauge(name: &str, unit: &str, value: NumberValue, time_unix_nano: u64, attributes: Vec<KeyValue>) -> Self {
        Self {
            name: name.to_string(),
            unit: unit.to_string(),
            data: MetricData::Gauge(Gauge {
                data_points: vec![NumberDataPoint { value, time_unix_nano, attributes }],
            }),
        }
    }

    /// First data point of either kind.
    pub fn data_point(&self) -> Option<&NumberDataPoint> {
        match &self.data {
            MetricData::Sum(s) => s.data_points.first(),
            MetricData::Gauge(g) => g.data_points.first(),
        }
    }

    pub fn is_sum(&self) -> bool {
        matches!(self.data, MetricData::Sum(_))
    }
}
