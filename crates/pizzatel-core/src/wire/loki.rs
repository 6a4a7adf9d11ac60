//! Loki push document.
//!
//! Shape:
//! `{"streams":[{"stream":{"source":..,"level":..,"type":..},"values":[["<ns>","<line>"]]}]}`
//!
//! The line is itself a JSON object: `{timestamp, level, type, ...details}`.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

/// Log severity carried in the stream labels and the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LokiPush {
    pub streams: Vec<LokiStream>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LokiStream {
    pub stream: StreamLabels,
    /// `[timestamp_ns, line]` pairs.
    pub values: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamLabels {
    pub source: String,
    pub level: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl LokiPush {
    /// Build a push body holding a single log line.
    ///
    /// Object `details` are merged into the line; any other JSON value is
    /// nested under `details`. `timestamp`, `level` and `type` always win over
    /// same-named keys in `details`.
    pub fn single(
        source: &str,
        level: LogLevel,
        kind: &str,
        details: Value,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let mut line = match details {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut m = Map::new();
                m.insert("details".into(), other);
                m
            }
        };
        line.insert(
            "timestamp".into(),
            Value::String(now.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        line.insert("level".into(), Value::String(level.as_str().into()));
        line.insert("type".into(), Value::String(kind.into()));

        let line = serde_json::to_string(&Value::Object(line))?;
        // Millisecond clock, nanosecond field.
        let ts = format!("{}000000", now.timestamp_millis());

        Ok(Self {
            streams: vec![LokiStream {
                stream: StreamLabels {
                    source: source.into(),
                    level: level.as_str().into(),
                    kind: kind.into(),
                },
                values: vec![(ts, line)],
            }],
        })
    }
}
