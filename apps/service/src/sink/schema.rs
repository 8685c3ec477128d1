//! Versioned, serializer-neutral description of the report record.
//!
//! The field list is the contract: any serializer behind the sink maps a
//! [`Report`] to exactly these fields, and the registry is handed the same
//! list. Bump [`SCHEMA_VERSION`] when a field is added, removed or retyped.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};

use crate::report::Report;

pub const SCHEMA_VERSION: u32 = 1;

/// Semantic type of a field, independent of any serialization library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    StatusCode,
    UnixSeconds,
    DurationSeconds,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub doc: &'static str,
}

pub const REPORT_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "endpoint",
        kind: FieldKind::Text,
        doc: "URL the probe was issued against.",
    },
    FieldSpec {
        name: "status_code",
        kind: FieldKind::StatusCode,
        doc: "HTTP response code.",
    },
    FieldSpec {
        name: "issued_at",
        kind: FieldKind::UnixSeconds,
        doc: "POSIX timestamp the probe was dequeued.",
    },
    FieldSpec {
        name: "name_resolution",
        kind: FieldKind::DurationSeconds,
        doc: "Cumulative time to resolve the host name.",
    },
    FieldSpec {
        name: "connect",
        kind: FieldKind::DurationSeconds,
        doc: "Cumulative time to open the TCP connection.",
    },
    FieldSpec {
        name: "tls_handshake",
        kind: FieldKind::DurationSeconds,
        doc: "Cumulative time to finish the TLS handshake; zero for plain HTTP.",
    },
    FieldSpec {
        name: "pretransfer",
        kind: FieldKind::DurationSeconds,
        doc: "Cumulative time until the request was ready to send.",
    },
    FieldSpec {
        name: "time_to_first_byte",
        kind: FieldKind::DurationSeconds,
        doc: "Cumulative time until the first response byte.",
    },
    FieldSpec {
        name: "total",
        kind: FieldKind::DurationSeconds,
        doc: "Cumulative time for the whole transfer.",
    },
];

/// Encode one report as the versioned wire record.
pub fn encode(report: &Report) -> Value {
    let timings = &report.phase_timings;
    json!({
        "schema_version": SCHEMA_VERSION,
        "endpoint": report.endpoint,
        "status_code": report.status_code,
        "issued_at": unix_seconds(report.issued_at),
        "name_resolution": timings.name_resolution.as_secs_f64(),
        "connect": timings.connect.as_secs_f64(),
        "tls_handshake": timings.tls_handshake.as_secs_f64(),
        "pretransfer": timings.pretransfer.as_secs_f64(),
        "time_to_first_byte": timings.time_to_first_byte.as_secs_f64(),
        "total": timings.total.as_secs_f64(),
    })
}

/// The document registered with the schema registry at startup.
pub fn registry_payload(subject: &str) -> Value {
    json!({
        "subject": subject,
        "version": SCHEMA_VERSION,
        "fields": REPORT_FIELDS,
    })
}

fn unix_seconds(at: DateTime<Utc>) -> f64 {
    at.timestamp_micros() as f64 / 1e6
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::TimeZone;

    use super::*;
    use crate::report::PhaseTimings;

    fn sample_report() -> Report {
        Report {
            endpoint: "https://example.com/".to_string(),
            status_code: 200,
            issued_at: Utc.with_ymd_and_hms(2021, 1, 2, 15, 18, 21).unwrap(),
            phase_timings: PhaseTimings {
                name_resolution: Duration::from_millis(10),
                connect: Duration::from_millis(30),
                tls_handshake: Duration::from_millis(80),
                pretransfer: Duration::from_millis(85),
                time_to_first_byte: Duration::from_millis(220),
                total: Duration::from_millis(1500),
            },
        }
    }

    #[test]
    fn record_carries_exactly_the_declared_fields() {
        let record = encode(&sample_report());
        let object = record.as_object().unwrap();

        for field in REPORT_FIELDS {
            assert!(object.contains_key(field.name), "missing field {}", field.name);
        }
        // Declared fields plus the version envelope, nothing else.
        assert_eq!(object.len(), REPORT_FIELDS.len() + 1);
        assert_eq!(object["schema_version"], json!(SCHEMA_VERSION));
    }

    #[test]
    fn durations_and_timestamps_serialize_as_seconds() {
        let record = encode(&sample_report());
        assert_eq!(record["total"], json!(1.5));
        assert_eq!(record["tls_handshake"], json!(0.08));
        assert_eq!(record["issued_at"], json!(1609600701.0));
        assert_eq!(record["status_code"], json!(200));
    }

    #[test]
    fn registry_payload_names_the_subject_and_version() {
        let payload = registry_payload("latency-reports");
        assert_eq!(payload["subject"], json!("latency-reports"));
        assert_eq!(payload["version"], json!(SCHEMA_VERSION));
        assert_eq!(payload["fields"].as_array().unwrap().len(), REPORT_FIELDS.len());
        assert_eq!(payload["fields"][0]["name"], json!("endpoint"));
        assert_eq!(payload["fields"][5]["kind"], json!("duration_seconds"));
    }
}
