//! Wire decoders for inbound reports
//!
//! Agents have spoken several encodings over time. All of them decode into the
//! same [`Report`] through [`decode`], so the rest of the hub never cares which
//! one a front end is configured for:
//!
//! - **csv**: `timestamp,hostname,numCPUs,memTotalKB,loadOne,loadFive,loadFifteen,swapUsedPct,diskReport`
//! - **json**: one JSON object per line with the agent's field names (`Timestamp`, `Hostname`, ...)
//! - **form**: the same field names as `application/x-www-form-urlencoded` pairs
//!
//! The disk report is always the space-joined `mount pct` sequence, e.g. `/ 50 /home 30`.

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::report::{DiskUsage, Mount, Report, UnknownMount};

/// Field names of the csv columns, in wire order
const CSV_COLUMNS: [&str; 9] = [
    "Timestamp",
    "Hostname",
    "NumCPUs",
    "Memtotal",
    "LoadOne",
    "LoadFive",
    "LoadFifteen",
    "SwapUsed",
    "DiskReport",
];

/// Errors produced while decoding an inbound report
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("expected {expected} csv fields, found {found}")]
    FieldCount { expected: usize, found: usize },

    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("invalid value `{value}` for field `{field}`")]
    InvalidField { field: &'static str, value: String },

    #[error(transparent)]
    UnknownMount(#[from] UnknownMount),

    #[error("mount `{0}` has no utilization value")]
    DanglingMount(String),

    #[error("malformed csv report: {0}")]
    Csv(#[from] csv::Error),

    #[error("malformed json report: {0}")]
    Json(#[from] serde_json::Error),
}

/// Encoding spoken by a front end
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Csv,
    Json,
    Form,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Csv => write!(f, "csv"),
            Protocol::Json => write!(f, "json"),
            Protocol::Form => write!(f, "form"),
        }
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(Protocol::Csv),
            "json" => Ok(Protocol::Json),
            "form" => Ok(Protocol::Form),
            other => Err(format!("unknown protocol `{other}`")),
        }
    }
}

/// Report as the agents put it on the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireReport {
    timestamp: i64,
    hostname: String,
    #[serde(rename = "NumCPUs")]
    num_cpus: u32,
    memtotal: u64,
    load_one: f64,
    load_five: f64,
    load_fifteen: f64,
    swap_used: f64,
    #[serde(default)]
    kernel_ver: String,
    #[serde(default)]
    release: String,
    #[serde(default)]
    uptime: String,
    #[serde(default)]
    disk_report: String,
}

impl WireReport {
    fn into_report(self) -> Result<Report, DecodeError> {
        if self.hostname.is_empty() || self.hostname.contains([',', ' ', '\t']) {
            return Err(DecodeError::InvalidField {
                field: "Hostname",
                value: self.hostname,
            });
        }

        if i64::try_from(self.memtotal).is_err() {
            return Err(DecodeError::InvalidField {
                field: "Memtotal",
                value: self.memtotal.to_string(),
            });
        }

        let load_one = non_negative("LoadOne", self.load_one)?;
        let load_five = non_negative("LoadFive", self.load_five)?;
        let load_fifteen = non_negative("LoadFifteen", self.load_fifteen)?;

        let swap_used_pct = non_negative("SwapUsed", self.swap_used)?;
        if swap_used_pct > 100.0 {
            return Err(DecodeError::InvalidField {
                field: "SwapUsed",
                value: self.swap_used.to_string(),
            });
        }

        Ok(Report {
            timestamp: self.timestamp,
            hostname: self.hostname,
            num_cpus: self.num_cpus,
            mem_total_kb: self.memtotal,
            load_one,
            load_five,
            load_fifteen,
            swap_used_pct,
            kernel_version: self.kernel_ver,
            os_release: self.release,
            uptime: self.uptime,
            disk_report: parse_disk_report(&self.disk_report)?,
        })
    }
}

/// One csv line, columns in wire order
///
/// The csv form has no room for kernel, release and uptime.
#[derive(Debug, Serialize, Deserialize)]
struct CsvRecord {
    timestamp: i64,
    hostname: String,
    num_cpus: u32,
    memtotal: u64,
    load_one: f64,
    load_five: f64,
    load_fifteen: f64,
    swap_used: f64,
    disk_report: String,
}

impl From<CsvRecord> for WireReport {
    fn from(record: CsvRecord) -> Self {
        Self {
            timestamp: record.timestamp,
            hostname: record.hostname,
            num_cpus: record.num_cpus,
            memtotal: record.memtotal,
            load_one: record.load_one,
            load_five: record.load_five,
            load_fifteen: record.load_fifteen,
            swap_used: record.swap_used,
            kernel_ver: String::new(),
            release: String::new(),
            uptime: String::new(),
            disk_report: record.disk_report,
        }
    }
}

impl From<&Report> for CsvRecord {
    fn from(report: &Report) -> Self {
        Self {
            timestamp: report.timestamp,
            hostname: report.hostname.clone(),
            num_cpus: report.num_cpus,
            memtotal: report.mem_total_kb,
            load_one: report.load_one,
            load_five: report.load_five,
            load_fifteen: report.load_fifteen,
            swap_used: report.swap_used_pct,
            disk_report: report.disk_report_string(),
        }
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<f64, DecodeError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(DecodeError::InvalidField {
            field,
            value: value.to_string(),
        })
    }
}

fn parse_field<T: FromStr>(field: &'static str, value: &str) -> Result<T, DecodeError> {
    value.trim().parse().map_err(|_| DecodeError::InvalidField {
        field,
        value: value.to_string(),
    })
}

/// Decode one raw report with the given protocol
pub fn decode(raw: &str, protocol: Protocol) -> Result<Report, DecodeError> {
    let wire = match protocol {
        Protocol::Csv => decode_csv(raw)?,
        Protocol::Json => serde_json::from_str::<WireReport>(raw)?,
        Protocol::Form => decode_form(raw)?,
    };

    wire.into_report()
}

fn decode_csv(raw: &str) -> Result<WireReport, DecodeError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_reader(raw.as_bytes());

    let mut record = csv::StringRecord::new();
    let found = if reader.read_record(&mut record)? {
        record.len()
    } else {
        0
    };
    if found != CSV_COLUMNS.len() {
        return Err(DecodeError::FieldCount {
            expected: CSV_COLUMNS.len(),
            found,
        });
    }

    let row: CsvRecord = record
        .deserialize(None)
        .map_err(|e| invalid_csv_field(&record, e))?;

    Ok(row.into())
}

/// Name the column a csv deserialize error points at
fn invalid_csv_field(record: &csv::StringRecord, error: csv::Error) -> DecodeError {
    let position = match error.kind() {
        csv::ErrorKind::Deserialize { err, .. } => err.field(),
        _ => None,
    };

    match position.and_then(|i| usize::try_from(i).ok()) {
        Some(i) if i < CSV_COLUMNS.len() => DecodeError::InvalidField {
            field: CSV_COLUMNS[i],
            value: record.get(i).unwrap_or_default().to_string(),
        },
        _ => DecodeError::Csv(error),
    }
}

fn decode_form(raw: &str) -> Result<WireReport, DecodeError> {
    let pairs: HashMap<String, String> = url::form_urlencoded::parse(raw.trim().as_bytes())
        .into_owned()
        .collect();

    let required = |field: &'static str| {
        pairs
            .get(field)
            .map(String::as_str)
            .ok_or(DecodeError::MissingField(field))
    };
    let optional = |field: &str| pairs.get(field).cloned().unwrap_or_default();

    Ok(WireReport {
        timestamp: parse_field("Timestamp", required("Timestamp")?)?,
        hostname: required("Hostname")?.trim().to_string(),
        num_cpus: parse_field("NumCPUs", required("NumCPUs")?)?,
        memtotal: parse_field("Memtotal", required("Memtotal")?)?,
        load_one: parse_field("LoadOne", required("LoadOne")?)?,
        load_five: parse_field("LoadFive", required("LoadFive")?)?,
        load_fifteen: parse_field("LoadFifteen", required("LoadFifteen")?)?,
        swap_used: parse_field("SwapUsed", required("SwapUsed")?)?,
        kernel_ver: optional("KernelVer"),
        release: optional("Release"),
        uptime: optional("Uptime"),
        disk_report: optional("DiskReport"),
    })
}

/// Parse a space-joined `mount pct` sequence, keeping the reported order
pub fn parse_disk_report(raw: &str) -> Result<Vec<DiskUsage>, DecodeError> {
    let mut tokens = raw.split_whitespace();
    let mut usages = Vec::new();

    while let Some(path) = tokens.next() {
        let mount: Mount = path.parse()?;
        let pct = tokens
            .next()
            .ok_or_else(|| DecodeError::DanglingMount(path.to_string()))?;
        let used_pct: u8 = parse_field("DiskReport", pct.trim_end_matches('%'))?;
        if used_pct > 100 {
            return Err(DecodeError::InvalidField {
                field: "DiskReport",
                value: pct.to_string(),
            });
        }
        usages.push(DiskUsage::new(mount, used_pct));
    }

    Ok(usages)
}

/// Encode a report as one csv line (without the trailing newline)
///
/// The csv form has no room for kernel, release and uptime; they are dropped.
pub fn encode_csv(report: &Report) -> Result<String, csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(vec![]);
    writer.serialize(CsvRecord::from(report))?;

    let bytes = writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    let line = String::from_utf8(bytes)
        .map_err(|e| csv::Error::from(io::Error::new(io::ErrorKind::InvalidData, e)))?;

    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
