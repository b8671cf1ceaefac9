//! Report files.
//!
//! Every step folds its outcome into a per-cluster JSON report
//! (read-modify-write, so fields written by earlier steps survive) and,
//! for bulk steps, a CSV table with a synthesized 1-based `Id` column.
//! Uploading a report ships the whole reporting directory for that cluster
//! and report name.

use std::path::Path;

use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::context::{file_name_of, StepContext};
use crate::providers::BlobStore;
use crate::Result;

pub type JsonMap = serde_json::Map<String, Value>;

/// Build a report patch from literal field names.
pub fn patch(pairs: impl IntoIterator<Item = (&'static str, Value)>) -> JsonMap {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

/// Read a JSON report, treating a missing file as an empty report.
pub fn read_json_report(path: &Path) -> Result<JsonMap> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(JsonMap::new()),
        Err(e) => Err(e.into()),
    }
}

pub fn write_json_report(path: &Path, report: &JsonMap) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_vec(report)?)?;
    Ok(())
}

/// Fold `patch` into the report at `path`. `Message` appends to whatever an
/// earlier step left there; every other field overwrites.
pub fn merge_json_report(path: &Path, patch: JsonMap) -> Result<()> {
    let mut report = read_json_report(path)?;
    for (key, value) in patch {
        if key == "Message" {
            let appended = match (report.get("Message"), &value) {
                (Some(Value::String(existing)), Value::String(new)) if !existing.is_empty() => {
                    Value::String(format!("{existing} {new}"))
                }
                _ => value,
            };
            report.insert(key, appended);
        } else {
            report.insert(key, value);
        }
    }
    write_json_report(path, &report)
}

/// Write a CSV table, prepending a 1-based `Id` column to the given headers
/// and rows.
pub fn write_csv(path: &Path, headers: &[&str], rows: &[Vec<String>]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;

    let mut header_row = vec!["Id"];
    header_row.extend_from_slice(headers);
    writer.write_record(&header_row)?;

    for (index, row) in rows.iter().enumerate() {
        let mut record = vec![(index + 1).to_string()];
        record.extend(row.iter().cloned());
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write a CSV table that only marks absence: the headers plus a single
/// placeholder row.
pub fn write_csv_placeholder(path: &Path, headers: &[&str], placeholder: &[&str]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(headers)?;
    writer.write_record(placeholder)?;
    writer.flush()?;
    Ok(())
}

/// Flatten nested objects and arrays into a single level, joining key
/// segments with `_` (`{"a": {"b": 1}}` becomes `{"a_b": 1}`).
pub fn flatten_json(map: &JsonMap) -> JsonMap {
    let mut flat = JsonMap::new();
    for (key, value) in map {
        flatten_into(&mut flat, key, value);
    }
    flat
}

fn flatten_into(flat: &mut JsonMap, prefix: &str, value: &Value) {
    match value {
        Value::Object(object) => {
            for (key, value) in object {
                flatten_into(flat, &format!("{prefix}_{key}"), value);
            }
        }
        Value::Array(items) => {
            for (index, value) in items.iter().enumerate() {
                flatten_into(flat, &format!("{prefix}_{index}"), value);
            }
        }
        other => {
            flat.insert(prefix.to_string(), other.clone());
        }
    }
}

/// Upload every file in the cluster's reporting directory under the run's
/// partitioned prefix. A reporting directory that was never created uploads
/// nothing.
#[instrument(skip(blobs, ctx), fields(cluster, report_name))]
pub async fn upload_reports(
    blobs: &dyn BlobStore,
    ctx: &StepContext,
    cluster: &str,
    report_name: &str,
) -> Result<()> {
    let report_dir = ctx.reporting_dir(cluster, report_name);
    if !report_dir.is_dir() {
        debug!(dir = %report_dir.display(), "no reports to upload");
        return Ok(());
    }

    let prefix = ctx.report_upload_prefix(cluster, report_name);
    for entry in std::fs::read_dir(&report_dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let key = format!("{prefix}/{}", file_name_of(&path));
        info!(key, "uploading report file");
        blobs.upload_file(&path, &ctx.s3_bucket, &key).await?;
    }
    Ok(())
}
