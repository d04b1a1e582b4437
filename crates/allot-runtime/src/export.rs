#![forbid(unsafe_code)]

//! Export of submission history and download file names.
//!
//! Both exports use the same column order: `City or Region`, `ZIP Code`,
//! then one column per bucket with line breaks in the label flattened to
//! spaces.

use allot_core::money::Amount;
use chrono::{DateTime, Local, NaiveDate, SecondsFormat, Utc};
use serde_json::{Map, Value};

use crate::session::SessionRecord;
use crate::state_persistence::StorageError;

/// Column header for the submitter's region.
pub const REGION_COLUMN: &str = "City or Region";
/// Column header for the submitter's postal code.
pub const POSTAL_CODE_COLUMN: &str = "ZIP Code";
/// Prefix for screenshot downloads.
pub const SCREENSHOT_PREFIX: &str = "con_plan_2030";

/// Full header row: metadata columns then flattened bucket labels.
#[must_use]
pub fn export_labels<S: AsRef<str>>(bucket_labels: &[S]) -> Vec<String> {
    [REGION_COLUMN.to_string(), POSTAL_CODE_COLUMN.to_string()]
        .into_iter()
        .chain(bucket_labels.iter().map(|l| l.as_ref().replace('\n', " ")))
        .collect()
}

/// Render history as CSV with a quoted header row.
///
/// Text cells are quoted; amounts are bare integers. A record with fewer
/// amounts than labels leaves the trailing cells empty.
#[must_use]
pub fn history_to_csv<S: AsRef<str>>(records: &[SessionRecord], bucket_labels: &[S]) -> String {
    let labels = export_labels(bucket_labels);
    let mut lines = Vec::with_capacity(records.len() + 1);
    lines.push(
        labels
            .iter()
            .map(|l| quote_csv(l))
            .collect::<Vec<_>>()
            .join(","),
    );

    for record in records {
        let meta = record.metadata();
        let mut cells = vec![
            quote_csv(meta.region.as_deref().unwrap_or_default()),
            quote_csv(meta.postal_code.as_deref().unwrap_or_default()),
        ];
        cells.extend((0..bucket_labels.len()).map(|i| {
            record
                .amounts()
                .get(i)
                .map(Amount::to_string)
                .unwrap_or_default()
        }));
        lines.push(cells.join(","));
    }

    lines.join("\n")
}

/// Render history as a pretty-printed JSON array of label → value objects.
///
/// Missing metadata and missing amounts are `null`.
pub fn history_to_json<S: AsRef<str>>(
    records: &[SessionRecord],
    bucket_labels: &[S],
) -> Result<String, StorageError> {
    let labels = export_labels(bucket_labels);
    let rows: Vec<Value> = records
        .iter()
        .map(|record| {
            let meta = record.metadata();
            let mut row = Map::new();
            row.insert(labels[0].clone(), meta.region.clone().into());
            row.insert(labels[1].clone(), meta.postal_code.clone().into());
            for (i, label) in labels[2..].iter().enumerate() {
                row.insert(label.clone(), record.amounts().get(i).copied().into());
            }
            Value::Object(row)
        })
        .collect();
    Ok(serde_json::to_string_pretty(&rows)?)
}

fn quote_csv(text: &str) -> String {
    format!("\"{}\"", text.replace('"', "\"\""))
}

/// ISO-8601 UTC time with `:` replaced by `_`, safe in file names.
#[must_use]
pub fn filename_timestamp_at(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([' ', ':'], "_")
}

/// `{prefix}_{timestamp}.{ext}` for the current time.
#[must_use]
pub fn timestamped_filename(prefix: &str, ext: &str) -> String {
    timestamped_filename_at(prefix, ext, Utc::now())
}

/// `{prefix}_{timestamp}.{ext}` for `at`.
#[must_use]
pub fn timestamped_filename_at(prefix: &str, ext: &str, at: DateTime<Utc>) -> String {
    format!("{prefix}_{}.{ext}", filename_timestamp_at(at))
}

/// Screenshot download name for today's local date.
#[must_use]
pub fn screenshot_filename() -> String {
    screenshot_filename_on(Local::now().date_naive())
}

/// Screenshot download name, e.g. `con_plan_2030_Fri_Apr_05_2030.png`.
#[must_use]
pub fn screenshot_filename_on(date: NaiveDate) -> String {
    format!("{SCREENSHOT_PREFIX}_{}.png", date.format("%a_%b_%d_%Y"))
}
