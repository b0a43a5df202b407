use std::io::{Read, Write};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::models::{LooseValue, PlacementRecord};
use crate::normalize::ABSENT_MARKER;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("CSV parse error on line {line}: {source}")]
    Parse {
        line: u64,
        #[source]
        source: csv::Error,
    },
    #[error("failed to read CSV upload: {0}")]
    Read(#[source] csv::Error),
    #[error("failed to write CSV template: {0}")]
    Write(#[from] csv::Error),
    #[error("upload is missing an institution id")]
    MissingInstitution,
}

/// One row of an uploaded placement sheet, before defaults are applied.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRow {
    #[serde(default)]
    pub batch_year: Option<String>,
    #[serde(default)]
    pub student_name: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub package: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|text| !text.trim().is_empty())
}

fn trimmed_or_marker(value: &Option<String>) -> String {
    non_blank(value)
        .map(|text| text.trim().to_string())
        .unwrap_or_else(|| ABSENT_MARKER.to_string())
}

fn raw_or_zero(value: &Option<String>) -> LooseValue {
    non_blank(value)
        .map(LooseValue::from)
        .unwrap_or(LooseValue::Number(0.0))
}

pub fn normalize_upload_row(row: &UploadRow, institution_id: &str) -> PlacementRecord {
    PlacementRecord {
        institution_id: institution_id.to_string(),
        batch_year: raw_or_zero(&row.batch_year),
        student_name: trimmed_or_marker(&row.student_name),
        branch: Some(trimmed_or_marker(&row.branch)),
        company: Some(trimmed_or_marker(&row.company)),
        compensation: raw_or_zero(&row.package),
        status: Some(trimmed_or_marker(&row.status)),
    }
}

/// Reads a headered upload. Any malformed row rejects the whole upload.
pub fn read_upload<R: Read>(
    reader: R,
    institution_id: &str,
) -> Result<Vec<PlacementRecord>, IngestError> {
    let institution_id = institution_id.trim();
    if institution_id.is_empty() {
        return Err(IngestError::MissingInstitution);
    }

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .flexible(false)
        .from_reader(reader);
    reader.headers().map_err(IngestError::Read)?;

    let mut records = Vec::new();
    for result in reader.deserialize::<UploadRow>() {
        let row = result.map_err(|source| IngestError::Parse {
            line: source.position().map(|pos| pos.line()).unwrap_or(0),
            source,
        })?;
        if is_empty_row(&row) {
            continue;
        }
        records.push(normalize_upload_row(&row, institution_id));
    }

    debug!(rows = records.len(), institution = institution_id, "parsed upload");
    Ok(records)
}

fn is_empty_row(row: &UploadRow) -> bool {
    [
        &row.batch_year,
        &row.student_name,
        &row.branch,
        &row.company,
        &row.package,
        &row.status,
    ]
    .into_iter()
    .all(|field| non_blank(field).is_none())
}

pub fn template_rows() -> Vec<UploadRow> {
    let row = |name: &str, branch: &str, company: &str, package: &str, status: &str| UploadRow {
        batch_year: Some("2024".to_string()),
        student_name: Some(name.to_string()),
        branch: Some(branch.to_string()),
        company: Some(company.to_string()),
        package: Some(package.to_string()),
        status: Some(status.to_string()),
    };

    vec![
        row("John Doe", "Computer Science", "Tech Corp", "12.5", "Placed"),
        row(
            "Jane Smith",
            "Information Technology",
            "Software Solutions Inc",
            "15.0",
            "Placed",
        ),
        row("Mike Johnson", "Electronics", "Hardware Corp", "8.5", "Not Placed"),
        row("Sarah Wilson", "Mechanical", "Engineering Ltd", "6.0", "Intern"),
    ]
}

pub fn write_template<W: Write>(writer: W) -> Result<(), IngestError> {
    let mut writer = csv::Writer::from_writer(writer);
    for row in template_rows() {
        writer.serialize(row)?;
    }
    writer
        .flush()
        .map_err(|err| IngestError::Write(csv::Error::from(err)))?;
    Ok(())
}
