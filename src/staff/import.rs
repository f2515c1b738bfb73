use std::io::Read;

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::{NewStaff, StaffDirectory, StaffRecord};
use crate::authz::{Role, ScopeName};

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RowError {
    /// 1-based line in the CSV input, header included.
    pub line: u64,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct ImportReport {
    pub imported: Vec<StaffRecord>,
    pub skipped: usize,
    pub errors: Vec<RowError>,
}

/// Bulk import with columns `name,role,region,district,customId`.
///
/// Rows map positionally. A bad row is skipped and reported; it never aborts the batch.
pub fn import_csv<R: Read>(directory: &mut StaffDirectory, source: R, now: DateTime<Utc>) -> ImportReport {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(source);

    let mut report = ImportReport::default();

    for (index, row) in reader.records().enumerate() {
        let fallback_line = index as u64 + 2;
        let outcome = row
            .map_err(|err| (fallback_line, format!("unreadable row: {err}")))
            .and_then(|record| {
                let line = record.position().map(|p| p.line()).unwrap_or(fallback_line);
                parse_row(&record)
                    .map_err(|message| (line, message))
                    .and_then(|new| directory.add_staff_id(new, now).map_err(|err| (line, err.to_string())))
            });

        match outcome {
            Ok(record) => report.imported.push(record),
            Err((line, message)) => {
                tracing::warn!(line, %message, "skipping staff import row");
                report.skipped += 1;
                report.errors.push(RowError { line, message });
            }
        }
    }

    tracing::info!(
        imported = report.imported.len(),
        skipped = report.skipped,
        "staff import finished"
    );
    report
}

fn parse_row(record: &csv::StringRecord) -> Result<NewStaff, String> {
    let field = |i: usize| record.get(i).filter(|value| !value.is_empty());

    let name = field(0).ok_or("missing name")?.to_string();
    let role = field(1)
        .ok_or("missing role")?
        .parse::<Role>()
        .map_err(|err| err.to_string())?;
    if !role.is_ranked() {
        return Err(format!("{role} cannot be imported"));
    }

    Ok(NewStaff {
        name,
        role: Some(role),
        region: ScopeName::parse_opt(field(2)),
        district: ScopeName::parse_opt(field(3)),
        custom_id: field(4).map(String::from),
    })
}
