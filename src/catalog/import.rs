//! Bulk load of the ingredient catalog from a `name,measurement_unit` CSV without header.
//!
//! Every row stands alone: a bad or duplicate row is logged and skipped, the rest still load.

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use anyhow::Context;
use csv::{ReaderBuilder, StringRecord, Trim};
use serde::Deserialize;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, warn};

use crate::catalog::repo;

#[derive(Debug, Deserialize)]
struct IngredientRecord {
    name: String,
    measurement_unit: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RowError {
    #[error("malformed row: {0}")]
    Malformed(String),
    #[error("empty {0}")]
    EmptyField(&'static str),
    #[error("duplicate of an earlier row in the file")]
    DuplicateInFile,
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParsedRow {
    pub line: usize,
    pub result: Result<(String, String), RowError>,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: usize,
}

pub fn parse_rows<R: Read>(reader: R) -> Vec<ParsedRow> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let mut seen = HashSet::new();
    rdr.records()
        .enumerate()
        .map(|(idx, record)| ParsedRow {
            line: idx + 1,
            result: record
                .map_err(|e| RowError::Malformed(e.to_string()))
                .and_then(|r| parse_record(&r))
                .and_then(|pair| {
                    if seen.insert(pair.clone()) {
                        Ok(pair)
                    } else {
                        Err(RowError::DuplicateInFile)
                    }
                }),
        })
        .collect()
}

fn parse_record(record: &StringRecord) -> Result<(String, String), RowError> {
    if record.len() != 2 {
        return Err(RowError::Malformed(format!(
            "expected 2 columns, found {}",
            record.len()
        )));
    }
    let rec: IngredientRecord = record
        .deserialize(None)
        .map_err(|e| RowError::Malformed(e.to_string()))?;
    if rec.name.is_empty() {
        return Err(RowError::EmptyField("name"));
    }
    if rec.measurement_unit.is_empty() {
        return Err(RowError::EmptyField("measurement_unit"));
    }
    Ok((rec.name, rec.measurement_unit))
}

pub async fn load_ingredients<R: Read>(db: &PgPool, reader: R) -> anyhow::Result<ImportReport> {
    let mut report = ImportReport::default();
    for row in parse_rows(reader) {
        let (name, unit) = match row.result {
            Ok(pair) => pair,
            Err(e) => {
                warn!(line = row.line, error = %e, "skipping ingredient row");
                report.skipped += 1;
                continue;
            }
        };
        match repo::insert_ingredient_if_absent(db, &name, &unit).await {
            Ok(true) => report.imported += 1,
            Ok(false) => {
                warn!(line = row.line, %name, %unit, "ingredient already in catalog, skipping");
                report.skipped += 1;
            }
            Err(e) => {
                warn!(line = row.line, error = %e, "failed to import ingredient row");
                report.skipped += 1;
            }
        }
    }
    info!(
        imported = report.imported,
        skipped = report.skipped,
        "ingredient import finished"
    );
    Ok(report)
}

pub async fn load_ingredients_from_path(db: &PgPool, path: &Path) -> anyhow::Result<ImportReport> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("open ingredient file {}", path.display()))?;
    load_ingredients(db, file).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(name: &str, unit: &str) -> Result<(String, String), RowError> {
        Ok((name.to_string(), unit.to_string()))
    }

    #[test]
    fn rows_are_trimmed() {
        let rows = parse_rows(" salt , g\nwater,ml\n".as_bytes());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].result, ok("salt", "g"));
        assert_eq!(rows[1].result, ok("water", "ml"));
    }

    #[test]
    fn bad_rows_do_not_stop_the_rest() {
        let csv = "salt,g\nonly-one-column\n,kg\nsugar,g,extra\npepper,\nflour,g\n";
        let rows = parse_rows(csv.as_bytes());
        assert_eq!(rows.len(), 6);
        assert_eq!(rows[0].result, ok("salt", "g"));
        assert!(matches!(rows[1].result, Err(RowError::Malformed(_))));
        assert_eq!(rows[2].result, Err(RowError::EmptyField("name")));
        assert!(matches!(rows[3].result, Err(RowError::Malformed(_))));
        assert_eq!(rows[4].result, Err(RowError::EmptyField("measurement_unit")));
        assert_eq!(rows[5].result, ok("flour", "g"));
        assert_eq!(rows[5].line, 6);
    }

    #[test]
    fn duplicates_in_file_are_flagged() {
        let rows = parse_rows("salt,g\nsalt,kg\nsalt,g\n".as_bytes());
        assert_eq!(rows[0].result, ok("salt", "g"));
        assert_eq!(rows[1].result, ok("salt", "kg"));
        assert_eq!(rows[2].result, Err(RowError::DuplicateInFile));
    }

    #[test]
    fn quoted_names_may_contain_commas() {
        let rows = parse_rows("\"cheese, grated\",g\n".as_bytes());
        assert_eq!(rows[0].result, ok("cheese, grated", "g"));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs DATABASE_URL pointing at a Postgres server"]
    async fn existing_catalog_rows_are_skipped(db: PgPool) {
        let first = load_ingredients(&db, "salt,g\nsugar,g\n".as_bytes())
            .await
            .unwrap();
        assert_eq!(first, ImportReport { imported: 2, skipped: 0 });

        let second = load_ingredients(&db, "salt,g\nbroken\npepper,g\n".as_bytes())
            .await
            .unwrap();
        assert_eq!(second, ImportReport { imported: 1, skipped: 2 });
    }
}
