use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use crate::domain::geometry::feature::Geometry;
use crate::domain::geometry::ops::centroid;
use crate::domain::job::job_description::format_shard_id;
use crate::domain::remote::remote_store::TableRow;
use crate::error::Result;

/// Columns added by the remote platform to every exported table.
pub const BOOKKEEPING_COLUMNS: [&str; 2] = ["system:index", ".geo"];

pub const ID_COLUMN: &str = "ID";

/// Centroid of the row geometry, as WKT.
pub const GEOMETRY_COLUMN: &str = "geometry";

const GEO_COLUMN: &str = ".geo";

/// Whether a run produces one row per zone and image, or one row per traced point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResultLevel {
    #[default]
    Zone,
    Point,
}

fn centroid_wkt(geo: Option<&Value>) -> Option<String> {
    let geometry: Geometry = serde_json::from_str(geo?.as_str()?).ok()?;
    let [x, y] = centroid(&geometry)?;
    Some(format!("POINT ({} {})", x, y))
}

/// Drops bookkeeping columns and prepends the stable identifier of each row.
///
/// Rows exported with a geometry keep its centroid in the `geometry` column.
pub fn clean_rows(rows: Vec<TableRow>, fid: i64, level: ResultLevel) -> Vec<TableRow> {
    rows.into_iter()
        .enumerate()
        .map(|(index, mut row)| {
            if let Some(wkt) = centroid_wkt(row.get(GEO_COLUMN)) {
                row.insert(GEOMETRY_COLUMN.to_string(), Value::String(wkt));
            }
            for column in BOOKKEEPING_COLUMNS {
                row.remove(column);
            }

            let id = match level {
                ResultLevel::Zone => Value::from(fid),
                ResultLevel::Point => Value::String(format!("{}-{:04}", format_shard_id(fid), index)),
            };
            row.insert(ID_COLUMN.to_string(), id);
            row
        })
        .collect()
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Writes rows as CSV: `ID` first, then every other column sorted by name.
pub fn write_rows(path: &Path, rows: &[TableRow]) -> Result<()> {
    let columns: BTreeSet<&str> = rows.iter().flat_map(|row| row.keys().map(String::as_str)).filter(|column| *column != ID_COLUMN).collect();
    let header: Vec<&str> = std::iter::once(ID_COLUMN).chain(columns).collect();

    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(&header)?;
    for row in rows {
        writer.write_record(header.iter().map(|column| cell(row.get(*column))))?;
    }
    writer.flush()?;
    Ok(())
}

/// Concatenates CSV parts into `destination` in the given order.
///
/// Headers are merged in first-seen order; cells of columns a part lacks stay empty.
/// Returns the number of data rows written.
pub fn concat_csv(parts: &[PathBuf], destination: &Path) -> Result<usize> {
    let mut header: Vec<String> = Vec::new();
    let mut records: Vec<HashMap<String, String>> = Vec::new();

    for part in parts {
        let mut reader = csv::Reader::from_path(part)?;
        let part_header: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

        for column in &part_header {
            if !header.contains(column) {
                header.push(column.clone());
            }
        }

        for record in reader.records() {
            let record = record?;
            records.push(part_header.iter().cloned().zip(record.iter().map(str::to_string)).collect());
        }
    }

    let mut writer = csv::Writer::from_path(destination)?;
    writer.write_record(&header)?;
    for record in &records {
        writer.write_record(header.iter().map(|column| record.get(column).map(String::as_str).unwrap_or("")))?;
    }
    writer.flush()?;

    Ok(records.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: serde_json::Value) -> TableRow {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn cleaning_drops_bookkeeping_and_adds_id() {
        let rows = vec![
            row(json!({"system:index": "0", ".geo": "{}", "DATE": "2020-01-01", "WATER_AREA": 12.5})),
            row(json!({"system:index": "1", ".geo": "{}", "DATE": "2020-02-01", "WATER_AREA": 13.0})),
        ];

        let zones = clean_rows(rows.clone(), 42, ResultLevel::Zone);
        assert_eq!(zones[0]["ID"], json!(42));
        assert!(!zones[0].contains_key("system:index"));
        assert!(!zones[1].contains_key(".geo"));

        let points = clean_rows(rows, 42, ResultLevel::Point);
        assert_eq!(points[1]["ID"], json!("0042-0001"));
        assert!(!points[0].contains_key(GEOMETRY_COLUMN));
    }

    #[test]
    fn exported_geometry_becomes_a_centroid() {
        let geo = r#"{"type":"Polygon","coordinates":[[[0.0,0.0],[2.0,0.0],[2.0,2.0],[0.0,2.0],[0.0,0.0]]]}"#;
        let rows = vec![row(json!({"system:index": "0", ".geo": geo, "WATER_AREA": 1.5}))];

        let cleaned = clean_rows(rows, 3, ResultLevel::Zone);

        assert_eq!(cleaned[0][GEOMETRY_COLUMN], json!("POINT (1 1)"));
        assert!(!cleaned[0].contains_key(".geo"));
    }

    #[test]
    fn concatenation_merges_headers() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("a.csv");
        let second = dir.path().join("b.csv");
        let output = dir.path().join("out.csv");

        write_rows(&first, &[row(json!({"ID": 1, "WATER_AREA": 1.5}))]).unwrap();
        write_rows(&second, &[row(json!({"ID": 2, "AC_AREA": 3, "WATER_AREA": null}))]).unwrap();

        let written = concat_csv(&[first, second], &output).unwrap();

        assert_eq!(written, 2);
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "ID,WATER_AREA,AC_AREA\n1,1.5,\n2,,3\n");
    }
}
