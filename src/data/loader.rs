use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::Path;

use anyhow::{bail, Context, Result};
use arrow::array::{Array, ArrayRef, AsArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float64Type, Int64Type, TimeUnit, TimestampMicrosecondType};
use bytes::Bytes;
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::{NaiveDate, NaiveDateTime};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{CellValue, Column, Table};

/// Cell contents treated as missing in text formats.
const NA_TOKENS: &[&str] = &["", "NA", "N/A", "NaN", "nan", "null", "NULL", "None"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load a table from an uploaded byte stream. The file name only selects
/// the decoder.
///
/// Supported formats:
/// * `.csv`                          – header row plus data rows
/// * `.xlsx` / `.xlsm` / `.xls` / `.ods` – first worksheet, first row is the header
/// * `.json`                         – `[{ "col": value, ... }, ...]`
/// * `.parquet` / `.pq`              – scalar columns
pub fn load_bytes(file_name: &str, bytes: &[u8]) -> Result<Table> {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let table = match ext.as_str() {
        "csv" => load_csv(bytes),
        "xlsx" | "xlsm" | "xls" | "ods" => load_spreadsheet(bytes),
        "json" => load_json(bytes),
        "parquet" | "pq" => load_parquet(bytes),
        "" => bail!("File '{file_name}' has no extension; cannot choose a decoder"),
        other => bail!("Unsupported file extension: .{other}"),
    }
    .with_context(|| format!("reading {file_name}"))?;

    if table.n_cols() == 0 {
        bail!("{file_name} contains no columns");
    }
    Ok(table)
}

/// Load a table from a file on disk. Dispatch by extension.
pub fn load_file(path: &Path) -> Result<Table> {
    let bytes = std::fs::read(path).with_context(|| format!("opening {}", path.display()))?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    load_bytes(name, &bytes)
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// Columns are typed as a whole: integers, then floats, then booleans, then
/// datetimes; anything else keeps the raw text.
fn load_csv(bytes: &[u8]) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(bytes);
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    if headers.is_empty() || headers.iter().all(String::is_empty) {
        bail!("CSV has no header row");
    }
    let headers = dedupe_headers(headers);

    let mut raw: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {}", row_no + 1))?;
        for (col_idx, cell) in record.iter().enumerate() {
            let cell = cell.trim();
            let value = (!NA_TOKENS.contains(&cell)).then(|| cell.to_string());
            raw[col_idx].push(value);
        }
    }

    let columns = headers
        .into_iter()
        .zip(raw)
        .map(|(name, cells)| Column::new(name, type_text_column(cells)))
        .collect();
    Ok(Table::new(columns))
}

fn type_text_column(cells: Vec<Option<String>>) -> Vec<CellValue> {
    let present = || cells.iter().flatten();

    if present().all(|s| s.parse::<i64>().is_ok()) {
        return convert(cells, |s| s.parse().ok().map(CellValue::Integer));
    }
    if present().all(|s| s.parse::<f64>().is_ok()) {
        return convert(cells, |s| s.parse().ok().map(CellValue::Float));
    }
    if present().all(|s| parse_bool(s).is_some()) {
        return convert(cells, |s| parse_bool(s).map(CellValue::Bool));
    }
    if present().all(|s| parse_datetime(s).is_some()) {
        return convert(cells, |s| parse_datetime(s).map(CellValue::DateTime));
    }
    convert(cells, |s| Some(CellValue::Text(s.to_string())))
}

fn convert(cells: Vec<Option<String>>, f: impl Fn(&str) -> Option<CellValue>) -> Vec<CellValue> {
    cells
        .iter()
        .map(|c| c.as_deref().and_then(&f).unwrap_or(CellValue::Null))
        .collect()
}

fn parse_bool(s: &str) -> Option<bool> {
    if s.eq_ignore_ascii_case("true") {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Parse the datetime layouts accepted in text sources.
pub(crate) fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Repeated header names get `.1`, `.2`, ... suffixes; blank ones become
/// `Unnamed: <index>`.
fn dedupe_headers(headers: Vec<String>) -> Vec<String> {
    let mut seen: BTreeMap<String, usize> = BTreeMap::new();
    headers
        .into_iter()
        .enumerate()
        .map(|(i, h)| {
            let base = if h.is_empty() { format!("Unnamed: {i}") } else { h };
            let count = seen.entry(base.clone()).or_insert(0);
            let name = if *count == 0 {
                base.clone()
            } else {
                format!("{base}.{count}")
            };
            *count += 1;
            name
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Spreadsheet loader
// ---------------------------------------------------------------------------

/// First worksheet only. Cells keep their native types; a column mixing
/// numbers and strings becomes a text column holding both.
fn load_spreadsheet(bytes: &[u8]) -> Result<Table> {
    let mut workbook =
        open_workbook_auto_from_rs(Cursor::new(bytes.to_vec())).context("opening workbook")?;
    let range = workbook
        .worksheet_range_at(0)
        .context("workbook has no worksheets")?
        .context("reading first worksheet")?;

    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        bail!("worksheet is empty");
    };
    let headers = dedupe_headers(
        header_row
            .iter()
            .map(|c| c.to_string().trim().to_string())
            .collect(),
    );

    let mut values: Vec<Vec<CellValue>> = vec![Vec::new(); headers.len()];
    for row in rows {
        for (col_idx, cell) in row.iter().enumerate().take(headers.len()) {
            values[col_idx].push(excel_cell(cell));
        }
    }

    let columns = headers
        .into_iter()
        .zip(values)
        .map(|(name, vals)| Column::new(name, vals))
        .collect();
    Ok(Table::new(columns))
}

fn excel_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Int(i) => CellValue::Integer(*i),
        Data::Float(f) => CellValue::Float(*f),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::String(s) if NA_TOKENS.contains(&s.trim()) => CellValue::Null,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(CellValue::DateTime)
            .unwrap_or(CellValue::Null),
        Data::DateTimeIso(s) => parse_datetime(s)
            .map(CellValue::DateTime)
            .unwrap_or_else(|| CellValue::Text(s.clone())),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
        _ => CellValue::Null,
    }
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented, the default `df.to_json(orient='records')`):
///
/// ```json
/// [
///   { "region": "North", "units": 12, "price": 9.5 },
///   { "region": "South", "units": 7,  "price": null }
/// ]
/// ```
///
/// Columns appear in first-seen order; keys missing from a record are null.
fn load_json(bytes: &[u8]) -> Result<Table> {
    let root: JsonValue = serde_json::from_slice(bytes).context("parsing JSON")?;

    let records = root
        .as_array()
        .context("Expected top-level JSON array")?;

    let mut names: Vec<String> = Vec::new();
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;
        for key in obj.keys() {
            if !names.contains(key) {
                names.push(key.clone());
            }
        }
    }

    let columns = names
        .into_iter()
        .map(|name| {
            let values = records
                .iter()
                .map(|rec| rec.get(&name).map_or(CellValue::Null, json_to_cell))
                .collect();
            Column::new(name, values)
        })
        .collect();
    Ok(Table::new(columns))
}

fn json_to_cell(val: &JsonValue) -> CellValue {
    match val {
        JsonValue::String(s) => CellValue::Text(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                CellValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                CellValue::Float(f)
            } else {
                CellValue::Text(n.to_string())
            }
        }
        JsonValue::Bool(b) => CellValue::Bool(*b),
        JsonValue::Null => CellValue::Null,
        other => CellValue::Text(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file with scalar columns (strings, integers, floats,
/// booleans, dates and timestamps).
///
/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`).
fn load_parquet(bytes: &[u8]) -> Result<Table> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(Bytes::from(bytes.to_vec()))
        .context("reading parquet metadata")?;
    let names: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let reader = builder.build().context("building parquet reader")?;

    let mut values: Vec<Vec<CellValue>> = vec![Vec::new(); names.len()];
    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        for (col_idx, array) in batch.columns().iter().enumerate() {
            let cells = arrow_cells(array)
                .with_context(|| format!("column '{}'", names[col_idx]))?;
            values[col_idx].extend(cells);
        }
    }

    let columns = names
        .into_iter()
        .zip(values)
        .map(|(name, vals)| Column::new(name, vals))
        .collect();
    Ok(Table::new(columns))
}

// -- Arrow helpers --

/// Convert one Arrow column into cells, widening numeric types to
/// `i64`/`f64` and temporal types to microsecond timestamps.
fn arrow_cells(col: &ArrayRef) -> Result<Vec<CellValue>> {
    let n = col.len();
    let cells = match col.data_type() {
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => {
            let arr = cast(col, &DataType::Utf8).context("casting to Utf8")?;
            let arr = arr.as_string::<i32>();
            (0..n)
                .map(|i| cell_or_null(arr, i, || CellValue::Text(arr.value(i).to_string())))
                .collect()
        }
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32 => {
            let arr = cast(col, &DataType::Int64).context("casting to Int64")?;
            let arr = arr.as_primitive::<Int64Type>();
            (0..n)
                .map(|i| cell_or_null(arr, i, || CellValue::Integer(arr.value(i))))
                .collect()
        }
        DataType::UInt64 | DataType::Float16 | DataType::Float32 | DataType::Float64 => {
            let arr = cast(col, &DataType::Float64).context("casting to Float64")?;
            let arr = arr.as_primitive::<Float64Type>();
            (0..n)
                .map(|i| cell_or_null(arr, i, || CellValue::Float(arr.value(i))))
                .collect()
        }
        DataType::Boolean => {
            let arr = col.as_boolean();
            (0..n)
                .map(|i| cell_or_null(arr, i, || CellValue::Bool(arr.value(i))))
                .collect()
        }
        DataType::Date32 | DataType::Date64 | DataType::Timestamp(_, _) => {
            let target = DataType::Timestamp(TimeUnit::Microsecond, None);
            let arr = cast(col, &target).context("casting to timestamp")?;
            let arr = arr.as_primitive::<TimestampMicrosecondType>();
            (0..n)
                .map(|i| {
                    if arr.is_null(i) {
                        CellValue::Null
                    } else {
                        arr.value_as_datetime(i)
                            .map(CellValue::DateTime)
                            .unwrap_or(CellValue::Null)
                    }
                })
                .collect()
        }
        other => bail!("unsupported column type {other:?}"),
    };
    Ok(cells)
}

fn cell_or_null(arr: &dyn Array, row: usize, value: impl FnOnce() -> CellValue) -> CellValue {
    if arr.is_null(row) {
        CellValue::Null
    } else {
        value()
    }
}
