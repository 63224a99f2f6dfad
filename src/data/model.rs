use std::fmt;

use chrono::NaiveDateTime;
use serde::{Serialize, Serializer};

pub const DATETIME_DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ---------------------------------------------------------------------------
// CellValue – a single cell of the table
// ---------------------------------------------------------------------------

/// A dynamically-typed cell mirroring the dtypes a tabular upload can carry.
/// Used as a key in `BTreeMap` / `BTreeSet` for grouping, so it must be `Ord`.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    DateTime(NaiveDateTime),
}

// -- Manual Eq/Ord so we can put CellValue in BTreeSet --

impl Eq for CellValue {}

impl PartialOrd for CellValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CellValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use CellValue::*;
        fn discriminant(v: &CellValue) -> u8 {
            match v {
                Null => 0,
                Bool(_) => 1,
                Integer(_) | Float(_) => 2,
                Text(_) => 3,
                DateTime(_) => 4,
            }
        }
        let da = discriminant(self);
        let db = discriminant(other);
        if da != db {
            return da.cmp(&db);
        }
        match (self, other) {
            (Null, Null) => std::cmp::Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Text(a), Text(b)) => a.cmp(b),
            (DateTime(a), DateTime(b)) => a.cmp(b),
            // Mixed integer / float compare numerically, integers first on ties.
            (a, b) => {
                let fa = a.as_f64().unwrap_or(f64::NAN);
                let fb = b.as_f64().unwrap_or(f64::NAN);
                fa.total_cmp(&fb).then_with(|| {
                    matches!(b, Integer(_)).cmp(&matches!(a, Integer(_)))
                })
            }
        }
    }
}

impl std::hash::Hash for CellValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            CellValue::Text(s) => s.hash(state),
            CellValue::Integer(i) => i.hash(state),
            CellValue::Float(f) => f.to_bits().hash(state),
            CellValue::Bool(b) => b.hash(state),
            CellValue::DateTime(d) => d.hash(state),
            CellValue::Null => {}
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Text(s) => write!(f, "{s}"),
            CellValue::Integer(i) => write!(f, "{i}"),
            CellValue::Float(v) => write!(f, "{v:.4}"),
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::DateTime(d) => write!(f, "{}", d.format(DATETIME_DISPLAY_FORMAT)),
            CellValue::Null => write!(f, "<null>"),
        }
    }
}

/// Plotly accepts numbers, strings and null; datetimes travel as text.
impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CellValue::Null => serializer.serialize_none(),
            CellValue::Bool(b) => serializer.serialize_bool(*b),
            CellValue::Integer(i) => serializer.serialize_i64(*i),
            CellValue::Float(v) if v.is_finite() => serializer.serialize_f64(*v),
            CellValue::Float(_) => serializer.serialize_none(),
            CellValue::Text(s) => serializer.serialize_str(s),
            CellValue::DateTime(d) => {
                serializer.collect_str(&d.format(DATETIME_DISPLAY_FORMAT))
            }
        }
    }
}

impl CellValue {
    /// Try to interpret the value as an `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Float(v) => Some(*v),
            CellValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            CellValue::DateTime(d) => Some(*d),
            _ => None,
        }
    }

    /// Null and NaN both count as missing.
    pub fn is_missing(&self) -> bool {
        match self {
            CellValue::Null => true,
            CellValue::Float(v) => v.is_nan(),
            _ => false,
        }
    }

    /// Unformatted string form (`3.0`, `42`, `abc`), used for substring
    /// matching and for labels.
    pub fn to_plain_string(&self) -> String {
        match self {
            CellValue::Float(v) if v.is_finite() && v.fract() == 0.0 => format!("{v:.1}"),
            CellValue::Float(v) => format!("{v}"),
            CellValue::Null => String::new(),
            other => other.to_string(),
        }
    }

    /// Broad value type, used to detect columns holding mixed types.
    pub(crate) fn type_tag(&self) -> Option<ColumnKind> {
        match self {
            CellValue::Null => None,
            CellValue::Float(v) if v.is_nan() => None,
            CellValue::Integer(_) | CellValue::Float(_) => Some(ColumnKind::Numeric),
            CellValue::Bool(_) => Some(ColumnKind::Boolean),
            CellValue::Text(_) => Some(ColumnKind::Text),
            CellValue::DateTime(_) => Some(ColumnKind::DateTime),
        }
    }
}

// ---------------------------------------------------------------------------
// Column
// ---------------------------------------------------------------------------

/// Inferred type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ColumnKind {
    Numeric,
    Text,
    DateTime,
    Boolean,
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnKind::Numeric => "numeric",
            ColumnKind::Text => "text",
            ColumnKind::DateTime => "datetime",
            ColumnKind::Boolean => "boolean",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
    pub values: Vec<CellValue>,
}

impl Column {
    /// Build a column, inferring its kind from the non-missing values.
    ///
    /// A column whose cells all share one type takes that type; an empty or
    /// all-missing column is numeric (like a float column of NaN); anything
    /// mixed is text.
    pub fn new(name: impl Into<String>, values: Vec<CellValue>) -> Self {
        let kind = infer_kind(&values);
        Column {
            name: name.into(),
            kind,
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_numeric(&self) -> bool {
        self.kind == ColumnKind::Numeric
    }

    pub fn missing_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_missing()).count()
    }

    /// Whether the non-missing cells carry more than one value type.
    pub fn has_mixed_types(&self) -> bool {
        let mut tags = self.values.iter().filter_map(CellValue::type_tag);
        match tags.next() {
            Some(first) => tags.any(|t| t != first),
            None => false,
        }
    }
}

fn infer_kind(values: &[CellValue]) -> ColumnKind {
    let mut tags = values.iter().filter_map(CellValue::type_tag);
    let Some(first) = tags.next() else {
        return ColumnKind::Numeric;
    };
    if tags.all(|t| t == first) {
        first
    } else {
        ColumnKind::Text
    }
}

// ---------------------------------------------------------------------------
// Table – the complete loaded dataset
// ---------------------------------------------------------------------------

/// An ordered collection of equally long, named columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<Column>,
}

impl Table {
    /// Columns are expected to have equal length; the row count is taken
    /// from the first column.
    pub fn new(columns: Vec<Column>) -> Self {
        debug_assert!(
            columns.windows(2).all(|w| w[0].len() == w[1].len()),
            "ragged table"
        );
        Table { columns }
    }

    /// Number of rows.
    pub fn n_rows(&self) -> usize {
        self.columns.first().map_or(0, Column::len)
    }

    /// Number of columns.
    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows() == 0
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn numeric_column_names(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.is_numeric())
            .map(|c| c.name.clone())
            .collect()
    }

    /// Every column that is not numeric (text, datetime, boolean).
    pub fn categorical_column_names(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| !c.is_numeric())
            .map(|c| c.name.clone())
            .collect()
    }

    /// A derived table holding only the given rows, in the given order.
    pub fn take_rows(&self, indices: &[usize]) -> Table {
        let columns = self
            .columns
            .iter()
            .map(|c| Column {
                name: c.name.clone(),
                kind: c.kind,
                values: indices.iter().map(|&i| c.values[i].clone()).collect(),
            })
            .collect();
        Table { columns }
    }

    pub fn head(&self, n: usize) -> Table {
        let indices: Vec<usize> = (0..self.n_rows().min(n)).collect();
        self.take_rows(&indices)
    }

    /// Keep only the named columns, in the given order. Unknown names are
    /// skipped.
    pub fn select(&self, names: &[String]) -> Table {
        let columns = names
            .iter()
            .filter_map(|n| self.column(n).cloned())
            .collect();
        Table { columns }
    }

    /// Append a 0-based integer index column. An existing column with the
    /// same name is replaced.
    pub fn with_index_column(mut self, name: &str) -> Table {
        let values = (0..self.n_rows() as i64).map(CellValue::Integer).collect();
        self.columns.retain(|c| c.name != name);
        self.columns.push(Column {
            name: name.to_string(),
            kind: ColumnKind::Numeric,
            values,
        });
        self
    }

    /// Cells of one row, in column order.
    pub fn row(&self, index: usize) -> Vec<&CellValue> {
        self.columns.iter().map(|c| &c.values[index]).collect()
    }
}
