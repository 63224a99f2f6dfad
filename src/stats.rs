//! Descriptive statistics: shape, column types, missing counts and
//! per-column summaries.

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::data::aggregate::column_value_counts;
use crate::data::model::{CellValue, Column, ColumnKind, Table};

/// Row labels of the numeric summary, in display order.
pub const NUMERIC_STAT_LABELS: [&str; 8] = ["count", "mean", "std", "min", "25%", "50%", "75%", "max"];

// ---------------------------------------------------------------------------
// Basic information
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Overview {
    pub rows: usize,
    pub columns: usize,
    pub column_names: Vec<String>,
}

pub fn overview(table: &Table) -> Overview {
    Overview {
        rows: table.n_rows(),
        columns: table.n_cols(),
        column_names: table.column_names(),
    }
}

pub fn column_types(table: &Table) -> Vec<(String, ColumnKind)> {
    table
        .columns
        .iter()
        .map(|c| (c.name.clone(), c.kind))
        .collect()
}

pub fn missing_values(table: &Table) -> Vec<(String, usize)> {
    table
        .columns
        .iter()
        .map(|c| (c.name.clone(), c.missing_count()))
        .collect()
}

// ---------------------------------------------------------------------------
// Summaries
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StatsError {
    #[error("cannot describe a table without columns")]
    NoColumns,
    #[error("table has no numeric columns")]
    NoNumericColumns,
    #[error("column '{0}' mixes value types")]
    MixedTypes(String),
}

/// Which columns a description covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Include {
    All,
    Numeric,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NumericSummary {
    pub count: usize,
    pub mean: Option<f64>,
    /// Sample standard deviation; undefined below two values.
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub q1: Option<f64>,
    pub median: Option<f64>,
    pub q3: Option<f64>,
    pub max: Option<f64>,
}

impl NumericSummary {
    fn of(column: &Column) -> Self {
        let mut xs: Vec<f64> = column
            .values
            .iter()
            .filter_map(CellValue::as_f64)
            .filter(|x| !x.is_nan())
            .collect();
        xs.sort_by(f64::total_cmp);
        let n = xs.len();
        let mean = (n > 0).then(|| xs.iter().sum::<f64>() / n as f64);
        let std = mean.filter(|_| n > 1).map(|m| {
            let ss: f64 = xs.iter().map(|x| (x - m).powi(2)).sum();
            (ss / (n - 1) as f64).sqrt()
        });
        NumericSummary {
            count: n,
            mean,
            std,
            min: xs.first().copied(),
            q1: quantile(&xs, 0.25),
            median: quantile(&xs, 0.5),
            q3: quantile(&xs, 0.75),
            max: xs.last().copied(),
        }
    }

    /// Values in [`NUMERIC_STAT_LABELS`] order.
    pub fn values(&self) -> [Option<f64>; 8] {
        [
            Some(self.count as f64),
            self.mean,
            self.std,
            self.min,
            self.q1,
            self.median,
            self.q3,
            self.max,
        ]
    }

    fn rounded(&self, decimals: u32) -> Self {
        let r = |v: Option<f64>| v.map(|x| round_to(x, decimals));
        NumericSummary {
            count: self.count,
            mean: r(self.mean),
            std: r(self.std),
            min: r(self.min),
            q1: r(self.q1),
            median: r(self.median),
            q3: r(self.q3),
            max: r(self.max),
        }
    }
}

/// Linear interpolation between closest ranks over sorted input.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64))
}

pub fn round_to(x: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (x * factor).round() / factor
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoricalSummary {
    pub count: usize,
    pub unique: usize,
    pub top: Option<CellValue>,
    pub freq: usize,
}

impl CategoricalSummary {
    fn of(column: &Column) -> Self {
        let counts = column_value_counts(column);
        CategoricalSummary {
            count: counts.iter().map(|(_, n)| n).sum(),
            unique: counts.len(),
            top: counts.first().map(|(v, _)| v.clone()),
            freq: counts.first().map_or(0, |(_, n)| *n),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemporalSummary {
    pub categorical: CategoricalSummary,
    pub first: Option<NaiveDateTime>,
    pub last: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnStats {
    Numeric(NumericSummary),
    Categorical(CategoricalSummary),
    Temporal(TemporalSummary),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSummary {
    pub name: String,
    pub stats: ColumnStats,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Description {
    pub columns: Vec<ColumnSummary>,
}

/// A header plus labelled rows of formatted cells.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsGrid {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Description {
    pub fn round(&self, decimals: u32) -> Description {
        let columns = self
            .columns
            .iter()
            .map(|c| ColumnSummary {
                name: c.name.clone(),
                stats: match &c.stats {
                    ColumnStats::Numeric(n) => ColumnStats::Numeric(n.rounded(decimals)),
                    other => other.clone(),
                },
            })
            .collect();
        Description { columns }
    }

    pub fn numeric(&self, column: &str) -> Option<&NumericSummary> {
        self.columns.iter().find_map(|c| match &c.stats {
            ColumnStats::Numeric(n) if c.name == column => Some(n),
            _ => None,
        })
    }

    /// The numeric part as statistic rows × numeric columns, first `limit`
    /// statistic rows only. The header starts with `"Column"`.
    pub fn numeric_grid(&self, limit: usize) -> StatsGrid {
        let numeric: Vec<(&str, &NumericSummary)> = self
            .columns
            .iter()
            .filter_map(|c| match &c.stats {
                ColumnStats::Numeric(n) => Some((c.name.as_str(), n)),
                _ => None,
            })
            .collect();

        let mut header = vec!["Column".to_string()];
        header.extend(numeric.iter().map(|(name, _)| name.to_string()));

        let rows = NUMERIC_STAT_LABELS
            .iter()
            .enumerate()
            .take(limit)
            .map(|(i, label)| {
                let mut row = vec![label.to_string()];
                row.extend(numeric.iter().map(|(_, n)| format_stat(n.values()[i])));
                row
            })
            .collect();

        StatsGrid { header, rows }
    }

    /// One row per column, the layout of the overview page.
    pub fn transposed_grid(&self) -> StatsGrid {
        let header = [
            "column", "count", "unique", "top", "freq", "mean", "std", "min", "25%", "50%", "75%",
            "max",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let blank = || String::new();
        let rows = self
            .columns
            .iter()
            .map(|c| {
                let mut row = vec![c.name.clone()];
                match &c.stats {
                    ColumnStats::Numeric(n) => {
                        row.push(n.count.to_string());
                        row.extend([blank(), blank(), blank()]);
                        row.extend(n.values()[1..].iter().map(|v| format_stat(*v)));
                    }
                    ColumnStats::Categorical(s) => {
                        row.extend(categorical_cells(s));
                        row.extend(std::iter::repeat_with(blank).take(7));
                    }
                    ColumnStats::Temporal(t) => {
                        let fmt = |d: Option<NaiveDateTime>| {
                            d.map(|d| CellValue::DateTime(d).to_string()).unwrap_or_default()
                        };
                        row.extend(categorical_cells(&t.categorical));
                        row.extend([blank(), blank(), fmt(t.first)]);
                        row.extend([blank(), blank(), blank(), fmt(t.last)]);
                    }
                }
                row
            })
            .collect();

        StatsGrid { header, rows }
    }
}

fn categorical_cells(s: &CategoricalSummary) -> [String; 4] {
    [
        s.count.to_string(),
        s.unique.to_string(),
        s.top.as_ref().map(CellValue::to_plain_string).unwrap_or_default(),
        s.freq.to_string(),
    ]
}

fn format_stat(v: Option<f64>) -> String {
    v.map_or_else(|| "nan".to_string(), |x| CellValue::Float(x).to_plain_string())
}

/// Summarise the selected columns.
///
/// `Include::All` refuses non-numeric columns that mix value types;
/// `Include::Numeric` needs at least one numeric column.
pub fn describe(table: &Table, include: Include) -> Result<Description, StatsError> {
    if table.n_cols() == 0 {
        return Err(StatsError::NoColumns);
    }

    let columns: Vec<ColumnSummary> = match include {
        Include::Numeric => table
            .columns
            .iter()
            .filter(|c| c.is_numeric())
            .map(|c| ColumnSummary {
                name: c.name.clone(),
                stats: ColumnStats::Numeric(NumericSummary::of(c)),
            })
            .collect(),
        Include::All => table
            .columns
            .iter()
            .map(summarize_column)
            .collect::<Result<_, _>>()?,
    };

    if columns.is_empty() {
        return Err(StatsError::NoNumericColumns);
    }
    Ok(Description { columns })
}

fn summarize_column(c: &Column) -> Result<ColumnSummary, StatsError> {
    if !c.is_numeric() && c.has_mixed_types() {
        return Err(StatsError::MixedTypes(c.name.clone()));
    }
    let stats = match c.kind {
        ColumnKind::Numeric => ColumnStats::Numeric(NumericSummary::of(c)),
        ColumnKind::Text | ColumnKind::Boolean => {
            ColumnStats::Categorical(CategoricalSummary::of(c))
        }
        ColumnKind::DateTime => {
            let stamps = c.values.iter().filter_map(CellValue::as_datetime);
            ColumnStats::Temporal(TemporalSummary {
                categorical: CategoricalSummary::of(c),
                first: stamps.clone().min(),
                last: stamps.max(),
            })
        }
    };
    Ok(ColumnSummary {
        name: c.name.clone(),
        stats,
    })
}

// ---------------------------------------------------------------------------
// Correlation
// ---------------------------------------------------------------------------

/// Pearson correlation between every pair of numeric columns.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    /// `values[i][j]`; `None` when fewer than two rows have both values or
    /// one side is constant.
    pub values: Vec<Vec<Option<f64>>>,
}

/// Correlation over the numeric columns, each pair using only the rows
/// where both values are present.
pub fn correlation_matrix(table: &Table) -> CorrelationMatrix {
    let numeric: Vec<&Column> = table.columns.iter().filter(|c| c.is_numeric()).collect();
    let values = numeric
        .iter()
        .map(|a| numeric.iter().map(|b| pearson(a, b)).collect())
        .collect();
    CorrelationMatrix {
        columns: numeric.iter().map(|c| c.name.clone()).collect(),
        values,
    }
}

fn pearson(a: &Column, b: &Column) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = a
        .values
        .iter()
        .zip(&b.values)
        .filter_map(|(x, y)| Some((x.as_f64()?, y.as_f64()?)))
        .filter(|(x, y)| !x.is_nan() && !y.is_nan())
        .collect();
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mx = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let my = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        sxy += (x - mx) * (y - my);
        sxx += (x - mx).powi(2);
        syy += (y - my).powi(2);
    }
    if sxx == 0.0 || syy == 0.0 {
        return None;
    }
    Some((sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0))
}

/// A description, possibly narrowed to numeric columns.
#[derive(Debug, Clone, PartialEq)]
pub enum Summary {
    Full(Description),
    NumericOnly {
        description: Description,
        reason: StatsError,
    },
}

impl Summary {
    pub fn description(&self) -> &Description {
        match self {
            Summary::Full(d) => d,
            Summary::NumericOnly { description, .. } => description,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Summary::NumericOnly { .. })
    }
}

/// Describe every column, falling back to numeric columns only when the
/// combined summary is not possible.
pub fn summarize(table: &Table) -> Result<Summary, StatsError> {
    match describe(table, Include::All) {
        Ok(d) => Ok(Summary::Full(d)),
        Err(reason) => {
            log::warn!("full summary unavailable ({reason}); using numeric columns only");
            let description = describe(table, Include::Numeric)?;
            Ok(Summary::NumericOnly {
                description,
                reason,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Table {
        Table::new(vec![
            Column::new("v", (1..=5).map(CellValue::Integer).collect()),
            Column::new(
                "city",
                ["Oslo", "Rome", "Oslo", "Lima", ""]
                    .iter()
                    .map(|s| {
                        if s.is_empty() {
                            CellValue::Null
                        } else {
                            CellValue::Text(s.to_string())
                        }
                    })
                    .collect(),
            ),
        ])
    }

    #[test]
    fn numeric_summary_of_one_to_five() {
        let d = describe(&table(), Include::All).unwrap();
        let n = d.numeric("v").unwrap();
        assert_eq!(n.count, 5);
        assert_eq!(n.mean, Some(3.0));
        assert_eq!(n.min, Some(1.0));
        assert_eq!(n.max, Some(5.0));
        assert_eq!(n.median, Some(3.0));
        assert_eq!(n.q1, Some(2.0));
        assert!((n.std.unwrap() - 1.581_138_8).abs() < 1e-6);
    }

    #[test]
    fn categorical_summary_reports_top_value() {
        let d = describe(&table(), Include::All).unwrap();
        let ColumnStats::Categorical(c) = &d.columns[1].stats else {
            panic!("expected categorical summary");
        };
        assert_eq!(c.count, 4);
        assert_eq!(c.unique, 3);
        assert_eq!(c.top, Some(CellValue::Text("Oslo".into())));
        assert_eq!(c.freq, 2);
    }

    #[test]
    fn shape_types_and_missing_counts() {
        let t = table();
        let o = overview(&t);
        assert_eq!((o.rows, o.columns), (5, 2));
        assert_eq!(column_types(&t)[1], ("city".to_string(), ColumnKind::Text));
        assert_eq!(missing_values(&t), vec![("v".to_string(), 0), ("city".to_string(), 1)]);
    }

    #[test]
    fn mixed_column_falls_back_to_numeric_only() {
        let mut t = table();
        t.columns.push(Column::new(
            "code",
            vec![
                CellValue::Integer(1),
                CellValue::Text("x".into()),
                CellValue::Null,
                CellValue::Null,
                CellValue::Null,
            ],
        ));
        let s = summarize(&t).unwrap();
        assert!(s.is_degraded());
        assert_eq!(s.description().columns.len(), 1);
        let Summary::NumericOnly { reason, .. } = s else { unreachable!() };
        assert_eq!(reason, StatsError::MixedTypes("code".into()));
    }

    #[test]
    fn no_numeric_columns_after_fallback_is_an_error() {
        let t = Table::new(vec![Column::new(
            "mixed",
            vec![CellValue::Bool(true), CellValue::Text("x".into())],
        )]);
        assert_eq!(summarize(&t).unwrap_err(), StatsError::NoNumericColumns);
        assert_eq!(describe(&Table::default(), Include::All).unwrap_err(), StatsError::NoColumns);
    }

    #[test]
    fn numeric_grid_is_rounded_and_truncated() {
        let d = describe(&table(), Include::Numeric).unwrap().round(3);
        let grid = d.numeric_grid(8);
        assert_eq!(grid.header, vec!["Column", "v"]);
        assert_eq!(grid.rows.len(), 8);
        assert_eq!(grid.rows[0], vec!["count", "5.0"]);
        assert_eq!(grid.rows[2], vec!["std", "1.581"]);
        assert_eq!(d.numeric_grid(3).rows.len(), 3);
    }

    #[test]
    fn std_is_undefined_for_single_value() {
        let t = Table::new(vec![Column::new("x", vec![CellValue::Float(4.0)])]);
        let d = describe(&t, Include::Numeric).unwrap();
        assert_eq!(d.numeric("x").unwrap().std, None);
        assert_eq!(d.numeric_grid(8).rows[2][1], "nan");
    }

    #[test]
    fn correlation_pairs_ignore_missing_rows() {
        let t = Table::new(vec![
            Column::new("a", (1..=4).map(CellValue::Integer).collect()),
            Column::new(
                "b",
                vec![
                    CellValue::Float(2.0),
                    CellValue::Null,
                    CellValue::Float(6.0),
                    CellValue::Float(8.0),
                ],
            ),
            Column::new("c", (1..=4).map(|x| CellValue::Integer(-x)).collect()),
            Column::new("flat", vec![CellValue::Integer(7); 4]),
            Column::new("name", vec![CellValue::Text("x".into()); 4]),
        ]);
        let m = correlation_matrix(&t);
        assert_eq!(m.columns, vec!["a", "b", "c", "flat"]);
        assert!((m.values[0][1].unwrap() - 1.0).abs() < 1e-12);
        assert!((m.values[0][2].unwrap() + 1.0).abs() < 1e-12);
        assert_eq!(m.values[0][3], None);
        assert_eq!(m.values[3][3], None);
    }

    #[test]
    fn quantiles_interpolate_linearly() {
        let xs = [1.0, 2.0, 4.0, 8.0];
        assert_eq!(quantile(&xs, 0.5), Some(3.0));
        assert_eq!(quantile(&xs, 0.25), Some(1.75));
        assert_eq!(quantile(&[], 0.5), None);
    }
}
