use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use super::model::{CellValue, Column, Table};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Aggregation {
    Sum,
    Mean,
    Count,
    Min,
    Max,
    Median,
}

impl Aggregation {
    pub const ALL: [Aggregation; 6] = [
        Aggregation::Sum,
        Aggregation::Mean,
        Aggregation::Count,
        Aggregation::Min,
        Aggregation::Max,
        Aggregation::Median,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Aggregation::Sum => "sum",
            Aggregation::Mean => "mean",
            Aggregation::Count => "count",
            Aggregation::Min => "min",
            Aggregation::Max => "max",
            Aggregation::Median => "median",
        }
    }

    /// Reduce the non-missing values of one group. `None` when the group
    /// has nothing to reduce (count is always defined).
    pub fn apply(self, values: &[f64]) -> Option<f64> {
        let n = values.len() as f64;
        let result = match self {
            Aggregation::Count => n,
            Aggregation::Sum if values.is_empty() => 0.0,
            _ if values.is_empty() => return None,
            Aggregation::Sum => values.iter().sum::<f64>(),
            Aggregation::Mean => values.iter().sum::<f64>() / n,
            Aggregation::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            Aggregation::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Aggregation::Median => {
                let mut sorted = values.to_vec();
                sorted.sort_by(f64::total_cmp);
                let mid = sorted.len() / 2;
                if sorted.len() % 2 == 0 {
                    (sorted[mid - 1] + sorted[mid]) / 2.0
                } else {
                    sorted[mid]
                }
            }
        };
        Some(result)
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Aggregation {
    type Err = AggregateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Aggregation::ALL
            .into_iter()
            .find(|a| a.name() == s.trim())
            .ok_or_else(|| AggregateError::UnknownAggregation(s.to_string()))
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AggregateError {
    #[error("unknown column '{0}'")]
    UnknownColumn(String),
    #[error("column '{0}' is not numeric")]
    NonNumeric(String),
    #[error("unknown aggregation '{0}'")]
    UnknownAggregation(String),
}

fn lookup<'a>(table: &'a Table, name: &str) -> Result<&'a Column, AggregateError> {
    table
        .column(name)
        .ok_or_else(|| AggregateError::UnknownColumn(name.to_string()))
}

fn numeric<'a>(table: &'a Table, name: &str) -> Result<&'a Column, AggregateError> {
    let col = lookup(table, name)?;
    if !col.is_numeric() {
        return Err(AggregateError::NonNumeric(name.to_string()));
    }
    Ok(col)
}

/// Name of the aggregated column, e.g. `sum_revenue`.
pub fn aggregate_column_name(agg: Aggregation, value: &str) -> String {
    format!("{agg}_{value}")
}

/// Group rows by `group`, reduce `value` per group.
///
/// Groups come out sorted; rows whose group key is missing are dropped.
/// The result has two columns: `group` and `<agg>_<value>`.
pub fn group_aggregate(
    table: &Table,
    group: &str,
    value: &str,
    agg: Aggregation,
) -> Result<Table, AggregateError> {
    let keys = lookup(table, group)?;
    let vals = numeric(table, value)?;

    let mut groups: BTreeMap<&CellValue, Vec<f64>> = BTreeMap::new();
    for (key, v) in keys.values.iter().zip(&vals.values) {
        if key.is_missing() {
            continue;
        }
        let bucket = groups.entry(key).or_default();
        if let Some(x) = v.as_f64().filter(|x| !x.is_nan()) {
            bucket.push(x);
        }
    }

    let (labels, results): (Vec<CellValue>, Vec<CellValue>) = groups
        .into_iter()
        .map(|(k, xs)| {
            let r = agg.apply(&xs).map_or(CellValue::Null, CellValue::Float);
            (k.clone(), r)
        })
        .unzip();

    Ok(Table::new(vec![
        Column::new(group, labels),
        Column::new(aggregate_column_name(agg, value), results),
    ]))
}

/// Rows × columns matrix of aggregated values.
#[derive(Debug, Clone, PartialEq)]
pub struct PivotTable {
    pub row_labels: Vec<CellValue>,
    pub column_labels: Vec<CellValue>,
    /// `cells[r][c]`; `None` where no row falls in the combination.
    pub cells: Vec<Vec<Option<f64>>>,
}

impl PivotTable {
    pub fn is_empty(&self) -> bool {
        self.row_labels.is_empty() || self.column_labels.is_empty()
    }
}

/// Spreadsheet-style pivot: `index` values become rows, `columns` values
/// become columns, `values` is reduced with `agg` in each cell.
pub fn pivot(
    table: &Table,
    index: &str,
    columns: &str,
    values: &str,
    agg: Aggregation,
) -> Result<PivotTable, AggregateError> {
    let rows = lookup(table, index)?;
    let cols = lookup(table, columns)?;
    let vals = numeric(table, values)?;

    let mut buckets: BTreeMap<(&CellValue, &CellValue), Vec<f64>> = BTreeMap::new();
    for ((r, c), v) in rows.values.iter().zip(&cols.values).zip(&vals.values) {
        if r.is_missing() || c.is_missing() {
            continue;
        }
        let Some(x) = v.as_f64().filter(|x| !x.is_nan()) else {
            continue;
        };
        buckets.entry((r, c)).or_default().push(x);
    }

    let row_labels: BTreeSet<&CellValue> = buckets.keys().map(|(r, _)| *r).collect();
    let column_labels: BTreeSet<&CellValue> = buckets.keys().map(|(_, c)| *c).collect();

    let cells = row_labels
        .iter()
        .map(|r| {
            column_labels
                .iter()
                .map(|c| buckets.get(&(*r, *c)).and_then(|xs| agg.apply(xs)))
                .collect()
        })
        .collect();

    Ok(PivotTable {
        row_labels: row_labels.into_iter().cloned().collect(),
        column_labels: column_labels.into_iter().cloned().collect(),
        cells,
    })
}

/// Most frequent non-missing values of a column, highest count first.
/// Ties keep first-seen order.
pub fn value_counts(
    table: &Table,
    column: &str,
    limit: usize,
) -> Result<Vec<(CellValue, usize)>, AggregateError> {
    let mut counts = column_value_counts(lookup(table, column)?);
    counts.truncate(limit);
    Ok(counts)
}

pub(crate) fn column_value_counts(col: &Column) -> Vec<(CellValue, usize)> {
    let mut counts: Vec<(CellValue, usize)> = Vec::new();
    let mut positions: BTreeMap<&CellValue, usize> = BTreeMap::new();
    for v in col.values.iter().filter(|v| !v.is_missing()) {
        match positions.get(v) {
            Some(&i) => counts[i].1 += 1,
            None => {
                positions.insert(v, counts.len());
                counts.push((v.clone(), 1));
            }
        }
    }
    // stable sort keeps first-seen order among equal counts
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sales() -> Table {
        let text = |s: &[&str]| -> Vec<CellValue> {
            s.iter().map(|v| CellValue::Text(v.to_string())).collect()
        };
        Table::new(vec![
            Column::new("region", text(&["N", "S", "N", "E", "S", "N"])),
            Column::new("product", text(&["a", "a", "b", "b", "a", "a"])),
            Column::new(
                "units",
                vec![
                    CellValue::Integer(4),
                    CellValue::Integer(1),
                    CellValue::Integer(6),
                    CellValue::Null,
                    CellValue::Integer(3),
                    CellValue::Integer(2),
                ],
            ),
        ])
    }

    fn floats(t: &Table, col: &str) -> Vec<Option<f64>> {
        t.column(col).unwrap().values.iter().map(CellValue::as_f64).collect()
    }

    #[test]
    fn groups_are_sorted_and_reduced() {
        let t = group_aggregate(&sales(), "region", "units", Aggregation::Sum).unwrap();
        assert_eq!(t.column_names(), vec!["region", "sum_units"]);
        assert_eq!(
            t.column("region").unwrap().values,
            vec![CellValue::Text("E".into()), CellValue::Text("N".into()), CellValue::Text("S".into())]
        );
        assert_eq!(floats(&t, "sum_units"), vec![Some(0.0), Some(12.0), Some(4.0)]);

        let t = group_aggregate(&sales(), "region", "units", Aggregation::Count).unwrap();
        assert_eq!(floats(&t, "count_units"), vec![Some(0.0), Some(3.0), Some(2.0)]);

        let t = group_aggregate(&sales(), "region", "units", Aggregation::Median).unwrap();
        assert_eq!(floats(&t, "median_units"), vec![None, Some(4.0), Some(2.0)]);
    }

    #[test]
    fn non_numeric_value_column_is_rejected() {
        let err = group_aggregate(&sales(), "units", "region", Aggregation::Mean).unwrap_err();
        assert_eq!(err, AggregateError::NonNumeric("region".into()));
        assert!(group_aggregate(&sales(), "nope", "units", Aggregation::Mean).is_err());
    }

    #[test]
    fn pivot_fills_missing_combinations_with_none() {
        let p = pivot(&sales(), "region", "product", "units", Aggregation::Mean).unwrap();
        assert_eq!(p.row_labels.len(), 2); // E has no units at all
        assert_eq!(p.column_labels, vec![CellValue::Text("a".into()), CellValue::Text("b".into())]);
        assert_eq!(p.cells[0], vec![Some(3.0), Some(6.0)]); // N
        assert_eq!(p.cells[1], vec![Some(2.0), None]); // S
    }

    #[test]
    fn value_counts_orders_by_frequency_then_first_seen() {
        let vc = value_counts(&sales(), "region", 2).unwrap();
        assert_eq!(
            vc,
            vec![(CellValue::Text("N".into()), 3), (CellValue::Text("S".into()), 2)]
        );
        let vc = value_counts(&sales(), "product", 10).unwrap();
        assert_eq!(vc[0], (CellValue::Text("a".into()), 4));
    }

    #[test]
    fn aggregation_names_round_trip() {
        for a in Aggregation::ALL {
            assert_eq!(a.name().parse::<Aggregation>().unwrap(), a);
        }
    }

    #[test]
    fn empty_groups_only_count_and_sum() {
        assert_eq!(Aggregation::Count.apply(&[]), Some(0.0));
        assert_eq!(Aggregation::Sum.apply(&[]), Some(0.0));
        assert_eq!(Aggregation::Mean.apply(&[]), None);
        assert_eq!(Aggregation::Median.apply(&[]), None);
        assert_eq!(Aggregation::Count.apply(&[2.0, 5.0]), Some(2.0));
        assert_eq!(Aggregation::Median.apply(&[3.0, 1.0, 2.0, 10.0]), Some(2.5));
    }
}
