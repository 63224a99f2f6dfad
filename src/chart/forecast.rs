//! Straight-line extrapolation of an (x, y) series.
//!
//! The fit runs over the x values when x is numeric and over the row
//! position (0, 1, 2, ...) otherwise. Future labels for non-numeric x are
//! derived separately: evenly stepped timestamps for datetime x,
//! `<column>_t+<i>` placeholders for anything else. With irregular
//! timestamps the fitted positions and the labels therefore disagree.

use std::fmt;

use chrono::TimeDelta;
use thiserror::Error;

use crate::data::model::{CellValue, ColumnKind, Table};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ForecastError {
    #[error("unknown column '{0}'")]
    UnknownColumn(String),
    #[error("no rows with both x and y present")]
    InsufficientData,
    #[error("value {value} in column '{column}' is not numeric")]
    NonNumeric { column: String, value: String },
    #[error("cannot fit a line through fewer than two distinct points")]
    DegenerateFit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeriesOrigin {
    History,
    Forecast,
}

impl fmt::Display for SeriesOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeriesOrigin::History => f.write_str("History"),
            SeriesOrigin::Forecast => f.write_str("Forecast"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeriesPoint {
    pub x: CellValue,
    pub y: f64,
    pub origin: SeriesOrigin,
}

/// History points in original row order followed by the forecast points.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastSeries {
    pub x_column: String,
    pub y_column: String,
    pub slope: f64,
    pub intercept: f64,
    pub points: Vec<SeriesPoint>,
}

impl ForecastSeries {
    pub fn points_of(&self, origin: SeriesOrigin) -> impl Iterator<Item = &SeriesPoint> {
        self.points.iter().filter(move |p| p.origin == origin)
    }

    pub fn history(&self) -> impl Iterator<Item = &SeriesPoint> {
        self.points_of(SeriesOrigin::History)
    }

    pub fn forecast(&self) -> impl Iterator<Item = &SeriesPoint> {
        self.points_of(SeriesOrigin::Forecast)
    }
}

/// Ordinary least squares fit of `y = slope * t + intercept`.
pub fn linear_fit(t: &[f64], y: &[f64]) -> Result<(f64, f64), ForecastError> {
    let n = t.len().min(y.len());
    if n < 2 {
        return Err(ForecastError::DegenerateFit);
    }
    let (t, y) = (&t[..n], &y[..n]);
    let t_mean = t.iter().sum::<f64>() / n as f64;
    let y_mean = y.iter().sum::<f64>() / n as f64;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for (ti, yi) in t.iter().zip(y) {
        let dt = ti - t_mean;
        sxx += dt * dt;
        sxy += dt * (yi - y_mean);
    }
    if sxx == 0.0 || !sxx.is_finite() {
        return Err(ForecastError::DegenerateFit);
    }
    let slope = sxy / sxx;
    let intercept = y_mean - slope * t_mean;
    if !slope.is_finite() || !intercept.is_finite() {
        return Err(ForecastError::DegenerateFit);
    }
    Ok((slope, intercept))
}

fn numeric_y(cell: &CellValue, column: &str) -> Result<Option<f64>, ForecastError> {
    if cell.is_missing() {
        return Ok(None);
    }
    let value = match cell {
        CellValue::Integer(_) | CellValue::Float(_) => cell.as_f64(),
        CellValue::Bool(b) => Some(f64::from(u8::from(*b))),
        CellValue::Text(s) => s.trim().parse().ok(),
        _ => None,
    };
    value.map(Some).ok_or_else(|| ForecastError::NonNumeric {
        column: column.to_string(),
        value: cell.to_plain_string(),
    })
}

/// Extend the `(x, y)` series of `table` by `horizon` fitted points.
///
/// Rows missing x or y are dropped first. A zero horizon yields the
/// history alone.
pub fn forecast_series(
    table: &Table,
    x_column: &str,
    y_column: &str,
    horizon: usize,
) -> Result<ForecastSeries, ForecastError> {
    let x_col = table
        .column(x_column)
        .ok_or_else(|| ForecastError::UnknownColumn(x_column.to_string()))?;
    let y_col = table
        .column(y_column)
        .ok_or_else(|| ForecastError::UnknownColumn(y_column.to_string()))?;

    let mut xs: Vec<&CellValue> = Vec::new();
    let mut ys: Vec<f64> = Vec::new();
    for (x, y) in x_col.values.iter().zip(&y_col.values) {
        if x.is_missing() {
            continue;
        }
        if let Some(y) = numeric_y(y, y_column)? {
            xs.push(x);
            ys.push(y);
        }
    }
    if xs.is_empty() {
        return Err(ForecastError::InsufficientData);
    }

    let numeric_x = x_col.kind == ColumnKind::Numeric;
    let t: Vec<f64> = if numeric_x {
        xs.iter().map(|x| x.as_f64().unwrap_or(f64::NAN)).collect()
    } else {
        (0..xs.len()).map(|i| i as f64).collect()
    };

    let (slope, intercept) = linear_fit(&t, &ys)?;

    let last_t = t[t.len() - 1];
    let future_t: Vec<f64> = (1..=horizon).map(|i| last_t + i as f64).collect();

    let future_x: Vec<CellValue> = if numeric_x {
        future_t.iter().map(|&v| CellValue::Float(v)).collect()
    } else if x_col.kind == ColumnKind::DateTime {
        future_timestamps(&xs, horizon)
    } else {
        (1..=horizon)
            .map(|i| CellValue::Text(format!("{x_column}_t+{i}")))
            .collect()
    };

    let mut points: Vec<SeriesPoint> = xs
        .into_iter()
        .zip(ys)
        .map(|(x, y)| SeriesPoint {
            x: x.clone(),
            y,
            origin: SeriesOrigin::History,
        })
        .collect();
    points.extend(future_x.into_iter().zip(&future_t).map(|(x, &ft)| SeriesPoint {
        x,
        y: slope * ft + intercept,
        origin: SeriesOrigin::Forecast,
    }));

    log::debug!(
        "forecast {y_column} over {x_column}: slope {slope:.4}, intercept {intercept:.4}, {horizon} points"
    );

    Ok(ForecastSeries {
        x_column: x_column.to_string(),
        y_column: y_column.to_string(),
        slope,
        intercept,
        points,
    })
}

/// Last timestamp plus whole multiples of the mean observed step,
/// `(last - first) / (count - 1)`; the last timestamp repeats when there is
/// only one observation.
fn future_timestamps(xs: &[&CellValue], horizon: usize) -> Vec<CellValue> {
    let stamps: Vec<_> = xs.iter().filter_map(|x| x.as_datetime()).collect();
    let (Some(&first), Some(&last)) = (stamps.first(), stamps.last()) else {
        return vec![CellValue::Null; horizon];
    };
    let step = i32::try_from(stamps.len().saturating_sub(1))
        .ok()
        .filter(|&d| d > 0)
        .map_or(TimeDelta::zero(), |d| (last - first) / d);

    (1..=horizon)
        .map(|i| {
            i32::try_from(i)
                .ok()
                .and_then(|k| step.checked_mul(k))
                .and_then(|offset| last.checked_add_signed(offset))
                .map_or(CellValue::DateTime(last), CellValue::DateTime)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::data::model::Column;

    fn xy(x: Vec<CellValue>, y: Vec<CellValue>) -> Table {
        Table::new(vec![Column::new("x", x), Column::new("y", y)])
    }

    fn ints(v: impl IntoIterator<Item = i64>) -> Vec<CellValue> {
        v.into_iter().map(CellValue::Integer).collect()
    }

    #[test]
    fn perfect_line_extends_exactly() {
        let t = xy(ints(0..5), ints((0..5).map(|x| 2 * x + 1)));
        let s = forecast_series(&t, "x", "y", 3).unwrap();
        assert_eq!((s.slope, s.intercept), (2.0, 1.0));
        let fx: Vec<_> = s.forecast().map(|p| p.x.clone()).collect();
        let fy: Vec<_> = s.forecast().map(|p| p.y).collect();
        assert_eq!(fx, vec![CellValue::Float(5.0), CellValue::Float(6.0), CellValue::Float(7.0)]);
        assert_eq!(fy, vec![11.0, 13.0, 15.0]);
        assert_eq!(s.history().count(), 5);
        assert_eq!(s.points[0].origin, SeriesOrigin::History);
        assert_eq!(s.points[5].origin, SeriesOrigin::Forecast);
    }

    #[test]
    fn zero_horizon_keeps_history_only() {
        let t = xy(ints(0..4), ints([3, 1, 4, 1]));
        let s = forecast_series(&t, "x", "y", 0).unwrap();
        assert_eq!(s.points.len(), 4);
        assert_eq!(s.forecast().count(), 0);
    }

    #[test]
    fn missing_values_are_dropped_before_fitting() {
        let t = xy(
            vec![CellValue::Integer(0), CellValue::Null, CellValue::Integer(2), CellValue::Integer(3)],
            vec![CellValue::Float(1.0), CellValue::Float(99.0), CellValue::Float(f64::NAN), CellValue::Float(7.0)],
        );
        let s = forecast_series(&t, "x", "y", 1).unwrap();
        assert_eq!(s.history().count(), 2);
        assert_eq!(s.slope, 2.0);
        assert_eq!(s.forecast().next().unwrap().x, CellValue::Float(4.0));
    }

    #[test]
    fn all_null_series_is_insufficient() {
        let t = xy(vec![CellValue::Null; 3], vec![CellValue::Null; 3]);
        assert_eq!(forecast_series(&t, "x", "y", 5), Err(ForecastError::InsufficientData));
    }

    #[test]
    fn single_point_is_degenerate() {
        let t = xy(ints([4]), ints([9]));
        assert_eq!(forecast_series(&t, "x", "y", 3), Err(ForecastError::DegenerateFit));
        let t = xy(ints([4, 4, 4]), ints([1, 2, 3]));
        assert_eq!(forecast_series(&t, "x", "y", 3), Err(ForecastError::DegenerateFit));
    }

    #[test]
    fn categorical_x_fits_on_position_and_gets_placeholder_labels() {
        let x = ["mon", "tue", "wed"].iter().map(|s| CellValue::Text(s.to_string())).collect();
        let t = xy(x, ints([10, 20, 30]));
        let s = forecast_series(&t, "x", "y", 2).unwrap();
        let f: Vec<_> = s.forecast().cloned().collect();
        assert_eq!(f[0].x, CellValue::Text("x_t+1".into()));
        assert_eq!(f[1].x, CellValue::Text("x_t+2".into()));
        assert_eq!(f[0].y, 40.0);
        assert_eq!(f[1].y, 50.0);
    }

    #[test]
    fn datetime_x_steps_by_mean_interval() {
        let day = |d| {
            CellValue::DateTime(NaiveDate::from_ymd_opt(2024, 1, d).unwrap().and_hms_opt(0, 0, 0).unwrap())
        };
        let t = xy(vec![day(1), day(3), day(7)], ints([1, 2, 3]));
        let s = forecast_series(&t, "x", "y", 2).unwrap();
        let f: Vec<_> = s.forecast().map(|p| p.x.clone()).collect();
        // mean step is (7 - 1) / 2 = 3 days; the fit itself uses positions
        assert_eq!(f, vec![day(10), day(13)]);
        assert_eq!(s.forecast().next().unwrap().y, 4.0);
    }

    #[test]
    fn text_y_must_parse_as_numbers() {
        let y = vec![CellValue::Text("1.5".into()), CellValue::Text("n/a?".into())];
        let t = xy(ints([0, 1]), y);
        assert!(matches!(
            forecast_series(&t, "x", "y", 1),
            Err(ForecastError::NonNumeric { .. })
        ));
    }

    #[test]
    fn unknown_columns_are_reported() {
        let t = xy(ints([0, 1]), ints([0, 1]));
        assert_eq!(
            forecast_series(&t, "x", "nope", 1),
            Err(ForecastError::UnknownColumn("nope".into()))
        );
    }
}
