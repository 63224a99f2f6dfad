//! Chart construction.
//!
//! ```text
//!   ChartKind ──ChartSpec::new(kind, &table)──▶ ChartSpec   (roles validated)
//!                                                   │
//!                                   build(&table, &config)
//!                                                   ▼
//!               ChartOutcome::{Rendered, Degraded, NotApplicable}
//!                                                   │
//!                                      Figure::export_html(name)
//! ```

pub mod auto;
pub mod builders;
pub mod figure;
pub mod forecast;

use thiserror::Error;

use crate::config::ExplorerConfig;
use crate::data::aggregate::{AggregateError, Aggregation};
use crate::data::model::Table;

pub use figure::{ChartExport, Figure, Frame, Trace, TraceKind};
pub use forecast::{forecast_series, linear_fit, ForecastError, ForecastSeries, SeriesOrigin};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ChartError {
    #[error("unknown column '{0}'")]
    UnknownColumn(String),
    #[error("column '{column}' must be numeric to be used as {role}")]
    NotNumeric { column: String, role: &'static str },
    #[error("no columns selected")]
    NoColumns,
    #[error(transparent)]
    Aggregate(#[from] AggregateError),
}

/// Every supported chart together with the columns it plots.
#[derive(Debug, Clone, PartialEq)]
pub enum ChartKind {
    Bar { x: String, y: String },
    Line { x: String, y: String },
    Scatter { x: String, y: String, color: Option<String> },
    Pie { names: String, values: String },
    Histogram { column: String, bins: usize },
    Density { column: String },
    BoxPlot { column: String },
    Area { x: String, y: String },
    Bubble { x: String, y: String, size: String },
    CorrelationHeatmap,
    ScatterMatrix { columns: Vec<String> },
    TopCategories { column: String, limit: usize },
    CategoryShare { column: String, limit: usize },
    StackedBar { x: String, y: String, color: String },
    GroupAggregate { group: String, value: String, agg: Aggregation },
    PivotHeatmap { rows: String, columns: String, values: String, agg: Aggregation },
    Scatter3d { x: String, y: String, z: String, color: Option<String> },
    AnimatedBar { x: String, y: String, frame: String },
    BarRace { x: String, y: String, frame: String },
    AnimatedScatter {
        x: String,
        y: String,
        frame: String,
        size: Option<String>,
        color: Option<String>,
    },
    LineForecast { x: String, y: String, horizon: usize },
}

impl ChartKind {
    pub fn label(&self) -> &'static str {
        match self {
            ChartKind::Bar { .. } => "Bar",
            ChartKind::Line { .. } => "Line",
            ChartKind::Scatter { .. } => "Scatter",
            ChartKind::Pie { .. } => "Pie",
            ChartKind::Histogram { .. } => "Histogram",
            ChartKind::Density { .. } => "Density",
            ChartKind::BoxPlot { .. } => "Box Plot",
            ChartKind::Area { .. } => "Area",
            ChartKind::Bubble { .. } => "Bubble",
            ChartKind::CorrelationHeatmap => "Correlation Heatmap",
            ChartKind::ScatterMatrix { .. } => "Scatter Matrix",
            ChartKind::TopCategories { .. } => "Top Categories",
            ChartKind::CategoryShare { .. } => "Category Share",
            ChartKind::StackedBar { .. } => "Stacked Bar",
            ChartKind::GroupAggregate { .. } => "Group & Aggregate",
            ChartKind::PivotHeatmap { .. } => "Pivot Heatmap",
            ChartKind::Scatter3d { .. } => "3D Scatter",
            ChartKind::AnimatedBar { .. } => "Animated Bar",
            ChartKind::BarRace { .. } => "Bar Race",
            ChartKind::AnimatedScatter { .. } => "Animated Scatter",
            ChartKind::LineForecast { .. } => "Line + Forecast",
        }
    }

    /// Default export name, without extension.
    pub fn file_stem(&self) -> String {
        match self {
            ChartKind::Bar { .. } => "simple_bar".into(),
            ChartKind::Line { .. } => "simple_line".into(),
            ChartKind::Scatter { .. } => "simple_scatter".into(),
            ChartKind::Pie { .. } => "simple_pie".into(),
            ChartKind::Histogram { column, .. } => format!("hist_{column}"),
            ChartKind::Density { column } => format!("density_{column}"),
            ChartKind::BoxPlot { column } => format!("box_{column}"),
            ChartKind::Area { y, .. } => format!("area_{y}"),
            ChartKind::Bubble { x, y, size } => format!("bubble_{x}_{y}_{size}"),
            ChartKind::CorrelationHeatmap => "adv_heatmap".into(),
            ChartKind::ScatterMatrix { .. } => "scatter_matrix".into(),
            ChartKind::TopCategories { column, limit } => format!("top{limit}_{column}"),
            ChartKind::CategoryShare { column, .. } => format!("pie_{column}"),
            ChartKind::StackedBar { x, y, color } => format!("stacked_{x}_{color}_{y}"),
            ChartKind::GroupAggregate { .. } => "group_agg_chart".into(),
            ChartKind::PivotHeatmap { .. } => "pivot_heatmap".into(),
            ChartKind::Scatter3d { .. } => "adv_3d_scatter".into(),
            ChartKind::AnimatedBar { .. } => "adv_animated_bar".into(),
            ChartKind::BarRace { .. } => "adv_bar_race".into(),
            ChartKind::AnimatedScatter { .. } => "adv_animated_scatter".into(),
            ChartKind::LineForecast { .. } => "adv_line_forecast".into(),
        }
    }

    /// Every referenced column with the numeric requirement of its role.
    fn roles(&self) -> Vec<(&str, Option<&'static str>)> {
        fn any(c: &str) -> (&str, Option<&'static str>) {
            (c, None)
        }
        fn num<'a>(c: &'a str, role: &'static str) -> (&'a str, Option<&'static str>) {
            (c, Some(role))
        }
        match self {
            ChartKind::Bar { x, y } | ChartKind::Line { x, y } | ChartKind::Area { x, y } => {
                vec![any(x), num(y, "y axis")]
            }
            ChartKind::Scatter { x, y, color } => {
                let mut r = vec![any(x), any(y)];
                r.extend(color.as_deref().map(any));
                r
            }
            ChartKind::Pie { names, values } => vec![any(names), num(values, "pie values")],
            ChartKind::Histogram { column, .. } => vec![any(column)],
            ChartKind::Density { column } => vec![num(column, "density input")],
            ChartKind::BoxPlot { column } => vec![num(column, "box plot input")],
            ChartKind::Bubble { x, y, size } => vec![any(x), any(y), num(size, "bubble size")],
            ChartKind::CorrelationHeatmap => Vec::new(),
            ChartKind::ScatterMatrix { columns } => {
                columns.iter().map(|c| num(c, "scatter matrix dimension")).collect()
            }
            ChartKind::TopCategories { column, .. } | ChartKind::CategoryShare { column, .. } => {
                vec![any(column)]
            }
            ChartKind::StackedBar { x, y, color } => {
                vec![any(x), num(y, "y axis"), any(color)]
            }
            ChartKind::GroupAggregate { group, value, .. } => {
                vec![any(group), num(value, "aggregated value")]
            }
            ChartKind::PivotHeatmap {
                rows,
                columns,
                values,
                ..
            } => vec![any(rows), any(columns), num(values, "pivot values")],
            ChartKind::Scatter3d { x, y, z, color } => {
                let mut r = vec![num(x, "x axis"), num(y, "y axis"), num(z, "z axis")];
                r.extend(color.as_deref().map(any));
                r
            }
            ChartKind::AnimatedBar { x, y, frame } | ChartKind::BarRace { x, y, frame } => {
                vec![any(x), num(y, "y axis"), any(frame)]
            }
            ChartKind::AnimatedScatter {
                x,
                y,
                frame,
                size,
                color,
            } => {
                let mut r = vec![any(x), num(y, "y axis"), any(frame)];
                r.extend(size.as_deref().map(|s| num(s, "marker size")));
                r.extend(color.as_deref().map(any));
                r
            }
            // y is coerced by the forecast itself; unusable values degrade to a line.
            ChartKind::LineForecast { x, y, .. } => vec![any(x), any(y)],
        }
    }
}

/// A chart kind whose column roles have been checked against a table.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSpec {
    kind: ChartKind,
}

impl ChartSpec {
    pub fn new(kind: ChartKind, table: &Table) -> Result<Self, ChartError> {
        if matches!(&kind, ChartKind::ScatterMatrix { columns } if columns.is_empty()) {
            return Err(ChartError::NoColumns);
        }
        for (name, numeric_role) in kind.roles() {
            let column = table
                .column(name)
                .ok_or_else(|| ChartError::UnknownColumn(name.to_string()))?;
            if let Some(role) = numeric_role {
                if !column.is_numeric() {
                    return Err(ChartError::NotNumeric {
                        column: name.to_string(),
                        role,
                    });
                }
            }
        }
        Ok(ChartSpec { kind })
    }

    pub fn kind(&self) -> &ChartKind {
        &self.kind
    }

    pub fn build(&self, table: &Table, config: &ExplorerConfig) -> Result<ChartOutcome, ChartError> {
        log::debug!("building {} chart over {} rows", self.kind.label(), table.n_rows());
        builders::build(&self.kind, table, &config.charts)
    }
}

/// What a chart request produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ChartOutcome {
    Rendered(Figure),
    /// A simpler chart stood in for the requested one.
    Degraded { figure: Figure, reason: String },
    /// Nothing to draw for this data, e.g. a correlation heatmap with a
    /// single numeric column.
    NotApplicable(String),
}

impl ChartOutcome {
    pub fn figure(&self) -> Option<&Figure> {
        match self {
            ChartOutcome::Rendered(f) | ChartOutcome::Degraded { figure: f, .. } => Some(f),
            ChartOutcome::NotApplicable(_) => None,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, ChartOutcome::Degraded { .. })
    }
}
