//! One-click analysis: a summary plus every chart whose preconditions the
//! table meets, numbered in display order.

use crate::config::ExplorerConfig;
use crate::data::aggregate::Aggregation;
use crate::data::model::Table;
use crate::stats::{summarize, StatsError, Summary};

use super::{ChartKind, ChartOutcome, ChartSpec};

/// Synthetic 0-based row position used as the x axis of trend charts.
pub const AUTO_INDEX: &str = "Auto_Index";

#[derive(Debug, Clone, PartialEq)]
pub struct AutoChart {
    pub title: String,
    pub caption: &'static str,
    /// Export name, `AUTO_...`.
    pub file_stem: String,
    pub outcome: ChartOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AutoAnalysis {
    pub rows: usize,
    pub columns: usize,
    pub summary: Result<Summary, StatsError>,
    pub charts: Vec<AutoChart>,
}

struct Plan {
    title: String,
    caption: &'static str,
    file_stem: String,
    kind: ChartKind,
}

pub fn auto_analysis(table: &Table, config: &ExplorerConfig) -> AutoAnalysis {
    let num = table.numeric_column_names();
    let cat = table.categorical_column_names();
    let charts_cfg = &config.charts;

    let work = if table.n_rows() > 0 {
        table.clone().with_index_column(AUTO_INDEX)
    } else {
        table.clone()
    };
    let indexed = work.column(AUTO_INDEX).is_some();

    let mut plan: Vec<Plan> = Vec::new();
    let mut add = |title: String, caption: &'static str, file_stem: String, kind: ChartKind| {
        plan.push(Plan {
            title,
            caption,
            file_stem,
            kind,
        })
    };

    if let Some(col) = num.first() {
        add(
            format!("Histogram of `{col}`"),
            "Shows how the values of this column are spread.",
            format!("AUTO_hist_{col}"),
            ChartKind::Histogram {
                column: col.clone(),
                bins: charts_cfg.histogram_bins,
            },
        );
        add(
            format!("Density of `{col}`"),
            "Smooth curve that shows where most values are concentrated.",
            format!("AUTO_density_{col}"),
            ChartKind::Density { column: col.clone() },
        );
        add(
            format!("Box plot of `{col}`"),
            "Helps you see minimum, maximum, median and outliers.",
            format!("AUTO_box_{col}"),
            ChartKind::BoxPlot { column: col.clone() },
        );
        if indexed {
            add(
                format!("Trend of `{col}` over data order"),
                "Shows whether values go up or down as we move through the rows.",
                format!("AUTO_trend_{col}"),
                ChartKind::Line {
                    x: AUTO_INDEX.into(),
                    y: col.clone(),
                },
            );
            add(
                format!("Area chart of `{col}`"),
                "Similar to a line chart, but filled area makes pattern more visible.",
                format!("AUTO_area_{col}"),
                ChartKind::Area {
                    x: AUTO_INDEX.into(),
                    y: col.clone(),
                },
            );
        }
    }

    if let [x, y, ..] = num.as_slice() {
        add(
            format!("Relationship between `{x}` and `{y}`"),
            "Each point shows how these two number columns move together.",
            format!("AUTO_scatter_{x}_{y}"),
            ChartKind::Scatter {
                x: x.clone(),
                y: y.clone(),
                color: None,
            },
        );
    }
    if let [x, y, size, ..] = num.as_slice() {
        add(
            format!("Bubble chart using `{x}`, `{y}`, `{size}`"),
            "Bigger bubbles mean larger values in the size column.",
            format!("AUTO_bubble_{x}_{y}_{size}"),
            ChartKind::Bubble {
                x: x.clone(),
                y: y.clone(),
                size: size.clone(),
            },
        );
    }
    if num.len() >= 2 {
        add(
            "Correlation heatmap".into(),
            "Shows which numeric columns are strongly related to each other.",
            "AUTO_heatmap".into(),
            ChartKind::CorrelationHeatmap,
        );
    }
    if num.len() >= 3 {
        add(
            "Scatter matrix of numeric columns".into(),
            "Multiple scatter plots to compare all numeric columns together.",
            "AUTO_scatter_matrix".into(),
            ChartKind::ScatterMatrix {
                columns: num.iter().take(charts_cfg.scatter_matrix_columns).cloned().collect(),
            },
        );
    }

    if let Some(c) = cat.first() {
        let top = charts_cfg.top_categories;
        let share = charts_cfg.category_share;
        add(
            format!("Top {top} values in `{c}`"),
            "Shows which categories appear most often.",
            format!("AUTO_top{top}_{c}"),
            ChartKind::TopCategories {
                column: c.clone(),
                limit: top,
            },
        );
        add(
            format!("Share of top {share} values in `{c}`"),
            "Pie chart that shows the proportion of main categories.",
            format!("AUTO_pie_{c}"),
            ChartKind::CategoryShare {
                column: c.clone(),
                limit: share,
            },
        );
    }

    if let (Some(c), Some(n)) = (cat.first(), num.first()) {
        add(
            format!("Total `{n}` by `{c}`"),
            "Shows which category contributes the highest total value.",
            format!("AUTO_sum_{c}_{n}"),
            ChartKind::GroupAggregate {
                group: c.clone(),
                value: n.clone(),
                agg: Aggregation::Sum,
            },
        );
        add(
            format!("Average `{n}` by `{c}`"),
            "Shows which category has higher or lower average value.",
            format!("AUTO_avg_{c}_{n}"),
            ChartKind::GroupAggregate {
                group: c.clone(),
                value: n.clone(),
                agg: Aggregation::Mean,
            },
        );
    }

    if let ([c1, c2, ..], Some(n)) = (cat.as_slice(), num.first()) {
        add(
            format!("Stacked bar of `{n}` by `{c1}` and `{c2}`"),
            "Shows how a second category is distributed inside each main category.",
            format!("AUTO_stacked_{c1}_{c2}_{n}"),
            ChartKind::StackedBar {
                x: c1.clone(),
                y: n.clone(),
                color: c2.clone(),
            },
        );
    }

    if let (Some(n), true) = (num.first(), indexed) {
        add(
            format!("Simple forecast of `{n}` (next few points)"),
            "Line with basic prediction based on the current pattern.",
            format!("AUTO_forecast_{n}"),
            ChartKind::LineForecast {
                x: AUTO_INDEX.into(),
                y: n.clone(),
                horizon: charts_cfg.auto_forecast_horizon,
            },
        );
    }

    let charts = plan
        .into_iter()
        .enumerate()
        .map(|(i, p)| {
            let outcome = ChartSpec::new(p.kind, &work)
                .and_then(|spec| spec.build(&work, config))
                .unwrap_or_else(|e| {
                    log::warn!("auto chart {} skipped: {e}", p.file_stem);
                    ChartOutcome::NotApplicable(e.to_string())
                });
            AutoChart {
                title: format!("Chart {}: {}", i + 1, p.title),
                caption: p.caption,
                file_stem: p.file_stem,
                outcome,
            }
        })
        .collect();

    log::info!(
        "auto analysis: {} numeric and {} categorical columns",
        num.len(),
        cat.len()
    );

    AutoAnalysis {
        rows: table.n_rows(),
        columns: table.n_cols(),
        summary: summarize(table),
        charts,
    }
}
