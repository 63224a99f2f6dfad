//! Figures for each [`ChartKind`].
//!
//! Column roles were checked by `ChartSpec::new`; lookups here still fail
//! cleanly if a different table is passed at build time.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{json, Value};

use super::figure::{add_animation_controls, Figure, Frame, Trace, TraceKind};
use super::forecast::{forecast_series, SeriesOrigin, SeriesPoint};
use super::{ChartError, ChartKind, ChartOutcome};
use crate::color::{ColorMap, CONTINUOUS_SCALE, DIVERGING_SCALE, FORECAST_COLOR, HISTORY_COLOR};
use crate::config::ChartConfig;
use crate::data::aggregate::{aggregate_column_name, group_aggregate, pivot, value_counts, Aggregation};
use crate::data::model::{CellValue, Column, Table};
use crate::stats::correlation_matrix;

const MARKER_SIZE: u32 = 9;
const MARKER_OPACITY: f64 = 0.8;
const MARKER_SIZE_3D: u32 = 5;
const BUBBLE_SIZE_MAX: f64 = 40.0;
const PIE_HOLE: f64 = 0.3;
const DENSITY_POINTS: usize = 100;
const ANIMATED_Y_HEADROOM: f64 = 1.2;

pub(crate) fn build(
    kind: &ChartKind,
    table: &Table,
    config: &ChartConfig,
) -> Result<ChartOutcome, ChartError> {
    let ms = config.transition_ms;
    let figure = match kind {
        ChartKind::Bar { x, y } => bar(table, x, y, ms)?,
        ChartKind::Line { x, y } => line(table, x, y, ms)?,
        ChartKind::Scatter { x, y, color } => scatter(table, x, y, color.as_deref(), ms)?,
        ChartKind::Pie { names, values } => pie(table, names, values)?,
        ChartKind::Histogram { column, bins } => histogram(table, column, *bins)?,
        ChartKind::Density { column } => return density(table, column),
        ChartKind::BoxPlot { column } => box_plot(table, column)?,
        ChartKind::Area { x, y } => area(table, x, y, ms)?,
        ChartKind::Bubble { x, y, size } => bubble(table, x, y, size, ms)?,
        ChartKind::CorrelationHeatmap => return Ok(correlation_heatmap(table, ms)),
        ChartKind::ScatterMatrix { columns } => scatter_matrix(table, columns)?,
        ChartKind::TopCategories { column, limit } => return top_categories(table, column, *limit),
        ChartKind::CategoryShare { column, limit } => return category_share(table, column, *limit),
        ChartKind::StackedBar { x, y, color } => stacked_bar(table, x, y, color, ms)?,
        ChartKind::GroupAggregate { group, value, agg } => {
            return grouped_bar(table, group, value, *agg, ms)
        }
        ChartKind::PivotHeatmap {
            rows,
            columns,
            values,
            agg,
        } => return pivot_heatmap(table, rows, columns, values, *agg, ms),
        ChartKind::Scatter3d { x, y, z, color } => {
            scatter_3d(table, x, y, z, color.as_deref(), config.animation_ms)?
        }
        ChartKind::AnimatedBar { x, y, frame } => {
            return animated_bar(table, x, y, frame, false, config.animation_ms)
        }
        ChartKind::BarRace { x, y, frame } => {
            return animated_bar(table, x, y, frame, true, config.bar_race_ms)
        }
        ChartKind::AnimatedScatter {
            x,
            y,
            frame,
            size,
            color,
        } => {
            return animated_scatter(
                table,
                AnimatedScatterRoles {
                    x,
                    y,
                    frame,
                    size: size.as_deref(),
                    color: color.as_deref(),
                },
                config.animation_ms,
            )
        }
        ChartKind::LineForecast { x, y, horizon } => {
            return line_forecast(table, x, y, *horizon, config)
        }
    };
    Ok(ChartOutcome::Rendered(figure))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn column<'a>(table: &'a Table, name: &str) -> Result<&'a Column, ChartError> {
    table
        .column(name)
        .ok_or_else(|| ChartError::UnknownColumn(name.to_string()))
}

fn pick(column: &Column, rows: &[usize]) -> Vec<CellValue> {
    rows.iter().map(|&i| column.values[i].clone()).collect()
}

fn all_rows(table: &Table) -> Vec<usize> {
    (0..table.n_rows()).collect()
}

fn finite_values(column: &Column) -> Vec<f64> {
    column
        .values
        .iter()
        .filter_map(CellValue::as_f64)
        .filter(|v| v.is_finite())
        .collect()
}

fn max_value(column: &Column) -> Option<f64> {
    finite_values(column).into_iter().reduce(f64::max)
}

/// Plotly's area `sizeref` that makes the largest marker `size_max` px wide.
fn size_ref(size: &Column) -> f64 {
    match max_value(size) {
        Some(max) if max > 0.0 => 2.0 * max / (BUBBLE_SIZE_MAX * BUBBLE_SIZE_MAX),
        _ => 1.0,
    }
}

/// Merge `extra` into the trace's `marker` object.
fn with_marker(mut trace: Trace, extra: Value) -> Trace {
    let marker = trace
        .attrs
        .entry("marker".to_string())
        .or_insert_with(|| json!({}));
    if let (Value::Object(target), Value::Object(extra)) = (marker, extra) {
        target.extend(extra);
    }
    trace
}

fn xy_trace(kind: TraceKind, x: &Column, y: &Column, rows: &[usize]) -> Trace {
    Trace::new(kind).x(pick(x, rows)).y(pick(y, rows))
}

/// Marker colours for `rows`: a continuous scale for numeric columns,
/// palette colours keyed by value otherwise.
fn point_colors(color: &Column, rows: &[usize]) -> Value {
    if color.is_numeric() {
        let values = finite_values(color);
        json!({
            "color": pick(color, rows),
            "colorscale": CONTINUOUS_SCALE,
            "cmin": values.iter().copied().reduce(f64::min),
            "cmax": values.iter().copied().reduce(f64::max),
            "showscale": true,
            "colorbar": { "title": { "text": color.name } }
        })
    } else {
        let map = color_map(color);
        let colors: Vec<String> = rows
            .iter()
            .map(|&i| map.color_for(&color.values[i]).hex())
            .collect();
        json!({ "color": colors })
    }
}

fn color_map(column: &Column) -> ColorMap {
    let unique: BTreeSet<CellValue> = column
        .values
        .iter()
        .filter(|v| !v.is_missing())
        .cloned()
        .collect();
    ColorMap::new(&column.name, &unique)
}

/// One trace per value of a categorical colour column, or a single trace
/// on a continuous scale for a numeric one. Rows with a missing group key
/// are left out.
fn colored_traces(
    table: &Table,
    color: Option<&str>,
    make: impl Fn(&[usize]) -> Trace,
) -> Result<Vec<Trace>, ChartError> {
    let rows = all_rows(table);
    let Some(name) = color else {
        return Ok(vec![make(&rows)]);
    };
    let color = column(table, name)?;
    if color.is_numeric() {
        return Ok(vec![with_marker(make(&rows), point_colors(color, &rows))]);
    }

    let mut groups: BTreeMap<&CellValue, Vec<usize>> = BTreeMap::new();
    for (i, key) in color.values.iter().enumerate() {
        if !key.is_missing() {
            groups.entry(key).or_default().push(i);
        }
    }
    let map = color_map(color);
    Ok(groups
        .into_iter()
        .map(|(key, rows)| {
            let trace = make(&rows).name(key.to_plain_string());
            with_marker(trace, json!({ "color": map.color_for(key).hex() }))
        })
        .collect())
}

fn with_legend_title(figure: Figure, color: Option<&str>) -> Figure {
    match color {
        Some(name) => figure.layout("legend", json!({ "title": { "text": name } })),
        None => figure,
    }
}

// ---------------------------------------------------------------------------
// Basic charts
// ---------------------------------------------------------------------------

pub fn bar(table: &Table, x: &str, y: &str, ms: u32) -> Result<Figure, ChartError> {
    let (xc, yc) = (column(table, x)?, column(table, y)?);
    let trace = xy_trace(TraceKind::Bar, xc, yc, &all_rows(table));
    Ok(Figure::new(vec![trace]).axis_titles(x, y).transition(ms))
}

pub fn line(table: &Table, x: &str, y: &str, ms: u32) -> Result<Figure, ChartError> {
    let (xc, yc) = (column(table, x)?, column(table, y)?);
    let trace = xy_trace(TraceKind::Scatter, xc, yc, &all_rows(table))
        .attr("mode", json!("lines+markers"));
    Ok(Figure::new(vec![trace]).axis_titles(x, y).transition(ms))
}

pub fn area(table: &Table, x: &str, y: &str, ms: u32) -> Result<Figure, ChartError> {
    let (xc, yc) = (column(table, x)?, column(table, y)?);
    let trace = xy_trace(TraceKind::Scatter, xc, yc, &all_rows(table))
        .attr("mode", json!("lines"))
        .attr("fill", json!("tozeroy"));
    Ok(Figure::new(vec![trace]).axis_titles(x, y).transition(ms))
}

pub fn scatter(
    table: &Table,
    x: &str,
    y: &str,
    color: Option<&str>,
    ms: u32,
) -> Result<Figure, ChartError> {
    let (xc, yc) = (column(table, x)?, column(table, y)?);
    let traces = colored_traces(table, color, |rows| {
        xy_trace(TraceKind::Scatter, xc, yc, rows)
            .attr("mode", json!("markers"))
            .attr("marker", json!({ "size": MARKER_SIZE, "opacity": MARKER_OPACITY }))
    })?;
    let figure = Figure::new(traces).axis_titles(x, y).transition(ms);
    Ok(with_legend_title(figure, color))
}

fn pie_trace(labels: Vec<CellValue>, values: Vec<CellValue>) -> Trace {
    Trace::new(TraceKind::Pie)
        .attr("labels", json!(labels))
        .attr("values", json!(values))
        .attr("hole", json!(PIE_HOLE))
        .attr("textposition", json!("inside"))
        .attr("textinfo", json!("percent+label"))
}

pub fn pie(table: &Table, names: &str, values: &str) -> Result<Figure, ChartError> {
    let (nc, vc) = (column(table, names)?, column(table, values)?);
    let rows = all_rows(table);
    let figure = Figure::new(vec![pie_trace(pick(nc, &rows), pick(vc, &rows))])
        .layout("legend", json!({ "title": { "text": names } }));
    Ok(figure)
}

// ---------------------------------------------------------------------------
// Distributions
// ---------------------------------------------------------------------------

pub fn histogram(table: &Table, name: &str, bins: usize) -> Result<Figure, ChartError> {
    let c = column(table, name)?;
    let trace = Trace::new(TraceKind::Histogram)
        .x(c.values.clone())
        .attr("nbinsx", json!(bins));
    Ok(Figure::new(vec![trace]).axis_titles(name, "count"))
}

/// Gaussian kernel density estimate on an evenly spaced grid, bandwidth by
/// Silverman's rule of thumb. `None` below two values or without spread.
pub fn kernel_density(values: &[f64], points: usize) -> Option<(Vec<f64>, Vec<f64>)> {
    let n = values.len();
    if n < 2 || points < 2 {
        return None;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    let std = var.sqrt();
    if std == 0.0 || !std.is_finite() {
        return None;
    }
    let h = 1.06 * std * (n as f64).powf(-0.2);
    let lo = values.iter().copied().fold(f64::INFINITY, f64::min) - 3.0 * h;
    let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max) + 3.0 * h;
    let step = (hi - lo) / (points - 1) as f64;
    let norm = 1.0 / (n as f64 * h * (2.0 * std::f64::consts::PI).sqrt());

    let grid: Vec<f64> = (0..points).map(|i| lo + step * i as f64).collect();
    let density = grid
        .iter()
        .map(|g| {
            norm * values
                .iter()
                .map(|v| (-0.5 * ((g - v) / h).powi(2)).exp())
                .sum::<f64>()
        })
        .collect();
    Some((grid, density))
}

pub fn density(table: &Table, name: &str) -> Result<ChartOutcome, ChartError> {
    let c = column(table, name)?;
    let Some((grid, density)) = kernel_density(&finite_values(c), DENSITY_POINTS) else {
        return Ok(ChartOutcome::NotApplicable(format!(
            "'{name}' needs at least two distinct values for a density curve"
        )));
    };
    let trace = Trace::new(TraceKind::Scatter)
        .name(name)
        .x(grid.into_iter().map(CellValue::Float).collect())
        .y(density.into_iter().map(CellValue::Float).collect())
        .attr("mode", json!("lines"))
        .attr("fill", json!("tozeroy"));
    let figure = Figure::new(vec![trace])
        .title(&format!("Density of {name}"))
        .axis_titles(name, "density");
    Ok(ChartOutcome::Rendered(figure))
}

pub fn box_plot(table: &Table, name: &str) -> Result<Figure, ChartError> {
    let c = column(table, name)?;
    let trace = Trace::new(TraceKind::Box)
        .name(name)
        .y(c.values.clone())
        .attr("boxpoints", json!("outliers"));
    Ok(Figure::new(vec![trace]).layout("yaxis", json!({ "title": { "text": name } })))
}

// ---------------------------------------------------------------------------
// Relationships
// ---------------------------------------------------------------------------

pub fn bubble(table: &Table, x: &str, y: &str, size: &str, ms: u32) -> Result<Figure, ChartError> {
    let (xc, yc, sc) = (column(table, x)?, column(table, y)?, column(table, size)?);
    let rows = all_rows(table);
    let trace = xy_trace(TraceKind::Scatter, xc, yc, &rows)
        .attr("mode", json!("markers"))
        .attr(
            "marker",
            json!({
                "size": pick(sc, &rows),
                "sizemode": "area",
                "sizeref": size_ref(sc),
                "opacity": MARKER_OPACITY
            }),
        );
    Ok(Figure::new(vec![trace]).axis_titles(x, y).transition(ms))
}

pub fn correlation_heatmap(table: &Table, ms: u32) -> ChartOutcome {
    let matrix = correlation_matrix(table);
    if matrix.columns.len() < 2 {
        return ChartOutcome::NotApplicable(
            "a correlation heatmap needs at least two numeric columns".into(),
        );
    }
    let labels: Vec<CellValue> = matrix.columns.iter().cloned().map(CellValue::Text).collect();
    let trace = Trace::new(TraceKind::Heatmap)
        .x(labels.clone())
        .y(labels)
        .attr("z", json!(matrix.values))
        .attr("colorscale", json!(DIVERGING_SCALE))
        .attr("zmin", json!(-1))
        .attr("zmax", json!(1))
        .attr("texttemplate", json!("%{z:.2f}"));
    ChartOutcome::Rendered(
        Figure::new(vec![trace])
            .title("Correlation Heatmap")
            .layout("yaxis", json!({ "autorange": "reversed" }))
            .transition(ms),
    )
}

pub fn scatter_matrix(table: &Table, columns: &[String]) -> Result<Figure, ChartError> {
    let dimensions = columns
        .iter()
        .map(|name| {
            let c = column(table, name)?;
            Ok(json!({ "label": name, "values": c.values }))
        })
        .collect::<Result<Vec<Value>, ChartError>>()?;
    let trace = Trace::new(TraceKind::Splom)
        .attr("dimensions", json!(dimensions))
        .attr("marker", json!({ "size": MARKER_SIZE_3D, "opacity": MARKER_OPACITY }))
        .attr("diagonal", json!({ "visible": false }));
    Ok(Figure::new(vec![trace]).layout("dragmode", json!("select")))
}

pub fn scatter_3d(
    table: &Table,
    x: &str,
    y: &str,
    z: &str,
    color: Option<&str>,
    ms: u32,
) -> Result<Figure, ChartError> {
    let (xc, yc, zc) = (column(table, x)?, column(table, y)?, column(table, z)?);
    let traces = colored_traces(table, color, |rows| {
        xy_trace(TraceKind::Scatter3d, xc, yc, rows)
            .attr("z", json!(pick(zc, rows)))
            .attr("mode", json!("markers"))
            .attr("marker", json!({ "size": MARKER_SIZE_3D, "opacity": MARKER_OPACITY }))
    })?;
    let scene = json!({
        "xaxis": { "title": { "text": x } },
        "yaxis": { "title": { "text": y } },
        "zaxis": { "title": { "text": z } }
    });
    let figure = Figure::new(traces)
        .title("3D Scatter")
        .layout("scene", scene)
        .transition(ms);
    Ok(with_legend_title(figure, color))
}

// ---------------------------------------------------------------------------
// Categories and aggregation
// ---------------------------------------------------------------------------

fn counted(
    table: &Table,
    name: &str,
    limit: usize,
) -> Result<Option<(Vec<CellValue>, Vec<CellValue>)>, ChartError> {
    let counts = value_counts(table, name, limit)?;
    if counts.is_empty() {
        return Ok(None);
    }
    Ok(Some(
        counts
            .into_iter()
            .map(|(v, n)| (v, CellValue::Integer(n as i64)))
            .unzip(),
    ))
}

pub fn top_categories(table: &Table, name: &str, limit: usize) -> Result<ChartOutcome, ChartError> {
    let Some((labels, counts)) = counted(table, name, limit)? else {
        return Ok(ChartOutcome::NotApplicable(format!("'{name}' has no values")));
    };
    let trace = Trace::new(TraceKind::Bar).x(labels).y(counts);
    Ok(ChartOutcome::Rendered(
        Figure::new(vec![trace]).axis_titles(name, "Count"),
    ))
}

pub fn category_share(table: &Table, name: &str, limit: usize) -> Result<ChartOutcome, ChartError> {
    let Some((labels, counts)) = counted(table, name, limit)? else {
        return Ok(ChartOutcome::NotApplicable(format!("'{name}' has no values")));
    };
    Ok(ChartOutcome::Rendered(Figure::new(vec![pie_trace(labels, counts)])))
}

pub fn stacked_bar(
    table: &Table,
    x: &str,
    y: &str,
    color: &str,
    ms: u32,
) -> Result<Figure, ChartError> {
    let (xc, yc) = (column(table, x)?, column(table, y)?);
    let traces = colored_traces(table, Some(color), |rows| xy_trace(TraceKind::Bar, xc, yc, rows))?;
    let figure = Figure::new(traces)
        .layout("barmode", json!("relative"))
        .axis_titles(x, y)
        .transition(ms);
    Ok(with_legend_title(figure, Some(color)))
}

pub fn grouped_bar(
    table: &Table,
    group: &str,
    value: &str,
    agg: Aggregation,
    ms: u32,
) -> Result<ChartOutcome, ChartError> {
    let result = group_aggregate(table, group, value, agg)?;
    if result.n_rows() == 0 {
        return Ok(ChartOutcome::NotApplicable(format!(
            "no rows to group by '{group}'"
        )));
    }
    let y = aggregate_column_name(agg, value);
    Ok(ChartOutcome::Rendered(bar(&result, group, &y, ms)?))
}

pub fn pivot_heatmap(
    table: &Table,
    rows: &str,
    columns: &str,
    values: &str,
    agg: Aggregation,
    ms: u32,
) -> Result<ChartOutcome, ChartError> {
    let p = pivot(table, rows, columns, values, agg)?;
    if p.is_empty() {
        return Ok(ChartOutcome::NotApplicable(
            "the pivot table has no cells".into(),
        ));
    }
    let trace = Trace::new(TraceKind::Heatmap)
        .x(p.column_labels)
        .y(p.row_labels)
        .attr("z", json!(p.cells))
        .attr("colorscale", json!("Blues"))
        .attr("texttemplate", json!("%{z}"));
    Ok(ChartOutcome::Rendered(
        Figure::new(vec![trace]).axis_titles(columns, rows).transition(ms),
    ))
}

// ---------------------------------------------------------------------------
// Animation
// ---------------------------------------------------------------------------

/// Row indices per frame value, frames in order of first appearance in
/// `rows`. Rows with a missing frame value belong to no frame.
fn frames_of<'a>(frame: &'a Column, rows: &[usize]) -> Vec<(&'a CellValue, Vec<usize>)> {
    let mut out: Vec<(&CellValue, Vec<usize>)> = Vec::new();
    let mut slot: BTreeMap<&CellValue, usize> = BTreeMap::new();
    for &i in rows {
        let key = &frame.values[i];
        if key.is_missing() {
            continue;
        }
        match slot.get(key) {
            Some(&s) => out[s].1.push(i),
            None => {
                slot.insert(key, out.len());
                out.push((key, vec![i]));
            }
        }
    }
    out
}

fn animate(traces_per_frame: Vec<(String, Trace)>, frame_column: &str, ms: u32) -> Figure {
    let first = traces_per_frame
        .first()
        .map(|(_, t)| vec![t.clone()])
        .unwrap_or_default();
    let mut figure = Figure::new(first);
    figure.frames = traces_per_frame
        .into_iter()
        .map(|(name, trace)| Frame {
            name,
            data: vec![trace],
        })
        .collect();
    add_animation_controls(&mut figure, frame_column, ms);
    figure
}

/// Bars coloured by x, one animation frame per frame value. A race sorts
/// rows by frame then value first, so frames play in sorted order.
pub fn animated_bar(
    table: &Table,
    x: &str,
    y: &str,
    frame: &str,
    race: bool,
    ms: u32,
) -> Result<ChartOutcome, ChartError> {
    let (xc, yc, fc) = (column(table, x)?, column(table, y)?, column(table, frame)?);
    let mut rows = all_rows(table);
    if race {
        rows.sort_by(|&a, &b| {
            fc.values[a]
                .cmp(&fc.values[b])
                .then_with(|| yc.values[a].cmp(&yc.values[b]))
        });
    }
    let groups = frames_of(fc, &rows);
    if groups.is_empty() {
        return Ok(ChartOutcome::NotApplicable(format!("'{frame}' has no values")));
    }

    let colors = color_map(xc);
    let per_frame = groups
        .into_iter()
        .map(|(key, rows)| {
            let hex: Vec<String> = rows
                .iter()
                .map(|&i| colors.color_for(&xc.values[i]).hex())
                .collect();
            let trace = xy_trace(TraceKind::Bar, xc, yc, &rows).attr("marker", json!({ "color": hex }));
            (key.to_plain_string(), trace)
        })
        .collect();

    let mut figure = animate(per_frame, frame, ms).axis_titles(x, y);
    if let Some(max) = max_value(yc) {
        figure.extend_layout("yaxis", json!({ "range": [0.0, max * ANIMATED_Y_HEADROOM] }));
    }
    Ok(ChartOutcome::Rendered(figure))
}

struct AnimatedScatterRoles<'a> {
    x: &'a str,
    y: &'a str,
    frame: &'a str,
    size: Option<&'a str>,
    color: Option<&'a str>,
}

fn animated_scatter(
    table: &Table,
    roles: AnimatedScatterRoles<'_>,
    ms: u32,
) -> Result<ChartOutcome, ChartError> {
    let (xc, yc, fc) = (
        column(table, roles.x)?,
        column(table, roles.y)?,
        column(table, roles.frame)?,
    );
    let size = roles.size.map(|s| column(table, s)).transpose()?;
    let color = roles.color.map(|c| column(table, c)).transpose()?;

    let groups = frames_of(fc, &all_rows(table));
    if groups.is_empty() {
        return Ok(ChartOutcome::NotApplicable(format!(
            "'{}' has no values",
            roles.frame
        )));
    }

    let per_frame = groups
        .into_iter()
        .map(|(key, rows)| {
            let marker = match size {
                Some(sc) => json!({
                    "size": pick(sc, &rows),
                    "sizemode": "area",
                    "sizeref": size_ref(sc),
                    "opacity": MARKER_OPACITY
                }),
                None => json!({ "size": MARKER_SIZE, "opacity": MARKER_OPACITY }),
            };
            let mut trace = xy_trace(TraceKind::Scatter, xc, yc, &rows)
                .attr("mode", json!("markers"))
                .attr("marker", marker);
            if let Some(cc) = color {
                trace = with_marker(trace, point_colors(cc, &rows));
            }
            (key.to_plain_string(), trace)
        })
        .collect();

    let mut figure = animate(per_frame, roles.frame, ms).axis_titles(roles.x, roles.y);
    // Fixed axes keep points comparable across frames.
    for (axis, c) in [("xaxis", xc), ("yaxis", yc)] {
        let values = finite_values(c);
        if let (Some(lo), Some(hi)) = (
            values.iter().copied().reduce(f64::min),
            values.iter().copied().reduce(f64::max),
        ) {
            let pad = ((hi - lo) * 0.05).max(f64::EPSILON);
            figure.extend_layout(axis, json!({ "range": [lo - pad, hi + pad] }));
        }
    }
    Ok(ChartOutcome::Rendered(figure))
}

// ---------------------------------------------------------------------------
// Forecast
// ---------------------------------------------------------------------------

fn origin_trace<'a>(
    points: impl Iterator<Item = &'a SeriesPoint>,
    origin: SeriesOrigin,
    hex: String,
) -> Trace {
    let (x, y): (Vec<CellValue>, Vec<CellValue>) =
        points.map(|p| (p.x.clone(), CellValue::Float(p.y))).unzip();
    Trace::new(TraceKind::Scatter)
        .name(origin.to_string())
        .x(x)
        .y(y)
        .attr("mode", json!("lines+markers"))
        .attr("line", json!({ "color": hex }))
        .attr("marker", json!({ "color": hex }))
}

/// History and forecast as two lines; a plain line chart when no line can
/// be fitted.
pub fn line_forecast(
    table: &Table,
    x: &str,
    y: &str,
    horizon: usize,
    config: &ChartConfig,
) -> Result<ChartOutcome, ChartError> {
    match forecast_series(table, x, y, horizon) {
        Ok(series) => {
            let traces = vec![
                origin_trace(series.history(), SeriesOrigin::History, HISTORY_COLOR.hex()),
                origin_trace(series.forecast(), SeriesOrigin::Forecast, FORECAST_COLOR.hex()),
            ];
            let figure = Figure::new(traces)
                .title(&format!("{y} with simple forecast"))
                .axis_titles(x, y)
                .layout("legend", json!({ "title": { "text": "Series" } }))
                .transition(config.animation_ms);
            Ok(ChartOutcome::Rendered(figure))
        }
        Err(reason) => {
            log::warn!("forecast of {y} over {x} unavailable: {reason}");
            Ok(ChartOutcome::Degraded {
                figure: line(table, x, y, config.transition_ms)?,
                reason: reason.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::ChartSpec;
    use crate::config::ExplorerConfig;

    fn text(values: &[&str]) -> Vec<CellValue> {
        values.iter().map(|s| CellValue::Text(s.to_string())).collect()
    }

    fn ints(values: &[i64]) -> Vec<CellValue> {
        values.iter().copied().map(CellValue::Integer).collect()
    }

    fn sales() -> Table {
        Table::new(vec![
            Column::new("region", text(&["north", "south", "north", "east", "south"])),
            Column::new("year", ints(&[2022, 2021, 2021, 2022, 2022])),
            Column::new("units", ints(&[10, 20, 30, 40, 50])),
            Column::new("price", ints(&[5, 4, 3, 2, 1])),
            Column::new(
                "segment",
                vec![
                    CellValue::Text("a".into()),
                    CellValue::Null,
                    CellValue::Text("b".into()),
                    CellValue::Text("a".into()),
                    CellValue::Text("b".into()),
                ],
            ),
        ])
    }

    fn render(kind: ChartKind, table: &Table) -> ChartOutcome {
        ChartSpec::new(kind, table)
            .unwrap()
            .build(table, &ExplorerConfig::default())
            .unwrap()
    }

    fn figure(kind: ChartKind, table: &Table) -> Figure {
        match render(kind, table) {
            ChartOutcome::Rendered(f) => f,
            other => panic!("expected a rendered chart, got {other:?}"),
        }
    }

    #[test]
    fn line_chart_draws_lines_and_markers() {
        let f = figure(
            ChartKind::Line {
                x: "year".into(),
                y: "units".into(),
            },
            &sales(),
        );
        assert_eq!(f.data[0].get("mode"), Some(&json!("lines+markers")));
        assert_eq!(f.layout["xaxis"]["title"]["text"], "year");
        assert_eq!(f.layout["transition"]["duration"], 500);
    }

    #[test]
    fn categorical_colour_splits_traces_and_skips_missing_keys() {
        let f = figure(
            ChartKind::Scatter {
                x: "units".into(),
                y: "price".into(),
                color: Some("segment".into()),
            },
            &sales(),
        );
        let names: Vec<_> = f.data.iter().map(|t| t.name.clone().unwrap()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(f.data[0].x, ints(&[10, 40]));
        assert_eq!(f.data[0].get("marker").unwrap()["size"], 9);
        assert_ne!(
            f.data[0].get("marker").unwrap()["color"],
            f.data[1].get("marker").unwrap()["color"]
        );
        assert_eq!(f.layout["legend"]["title"]["text"], "segment");
    }

    #[test]
    fn numeric_colour_uses_a_continuous_scale() {
        let f = figure(
            ChartKind::Scatter {
                x: "units".into(),
                y: "price".into(),
                color: Some("year".into()),
            },
            &sales(),
        );
        assert_eq!(f.data.len(), 1);
        let marker = f.data[0].get("marker").unwrap();
        assert_eq!(marker["colorscale"], "Viridis");
        assert_eq!(marker["opacity"], 0.8);
        assert_eq!(marker["cmin"], 2021.0);
    }

    #[test]
    fn pie_has_a_hole_and_inside_labels() {
        let f = figure(
            ChartKind::Pie {
                names: "region".into(),
                values: "units".into(),
            },
            &sales(),
        );
        let t = &f.data[0];
        assert_eq!(t.get("hole"), Some(&json!(0.3)));
        assert_eq!(t.get("textinfo"), Some(&json!("percent+label")));
        assert_eq!(t.get("values").unwrap()[4], 50);
    }

    #[test]
    fn heatmap_needs_two_numeric_columns() {
        let single = Table::new(vec![
            Column::new("region", text(&["a", "b"])),
            Column::new("units", ints(&[1, 2])),
        ]);
        assert!(matches!(
            render(ChartKind::CorrelationHeatmap, &single),
            ChartOutcome::NotApplicable(_)
        ));

        let f = figure(ChartKind::CorrelationHeatmap, &sales());
        assert_eq!(f.title_text(), Some("Correlation Heatmap"));
        let t = &f.data[0];
        assert_eq!(t.get("zmin"), Some(&json!(-1)));
        assert_eq!(t.get("colorscale"), Some(&json!("RdBu")));
        assert_eq!(t.x.len(), 3);
    }

    #[test]
    fn bubble_sizes_scale_to_the_largest_value() {
        let f = figure(
            ChartKind::Bubble {
                x: "units".into(),
                y: "price".into(),
                size: "units".into(),
            },
            &sales(),
        );
        let marker = f.data[0].get("marker").unwrap();
        assert_eq!(marker["sizeref"], json!(2.0 * 50.0 / 1600.0));
        assert_eq!(marker["sizemode"], "area");
    }

    #[test]
    fn animated_bar_frames_follow_first_appearance() {
        let f = figure(
            ChartKind::AnimatedBar {
                x: "region".into(),
                y: "units".into(),
                frame: "year".into(),
            },
            &sales(),
        );
        let frames: Vec<_> = f.frames.iter().map(|fr| fr.name.as_str()).collect();
        assert_eq!(frames, vec!["2022", "2021"]);
        assert_eq!(f.frames[0].data[0].y, ints(&[10, 40, 50]));
        let top = f.layout["yaxis"]["range"][1].as_f64().unwrap();
        assert!((top - 60.0).abs() < 1e-9);
        assert_eq!(f.layout["transition"]["duration"], 600);
        assert_eq!(f.data, f.frames[0].data);
    }

    #[test]
    fn bar_race_sorts_by_frame_then_value() {
        let mut t = sales();
        t.columns[2] = Column::new("units", ints(&[50, 20, 30, 10, 40]));
        let f = figure(
            ChartKind::BarRace {
                x: "region".into(),
                y: "units".into(),
                frame: "year".into(),
            },
            &t,
        );
        let frames: Vec<_> = f.frames.iter().map(|fr| fr.name.as_str()).collect();
        assert_eq!(frames, vec!["2021", "2022"]);
        assert_eq!(f.frames[1].data[0].y, ints(&[10, 40, 50]));
        assert_eq!(f.layout["transition"]["duration"], 700);
    }

    #[test]
    fn animated_scatter_sizes_and_fixes_axes() {
        let f = figure(
            ChartKind::AnimatedScatter {
                x: "units".into(),
                y: "price".into(),
                frame: "year".into(),
                size: Some("units".into()),
                color: Some("region".into()),
            },
            &sales(),
        );
        assert_eq!(f.frames.len(), 2);
        let marker = f.frames[0].data[0].get("marker").unwrap();
        assert_eq!(marker["sizemode"], "area");
        assert_eq!(marker["color"].as_array().unwrap().len(), 3);
        assert!(f.layout["xaxis"]["range"].is_array());
    }

    #[test]
    fn forecast_renders_history_and_forecast_traces() {
        let f = figure(
            ChartKind::LineForecast {
                x: "year".into(),
                y: "units".into(),
                horizon: 4,
            },
            &Table::new(vec![
                Column::new("year", ints(&[1, 2, 3])),
                Column::new("units", ints(&[2, 4, 6])),
            ]),
        );
        let names: Vec<_> = f.data.iter().map(|t| t.name.clone().unwrap()).collect();
        assert_eq!(names, vec!["History", "Forecast"]);
        assert_eq!(f.data[1].y.len(), 4);
        assert_eq!(f.title_text(), Some("units with simple forecast"));
        assert_eq!(f.layout["legend"]["title"]["text"], "Series");
    }

    #[test]
    fn forecast_without_data_degrades_to_a_line() {
        let t = Table::new(vec![
            Column::new("year", ints(&[1, 2])),
            Column::new("units", vec![CellValue::Null, CellValue::Null]),
        ]);
        let outcome = render(
            ChartKind::LineForecast {
                x: "year".into(),
                y: "units".into(),
                horizon: 3,
            },
            &t,
        );
        let ChartOutcome::Degraded { figure, reason } = outcome else {
            panic!("expected degraded outcome");
        };
        assert_eq!(figure.data.len(), 1);
        assert_eq!(figure.data[0].get("mode"), Some(&json!("lines+markers")));
        assert!(reason.contains("no rows"));
    }

    #[test]
    fn forecast_accepts_numeric_text_and_flags() {
        let t = Table::new(vec![
            Column::new("year", ints(&[1, 2, 3])),
            Column::new("units", text(&["2", "4", "6"])),
            Column::new("promo", vec![CellValue::Bool(false), CellValue::Bool(true), CellValue::Bool(true)]),
        ]);
        let f = figure(
            ChartKind::LineForecast {
                x: "year".into(),
                y: "units".into(),
                horizon: 2,
            },
            &t,
        );
        assert_eq!(f.data[1].y, vec![CellValue::Float(8.0), CellValue::Float(10.0)]);
        let outcome = render(
            ChartKind::LineForecast {
                x: "year".into(),
                y: "promo".into(),
                horizon: 1,
            },
            &t,
        );
        assert!(matches!(outcome, ChartOutcome::Rendered(_)));
    }

    #[test]
    fn forecast_of_free_text_degrades_to_a_line() {
        let t = Table::new(vec![
            Column::new("year", ints(&[1, 2, 3])),
            Column::new("label", text(&["low", "mid", "high"])),
        ]);
        let outcome = render(
            ChartKind::LineForecast {
                x: "year".into(),
                y: "label".into(),
                horizon: 2,
            },
            &t,
        );
        let ChartOutcome::Degraded { reason, .. } = outcome else {
            panic!("expected degraded outcome");
        };
        assert!(reason.contains("low"));
    }

    #[test]
    fn group_aggregate_plots_the_reduced_table() {
        let f = figure(
            ChartKind::GroupAggregate {
                group: "region".into(),
                value: "units".into(),
                agg: Aggregation::Sum,
            },
            &sales(),
        );
        assert_eq!(f.data[0].x, text(&["east", "north", "south"]));
        assert_eq!(
            f.data[0].y,
            vec![CellValue::Float(40.0), CellValue::Float(40.0), CellValue::Float(70.0)]
        );
        assert_eq!(f.layout["yaxis"]["title"]["text"], "sum_units");
    }

    #[test]
    fn empty_pivot_is_not_applicable() {
        let t = sales().take_rows(&[]);
        let outcome = render(
            ChartKind::PivotHeatmap {
                rows: "region".into(),
                columns: "year".into(),
                values: "units".into(),
                agg: Aggregation::Mean,
            },
            &t,
        );
        assert!(matches!(outcome, ChartOutcome::NotApplicable(_)));
    }

    #[test]
    fn top_categories_count_values() {
        let f = figure(
            ChartKind::TopCategories {
                column: "region".into(),
                limit: 2,
            },
            &sales(),
        );
        assert_eq!(f.data[0].x, text(&["north", "south"]));
        assert_eq!(f.data[0].y, ints(&[2, 2]));
    }

    #[test]
    fn density_curve_integrates_to_about_one() {
        let values = [1.0, 2.0, 2.5, 3.0, 7.0];
        let (grid, density) = kernel_density(&values, 200).unwrap();
        let step = grid[1] - grid[0];
        let area: f64 = density.iter().sum::<f64>() * step;
        assert!((area - 1.0).abs() < 0.02, "area was {area}");
        assert!(kernel_density(&[4.0, 4.0], 10).is_none());
        assert!(kernel_density(&[4.0], 10).is_none());
    }

    #[test]
    fn three_d_scatter_has_small_markers() {
        let f = figure(
            ChartKind::Scatter3d {
                x: "units".into(),
                y: "price".into(),
                z: "year".into(),
                color: None,
            },
            &sales(),
        );
        assert_eq!(f.data[0].get("marker").unwrap()["size"], 5);
        assert_eq!(f.title_text(), Some("3D Scatter"));
        assert_eq!(f.layout["transition"]["duration"], 600);
    }
}
