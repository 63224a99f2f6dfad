use std::collections::HashMap;

use eframe::egui::{Color32, Ui};
use egui_plot::{Bar, BarChart, Legend, Line, Plot, PlotPoints, Points};

use crate::chart::{Figure, Trace, TraceKind};
use crate::data::model::CellValue;

// ---------------------------------------------------------------------------
// Inline chart preview (central panel)
// ---------------------------------------------------------------------------

/// Text x values share one category axis, placed in order of appearance.
#[derive(Default)]
struct CategoryAxis {
    positions: HashMap<String, usize>,
    labels: Vec<String>,
}

impl CategoryAxis {
    fn position(&mut self, value: &CellValue) -> Option<f64> {
        match value {
            CellValue::Integer(_) | CellValue::Float(_) => value.as_f64().filter(|v| v.is_finite()),
            CellValue::DateTime(d) => Some(d.and_utc().timestamp() as f64),
            CellValue::Null => None,
            other => {
                let label = other.to_plain_string();
                let next = self.labels.len();
                let pos = *self.positions.entry(label.clone()).or_insert_with(|| {
                    self.labels.push(label);
                    next
                });
                Some(pos as f64)
            }
        }
    }
}

fn trace_color(trace: &Trace) -> Option<Color32> {
    let hex = trace
        .get("marker")
        .and_then(|m| m.get("color"))
        .or_else(|| trace.get("line").and_then(|l| l.get("color")))?
        .as_str()?;
    Color32::from_hex(hex).ok()
}

fn is_previewable(kind: TraceKind) -> bool {
    matches!(kind, TraceKind::Bar | TraceKind::Scatter)
}

/// Draw the bar and line/marker traces of `figure` (or of animation frame
/// `frame`). Other trace types are listed as export-only.
pub fn figure_preview(ui: &mut Ui, id: &str, figure: &Figure, frame: usize, height: f32) {
    let traces: &[Trace] = match figure.frames.get(frame) {
        Some(f) => &f.data,
        None => &figure.data,
    };

    if !traces.iter().any(|t| is_previewable(t.kind)) {
        ui.label(format!(
            "No inline preview for {:?} charts; export to HTML to view it.",
            traces.first().map(|t| t.kind)
        ));
        return;
    }

    let mut axis = CategoryAxis::default();
    let mut series = Vec::new();
    for (i, trace) in traces.iter().enumerate().filter(|(_, t)| is_previewable(t.kind)) {
        let points: Vec<[f64; 2]> = trace
            .x
            .iter()
            .zip(&trace.y)
            .filter_map(|(x, y)| Some([axis.position(x)?, y.as_f64().filter(|v| v.is_finite())?]))
            .collect();
        let name = trace.name.clone().unwrap_or_else(|| format!("series {}", i + 1));
        series.push((trace, name, points));
    }

    let labels = axis.labels;
    let mut plot = Plot::new(id.to_string())
        .legend(Legend::default())
        .allow_boxed_zoom(true)
        .allow_drag(true)
        .allow_scroll(true)
        .allow_zoom(true)
        .height(height);
    if !labels.is_empty() {
        plot = plot.x_axis_formatter(move |mark, _range| {
            let idx = mark.value.round();
            if (mark.value - idx).abs() < 1e-6 && idx >= 0.0 {
                labels.get(idx as usize).cloned().unwrap_or_default()
            } else {
                String::new()
            }
        });
    }

    plot.show(ui, |plot_ui| {
        for (trace, name, points) in series {
            let color = trace_color(trace);
            match trace.kind {
                TraceKind::Bar => {
                    let bars = points
                        .iter()
                        .map(|[x, y]| {
                            let bar = Bar::new(*x, *y).width(0.8);
                            match color {
                                Some(c) => bar.fill(c),
                                None => bar,
                            }
                        })
                        .collect();
                    plot_ui.bar_chart(BarChart::new(bars).name(&name));
                }
                _ => {
                    let mode = trace.get("mode").and_then(|m| m.as_str()).unwrap_or("markers");
                    if mode.contains("lines") {
                        let mut line = Line::new(PlotPoints::from(points.clone())).name(&name).width(1.5);
                        if let Some(c) = color {
                            line = line.color(c);
                        }
                        plot_ui.line(line);
                    }
                    if mode.contains("markers") {
                        let mut pts = Points::new(PlotPoints::from(points)).name(&name).radius(3.0);
                        if let Some(c) = color {
                            pts = pts.color(c);
                        }
                        plot_ui.points(pts);
                    }
                }
            }
        }
    });
}
