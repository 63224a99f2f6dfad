use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};
use egui_extras::{Column as GridColumn, TableBuilder};

use crate::chart::{ChartOutcome, Figure};
use crate::data::aggregate::Aggregation;
use crate::data::model::Table;
use crate::report::default_summary;
use crate::state::{AdvancedChart, AppState, ChartMode, SimpleChart};
use crate::stats::{column_types, missing_values, overview, summarize, StatsGrid};

use super::panels::save_file_dialog;
use super::plot::figure_preview;

const PREVIEW_HEIGHT: f32 = 360.0;
const AUTO_PREVIEW_HEIGHT: f32 = 260.0;

// ---------------------------------------------------------------------------
// Shared widgets
// ---------------------------------------------------------------------------

/// A read-only grid with a header row.
fn grid(ui: &mut Ui, id: &str, header: &[String], rows: &[Vec<String>]) {
    ui.push_id(id, |ui: &mut Ui| {
        TableBuilder::new(ui)
            .striped(true)
            .resizable(true)
            .vscroll(false)
            .columns(GridColumn::auto().at_least(60.0), header.len())
            .header(20.0, |mut head| {
                for name in header {
                    head.col(|ui: &mut Ui| {
                        ui.strong(name);
                    });
                }
            })
            .body(|body| {
                body.rows(18.0, rows.len(), |mut row| {
                    let cells = &rows[row.index()];
                    for cell in cells {
                        row.col(|ui: &mut Ui| {
                            ui.label(cell);
                        });
                    }
                });
            });
    });
}

fn stats_grid(ui: &mut Ui, id: &str, g: &StatsGrid) {
    grid(ui, id, &g.header, &g.rows);
}

fn column_combo(ui: &mut Ui, label: &str, value: &mut String, options: &[String]) {
    egui::ComboBox::from_label(label)
        .selected_text(value.as_str())
        .show_ui(ui, |ui: &mut Ui| {
            for opt in options {
                ui.selectable_value(value, opt.clone(), opt);
            }
        });
}

fn optional_column_combo(ui: &mut Ui, label: &str, value: &mut Option<String>, options: &[String]) {
    let shown = value.as_deref().unwrap_or("None").to_string();
    egui::ComboBox::from_label(label)
        .selected_text(shown)
        .show_ui(ui, |ui: &mut Ui| {
            ui.selectable_value(value, None, "None");
            for opt in options {
                ui.selectable_value(value, Some(opt.clone()), opt);
            }
        });
}

fn agg_combo(ui: &mut Ui, value: &mut Aggregation) {
    egui::ComboBox::from_label("Aggregation")
        .selected_text(value.name())
        .show_ui(ui, |ui: &mut Ui| {
            for agg in Aggregation::ALL {
                ui.selectable_value(value, agg, agg.name());
            }
        });
}

/// Preview plus export button. Returns the figure to export when clicked.
fn chart_block(ui: &mut Ui, id: &str, outcome: &ChartOutcome, frame: &mut usize, height: f32) -> Option<Figure> {
    let figure = match outcome {
        ChartOutcome::NotApplicable(reason) => {
            ui.label(RichText::new(reason).italics());
            return None;
        }
        ChartOutcome::Degraded { figure, reason } => {
            ui.label(RichText::new(format!("Showing a plain chart: {reason}")).color(Color32::YELLOW));
            figure
        }
        ChartOutcome::Rendered(figure) => figure,
    };

    if !figure.frames.is_empty() {
        let last = figure.frames.len() - 1;
        *frame = (*frame).min(last);
        let label = figure.frames[*frame].name.clone();
        ui.horizontal(|ui: &mut Ui| {
            ui.add(egui::Slider::new(frame, 0..=last).show_value(false));
            ui.label(label);
        });
    }

    figure_preview(ui, id, figure, *frame, height);
    ui.button("Export HTML…")
        .clicked()
        .then(|| figure.clone())
}

fn export_figure(state: &mut AppState, stem: &str, figure: Figure) {
    if let Some(path) = save_file_dialog("Export chart", &format!("{stem}.html"), "HTML", &["html"]) {
        state.write_figure(&path, figure);
    }
}

// ---------------------------------------------------------------------------
// Data overview
// ---------------------------------------------------------------------------

pub fn overview_page(ui: &mut Ui, state: &AppState) {
    let table = match state.session.table() {
        Ok(t) => t,
        Err(e) => {
            ui.heading("Data Overview");
            ui.label(e.to_string());
            return;
        }
    };

    ScrollArea::vertical().auto_shrink([false, false]).show(ui, |ui: &mut Ui| {
        let info = overview(table);
        ui.heading(state.session.display_name());
        ui.label(format!("Rows: {}    Columns: {}", info.rows, info.columns));
        ui.label(format!("Columns: {}", info.column_names.join(", ")));
        ui.add_space(8.0);

        ui.strong("Preview");
        preview_grid(ui, &table.head(state.config.overview.preview_rows));
        ui.add_space(8.0);

        ui.strong("Column types");
        let types: Vec<Vec<String>> = column_types(table)
            .into_iter()
            .map(|(name, kind)| vec![name, kind.to_string()])
            .collect();
        grid(ui, "types", &["column".into(), "type".into()], &types);
        ui.add_space(8.0);

        ui.strong("Missing values");
        let missing: Vec<Vec<String>> = missing_values(table)
            .into_iter()
            .map(|(name, n)| vec![name, n.to_string()])
            .collect();
        grid(ui, "missing", &["column".into(), "missing".into()], &missing);
        ui.add_space(8.0);

        ui.strong("Statistics");
        match summarize(table) {
            Ok(summary) => {
                if summary.is_degraded() {
                    ui.label(
                        RichText::new("Some columns mix value types; showing numeric columns only.")
                            .color(Color32::YELLOW),
                    );
                }
                stats_grid(ui, "stats", &summary.description().transposed_grid());
            }
            Err(e) => {
                ui.label(format!("Statistics unavailable: {e}"));
            }
        }
    });
}

fn preview_grid(ui: &mut Ui, head: &Table) {
    let header = head.column_names();
    let rows: Vec<Vec<String>> = (0..head.n_rows())
        .map(|i| head.row(i).into_iter().map(|v| v.to_string()).collect())
        .collect();
    grid(ui, "preview", &header, &rows);
}

// ---------------------------------------------------------------------------
// Charts & animation
// ---------------------------------------------------------------------------

/// Column names offered by the chart forms.
struct ColumnChoices {
    all: Vec<String>,
    num: Vec<String>,
    cat: Vec<String>,
}

impl ColumnChoices {
    fn of(table: &Table) -> Self {
        Self {
            all: table.column_names(),
            num: table.numeric_column_names(),
            cat: table.categorical_column_names(),
        }
    }
}

pub fn charts_page(ui: &mut Ui, state: &mut AppState) {
    let Some((rows, choices)) = state
        .working_table()
        .map(|t| (t.n_rows(), ColumnChoices::of(t)))
    else {
        ui.heading("Charts & Animation");
        ui.label("No dataset loaded; open a file first.");
        return;
    };

    ui.horizontal(|ui: &mut Ui| {
        ui.heading("Charts & Animation");
        ui.label(format!("({rows} rows)"));
    });
    ui.horizontal(|ui: &mut Ui| {
        for mode in ChartMode::ALL {
            if ui.selectable_value(&mut state.chart_mode, mode, mode.label()).changed() {
                state.chart = None;
            }
        }
    });
    ui.separator();

    if state.chart_mode == ChartMode::Auto {
        auto_section(ui, state);
        return;
    }

    chart_form(ui, state, &choices);
    if ui.button("Generate chart").clicked() {
        state.generate_chart();
    }
    ui.separator();

    let mut export = None;
    if let Some(shown) = &mut state.chart {
        if let Some(figure) = chart_block(ui, "chart", &shown.outcome, &mut shown.frame, PREVIEW_HEIGHT) {
            export = Some((shown.file_stem.clone(), figure));
        }
    }
    if let Some((stem, figure)) = export {
        export_figure(state, &stem, figure);
    }
}

fn chart_form(ui: &mut Ui, state: &mut AppState, choices: &ColumnChoices) {
    let ColumnChoices { all, num, cat } = choices;
    let min_h = state.config.charts.min_forecast_horizon;
    let max_h = state.config.charts.max_forecast_horizon;
    let form = &mut state.form;

    match state.chart_mode {
        ChartMode::Auto => {}
        ChartMode::Simple => {
            egui::ComboBox::from_label("Chart type")
                .selected_text(form.simple.label())
                .show_ui(ui, |ui: &mut Ui| {
                    for c in SimpleChart::ALL {
                        ui.selectable_value(&mut form.simple, c, c.label());
                    }
                });
            let (x_label, y_label) = match form.simple {
                SimpleChart::Pie => ("Names", "Values"),
                _ => ("X axis", "Y axis"),
            };
            column_combo(ui, x_label, &mut form.x, all);
            column_combo(ui, y_label, &mut form.y, all);
            if form.simple == SimpleChart::Scatter {
                optional_column_combo(ui, "Color", &mut form.color, all);
            }
        }
        ChartMode::GroupAggregate => {
            column_combo(ui, "Group by", &mut form.group, all);
            column_combo(ui, "Value", &mut form.y, num);
            agg_combo(ui, &mut form.agg);
        }
        ChartMode::Pivot => {
            column_combo(ui, "Rows", &mut form.group, all);
            column_combo(ui, "Columns", &mut form.pivot_columns, all);
            column_combo(ui, "Values", &mut form.y, num);
            agg_combo(ui, &mut form.agg);
        }
        ChartMode::Advanced => {
            egui::ComboBox::from_label("Chart type")
                .selected_text(form.advanced.label())
                .show_ui(ui, |ui: &mut Ui| {
                    for c in AdvancedChart::ALL {
                        ui.selectable_value(&mut form.advanced, c, c.label());
                    }
                });
            match form.advanced {
                AdvancedChart::CorrelationHeatmap => {
                    ui.label(format!("{} numeric columns", num.len()));
                }
                AdvancedChart::Scatter3d => {
                    column_combo(ui, "X", &mut form.x, num);
                    column_combo(ui, "Y", &mut form.y, num);
                    column_combo(ui, "Z", &mut form.z, num);
                    optional_column_combo(ui, "Color", &mut form.color, all);
                }
                AdvancedChart::AnimatedBar | AdvancedChart::BarRace => {
                    column_combo(ui, "Category", &mut form.x, cat);
                    column_combo(ui, "Value", &mut form.y, num);
                    column_combo(ui, "Frame", &mut form.frame, all);
                }
                AdvancedChart::AnimatedScatter => {
                    column_combo(ui, "X", &mut form.x, num);
                    column_combo(ui, "Y", &mut form.y, num);
                    column_combo(ui, "Frame", &mut form.frame, all);
                    optional_column_combo(ui, "Size", &mut form.size, num);
                    optional_column_combo(ui, "Color", &mut form.color, all);
                }
                AdvancedChart::LineForecast => {
                    column_combo(ui, "X", &mut form.x, all);
                    column_combo(ui, "Y", &mut form.y, all);
                    ui.add(egui::Slider::new(&mut form.horizon, min_h..=max_h).text("Forecast points"));
                }
            }
        }
    }
}

fn auto_section(ui: &mut Ui, state: &mut AppState) {
    if ui.button("Run auto analysis").clicked() {
        state.run_auto();
    }

    let mut export = None;
    if let Some(auto) = &state.auto {
        ScrollArea::vertical().auto_shrink([false, false]).show(ui, |ui: &mut Ui| {
            ui.label(format!("Rows: {}    Columns: {}", auto.rows, auto.columns));
            match &auto.summary {
                Ok(summary) => stats_grid(ui, "auto_stats", &summary.description().transposed_grid()),
                Err(e) => {
                    ui.label(format!("Statistics unavailable: {e}"));
                }
            }
            for chart in &auto.charts {
                ui.separator();
                ui.strong(&chart.title);
                ui.label(RichText::new(chart.caption).weak());
                let mut frame = 0;
                if let Some(figure) =
                    chart_block(ui, &chart.file_stem, &chart.outcome, &mut frame, AUTO_PREVIEW_HEIGHT)
                {
                    export = Some((chart.file_stem.clone(), figure));
                }
            }
        });
    }
    if let Some((stem, figure)) = export {
        export_figure(state, &stem, figure);
    }
}

// ---------------------------------------------------------------------------
// Summary report
// ---------------------------------------------------------------------------

pub fn report_page(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Summary Report");
    let table = match state.session.table() {
        Ok(t) => t,
        Err(e) => {
            ui.label(e.to_string());
            return;
        }
    };
    let reset = default_summary(state.session.display_name(), table);

    ui.label("Summary text");
    ui.add(
        egui::TextEdit::multiline(&mut state.summary_text)
            .desired_rows(14)
            .desired_width(f32::INFINITY),
    );

    ui.horizontal(|ui: &mut Ui| {
        if ui.button("Reset text").clicked() {
            state.summary_text = reset;
        }
        if ui.button("Generate PDF…").clicked() {
            let name = state.config.report.file_name.clone();
            if let Some(path) = save_file_dialog("Save report", &name, "PDF", &["pdf"]) {
                state.write_report(&path);
            }
        }
    });
}
