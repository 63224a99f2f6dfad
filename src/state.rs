use std::path::Path;

use crate::chart::auto::{auto_analysis, AutoAnalysis};
use crate::chart::{ChartKind, ChartOutcome, ChartSpec, Figure};
use crate::config::ExplorerConfig;
use crate::data::aggregate::Aggregation;
use crate::data::filter::{FilterValue, Operator, Predicate};
use crate::data::model::{ColumnKind, Table};
use crate::report::{default_summary, render_report};
use crate::session::Session;

// ---------------------------------------------------------------------------
// Navigation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Overview,
    Charts,
    Report,
}

impl Page {
    pub const ALL: [Page; 3] = [Page::Overview, Page::Charts, Page::Report];

    pub fn label(self) -> &'static str {
        match self {
            Page::Overview => "Data Overview",
            Page::Charts => "Charts & Animation",
            Page::Report => "Summary Report",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartMode {
    Auto,
    Simple,
    GroupAggregate,
    Pivot,
    Advanced,
}

impl ChartMode {
    pub const ALL: [ChartMode; 5] = [
        ChartMode::Auto,
        ChartMode::Simple,
        ChartMode::GroupAggregate,
        ChartMode::Pivot,
        ChartMode::Advanced,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ChartMode::Auto => "Auto Analysis",
            ChartMode::Simple => "Simple Chart",
            ChartMode::GroupAggregate => "Group & Aggregate",
            ChartMode::Pivot => "Pivot Table",
            ChartMode::Advanced => "Advanced & Animated",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimpleChart {
    Bar,
    Line,
    Scatter,
    Pie,
}

impl SimpleChart {
    pub const ALL: [SimpleChart; 4] = [
        SimpleChart::Bar,
        SimpleChart::Line,
        SimpleChart::Scatter,
        SimpleChart::Pie,
    ];

    pub fn label(self) -> &'static str {
        match self {
            SimpleChart::Bar => "Bar",
            SimpleChart::Line => "Line",
            SimpleChart::Scatter => "Scatter",
            SimpleChart::Pie => "Pie",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvancedChart {
    CorrelationHeatmap,
    Scatter3d,
    AnimatedBar,
    AnimatedScatter,
    BarRace,
    LineForecast,
}

impl AdvancedChart {
    pub const ALL: [AdvancedChart; 6] = [
        AdvancedChart::CorrelationHeatmap,
        AdvancedChart::Scatter3d,
        AdvancedChart::AnimatedBar,
        AdvancedChart::AnimatedScatter,
        AdvancedChart::BarRace,
        AdvancedChart::LineForecast,
    ];

    pub fn label(self) -> &'static str {
        match self {
            AdvancedChart::CorrelationHeatmap => "Correlation Heatmap",
            AdvancedChart::Scatter3d => "3D Scatter",
            AdvancedChart::AnimatedBar => "Animated Bar",
            AdvancedChart::AnimatedScatter => "Animated Scatter",
            AdvancedChart::BarRace => "Bar Race",
            AdvancedChart::LineForecast => "Line + Forecast",
        }
    }
}

// ---------------------------------------------------------------------------
// Widget selections
// ---------------------------------------------------------------------------

/// One optional row filter in the side panel.
#[derive(Debug, Clone)]
pub struct FilterSlot {
    pub enabled: bool,
    pub column: String,
    pub op: Operator,
    pub value: String,
}

impl Default for FilterSlot {
    fn default() -> Self {
        Self {
            enabled: false,
            column: String::new(),
            op: Operator::Eq,
            value: String::new(),
        }
    }
}

impl FilterSlot {
    /// The predicate this slot describes over `table`. The typed value is
    /// read as a number only for numeric columns.
    pub fn predicate(&self, table: &Table) -> Option<Predicate> {
        if !self.enabled || self.column.is_empty() {
            return None;
        }
        let kind = table.column(&self.column).map(|c| c.kind);
        let value = match (kind, self.value.trim().parse::<f64>()) {
            (Some(ColumnKind::Numeric), Ok(n)) => FilterValue::Number(n),
            _ => FilterValue::Text(self.value.clone()),
        };
        Some(Predicate::new(self.column.clone(), self.op, value))
    }
}

/// Column choices of the chart forms, shared across modes.
#[derive(Debug, Clone)]
pub struct ChartForm {
    pub simple: SimpleChart,
    pub advanced: AdvancedChart,
    pub x: String,
    pub y: String,
    pub z: String,
    pub color: Option<String>,
    pub size: Option<String>,
    pub frame: String,
    pub group: String,
    pub pivot_columns: String,
    pub agg: Aggregation,
    pub horizon: usize,
}

impl ChartForm {
    fn for_table(table: &Table, config: &ExplorerConfig) -> Self {
        let all = table.column_names();
        let num = table.numeric_column_names();
        let nth = |names: &[String], i: usize| {
            names
                .get(i)
                .or_else(|| names.first())
                .cloned()
                .unwrap_or_default()
        };
        Self {
            simple: SimpleChart::Bar,
            advanced: AdvancedChart::CorrelationHeatmap,
            x: nth(&all, 0),
            y: nth(&num, 0),
            z: nth(&num, 2),
            color: None,
            size: None,
            frame: nth(&all, 0),
            group: nth(&all, 0),
            pivot_columns: nth(&all, 1),
            agg: Aggregation::Sum,
            horizon: config.charts.forecast_horizon,
        }
    }

    /// The chart the form currently describes for `mode`.
    pub fn kind(&self, mode: ChartMode, config: &ExplorerConfig) -> Option<ChartKind> {
        let (x, y) = (self.x.clone(), self.y.clone());
        let kind = match mode {
            ChartMode::Auto => return None,
            ChartMode::Simple => match self.simple {
                SimpleChart::Bar => ChartKind::Bar { x, y },
                SimpleChart::Line => ChartKind::Line { x, y },
                SimpleChart::Scatter => ChartKind::Scatter {
                    x,
                    y,
                    color: self.color.clone(),
                },
                SimpleChart::Pie => ChartKind::Pie { names: x, values: y },
            },
            ChartMode::GroupAggregate => ChartKind::GroupAggregate {
                group: self.group.clone(),
                value: y,
                agg: self.agg,
            },
            ChartMode::Pivot => ChartKind::PivotHeatmap {
                rows: self.group.clone(),
                columns: self.pivot_columns.clone(),
                values: y,
                agg: self.agg,
            },
            ChartMode::Advanced => match self.advanced {
                AdvancedChart::CorrelationHeatmap => ChartKind::CorrelationHeatmap,
                AdvancedChart::Scatter3d => ChartKind::Scatter3d {
                    x,
                    y,
                    z: self.z.clone(),
                    color: self.color.clone(),
                },
                AdvancedChart::AnimatedBar => ChartKind::AnimatedBar {
                    x,
                    y,
                    frame: self.frame.clone(),
                },
                AdvancedChart::BarRace => ChartKind::BarRace {
                    x,
                    y,
                    frame: self.frame.clone(),
                },
                AdvancedChart::AnimatedScatter => ChartKind::AnimatedScatter {
                    x,
                    y,
                    frame: self.frame.clone(),
                    size: self.size.clone(),
                    color: self.color.clone(),
                },
                AdvancedChart::LineForecast => ChartKind::LineForecast {
                    x,
                    y,
                    horizon: config.clamp_horizon(self.horizon),
                },
            },
        };
        Some(kind)
    }
}

/// A built chart waiting to be previewed or exported.
#[derive(Debug, Clone)]
pub struct ShownChart {
    pub file_stem: String,
    pub outcome: ChartOutcome,
    /// Animation frame shown in the preview.
    pub frame: usize,
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full UI state, independent of rendering.
pub struct AppState {
    pub config: ExplorerConfig,
    pub session: Session,
    pub page: Page,
    pub filters: [FilterSlot; 2],
    pub chart_mode: ChartMode,
    pub form: ChartForm,
    pub chart: Option<ShownChart>,
    pub auto: Option<AutoAnalysis>,
    pub summary_text: String,
    /// Status / error message shown in the UI.
    pub status_message: Option<String>,
    /// Session table narrowed by `filters`, rebuilt by `refilter`.
    working: Option<Table>,
}

impl AppState {
    pub fn new(config: ExplorerConfig) -> Self {
        let form = ChartForm::for_table(&Table::default(), &config);
        Self {
            config,
            session: Session::new(),
            page: Page::Overview,
            filters: Default::default(),
            chart_mode: ChartMode::Auto,
            form,
            chart: None,
            auto: None,
            summary_text: String::new(),
            status_message: None,
            working: None,
        }
    }

    /// Load a file into the session and reset everything derived from the
    /// previous dataset. A failed load leaves the state as it was.
    pub fn open_path(&mut self, path: &Path) {
        if let Err(e) = self.session.load_path(path) {
            log::error!("Failed to load file: {e:#}");
            self.status_message = Some(format!("Error: {e:#}"));
            return;
        }
        let Ok(table) = self.session.table() else {
            return;
        };
        self.form = ChartForm::for_table(table, &self.config);
        self.summary_text = default_summary(self.session.display_name(), table);
        self.filters = Default::default();
        self.chart = None;
        self.auto = None;
        self.status_message = None;
        self.refilter();
    }

    pub fn predicates(&self) -> Vec<Predicate> {
        let Ok(table) = self.session.table() else {
            return Vec::new();
        };
        self.filters.iter().filter_map(|slot| slot.predicate(table)).collect()
    }

    /// Recompute the working table after the filters changed. Charts built
    /// from the previous selection are dropped.
    pub fn refilter(&mut self) {
        self.working = self.session.working_table(&self.predicates()).ok();
        self.chart = None;
        self.auto = None;
    }

    /// The session table after the side-panel filters.
    pub fn working_table(&self) -> Option<&Table> {
        self.working.as_ref()
    }

    pub fn run_auto(&mut self) {
        if let Some(table) = &self.working {
            self.auto = Some(auto_analysis(table, &self.config));
        }
    }

    pub fn generate_chart(&mut self) {
        let Some(table) = self.working.as_ref() else {
            return;
        };
        let Some(kind) = self.form.kind(self.chart_mode, &self.config) else {
            return;
        };
        let file_stem = kind.file_stem();
        let built = ChartSpec::new(kind, table).and_then(|spec| spec.build(table, &self.config));
        match built {
            Ok(outcome) => {
                self.status_message = match &outcome {
                    ChartOutcome::Degraded { reason, .. } => {
                        Some(format!("Showing a plain chart: {reason}"))
                    }
                    ChartOutcome::NotApplicable(reason) => Some(reason.clone()),
                    ChartOutcome::Rendered(_) => None,
                };
                self.chart = Some(ShownChart {
                    file_stem,
                    outcome,
                    frame: 0,
                });
            }
            Err(e) => {
                self.chart = None;
                self.status_message = Some(format!("Error: {e}"));
            }
        }
    }

    /// Render the PDF summary of the loaded dataset to `path`.
    pub fn write_report(&mut self, path: &Path) {
        let table = match self.session.table() {
            Ok(table) => table,
            Err(e) => {
                self.status_message = Some(format!("Error: {e}"));
                return;
            }
        };
        let result = render_report(table, &self.summary_text, &self.config)
            .map_err(anyhow::Error::from)
            .and_then(|report| {
                std::fs::write(path, &report.bytes)?;
                Ok(report)
            });
        self.status_message = Some(match result {
            Ok(report) if report.omitted.is_empty() => format!("Saved {}", path.display()),
            Ok(_) => format!("Saved {} without statistics", path.display()),
            Err(e) => format!("Error: {e:#}"),
        });
    }

    /// Save `figure` as standalone HTML; the file stem becomes the div id.
    pub fn write_figure(&mut self, path: &Path, figure: Figure) {
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "chart".to_string());
        let export = figure.export_html(&name, &self.config.charts.plotly_cdn);
        self.status_message = Some(match std::fs::write(path, &export.bytes) {
            Ok(()) => format!("Saved {}", path.display()),
            Err(e) => format!("Error: {e}"),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loaded() -> (AppState, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sales.csv");
        std::fs::write(&path, "region,units,year\nn,3,2021\ns,5,2021\nn,7,2022\n").unwrap();
        let mut state = AppState::new(ExplorerConfig::default());
        state.open_path(&path);
        (state, dir)
    }

    #[test]
    fn opening_a_file_prepares_forms_and_summary() {
        let (state, _dir) = loaded();
        assert!(state.status_message.is_none());
        assert_eq!(state.form.x, "region");
        assert_eq!(state.form.y, "units");
        assert!(state.summary_text.contains("sales.csv"));
    }

    #[test]
    fn failed_open_keeps_the_dataset() {
        let (mut state, dir) = loaded();
        state.open_path(&dir.path().join("missing.csv"));
        assert!(state.status_message.as_deref().unwrap().starts_with("Error"));
        assert_eq!(state.session.display_name(), "sales.csv");
    }

    #[test]
    fn filters_narrow_the_working_table() {
        let (mut state, _dir) = loaded();
        state.filters[0] = FilterSlot {
            enabled: true,
            column: "units".into(),
            op: Operator::Gt,
            value: "4".into(),
        };
        state.refilter();
        assert_eq!(state.working_table().unwrap().n_rows(), 2);
        state.filters[0].enabled = false;
        state.refilter();
        assert_eq!(state.working_table().unwrap().n_rows(), 3);
    }

    fn filtered(state: &mut AppState, column: &str, op: Operator, value: &str) -> Vec<String> {
        state.filters[0] = FilterSlot {
            enabled: true,
            column: column.into(),
            op,
            value: value.into(),
        };
        state.refilter();
        let table = state.working_table().unwrap();
        let col = table.column("code").unwrap();
        col.values.iter().map(|v| v.to_plain_string()).collect()
    }

    #[test]
    fn filter_values_follow_the_column_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("codes.csv");
        std::fs::write(
            &path,
            "code,day,active,units\nA12,2024-01-05,true,12\n12,2023-12-30,false,7\nB7,2024-02-01,true,12.5\n",
        )
        .unwrap();
        let mut state = AppState::new(ExplorerConfig::default());
        state.open_path(&path);

        assert_eq!(filtered(&mut state, "code", Operator::Contains, "12"), vec!["A12", "12"]);
        assert_eq!(filtered(&mut state, "code", Operator::Eq, "12"), vec!["12"]);
        assert_eq!(filtered(&mut state, "code", Operator::Ne, "12"), vec!["A12", "B7"]);
        assert_eq!(filtered(&mut state, "day", Operator::Contains, "2024"), vec!["A12", "B7"]);
        assert_eq!(filtered(&mut state, "active", Operator::Eq, "true"), vec!["A12", "B7"]);
        assert_eq!(filtered(&mut state, "units", Operator::Eq, "12"), vec!["A12"]);
        // Numeric columns compare against the parsed number, shown as "12.0".
        assert_eq!(filtered(&mut state, "units", Operator::Contains, "12"), vec!["A12"]);
    }

    #[test]
    fn refilter_caches_until_the_next_change() {
        let (mut state, _dir) = loaded();
        state.filters[0] = FilterSlot {
            enabled: true,
            column: "region".into(),
            op: Operator::Eq,
            value: "n".into(),
        };
        assert_eq!(state.working_table().unwrap().n_rows(), 3);
        state.refilter();
        assert_eq!(state.working_table().unwrap().n_rows(), 2);
    }

    #[test]
    fn forecast_horizon_is_clamped_to_the_slider_range() {
        let (mut state, _dir) = loaded();
        state.form.advanced = AdvancedChart::LineForecast;
        state.form.horizon = 100;
        let kind = state.form.kind(ChartMode::Advanced, &state.config).unwrap();
        assert!(matches!(kind, ChartKind::LineForecast { horizon: 30, .. }));
    }

    #[test]
    fn generating_a_chart_keeps_its_export_name() {
        let (mut state, _dir) = loaded();
        state.chart_mode = ChartMode::Simple;
        state.form.simple = SimpleChart::Line;
        state.generate_chart();
        let shown = state.chart.as_ref().unwrap();
        assert_eq!(shown.file_stem, "simple_line");
        assert!(shown.outcome.figure().is_some());
    }

    #[test]
    fn chart_html_is_written_to_disk() {
        let (mut state, dir) = loaded();
        state.chart_mode = ChartMode::Simple;
        state.generate_chart();
        let figure = state.chart.as_ref().unwrap().outcome.figure().unwrap().clone();
        let out = dir.path().join("simple_bar.html");
        state.write_figure(&out, figure);
        let html = std::fs::read_to_string(&out).unwrap();
        assert!(html.contains("chart_simple_bar"));
    }

    #[test]
    fn report_is_written_to_disk() {
        let (mut state, dir) = loaded();
        let out = dir.path().join("report.pdf");
        state.write_report(&out);
        assert!(std::fs::read(&out).unwrap().starts_with(b"%PDF"));
    }
}
