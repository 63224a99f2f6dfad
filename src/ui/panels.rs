use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};

use crate::data::filter::Operator;
use crate::state::{AppState, FilterSlot, Page};

// ---------------------------------------------------------------------------
// Left side panel – navigation and filters
// ---------------------------------------------------------------------------

/// Render the left panel: page selector, then the two row filters.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Data Explorer");
    ui.separator();

    for page in Page::ALL {
        ui.selectable_value(&mut state.page, page, page.label());
    }
    ui.add_space(8.0);

    ui.heading("Filters");
    ui.separator();

    let columns = match state.session.table() {
        Ok(table) => table.column_names(),
        Err(_) => {
            ui.label("No dataset loaded.");
            return;
        }
    };

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            let mut changed = false;
            for (i, slot) in state.filters.iter_mut().enumerate() {
                changed |= filter_slot(ui, i, slot, &columns);
                ui.separator();
            }
            if changed {
                state.refilter();
            }

            let active = state.predicates();
            if active.is_empty() {
                ui.label("No filters active.");
            } else {
                for p in &active {
                    ui.label(RichText::new(p.to_string()).monospace());
                }
                if let Some(work) = state.working_table() {
                    ui.label(format!("{} rows after filtering", work.n_rows()));
                }
            }
        });
}

/// One filter: enable toggle, column, operator and value. Returns whether
/// anything changed.
fn filter_slot(ui: &mut Ui, index: usize, slot: &mut FilterSlot, columns: &[String]) -> bool {
    let mut changed = ui
        .checkbox(&mut slot.enabled, format!("Filter {}", index + 1))
        .changed();

    ui.add_enabled_ui(slot.enabled, |ui: &mut Ui| {
        let shown = if slot.column.is_empty() {
            "(column)"
        } else {
            slot.column.as_str()
        };
        egui::ComboBox::from_id_salt(("filter_column", index))
            .selected_text(shown)
            .show_ui(ui, |ui: &mut Ui| {
                for col in columns {
                    changed |= ui
                        .selectable_value(&mut slot.column, col.clone(), col)
                        .changed();
                }
            });

        ui.horizontal(|ui: &mut Ui| {
            egui::ComboBox::from_id_salt(("filter_op", index))
                .width(48.0)
                .selected_text(slot.op.symbol())
                .show_ui(ui, |ui: &mut Ui| {
                    for op in Operator::ALL {
                        changed |= ui.selectable_value(&mut slot.op, op, op.symbol()).changed();
                    }
                });
            changed |= ui.text_edit_singleline(&mut slot.value).changed();
        });
    });
    changed
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open…").clicked() {
                open_file_dialog(state);
                ui.close_menu();
            }
        });

        ui.separator();

        match state.session.table() {
            Ok(table) => {
                ui.label(format!(
                    "{}: {} rows, {} columns",
                    state.session.display_name(),
                    table.n_rows(),
                    table.n_cols()
                ));
            }
            Err(e) => {
                ui.label(e.to_string());
            }
        }

        if let Some(msg) = &state.status_message {
            ui.separator();
            let color = if msg.starts_with("Error") {
                Color32::RED
            } else {
                ui.visuals().text_color()
            };
            ui.label(RichText::new(msg).color(color));
        }
    });
}

// ---------------------------------------------------------------------------
// File dialogs
// ---------------------------------------------------------------------------

pub fn open_file_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Open dataset")
        .add_filter(
            "Supported files",
            &["csv", "xlsx", "xlsm", "xls", "ods", "json", "parquet", "pq"],
        )
        .add_filter("CSV", &["csv"])
        .add_filter("Excel", &["xlsx", "xlsm", "xls", "ods"])
        .add_filter("JSON", &["json"])
        .add_filter("Parquet", &["parquet", "pq"])
        .pick_file();

    if let Some(path) = file {
        state.open_path(&path);
    }
}

/// Ask for a destination, starting from `default_name`.
pub fn save_file_dialog(
    title: &str,
    default_name: &str,
    filter_name: &str,
    extensions: &[&str],
) -> Option<std::path::PathBuf> {
    rfd::FileDialog::new()
        .set_title(title)
        .set_file_name(default_name)
        .add_filter(filter_name, extensions)
        .save_file()
}
