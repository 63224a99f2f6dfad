use data_explorer::app::DataExplorerApp;
use data_explorer::config::ExplorerConfig;
use eframe::egui;

fn main() -> eframe::Result {
    env_logger::init();

    let config = ExplorerConfig::load().unwrap_or_else(|e| {
        log::error!("invalid configuration, using defaults: {e}");
        ExplorerConfig::default()
    });

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_min_inner_size([600.0, 400.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Data Explorer",
        options,
        Box::new(|_cc| Ok(Box::new(DataExplorerApp::new(config)))),
    )
}
