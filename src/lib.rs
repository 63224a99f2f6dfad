//! Browser-style dataset explorer: load a table, summarise it, filter it,
//! chart it and write a PDF summary.
//!
//! ```text
//!   file bytes ──loader──▶ Table ──filter──▶ working Table
//!                            │                    │
//!                          stats               chart ──▶ Figure ──▶ HTML
//!                            │
//!                          report ──▶ PDF
//! ```
//!
//! `session` holds the loaded dataset, `state` the UI selections, `ui` and
//! `app` draw them with egui.

pub mod app;
pub mod chart;
pub mod color;
pub mod config;
pub mod data;
pub mod report;
pub mod session;
pub mod state;
pub mod stats;
pub mod ui;
