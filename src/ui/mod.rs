//! egui rendering. Widgets read and mutate `AppState`; all data work lives
//! outside this module.

pub mod pages;
pub mod panels;
pub mod plot;
