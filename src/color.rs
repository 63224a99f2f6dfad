use std::collections::{BTreeMap, BTreeSet};

use palette::{Hsl, IntoColor, Srgb};

use crate::data::model::CellValue;

/// Continuous scale for numeric colour columns.
pub const CONTINUOUS_SCALE: &str = "Viridis";

/// Diverging scale for correlation matrices.
pub const DIVERGING_SCALE: &str = "RdBu";

pub const HISTORY_COLOR: Rgb = Rgb([31, 119, 180]);
pub const FORECAST_COLOR: Rgb = Rgb([255, 127, 14]);

/// An sRGB colour, 8 bits per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb(pub [u8; 3]);

impl Rgb {
    /// `#rrggbb`, the form plotly expects.
    pub fn hex(self) -> String {
        let [r, g, b] = self.0;
        format!("#{r:02x}{g:02x}{b:02x}")
    }
}

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Rgb> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.55);
            let rgb: Srgb = hsl.into_color();
            Rgb([
                (rgb.red * 255.0) as u8,
                (rgb.green * 255.0) as u8,
                (rgb.blue * 255.0) as u8,
            ])
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Color mapping: cell value → colour
// ---------------------------------------------------------------------------

/// Maps the unique values of a grouping column to distinct colours.
#[derive(Debug, Clone)]
pub struct ColorMap {
    pub column: String,
    mapping: BTreeMap<CellValue, Rgb>,
    default_color: Rgb,
}

impl ColorMap {
    /// Build a colour map for the given column from its unique values.
    pub fn new(column: &str, unique_values: &BTreeSet<CellValue>) -> Self {
        let palette = generate_palette(unique_values.len());
        let mapping: BTreeMap<CellValue, Rgb> = unique_values
            .iter()
            .zip(palette)
            .map(|(v, c)| (v.clone(), c))
            .collect();

        ColorMap {
            column: column.to_string(),
            mapping,
            default_color: Rgb([128, 128, 128]),
        }
    }

    /// Look up the colour for a given value.
    pub fn color_for(&self, value: &CellValue) -> Rgb {
        self.mapping
            .get(value)
            .copied()
            .unwrap_or(self.default_color)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_colours_are_distinct() {
        let p = generate_palette(6);
        assert_eq!(p.len(), 6);
        let unique: BTreeSet<String> = p.iter().map(|c| c.hex()).collect();
        assert_eq!(unique.len(), 6);
        assert!(generate_palette(0).is_empty());
    }

    #[test]
    fn unknown_values_get_the_default_colour() {
        let values: BTreeSet<CellValue> =
            [CellValue::Text("a".into()), CellValue::Text("b".into())].into_iter().collect();
        let cm = ColorMap::new("g", &values);
        assert_ne!(cm.color_for(&CellValue::Text("a".into())), cm.color_for(&CellValue::Text("b".into())));
        assert_eq!(cm.color_for(&CellValue::Text("zzz".into())).hex(), "#808080");
    }
}
