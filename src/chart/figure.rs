//! Renderable chart objects in Plotly's JSON schema, and their export as
//! standalone HTML.

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::data::model::CellValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceKind {
    Bar,
    Scatter,
    Pie,
    Heatmap,
    Scatter3d,
    Histogram,
    Box,
    Splom,
}

/// One data series. Kind-specific Plotly attributes (`mode`, `marker`,
/// `labels`, `z`, ...) live in `attrs`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trace {
    #[serde(rename = "type")]
    pub kind: TraceKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub x: Vec<CellValue>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub y: Vec<CellValue>,
    #[serde(flatten)]
    pub attrs: Map<String, Value>,
}

impl Trace {
    pub fn new(kind: TraceKind) -> Self {
        Trace {
            kind,
            name: None,
            x: Vec::new(),
            y: Vec::new(),
            attrs: Map::new(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn x(mut self, x: Vec<CellValue>) -> Self {
        self.x = x;
        self
    }

    pub fn y(mut self, y: Vec<CellValue>) -> Self {
        self.y = y;
        self
    }

    pub fn attr(mut self, key: &str, value: Value) -> Self {
        self.attrs.insert(key.to_string(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attrs.get(key)
    }
}

/// A named set of traces shown at one animation step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    pub name: String,
    pub data: Vec<Trace>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Figure {
    pub data: Vec<Trace>,
    pub layout: Map<String, Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub frames: Vec<Frame>,
}

/// A downloadable HTML rendering of a figure.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartExport {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl Figure {
    pub fn new(data: Vec<Trace>) -> Self {
        Figure {
            data,
            ..Default::default()
        }
    }

    pub fn layout(mut self, key: &str, value: Value) -> Self {
        self.layout.insert(key.to_string(), value);
        self
    }

    pub fn title(self, title: &str) -> Self {
        self.layout("title", json!({ "text": title }))
    }

    pub fn axis_titles(self, x: &str, y: &str) -> Self {
        self.layout("xaxis", json!({ "title": { "text": x } }))
            .layout("yaxis", json!({ "title": { "text": y } }))
    }

    /// Plain transition used by static charts.
    pub fn transition(self, ms: u32) -> Self {
        self.layout("transition", json!({ "duration": ms }))
    }

    pub fn title_text(&self) -> Option<&str> {
        self.layout.get("title")?.get("text")?.as_str()
    }

    /// Merge `extra` into a nested layout object, e.g. an axis range.
    pub fn extend_layout(&mut self, key: &str, extra: Value) {
        let slot = self
            .layout
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if let (Value::Object(target), Value::Object(extra)) = (slot, extra) {
            target.extend(extra);
        }
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// A complete HTML document drawing this figure with plotly.js loaded
    /// from `plotly_src`.
    pub fn to_html(&self, plotly_src: &str, div_id: &str) -> String {
        // `</` would end the inline script early.
        let payload = self.to_json().to_string().replace("</", "<\\/");
        let title = escape_html(self.title_text().unwrap_or("Chart"));

        let mut html = String::new();
        html.push_str("<!DOCTYPE html>\n<html>\n<head>\n");
        html.push_str("<meta charset=\"utf-8\">\n");
        html.push_str(&format!("<title>{title}</title>\n"));
        html.push_str(&format!(
            "<script src=\"{}\"></script>\n",
            escape_html(plotly_src)
        ));
        html.push_str("</head>\n<body>\n");
        html.push_str(&format!(
            "<div id=\"{div_id}\" style=\"width:100%;height:100%;min-height:560px;\"></div>\n"
        ));
        html.push_str("<script>\n");
        html.push_str(&format!("var fig = {payload};\n"));
        html.push_str(&format!(
            "Plotly.newPlot(\"{div_id}\", fig.data, fig.layout, {{\"responsive\": true}})"
        ));
        html.push_str(&format!(
            ".then(function () {{ if (fig.frames) {{ Plotly.addFrames(\"{div_id}\", fig.frames); }} }});\n"
        ));
        html.push_str("</script>\n");
        html.push_str("</body>\n</html>\n");
        html
    }

    /// HTML bytes named `<name>.html`.
    pub fn export_html(&self, name: &str, plotly_src: &str) -> ChartExport {
        let div_id: String = name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        ChartExport {
            file_name: format!("{name}.html"),
            bytes: self.to_html(plotly_src, &format!("chart_{div_id}")).into_bytes(),
        }
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Add play/pause buttons and a frame slider for an animated figure.
pub(crate) fn add_animation_controls(figure: &mut Figure, frame_column: &str, ms: u32) {
    let play = json!({
        "label": "Play",
        "method": "animate",
        "args": [null, {
            "frame": { "duration": ms, "redraw": true },
            "fromcurrent": true,
            "transition": { "duration": ms, "easing": "cubic-in-out" }
        }]
    });
    let pause = json!({
        "label": "Pause",
        "method": "animate",
        "args": [[null], {
            "frame": { "duration": 0, "redraw": false },
            "mode": "immediate",
            "transition": { "duration": 0 }
        }]
    });
    let steps: Vec<Value> = figure
        .frames
        .iter()
        .map(|f| {
            json!({
                "label": f.name,
                "method": "animate",
                "args": [[f.name], {
                    "mode": "immediate",
                    "frame": { "duration": 0, "redraw": true },
                    "transition": { "duration": 0 }
                }]
            })
        })
        .collect();

    figure.layout.insert(
        "updatemenus".into(),
        json!([{
            "type": "buttons",
            "direction": "left",
            "showactive": false,
            "x": 0.1, "y": 0, "xanchor": "right", "yanchor": "top",
            "pad": { "r": 10, "t": 70 },
            "buttons": [play, pause]
        }]),
    );
    figure.layout.insert(
        "sliders".into(),
        json!([{
            "active": 0,
            "currentvalue": { "prefix": format!("{frame_column}=") },
            "pad": { "b": 10, "t": 60 },
            "steps": steps
        }]),
    );
    figure.layout.insert(
        "transition".into(),
        json!({ "duration": ms, "easing": "cubic-in-out" }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Figure {
        Figure::new(vec![Trace::new(TraceKind::Scatter)
            .name("s")
            .x(vec![CellValue::Integer(1), CellValue::Integer(2)])
            .y(vec![CellValue::Float(0.5), CellValue::Null])
            .attr("mode", json!("lines+markers"))])
        .title("Sales </script> & more")
        .transition(500)
    }

    #[test]
    fn serialises_to_plotly_schema() {
        let v = sample().to_json();
        assert_eq!(v["data"][0]["type"], "scatter");
        assert_eq!(v["data"][0]["mode"], "lines+markers");
        assert_eq!(v["data"][0]["y"][1], Value::Null);
        assert_eq!(v["layout"]["transition"]["duration"], 500);
        assert!(v.get("frames").is_none());
    }

    #[test]
    fn html_export_is_a_complete_document() {
        let export = sample().export_html("simple line", "https://cdn.example/plotly.js");
        assert_eq!(export.file_name, "simple line.html");
        let html = String::from_utf8(export.bytes).unwrap();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<script src=\"https://cdn.example/plotly.js\"></script>"));
        assert!(html.contains("Plotly.newPlot(\"chart_simple_line\""));
        assert!(html.contains("<title>Sales &lt;/script&gt; &amp; more</title>"));
        assert!(!html.contains("Sales </script>"));
    }

    #[test]
    fn animation_controls_list_every_frame() {
        let mut fig = sample();
        fig.frames = vec![
            Frame { name: "2021".into(), data: vec![] },
            Frame { name: "2022".into(), data: vec![] },
        ];
        add_animation_controls(&mut fig, "year", 600);
        let v = fig.to_json();
        assert_eq!(v["layout"]["sliders"][0]["steps"].as_array().unwrap().len(), 2);
        assert_eq!(v["layout"]["sliders"][0]["currentvalue"]["prefix"], "year=");
        assert_eq!(v["frames"][1]["name"], "2022");
    }

    #[test]
    fn extend_layout_merges_objects() {
        let mut fig = sample().axis_titles("x", "y");
        fig.extend_layout("yaxis", json!({ "range": [0, 10] }));
        assert_eq!(fig.layout["yaxis"]["title"]["text"], "y");
        assert_eq!(fig.layout["yaxis"]["range"][1], 10);
    }
}
