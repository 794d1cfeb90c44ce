use super::ChartKind;
use super::options::{BarMode, Binning, LabelPosition, LegendPosition, MarkerShape, Orientation};
use super::style::Theme;
use crate::cell::CellValue;
use crate::error::PlotResult;
use serde::{Deserialize, Serialize};

/// Options that only one chart kind understands
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum KindOptions {
    Bar {
        mode: BarMode,
        orientation: Orientation,
        width: f64,
        opacity: f64,
    },
    Box {
        show_points: bool,
    },
    Histogram {
        binning: Binning,
    },
    Line {
        width: u32,
        legend: LegendPosition,
    },
    Pie {
        hole: f64,
        labels: LabelPosition,
    },
    Scatter {
        marker: MarkerShape,
        size: u32,
    },
}

/// Raw column values the chart is drawn from
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct ChartData {
    pub x: Vec<CellValue>,
    pub y: Vec<CellValue>,
}

/// Fully resolved description of one chart
///
/// Rendering is a pure function of this value, so a spec stored as JSON
/// redraws the same SVG later.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub x_column: String,
    pub y_column: Option<String>,
    pub title: String,
    pub style: Theme,
    pub color: String,
    pub x_label: String,
    pub y_label: String,
    pub title_font_size: u32,
    pub show_grid: bool,
    pub show_legend: bool,
    pub options: KindOptions,
    pub data: ChartData,
}

impl ChartSpec {
    pub fn to_json(&self) -> PlotResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> PlotResult<ChartSpec> {
        Ok(serde_json::from_str(text)?)
    }

    /// Label of the value series, for legends.
    pub fn series_name(&self) -> &str {
        self.y_column.as_deref().unwrap_or(&self.x_column)
    }
}
