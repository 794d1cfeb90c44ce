//! Chart builders.
//!
//! One generic [`build`] serves every chart kind. The per-kind differences (the
//! default title used when saving, whether a y column is required and how the
//! kind-specific form fields become typed options) live in a static table
//! indexed by [`ChartKind`].

pub mod options;
pub mod render;
pub mod spec;
pub mod style;

pub use options::ChartForm;
pub use spec::{ChartData, ChartSpec, KindOptions};

use crate::cell::CellValue;
use crate::error::{PlotError, PlotResult};
use crate::session::{CachedChart, SessionState};
use crate::table::{INDEX_COLUMN, TableSnapshot};
use log::info;
use options::{
    BarMode, Binning, LabelPosition, LegendPosition, MarkerShape, Orientation, parse_flag,
    parse_or, text,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use style::{DEFAULT_COLOR, Theme};

pub const DEFAULT_TITLE: &str = "Data Plot";
pub const DEFAULT_X_LABEL: &str = "x";
pub const DEFAULT_Y_LABEL: &str = "y";
pub const DEFAULT_TITLE_FONT_SIZE: u32 = 24;

/// The closed set of chart kinds
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Box,
    Histogram,
    Line,
    Pie,
    Scatter,
}

impl ChartKind {
    pub const ALL: [ChartKind; 6] = [
        ChartKind::Bar,
        ChartKind::Box,
        ChartKind::Histogram,
        ChartKind::Line,
        ChartKind::Pie,
        ChartKind::Scatter,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// URL and storage name of the kind.
    pub fn slug(&self) -> &'static str {
        match self {
            ChartKind::Bar => "bar",
            ChartKind::Box => "box",
            ChartKind::Histogram => "histogram",
            ChartKind::Line => "line",
            ChartKind::Pie => "pie",
            ChartKind::Scatter => "scatter",
        }
    }

    /// Title a saved chart gets when the user gives none.
    pub fn save_title(self) -> &'static str {
        entry(self).save_title
    }

    /// Whether the chart reads a y column.
    pub fn uses_y(self) -> bool {
        entry(self).y_column != YColumn::Unused
    }

    /// Whether the y column may be left out.
    pub fn y_optional(self) -> bool {
        entry(self).y_column == YColumn::Optional
    }
}

impl FromStr for ChartKind {
    type Err = PlotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChartKind::ALL
            .into_iter()
            .find(|k| k.slug() == s)
            .ok_or_else(|| PlotError::InvalidInput(format!("unknown chart type '{}'", s)))
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum YColumn {
    /// Defaults to the column after x
    Required,
    /// Only used when the form names one
    Optional,
    Unused,
}

struct KindEntry {
    save_title: &'static str,
    y_column: YColumn,
    options: fn(&ChartForm) -> KindOptions,
}

// Same order as the `ChartKind` variants.
static KINDS: [KindEntry; 6] = [
    KindEntry {
        save_title: "Bar Plot",
        y_column: YColumn::Required,
        options: bar_options,
    },
    KindEntry {
        save_title: "Box Plot",
        y_column: YColumn::Required,
        options: box_options,
    },
    KindEntry {
        save_title: "Histogram",
        y_column: YColumn::Unused,
        options: histogram_options,
    },
    KindEntry {
        save_title: "Line Plot",
        y_column: YColumn::Required,
        options: line_options,
    },
    KindEntry {
        save_title: "Pie Chart",
        y_column: YColumn::Optional,
        options: pie_options,
    },
    KindEntry {
        save_title: "Scatter Plot",
        y_column: YColumn::Required,
        options: scatter_options,
    },
];

fn entry(kind: ChartKind) -> &'static KindEntry {
    &KINDS[kind.index()]
}

fn bar_options(form: &ChartForm) -> KindOptions {
    let width: f64 = parse_or(&form.bar_width, 0.8);
    let opacity: f64 = parse_or(&form.opacity, 1.0);
    KindOptions::Bar {
        mode: parse_or(&form.bar_mode, BarMode::Group),
        orientation: parse_or(&form.orientation, Orientation::Vertical),
        width: if width.is_finite() && width > 0.0 { width } else { 0.8 },
        opacity: if (0.0..=1.0).contains(&opacity) { opacity } else { 1.0 },
    }
}

fn box_options(form: &ChartForm) -> KindOptions {
    KindOptions::Box {
        show_points: parse_flag(&form.show_boxpoints, false),
    }
}

fn histogram_options(form: &ChartForm) -> KindOptions {
    KindOptions::Histogram {
        binning: Binning::from_form(&form.num_bins, &form.bin_width),
    }
}

fn line_options(form: &ChartForm) -> KindOptions {
    let width = parse_or(&form.line_width, 2u32);
    KindOptions::Line {
        width: if width >= 1 { width } else { 2 },
        legend: parse_or(&form.legend_position, LegendPosition::Top),
    }
}

fn pie_options(form: &ChartForm) -> KindOptions {
    let hole: f64 = parse_or(&form.hole_size, 0.0);
    KindOptions::Pie {
        hole: if (0.0..1.0).contains(&hole) { hole } else { 0.0 },
        labels: parse_or(&form.label_position, LabelPosition::Auto),
    }
}

fn scatter_options(form: &ChartForm) -> KindOptions {
    let size = parse_or(&form.marker_size, 5u32);
    KindOptions::Scatter {
        marker: parse_or(&form.marker_type, MarkerShape::Circle),
        size: if size >= 1 { size } else { 5 },
    }
}

/// A freshly built chart and the merged form it was built from.
#[derive(Debug, Clone)]
pub struct BuiltChart {
    pub form: ChartForm,
    pub spec: ChartSpec,
    pub html: String,
}

/// Build a chart of `kind` from the dataset.
///
/// `incoming` is merged over `prior` field by field, and what is still missing
/// takes the first-use defaults. Unknown column names are errors; malformed
/// numeric options quietly fall back to their defaults.
///
/// # Arguments
/// * `kind` - Which chart to build
/// * `dataset` - The current dataset
/// * `incoming` - Options submitted with this request
/// * `prior` - Options merged on the previous submit of the same kind, if any
///
/// # Errors
/// * `EmptyDataset` if the dataset has no rows
/// * `ColumnNotFound` if a named column does not exist
/// * `Processing` if the chosen columns hold nothing plottable
pub fn build(
    kind: ChartKind,
    dataset: &TableSnapshot,
    incoming: &ChartForm,
    prior: Option<&ChartForm>,
) -> PlotResult<BuiltChart> {
    if dataset.is_empty() {
        return Err(PlotError::EmptyDataset);
    }
    let form = match prior {
        Some(prior) => incoming.merged_over(prior),
        None => incoming.merged_over(&ChartForm::default()),
    };
    let kind_entry = entry(kind);

    let (default_x, default_y) = default_columns(dataset);
    let x_column = text(&form.x_column)
        .map(str::to_string)
        .or(default_x)
        .ok_or_else(|| PlotError::Processing("the dataset has no columns to plot".into()))?;
    let y_column = match kind_entry.y_column {
        YColumn::Required => Some(
            text(&form.y_column)
                .map(str::to_string)
                .or(default_y)
                .unwrap_or_else(|| x_column.clone()),
        ),
        YColumn::Optional => text(&form.y_column).map(str::to_string),
        YColumn::Unused => None,
    };

    let x = plottable(dataset.column_values(&x_column)?);
    let y = match &y_column {
        Some(column) => plottable(dataset.column_values(column)?),
        None => Vec::new(),
    };

    let spec = ChartSpec {
        kind,
        x_column,
        y_column,
        title: text(&form.title).unwrap_or(DEFAULT_TITLE).to_string(),
        style: text(&form.style).map(Theme::from_name).unwrap_or_default(),
        color: text(&form.color)
            .filter(|c| style::parse_color(c).is_some())
            .unwrap_or(DEFAULT_COLOR)
            .to_string(),
        x_label: text(&form.x_label).unwrap_or(DEFAULT_X_LABEL).to_string(),
        y_label: text(&form.y_label).unwrap_or(DEFAULT_Y_LABEL).to_string(),
        title_font_size: match parse_or(&form.title_font_size, DEFAULT_TITLE_FONT_SIZE) {
            0 => DEFAULT_TITLE_FONT_SIZE,
            size => size.min(96),
        },
        show_grid: parse_flag(&form.show_grid, false),
        show_legend: parse_flag(&form.show_legend, false),
        options: (kind_entry.options)(&form),
        data: ChartData { x, y },
    };
    let html = render::to_html(&spec)?;

    Ok(BuiltChart { form, spec, html })
}

/// Build a chart and cache it in the session.
///
/// On success the merged form becomes the new prior of the kind and the
/// rendered chart replaces whatever was cached for it. On failure the session
/// is left as it was.
pub fn submit(
    session: &mut SessionState,
    kind: ChartKind,
    dataset: &TableSnapshot,
    incoming: &ChartForm,
) -> PlotResult<()> {
    let built = build(kind, dataset, incoming, session.charts[kind].prior.as_ref())?;
    let spec_json = built.spec.to_json()?;

    let slot = &mut session.charts[kind];
    slot.prior = Some(built.form);
    slot.cached = Some(CachedChart {
        spec_json,
        html: built.html,
    });
    info!("built {} chart", kind);
    Ok(())
}

/// First non-Index column, and the one after it.
pub fn default_columns(dataset: &TableSnapshot) -> (Option<String>, Option<String>) {
    let mut names = dataset
        .columns
        .iter()
        .map(|c| c.name.clone())
        .filter(|n| n != INDEX_COLUMN);
    let x = names.next();
    let y = names.next().or_else(|| x.clone());
    (x, y)
}

// JSON has no representation for infinities, so they are dropped to null.
fn plottable(values: Vec<CellValue>) -> Vec<CellValue> {
    values
        .into_iter()
        .map(|v| match v {
            CellValue::Float(f) if !f.is_finite() => CellValue::Null,
            other => other,
        })
        .collect()
}
