use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Fixed value range the bin-width option is converted against.
pub const BIN_WIDTH_RANGE: f64 = 10.0;

/// Raw chart options as submitted by a form
///
/// Every field is optional text; a blank field counts as absent. The last
/// merged form of each chart kind is kept in the session as the prior for the
/// next submit, so fields the user leaves untouched keep their earlier value.
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq)]
#[serde(default)]
pub struct ChartForm {
    pub x_column: Option<String>,
    pub y_column: Option<String>,
    pub title: Option<String>,
    pub color: Option<String>,
    pub style: Option<String>,
    pub x_label: Option<String>,
    pub y_label: Option<String>,
    pub title_font_size: Option<String>,
    pub show_grid: Option<String>,
    pub show_legend: Option<String>,

    pub bar_mode: Option<String>,
    pub orientation: Option<String>,
    pub bar_width: Option<String>,
    pub opacity: Option<String>,

    pub show_boxpoints: Option<String>,

    pub num_bins: Option<String>,
    pub bin_width: Option<String>,

    pub line_width: Option<String>,
    pub legend_position: Option<String>,

    pub hole_size: Option<String>,
    pub label_position: Option<String>,

    pub marker_type: Option<String>,
    pub marker_size: Option<String>,
}

macro_rules! merge_fields {
    ($incoming:expr, $prior:expr, $($field:ident),+ $(,)?) => {
        ChartForm {
            $($field: pick(&$incoming.$field, &$prior.$field),)+
        }
    };
}

fn pick(incoming: &Option<String>, prior: &Option<String>) -> Option<String> {
    match text(incoming) {
        Some(value) => Some(value.to_string()),
        None => text(prior).map(str::to_string),
    }
}

impl ChartForm {
    /// Merge `self` over `prior` field by field; blank incoming fields keep
    /// the prior value.
    pub fn merged_over(&self, prior: &ChartForm) -> ChartForm {
        merge_fields!(
            self,
            prior,
            x_column,
            y_column,
            title,
            color,
            style,
            x_label,
            y_label,
            title_font_size,
            show_grid,
            show_legend,
            bar_mode,
            orientation,
            bar_width,
            opacity,
            show_boxpoints,
            num_bins,
            bin_width,
            line_width,
            legend_position,
            hole_size,
            label_position,
            marker_type,
            marker_size,
        )
    }
}

/// Trimmed, non-blank content of a form field.
pub fn text(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Parse a field, falling back to `default` when absent or malformed.
pub fn parse_or<T: FromStr>(value: &Option<String>, default: T) -> T {
    text(value).and_then(|v| v.parse().ok()).unwrap_or(default)
}

/// Toggle fields arrive as `yes`/`no` selects or checkbox `on`.
pub fn parse_flag(value: &Option<String>, default: bool) -> bool {
    match text(value).map(str::to_lowercase).as_deref() {
        Some("yes" | "true" | "on" | "1") => true,
        Some("no" | "false" | "off" | "0") => false,
        _ => default,
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BarMode {
    #[default]
    Group,
    Stack,
}

impl FromStr for BarMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "group" => Ok(BarMode::Group),
            "stack" => Ok(BarMode::Stack),
            _ => Err(()),
        }
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Vertical,
    Horizontal,
}

impl FromStr for Orientation {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "v" | "vertical" => Ok(Orientation::Vertical),
            "h" | "horizontal" => Ok(Orientation::Horizontal),
            _ => Err(()),
        }
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LegendPosition {
    #[default]
    Top,
    Bottom,
    Left,
    Right,
}

impl LegendPosition {
    /// Anchor of the legend box as fractions of the free space in the
    /// plotting area, `(0, 0)` being the top left corner.
    pub fn anchor(&self) -> (f64, f64) {
        match self {
            LegendPosition::Top => (0.5, 0.0),
            LegendPosition::Bottom => (0.5, 1.0),
            LegendPosition::Left => (0.0, 0.5),
            LegendPosition::Right => (1.0, 0.5),
        }
    }
}

impl FromStr for LegendPosition {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "top" => Ok(LegendPosition::Top),
            "bottom" => Ok(LegendPosition::Bottom),
            "left" => Ok(LegendPosition::Left),
            "right" => Ok(LegendPosition::Right),
            _ => Err(()),
        }
    }
}

/// Placement of pie slice labels
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LabelPosition {
    Inside,
    Outside,
    #[default]
    Auto,
}

impl FromStr for LabelPosition {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "inside" => Ok(LabelPosition::Inside),
            "outside" => Ok(LabelPosition::Outside),
            "auto" => Ok(LabelPosition::Auto),
            _ => Err(()),
        }
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum MarkerShape {
    #[default]
    Circle,
    Square,
    Diamond,
    Cross,
    X,
    TriangleUp,
}

impl FromStr for MarkerShape {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "circle" => Ok(MarkerShape::Circle),
            "square" => Ok(MarkerShape::Square),
            "diamond" => Ok(MarkerShape::Diamond),
            "cross" => Ok(MarkerShape::Cross),
            "x" => Ok(MarkerShape::X),
            "triangle-up" => Ok(MarkerShape::TriangleUp),
            _ => Err(()),
        }
    }
}

/// How a histogram splits its value range
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
pub enum Binning {
    /// Explicit bin count
    Count(usize),
    /// Explicit bin width, converted to a count over [`BIN_WIDTH_RANGE`]
    Width { width: f64, bins: usize },
    /// Sturges' rule over the number of values
    Auto,
}

impl Binning {
    /// Resolve the histogram fields: a valid bin count wins over a valid bin
    /// width, and neither means automatic binning.
    pub fn from_form(num_bins: &Option<String>, bin_width: &Option<String>) -> Binning {
        if let Some(n) = text(num_bins).and_then(|v| v.parse::<usize>().ok()) {
            if n >= 1 {
                return Binning::Count(n);
            }
        }
        if let Some(w) = text(bin_width).and_then(|v| v.parse::<f64>().ok()) {
            if w.is_finite() && w > 0.0 {
                let bins = (BIN_WIDTH_RANGE / w).ceil().max(1.0) as usize;
                return Binning::Width { width: w, bins };
            }
        }
        Binning::Auto
    }

    /// Number of bins for `n` values.
    pub fn bin_count(&self, n: usize) -> usize {
        match self {
            Binning::Count(bins) | Binning::Width { bins, .. } => *bins,
            Binning::Auto => {
                if n <= 1 {
                    1
                } else {
                    (n as f64).log2().ceil() as usize + 1
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn some(v: &str) -> Option<String> {
        Some(v.to_string())
    }

    #[test]
    fn blank_incoming_keeps_prior() {
        let prior = ChartForm {
            title: some("Sales"),
            color: some("#ff0000"),
            ..Default::default()
        };
        let incoming = ChartForm {
            title: some("   "),
            color: some("#00ff00"),
            ..Default::default()
        };
        let merged = incoming.merged_over(&prior);
        assert_eq!(merged.title.as_deref(), Some("Sales"));
        assert_eq!(merged.color.as_deref(), Some("#00ff00"));
        assert_eq!(merged.x_column, None);
    }

    #[test]
    fn malformed_numbers_fall_back() {
        assert_eq!(parse_or(&some("abc"), 5u32), 5);
        assert_eq!(parse_or(&some(" 7 "), 5u32), 7);
        assert_eq!(parse_or(&None, 0.8f64), 0.8);
        assert!(parse_flag(&some("yes"), false));
        assert!(!parse_flag(&some("maybe"), false));
    }

    #[test]
    fn bin_count_wins_over_width() {
        assert_eq!(
            Binning::from_form(&some("10"), &some("0.5")),
            Binning::Count(10)
        );
        assert_eq!(
            Binning::from_form(&None, &some("0.5")),
            Binning::Width { width: 0.5, bins: 20 }
        );
        assert_eq!(Binning::from_form(&some("0"), &some("-1")), Binning::Auto);
        assert_eq!(Binning::Auto.bin_count(100), 8);
        assert_eq!(Binning::from_form(&None, &some("3")).bin_count(1), 4);
    }

    #[test]
    fn legend_positions_differ() {
        let anchors: Vec<_> = [
            LegendPosition::Top,
            LegendPosition::Bottom,
            LegendPosition::Left,
            LegendPosition::Right,
        ]
        .iter()
        .map(|p| p.anchor())
        .collect();
        for (i, a) in anchors.iter().enumerate() {
            assert!(!anchors[i + 1..].contains(a));
        }
    }

    #[test]
    fn marker_names_parse() {
        assert_eq!("triangle-up".parse::<MarkerShape>(), Ok(MarkerShape::TriangleUp));
        assert_eq!("X".parse::<MarkerShape>(), Ok(MarkerShape::X));
        assert!("star".parse::<MarkerShape>().is_err());
    }
}
