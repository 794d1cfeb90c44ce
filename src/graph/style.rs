use plotters::style::RGBColor;
use serde::{Deserialize, Serialize};

/// Plotly's qualitative palette, used for pie slices and as the default trace
/// color.
pub const SERIES_COLORS: [RGBColor; 10] = [
    RGBColor(0x63, 0x6e, 0xfa),
    RGBColor(0xef, 0x55, 0x3b),
    RGBColor(0x00, 0xcc, 0x96),
    RGBColor(0xab, 0x63, 0xfa),
    RGBColor(0xff, 0xa1, 0x5a),
    RGBColor(0x19, 0xd3, 0xf3),
    RGBColor(0xff, 0x66, 0x92),
    RGBColor(0xb6, 0xe8, 0x80),
    RGBColor(0xff, 0x97, 0xff),
    RGBColor(0xfe, 0xcb, 0x52),
];

pub const DEFAULT_COLOR: &str = "#636efa";

/// Named chart theme
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    #[default]
    Plotly,
    PlotlyWhite,
    PlotlyDark,
    Ggplot2,
    Seaborn,
    SimpleWhite,
}

/// Colors a theme paints with
#[derive(Clone, Copy, Debug)]
pub struct ThemePalette {
    pub background: RGBColor,
    pub plot: RGBColor,
    pub grid: RGBColor,
    pub axis: RGBColor,
    pub text: RGBColor,
}

impl Theme {
    pub const ALL: [Theme; 6] = [
        Theme::Plotly,
        Theme::PlotlyWhite,
        Theme::PlotlyDark,
        Theme::Ggplot2,
        Theme::Seaborn,
        Theme::SimpleWhite,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Theme::Plotly => "plotly",
            Theme::PlotlyWhite => "plotly_white",
            Theme::PlotlyDark => "plotly_dark",
            Theme::Ggplot2 => "ggplot2",
            Theme::Seaborn => "seaborn",
            Theme::SimpleWhite => "simple_white",
        }
    }

    /// Unknown names fall back to the default theme.
    pub fn from_name(name: &str) -> Theme {
        let name = name.trim().to_lowercase();
        Theme::ALL
            .into_iter()
            .find(|t| t.name() == name)
            .unwrap_or_default()
    }

    pub fn palette(&self) -> ThemePalette {
        match self {
            Theme::Plotly => ThemePalette {
                background: RGBColor(255, 255, 255),
                plot: RGBColor(0xe5, 0xec, 0xf6),
                grid: RGBColor(255, 255, 255),
                axis: RGBColor(0x44, 0x44, 0x44),
                text: RGBColor(0x2a, 0x3f, 0x5f),
            },
            Theme::PlotlyWhite => ThemePalette {
                background: RGBColor(255, 255, 255),
                plot: RGBColor(255, 255, 255),
                grid: RGBColor(0xeb, 0xf0, 0xf8),
                axis: RGBColor(0x44, 0x44, 0x44),
                text: RGBColor(0x2a, 0x3f, 0x5f),
            },
            Theme::PlotlyDark => ThemePalette {
                background: RGBColor(0x11, 0x11, 0x11),
                plot: RGBColor(0x11, 0x11, 0x11),
                grid: RGBColor(0x28, 0x34, 0x42),
                axis: RGBColor(0xa0, 0xa0, 0xa0),
                text: RGBColor(0xf2, 0xf5, 0xfa),
            },
            Theme::Ggplot2 => ThemePalette {
                background: RGBColor(255, 255, 255),
                plot: RGBColor(0xeb, 0xeb, 0xeb),
                grid: RGBColor(255, 255, 255),
                axis: RGBColor(0x33, 0x33, 0x33),
                text: RGBColor(0x33, 0x33, 0x33),
            },
            Theme::Seaborn => ThemePalette {
                background: RGBColor(255, 255, 255),
                plot: RGBColor(0xea, 0xea, 0xf2),
                grid: RGBColor(255, 255, 255),
                axis: RGBColor(0x36, 0x36, 0x36),
                text: RGBColor(0x36, 0x36, 0x36),
            },
            Theme::SimpleWhite => ThemePalette {
                background: RGBColor(255, 255, 255),
                plot: RGBColor(255, 255, 255),
                grid: RGBColor(0xdd, 0xdd, 0xdd),
                axis: RGBColor(0, 0, 0),
                text: RGBColor(0x44, 0x44, 0x44),
            },
        }
    }
}

/// Parse `#rrggbb`, `#rgb` or one of a handful of color names.
pub fn parse_color(text: &str) -> Option<RGBColor> {
    let text = text.trim().to_lowercase();
    let named = match text.as_str() {
        "blue" => Some(RGBColor(0x1f, 0x77, 0xb4)),
        "red" => Some(RGBColor(0xd6, 0x27, 0x28)),
        "green" => Some(RGBColor(0x2c, 0xa0, 0x2c)),
        "orange" => Some(RGBColor(0xff, 0x7f, 0x0e)),
        "purple" => Some(RGBColor(0x94, 0x67, 0xbd)),
        "black" => Some(RGBColor(0, 0, 0)),
        "gray" | "grey" => Some(RGBColor(0x7f, 0x7f, 0x7f)),
        _ => None,
    };
    if named.is_some() {
        return named;
    }

    let hex = text.strip_prefix('#')?;
    let expanded: String = match hex.len() {
        3 => hex.chars().flat_map(|c| [c, c]).collect(),
        6 => hex.to_string(),
        _ => return None,
    };
    let channel = |i: usize| u8::from_str_radix(&expanded[i..i + 2], 16).ok();
    Some(RGBColor(channel(0)?, channel(2)?, channel(4)?))
}

/// Color of the `i`-th slice or series, starting from the chosen color.
pub fn series_color(i: usize, base: RGBColor) -> RGBColor {
    if i == 0 {
        base
    } else {
        SERIES_COLORS[i % SERIES_COLORS.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_and_names() {
        assert_eq!(parse_color("#ff0000"), Some(RGBColor(255, 0, 0)));
        assert_eq!(parse_color("#0F0"), Some(RGBColor(0, 255, 0)));
        assert_eq!(parse_color("Red"), Some(RGBColor(0xd6, 0x27, 0x28)));
        assert_eq!(parse_color("#12345"), None);
        assert_eq!(parse_color("#zzzzzz"), None);
    }

    #[test]
    fn unknown_theme_is_plotly() {
        assert_eq!(Theme::from_name("ggplot2"), Theme::Ggplot2);
        assert_eq!(Theme::from_name(" Plotly_Dark "), Theme::PlotlyDark);
        assert_eq!(Theme::from_name("solarized"), Theme::Plotly);
    }
}
