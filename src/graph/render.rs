//! SVG rendering of chart specs with plotters.
//!
//! Everything here is deterministic: the same spec always draws the same
//! bytes, which is what lets a saved spec be redrawn on the export page.

use super::options::{BarMode, Binning, LabelPosition, LegendPosition, MarkerShape, Orientation};
use super::spec::{ChartData, ChartSpec, KindOptions};
use super::style::{DEFAULT_COLOR, ThemePalette, parse_color, series_color};
use crate::cell::CellValue;
use crate::error::{PlotError, PlotResult};
use plotters::coord::Shift;
use plotters::coord::cartesian::Cartesian2d;
use plotters::coord::types::RangedCoordf64;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::f64::consts::PI;
use std::ops::Range;

pub const WIDTH: u32 = 800;
pub const HEIGHT: u32 = 500;

/// Upper bound on histogram bins, whatever the form asked for.
const MAX_BINS: usize = 500;

type Area<'a> = DrawingArea<SVGBackend<'a>, Shift>;
type Chart<'a, 'b> = ChartContext<'a, SVGBackend<'b>, Cartesian2d<RangedCoordf64, RangedCoordf64>>;

/// Render a chart as an HTML fragment: the inline SVG wrapped in a `div`
/// tagged with the chart kind.
pub fn to_html(spec: &ChartSpec) -> PlotResult<String> {
    Ok(format!(
        "<div class=\"chart chart-{}\">{}</div>",
        spec.kind.slug(),
        to_svg(spec)?
    ))
}

/// Render a chart as a standalone SVG document.
///
/// # Errors
/// * `Processing` if the chart data holds nothing plottable
pub fn to_svg(spec: &ChartSpec) -> PlotResult<String> {
    let pen = Pen {
        spec,
        palette: spec.style.palette(),
        color: parse_color(&spec.color)
            .or_else(|| parse_color(DEFAULT_COLOR))
            .unwrap_or(BLUE),
    };

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (WIDTH, HEIGHT)).into_drawing_area();
        root.fill(&pen.palette.background)?;

        match &spec.options {
            KindOptions::Bar {
                mode,
                orientation,
                width,
                opacity,
            } => pen.bar(&root, *mode, *orientation, *width, *opacity)?,
            KindOptions::Box { show_points } => pen.boxes(&root, *show_points)?,
            KindOptions::Histogram { binning } => pen.histogram(&root, *binning)?,
            KindOptions::Line { width, legend } => pen.line(&root, *width, *legend)?,
            KindOptions::Pie { hole, labels } => pen.pie(&root, *hole, *labels)?,
            KindOptions::Scatter { marker, size } => pen.scatter(&root, *marker, *size)?,
        }

        root.present()?;
    }
    Ok(svg)
}

struct Pen<'s> {
    spec: &'s ChartSpec,
    palette: ThemePalette,
    color: RGBColor,
}

impl Pen<'_> {
    fn font(&self, size: f64) -> TextStyle<'static> {
        ("sans-serif", size).into_font().color(&self.palette.text)
    }

    fn cartesian<'a, 'b>(
        &self,
        root: &'a Area<'b>,
        x: Range<f64>,
        y: Range<f64>,
        y_label_area: u32,
    ) -> PlotResult<Chart<'a, 'b>> {
        let chart = ChartBuilder::on(root)
            .caption(
                clean(&self.spec.title),
                self.font(self.spec.title_font_size as f64),
            )
            .margin(15)
            .x_label_area_size(45)
            .y_label_area_size(y_label_area)
            .build_cartesian_2d(x, y)?;
        chart.plotting_area().fill(&self.palette.plot)?;
        Ok(chart)
    }

    fn mesh(
        &self,
        chart: &mut Chart<'_, '_>,
        x_desc: &str,
        y_desc: &str,
        x_categories: Option<&[String]>,
        y_categories: Option<&[String]>,
    ) -> PlotResult<()> {
        let x_fmt = |v: &f64| category_label(x_categories, *v);
        let y_fmt = |v: &f64| category_label(y_categories, *v);

        let mut mesh = chart.configure_mesh();
        mesh.x_desc(clean(x_desc))
            .y_desc(clean(y_desc))
            .axis_desc_style(self.font(15.0))
            .label_style(self.font(12.0))
            .axis_style(self.palette.axis.stroke_width(1))
            .bold_line_style(self.palette.grid.stroke_width(1))
            .light_line_style(self.palette.grid.mix(0.3).stroke_width(1));
        if let Some(labels) = x_categories {
            mesh.x_labels(labels.len().clamp(1, 40))
                .x_label_formatter(&x_fmt);
        }
        if let Some(labels) = y_categories {
            mesh.y_labels(labels.len().clamp(1, 40))
                .y_label_formatter(&y_fmt);
        }
        if !self.spec.show_grid {
            mesh.disable_mesh();
        }
        mesh.draw()?;
        Ok(())
    }

    fn legend<'a, 'b: 'a>(&self, chart: &mut Chart<'a, 'b>, position: LegendPosition) -> PlotResult<()> {
        if !self.spec.show_legend {
            return Ok(());
        }
        let (w, h) = chart.plotting_area().dim_in_pixel();
        let box_w = 40 + 7 * clean(self.spec.series_name()).chars().count() as i32;
        let box_h = 26;
        let (fx, fy) = position.anchor();
        let x = 5 + (fx * (w as i32 - box_w - 10).max(0) as f64) as i32;
        let y = 5 + (fy * (h as i32 - box_h - 10).max(0) as f64) as i32;

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::Coordinate(x, y))
            .background_style(self.palette.background.mix(0.85).filled())
            .border_style(self.palette.axis.stroke_width(1))
            .label_font(self.font(13.0))
            .draw()?;
        Ok(())
    }

    fn bar(
        &self,
        root: &Area<'_>,
        mode: BarMode,
        orientation: Orientation,
        width: f64,
        opacity: f64,
    ) -> PlotResult<()> {
        let (labels, groups) = grouped(&self.spec.data);
        if labels.is_empty() {
            return Err(no_data(self.spec.series_name()));
        }

        // (left, right, base, top) in category/value space
        let mut bars: Vec<(f64, f64, f64, f64)> = Vec::new();
        for (i, values) in groups.iter().enumerate() {
            let left = i as f64 - width / 2.0;
            match mode {
                BarMode::Stack => {
                    let (mut up, mut down) = (0.0, 0.0);
                    for &v in values {
                        let (base, top) = if v >= 0.0 {
                            up += v;
                            (up - v, up)
                        } else {
                            down += v;
                            (down - v, down)
                        };
                        bars.push((left, left + width, base, top));
                    }
                }
                BarMode::Group => {
                    let w = width / values.len() as f64;
                    for (k, &v) in values.iter().enumerate() {
                        let l = left + k as f64 * w;
                        bars.push((l, l + w, 0.0, v));
                    }
                }
            }
        }

        let values = span(bars.iter().flat_map(|b| [b.2, b.3]).chain([0.0]));
        let half = width.max(1.0) / 2.0;
        let categories = -half..(labels.len() - 1) as f64 + half;
        let horizontal = orientation == Orientation::Horizontal;
        let style = self.color.mix(opacity).filled();

        let mut chart = if horizontal {
            let mut chart = self.cartesian(root, values, categories, 110)?;
            self.mesh(
                &mut chart,
                &self.spec.y_label,
                &self.spec.x_label,
                None,
                Some(&labels),
            )?;
            chart
        } else {
            let mut chart = self.cartesian(root, categories, values, 70)?;
            self.mesh(
                &mut chart,
                &self.spec.x_label,
                &self.spec.y_label,
                Some(&labels),
                None,
            )?;
            chart
        };

        chart
            .draw_series(bars.iter().map(|&(l, r, base, top)| {
                let corners = if horizontal {
                    [(base, l), (top, r)]
                } else {
                    [(l, base), (r, top)]
                };
                Rectangle::new(corners, style)
            }))?
            .label(clean(self.spec.series_name()))
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 12, y + 5)], style));

        self.legend(&mut chart, LegendPosition::Right)
    }

    fn boxes(&self, root: &Area<'_>, show_points: bool) -> PlotResult<()> {
        let (labels, mut groups) = grouped(&self.spec.data);
        if labels.is_empty() {
            return Err(no_data(self.spec.series_name()));
        }
        for group in groups.iter_mut() {
            group.sort_by(f64::total_cmp);
        }

        let values = span(groups.iter().flatten().copied());
        let categories = -0.5..labels.len() as f64 - 0.5;
        let mut chart = self.cartesian(root, categories, values, 70)?;
        self.mesh(
            &mut chart,
            &self.spec.x_label,
            &self.spec.y_label,
            Some(&labels),
            None,
        )?;

        let stats: Vec<BoxStats> = groups.iter().map(|g| BoxStats::of(g)).collect();
        let fill = self.color.mix(0.3).filled();
        let stroke = self.color.stroke_width(2);
        let half = 0.25;

        chart
            .draw_series(stats.iter().enumerate().map(|(i, s)| {
                let c = i as f64;
                Rectangle::new([(c - half, s.q1), (c + half, s.q3)], fill)
            }))?
            .label(clean(self.spec.series_name()))
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 12, y + 5)], fill));
        chart.draw_series(stats.iter().enumerate().map(|(i, s)| {
            let c = i as f64;
            Rectangle::new([(c - half, s.q1), (c + half, s.q3)], stroke)
        }))?;
        chart.draw_series(stats.iter().enumerate().flat_map(|(i, s)| {
            let c = i as f64;
            let cap = half / 2.0;
            [
                PathElement::new(vec![(c - half, s.median), (c + half, s.median)], stroke),
                PathElement::new(vec![(c, s.q3), (c, s.upper)], stroke),
                PathElement::new(vec![(c, s.q1), (c, s.lower)], stroke),
                PathElement::new(vec![(c - cap, s.upper), (c + cap, s.upper)], stroke),
                PathElement::new(vec![(c - cap, s.lower), (c + cap, s.lower)], stroke),
            ]
        }))?;

        if show_points {
            let dot = self.color.mix(0.7).filled();
            chart.draw_series(groups.iter().enumerate().flat_map(|(i, g)| {
                g.iter()
                    .enumerate()
                    .map(move |(k, &v)| Circle::new((i as f64 - 0.38 + jitter(k), v), 3, dot))
            }))?;
        }

        self.legend(&mut chart, LegendPosition::Right)
    }

    fn histogram(&self, root: &Area<'_>, binning: Binning) -> PlotResult<()> {
        let values: Vec<f64> = self
            .spec
            .data
            .x
            .iter()
            .filter_map(CellValue::as_f64)
            .filter(|v| v.is_finite())
            .collect();
        if values.is_empty() {
            return Err(no_data(&self.spec.x_column));
        }

        let bins = binning.bin_count(values.len()).clamp(1, MAX_BINS);
        let (lo, hi) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        let (lo, hi) = if hi > lo { (lo, hi) } else { (lo - 0.5, hi + 0.5) };
        let width = (hi - lo) / bins as f64;

        let mut counts = vec![0usize; bins];
        for v in &values {
            let i = (((v - lo) / width).floor() as usize).min(bins - 1);
            counts[i] += 1;
        }
        let tallest = counts.iter().copied().max().unwrap_or(1) as f64;

        let mut chart = self.cartesian(root, lo..hi, 0.0..tallest * 1.1, 70)?;
        self.mesh(&mut chart, &self.spec.x_label, &self.spec.y_label, None, None)?;

        let fill = self.color.filled();
        let edge = self.palette.background.stroke_width(1);
        let rect = |i: usize, n: usize| {
            let l = lo + i as f64 * width;
            [(l, 0.0), (l + width, n as f64)]
        };
        chart
            .draw_series(
                counts
                    .iter()
                    .enumerate()
                    .map(|(i, &n)| Rectangle::new(rect(i, n), fill)),
            )?
            .label(clean(&self.spec.x_column))
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 12, y + 5)], fill));
        chart.draw_series(
            counts
                .iter()
                .enumerate()
                .map(|(i, &n)| Rectangle::new(rect(i, n), edge)),
        )?;

        self.legend(&mut chart, LegendPosition::Right)
    }

    fn line(&self, root: &Area<'_>, width: u32, position: LegendPosition) -> PlotResult<()> {
        let (points, categories) = points(&self.spec.data);
        if points.is_empty() {
            return Err(no_data(self.spec.series_name()));
        }

        let mut chart = self.xy_chart(root, &points, categories.as_deref())?;
        let stroke = self.color.stroke_width(width.max(1));
        chart
            .draw_series(LineSeries::new(points.iter().copied(), stroke))?
            .label(clean(self.spec.series_name()))
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 16, y)], stroke));

        self.legend(&mut chart, position)
    }

    fn scatter(&self, root: &Area<'_>, marker: MarkerShape, size: u32) -> PlotResult<()> {
        let (points, categories) = points(&self.spec.data);
        if points.is_empty() {
            return Err(no_data(self.spec.series_name()));
        }

        let mut chart = self.xy_chart(root, &points, categories.as_deref())?;
        let s = size.clamp(1, 50) as i32;
        let fill = self.color.filled();
        let stroke = self.color.stroke_width(2);

        let series = match marker {
            MarkerShape::Circle => {
                chart.draw_series(points.iter().map(|&p| Circle::new(p, s, fill)))?
            }
            MarkerShape::Square => chart.draw_series(points.iter().map(|&p| {
                EmptyElement::at(p) + Rectangle::new([(-s, -s), (s, s)], fill)
            }))?,
            MarkerShape::Diamond => chart.draw_series(points.iter().map(|&p| {
                EmptyElement::at(p) + Polygon::new(vec![(0, -s), (s, 0), (0, s), (-s, 0)], fill)
            }))?,
            MarkerShape::TriangleUp => chart.draw_series(points.iter().map(|&p| {
                EmptyElement::at(p) + Polygon::new(vec![(0, -s), (s, s), (-s, s)], fill)
            }))?,
            MarkerShape::Cross => chart.draw_series(points.iter().map(|&p| {
                EmptyElement::at(p)
                    + PathElement::new(vec![(-s, 0), (s, 0)], stroke)
                    + PathElement::new(vec![(0, -s), (0, s)], stroke)
            }))?,
            MarkerShape::X => chart.draw_series(points.iter().map(|&p| {
                EmptyElement::at(p)
                    + PathElement::new(vec![(-s, -s), (s, s)], stroke)
                    + PathElement::new(vec![(-s, s), (s, -s)], stroke)
            }))?,
        };
        series
            .label(clean(self.spec.series_name()))
            .legend(move |(x, y)| Circle::new((x + 6, y), 4, fill));

        self.legend(&mut chart, LegendPosition::Right)
    }

    fn xy_chart<'a, 'b>(
        &self,
        root: &'a Area<'b>,
        points: &[(f64, f64)],
        categories: Option<&[String]>,
    ) -> PlotResult<Chart<'a, 'b>> {
        let x = match categories {
            Some(labels) => -0.5..labels.len() as f64 - 0.5,
            None => span(points.iter().map(|p| p.0)),
        };
        let y = span(points.iter().map(|p| p.1));
        let mut chart = self.cartesian(root, x, y, 70)?;
        self.mesh(
            &mut chart,
            &self.spec.x_label,
            &self.spec.y_label,
            categories,
            None,
        )?;
        Ok(chart)
    }

    fn pie(&self, root: &Area<'_>, hole: f64, labels: LabelPosition) -> PlotResult<()> {
        let slices = pie_slices(&self.spec.data);
        let total: f64 = slices.iter().map(|s| s.1).sum();
        if slices.is_empty() || total <= 0.0 {
            return Err(no_data(self.spec.series_name()));
        }

        let area = root.titled(
            &clean(&self.spec.title),
            self.font(self.spec.title_font_size as f64),
        )?;
        let (w, h) = area.dim_in_pixel();
        let legend_w = if self.spec.show_legend { 180 } else { 0 };
        let cx = (w as i32 - legend_w) / 2;
        let cy = h as i32 / 2;
        let radius = (cx.min(cy) as f64 * 0.75).max(10.0);
        let inner = radius * hole.clamp(0.0, 0.95);
        let at = |r: f64, a: f64| {
            (
                cx + (r * a.cos()).round() as i32,
                cy + (r * a.sin()).round() as i32,
            )
        };

        let mut start = -PI / 2.0;
        for (i, (_, value)) in slices.iter().enumerate() {
            let sweep = value / total * 2.0 * PI;
            let steps = ((sweep / 0.05).ceil() as usize).max(2);
            let angle = |k: usize| start + sweep * k as f64 / steps as f64;

            let mut outline: Vec<(i32, i32)> = (0..=steps).map(|k| at(radius, angle(k))).collect();
            if inner > 0.0 {
                outline.extend((0..=steps).rev().map(|k| at(inner, angle(k))));
            } else {
                outline.push((cx, cy));
            }
            let color = series_color(i, self.color);
            area.draw(&Polygon::new(outline, color.filled()))?;

            let share = value / total * 100.0;
            let inside = match labels {
                LabelPosition::Inside => true,
                LabelPosition::Outside => false,
                LabelPosition::Auto => share >= 5.0,
            };
            let (r, style) = if inside {
                (
                    (radius + inner) / 2.0,
                    ("sans-serif", 13.0).into_font().color(&contrast(color)),
                )
            } else {
                (radius + 20.0, self.font(13.0))
            };
            area.draw(&Text::new(
                format!("{:.1}%", share),
                at(r, start + sweep / 2.0),
                style.pos(Pos::new(HPos::Center, VPos::Center)),
            ))?;

            start += sweep;
        }

        if self.spec.show_legend {
            let lx = w as i32 - legend_w + 10;
            for (i, (label, _)) in slices.iter().enumerate() {
                let ly = 20 + i as i32 * 20;
                let color = series_color(i, self.color);
                area.draw(&Rectangle::new([(lx, ly), (lx + 12, ly + 12)], color.filled()))?;
                area.draw(&Text::new(clean(label), (lx + 18, ly), self.font(13.0)))?;
            }
        }
        Ok(())
    }
}

struct BoxStats {
    q1: f64,
    median: f64,
    q3: f64,
    lower: f64,
    upper: f64,
}

impl BoxStats {
    /// Quartiles and 1.5 IQR whiskers of sorted, non-empty values.
    fn of(sorted: &[f64]) -> BoxStats {
        let q1 = quantile(sorted, 0.25);
        let q3 = quantile(sorted, 0.75);
        let fence = 1.5 * (q3 - q1);
        BoxStats {
            q1,
            median: quantile(sorted, 0.5),
            q3,
            lower: sorted.iter().copied().find(|v| *v >= q1 - fence).unwrap_or(q1),
            upper: sorted
                .iter()
                .rev()
                .copied()
                .find(|v| *v <= q3 + fence)
                .unwrap_or(q3),
        }
    }
}

/// Linearly interpolated quantile of sorted, non-empty values.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Numeric y values grouped by the display text of x, in first-appearance
/// order of x.
fn grouped(data: &ChartData) -> (Vec<String>, Vec<Vec<f64>>) {
    let mut labels: Vec<String> = Vec::new();
    let mut groups: Vec<Vec<f64>> = Vec::new();
    for (x, y) in data.x.iter().zip(&data.y) {
        let Some(v) = y.as_f64().filter(|v| v.is_finite()) else {
            continue;
        };
        if x.is_null() {
            continue;
        }
        let label = x.display();
        match labels.iter().position(|l| *l == label) {
            Some(i) => groups[i].push(v),
            None => {
                labels.push(label);
                groups.push(vec![v]);
            }
        }
    }
    (labels, groups)
}

/// Points of an x/y chart. A numeric x axis is used as is; any other x is
/// mapped to category positions, returned alongside.
fn points(data: &ChartData) -> (Vec<(f64, f64)>, Option<Vec<String>>) {
    let numeric_x = data
        .x
        .iter()
        .filter(|v| !v.is_null())
        .all(|v| v.as_f64().is_some());

    if numeric_x {
        let points = data
            .x
            .iter()
            .zip(&data.y)
            .filter_map(|(x, y)| Some((x.as_f64()?, y.as_f64()?)))
            .filter(|(x, y)| x.is_finite() && y.is_finite())
            .collect();
        return (points, None);
    }

    let mut labels: Vec<String> = Vec::new();
    let mut points = Vec::new();
    for (x, y) in data.x.iter().zip(&data.y) {
        let Some(v) = y.as_f64().filter(|v| v.is_finite()) else {
            continue;
        };
        if x.is_null() {
            continue;
        }
        let label = x.display();
        let pos = match labels.iter().position(|l| *l == label) {
            Some(i) => i,
            None => {
                labels.push(label);
                labels.len() - 1
            }
        };
        points.push((pos as f64, v));
    }
    (points, Some(labels))
}

/// Pie slices: summed y per x label, or row counts when there is no y.
/// Largest slice first; equal slices keep first-appearance order.
fn pie_slices(data: &ChartData) -> Vec<(String, f64)> {
    let mut slices: Vec<(String, f64)> = Vec::new();
    for (i, x) in data.x.iter().enumerate() {
        if x.is_null() {
            continue;
        }
        let amount = if data.y.is_empty() {
            1.0
        } else {
            match data.y.get(i).and_then(CellValue::as_f64) {
                Some(v) if v.is_finite() => v,
                _ => continue,
            }
        };
        let label = x.display();
        match slices.iter_mut().find(|(l, _)| *l == label) {
            Some(slice) => slice.1 += amount,
            None => slices.push((label, amount)),
        }
    }
    slices.retain(|(_, v)| *v > 0.0);
    slices.sort_by(|a, b| b.1.total_cmp(&a.1));
    slices
}

fn span(values: impl Iterator<Item = f64>) -> Range<f64> {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if !lo.is_finite() || !hi.is_finite() {
        return 0.0..1.0;
    }
    if hi - lo < 1e-9 {
        return lo - 1.0..hi + 1.0;
    }
    let pad = (hi - lo) * 0.05;
    lo - pad..hi + pad
}

fn category_label(categories: Option<&[String]>, v: f64) -> String {
    let Some(labels) = categories else {
        return format!("{}", v);
    };
    let i = v.round();
    if (v - i).abs() > 1e-6 || i < 0.0 {
        return String::new();
    }
    labels.get(i as usize).map(|l| clean(l)).unwrap_or_default()
}

fn jitter(k: usize) -> f64 {
    ((k * 37) % 11) as f64 / 10.0 * 0.12
}

fn contrast(color: RGBColor) -> RGBColor {
    let RGBColor(r, g, b) = color;
    let luma = 0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64;
    if luma > 150.0 { BLACK } else { WHITE }
}

// Markup characters never reach the SVG text nodes.
fn clean(text: &str) -> String {
    text.replace(['<', '>'], "")
}

fn no_data(column: &str) -> PlotError {
    PlotError::Processing(format!("no numeric values to plot in column '{}'", column))
}
