use std::path::{Path, PathBuf};

use plotters::drawing::DrawingAreaErrorKind;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};

use crate::{Aggregate, Error, Metric, Parser, Result, Style};

const SIZE: (u32, u32) = (720, 400);
const BAR_HALF_HEIGHT: f64 = 0.4;
const X_LABEL: &str = "time in ms (lower is better)";

const BAR_GREEN: RGBColor = RGBColor(46, 184, 120);
const BAR_ORANGE: RGBColor = RGBColor(255, 128, 0);
const BAR_BLUE: RGBColor = RGBColor(31, 120, 181);

/// One bar of the comparison chart.
#[derive(Clone, Debug, PartialEq)]
pub struct Bar {
    pub parser: Parser,
    pub value: f64,
    pub stdev: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChartSpec<'a> {
    pub title: &'a str,
    pub bars: Vec<Bar>,
}

impl<'a> ChartSpec<'a> {
    pub fn new(title: &'a str, results: &[(Parser, Aggregate)], metric: Metric) -> Self {
        let bars = results
            .iter()
            .map(|(parser, agg)| Bar {
                parser: *parser,
                value: agg.value(metric),
                stdev: agg.stdev,
            })
            .collect();
        Self { title, bars }
    }

    /// Right edge of the x axis, with room for the value labels.
    fn x_max(&self) -> f64 {
        let widest = self
            .bars
            .iter()
            .map(|bar| bar.value + bar.stdev)
            .fold(0.0, f64::max);
        if widest > 0.0 {
            widest * 1.2
        } else {
            1.0
        }
    }
}

/// Visual theme of a single chart file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Theme {
    Analysis,
    Light,
    Dark,
}

struct ThemeColors {
    /// `None` leaves the page transparent.
    page: Option<RGBColor>,
    panel: Option<RGBColor>,
    grid: RGBColor,
    axis: RGBColor,
    text: RGBColor,
}

impl Theme {
    fn colors(self) -> ThemeColors {
        match self {
            Theme::Analysis => ThemeColors {
                page: Some(WHITE),
                panel: Some(RGBColor(234, 234, 242)),
                grid: WHITE,
                axis: RGBColor(80, 80, 80),
                text: RGBColor(51, 51, 51),
            },
            Theme::Light => ThemeColors {
                page: None,
                panel: None,
                grid: RGBColor(204, 204, 204),
                axis: BLACK,
                text: BLACK,
            },
            Theme::Dark => ThemeColors {
                page: None,
                panel: None,
                grid: RGBColor(72, 72, 72),
                axis: RGBColor(220, 220, 220),
                text: WHITE,
            },
        }
    }

    pub fn is_opaque(self) -> bool {
        self.colors().page.is_some()
    }
}

/// `<base>-<suffix>.svg` next to `out`.
pub fn variant_path(out: &Path, suffix: &str) -> PathBuf {
    let stem = out.file_stem().unwrap_or_default().to_string_lossy();
    out.with_file_name(format!("{}-{}.svg", stem, suffix))
}

/// Files a style produces, with the theme each one is drawn in.
pub fn targets(out: &Path, style: Style) -> Vec<(Theme, PathBuf)> {
    let light = || (Theme::Light, variant_path(out, "light"));
    let dark = || (Theme::Dark, variant_path(out, "dark"));

    match style {
        Style::Default => vec![(Theme::Analysis, out.to_path_buf())],
        Style::Light => vec![light()],
        Style::Dark => vec![dark()],
        Style::Both => vec![light(), dark()],
    }
}

/// Write every chart variant for `style` and return the paths written.
pub fn render(spec: &ChartSpec, out: &Path, style: Style) -> Result<Vec<PathBuf>> {
    targets(out, style)
        .into_iter()
        .map(|(theme, path)| {
            println!("Saving figure '{}'", path.display());
            draw(spec, theme, &path)?;
            Ok(path)
        })
        .collect()
}

fn bar_color(parser: Parser) -> RGBColor {
    match parser {
        Parser::Fast => BAR_GREEN,
        Parser::Rapid => BAR_ORANGE,
        Parser::Tiny => BAR_BLUE,
    }
}

/// Rows count up from the bottom, so the first parser takes the highest row.
fn row_of(parser: Parser) -> f64 {
    (Parser::ALL.len() - 1 - parser.index()) as f64
}

fn render_error<E: std::error::Error + Send + Sync>(err: DrawingAreaErrorKind<E>) -> Error {
    Error::Render(err.to_string())
}

fn draw(spec: &ChartSpec, theme: Theme, path: &Path) -> Result<()> {
    let palette = theme.colors();
    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    if let Some(page) = palette.page {
        root.fill(&page).map_err(render_error)?;
    }

    let rows = Parser::ALL.len() as f64;
    let mut chart = ChartBuilder::on(&root)
        .caption(spec.title, ("sans-serif", 22).into_font().color(&palette.text))
        .margin(16)
        .x_label_area_size(48)
        .y_label_area_size(120)
        .build_cartesian_2d(0f64..spec.x_max(), -0.5f64..rows - 0.5)
        .map_err(render_error)?;

    if let Some(panel) = palette.panel {
        chart.plotting_area().fill(&panel).map_err(render_error)?;
    }

    chart
        .configure_mesh()
        .disable_y_mesh()
        .y_labels(Parser::ALL.len())
        .y_label_formatter(&|_: &f64| String::new())
        .x_desc(X_LABEL)
        .axis_style(palette.axis.stroke_width(1))
        .bold_line_style(palette.grid.stroke_width(1))
        .light_line_style(TRANSPARENT.stroke_width(0))
        .label_style(("sans-serif", 14).into_font().color(&palette.text))
        .axis_desc_style(("sans-serif", 15).into_font().color(&palette.text))
        .draw()
        .map_err(render_error)?;

    // Parser names sit left of the plotting area, one per row
    let name_style = ("sans-serif", 14)
        .into_font()
        .color(&palette.text)
        .pos(Pos::new(HPos::Right, VPos::Center));
    for parser in Parser::ALL {
        let (x, y) = chart.backend_coord(&(0.0, row_of(parser)));
        root.draw(&Text::new(parser.label(), (x - 8, y), name_style.clone()))
            .map_err(render_error)?;
    }

    chart
        .draw_series(spec.bars.iter().map(|bar| {
            let y = row_of(bar.parser);
            Rectangle::new(
                [(0.0, y - BAR_HALF_HEIGHT), (bar.value, y + BAR_HALF_HEIGHT)],
                bar_color(bar.parser).filled(),
            )
        }))
        .map_err(render_error)?;

    chart
        .draw_series(spec.bars.iter().map(|bar| {
            ErrorBar::new_horizontal(
                row_of(bar.parser),
                (bar.value - bar.stdev).max(0.0),
                bar.value,
                bar.value + bar.stdev,
                palette.text.stroke_width(1),
                10,
            )
        }))
        .map_err(render_error)?;

    let value_style = ("sans-serif", 14)
        .into_font()
        .color(&palette.text)
        .pos(Pos::new(HPos::Left, VPos::Center));
    chart
        .draw_series(spec.bars.iter().map(|bar| {
            Text::new(
                format!(" {:.1}", bar.value),
                (bar.value + bar.stdev, row_of(bar.parser)),
                value_style.clone(),
            )
        }))
        .map_err(render_error)?;

    root.present().map_err(render_error)?;
    Ok(())
}
