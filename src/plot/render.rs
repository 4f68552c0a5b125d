use std::path::Path;

use anyhow::{Context, Result};
use image::{ImageFormat, Rgb, RgbImage};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters::style::FontStyle;

use crate::color;
use crate::config::FigureStyle;
use crate::pipeline::{AnalysisReport, Panel};

/// Half of the box width, in category units.
const BOX_HALF_WIDTH: f64 = 0.4;
/// Whisker caps span half the box.
const CAP_HALF_WIDTH: f64 = 0.2;
/// Bracket line width, in points.
const BRACKET_LINE_PT: f64 = 1.2;
/// White border kept around the content by the tight crop, in inches.
const TIGHT_PAD_IN: f64 = 0.1;

/// Render the report as a box-and-strip figure and write it as PNG.
///
/// The canvas is `width_in × height_in` at `dpi`, then cropped to its
/// content.
pub fn render_png(report: &AnalysisReport, style: &FigureStyle, path: &Path) -> Result<()> {
    let (width, height) = style.pixel_size();
    let mut buffer = vec![0u8; width as usize * height as usize * 3];
    draw(report, style, &mut buffer, (width, height))?;

    let canvas = RgbImage::from_raw(width, height, buffer)
        .context("bitmap buffer does not match the canvas size")?;
    let pad = (TIGHT_PAD_IN * style.dpi as f64).round() as u32;
    let image = crop_to_content(&canvas, pad);

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating output directory {}", dir.display()))?;
    }
    image
        .save_with_format(path, ImageFormat::Png)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

fn draw(
    report: &AnalysisReport,
    style: &FigureStyle,
    buffer: &mut [u8],
    size: (u32, u32),
) -> Result<()> {
    let root = BitMapBackend::with_buffer(buffer, size).into_drawing_area();
    root.fill(&WHITE)?;

    let areas = root.split_evenly((1, report.panels.len().max(1)));
    for (i, (area, panel)) in areas.iter().zip(&report.panels).enumerate() {
        draw_panel(area, panel, report.y_range, style, i == 0)?;
    }

    root.present()?;
    Ok(())
}

fn draw_panel(
    area: &DrawingArea<BitMapBackend<'_>, Shift>,
    panel: &Panel,
    (y_min, y_max): (f64, f64),
    style: &FigureStyle,
    first: bool,
) -> Result<()> {
    let px = |pt: f64| style.pt_to_px(pt);
    let line = |pt: f64| px(pt).round().max(1.0) as u32;

    let family = style.font_family.as_str();
    let tick_font = (family, px(style.tick_font)).into_font();
    let label_font = (family, px(style.label_font)).into_font();
    let title_font = (family, px(style.title_font))
        .into_font()
        .style(FontStyle::Bold);
    let marker_font = (family, px(style.marker_font))
        .into_font()
        .style(FontStyle::Bold)
        .color(&BLACK)
        .pos(Pos::new(HPos::Center, VPos::Bottom));

    let y_area = if first {
        px(style.tick_font) * 3.0 + px(style.label_font) * 1.5
    } else {
        px(style.tick_font)
    };

    let mut builder = ChartBuilder::on(area);
    builder
        .margin(px(8.0) as u32)
        .x_label_area_size((px(style.tick_font) * 1.8) as u32)
        .y_label_area_size(y_area as u32);
    if let Some(title) = &panel.title {
        builder.caption(title, title_font);
    }

    let n = panel.groups.len().max(1);
    let mut chart = builder
        .build_cartesian_2d(-0.5..(n as f64 - 0.5), y_min..y_max)?;

    let labels: Vec<&str> = panel.groups.iter().map(|g| g.label.as_str()).collect();
    let x_formatter = |v: &f64| {
        let idx = v.round();
        if (v - idx).abs() < 1e-6 && idx >= 0.0 {
            labels.get(idx as usize).map(|l| l.to_string()).unwrap_or_default()
        } else {
            String::new()
        }
    };
    let y_formatter = |v: &f64| if first { format!("{v:.1}") } else { String::new() };

    let mut mesh = chart.configure_mesh();
    mesh.disable_mesh()
        .x_labels(n + 1)
        .x_label_formatter(&x_formatter)
        .y_label_formatter(&y_formatter)
        .x_label_style(tick_font.clone())
        .y_label_style(tick_font)
        .axis_desc_style(label_font)
        .axis_style(BLACK.stroke_width(line(0.8)));
    if first {
        mesh.y_desc(style.y_label.as_str());
    }
    mesh.draw()?;

    let fills = color::fills(&style.fills, panel.groups.len());
    let edge = BLACK.stroke_width(line(style.box_line_width));
    let radius = (px(style.point_size) / 2.0).round().max(1.0) as i32;

    for (group, fill) in panel.groups.iter().zip(fills) {
        let x = group.position;
        if let Some(s) = &group.summary {
            let (left, right) = (x - BOX_HALF_WIDTH, x + BOX_HALF_WIDTH);
            let segments = vec![
                vec![(left, s.median), (right, s.median)],
                vec![(x, s.q1), (x, s.whisker_low)],
                vec![(x, s.q3), (x, s.whisker_high)],
                vec![(x - CAP_HALF_WIDTH, s.whisker_low), (x + CAP_HALF_WIDTH, s.whisker_low)],
                vec![(x - CAP_HALF_WIDTH, s.whisker_high), (x + CAP_HALF_WIDTH, s.whisker_high)],
            ];
            chart
                .draw_series(std::iter::once(Rectangle::new(
                    [(left, s.q3), (right, s.q1)],
                    fill.filled(),
                )))?;
            chart
                .draw_series(std::iter::once(Rectangle::new(
                    [(left, s.q3), (right, s.q1)],
                    edge,
                )))?;
            chart
                .draw_series(segments.into_iter().map(|pts| PathElement::new(pts, edge)))?;
        }

        chart
            .draw_series(
                group
                    .points
                    .iter()
                    .map(|&(jx, jy)| Circle::new((jx, jy), radius, BLACK.filled())),
            )?;
    }

    for annotation in &panel.annotations {
        if let Some(b) = &annotation.bracket {
            chart
                .draw_series(std::iter::once(PathElement::new(
                    vec![(b.x_start, b.y), (b.x_end, b.y)],
                    BLACK.stroke_width(line(BRACKET_LINE_PT)),
                )))?;
        }
        chart
            .draw_series(std::iter::once(Text::new(
                annotation.text.to_string(),
                (annotation.x, annotation.y),
                marker_font.clone(),
            )))?;
    }
    Ok(())
}

/// Crop to the bounding box of non-white pixels plus `pad` pixels of
/// margin. A blank canvas is returned unchanged.
pub fn crop_to_content(canvas: &RgbImage, pad: u32) -> RgbImage {
    let white = Rgb([255u8, 255, 255]);
    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for (x, y, pixel) in canvas.enumerate_pixels() {
        if *pixel == white {
            continue;
        }
        bounds = Some(match bounds {
            None => (x, y, x, y),
            Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        });
    }
    let Some((x0, y0, x1, y1)) = bounds else {
        return canvas.clone();
    };

    let left = x0.saturating_sub(pad);
    let top = y0.saturating_sub(pad);
    let right = (x1 + pad).min(canvas.width() - 1);
    let bottom = (y1 + pad).min(canvas.height() - 1);
    image::imageops::crop_imm(canvas, left, top, right - left + 1, bottom - top + 1).to_image()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crop_keeps_content_and_padding() {
        let mut canvas = RgbImage::from_pixel(100, 80, Rgb([255, 255, 255]));
        canvas.put_pixel(40, 30, Rgb([0, 0, 0]));
        canvas.put_pixel(60, 50, Rgb([0, 0, 0]));

        let cropped = crop_to_content(&canvas, 5);
        assert_eq!(cropped.dimensions(), (31, 31));
        assert_eq!(*cropped.get_pixel(5, 5), Rgb([0, 0, 0]));
        assert_eq!(*cropped.get_pixel(25, 25), Rgb([0, 0, 0]));
    }

    #[test]
    fn crop_clamps_to_canvas_edges() {
        let mut canvas = RgbImage::from_pixel(10, 10, Rgb([255, 255, 255]));
        canvas.put_pixel(0, 9, Rgb([10, 10, 10]));
        let cropped = crop_to_content(&canvas, 4);
        assert_eq!(cropped.dimensions(), (5, 5));
    }

    #[test]
    fn blank_canvas_is_untouched() {
        let canvas = RgbImage::from_pixel(8, 6, Rgb([255, 255, 255]));
        assert_eq!(crop_to_content(&canvas, 2).dimensions(), (8, 6));
    }
}
