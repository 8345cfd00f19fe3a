use image::{Rgba, RgbaImage};
use rayon::prelude::*;
use std::f64::consts::{PI, TAU};

use super::font::{glyph, text_width, GLYPH_HEIGHT, GLYPH_WIDTH};
use super::Frame;
use crate::color::Rgb;
use crate::geometry::{polar_to_xy, Rect};
use crate::scene::{ArcGeom, AreaGeom, ChordGeom, SceneNode};

const MAX_ARC_STEP: f64 = 0.01;
const MAX_ARC_SAMPLES: usize = 20_000;
const BEZIER_SAMPLES: usize = 16;

type Edge = (f64, f64, f64, f64);

/// A filled polygon in screen space, even-odd rule.
struct Shape {
    edges: Vec<Edge>,
    bbox: Rect,
    color: Rgb,
    alpha: f64,
}

impl Shape {
    fn new(points: &[(f64, f64)], color: Rgb, alpha: f64) -> Option<Self> {
        if points.len() < 3 {
            return None;
        }
        let bbox = Rect::from_points(points.iter().copied())?;
        let edges = points
            .iter()
            .zip(points.iter().cycle().skip(1))
            .map(|(&(x0, y0), &(x1, y1))| (x0, y0, x1, y1))
            .collect();
        Some(Self { edges, bbox, color, alpha })
    }

    /// Sorted x positions where the row `y` crosses the outline.
    fn crossings(&self, y: f64, xs: &mut Vec<f64>) {
        xs.clear();
        for &(x0, y0, x1, y1) in &self.edges {
            if (y0 <= y) != (y1 <= y) {
                xs.push(x0 + (y - y0) * (x1 - x0) / (y1 - y0));
            }
        }
        xs.sort_by(f64::total_cmp);
    }
}

struct Label {
    text: String,
    x: f64,
    y: f64,
    color: Rgb,
}

/// Scene flattened into screen-space polygons and text runs.
struct Flattener<'a> {
    frame: &'a Frame,
    shapes: Vec<Shape>,
    labels: Vec<Label>,
}

impl<'a> Flattener<'a> {
    fn screen(&self, angle: f64, radius: f64) -> (f64, f64) {
        self.frame
            .view
            .to_screen(polar_to_xy(angle, radius), &self.frame.viewport)
    }

    /// Points along an arc, dense enough that chords stay under a pixel.
    fn arc_points(&self, a0: f64, a1: f64, radius: f64, out: &mut Vec<(f64, f64)>) {
        let screen_radius = (radius * self.frame.view.scale).max(1.0);
        let step = MAX_ARC_STEP.min(2.0 / screen_radius);
        let n = (((a1 - a0).abs() / step).ceil() as usize).clamp(1, MAX_ARC_SAMPLES);
        for i in 0..=n {
            let a = a0 + (a1 - a0) * i as f64 / n as f64;
            out.push(self.screen(a, radius));
        }
    }

    /// Quadratic bezier through the plot center, excluding its start point.
    fn center_curve(&self, from: (f64, f64), to: (f64, f64), out: &mut Vec<(f64, f64)>) {
        let c = self.frame.view.to_screen((0.0, 0.0), &self.frame.viewport);
        for i in 1..=BEZIER_SAMPLES {
            let t = i as f64 / BEZIER_SAMPLES as f64;
            let u = 1.0 - t;
            out.push((
                u * u * from.0 + 2.0 * u * t * c.0 + t * t * to.0,
                u * u * from.1 + 2.0 * u * t * c.1 + t * t * to.1,
            ));
        }
    }

    fn push(&mut self, points: &[(f64, f64)], color: Rgb, alpha: f64) {
        if let Some(shape) = Shape::new(points, color, alpha) {
            if shape.bbox.overlaps(&self.frame.viewport.rect()) {
                self.shapes.push(shape);
            }
        }
    }

    /// One pixel wide segment.
    fn line(&mut self, p: (f64, f64), q: (f64, f64), color: Rgb) {
        let (dx, dy) = (q.0 - p.0, q.1 - p.1);
        let len = (dx * dx + dy * dy).sqrt();
        if len == 0.0 {
            return;
        }
        let (nx, ny) = (-dy / len * 0.5, dx / len * 0.5);
        self.push(
            &[
                (p.0 + nx, p.1 + ny),
                (q.0 + nx, q.1 + ny),
                (q.0 - nx, q.1 - ny),
                (p.0 - nx, p.1 - ny),
            ],
            color,
            1.0,
        );
    }

    fn outline(&mut self, points: &[(f64, f64)], color: Rgb) {
        for (&p, &q) in points.iter().zip(points.iter().cycle().skip(1)) {
            self.line(p, q, color);
        }
    }

    fn arc(&self, geom: &ArcGeom) -> Vec<(f64, f64)> {
        let mut points = Vec::new();
        self.arc_points(geom.start_angle, geom.end_angle, geom.outer_radius, &mut points);
        if geom.inner_radius > 0.0 {
            self.arc_points(geom.end_angle, geom.start_angle, geom.inner_radius, &mut points);
        } else {
            points.push(self.screen(0.0, 0.0));
        }
        points
    }

    fn area(&self, geom: &AreaGeom) -> Vec<(f64, f64)> {
        let outer = geom.points.iter().map(|p| self.screen(p.angle, p.outer_radius));
        let inner = geom.points.iter().rev().map(|p| self.screen(p.angle, p.inner_radius));
        outer.chain(inner).collect()
    }

    fn chord(&self, geom: &ChordGeom) -> Vec<(f64, f64)> {
        let r = geom.radius;
        let mut points = Vec::new();
        self.arc_points(geom.source.0, geom.source.1, r, &mut points);
        self.center_curve(self.screen(geom.source.1, r), self.screen(geom.target.0, r), &mut points);
        self.arc_points(geom.target.0, geom.target.1, r, &mut points);
        self.center_curve(self.screen(geom.target.1, r), self.screen(geom.source.0, r), &mut points);
        points
    }

    fn node(&mut self, node: &SceneNode) {
        match node {
            SceneNode::Group { children, .. } => {
                for child in children {
                    self.node(child);
                }
            }
            SceneNode::ArcSector { geom, fill, stroke } => {
                let points = self.arc(geom);
                self.push(&points, *fill, 1.0);
                if let Some(stroke) = stroke {
                    self.outline(&points, *stroke);
                }
            }
            SceneNode::RadialArea { geom, fill, .. } => {
                let points = self.area(geom);
                self.push(&points, *fill, 1.0);
            }
            SceneNode::RadialLine { angle, inner_radius, outer_radius, stroke } => {
                let p = self.screen(*angle, *inner_radius);
                let q = self.screen(*angle, *outer_radius);
                self.line(p, q, *stroke);
            }
            SceneNode::Chord { geom, fill, opacity } => {
                let points = self.chord(geom);
                self.push(&points, *fill, opacity.clamp(0.0, 1.0));
            }
            SceneNode::TextOnArc { text, start_angle, end_angle, radius, fill } => {
                let (x, y) = self.screen((start_angle + end_angle) / 2.0, *radius);
                self.labels.push(Label {
                    text: text.clone(),
                    x: x - text_width(text) as f64 / 2.0,
                    y: y - GLYPH_HEIGHT as f64 / 2.0,
                    color: *fill,
                });
            }
            SceneNode::Text { text, angle, radius, fill } => {
                let (x, y) = self.screen(*angle, *radius);
                let width = text_width(text) as f64;
                // Left half of the ring reads right-aligned.
                let x = if angle.rem_euclid(TAU) < PI { x } else { x - width };
                self.labels.push(Label {
                    text: text.clone(),
                    x,
                    y: y - GLYPH_HEIGHT as f64 / 2.0,
                    color: *fill,
                });
            }
        }
    }
}

fn blend(dst: &mut [u8], color: Rgb, alpha: f64) {
    let src = [color.0, color.1, color.2];
    for (d, s) in dst.iter_mut().zip(src) {
        *d = (*d as f64 * (1.0 - alpha) + s as f64 * alpha).round() as u8;
    }
    dst[3] = 255;
}

/// Fill one pixel row; pixels are covered when their center is inside.
fn fill_row(row: &mut [u8], y: usize, width: usize, shapes: &[Shape]) {
    let yc = y as f64 + 0.5;
    let mut xs = Vec::new();
    for shape in shapes {
        if yc < shape.bbox.y0 || yc > shape.bbox.y1 {
            continue;
        }
        shape.crossings(yc, &mut xs);
        for span in xs.chunks_exact(2) {
            let x0 = (span[0] - 0.5).ceil().max(0.0) as usize;
            let x1 = ((span[1] - 0.5).ceil().max(0.0) as usize).min(width);
            for x in x0..x1 {
                blend(&mut row[x * 4..x * 4 + 4], shape.color, shape.alpha);
            }
        }
    }
}

/// Draw a glyph with its top-left corner at (base_x, base_y), clipped to
/// the buffer.
fn write_char(buffer: &mut [u8], width: u32, height: u32, base_x: i64, base_y: i64, char_data: &[u8; 8], color: Rgb) {
    for (j, row) in char_data.iter().enumerate() {
        let y = base_y + j as i64;
        if y < 0 || y >= height as i64 {
            continue;
        }
        for z in (0..8i32).rev() {
            if (row >> z) & 1 == 1 {
                let x = base_x + (7 - z) as i64;
                if x < 0 || x >= width as i64 {
                    continue;
                }
                let idx = ((y as usize * width as usize) + x as usize) * 4;
                blend(&mut buffer[idx..idx + 4], color, 1.0);
            }
        }
    }
}

/// Rasterize a scene: shapes in scene order, then text on top.
pub fn render_raster(scene: &SceneNode, frame: &Frame) -> RgbaImage {
    let width = frame.viewport.width.max(0.0) as u32;
    let height = frame.viewport.height.max(0.0) as u32;
    let bg = frame.background;
    let mut img = RgbaImage::from_pixel(width, height, Rgba([bg.0, bg.1, bg.2, 255]));
    if width == 0 || height == 0 {
        return img;
    }

    let mut flat = Flattener { frame, shapes: Vec::new(), labels: Vec::new() };
    flat.node(scene);

    let buffer: &mut [u8] = &mut img;
    let stride = width as usize * 4;
    buffer
        .par_chunks_mut(stride)
        .enumerate()
        .for_each(|(y, row)| fill_row(row, y, width as usize, &flat.shapes));

    for label in &flat.labels {
        let mut x = label.x.round() as i64;
        let y = label.y.round() as i64;
        for c in label.text.chars() {
            write_char(buffer, width, height, x, y, glyph(c), label.color);
            x += GLYPH_WIDTH as i64;
        }
    }

    img
}
