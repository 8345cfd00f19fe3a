use std::f64::consts::{PI, TAU};
use std::fmt::Write;

use super::Frame;
use crate::color::Rgb;
use crate::geometry::polar_to_xy;
use crate::scene::{ArcGeom, AreaGeom, ChordGeom, SceneNode};

/// Escape special XML characters
fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn point(angle: f64, radius: f64) -> String {
    let (x, y) = polar_to_xy(angle, radius);
    format!("{:.2},{:.2}", x, y)
}

/// Annulus sector path. A full turn is drawn as two half circles per edge,
/// which SVG arcs need since start and end would coincide.
fn arc_path(geom: &ArcGeom) -> String {
    let ArcGeom { start_angle: a0, end_angle: a1, inner_radius: r0, outer_radius: r1 } = *geom;
    let span = a1 - a0;

    if span >= TAU - 1e-9 {
        let mut d = format!(
            "M{} A{:.2},{:.2} 0 1 1 {} A{:.2},{:.2} 0 1 1 {} Z",
            point(a0, r1), r1, r1, point(a0 + PI, r1), r1, r1, point(a0, r1)
        );
        if r0 > 0.0 {
            let _ = write!(
                d,
                " M{} A{:.2},{:.2} 0 1 0 {} A{:.2},{:.2} 0 1 0 {} Z",
                point(a0, r0), r0, r0, point(a0 + PI, r0), r0, r0, point(a0, r0)
            );
        }
        return d;
    }

    let large = if span > PI { 1 } else { 0 };
    let mut d = format!(
        "M{} A{:.2},{:.2} 0 {} 1 {}",
        point(a0, r1), r1, r1, large, point(a1, r1)
    );
    if r0 > 0.0 {
        let _ = write!(
            d,
            " L{} A{:.2},{:.2} 0 {} 0 {}",
            point(a1, r0), r0, r0, large, point(a0, r0)
        );
    } else {
        d.push_str(" L0,0");
    }
    d.push_str(" Z");
    d
}

/// Outline along the data, back along the baseline.
fn area_path(geom: &AreaGeom) -> String {
    let mut d = String::new();
    for (i, p) in geom.points.iter().enumerate() {
        let _ = write!(d, "{}{} ", if i == 0 { 'M' } else { 'L' }, point(p.angle, p.outer_radius));
    }
    for p in geom.points.iter().rev() {
        let _ = write!(d, "L{} ", point(p.angle, p.inner_radius));
    }
    d.push('Z');
    d
}

/// Ribbon: source arc, curve through the center, target arc, curve back.
fn chord_path(geom: &ChordGeom) -> String {
    let r = geom.radius;
    let (s0, s1) = geom.source;
    let (t0, t1) = geom.target;
    format!(
        "M{} A{:.2},{:.2} 0 0 1 {} Q0,0 {} A{:.2},{:.2} 0 0 1 {} Q0,0 {} Z",
        point(s0, r), r, r, point(s1, r),
        point(t0, r), r, r, point(t1, r),
        point(s0, r)
    )
}

fn fill_attr(color: Rgb) -> String {
    format!("rgb({},{},{})", color.0, color.1, color.2)
}

struct SvgWriter {
    out: String,
    next_id: usize,
}

impl SvgWriter {
    fn node(&mut self, node: &SceneNode) {
        match node {
            SceneNode::Group { class, name, children } => {
                let _ = write!(self.out, r#"<g class="{}""#, escape_xml(class));
                if let Some(name) = name {
                    let _ = write!(self.out, r#" data-name="{}""#, escape_xml(name));
                }
                self.out.push_str(">\n");
                for child in children {
                    self.node(child);
                }
                self.out.push_str("</g>\n");
            }
            SceneNode::ArcSector { geom, fill, stroke } => {
                let stroke = stroke.map(fill_attr).unwrap_or_else(|| "none".to_string());
                let _ = writeln!(
                    self.out,
                    r#"<path d="{}" fill="{}" fill-rule="evenodd" stroke="{}"/>"#,
                    arc_path(geom),
                    fill_attr(*fill),
                    stroke
                );
            }
            SceneNode::RadialArea { chrom, geom, fill, stroke } => {
                if geom.points.is_empty() {
                    return;
                }
                let _ = writeln!(
                    self.out,
                    r#"<path class="segment" data-chrom="{}" d="{}" fill="{}" stroke="{}" stroke-width="0.5"/>"#,
                    escape_xml(chrom),
                    area_path(geom),
                    fill_attr(*fill),
                    fill_attr(*stroke)
                );
            }
            SceneNode::RadialLine { angle, inner_radius, outer_radius, stroke } => {
                let (x1, y1) = polar_to_xy(*angle, *inner_radius);
                let (x2, y2) = polar_to_xy(*angle, *outer_radius);
                let _ = writeln!(
                    self.out,
                    r#"<line x1="{:.2}" y1="{:.2}" x2="{:.2}" y2="{:.2}" stroke="{}" stroke-width="1"/>"#,
                    x1, y1, x2, y2,
                    fill_attr(*stroke)
                );
            }
            SceneNode::Chord { geom, fill, opacity } => {
                let _ = writeln!(
                    self.out,
                    r#"<path class="chord" d="{}" fill="{}" fill-opacity="{:.2}"/>"#,
                    chord_path(geom),
                    fill_attr(*fill),
                    opacity
                );
            }
            SceneNode::TextOnArc { text, start_angle, end_angle, radius, fill } => {
                let id = format!("label-arc-{}", self.next_id);
                self.next_id += 1;
                let large = if end_angle - start_angle > PI { 1 } else { 0 };
                let _ = writeln!(
                    self.out,
                    r#"<path id="{}" d="M{} A{:.2},{:.2} 0 {} 1 {}" fill="none"/>"#,
                    id,
                    point(*start_angle, *radius),
                    radius, radius, large,
                    point(*end_angle, *radius)
                );
                let _ = writeln!(
                    self.out,
                    r##"<text class="chrom-label" fill="{}" dominant-baseline="middle"><textPath href="#{}" startOffset="50%" text-anchor="middle">{}</textPath></text>"##,
                    fill_attr(*fill),
                    id,
                    escape_xml(text)
                );
            }
            SceneNode::Text { text, angle, radius, fill } => {
                let (x, y) = polar_to_xy(*angle, *radius);
                let anchor = if angle.rem_euclid(TAU) < PI { "start" } else { "end" };
                let _ = writeln!(
                    self.out,
                    r#"<text class="tick-label" x="{:.2}" y="{:.2}" text-anchor="{}" fill="{}">{}</text>"#,
                    x, y, anchor,
                    fill_attr(*fill),
                    escape_xml(text)
                );
            }
        }
    }
}

/// Render a scene as an SVG document: the plot is centered in the viewport
/// and the view's pan/zoom wraps everything.
pub fn render_svg(scene: &SceneNode, frame: &Frame) -> String {
    let width = frame.viewport.width;
    let height = frame.viewport.height;
    let (cx, cy) = frame.viewport.center();
    let view = frame.view;

    let mut svg = String::new();
    let _ = write!(
        svg,
        r#"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" width="{}" height="{}" viewBox="0 0 {} {}">
<style>
  .chrom-label {{ font-family: 'DejaVu Sans Mono', 'Courier New', monospace; font-size: 12px; }}
  .tick-label {{ font-family: 'DejaVu Sans Mono', 'Courier New', monospace; font-size: 8px; }}
</style>
<rect width="100%" height="100%" fill="{}"/>
<g transform="translate({:.2},{:.2}) scale({})">
<g transform="translate({:.2},{:.2})">
"#,
        width, height, width, height,
        fill_attr(frame.background),
        view.tx, view.ty, view.scale,
        cx, cy
    );

    let mut writer = SvgWriter { out: svg, next_id: 0 };
    writer.node(scene);

    let mut svg = writer.out;
    svg.push_str("</g>\n</g>\n</svg>\n");
    svg
}
