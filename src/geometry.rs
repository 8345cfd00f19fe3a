//! Number formatting, tick generation and screen-space visibility.
//!
//! Angles follow the usual circular-plot convention: 0 rad points to
//! 12 o'clock and angles grow clockwise.

use std::f64::consts::FRAC_PI_2;

/// Sectors narrower than this (radians) get no name label.
pub const LABEL_MIN_ARC: f64 = 0.05;
/// Sectors narrower than this (radians) get no distance ticks.
pub const TICK_MIN_ARC: f64 = 0.08;
pub const DEFAULT_TICK_STEP: u64 = 25_000_000;

pub fn polar_to_xy(angle: f64, radius: f64) -> (f64, f64) {
    (radius * angle.sin(), -radius * angle.cos())
}

/// Short human form of a genomic distance: `25000000 -> "25M"`, `2500 -> "2.5K"`.
///
/// Values of a thousand and up keep `sig_digits` significant digits but never
/// drop integer digits.
pub fn format_num(num: f64, sig_digits: usize) -> String {
    let abs = num.abs();
    let (scaled, suffix) = if abs < 1e3 {
        (num, "")
    } else if abs < 1e6 {
        (num / 1e3, "K")
    } else if abs < 1e9 {
        (num / 1e6, "M")
    } else {
        (num / 1e9, "G")
    };

    if suffix.is_empty() && scaled.fract() == 0.0 {
        return format!("{}", scaled as i64);
    }

    let int_digits = scaled.abs().max(1.0).log10().floor() as usize + 1;
    let decimals = sig_digits.saturating_sub(int_digits);
    let mut text = format!("{:.*}", decimals, scaled);
    if text.contains('.') {
        let trimmed = text.trim_end_matches('0').trim_end_matches('.').len();
        text.truncate(trimmed);
    }
    text.push_str(suffix);
    text
}

/// One distance tick along a chromosome.
#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub position: u64,
    pub label: Option<String>,
}

/// Ticks every `step` bases from 0 up to (excluding) `length`.
///
/// Every third tick is labeled, the first one always as "0". With fewer than
/// four ticks the last one is relabeled with the chromosome's total length.
pub fn chrom_ticks(length: u64, step: u64) -> Vec<Tick> {
    if step == 0 {
        return Vec::new();
    }

    let mut ticks: Vec<Tick> = (0..)
        .map_while(|i: u64| i.checked_mul(step))
        .take_while(|&position| position < length)
        .enumerate()
        .map(|(i, position)| Tick {
            position,
            label: (i % 3 == 0).then(|| format_num(position as f64, 2)),
        })
        .collect();

    if ticks.len() < 4 {
        if let Some(last) = ticks.last_mut() {
            last.label = Some(format_num(length as f64, 2));
        }
    }
    ticks
}

/// Axis-aligned rectangle, `x0 <= x1` and `y0 <= y1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl Rect {
    pub fn from_points(points: impl IntoIterator<Item = (f64, f64)>) -> Option<Rect> {
        let mut iter = points.into_iter();
        let (x, y) = iter.next()?;
        let mut rect = Rect { x0: x, y0: y, x1: x, y1: y };
        for (x, y) in iter {
            rect.x0 = rect.x0.min(x);
            rect.y0 = rect.y0.min(y);
            rect.x1 = rect.x1.max(x);
            rect.y1 = rect.y1.max(y);
        }
        Some(rect)
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x0 < other.x1 && self.x1 > other.x0 && self.y0 < other.y1 && self.y1 > other.y0
    }
}

/// Exact bounding box of an annulus sector centered on the origin.
pub fn arc_bounds(start_angle: f64, end_angle: f64, inner_radius: f64, outer_radius: f64) -> Rect {
    let mut points = vec![
        polar_to_xy(start_angle, inner_radius),
        polar_to_xy(start_angle, outer_radius),
        polar_to_xy(end_angle, inner_radius),
        polar_to_xy(end_angle, outer_radius),
    ];

    // Axis crossings inside the span push the outer edge to its extreme.
    let first = (start_angle / FRAC_PI_2).ceil() as i64;
    let last = (end_angle / FRAC_PI_2).floor() as i64;
    for k in first..=last {
        points.push(polar_to_xy(k as f64 * FRAC_PI_2, outer_radius));
    }

    // `points` is never empty here.
    Rect::from_points(points).unwrap_or(Rect { x0: 0.0, y0: 0.0, x1: 0.0, y1: 0.0 })
}

/// Size of the drawing surface in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width as f64,
            height: height as f64,
        }
    }

    pub fn center(&self) -> (f64, f64) {
        (self.width / 2.0, self.height / 2.0)
    }

    pub fn rect(&self) -> Rect {
        Rect {
            x0: 0.0,
            y0: 0.0,
            x1: self.width,
            y1: self.height,
        }
    }
}

/// Pan/zoom applied on top of the centered plot: `screen = t + scale * (center + p)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    pub scale: f64,
    pub tx: f64,
    pub ty: f64,
}

impl ViewTransform {
    pub const MIN_SCALE: f64 = 1.0;
    pub const MAX_SCALE: f64 = 1e5;

    pub fn identity() -> Self {
        Self {
            scale: 1.0,
            tx: 0.0,
            ty: 0.0,
        }
    }

    /// Scale is clamped to `[MIN_SCALE, MAX_SCALE]`.
    pub fn new(scale: f64, tx: f64, ty: f64) -> Self {
        Self {
            scale: scale.clamp(Self::MIN_SCALE, Self::MAX_SCALE),
            tx,
            ty,
        }
    }

    /// Zoom by `factor` keeping the screen point `focus` fixed.
    pub fn zoomed_at(&self, factor: f64, focus: (f64, f64)) -> Self {
        let scale = (self.scale * factor).clamp(Self::MIN_SCALE, Self::MAX_SCALE);
        let k = scale / self.scale;
        Self {
            scale,
            tx: focus.0 - (focus.0 - self.tx) * k,
            ty: focus.1 - (focus.1 - self.ty) * k,
        }
    }

    pub fn to_screen(&self, point: (f64, f64), viewport: &Viewport) -> (f64, f64) {
        let (cx, cy) = viewport.center();
        (
            self.tx + self.scale * (cx + point.0),
            self.ty + self.scale * (cy + point.1),
        )
    }

    pub fn rect_to_screen(&self, rect: &Rect, viewport: &Viewport) -> Rect {
        let (x0, y0) = self.to_screen((rect.x0, rect.y0), viewport);
        let (x1, y1) = self.to_screen((rect.x1, rect.y1), viewport);
        Rect { x0, y0, x1, y1 }
    }
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self::identity()
    }
}

/// Whether a screen-space box intersects the viewport.
pub fn is_visible(shape: &Rect, viewport: &Viewport) -> bool {
    shape.overlaps(&viewport.rect())
}

/// Whether an annulus sector, drawn through `view`, shows up in `viewport`.
pub fn is_arc_visible(
    start_angle: f64,
    end_angle: f64,
    inner_radius: f64,
    outer_radius: f64,
    view: &ViewTransform,
    viewport: &Viewport,
) -> bool {
    let logical = arc_bounds(start_angle, end_angle, inner_radius, outer_radius);
    is_visible(&view.rect_to_screen(&logical, viewport), viewport)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{PI, TAU};

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_format_num() {
        assert_eq!(format_num(0.0, 2), "0");
        assert_eq!(format_num(150.0, 2), "150");
        assert_eq!(format_num(2500.0, 2), "2.5K");
        assert_eq!(format_num(25_000_000.0, 2), "25M");
        assert_eq!(format_num(150_000_000.0, 2), "150M");
        assert_eq!(format_num(3_000_000_000.0, 2), "3G");
    }

    #[test]
    fn test_ticks_label_every_third() {
        let ticks = chrom_ticks(200_000_000, DEFAULT_TICK_STEP);
        assert_eq!(ticks.len(), 8);
        assert_eq!(ticks[0].label.as_deref(), Some("0"));
        assert_eq!(ticks[1].label, None);
        assert_eq!(ticks[3].label.as_deref(), Some("75M"));
        assert_eq!(ticks[6].label.as_deref(), Some("150M"));
        assert_eq!(ticks[7].position, 175_000_000);
    }

    #[test]
    fn test_short_chromosome_relabels_last_tick() {
        let ticks = chrom_ticks(60_000_000, DEFAULT_TICK_STEP);
        assert_eq!(ticks.len(), 3);
        assert_eq!(ticks[0].label.as_deref(), Some("0"));
        assert_eq!(ticks[2].label.as_deref(), Some("60M"));

        let single = chrom_ticks(1_000, DEFAULT_TICK_STEP);
        assert_eq!(single.len(), 1);
        assert_eq!(single[0].label.as_deref(), Some("1K"));

        assert!(chrom_ticks(0, DEFAULT_TICK_STEP).is_empty());
    }

    #[test]
    fn test_huge_step_stops_before_overflow() {
        let step = u64::MAX / 2;
        let ticks = chrom_ticks(u64::MAX, step);
        let positions: Vec<u64> = ticks.iter().map(|t| t.position).collect();
        assert_eq!(positions, vec![0, step, step * 2]);
    }

    #[test]
    fn test_polar_convention() {
        let (x, y) = polar_to_xy(0.0, 10.0);
        assert!(close(x, 0.0) && close(y, -10.0));
        let (x, y) = polar_to_xy(PI / 2.0, 10.0);
        assert!(close(x, 10.0) && close(y, 0.0));
    }

    #[test]
    fn test_arc_bounds_include_axis_extremes() {
        // Quarter from 12 to 3 o'clock.
        let r = arc_bounds(0.0, PI / 2.0, 5.0, 10.0);
        assert!(close(r.x0, 0.0) && close(r.x1, 10.0));
        assert!(close(r.y0, -10.0) && close(r.y1, 0.0));

        let full = arc_bounds(0.0, TAU, 5.0, 10.0);
        assert!(close(full.width(), 20.0) && close(full.height(), 20.0));
    }

    #[test]
    fn test_visibility_under_zoom() {
        let viewport = Viewport::new(100, 100);
        // Small arc near the top of the ring.
        let (a0, a1, r0, r1) = (-0.05, 0.05, 40.0, 45.0);
        assert!(is_arc_visible(a0, a1, r0, r1, &ViewTransform::identity(), &viewport));

        // Zoom 10x into the bottom of the ring: the top arc leaves the screen.
        let view = ViewTransform::identity().zoomed_at(10.0, (50.0, 95.0));
        assert!(!is_arc_visible(a0, a1, r0, r1, &view, &viewport));
        assert!(is_arc_visible(PI - 0.05, PI + 0.05, r0, r1, &view, &viewport));
    }

    #[test]
    fn test_scale_is_clamped() {
        assert_eq!(ViewTransform::new(0.1, 0.0, 0.0).scale, 1.0);
        assert_eq!(ViewTransform::new(1e9, 0.0, 0.0).scale, 1e5);
    }
}
