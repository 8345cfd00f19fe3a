//! Hierarchical scene description handed to a rendering host.
//!
//! Renderers keep their shapes as [`Transition`]s so that layout changes
//! animate from the old geometry to the new one; sampling a transition at a
//! point in time yields the geometry that goes into a [`SceneNode`].

use crate::color::Rgb;

/// Linear blend between two values of the same shape.
pub trait Interpolate: Clone {
    fn interpolate(&self, to: &Self, t: f64) -> Self;
}

impl Interpolate for f64 {
    fn interpolate(&self, to: &Self, t: f64) -> Self {
        self + (to - self) * t
    }
}

/// An annulus sector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArcGeom {
    pub start_angle: f64,
    pub end_angle: f64,
    pub inner_radius: f64,
    pub outer_radius: f64,
}

impl Interpolate for ArcGeom {
    fn interpolate(&self, to: &Self, t: f64) -> Self {
        ArcGeom {
            start_angle: self.start_angle.interpolate(&to.start_angle, t),
            end_angle: self.end_angle.interpolate(&to.end_angle, t),
            inner_radius: self.inner_radius.interpolate(&to.inner_radius, t),
            outer_radius: self.outer_radius.interpolate(&to.outer_radius, t),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AreaPoint {
    pub angle: f64,
    pub inner_radius: f64,
    pub outer_radius: f64,
}

/// A radial area: the region between an inner baseline and a data outline.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AreaGeom {
    pub points: Vec<AreaPoint>,
}

impl AreaGeom {
    pub fn max_outer_radius(&self) -> Option<f64> {
        self.points
            .iter()
            .map(|p| p.outer_radius)
            .fold(None, |acc, r| Some(acc.map_or(r, |a: f64| a.max(r))))
    }
}

impl Interpolate for AreaGeom {
    /// Pointwise when both outlines have the same number of points,
    /// otherwise the target outline replaces the old one directly.
    fn interpolate(&self, to: &Self, t: f64) -> Self {
        if self.points.len() != to.points.len() {
            return to.clone();
        }
        AreaGeom {
            points: self
                .points
                .iter()
                .zip(&to.points)
                .map(|(a, b)| AreaPoint {
                    angle: a.angle.interpolate(&b.angle, t),
                    inner_radius: a.inner_radius.interpolate(&b.inner_radius, t),
                    outer_radius: a.outer_radius.interpolate(&b.outer_radius, t),
                })
                .collect(),
        }
    }
}

/// A ribbon between two angular spans, bent through the center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChordGeom {
    pub source: (f64, f64),
    pub target: (f64, f64),
    pub radius: f64,
}

impl Interpolate for ChordGeom {
    fn interpolate(&self, to: &Self, t: f64) -> Self {
        ChordGeom {
            source: (
                self.source.0.interpolate(&to.source.0, t),
                self.source.1.interpolate(&to.source.1, t),
            ),
            target: (
                self.target.0.interpolate(&to.target.0, t),
                self.target.1.interpolate(&to.target.1, t),
            ),
            radius: self.radius.interpolate(&to.radius, t),
        }
    }
}

/// Current time and animation length for a batch of geometry updates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timing {
    pub now_ms: f64,
    pub duration_ms: f64,
}

impl Timing {
    pub fn instant(now_ms: f64) -> Self {
        Self {
            now_ms,
            duration_ms: 0.0,
        }
    }
}

fn ease_cubic_in_out(t: f64) -> f64 {
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        let u = 2.0 * t - 2.0;
        0.5 * u * u * u + 1.0
    }
}

/// Geometry animating from `from` to `to`.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition<G> {
    from: G,
    to: G,
    start_ms: f64,
    duration_ms: f64,
}

impl<G: Interpolate> Transition<G> {
    pub fn settled(geom: G) -> Self {
        Self {
            from: geom.clone(),
            to: geom,
            start_ms: 0.0,
            duration_ms: 0.0,
        }
    }

    pub fn sample(&self, now_ms: f64) -> G {
        if self.duration_ms <= 0.0 || now_ms >= self.start_ms + self.duration_ms {
            return self.to.clone();
        }
        let t = ((now_ms - self.start_ms) / self.duration_ms).clamp(0.0, 1.0);
        self.from.interpolate(&self.to, ease_cubic_in_out(t))
    }

    /// Start a new animation from wherever the current one is at `timing.now_ms`.
    pub fn retarget(&mut self, to: G, timing: Timing) {
        self.from = self.sample(timing.now_ms);
        self.to = to;
        self.start_ms = timing.now_ms;
        self.duration_ms = timing.duration_ms;
    }

    pub fn target(&self) -> &G {
        &self.to
    }

    pub fn is_running(&self, now_ms: f64) -> bool {
        self.duration_ms > 0.0 && now_ms < self.start_ms + self.duration_ms
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SceneNode {
    Group {
        class: String,
        name: Option<String>,
        children: Vec<SceneNode>,
    },
    ArcSector {
        geom: ArcGeom,
        fill: Rgb,
        stroke: Option<Rgb>,
    },
    /// One chromosome's data path.
    RadialArea {
        chrom: String,
        geom: AreaGeom,
        fill: Rgb,
        stroke: Rgb,
    },
    RadialLine {
        angle: f64,
        inner_radius: f64,
        outer_radius: f64,
        stroke: Rgb,
    },
    Chord {
        geom: ChordGeom,
        fill: Rgb,
        opacity: f64,
    },
    /// Text running along an arc, centered on the arc's middle.
    TextOnArc {
        text: String,
        start_angle: f64,
        end_angle: f64,
        radius: f64,
        fill: Rgb,
    },
    Text {
        text: String,
        angle: f64,
        radius: f64,
        fill: Rgb,
    },
}

impl SceneNode {
    pub fn group(class: impl Into<String>, name: Option<String>, children: Vec<SceneNode>) -> Self {
        SceneNode::Group {
            class: class.into(),
            name,
            children,
        }
    }

    pub fn children(&self) -> &[SceneNode] {
        match self {
            SceneNode::Group { children, .. } => children,
            _ => &[],
        }
    }

    /// Depth-first, parents before children.
    pub fn walk<'a, F: FnMut(&'a SceneNode)>(&'a self, f: &mut F) {
        f(self);
        for child in self.children() {
            child.walk(f);
        }
    }

    pub fn count<F: Fn(&SceneNode) -> bool>(&self, predicate: F) -> usize {
        let mut n = 0;
        self.walk(&mut |node| {
            if predicate(node) {
                n += 1;
            }
        });
        n
    }

    /// First group (depth-first) with the given class.
    pub fn find_group(&self, class: &str) -> Option<&SceneNode> {
        let mut found = None;
        self.walk(&mut |node| {
            if found.is_none() {
                if let SceneNode::Group { class: c, .. } = node {
                    if c == class {
                        found = Some(node);
                    }
                }
            }
        });
        found
    }

    /// First group with the given name.
    pub fn find_named(&self, name: &str) -> Option<&SceneNode> {
        let mut found = None;
        self.walk(&mut |node| {
            if found.is_none() {
                if let SceneNode::Group { name: Some(n), .. } = node {
                    if n == name {
                        found = Some(node);
                    }
                }
            }
        });
        found
    }
}
