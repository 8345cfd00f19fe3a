use log::{debug, info, warn};

use super::{fetch_expired, fetch_timed_out, Palette, RenderState};
use crate::color::{track_color, Rgb};
use crate::config::TrackConfig;
use crate::data::{ChromData, DataPoint, Pending, Resolution};
use crate::error::CircosError;
use crate::genome::Genome;
use crate::layout::ChromSector;
use crate::scene::{ArcGeom, ChordGeom, SceneNode, Timing, Transition};
use crate::track::{Track, TrackId};

/// Angular width of each chord end, in radians.
pub const CHORD_WIDTH: f64 = 0.01;
const CHORD_OPACITY: f64 = 0.6;
const ERROR_RING_WIDTH: f64 = 4.0;

/// A link resolved to sector indices, positions kept in bases.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Link {
    source: (usize, u64),
    target: (usize, u64),
}

fn chord_geom(link: &Link, sectors: &[ChromSector], radius: f64) -> ChordGeom {
    let end = |(index, position): (usize, u64)| {
        let angle = sectors[index].angle_of(position);
        (angle, angle + CHORD_WIDTH)
    };
    ChordGeom {
        source: end(link.source),
        target: end(link.target),
        radius,
    }
}

/// Pairwise links drawn as ribbons inside the innermost quantitative band.
#[derive(Debug)]
pub struct ChordRenderer {
    id: TrackId,
    name: String,
    state: RenderState,
    sectors: Vec<ChromSector>,
    radius: f64,
    links: Vec<Link>,
    chords: Vec<Transition<ChordGeom>>,
    fill: Rgb,
    palette: Palette,
    ready: Option<Pending<bool>>,
    genome_wide: Option<Pending<Vec<ChromData>>>,
    fetch_issued_ms: f64,
}

impl ChordRenderer {
    pub fn new(track: &Track, sectors: &[ChromSector], radius: f64, palette: Palette) -> Self {
        Self {
            id: track.id,
            name: track.name.clone(),
            state: RenderState::Initializing,
            sectors: sectors.to_vec(),
            radius,
            links: Vec::new(),
            chords: Vec::new(),
            fill: track.config.fill_color().unwrap_or_else(|| track_color(&track.name)),
            palette,
            ready: None,
            genome_wide: None,
            fetch_issued_ms: 0.0,
        }
    }

    /// Chords have no background arcs; the state still steps through it.
    pub fn request_data(&mut self, track: &Track, now_ms: f64) {
        self.state = RenderState::BackgroundDrawn;
        self.ready = Some(track.source.is_ready());
        self.fetch_issued_ms = now_ms;
        self.state = RenderState::AwaitingData;
    }

    pub fn poll(&mut self, track: &Track, genome: &Genome, timing: Timing, timeout_ms: f64) -> usize {
        let mut resolved = 0;

        if let Some(mut pending) = self.ready.take() {
            match pending.poll() {
                Resolution::Waiting => self.ready = Some(pending),
                Resolution::Ready(Ok(true)) => {
                    resolved += 1;
                    self.genome_wide = Some(track.source.genome_wide_data(genome));
                    self.fetch_issued_ms = timing.now_ms;
                }
                Resolution::Ready(Ok(false)) => {
                    resolved += 1;
                    self.ready = Some(track.source.is_ready());
                }
                Resolution::Ready(Err(e)) => {
                    resolved += 1;
                    self.fail(e);
                }
            }
        }

        if let Some(mut pending) = self.genome_wide.take() {
            match pending.poll() {
                Resolution::Waiting => self.genome_wide = Some(pending),
                Resolution::Ready(Ok(chroms)) => {
                    resolved += 1;
                    self.on_links(chroms, genome);
                }
                Resolution::Ready(Err(e)) => {
                    resolved += 1;
                    self.fail(e);
                }
            }
        }

        if self.has_outstanding() && fetch_expired(self.fetch_issued_ms, timing.now_ms, timeout_ms) {
            resolved += 1;
            self.fail(fetch_timed_out(&self.name, timeout_ms));
        }
        resolved
    }

    fn fail(&mut self, err: CircosError) {
        warn!("Chord track '{}' has no data: {}", self.name, err);
        self.ready = None;
        self.genome_wide = None;
        self.state = RenderState::Failed(err.to_string());
    }

    fn on_links(&mut self, chroms: Vec<ChromData>, genome: &Genome) {
        let mut skipped = 0usize;
        self.links.clear();

        for (source_index, chrom) in chroms.into_iter().enumerate().take(self.sectors.len()) {
            for point in chrom.data {
                let DataPoint::Link { position, mate_chrom, mate_position } = point else {
                    skipped += 1;
                    continue;
                };
                let Some(target_index) = genome.index_of(&mate_chrom) else {
                    skipped += 1;
                    continue;
                };
                self.links.push(Link {
                    source: (source_index, position),
                    target: (target_index, mate_position),
                });
            }
        }
        if skipped > 0 {
            warn!("Chord track '{}': skipped {} entries that are not valid links", self.name, skipped);
        }

        self.chords = self
            .links
            .iter()
            .map(|link| Transition::settled(chord_geom(link, &self.sectors, self.radius)))
            .collect();
        info!("Chord track '{}' rendered {} links", self.name, self.links.len());
        self.state = RenderState::DataRendered;
    }

    /// Follow the innermost band. Angles are recomputed from the sectors,
    /// which only move when the chromosome gap changes.
    pub fn relayout(&mut self, sectors: &[ChromSector], radius: f64, timing: Timing) {
        debug!("Chord track '{}' anchored at radius {:.1}", self.name, radius);
        self.sectors = sectors.to_vec();
        self.radius = radius;
        for (chord, link) in self.chords.iter_mut().zip(&self.links) {
            chord.retarget(chord_geom(link, &self.sectors, radius), timing);
        }
    }

    pub fn apply_config(&mut self, config: &TrackConfig) {
        self.fill = config.fill_color().unwrap_or_else(|| track_color(&self.name));
    }

    pub fn set_palette(&mut self, palette: Palette) {
        self.palette = palette;
    }

    pub fn id(&self) -> TrackId {
        self.id
    }

    pub fn state(&self) -> &RenderState {
        &self.state
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn has_outstanding(&self) -> bool {
        self.ready.is_some() || self.genome_wide.is_some()
    }

    pub fn scene(&self, now_ms: f64) -> SceneNode {
        let mut children = Vec::new();
        if self.state.is_failed() {
            children.push(SceneNode::ArcSector {
                geom: ArcGeom {
                    start_angle: 0.0,
                    end_angle: std::f64::consts::TAU,
                    inner_radius: (self.radius - ERROR_RING_WIDTH).max(0.0),
                    outer_radius: self.radius,
                },
                fill: self.palette.error,
                stroke: None,
            });
        }
        children.extend(self.chords.iter().map(|chord| SceneNode::Chord {
            geom: chord.sample(now_ms),
            fill: self.fill,
            opacity: CHORD_OPACITY,
        }));
        SceneNode::group("chord-track", Some(self.name.clone()), children)
    }
}
