use log::{debug, info, warn};

use super::{fetch_expired, fetch_timed_out, DataBounds, Palette, RenderState};
use crate::color::{track_color, Rgb};
use crate::config::TrackConfig;
use crate::data::{ChromData, DataMode, DataPoint, Pending, Resolution};
use crate::error::CircosError;
use crate::genome::Genome;
use crate::geometry::{is_arc_visible, ViewTransform, Viewport};
use crate::layout::{ChromSector, RadialBand};
use crate::scene::{ArcGeom, AreaGeom, AreaPoint, SceneNode, Timing, Transition};
use crate::track::{Track, TrackId};

/// One chromosome's share of a track: its current data (coarse or refined)
/// and the path drawn from it.
#[derive(Debug)]
struct Segment {
    chrom: String,
    data: Vec<DataPoint>,
    /// Zoom scale `data` was fetched for; genome-wide data counts as 1.
    scale: f64,
    path: Option<Transition<AreaGeom>>,
}

/// An outstanding detail request for one chromosome.
#[derive(Debug)]
struct Refinement {
    index: usize,
    scale: f64,
    issued_ms: f64,
    pending: Pending<Vec<DataPoint>>,
}

fn sector_arc(sector: &ChromSector, band: &RadialBand) -> ArcGeom {
    ArcGeom {
        start_angle: sector.start_angle,
        end_angle: sector.end_angle,
        inner_radius: band.inner_radius,
        outer_radius: band.outer_radius,
    }
}

/// Data path of one chromosome: point `i` of `n` sits at the `i / (n - 1)`
/// fraction of the sector, its outline at the scaled value.
fn data_area(sector: &ChromSector, data: &[DataPoint], band: &RadialBand, bounds: &DataBounds) -> AreaGeom {
    let steps = data.len().saturating_sub(1).max(1) as f64;
    AreaGeom {
        points: data
            .iter()
            .enumerate()
            .map(|(i, point)| AreaPoint {
                angle: sector.start_angle + sector.span() * i as f64 / steps,
                inner_radius: band.inner_radius,
                outer_radius: bounds.scale(point.numeric(), band),
            })
            .collect(),
    }
}

fn fill_color(name: &str, config: &TrackConfig) -> Rgb {
    config.fill_color().unwrap_or_else(|| track_color(name))
}

#[derive(Debug)]
pub struct QuantitativeRenderer {
    id: TrackId,
    name: String,
    state: RenderState,
    sectors: Vec<ChromSector>,
    band: RadialBand,
    arcs: Vec<Transition<ArcGeom>>,
    segments: Vec<Segment>,
    bounds: Option<DataBounds>,
    fill: Rgb,
    palette: Palette,
    /// Zoom scale seen by the last `update_scale` call.
    scale: f64,
    ready: Option<Pending<bool>>,
    genome_wide: Option<Pending<Vec<ChromData>>>,
    /// Logical time the current readiness or genome-wide fetch was issued.
    fetch_issued_ms: f64,
    refinements: Vec<Refinement>,
}

impl QuantitativeRenderer {
    pub fn new(track: &Track, sectors: &[ChromSector], band: RadialBand, palette: Palette) -> Self {
        Self {
            id: track.id,
            name: track.name.clone(),
            state: RenderState::Initializing,
            sectors: sectors.to_vec(),
            band,
            arcs: Vec::new(),
            segments: sectors
                .iter()
                .map(|s| Segment {
                    chrom: s.chrom.clone(),
                    data: Vec::new(),
                    scale: ViewTransform::MIN_SCALE,
                    path: None,
                })
                .collect(),
            bounds: None,
            fill: fill_color(&track.name, &track.config),
            palette,
            scale: ViewTransform::MIN_SCALE,
            ready: None,
            genome_wide: None,
            fetch_issued_ms: 0.0,
            refinements: Vec::new(),
        }
    }

    /// One loading-colored arc per chromosome in the current band.
    pub fn draw_background(&mut self) {
        self.arcs = self
            .sectors
            .iter()
            .map(|s| Transition::settled(sector_arc(s, &self.band)))
            .collect();
        if self.state == RenderState::Initializing {
            self.state = RenderState::BackgroundDrawn;
        }
    }

    /// Ask the source whether it is ready; the genome-wide fetch follows
    /// from `poll` once it is.
    pub fn request_data(&mut self, track: &Track, now_ms: f64) {
        if self.state == RenderState::Initializing {
            self.draw_background();
        }
        debug!("Track '{}' waiting for its data source", self.name);
        self.ready = Some(track.source.is_ready());
        self.fetch_issued_ms = now_ms;
        self.state = RenderState::AwaitingData;
    }

    /// Apply resolved fetches. Anything unanswered for `timeout_ms` is given
    /// up on: the track fails, a refinement just keeps the coarse data.
    pub fn poll(&mut self, track: &Track, genome: &Genome, timing: Timing, timeout_ms: f64) -> usize {
        let mut resolved = 0;

        if let Some(mut pending) = self.ready.take() {
            match pending.poll() {
                Resolution::Waiting => self.ready = Some(pending),
                Resolution::Ready(Ok(true)) => {
                    resolved += 1;
                    info!("Fetching genome-wide data for track '{}'...", self.name);
                    self.genome_wide = Some(track.source.genome_wide_data(genome));
                    self.fetch_issued_ms = timing.now_ms;
                }
                Resolution::Ready(Ok(false)) => {
                    resolved += 1;
                    // Asked again on the next pump.
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
                    self.on_genome_wide(chroms, &track.config);
                }
                Resolution::Ready(Err(e)) => {
                    resolved += 1;
                    self.fail(e);
                }
            }
        }

        let waiting_on_source = self.ready.is_some() || self.genome_wide.is_some();
        if waiting_on_source && fetch_expired(self.fetch_issued_ms, timing.now_ms, timeout_ms) {
            resolved += 1;
            self.fail(fetch_timed_out(&self.name, timeout_ms));
        }

        let mut waiting = Vec::with_capacity(self.refinements.len());
        for mut refinement in std::mem::take(&mut self.refinements) {
            let result = match refinement.pending.poll() {
                Resolution::Waiting if fetch_expired(refinement.issued_ms, timing.now_ms, timeout_ms) => {
                    Err(fetch_timed_out(&self.name, timeout_ms))
                }
                Resolution::Waiting => {
                    waiting.push(refinement);
                    continue;
                }
                Resolution::Ready(result) => result,
            };
            resolved += 1;
            match result {
                Ok(points) => {
                    self.on_refined(refinement.index, refinement.scale, points, &track.config, timing)
                }
                Err(e) => warn!(
                    "Track '{}': refinement of {} failed, keeping coarse data: {}",
                    self.name, self.segments[refinement.index].chrom, e
                ),
            }
        }
        self.refinements.extend(waiting);

        resolved
    }

    fn fail(&mut self, err: CircosError) {
        warn!("Track '{}' has no data: {}", self.name, err);
        self.ready = None;
        self.genome_wide = None;
        self.refinements.clear();
        self.state = RenderState::Failed(err.to_string());
    }

    fn on_genome_wide(&mut self, chroms: Vec<ChromData>, config: &TrackConfig) {
        if chroms.len() != self.segments.len() {
            warn!(
                "Track '{}': got data for {} chromosomes, genome has {}",
                self.name,
                chroms.len(),
                self.segments.len()
            );
        }
        let mut chroms = chroms.into_iter();
        for segment in &mut self.segments {
            segment.data = chroms.next().map(|c| c.data).unwrap_or_default();
            segment.scale = ViewTransform::MIN_SCALE;
        }
        self.recompute_bounds(config);

        let Some(bounds) = self.bounds else {
            self.state = RenderState::DataRendered;
            return;
        };
        let band = self.band;
        for (segment, sector) in self.segments.iter_mut().zip(&self.sectors) {
            segment.path = Some(Transition::settled(data_area(sector, &segment.data, &band, &bounds)));
        }

        info!(
            "Track '{}' rendered {} values (bounds [{}, {}])",
            self.name,
            self.segments.iter().map(|s| s.data.len()).sum::<usize>(),
            bounds.min,
            bounds.max
        );
        self.state = RenderState::DataRendered;
    }

    /// Swap in one chromosome's refined data; the other paths only follow
    /// the new bounds. Results are applied in arrival order.
    fn on_refined(
        &mut self,
        index: usize,
        scale: f64,
        points: Vec<DataPoint>,
        config: &TrackConfig,
        timing: Timing,
    ) {
        if self.state != RenderState::DataRendered {
            return;
        }
        debug!(
            "Track '{}': {} refined to {} points",
            self.name,
            self.segments[index].chrom,
            points.len()
        );
        self.segments[index].data = points;
        self.segments[index].scale = scale;
        self.recompute_bounds(config);

        let Some(bounds) = self.bounds else {
            return;
        };
        let band = self.band;
        for (i, (segment, sector)) in self.segments.iter_mut().zip(&self.sectors).enumerate() {
            let geom = data_area(sector, &segment.data, &band, &bounds);
            match segment.path.as_mut() {
                Some(path) if i != index => path.retarget(geom, timing),
                _ => segment.path = Some(Transition::settled(geom)),
            }
        }
    }

    /// Bounds over every segment's current data, whatever its resolution.
    fn recompute_bounds(&mut self, config: &TrackConfig) {
        self.bounds = DataBounds::from_values(
            self.segments
                .iter()
                .flat_map(|s| s.data.iter().map(DataPoint::numeric)),
        )
        .map(|b| b.with_overrides(config));
    }

    fn retarget_paths(&mut self, timing: Timing) {
        let Some(bounds) = self.bounds else {
            return;
        };
        let band = self.band;
        for (segment, sector) in self.segments.iter_mut().zip(&self.sectors) {
            if let Some(path) = segment.path.as_mut() {
                path.retarget(data_area(sector, &segment.data, &band, &bounds), timing);
            }
        }
    }

    /// Move background and data to a new band (and sector set).
    pub fn relayout(&mut self, sectors: &[ChromSector], band: RadialBand, timing: Timing) {
        self.sectors = sectors.to_vec();
        self.band = band;
        if self.arcs.len() == sectors.len() {
            for (arc, sector) in self.arcs.iter_mut().zip(sectors) {
                arc.retarget(sector_arc(sector, &band), timing);
            }
        } else if !self.arcs.is_empty() {
            self.draw_background();
        }
        self.retarget_paths(timing);
    }

    /// Color or min/max changed: recompute bounds from the data already held.
    pub fn apply_config(&mut self, config: &TrackConfig, timing: Timing) {
        self.fill = fill_color(&self.name, config);
        if self.state == RenderState::DataRendered {
            self.recompute_bounds(config);
            self.retarget_paths(timing);
        }
    }

    pub fn set_palette(&mut self, palette: Palette) {
        self.palette = palette;
    }

    /// React to a new zoom level. On a scale increase, every chromosome
    /// whose arc is on screen and whose source has more detail than the
    /// segment already holds gets a detail request.
    /// Returns the number of requests issued.
    pub fn update_scale(
        &mut self,
        track: &Track,
        genome: &Genome,
        view: &ViewTransform,
        viewport: &Viewport,
        now_ms: f64,
    ) -> usize {
        let zoomed_in = view.scale > self.scale;
        self.scale = view.scale;
        if !zoomed_in || self.state != RenderState::DataRendered {
            return 0;
        }

        let mut issued = 0;
        for (index, (segment, sector)) in self.segments.iter().zip(&self.sectors).enumerate() {
            if segment.path.is_none() {
                continue;
            }
            let visible = is_arc_visible(
                sector.start_angle,
                sector.end_angle,
                self.band.inner_radius,
                self.band.outer_radius,
                view,
                viewport,
            );
            if !visible {
                continue;
            }
            let region = match genome.region_for(&sector.chrom, 0, sector.length) {
                Ok(region) => region,
                Err(e) => {
                    warn!("Track '{}': {}", self.name, e);
                    continue;
                }
            };
            if !track.source.can_refine(&region, segment.scale, view.scale) {
                continue;
            }
            debug!(
                "Track '{}': requesting detail for {} at scale {:.2}",
                self.name, region, view.scale
            );
            self.refinements.push(Refinement {
                index,
                scale: view.scale,
                issued_ms: now_ms,
                pending: track.source.refine(&region, DataMode::Coverage, 0, view.scale),
            });
            issued += 1;
        }
        issued
    }

    pub fn id(&self) -> TrackId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> &RenderState {
        &self.state
    }

    /// Bounds in effect, overrides applied.
    pub fn bounds(&self) -> Option<DataBounds> {
        self.bounds
    }

    /// Band the track is placed in (the end state of any running transition).
    pub fn band(&self) -> RadialBand {
        self.band
    }

    pub fn fill(&self) -> Rgb {
        self.fill
    }

    pub fn segment_data(&self, chrom_index: usize) -> Option<&[DataPoint]> {
        self.segments.get(chrom_index).map(|s| s.data.as_slice())
    }

    pub fn pending_refinements(&self) -> usize {
        self.refinements.len()
    }

    pub fn has_outstanding(&self) -> bool {
        self.ready.is_some() || self.genome_wide.is_some() || !self.refinements.is_empty()
    }

    pub fn scene(&self, now_ms: f64) -> SceneNode {
        let background = self.palette.background(&self.state);
        let arcs = self
            .arcs
            .iter()
            .map(|arc| SceneNode::ArcSector {
                geom: arc.sample(now_ms),
                fill: background,
                stroke: None,
            })
            .collect();
        let paths = self
            .segments
            .iter()
            .filter_map(|segment| {
                let path = segment.path.as_ref()?;
                Some(SceneNode::RadialArea {
                    chrom: segment.chrom.clone(),
                    geom: path.sample(now_ms),
                    fill: self.fill,
                    stroke: self.fill,
                })
            })
            .collect();

        SceneNode::group(
            "quantitative-track",
            Some(self.name.clone()),
            vec![
                SceneNode::group("background", None, arcs),
                SceneNode::group("data", None, paths),
            ],
        )
    }
}
