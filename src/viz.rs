//! The visualization controller.
//!
//! Owns the genome, the shared config and the ordered track list, and keeps
//! one renderer per ring. Changes to the track list and to either kind of
//! config arrive as events through a channel fed by observers, and are
//! handled in order: structural ones recompute sectors and bands and push
//! the new geometry to every renderer.

use log::{debug, info, warn};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread;
use std::time::Duration;

use crate::config::{ConfigKey, ConfigValue, SharedConfig, SharedKey, TrackConfig, VizConfig};
use crate::data::DataManager;
use crate::error::{CircosError, Result};
use crate::genome::Genome;
use crate::geometry::{ViewTransform, Viewport};
use crate::layout::{allocate_bands, layout_sectors, BandLayout, ChromSector, RadialBand};
use crate::render::{
    ChordRenderer, DataBounds, LabelRenderer, Palette, QuantitativeRenderer, RenderState,
    TrackRenderer,
};
use crate::scene::{SceneNode, Timing};
use crate::track::{CollectionEvent, Track, TrackCollection, TrackId, TrackKind};
use crate::zoom::ZoomDebounce;

#[derive(Debug, Clone, PartialEq)]
enum VizEvent {
    Collection(CollectionEvent),
    Shared(SharedKey),
    TrackOption { id: TrackId, key: ConfigKey },
}

#[derive(Debug)]
pub struct Visualization {
    genome: Genome,
    config: SharedConfig,
    tracks: TrackCollection,
    sender: Sender<VizEvent>,
    events: Receiver<VizEvent>,
    sectors: Vec<ChromSector>,
    bands: BandLayout,
    viewport: Viewport,
    /// Label ring first, then one renderer per track in track order.
    renderers: Vec<TrackRenderer>,
    view: ViewTransform,
    debounce: ZoomDebounce,
    now_ms: f64,
    next_id: u64,
}

impl Visualization {
    pub fn new(genome: Genome, config: VizConfig) -> Result<Self> {
        let mut config = SharedConfig::new(config)?;
        let sectors = layout_sectors(&genome, config.get().total_gap)?;
        let bands = Self::allocate(config.get(), 0)?;

        let (sender, events) = channel();
        let tx = sender.clone();
        config.subscribe(move |key: &SharedKey| {
            let _ = tx.send(VizEvent::Shared(*key));
        });
        let mut tracks = TrackCollection::new();
        let tx = sender.clone();
        tracks.subscribe(move |event: &CollectionEvent| {
            let _ = tx.send(VizEvent::Collection(event.clone()));
        });

        let settings = config.get();
        let label = LabelRenderer::new(
            &sectors,
            bands.label,
            Palette::from_config(settings),
            settings.tick_step,
        );
        let viewport = Viewport::new(settings.width, settings.height);
        let debounce = ZoomDebounce::new(settings.zoom_debounce_ms as f64);
        info!(
            "Laid out {} chromosomes ({} bases) on a ring of radius {}",
            genome.len(),
            genome.total_length(),
            settings.drawing_radius()
        );

        Ok(Self {
            genome,
            config,
            tracks,
            sender,
            events,
            sectors,
            bands,
            viewport,
            renderers: vec![TrackRenderer::Label(label)],
            view: ViewTransform::identity(),
            debounce,
            now_ms: 0.0,
            next_id: 1,
        })
    }

    fn allocate(config: &VizConfig, quantitative: usize) -> Result<BandLayout> {
        allocate_bands(
            quantitative,
            config.track_height,
            config.track_gap,
            config.drawing_radius(),
            config.label_band_height,
        )
    }

    fn transition(&self) -> Timing {
        Timing {
            now_ms: self.now_ms,
            duration_ms: self.config.get().transition_ms as f64,
        }
    }

    fn quantitative_renderers(&self) -> usize {
        self.renderers
            .iter()
            .filter(|r| matches!(r, TrackRenderer::Quantitative(_)))
            .count()
    }

    /// Append a track on the outside of the existing ones (chord tracks do
    /// not take a band). Fails without side effects when the bands would
    /// no longer fit.
    pub fn add_track(
        &mut self,
        name: impl Into<String>,
        kind: TrackKind,
        mut config: TrackConfig,
        source: Box<dyn DataManager>,
    ) -> Result<TrackId> {
        if kind == TrackKind::Quantitative {
            Self::allocate(self.config.get(), self.quantitative_renderers() + 1)?;
        }

        let id = TrackId(self.next_id);
        self.next_id += 1;
        let tx = self.sender.clone();
        config.subscribe_all(move |key: &ConfigKey| {
            let _ = tx.send(VizEvent::TrackOption { id, key: *key });
        });

        self.tracks.push(Track {
            id,
            name: name.into(),
            kind,
            config,
            source,
        });
        self.handle_events()?;
        Ok(id)
    }

    pub fn remove_track(&mut self, id: TrackId) -> Result<()> {
        self.tracks
            .remove(id)
            .ok_or(CircosError::UnknownTrack(id.0))?;
        self.handle_events()
    }

    /// Change the shared config. The new value is validated and laid out on
    /// the side first; nothing changes if that fails.
    pub fn update_config<F>(&mut self, f: F) -> Result<Vec<SharedKey>>
    where
        F: FnOnce(&mut VizConfig),
    {
        let mut next = self.config.get().clone();
        f(&mut next);
        next.validate()?;
        layout_sectors(&self.genome, next.total_gap)?;
        Self::allocate(&next, self.quantitative_renderers())?;

        let changed = self.config.update(move |c| *c = next)?;
        self.handle_events()?;
        Ok(changed)
    }

    /// Edits through this reference are picked up on the next `pump`.
    pub fn track_config_mut(&mut self, id: TrackId) -> Option<&mut TrackConfig> {
        self.tracks.get_mut(id).map(|t| &mut t.config)
    }

    pub fn set_track_option(&mut self, id: TrackId, key: ConfigKey, value: ConfigValue) -> Result<()> {
        self.tracks
            .get_mut(id)
            .ok_or(CircosError::UnknownTrack(id.0))?
            .config
            .set(key, value)?;
        self.handle_events()
    }

    pub fn unset_track_option(&mut self, id: TrackId, key: ConfigKey) -> Result<bool> {
        let removed = self
            .tracks
            .get_mut(id)
            .ok_or(CircosError::UnknownTrack(id.0))?
            .config
            .unset(key);
        self.handle_events()?;
        Ok(removed)
    }

    fn handle_events(&mut self) -> Result<()> {
        let mut relayout = false;
        let mut sectors_changed = false;
        let mut appearance = false;

        while let Ok(event) = self.events.try_recv() {
            match event {
                VizEvent::Collection(CollectionEvent::Added { id, kind }) => self.on_added(id, kind)?,
                VizEvent::Collection(CollectionEvent::Removed { id, .. }) => self.on_removed(id)?,
                VizEvent::Shared(key) if !key.affects_layout() => appearance = true,
                VizEvent::Shared(key) => {
                    relayout = true;
                    sectors_changed |= key == SharedKey::TotalGap;
                }
                VizEvent::TrackOption { id, key } => self.on_track_option(id, key),
            }
        }

        if appearance {
            let config = self.config.get().clone();
            self.debounce.set_window(config.zoom_debounce_ms as f64);
            for renderer in &mut self.renderers {
                renderer.set_appearance(&config);
            }
        }
        if relayout {
            self.relayout(sectors_changed)?;
        }
        Ok(())
    }

    fn on_added(&mut self, id: TrackId, kind: TrackKind) -> Result<()> {
        let palette = Palette::from_config(self.config.get());
        let bands = match kind {
            TrackKind::Quantitative => {
                Self::allocate(self.config.get(), self.quantitative_renderers() + 1)?
            }
            TrackKind::Chord => self.bands.clone(),
        };
        let Some(track) = self.tracks.get(id) else {
            return Ok(());
        };

        let renderer = match kind {
            TrackKind::Quantitative => {
                let band = bands.tracks.last().copied().unwrap_or(bands.label);
                let mut r = QuantitativeRenderer::new(track, &self.sectors, band, palette);
                r.draw_background();
                r.request_data(track, self.now_ms);
                TrackRenderer::Quantitative(r)
            }
            TrackKind::Chord => {
                let mut r = ChordRenderer::new(track, &self.sectors, bands.chord_radius(), palette);
                r.request_data(track, self.now_ms);
                TrackRenderer::Chord(r)
            }
        };
        info!("Added {:?} track '{}' ({})", kind, track.name, id);
        self.renderers.push(renderer);

        if kind == TrackKind::Quantitative {
            self.bands = bands;
            self.propagate();
        }
        Ok(())
    }

    fn on_removed(&mut self, id: TrackId) -> Result<()> {
        let before = self.renderers.len();
        self.renderers.retain(|r| r.track_id() != Some(id));
        if self.renderers.len() == before {
            return Ok(());
        }
        info!("Removed track {}", id);
        self.bands = Self::allocate(self.config.get(), self.quantitative_renderers())?;
        self.propagate();
        Ok(())
    }

    fn on_track_option(&mut self, id: TrackId, key: ConfigKey) {
        let timing = self.transition();
        let Some(track) = self.tracks.get(id) else {
            return;
        };
        debug!("Track {} setting '{}' changed", id, key.name());
        for renderer in self
            .renderers
            .iter_mut()
            .filter(|r| r.track_id() == Some(id))
        {
            renderer.apply_config(&track.config, timing);
        }
    }

    fn relayout(&mut self, sectors_changed: bool) -> Result<()> {
        let config = self.config.get().clone();
        if sectors_changed {
            self.sectors = layout_sectors(&self.genome, config.total_gap)?;
        }
        self.viewport = Viewport::new(config.width, config.height);
        self.bands = Self::allocate(&config, self.quantitative_renderers())?;
        self.propagate();
        Ok(())
    }

    /// Hand the current sectors and bands to every renderer: the i-th
    /// quantitative renderer gets the i-th band from the center.
    fn propagate(&mut self) {
        let timing = self.transition();
        let mut slot = 0;
        for renderer in &mut self.renderers {
            match renderer {
                TrackRenderer::Label(r) => r.relayout(&self.sectors, self.bands.label, timing),
                TrackRenderer::Quantitative(r) => {
                    match self.bands.tracks.get(slot) {
                        Some(band) => r.relayout(&self.sectors, *band, timing),
                        None => warn!("No band left for track '{}'", r.name()),
                    }
                    slot += 1;
                }
                TrackRenderer::Chord(r) => {
                    r.relayout(&self.sectors, self.bands.chord_radius(), timing)
                }
            }
        }
        debug!(
            "Propagated {} bands to {} renderers",
            self.bands.len(),
            self.renderers.len()
        );
    }

    /// Handle pending events and apply every fetch that has resolved.
    /// Never blocks; returns the number of resolved fetches.
    pub fn pump(&mut self) -> Result<usize> {
        self.handle_events()?;
        self.debounce.tick(self.now_ms);

        let timing = self.transition();
        let timeout_ms = self.config.get().fetch_timeout_ms as f64;
        let mut resolved = 0;
        for renderer in &mut self.renderers {
            let Some(id) = renderer.track_id() else {
                continue;
            };
            if let Some(track) = self.tracks.get(id) {
                resolved += renderer.poll(track, &self.genome, timing, timeout_ms);
            }
        }
        Ok(resolved)
    }

    pub fn has_outstanding(&self) -> bool {
        self.renderers.iter().any(TrackRenderer::has_outstanding)
    }

    /// Pump until no fetch is outstanding, sleeping briefly between rounds.
    /// Returns whether everything settled within `max_rounds`.
    pub fn run_until_settled(&mut self, max_rounds: usize) -> Result<bool> {
        for round in 0..max_rounds {
            self.pump()?;
            if !self.has_outstanding() {
                debug!("All tracks settled after {} rounds", round + 1);
                return Ok(true);
            }
            thread::sleep(Duration::from_millis(1));
        }
        Ok(!self.has_outstanding())
    }

    /// Apply a new pan/zoom. Quantitative tracks request detail for their
    /// visible chromosomes when the scale went up; returns the number of
    /// requests issued.
    pub fn zoom(&mut self, view: ViewTransform) -> usize {
        self.view = view;
        self.debounce.arm(self.now_ms, view.scale);

        let mut issued = 0;
        for renderer in &mut self.renderers {
            if let TrackRenderer::Quantitative(r) = renderer {
                if let Some(track) = self.tracks.get(r.id()) {
                    issued += r.update_scale(track, &self.genome, &view, &self.viewport, self.now_ms);
                }
            }
        }
        if issued > 0 {
            info!(
                "Zoom to {:.2}x requested detail for {} chromosome segments",
                view.scale, issued
            );
        }
        issued
    }

    /// Give up on every fetch still outstanding: move the logical clock past
    /// the fetch timeout and pump once. Returns the number of tracks left
    /// failed.
    pub fn expire_outstanding(&mut self) -> Result<usize> {
        if !self.has_outstanding() {
            return Ok(0);
        }
        self.advance_time(self.config.get().fetch_timeout_ms as f64);
        self.pump()?;
        Ok(self
            .renderers
            .iter()
            .filter(|r| r.state().is_some_and(RenderState::is_failed))
            .count())
    }

    /// Move the logical clock forward; animations and the zoom debounce
    /// follow it.
    pub fn advance_time(&mut self, ms: f64) {
        self.now_ms += ms.max(0.0);
        self.debounce.tick(self.now_ms);
    }

    pub fn set_settle_hook<F>(&mut self, hook: F)
    where
        F: FnMut(f64) + 'static,
    {
        self.debounce.set_hook(hook);
    }

    pub fn genome(&self) -> &Genome {
        &self.genome
    }

    pub fn config(&self) -> &VizConfig {
        self.config.get()
    }

    pub fn sectors(&self) -> &[ChromSector] {
        &self.sectors
    }

    pub fn bands(&self) -> &BandLayout {
        &self.bands
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn view(&self) -> ViewTransform {
        self.view
    }

    pub fn now_ms(&self) -> f64 {
        self.now_ms
    }

    pub fn track_ids(&self) -> Vec<TrackId> {
        self.tracks.ids()
    }

    pub fn track(&self, id: TrackId) -> Option<&Track> {
        self.tracks.get(id)
    }

    pub fn renderer(&self, id: TrackId) -> Option<&TrackRenderer> {
        self.renderers.iter().find(|r| r.track_id() == Some(id))
    }

    pub fn render_state(&self, id: TrackId) -> Option<RenderState> {
        self.renderer(id)?.state().cloned()
    }

    pub fn data_bounds(&self, id: TrackId) -> Option<DataBounds> {
        match self.renderer(id)? {
            TrackRenderer::Quantitative(r) => r.bounds(),
            _ => None,
        }
    }

    /// Band a track is placed in. Chord tracks report the innermost band
    /// they anchor to.
    pub fn band_of(&self, id: TrackId) -> Option<RadialBand> {
        match self.renderer(id)? {
            TrackRenderer::Quantitative(r) => Some(r.band()),
            TrackRenderer::Chord(_) => Some(
                self.bands
                    .tracks
                    .first()
                    .copied()
                    .unwrap_or(self.bands.label),
            ),
            TrackRenderer::Label(_) => None,
        }
    }

    pub fn scene(&self) -> SceneNode {
        self.scene_at(self.now_ms)
    }

    /// Every ring's scene group, label ring first, sampled at `now_ms`.
    pub fn scene_at(&self, now_ms: f64) -> SceneNode {
        SceneNode::group(
            "circos",
            None,
            self.renderers.iter().map(|r| r.scene(now_ms)).collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{MemoryDataManager, QueuedDataManager};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn viz() -> Visualization {
        let genome = Genome::from_lengths([("chr1", 100), ("chr2", 50)]).unwrap();
        Visualization::new(genome, VizConfig::default()).unwrap()
    }

    fn values() -> Box<dyn DataManager> {
        Box::new(MemoryDataManager::from_values(&[vec![1.0, 2.0, 3.0], vec![4.0, 5.0]]))
    }

    #[test]
    fn test_empty_genome_is_fatal() {
        let genome = Genome::new(Vec::new()).unwrap();
        assert!(matches!(
            Visualization::new(genome, VizConfig::default()),
            Err(CircosError::EmptyGenome)
        ));
    }

    #[test]
    fn test_track_that_does_not_fit_is_rejected_cleanly() {
        let mut viz = viz();
        for i in 0..6 {
            viz.add_track(format!("t{}", i), TrackKind::Quantitative, TrackConfig::new(), values())
                .unwrap();
        }
        let err = viz
            .add_track("t6", TrackKind::Quantitative, TrackConfig::new(), values())
            .unwrap_err();
        assert!(matches!(err, CircosError::InvalidBandConfig(_)));
        assert_eq!(viz.track_ids().len(), 6);
        assert_eq!(viz.bands().tracks.len(), 6);
    }

    #[test]
    fn test_gap_change_relays_sectors_and_bands() {
        let mut viz = viz();
        let id = viz
            .add_track("cov", TrackKind::Quantitative, TrackConfig::new(), values())
            .unwrap();
        let old_end = viz.sectors()[0].end_angle;

        let changed = viz
            .update_config(|c| {
                c.total_gap = 0.1;
                c.track_height = 40.0;
            })
            .unwrap();
        assert_eq!(changed, vec![SharedKey::TrackHeight, SharedKey::TotalGap]);
        assert!(viz.sectors()[0].end_angle > old_end);
        assert_eq!(viz.band_of(id).unwrap().height(), 40.0);

        assert!(viz.update_config(|c| c.track_gap = 0.0).is_err());
        assert_eq!(viz.config().track_gap, 5.0);
    }

    #[test]
    fn test_track_config_edits_reach_renderer_on_pump() {
        let mut viz = viz();
        let id = viz
            .add_track("cov", TrackKind::Quantitative, TrackConfig::new(), values())
            .unwrap();
        viz.run_until_settled(10).unwrap();

        viz.track_config_mut(id)
            .unwrap()
            .set(ConfigKey::MinValue, ConfigValue::Number(0.0))
            .unwrap();
        assert_eq!(viz.data_bounds(id), Some(DataBounds { min: 1.0, max: 5.0 }));
        viz.pump().unwrap();
        assert_eq!(viz.data_bounds(id), Some(DataBounds { min: 0.0, max: 5.0 }));

        assert!(viz.unset_track_option(id, ConfigKey::MinValue).unwrap());
        assert_eq!(viz.data_bounds(id), Some(DataBounds { min: 1.0, max: 5.0 }));
    }

    #[test]
    fn test_settle_hook_fires_after_debounce() {
        let settled = Rc::new(RefCell::new(None));
        let mut viz = viz();
        let s = Rc::clone(&settled);
        viz.set_settle_hook(move |scale| *s.borrow_mut() = Some(scale));

        viz.zoom(ViewTransform::new(2.0, 0.0, 0.0));
        viz.advance_time(200.0);
        viz.zoom(ViewTransform::new(3.0, 0.0, 0.0));
        viz.advance_time(300.0);
        assert_eq!(*settled.borrow(), None);
        viz.advance_time(100.0);
        assert_eq!(*settled.borrow(), Some(3.0));
    }

    #[test]
    fn test_unknown_track_errors() {
        let mut viz = viz();
        assert!(matches!(
            viz.remove_track(TrackId(42)),
            Err(CircosError::UnknownTrack(42))
        ));
        assert!(viz
            .set_track_option(TrackId(42), ConfigKey::MaxValue, ConfigValue::Number(1.0))
            .is_err());
    }

    #[test]
    fn test_expire_outstanding_fails_silent_tracks() {
        let mut viz = viz();
        let (source, _queue) = QueuedDataManager::new(false);
        let silent = viz
            .add_track("silent", TrackKind::Quantitative, TrackConfig::new(), Box::new(source))
            .unwrap();
        let healthy = viz
            .add_track("cov", TrackKind::Quantitative, TrackConfig::new(), values())
            .unwrap();

        assert!(!viz.run_until_settled(5).unwrap());
        assert_eq!(viz.render_state(silent), Some(RenderState::AwaitingData));

        assert_eq!(viz.expire_outstanding().unwrap(), 1);
        assert!(viz.render_state(silent).unwrap().is_failed());
        assert_eq!(viz.render_state(healthy), Some(RenderState::DataRendered));
        assert!(!viz.has_outstanding());
        assert_eq!(viz.expire_outstanding().unwrap(), 0);
    }
}
