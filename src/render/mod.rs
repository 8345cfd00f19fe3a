//! Track renderers.
//!
//! Each renderer turns one track's layout and data into a scene group. They
//! form a closed set, dispatched by `match` in [`TrackRenderer`].

mod chord;
mod label;
mod quantitative;

pub use chord::{ChordRenderer, CHORD_WIDTH};
pub use label::LabelRenderer;
pub use quantitative::QuantitativeRenderer;

use crate::color::Rgb;
use crate::config::{ConfigKey, TrackConfig, VizConfig};
use crate::error::CircosError;
use crate::genome::Genome;
use crate::layout::RadialBand;
use crate::scene::{SceneNode, Timing};
use crate::track::{Track, TrackId};

/// Lifecycle of a data-backed track.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderState {
    Initializing,
    /// Loading-colored background arcs are on screen.
    BackgroundDrawn,
    /// A fetch is outstanding.
    AwaitingData,
    DataRendered,
    /// The data source rejected, dropped or never answered a fetch; the
    /// reason is kept.
    Failed(String),
}

impl RenderState {
    pub fn is_failed(&self) -> bool {
        matches!(self, RenderState::Failed(_))
    }
}

/// Background fills used while loading, once data is shown, and on failure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Palette {
    pub loading: Rgb,
    pub idle: Rgb,
    pub error: Rgb,
}

impl Palette {
    pub fn from_config(config: &VizConfig) -> Self {
        Self {
            loading: config.loading_color,
            idle: config.idle_color,
            error: config.error_color,
        }
    }

    pub fn background(&self, state: &RenderState) -> Rgb {
        match state {
            RenderState::DataRendered => self.idle,
            RenderState::Failed(_) => self.error,
            _ => self.loading,
        }
    }
}

fn fetch_expired(issued_ms: f64, now_ms: f64, timeout_ms: f64) -> bool {
    now_ms - issued_ms >= timeout_ms
}

fn fetch_timed_out(track: &str, timeout_ms: f64) -> CircosError {
    CircosError::DataUnavailable {
        track: track.to_string(),
        reason: format!("no response within {} ms", timeout_ms),
    }
}

/// Nearest-rank percentile of an ascending slice, `p` in `[0, 1]`.
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() || !(0.0..=1.0).contains(&p) {
        return None;
    }
    let n = sorted.len();
    // The epsilon keeps exact products like 0.98 * 50 on their own rank.
    let rank = ((p * n as f64) - 1e-9).ceil().clamp(1.0, n as f64) as usize;
    Some(sorted[rank - 1])
}

/// Value range mapped onto a track's band.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DataBounds {
    pub min: f64,
    pub max: f64,
}

impl DataBounds {
    pub const UPPER_PERCENTILE: f64 = 0.98;

    /// `[min, p98]` of the values, falling back to the true maximum when the
    /// percentile is zero or not finite. Non-finite values count as zero.
    pub fn from_values<I: IntoIterator<Item = f64>>(values: I) -> Option<Self> {
        let mut sorted: Vec<f64> = values
            .into_iter()
            .map(|v| if v.is_finite() { v } else { 0.0 })
            .collect();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by(f64::total_cmp);

        let min = sorted[0];
        let true_max = sorted[sorted.len() - 1];
        let max = match percentile(&sorted, Self::UPPER_PERCENTILE) {
            Some(q) if q.is_finite() && q != 0.0 => q.min(true_max),
            _ => true_max,
        };
        Some(Self { min, max })
    }

    /// Apply the track's explicit `min_value` / `max_value`.
    pub fn with_overrides(self, config: &TrackConfig) -> Self {
        Self {
            min: config.number(ConfigKey::MinValue).unwrap_or(self.min),
            max: config.number(ConfigKey::MaxValue).unwrap_or(self.max),
        }
    }

    /// Clamped linear map of `value` onto `[band.inner, band.outer]`.
    /// A degenerate range puts everything on the inner edge.
    pub fn scale(&self, value: f64, band: &RadialBand) -> f64 {
        let span = self.max - self.min;
        if !(span > 0.0) || !value.is_finite() {
            return band.inner_radius;
        }
        let t = ((value - self.min) / span).clamp(0.0, 1.0);
        band.inner_radius + t * band.height()
    }
}

/// Renderer for one ring of the plot.
#[derive(Debug)]
pub enum TrackRenderer {
    Label(LabelRenderer),
    Quantitative(QuantitativeRenderer),
    Chord(ChordRenderer),
}

impl TrackRenderer {
    /// The backing track; the label ring has none.
    pub fn track_id(&self) -> Option<TrackId> {
        match self {
            TrackRenderer::Label(_) => None,
            TrackRenderer::Quantitative(r) => Some(r.id()),
            TrackRenderer::Chord(r) => Some(r.id()),
        }
    }

    pub fn state(&self) -> Option<&RenderState> {
        match self {
            TrackRenderer::Label(_) => None,
            TrackRenderer::Quantitative(r) => Some(r.state()),
            TrackRenderer::Chord(r) => Some(r.state()),
        }
    }

    /// Apply whatever outstanding fetches have resolved or timed out;
    /// returns how many did.
    pub fn poll(&mut self, track: &Track, genome: &Genome, timing: Timing, timeout_ms: f64) -> usize {
        match self {
            TrackRenderer::Label(_) => 0,
            TrackRenderer::Quantitative(r) => r.poll(track, genome, timing, timeout_ms),
            TrackRenderer::Chord(r) => r.poll(track, genome, timing, timeout_ms),
        }
    }

    pub fn has_outstanding(&self) -> bool {
        match self {
            TrackRenderer::Label(_) => false,
            TrackRenderer::Quantitative(r) => r.has_outstanding(),
            TrackRenderer::Chord(r) => r.has_outstanding(),
        }
    }

    pub fn apply_config(&mut self, config: &TrackConfig, timing: Timing) {
        match self {
            TrackRenderer::Label(_) => {}
            TrackRenderer::Quantitative(r) => r.apply_config(config, timing),
            TrackRenderer::Chord(r) => r.apply_config(config),
        }
    }

    pub fn set_appearance(&mut self, config: &VizConfig) {
        let palette = Palette::from_config(config);
        match self {
            TrackRenderer::Label(r) => r.set_appearance(palette, config.tick_step),
            TrackRenderer::Quantitative(r) => r.set_palette(palette),
            TrackRenderer::Chord(r) => r.set_palette(palette),
        }
    }

    pub fn scene(&self, now_ms: f64) -> SceneNode {
        match self {
            TrackRenderer::Label(r) => r.scene(now_ms),
            TrackRenderer::Quantitative(r) => r.scene(now_ms),
            TrackRenderer::Chord(r) => r.scene(now_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigValue;

    const BAND: RadialBand = RadialBand {
        inner_radius: 100.0,
        outer_radius: 160.0,
    };

    #[test]
    fn test_bounds_of_small_set_use_true_max() {
        let bounds = DataBounds::from_values([1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        assert_eq!(bounds, DataBounds { min: 1.0, max: 5.0 });
    }

    #[test]
    fn test_bounds_clip_outliers() {
        let mut values: Vec<f64> = (1..=100).map(|v| v as f64).collect();
        values.push(1e6);
        let bounds = DataBounds::from_values(values).unwrap();
        assert_eq!(bounds.min, 1.0);
        assert_eq!(bounds.max, 99.0);
    }

    #[test]
    fn test_percentile_never_exceeds_max() {
        for n in 1..200 {
            let values: Vec<f64> = (0..n).map(|v| v as f64 * 0.5).collect();
            let bounds = DataBounds::from_values(values.clone()).unwrap();
            assert!(bounds.max <= values[n - 1]);
            assert_eq!(bounds.min, 0.0);
        }
    }

    #[test]
    fn test_zero_percentile_falls_back_to_max() {
        let mut values = vec![0.0; 99];
        values.push(7.0);
        assert_eq!(DataBounds::from_values(values).unwrap().max, 7.0);
        assert_eq!(DataBounds::from_values(Vec::new()), None);
        let bounds = DataBounds::from_values([f64::NAN, 2.0]).unwrap();
        assert_eq!(bounds, DataBounds { min: 0.0, max: 2.0 });
    }

    #[test]
    fn test_overrides_replace_each_side() {
        let config = TrackConfig::new()
            .with(ConfigKey::MaxValue, ConfigValue::Number(10.0))
            .unwrap();
        let bounds = DataBounds { min: 1.0, max: 5.0 }.with_overrides(&config);
        assert_eq!(bounds, DataBounds { min: 1.0, max: 10.0 });
    }

    #[test]
    fn test_scale_is_clamped_to_band() {
        let bounds = DataBounds { min: 0.0, max: 10.0 };
        assert_eq!(bounds.scale(5.0, &BAND), 130.0);
        assert_eq!(bounds.scale(-3.0, &BAND), 100.0);
        assert_eq!(bounds.scale(50.0, &BAND), 160.0);
        assert_eq!(DataBounds { min: 2.0, max: 2.0 }.scale(2.0, &BAND), 100.0);
    }

    #[test]
    fn test_palette_follows_state() {
        let palette = Palette::from_config(&VizConfig::default());
        assert_eq!(palette.background(&RenderState::AwaitingData), palette.loading);
        assert_eq!(palette.background(&RenderState::DataRendered), palette.idle);
        assert_eq!(
            palette.background(&RenderState::Failed("x".to_string())),
            palette.error
        );
    }
}
