use log::debug;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

use crate::color::Rgb;
use crate::error::{CircosError, Result};
use crate::observe::{Subject, SubscriptionId};

/// Settings shared by every track of one visualization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VizConfig {
    /// Radial height of every quantitative track.
    pub track_height: f64,
    /// Radial gap between neighbouring tracks.
    pub track_gap: f64,
    /// Fraction of the full turn spent on gaps between chromosomes.
    pub total_gap: f64,
    pub label_band_height: f64,
    pub margin: f64,
    pub width: u32,
    pub height: u32,
    pub transition_ms: u64,
    pub zoom_debounce_ms: u64,
    /// A fetch still unanswered after this long on the logical clock fails the track.
    pub fetch_timeout_ms: u64,
    /// Genomic distance between two radial ticks.
    pub tick_step: u64,
    pub loading_color: Rgb,
    pub idle_color: Rgb,
    pub error_color: Rgb,
    pub background_color: Rgb,
}

impl Default for VizConfig {
    fn default() -> Self {
        Self {
            track_height: 60.0,
            track_gap: 5.0,
            total_gap: 0.4,
            label_band_height: 20.0,
            margin: 40.0,
            width: 1000,
            height: 1000,
            transition_ms: 1000,
            zoom_debounce_ms: 400,
            fetch_timeout_ms: 30_000,
            tick_step: 25_000_000,
            loading_color: Rgb(255, 255, 204),
            idle_color: Rgb(240, 240, 240),
            error_color: Rgb(244, 204, 204),
            background_color: Rgb::WHITE,
        }
    }
}

impl VizConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.track_height > 0.0) {
            return Err(CircosError::InvalidBandConfig(format!(
                "track height must be positive, got {}",
                self.track_height
            )));
        }
        if !(self.track_gap > 0.0) {
            return Err(CircosError::InvalidBandConfig(format!(
                "track gap must be positive, got {}",
                self.track_gap
            )));
        }
        if !(0.0..1.0).contains(&self.total_gap) {
            return Err(CircosError::InvalidBandConfig(format!(
                "chromosome gap fraction must be in [0, 1), got {}",
                self.total_gap
            )));
        }
        if self.label_band_height < 0.0 || self.margin < 0.0 {
            return Err(CircosError::InvalidBandConfig(
                "label band height and margin cannot be negative".to_string(),
            ));
        }
        if self.width == 0 || self.height == 0 {
            return Err(CircosError::Config("viewport must not be empty".to_string()));
        }
        if self.fetch_timeout_ms == 0 {
            return Err(CircosError::Config("fetch timeout must be positive".to_string()));
        }
        if self.tick_step == 0 {
            return Err(CircosError::Config("tick step must be positive".to_string()));
        }
        Ok(())
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: VizConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            CircosError::Config(format!(
                "failed to read config {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_toml_str(&contents)
    }

    /// Radius available for drawing: half the smaller viewport side minus the margin.
    pub fn drawing_radius(&self) -> f64 {
        self.width.min(self.height) as f64 / 2.0 - self.margin
    }
}

/// Which part of the shared config changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SharedKey {
    TrackHeight,
    TrackGap,
    TotalGap,
    Viewport,
    Appearance,
}

impl SharedKey {
    /// Changes that invalidate sector or band geometry.
    pub fn affects_layout(&self) -> bool {
        !matches!(self, SharedKey::Appearance)
    }
}

/// The visualization's shared config, observable per changed key.
#[derive(Debug)]
pub struct SharedConfig {
    value: VizConfig,
    subject: Subject<SharedKey>,
}

impl SharedConfig {
    pub fn new(value: VizConfig) -> Result<Self> {
        value.validate()?;
        Ok(Self {
            value,
            subject: Subject::new(),
        })
    }

    pub fn get(&self) -> &VizConfig {
        &self.value
    }

    /// Apply `f` to a copy, validate it, then swap it in and notify each changed key.
    pub fn update<F>(&mut self, f: F) -> Result<Vec<SharedKey>>
    where
        F: FnOnce(&mut VizConfig),
    {
        let mut next = self.value.clone();
        f(&mut next);
        next.validate()?;

        let changed = Self::diff(&self.value, &next);
        self.value = next;
        for key in &changed {
            debug!("Shared config changed: {:?}", key);
            self.subject.notify(key);
        }
        Ok(changed)
    }

    pub fn subscribe<F>(&mut self, observer: F) -> SubscriptionId
    where
        F: FnMut(&SharedKey) + 'static,
    {
        self.subject.subscribe(observer)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subject.unsubscribe(id)
    }

    fn diff(old: &VizConfig, new: &VizConfig) -> Vec<SharedKey> {
        let mut changed = Vec::new();
        if old.track_height != new.track_height {
            changed.push(SharedKey::TrackHeight);
        }
        if old.track_gap != new.track_gap {
            changed.push(SharedKey::TrackGap);
        }
        if old.total_gap != new.total_gap {
            changed.push(SharedKey::TotalGap);
        }
        if old.width != new.width
            || old.height != new.height
            || old.margin != new.margin
            || old.label_band_height != new.label_band_height
        {
            changed.push(SharedKey::Viewport);
        }
        if old.loading_color != new.loading_color
            || old.idle_color != new.idle_color
            || old.error_color != new.error_color
            || old.background_color != new.background_color
            || old.transition_ms != new.transition_ms
            || old.zoom_debounce_ms != new.zoom_debounce_ms
            || old.fetch_timeout_ms != new.fetch_timeout_ms
            || old.tick_step != new.tick_step
        {
            changed.push(SharedKey::Appearance);
        }
        changed
    }
}

/// Per-track setting names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    Color,
    /// Overrides `Color` for filled shapes when set.
    BlockColor,
    MinValue,
    MaxValue,
    Height,
    Gap,
    TotalGap,
}

impl ConfigKey {
    pub fn name(&self) -> &'static str {
        match self {
            ConfigKey::Color => "color",
            ConfigKey::BlockColor => "block_color",
            ConfigKey::MinValue => "min_value",
            ConfigKey::MaxValue => "max_value",
            ConfigKey::Height => "height",
            ConfigKey::Gap => "gap",
            ConfigKey::TotalGap => "total_gap",
        }
    }

    fn takes_color(&self) -> bool {
        matches!(self, ConfigKey::Color | ConfigKey::BlockColor)
    }

    /// Parse a value for this key from text: a color for color keys, a number otherwise.
    pub fn parse_value(&self, text: &str) -> Result<ConfigValue> {
        if self.takes_color() {
            return Ok(ConfigValue::Color(text.parse()?));
        }
        text.trim()
            .parse::<f64>()
            .map(ConfigValue::Number)
            .map_err(|_| CircosError::Config(format!("'{}' is not a number for '{}'", text, self.name())))
    }
}

impl FromStr for ConfigKey {
    type Err = CircosError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "color" => ConfigKey::Color,
            "block_color" => ConfigKey::BlockColor,
            "min_value" => ConfigKey::MinValue,
            "max_value" => ConfigKey::MaxValue,
            "height" => ConfigKey::Height,
            "gap" => ConfigKey::Gap,
            "total_gap" => ConfigKey::TotalGap,
            other => return Err(CircosError::Config(format!("unknown track setting '{}'", other))),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigValue {
    Color(Rgb),
    Number(f64),
}

/// Mutable key/value settings of one track.
///
/// Every effective change (set to a new value, or unset of a present key)
/// is announced to observers with the key that changed.
#[derive(Debug, Default)]
pub struct TrackConfig {
    values: FxHashMap<ConfigKey, ConfigValue>,
    subject: Subject<ConfigKey>,
}

impl TrackConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`TrackConfig::set`], used before the config is observed.
    pub fn with(mut self, key: ConfigKey, value: ConfigValue) -> Result<Self> {
        self.set(key, value)?;
        Ok(self)
    }

    pub fn get(&self, key: ConfigKey) -> Option<ConfigValue> {
        self.values.get(&key).copied()
    }

    pub fn set(&mut self, key: ConfigKey, value: ConfigValue) -> Result<()> {
        match (key.takes_color(), value) {
            (true, ConfigValue::Color(_)) => {}
            (false, ConfigValue::Number(n)) if n.is_finite() => {}
            _ => {
                return Err(CircosError::Config(format!(
                    "value {:?} does not fit key '{}'",
                    value,
                    key.name()
                )))
            }
        }

        if self.values.insert(key, value) != Some(value) {
            self.subject.notify(&key);
        }
        Ok(())
    }

    pub fn unset(&mut self, key: ConfigKey) -> bool {
        let removed = self.values.remove(&key).is_some();
        if removed {
            self.subject.notify(&key);
        }
        removed
    }

    pub fn color(&self, key: ConfigKey) -> Option<Rgb> {
        match self.get(key) {
            Some(ConfigValue::Color(c)) => Some(c),
            _ => None,
        }
    }

    pub fn number(&self, key: ConfigKey) -> Option<f64> {
        match self.get(key) {
            Some(ConfigValue::Number(n)) => Some(n),
            _ => None,
        }
    }

    /// Fill color for blocks: `block_color` wins over `color`.
    pub fn fill_color(&self) -> Option<Rgb> {
        self.color(ConfigKey::BlockColor)
            .or_else(|| self.color(ConfigKey::Color))
    }

    /// Observe changes to a single key.
    pub fn subscribe<F>(&mut self, key: ConfigKey, mut observer: F) -> SubscriptionId
    where
        F: FnMut(&ConfigKey) + 'static,
    {
        self.subject.subscribe(move |changed: &ConfigKey| {
            if *changed == key {
                observer(changed);
            }
        })
    }

    pub fn subscribe_all<F>(&mut self, observer: F) -> SubscriptionId
    where
        F: FnMut(&ConfigKey) + 'static,
    {
        self.subject.subscribe(observer)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subject.unsubscribe(id)
    }
}
