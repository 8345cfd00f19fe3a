//! Circular (Circos-style) genome visualization engine.
//!
//! Chromosomes are laid out as arcs around a ring and any number of
//! concentric tracks are stacked over them. Quantitative tracks draw
//! per-chromosome data areas, chord tracks connect pairs of genomic
//! positions, and an outer label band carries chromosome names and ticks.
//! The engine produces a [`scene::SceneNode`] tree which the `output`
//! module turns into SVG or a raster image.

pub mod color;
pub mod config;
pub mod data;
pub mod error;
pub mod genome;
pub mod geometry;
pub mod layout;
pub mod observe;
pub mod output;
pub mod render;
pub mod scene;
pub mod track;
pub mod viz;
pub mod zoom;

pub use color::Rgb;
pub use config::{ConfigKey, ConfigValue, SharedConfig, TrackConfig, VizConfig};
pub use data::{ChromData, DataManager, DataMode, DataPoint, Pending};
pub use error::{CircosError, Result};
pub use genome::{Chromosome, Genome, Region};
pub use geometry::{ViewTransform, Viewport};
pub use layout::{BandLayout, ChromSector, RadialBand};
pub use render::{DataBounds, RenderState};
pub use track::{TrackId, TrackKind};
pub use viz::Visualization;
