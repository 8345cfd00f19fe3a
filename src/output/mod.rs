//! Rendering hosts: turn a scene into an SVG document or a raster image.

pub mod font;
mod raster;
mod svg;

pub use raster::render_raster;
pub use svg::render_svg;

use log::info;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::color::Rgb;
use crate::error::Result;
use crate::geometry::{ViewTransform, Viewport};
use crate::scene::SceneNode;
use crate::viz::Visualization;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Svg,
    /// Any format `image` can write, chosen by extension.
    Raster,
}

impl OutputFormat {
    pub fn from_path(path: &Path) -> Self {
        let is_svg = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("svg"))
            .unwrap_or(false);
        if is_svg {
            OutputFormat::Svg
        } else {
            OutputFormat::Raster
        }
    }
}

/// Surface the scene is drawn onto.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub viewport: Viewport,
    pub view: ViewTransform,
    pub background: Rgb,
}

impl Frame {
    pub fn of(viz: &Visualization) -> Self {
        Self {
            viewport: viz.viewport(),
            view: viz.view(),
            background: viz.config().background_color,
        }
    }
}

pub fn write_scene(path: &Path, scene: &SceneNode, frame: &Frame) -> Result<()> {
    match OutputFormat::from_path(path) {
        OutputFormat::Svg => {
            info!("Rendering SVG...");
            let svg = render_svg(scene, frame);
            info!("Saving to {:?}...", path);
            let mut file = File::create(path)?;
            file.write_all(svg.as_bytes())?;
        }
        OutputFormat::Raster => {
            info!("Rendering image...");
            let image = render_raster(scene, frame);
            info!("Saving to {:?}...", path);
            image::DynamicImage::ImageRgba8(image).into_rgb8().save(path)?;
        }
    }
    Ok(())
}

/// Write the visualization's current scene, format picked by extension.
pub fn write_visualization(viz: &Visualization, path: &Path) -> Result<()> {
    write_scene(path, &viz.scene(), &Frame::of(viz))
}
