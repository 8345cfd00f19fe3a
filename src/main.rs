use clap::Parser;
use log::{info, warn};
use std::path::{Path, PathBuf};

use circoslook::config::{TrackConfig, VizConfig};
use circoslook::data::{BinnedFileDataManager, LinkFileDataManager};
use circoslook::error::Result;
use circoslook::genome::Genome;
use circoslook::geometry::ViewTransform;
use circoslook::output::write_visualization;
use circoslook::render::RenderState;
use circoslook::track::TrackKind;
use circoslook::viz::Visualization;

/// Rounds of polling before giving up on data sources.
const SETTLE_ROUNDS: usize = 10_000;

#[derive(Parser)]
#[command(name = "circoslook")]
#[command(about = "Draw genomic data as a circular (Circos-style) plot.", long_about = None)]
struct Args {
    // MANDATORY OPTIONS
    /// Load chromosome names and lengths (name<TAB>length) from this FILE.
    #[arg(short = 'g', long = "genome", value_name = "FILE")]
    genome: PathBuf,

    /// Write the visualization to this FILE (PNG or SVG based on extension).
    #[arg(short = 'o', long = "out", value_name = "FILE")]
    out: PathBuf,

    // Track Options
    /// Add a quantitative track from a bedGraph-like FILE (chrom start end value). Repeatable.
    #[arg(short = 'q', long = "quantitative", value_name = "FILE")]
    quantitative: Vec<PathBuf>,

    /// Add a chord track from a FILE of links (chromA posA chromB posB). Repeatable.
    #[arg(short = 'c', long = "chords", value_name = "FILE")]
    chords: Vec<PathBuf>,

    /// Number of bins per chromosome for genome-wide quantitative data.
    #[arg(short = 'b', long = "bins", value_name = "N", default_value_t = 200)]
    bins: usize,

    // Layout Options
    /// Read layout and color settings from this TOML FILE.
    #[arg(short = 'C', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Set the width in pixels of the output image.
    #[arg(short = 'x', long = "width", value_name = "N")]
    width: Option<u32>,

    /// Set the height in pixels of the output image.
    #[arg(short = 'y', long = "height", value_name = "N")]
    height: Option<u32>,

    /// Radial height in pixels of each quantitative track.
    #[arg(short = 'H', long = "track-height", value_name = "FLOAT")]
    track_height: Option<f64>,

    /// Radial gap in pixels between tracks.
    #[arg(short = 'G', long = "track-gap", value_name = "FLOAT")]
    track_gap: Option<f64>,

    /// Fraction of the circle left as gaps between chromosomes.
    #[arg(short = 'f', long = "gap-fraction", value_name = "FLOAT")]
    gap_fraction: Option<f64>,

    // View Options
    /// Zoom into the plot by this factor before writing it.
    #[arg(short = 'z', long = "zoom", value_name = "SCALE")]
    zoom: Option<f64>,

    /// Pan offset in pixels applied with the zoom.
    #[arg(short = 'p', long = "pan", value_name = "X,Y", value_parser = parse_pan, requires = "zoom")]
    pan: Option<(f64, f64)>,

    // General Options
    /// Number of threads to use for parallel operations.
    #[arg(short = 't', long = "threads", value_name = "N", default_value_t = 1)]
    threads: usize,

    /// Verbosity level (0 = error, 1 = info, 2 = debug).
    #[arg(short = 'v', long = "verbose", value_name = "N", default_value_t = 1)]
    verbose: u8,
}

fn parse_pan(s: &str) -> std::result::Result<(f64, f64), String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y, got '{}'", s))?;
    let x = x.trim().parse::<f64>().map_err(|e| e.to_string())?;
    let y = y.trim().parse::<f64>().map_err(|e| e.to_string())?;
    Ok((x, y))
}

fn track_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn load_config(args: &Args) -> Result<VizConfig> {
    let mut config = match &args.config {
        Some(path) => {
            info!("Loading config from {:?}...", path);
            VizConfig::from_toml_file(path)?
        }
        None => VizConfig::default(),
    };

    if let Some(width) = args.width {
        config.width = width;
    }
    if let Some(height) = args.height {
        config.height = height;
    }
    if let Some(track_height) = args.track_height {
        config.track_height = track_height;
    }
    if let Some(track_gap) = args.track_gap {
        config.track_gap = track_gap;
    }
    if let Some(gap_fraction) = args.gap_fraction {
        config.total_gap = gap_fraction;
    }
    config.validate()?;
    Ok(config)
}

fn settle(viz: &mut Visualization) -> Result<()> {
    if !viz.run_until_settled(SETTLE_ROUNDS)? {
        let failed = viz.expire_outstanding()?;
        warn!("Gave up waiting for data; {} tracks have none", failed);
    }
    Ok(())
}

fn run(args: &Args) -> Result<()> {
    let config = load_config(args)?;
    let transition_ms = config.transition_ms as f64;

    info!("Loading genome from {:?}...", args.genome);
    let genome = Genome::from_chrom_sizes_file(&args.genome)?;
    info!(
        "{} chromosomes, {} bp in total",
        genome.len(),
        genome.total_length()
    );

    let mut viz = Visualization::new(genome, config)?;

    for path in &args.quantitative {
        let source = BinnedFileDataManager::from_file(path, viz.genome(), args.bins)?;
        viz.add_track(
            track_name(path),
            TrackKind::Quantitative,
            TrackConfig::new(),
            Box::new(source),
        )?;
    }
    for path in &args.chords {
        let source = LinkFileDataManager::from_file(path, viz.genome())?;
        viz.add_track(
            track_name(path),
            TrackKind::Chord,
            TrackConfig::new(),
            Box::new(source),
        )?;
    }

    info!("Waiting for track data...");
    settle(&mut viz)?;

    if let Some(scale) = args.zoom {
        let (tx, ty) = args.pan.unwrap_or((0.0, 0.0));
        viz.zoom(ViewTransform::new(scale, tx, ty));
        settle(&mut viz)?;
    }

    // Let every transition finish so the output shows final geometry.
    viz.advance_time(transition_ms);

    for id in viz.track_ids() {
        if let (Some(track), Some(RenderState::Failed(reason))) = (viz.track(id), viz.render_state(id)) {
            warn!("Track {} ({}) has no data: {}", track.name, id, reason);
        }
    }

    write_visualization(&viz, &args.out)
}

fn main() {
    let args = Args::parse();

    // Initialize logger based on verbosity
    env_logger::Builder::new()
        .filter_level(match args.verbose {
            0 => log::LevelFilter::Error,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .init();

    if args.threads > 1 {
        if let Err(e) = rayon::ThreadPoolBuilder::new()
            .num_threads(args.threads)
            .build_global()
        {
            warn!("Could not configure {} threads: {}", args.threads, e);
        }
    }

    info!("Starting visualization...");

    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    info!("Done.");
}
