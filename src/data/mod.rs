//! Per-track data sources.
//!
//! Every fetch returns a [`Pending`] so that callers never block: the
//! visualization polls outstanding requests on each pump and applies
//! whatever has arrived, in whatever order it arrives.

mod file;
mod memory;
mod pending;

pub use file::{BinnedFileDataManager, LinkFileDataManager};
pub use memory::{DataRequest, MemoryDataManager, QueuedDataManager, RequestQueue};
pub use pending::{Pending, Resolution, Resolver};

use crate::genome::{Genome, Region};

/// One data tuple on a chromosome.
#[derive(Debug, Clone, PartialEq)]
pub enum DataPoint {
    /// A quantitative value at a base position.
    Value { position: u64, value: f64 },
    /// A link from `position` on this chromosome to a mate position elsewhere.
    Link {
        position: u64,
        mate_chrom: String,
        mate_position: u64,
    },
}

impl DataPoint {
    pub fn value(position: u64, value: f64) -> Self {
        DataPoint::Value { position, value }
    }

    pub fn link(position: u64, mate_chrom: impl Into<String>, mate_position: u64) -> Self {
        DataPoint::Link {
            position,
            mate_chrom: mate_chrom.into(),
            mate_position,
        }
    }

    pub fn position(&self) -> u64 {
        match self {
            DataPoint::Value { position, .. } | DataPoint::Link { position, .. } => *position,
        }
    }

    /// Numeric value; links and non-finite values count as 0.
    pub fn numeric(&self) -> f64 {
        match self {
            DataPoint::Value { value, .. } if value.is_finite() => *value,
            _ => 0.0,
        }
    }
}

/// Data for one chromosome, positionally aligned with `Genome::chromosomes()`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChromData {
    pub data: Vec<DataPoint>,
}

impl ChromData {
    pub fn from_values(values: &[f64]) -> Self {
        Self {
            data: values
                .iter()
                .enumerate()
                .map(|(i, &v)| DataPoint::value(i as u64, v))
                .collect(),
        }
    }
}

/// How a refinement request should summarize the region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataMode {
    /// Binned values whose resolution follows the zoom scale.
    Coverage,
    /// Every stored data point in the region.
    Raw,
}

/// Source of a track's data.
pub trait DataManager {
    fn is_ready(&self) -> Pending<bool>;

    /// Coarse data for every chromosome, in genome order.
    fn genome_wide_data(&self, genome: &Genome) -> Pending<Vec<ChromData>>;

    /// Whether `refine` at `scale` delivers more detail for `region` than
    /// data already fetched at `held_scale` (genome-wide data counts as 1).
    fn can_refine(&self, region: &Region, held_scale: f64, scale: f64) -> bool;

    fn refine(
        &self,
        region: &Region,
        mode: DataMode,
        start_index: usize,
        scale: f64,
    ) -> Pending<Vec<DataPoint>>;
}
