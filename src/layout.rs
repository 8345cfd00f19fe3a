//! Angular sectors per chromosome and radial bands per track.
//!
//! Both are pure derived values: they are recomputed wholesale on every
//! structural change and never edited in place.

use log::debug;
use std::f64::consts::TAU;

use crate::error::{CircosError, Result};
use crate::genome::Genome;
use crate::scene::Interpolate;

/// Angular span of one chromosome.
#[derive(Debug, Clone, PartialEq)]
pub struct ChromSector {
    pub chrom: String,
    pub start_angle: f64,
    pub end_angle: f64,
    /// Chromosome length in bases.
    pub length: u64,
}

impl ChromSector {
    pub fn span(&self) -> f64 {
        self.end_angle - self.start_angle
    }

    pub fn mid_angle(&self) -> f64 {
        self.start_angle + self.span() / 2.0
    }

    /// Angle of a base position inside this sector.
    ///
    /// Interpolates from the end of the sector backwards, so position 0 lands
    /// on `start_angle` and position `length` on `end_angle`.
    pub fn angle_of(&self, position: u64) -> f64 {
        if self.length == 0 {
            return self.start_angle;
        }
        let remaining = self.length.saturating_sub(position) as f64;
        self.end_angle - self.span() * remaining / self.length as f64
    }
}

/// Pie partition of the circle by chromosome length, in genome order, with
/// `2π·gap_fraction/n` cut from the end of every sector.
pub fn layout_sectors(genome: &Genome, gap_fraction: f64) -> Result<Vec<ChromSector>> {
    let n = genome.len();
    if n == 0 {
        return Err(CircosError::EmptyGenome);
    }
    if !(0.0..1.0).contains(&gap_fraction) {
        return Err(CircosError::InvalidBandConfig(format!(
            "chromosome gap fraction must be in [0, 1), got {}",
            gap_fraction
        )));
    }

    let total = genome.total_length();
    let gap_angle = TAU * gap_fraction / n as f64;

    let mut sectors = Vec::with_capacity(n);
    let mut cursor = 0.0;
    for chrom in genome.chromosomes() {
        // An all-zero genome still needs a ring; share it evenly.
        let share = if total == 0 {
            1.0 / n as f64
        } else {
            chrom.length as f64 / total as f64
        };
        let start_angle = cursor;
        let pie_end = start_angle + share * TAU;
        cursor = pie_end;

        sectors.push(ChromSector {
            chrom: chrom.name.clone(),
            start_angle,
            end_angle: (pie_end - gap_angle).max(start_angle),
            length: chrom.length,
        });
    }

    debug!("Laid out {} sectors (gap angle {:.4} rad)", n, gap_angle);
    Ok(sectors)
}

/// Radial interval `[inner_radius, outer_radius]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadialBand {
    pub inner_radius: f64,
    pub outer_radius: f64,
}

impl RadialBand {
    pub fn height(&self) -> f64 {
        self.outer_radius - self.inner_radius
    }

    pub fn mid_radius(&self) -> f64 {
        self.inner_radius + self.height() / 2.0
    }
}

impl Interpolate for RadialBand {
    fn interpolate(&self, to: &Self, t: f64) -> Self {
        RadialBand {
            inner_radius: self.inner_radius.interpolate(&to.inner_radius, t),
            outer_radius: self.outer_radius.interpolate(&to.outer_radius, t),
        }
    }
}

/// Bands for all quantitative tracks (innermost first) plus the label band.
#[derive(Debug, Clone, PartialEq)]
pub struct BandLayout {
    pub tracks: Vec<RadialBand>,
    pub label: RadialBand,
}

impl BandLayout {
    /// Every band from the center outwards, label band last.
    pub fn all(&self) -> Vec<RadialBand> {
        let mut bands = self.tracks.clone();
        bands.push(self.label);
        bands
    }

    pub fn len(&self) -> usize {
        self.tracks.len() + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Radius chord tracks anchor to: the innermost quantitative band's
    /// inner edge, or the label band when there is no quantitative track.
    pub fn chord_radius(&self) -> f64 {
        self.tracks
            .first()
            .map(|band| band.inner_radius)
            .unwrap_or(self.label.inner_radius)
    }
}

/// Packs `k` bands of height `h` separated by `gap` against the label band,
/// which always occupies `[radius - label_height, radius]`.
///
/// Track `i` gets the `i`-th band from the center, so recomputing after an
/// insertion or removal keeps the relative order of surviving tracks.
pub fn allocate_bands(
    k: usize,
    height: f64,
    gap: f64,
    radius: f64,
    label_height: f64,
) -> Result<BandLayout> {
    if !(height > 0.0) || !(gap > 0.0) {
        return Err(CircosError::InvalidBandConfig(format!(
            "track height and gap must be positive (height {}, gap {})",
            height, gap
        )));
    }
    if !(radius > 0.0) || label_height < 0.0 || label_height > radius {
        return Err(CircosError::InvalidBandConfig(format!(
            "drawing radius {} cannot hold a label band of {}",
            radius, label_height
        )));
    }

    let step = height + gap;
    let start = radius - k as f64 * step + gap - label_height;
    if k > 0 && start < 0.0 {
        return Err(CircosError::InvalidBandConfig(format!(
            "{} tracks of height {} with gap {} do not fit in radius {}",
            k, height, gap, radius
        )));
    }

    let tracks: Vec<RadialBand> = (0..k)
        .map(|i| {
            let pos = start + i as f64 * step;
            RadialBand {
                inner_radius: pos,
                outer_radius: pos + height,
            }
        })
        .collect();

    let label_inner = tracks
        .last()
        .map(|band| band.outer_radius)
        .unwrap_or(radius - label_height);
    let label = RadialBand {
        inner_radius: label_inner,
        outer_radius: label_inner + label_height,
    };

    Ok(BandLayout { tracks, label })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn genome(lengths: &[u64]) -> Genome {
        Genome::from_lengths(
            lengths
                .iter()
                .enumerate()
                .map(|(i, &len)| (format!("chr{}", i + 1), len)),
        )
        .unwrap()
    }

    #[test]
    fn test_empty_genome_is_rejected() {
        let empty = Genome::new(Vec::new()).unwrap();
        assert!(matches!(
            layout_sectors(&empty, 0.1),
            Err(CircosError::EmptyGenome)
        ));
    }

    #[test]
    fn test_spans_plus_gaps_fill_the_circle() {
        for lengths in [vec![100, 50], vec![1, 2, 3, 4, 5], vec![248, 242, 198, 190, 181, 170]] {
            for gap in [0.0, 0.1, 0.3] {
                let g = genome(&lengths);
                let sectors = layout_sectors(&g, gap).unwrap();
                let gap_angle = TAU * gap / lengths.len() as f64;
                let total: f64 = sectors.iter().map(|s| s.span() + gap_angle).sum();
                assert!((total - TAU).abs() < 1e-9, "lengths {:?} gap {}", lengths, gap);
                for (sector, chrom) in sectors.iter().zip(g.chromosomes()) {
                    assert_eq!(sector.chrom, chrom.name);
                }
            }
        }
    }

    #[test]
    fn test_sectors_are_proportional_and_disjoint() {
        let sectors = layout_sectors(&genome(&[100, 50]), 0.1).unwrap();
        let gap_angle = TAU * 0.1 / 2.0;
        assert!((sectors[0].span() - (TAU * 2.0 / 3.0 - gap_angle)).abs() < 1e-12);
        assert!((sectors[1].start_angle - TAU * 2.0 / 3.0).abs() < 1e-12);
        assert!(sectors[0].end_angle < sectors[1].start_angle);
    }

    #[test]
    fn test_zero_length_chromosome_gets_zero_width() {
        let sectors = layout_sectors(&genome(&[100, 0, 100]), 0.2).unwrap();
        assert_eq!(sectors[1].span(), 0.0);
        assert!(sectors[1].start_angle >= sectors[0].end_angle);
    }

    #[test]
    fn test_angle_of_hits_sector_edges() {
        let sectors = layout_sectors(&genome(&[100, 50]), 0.1).unwrap();
        let s = &sectors[1];
        assert!((s.angle_of(0) - s.start_angle).abs() < 1e-12);
        assert!((s.angle_of(50) - s.end_angle).abs() < 1e-12);
        assert!((s.angle_of(25) - s.mid_angle()).abs() < 1e-12);
    }

    #[test]
    fn test_bands_are_packed_against_label_band() {
        let bands = allocate_bands(2, 60.0, 5.0, 460.0, 20.0).unwrap();
        assert_eq!(
            bands.tracks,
            vec![
                RadialBand { inner_radius: 315.0, outer_radius: 375.0 },
                RadialBand { inner_radius: 380.0, outer_radius: 440.0 },
            ]
        );
        assert_eq!(bands.label, RadialBand { inner_radius: 440.0, outer_radius: 460.0 });
        assert_eq!(bands.len(), 3);
        assert_eq!(bands.chord_radius(), 315.0);
    }

    #[test]
    fn test_bands_strictly_increasing_and_idempotent() {
        for k in 0..6 {
            let a = allocate_bands(k, 50.0, 7.0, 460.0, 20.0).unwrap();
            let b = allocate_bands(k, 50.0, 7.0, 460.0, 20.0).unwrap();
            assert_eq!(a, b);
            let all = a.all();
            assert_eq!(all.len(), k + 1);
            for pair in all.windows(2) {
                assert!(pair[0].inner_radius < pair[0].outer_radius);
                assert!(pair[0].outer_radius <= pair[1].inner_radius);
            }
        }
    }

    #[test]
    fn test_no_tracks_leaves_label_band_only() {
        let bands = allocate_bands(0, 60.0, 5.0, 460.0, 20.0).unwrap();
        assert!(bands.tracks.is_empty());
        assert_eq!(bands.label, RadialBand { inner_radius: 440.0, outer_radius: 460.0 });
        assert_eq!(bands.chord_radius(), 440.0);
    }

    #[test]
    fn test_invalid_band_configs() {
        assert!(matches!(
            allocate_bands(1, 0.0, 5.0, 460.0, 20.0),
            Err(CircosError::InvalidBandConfig(_))
        ));
        assert!(matches!(
            allocate_bands(1, 60.0, -1.0, 460.0, 20.0),
            Err(CircosError::InvalidBandConfig(_))
        ));
        assert!(matches!(
            allocate_bands(20, 60.0, 5.0, 460.0, 20.0),
            Err(CircosError::InvalidBandConfig(_))
        ));
    }
}
