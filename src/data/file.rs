use log::{debug, info, warn};
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use super::{ChromData, DataManager, DataMode, DataPoint, Pending};
use crate::error::{CircosError, Result};
use crate::genome::{Genome, Region};

#[derive(Debug, Clone, Copy, PartialEq)]
struct Interval {
    start: u64,
    end: u64,
    value: f64,
}

impl Interval {
    fn mid(&self) -> f64 {
        (self.start as f64 + self.end as f64) / 2.0
    }
}

fn is_header(line: &str) -> bool {
    line.is_empty()
        || line.starts_with('#')
        || line.starts_with("track")
        || line.starts_with("browser")
}

fn parse_u64(field: &str, line: usize, what: &str) -> Result<u64> {
    field.parse().map_err(|_| CircosError::Parse {
        line,
        msg: format!("bad {} '{}'", what, field),
    })
}

/// Quantitative data from a bedGraph-style file (`chrom start end value`).
///
/// Genome-wide data is summarized into `base_bins` bins per chromosome;
/// refinement at zoom scale `s` re-bins the region into `base_bins * s`
/// bins, capped at the number of stored intervals.
#[derive(Debug, Clone)]
pub struct BinnedFileDataManager {
    intervals: FxHashMap<String, Vec<Interval>>,
    base_bins: usize,
}

impl BinnedFileDataManager {
    pub fn from_reader<R: BufRead>(reader: R, genome: &Genome, base_bins: usize) -> Result<Self> {
        if base_bins == 0 {
            return Err(CircosError::Config("bin count must be positive".to_string()));
        }

        let mut intervals: FxHashMap<String, Vec<Interval>> = FxHashMap::default();
        let mut skipped = 0usize;

        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if is_header(line) {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 4 {
                return Err(CircosError::Parse {
                    line: i + 1,
                    msg: "expected 'chrom start end value'".to_string(),
                });
            }
            if genome.index_of(fields[0]).is_none() {
                skipped += 1;
                continue;
            }
            let start = parse_u64(fields[1], i + 1, "start")?;
            let end = parse_u64(fields[2], i + 1, "end")?;
            let value: f64 = fields[3].parse().map_err(|_| CircosError::Parse {
                line: i + 1,
                msg: format!("bad value '{}'", fields[3]),
            })?;
            intervals
                .entry(fields[0].to_string())
                .or_default()
                .push(Interval { start, end, value });
        }

        if skipped > 0 {
            warn!("Skipped {} intervals on chromosomes outside the genome", skipped);
        }
        for list in intervals.values_mut() {
            list.sort_by_key(|iv| iv.start);
        }
        debug!(
            "Loaded {} intervals on {} chromosomes",
            intervals.values().map(Vec::len).sum::<usize>(),
            intervals.len()
        );

        Ok(Self {
            intervals,
            base_bins,
        })
    }

    pub fn from_file<P: AsRef<Path>>(path: P, genome: &Genome, base_bins: usize) -> Result<Self> {
        info!("Loading quantitative track from {:?}...", path.as_ref());
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file), genome, base_bins)
    }

    fn in_region<'a>(&'a self, region: &Region) -> &'a [Interval] {
        let Some(list) = self.intervals.get(&region.chrom) else {
            return &[];
        };
        let lo = list.partition_point(|iv| iv.mid() < region.start as f64);
        let hi = list.partition_point(|iv| iv.mid() < region.end as f64);
        if lo <= hi {
            &list[lo..hi]
        } else {
            &[]
        }
    }

    fn bins_at(&self, scale: f64, available: usize) -> usize {
        ((self.base_bins as f64 * scale.max(1.0)).ceil() as usize).min(available)
    }
}

/// Mean value of the intervals whose midpoint falls in each bin; empty bins are 0.
fn bin_intervals(intervals: &[Interval], start: u64, end: u64, bins: usize) -> Vec<DataPoint> {
    if bins == 0 || end <= start {
        return Vec::new();
    }
    let width = (end - start) as f64 / bins as f64;
    let mut sums = vec![0.0; bins];
    let mut counts = vec![0usize; bins];

    for iv in intervals {
        let offset = iv.mid() - start as f64;
        if offset < 0.0 {
            continue;
        }
        let idx = ((offset / width) as usize).min(bins - 1);
        sums[idx] += iv.value;
        counts[idx] += 1;
    }

    (0..bins)
        .map(|i| {
            let value = if counts[i] > 0 {
                sums[i] / counts[i] as f64
            } else {
                0.0
            };
            DataPoint::value(start + (i as f64 * width) as u64, value)
        })
        .collect()
}

impl DataManager for BinnedFileDataManager {
    fn is_ready(&self) -> Pending<bool> {
        Pending::ready(true)
    }

    fn genome_wide_data(&self, genome: &Genome) -> Pending<Vec<ChromData>> {
        let data = genome
            .chromosomes()
            .par_iter()
            .map(|chrom| {
                let list = self
                    .intervals
                    .get(&chrom.name)
                    .map(Vec::as_slice)
                    .unwrap_or(&[]);
                ChromData {
                    data: bin_intervals(list, 0, chrom.length, self.bins_at(1.0, list.len())),
                }
            })
            .collect();
        Pending::ready(data)
    }

    fn can_refine(&self, region: &Region, held_scale: f64, scale: f64) -> bool {
        let available = self.in_region(region).len();
        self.bins_at(scale, available) > self.bins_at(held_scale, available)
    }

    fn refine(
        &self,
        region: &Region,
        mode: DataMode,
        start_index: usize,
        scale: f64,
    ) -> Pending<Vec<DataPoint>> {
        let list = self.in_region(region);
        let points: Vec<DataPoint> = match mode {
            DataMode::Coverage => {
                bin_intervals(list, region.start, region.end, self.bins_at(scale, list.len()))
            }
            DataMode::Raw => list
                .iter()
                .map(|iv| DataPoint::value(iv.start, iv.value))
                .collect(),
        };
        Pending::ready(points.into_iter().skip(start_index).collect())
    }
}

/// Pairwise links from a whitespace separated file (`chromA posA chromB posB`).
#[derive(Debug, Clone)]
pub struct LinkFileDataManager {
    name: String,
    links: FxHashMap<String, Vec<DataPoint>>,
}

impl LinkFileDataManager {
    pub fn from_reader<R: BufRead>(reader: R, name: impl Into<String>, genome: &Genome) -> Result<Self> {
        let mut links: FxHashMap<String, Vec<DataPoint>> = FxHashMap::default();
        let mut skipped = 0usize;

        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if is_header(line) {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 4 {
                return Err(CircosError::Parse {
                    line: i + 1,
                    msg: "expected 'chromA posA chromB posB'".to_string(),
                });
            }
            let pos_a = parse_u64(fields[1], i + 1, "position")?;
            let pos_b = parse_u64(fields[3], i + 1, "position")?;
            if genome.index_of(fields[0]).is_none() || genome.index_of(fields[2]).is_none() {
                skipped += 1;
                continue;
            }
            links
                .entry(fields[0].to_string())
                .or_default()
                .push(DataPoint::link(pos_a, fields[2], pos_b));
        }

        if skipped > 0 {
            warn!("Skipped {} links touching chromosomes outside the genome", skipped);
        }
        Ok(Self {
            name: name.into(),
            links,
        })
    }

    pub fn from_file<P: AsRef<Path>>(path: P, genome: &Genome) -> Result<Self> {
        info!("Loading chord track from {:?}...", path.as_ref());
        let name = path
            .as_ref()
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "links".to_string());
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file), name, genome)
    }
}

impl DataManager for LinkFileDataManager {
    fn is_ready(&self) -> Pending<bool> {
        Pending::ready(true)
    }

    fn genome_wide_data(&self, genome: &Genome) -> Pending<Vec<ChromData>> {
        Pending::ready(
            genome
                .chromosomes()
                .iter()
                .map(|chrom| ChromData {
                    data: self.links.get(&chrom.name).cloned().unwrap_or_default(),
                })
                .collect(),
        )
    }

    fn can_refine(&self, _region: &Region, _held_scale: f64, _scale: f64) -> bool {
        false
    }

    fn refine(
        &self,
        region: &Region,
        _mode: DataMode,
        _start_index: usize,
        _scale: f64,
    ) -> Pending<Vec<DataPoint>> {
        Pending::failed(CircosError::DataUnavailable {
            track: self.name.clone(),
            reason: format!("links have a single resolution, cannot refine {}", region),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Resolution;

    fn genome() -> Genome {
        Genome::from_lengths([("chr1", 1000), ("chr2", 500)]).unwrap()
    }

    fn ready<T: std::fmt::Debug>(mut p: Pending<T>) -> T {
        match p.poll() {
            Resolution::Ready(Ok(v)) => v,
            other => panic!("not ready: {:?}", other),
        }
    }

    fn bedgraph() -> BinnedFileDataManager {
        let mut text = String::from("track type=bedGraph\n");
        for i in 0..100 {
            text.push_str(&format!("chr1\t{}\t{}\t{}\n", i * 10, i * 10 + 10, i));
        }
        text.push_str("chrUn\t0\t10\t5\n");
        BinnedFileDataManager::from_reader(text.as_bytes(), &genome(), 10).unwrap()
    }

    #[test]
    fn test_genome_wide_bins_follow_genome_order() {
        let data = ready(bedgraph().genome_wide_data(&genome()));
        assert_eq!(data.len(), 2);
        assert_eq!(data[0].data.len(), 10);
        // First bin holds values 0..=9.
        assert_eq!(data[0].data[0], DataPoint::value(0, 4.5));
        assert_eq!(data[0].data[9].position(), 900);
        assert!(data[1].data.is_empty());
    }

    #[test]
    fn test_refinement_adds_bins_until_raw_resolution() {
        let manager = bedgraph();
        let g = genome();
        let whole = g.region_for("chr1", 0, 1000).unwrap();
        assert!(!manager.can_refine(&whole, 1.0, 1.0));
        assert!(manager.can_refine(&whole, 1.0, 2.0));
        assert!(manager.can_refine(&whole, 2.0, 4.0));
        // 100 intervals: from scale 10 on every bin is already one interval.
        assert!(!manager.can_refine(&whole, 10.0, 20.0));
        assert!(!manager.can_refine(&whole, 1000.0, 2000.0));

        let fine = ready(manager.refine(&whole, DataMode::Coverage, 0, 4.0));
        assert_eq!(fine.len(), 40);

        // Never more bins than intervals.
        let capped = ready(manager.refine(&whole, DataMode::Coverage, 0, 1000.0));
        assert_eq!(capped.len(), 100);

        let part = g.region_for("chr1", 500, 600).unwrap();
        let raw = ready(manager.refine(&part, DataMode::Raw, 2, 1.0));
        assert_eq!(raw.len(), 8);
        assert_eq!(raw[0], DataPoint::value(520, 52.0));
    }

    #[test]
    fn test_bad_lines_report_line_numbers() {
        let err = BinnedFileDataManager::from_reader("chr1\t0\tx\t1\n".as_bytes(), &genome(), 10)
            .unwrap_err();
        assert!(matches!(err, CircosError::Parse { line: 1, .. }));

        let err = LinkFileDataManager::from_reader("chr1 5 chr2\n".as_bytes(), "l", &genome())
            .unwrap_err();
        assert!(matches!(err, CircosError::Parse { line: 1, .. }));
    }

    #[test]
    fn test_links_grouped_by_source_chromosome() {
        let text = "chr2 10 chr1 20\nchr1 5 chr2 400\nchr1 7 chrX 1\n";
        let manager = LinkFileDataManager::from_reader(text.as_bytes(), "links", &genome()).unwrap();
        let data = ready(manager.genome_wide_data(&genome()));
        assert_eq!(data[0].data, vec![DataPoint::link(5, "chr2", 400)]);
        assert_eq!(data[1].data, vec![DataPoint::link(10, "chr1", 20)]);

        let region = genome().region_for("chr1", 0, 1000).unwrap();
        assert!(!manager.can_refine(&region, 1.0, 8.0));
    }
}
