use log::info;
use rustc_hash::FxHashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

use crate::error::{CircosError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chromosome {
    pub name: String,
    pub length: u64,
}

/// A genomic interval `chrom:start-end`, 0-based and half-open.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Region {
    pub chrom: String,
    pub start: u64,
    pub end: u64,
}

impl Region {
    pub fn new(chrom: impl Into<String>, start: u64, end: u64) -> Result<Self> {
        let chrom = chrom.into();
        if start > end {
            return Err(CircosError::InvalidRegion(format!(
                "{}: start ({}) must not exceed end ({})",
                chrom, start, end
            )));
        }
        Ok(Self { chrom, start, end })
    }

    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, position: u64) -> bool {
        position >= self.start && position < self.end
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.chrom, self.start, self.end)
    }
}

impl FromStr for Region {
    type Err = CircosError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let invalid = || CircosError::InvalidRegion(format!("expected 'chr:start-end', got '{}'", s));
        let (chrom, rest) = s.rsplit_once(':').ok_or_else(invalid)?;
        let (start, end) = rest.split_once('-').ok_or_else(invalid)?;
        let start: u64 = start.trim().parse().map_err(|_| invalid())?;
        let end: u64 = end.trim().parse().map_err(|_| invalid())?;
        Region::new(chrom, start, end)
    }
}

/// Ordered, immutable set of chromosomes.
#[derive(Debug, Clone)]
pub struct Genome {
    chroms: Vec<Chromosome>,
    index: FxHashMap<String, usize>,
}

impl Genome {
    /// Builds a genome; chromosome names must be unique. An empty list is
    /// accepted here and rejected by the sector layout.
    pub fn new(chroms: Vec<Chromosome>) -> Result<Self> {
        let mut index = FxHashMap::default();
        for (i, chrom) in chroms.iter().enumerate() {
            if index.insert(chrom.name.clone(), i).is_some() {
                return Err(CircosError::Config(format!(
                    "duplicate chromosome '{}'",
                    chrom.name
                )));
            }
        }
        Ok(Self { chroms, index })
    }

    pub fn from_lengths<S: Into<String>>(lengths: impl IntoIterator<Item = (S, u64)>) -> Result<Self> {
        Self::new(
            lengths
                .into_iter()
                .map(|(name, length)| Chromosome {
                    name: name.into(),
                    length,
                })
                .collect(),
        )
    }

    /// Parses a chrom-sizes table: `name<whitespace>length`, `#` comments allowed.
    pub fn from_chrom_sizes<R: BufRead>(reader: R) -> Result<Self> {
        let mut chroms = Vec::new();
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut fields = line.split_whitespace();
            let (Some(name), Some(length)) = (fields.next(), fields.next()) else {
                return Err(CircosError::Parse {
                    line: i + 1,
                    msg: "expected '<name> <length>'".to_string(),
                });
            };
            let length = length.parse::<u64>().map_err(|e| CircosError::Parse {
                line: i + 1,
                msg: format!("bad chromosome length '{}': {}", length, e),
            })?;
            chroms.push(Chromosome {
                name: name.to_string(),
                length,
            });
        }
        Self::new(chroms)
    }

    pub fn from_chrom_sizes_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        info!("Loading chromosome sizes from {:?}...", path.as_ref());
        let file = File::open(path)?;
        let genome = Self::from_chrom_sizes(BufReader::new(file))?;
        info!("Found {} chromosomes", genome.len());
        Ok(genome)
    }

    pub fn chromosomes(&self) -> &[Chromosome] {
        &self.chroms
    }

    pub fn len(&self) -> usize {
        self.chroms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chroms.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn chrom_len(&self, name: &str) -> Option<u64> {
        self.index_of(name).map(|i| self.chroms[i].length)
    }

    pub fn total_length(&self) -> u64 {
        self.chroms
            .iter()
            .fold(0u64, |total, c| total.saturating_add(c.length))
    }

    /// Region reference on a named chromosome, bounded by its length.
    pub fn region_for(&self, name: &str, start: u64, end: u64) -> Result<Region> {
        let length = self
            .chrom_len(name)
            .ok_or_else(|| CircosError::UnknownChromosome(name.to_string()))?;
        if end > length {
            return Err(CircosError::InvalidRegion(format!(
                "{}:{}-{} extends past chromosome end {}",
                name, start, end, length
            )));
        }
        Region::new(name, start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn genome() -> Genome {
        Genome::from_lengths([("chr1", 100), ("chr2", 50)]).unwrap()
    }

    #[test]
    fn test_lookup_preserves_order() {
        let g = genome();
        assert_eq!(g.len(), 2);
        assert_eq!(g.chromosomes()[1].name, "chr2");
        assert_eq!(g.chrom_len("chr1"), Some(100));
        assert_eq!(g.chrom_len("chrX"), None);
        assert_eq!(g.total_length(), 150);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        assert!(Genome::from_lengths([("chr1", 1), ("chr1", 2)]).is_err());
    }

    #[test]
    fn test_region_for_checks_bounds() {
        let g = genome();
        let r = g.region_for("chr2", 0, 50).unwrap();
        assert_eq!(r.to_string(), "chr2:0-50");
        assert_eq!(r.len(), 50);
        assert!(matches!(
            g.region_for("chr2", 0, 51),
            Err(CircosError::InvalidRegion(_))
        ));
        assert!(matches!(
            g.region_for("chr9", 0, 1),
            Err(CircosError::UnknownChromosome(_))
        ));
    }

    #[test]
    fn test_parse_region() {
        let r: Region = "chr1:1000-2000".parse().unwrap();
        assert_eq!(r.chrom, "chr1");
        assert_eq!(r.start, 1000);
        assert!(r.contains(1999));
        assert!(!r.contains(2000));
        assert!("chr1:2000-1000".parse::<Region>().is_err());
        assert!("chr1".parse::<Region>().is_err());
    }

    #[test]
    fn test_parse_chrom_sizes() {
        let input = "# sizes\nchr1\t248956422\n\nchr2 242193529\n";
        let g = Genome::from_chrom_sizes(input.as_bytes()).unwrap();
        assert_eq!(g.len(), 2);
        assert_eq!(g.chrom_len("chr2"), Some(242193529));

        let err = Genome::from_chrom_sizes("chr1\tabc\n".as_bytes()).unwrap_err();
        assert!(matches!(err, CircosError::Parse { line: 1, .. }));
    }

    #[test]
    fn test_total_length_saturates() {
        let g = Genome::from_lengths([("chr1", u64::MAX - 1), ("chr2", 10)]).unwrap();
        assert_eq!(g.total_length(), u64::MAX);
    }
}
