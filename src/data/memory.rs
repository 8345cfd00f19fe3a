use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use super::{ChromData, DataManager, DataMode, DataPoint, Pending, Resolver};
use crate::error::CircosError;
use crate::genome::{Genome, Region};

/// Data held in memory, with optional finer tiers per chromosome that become
/// available from a given zoom scale.
#[derive(Debug, Clone, Default)]
pub struct MemoryDataManager {
    chroms: Vec<ChromData>,
    tiers: FxHashMap<String, Vec<(f64, Vec<DataPoint>)>>,
}

impl MemoryDataManager {
    pub fn new(chroms: Vec<ChromData>) -> Self {
        Self {
            chroms,
            tiers: FxHashMap::default(),
        }
    }

    /// One list of values per chromosome, positions taken from the index.
    pub fn from_values(values: &[Vec<f64>]) -> Self {
        Self::new(values.iter().map(|v| ChromData::from_values(v)).collect())
    }

    /// Register `points` as the data for `chrom` once the zoom scale reaches `min_scale`.
    pub fn with_tier(mut self, chrom: impl Into<String>, min_scale: f64, points: Vec<DataPoint>) -> Self {
        let tiers = self.tiers.entry(chrom.into()).or_default();
        tiers.push((min_scale, points));
        tiers.sort_by(|a, b| a.0.total_cmp(&b.0));
        self
    }

    fn tier_for(&self, chrom: &str, scale: f64) -> Option<&(f64, Vec<DataPoint>)> {
        self.tiers
            .get(chrom)?
            .iter()
            .rev()
            .find(|(min_scale, _)| *min_scale <= scale)
    }
}

impl DataManager for MemoryDataManager {
    fn is_ready(&self) -> Pending<bool> {
        Pending::ready(true)
    }

    fn genome_wide_data(&self, _genome: &Genome) -> Pending<Vec<ChromData>> {
        Pending::ready(self.chroms.clone())
    }

    fn can_refine(&self, region: &Region, held_scale: f64, scale: f64) -> bool {
        match (
            self.tier_for(&region.chrom, scale),
            self.tier_for(&region.chrom, held_scale),
        ) {
            (Some((wanted, _)), Some((held, _))) => wanted > held,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    fn refine(
        &self,
        region: &Region,
        _mode: DataMode,
        start_index: usize,
        scale: f64,
    ) -> Pending<Vec<DataPoint>> {
        match self.tier_for(&region.chrom, scale) {
            Some((_, points)) => Pending::ready(
                points
                    .iter()
                    .filter(|p| region.contains(p.position()))
                    .skip(start_index)
                    .cloned()
                    .collect(),
            ),
            None => Pending::failed(CircosError::DataUnavailable {
                track: region.chrom.clone(),
                reason: format!("no detail level for {} at scale {}", region, scale),
            }),
        }
    }
}

/// A request waiting for the host to fulfil it.
#[derive(Debug)]
pub enum DataRequest {
    Ready(Resolver<bool>),
    GenomeWide(Resolver<Vec<ChromData>>),
    Refine {
        region: Region,
        mode: DataMode,
        start_index: usize,
        scale: f64,
        resolver: Resolver<Vec<DataPoint>>,
    },
}

/// Host-side view of a [`QueuedDataManager`]'s outstanding requests.
#[derive(Debug, Clone, Default)]
pub struct RequestQueue {
    inner: Rc<RefCell<VecDeque<DataRequest>>>,
}

impl RequestQueue {
    /// Take every request issued so far, oldest first.
    pub fn drain(&self) -> Vec<DataRequest> {
        self.inner.borrow_mut().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().is_empty()
    }

    fn push(&self, request: DataRequest) {
        self.inner.borrow_mut().push_back(request);
    }
}

/// A data manager whose requests are answered by the host at its own pace,
/// e.g. after a network fetch. Requests can be resolved in any order or
/// dropped, which the track sees as a failed fetch.
#[derive(Debug)]
pub struct QueuedDataManager {
    queue: RequestQueue,
    refinable: bool,
}

impl QueuedDataManager {
    pub fn new(refinable: bool) -> (Self, RequestQueue) {
        let queue = RequestQueue::default();
        (
            Self {
                queue: queue.clone(),
                refinable,
            },
            queue,
        )
    }
}

impl DataManager for QueuedDataManager {
    fn is_ready(&self) -> Pending<bool> {
        let (resolver, pending) = Pending::channel();
        self.queue.push(DataRequest::Ready(resolver));
        pending
    }

    fn genome_wide_data(&self, _genome: &Genome) -> Pending<Vec<ChromData>> {
        let (resolver, pending) = Pending::channel();
        self.queue.push(DataRequest::GenomeWide(resolver));
        pending
    }

    fn can_refine(&self, _region: &Region, held_scale: f64, scale: f64) -> bool {
        self.refinable && scale > held_scale
    }

    fn refine(
        &self,
        region: &Region,
        mode: DataMode,
        start_index: usize,
        scale: f64,
    ) -> Pending<Vec<DataPoint>> {
        let (resolver, pending) = Pending::channel();
        self.queue.push(DataRequest::Refine {
            region: region.clone(),
            mode,
            start_index,
            scale,
            resolver,
        });
        pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Resolution;

    fn genome() -> Genome {
        Genome::from_lengths([("chr1", 100)]).unwrap()
    }

    #[test]
    fn test_memory_tiers_pick_finest_available() {
        let coarse = vec![DataPoint::value(0, 1.0)];
        let fine = vec![DataPoint::value(0, 1.0), DataPoint::value(50, 2.0)];
        let manager = MemoryDataManager::from_values(&[vec![1.0]])
            .with_tier("chr1", 4.0, fine.clone())
            .with_tier("chr1", 2.0, coarse.clone());
        let region = genome().region_for("chr1", 0, 100).unwrap();

        assert!(!manager.can_refine(&region, 1.0, 1.5));
        assert!(manager.can_refine(&region, 1.0, 2.0));
        assert!(manager.can_refine(&region, 2.0, 4.0));
        assert!(!manager.can_refine(&region, 4.0, 8.0));
        assert!(!manager.can_refine(&region, 2.0, 3.0));

        let mut p = manager.refine(&region, DataMode::Coverage, 0, 3.0);
        assert!(matches!(p.poll(), Resolution::Ready(Ok(ref v)) if *v == coarse));
        let mut p = manager.refine(&region, DataMode::Coverage, 0, 10.0);
        assert!(matches!(p.poll(), Resolution::Ready(Ok(ref v)) if *v == fine));
        let mut p = manager.refine(&region, DataMode::Coverage, 1, 10.0);
        assert!(matches!(p.poll(), Resolution::Ready(Ok(ref v)) if v.len() == 1));
    }

    #[test]
    fn test_queued_manager_hands_requests_to_host() {
        let (manager, queue) = QueuedDataManager::new(false);
        let mut ready = manager.is_ready();
        let mut data = manager.genome_wide_data(&genome());
        assert_eq!(queue.len(), 2);

        for request in queue.drain() {
            match request {
                DataRequest::Ready(r) => r.resolve(true),
                DataRequest::GenomeWide(r) => drop(r),
                DataRequest::Refine { .. } => unreachable!(),
            }
        }
        assert!(queue.is_empty());
        assert!(matches!(ready.poll(), Resolution::Ready(Ok(true))));
        assert!(matches!(
            data.poll(),
            Resolution::Ready(Err(CircosError::RequestDropped))
        ));
    }
}
