use log::debug;
use std::fmt;

use crate::config::TrackConfig;
use crate::data::DataManager;
use crate::observe::{Subject, SubscriptionId};

/// Stable identity of a track, unaffected by re-layouts or by removal of
/// other tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackId(pub u64);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    /// Values per chromosome drawn as radial areas in their own band.
    Quantitative,
    /// Links between two genomic positions, drawn inside the innermost band.
    Chord,
}

pub struct Track {
    pub id: TrackId,
    pub name: String,
    pub kind: TrackKind,
    pub config: TrackConfig,
    pub source: Box<dyn DataManager>,
}

impl fmt::Debug for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Track")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionEvent {
    Added { id: TrackId, kind: TrackKind },
    /// `index` is the position the track held before removal.
    Removed {
        id: TrackId,
        kind: TrackKind,
        index: usize,
    },
}

/// Ordered list of tracks; the order is the radial stacking order, first
/// track innermost.
#[derive(Debug, Default)]
pub struct TrackCollection {
    tracks: Vec<Track>,
    subject: Subject<CollectionEvent>,
}

impl TrackCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, track: Track) {
        let event = CollectionEvent::Added {
            id: track.id,
            kind: track.kind,
        };
        debug!("Track {} '{}' added ({:?})", track.id, track.name, track.kind);
        self.tracks.push(track);
        self.subject.notify(&event);
    }

    pub fn remove(&mut self, id: TrackId) -> Option<Track> {
        let index = self.position(id)?;
        let track = self.tracks.remove(index);
        debug!("Track {} '{}' removed from slot {}", track.id, track.name, index);
        self.subject.notify(&CollectionEvent::Removed {
            id,
            kind: track.kind,
            index,
        });
        Some(track)
    }

    pub fn get(&self, id: TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    pub fn get_mut(&mut self, id: TrackId) -> Option<&mut Track> {
        self.tracks.iter_mut().find(|t| t.id == id)
    }

    pub fn position(&self, id: TrackId) -> Option<usize> {
        self.tracks.iter().position(|t| t.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter()
    }

    pub fn ids(&self) -> Vec<TrackId> {
        self.tracks.iter().map(|t| t.id).collect()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn count_kind(&self, kind: TrackKind) -> usize {
        self.tracks.iter().filter(|t| t.kind == kind).count()
    }

    pub fn subscribe<F>(&mut self, observer: F) -> SubscriptionId
    where
        F: FnMut(&CollectionEvent) + 'static,
    {
        self.subject.subscribe(observer)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subject.unsubscribe(id)
    }
}
