use std::collections::btree_map;
use std::collections::BTreeMap;

use crate::bbox::{BBox, Ltrb};
use crate::detection::Detection;
use nalgebra as na;
use serde_derive::Serialize;

/// A persistent hypothesis of "the same player" across frames
#[derive(Debug, Clone)]
pub struct Track {
    pub id: u32,
    pub center: na::Point2<f32>,
    pub bbox: BBox<Ltrb>,
    pub confidence: f32,

    // consecutive frames without a matching detection
    pub frames_lost: u32,
}

impl Track {
    pub fn new(id: u32, det: &Detection) -> Self {
        Self {
            id,
            center: det.center(),
            bbox: det.bbox,
            confidence: det.confidence,
            frames_lost: 0,
        }
    }

    pub fn update(&mut self, det: &Detection) {
        self.center = det.center();
        self.bbox = det.bbox;
        self.confidence = det.confidence;
        self.frames_lost = 0;
    }

    #[inline]
    pub fn mark_missed(&mut self) {
        self.frames_lost += 1;
    }
}

impl From<&Track> for TrackedPlayer {
    fn from(t: &Track) -> TrackedPlayer {
        TrackedPlayer {
            track_id: t.id,
            bbox: t.bbox,
            confidence: t.confidence,
        }
    }
}

/// Per-frame tracker output for a track matched or created in that frame
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct TrackedPlayer {
    pub track_id: u32,
    pub bbox: BBox<Ltrb>,
    pub confidence: f32,
}

/// Live tracks keyed by id. Iteration is in ascending id order, which is
/// also creation order.
#[derive(Debug, Default, Clone)]
pub struct TrackRegistry {
    tracks: BTreeMap<u32, Track>,
}

impl TrackRegistry {
    #[inline]
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    #[inline]
    pub fn get(&self, id: u32) -> Option<&Track> {
        self.tracks.get(&id)
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, id: u32) -> Option<&mut Track> {
        self.tracks.get_mut(&id)
    }

    pub(crate) fn insert(&mut self, track: Track) {
        let prev = self.tracks.insert(track.id, track);
        debug_assert!(prev.is_none(), "track id reused");
    }

    #[inline]
    pub fn iter(&self) -> btree_map::Values<'_, u32, Track> {
        self.tracks.values()
    }

    #[inline]
    pub(crate) fn iter_mut(&mut self) -> btree_map::ValuesMut<'_, u32, Track> {
        self.tracks.values_mut()
    }

    #[inline]
    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.tracks.keys().copied()
    }

    /// Drops every track lost for more than `max_frames_lost` frames,
    /// returning the removed ids.
    pub(crate) fn purge(&mut self, max_frames_lost: u32) -> Vec<u32> {
        let mut removed = Vec::new();

        self.tracks.retain(|&id, t| {
            if t.frames_lost > max_frames_lost {
                removed.push(id);
                false
            } else {
                true
            }
        });

        removed
    }
}
