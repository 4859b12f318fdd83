use std::cmp::Ordering;

use log::debug;
use nalgebra as na;
use ndarray::Array2;
use serde_derive::{Deserialize, Serialize};

use crate::detection::Detection;
use crate::track::{Track, TrackRegistry, TrackedPlayer};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct TrackerConfig {
    /// Association gate between a detection center and a track center, px
    pub max_distance: f32,
    /// Frames a track may go unmatched before it is removed
    pub max_frames_lost: u32,
}

impl TrackerConfig {
    pub fn new(max_distance: f32, max_frames_lost: u32) -> Self {
        Self {
            max_distance,
            max_frames_lost,
        }
    }
}

/// Greedy nearest-center data association over a private track registry.
///
/// Every call to [`PlayerTracker::update`] advances the tracker by exactly
/// one frame. Given the same detections and config, two trackers produce
/// the same id assignments.
#[derive(Debug, Clone)]
pub struct PlayerTracker {
    config: TrackerConfig,
    registry: TrackRegistry,
    next_id: u32,
}

impl PlayerTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            registry: TrackRegistry::default(),
            next_id: 1,
        }
    }

    #[inline]
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    #[inline]
    pub fn registry(&self) -> &TrackRegistry {
        &self.registry
    }

    /// Id the next created track will receive
    #[inline]
    pub fn next_id(&self) -> u32 {
        self.next_id
    }

    /// Claims (detection, track) pairs in ascending distance order. Pairs
    /// are enumerated detection-major and the sort is stable, so equal
    /// distances resolve by detection index, then by track id.
    fn assignment(&self, centers: &[na::Point2<f32>]) -> (Vec<(usize, u32)>, Vec<bool>) {
        let mut det_claimed = vec![false; centers.len()];

        if self.registry.is_empty() || centers.is_empty() {
            return (Vec::new(), det_claimed);
        }

        let tracks: Vec<&Track> = self.registry.iter().collect();
        let dist = Array2::from_shape_fn((centers.len(), tracks.len()), |(d, t)| {
            na::distance(&centers[d], &tracks[t].center)
        });

        let mut pairs: Vec<(usize, usize)> = (0..centers.len())
            .flat_map(|d| (0..tracks.len()).map(move |t| (d, t)))
            .collect();

        pairs.sort_by(|a, b| {
            dist[[a.0, a.1]]
                .partial_cmp(&dist[[b.0, b.1]])
                .unwrap_or(Ordering::Equal)
        });

        let mut track_claimed = vec![false; tracks.len()];
        let mut assignments = Vec::new();

        for (d, t) in pairs {
            if det_claimed[d] || track_claimed[t] || dist[[d, t]] >= self.config.max_distance {
                continue;
            }

            det_claimed[d] = true;
            track_claimed[t] = true;
            assignments.push((d, tracks[t].id));
        }

        (assignments, det_claimed)
    }

    pub fn update(&mut self, detections: &[Detection]) -> Vec<TrackedPlayer> {
        let centers: Vec<_> = detections.iter().map(Detection::center).collect();
        let (mut assignments, det_claimed) = self.assignment(&centers);

        for &(d, id) in &assignments {
            if let Some(track) = self.registry.get_mut(id) {
                track.update(&detections[d]);
            }
        }

        let matched = assignments.len();

        for (d, det) in detections.iter().enumerate() {
            if det_claimed[d] {
                continue;
            }

            let id = self.next_id;
            self.next_id += 1;

            self.registry.insert(Track::new(id, det));
            assignments.push((d, id));
        }

        for track in self.registry.iter_mut() {
            if !assignments.iter().any(|&(_, id)| id == track.id) {
                track.mark_missed();
            }
        }

        let removed = self.registry.purge(self.config.max_frames_lost);

        debug!(
            "tracker: {} detections, {} matched, {} created, {} removed {:?}, {} live",
            detections.len(),
            matched,
            assignments.len() - matched,
            removed.len(),
            removed,
            self.registry.len()
        );

        assignments
            .iter()
            .filter_map(|&(_, id)| self.registry.get(id))
            .map(Into::into)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det_at(cx: f32, cy: f32) -> Detection {
        Detection::new(cx - 10.0, cy - 30.0, cx + 10.0, cy + 30.0, 0.9)
    }

    fn tracker() -> PlayerTracker {
        PlayerTracker::new(TrackerConfig::new(80.0, 15))
    }

    #[test]
    fn single_player_keeps_id() {
        let mut t = tracker();
        for i in 0..100 {
            let out = t.update(&[det_at(100.0 + i as f32 * 3.0, 200.0)]);
            assert_eq!(out.len(), 1);
            assert_eq!(out[0].track_id, 1);
        }
        assert_eq!(t.next_id(), 2);
    }

    #[test]
    fn far_detection_creates_new_track() {
        let mut t = tracker();
        t.update(&[det_at(100.0, 200.0)]);
        let out = t.update(&[det_at(300.0, 200.0)]);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].track_id, 2);
        assert_eq!(t.registry().get(1).unwrap().frames_lost, 1);
    }

    #[test]
    fn distance_gate_is_strict() {
        let mut t = tracker();
        t.update(&[det_at(100.0, 200.0)]);
        let out = t.update(&[det_at(180.0, 200.0)]);
        assert_eq!(out[0].track_id, 2);
    }

    #[test]
    fn lost_counter_and_removal() {
        let mut t = tracker();
        t.update(&[det_at(100.0, 200.0)]);

        for lost in 1..=15 {
            assert!(t.update(&[]).is_empty());
            assert_eq!(t.registry().get(1).unwrap().frames_lost, lost);
        }

        t.update(&[]);
        assert!(t.registry().get(1).is_none());
    }

    #[test]
    fn removed_id_is_never_reused() {
        let mut t = tracker();
        t.update(&[det_at(100.0, 200.0)]);
        for _ in 0..16 {
            t.update(&[]);
        }

        let out = t.update(&[det_at(102.0, 201.0)]);
        assert_eq!(out[0].track_id, 2);
    }

    #[test]
    fn recovers_within_forgiveness_window() {
        let mut t = tracker();
        t.update(&[det_at(100.0, 200.0)]);
        for _ in 0..15 {
            t.update(&[]);
        }

        let out = t.update(&[det_at(102.0, 201.0)]);
        assert_eq!(out[0].track_id, 1);
        assert_eq!(t.registry().get(1).unwrap().frames_lost, 0);
    }

    #[test]
    fn greedy_claims_closest_pair_first() {
        let mut t = tracker();
        let first = t.update(&[det_at(100.0, 200.0), det_at(150.0, 200.0)]);
        assert_eq!(
            first.iter().map(|p| p.track_id).collect::<Vec<_>>(),
            vec![1, 2]
        );

        // det 0 sits 10px from track 2, det 1 sits 10px from track 1
        let out = t.update(&[det_at(140.0, 200.0), det_at(110.0, 200.0)]);
        let ids: Vec<_> = out.iter().map(|p| p.track_id).collect();
        assert_eq!(ids.len(), 2);
        assert_eq!(out[0].bbox, det_at(140.0, 200.0).bbox);
        assert!(ids.contains(&1) && ids.contains(&2));
        assert_eq!(
            t.registry().get(2).unwrap().center,
            na::Point2::new(140.0, 200.0)
        );
        assert_eq!(
            t.registry().get(1).unwrap().center,
            na::Point2::new(110.0, 200.0)
        );
    }

    #[test]
    fn greedy_preempts_without_backtracking() {
        let mut t = tracker();
        t.update(&[det_at(0.0, 200.0), det_at(70.0, 200.0)]);

        // det 0 is 35px from both tracks and claims track 1 first, so det 1
        // (40px from track 1) is left without a partner in range
        let out = t.update(&[det_at(35.0, 200.0), det_at(-40.0, 200.0)]);
        let ids: Vec<_> = out.iter().map(|p| p.track_id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn ids_strictly_increase() {
        let mut t = tracker();
        let mut seen = Vec::new();
        for i in 0..20 {
            let x = 100.0 + (i * 200) as f32;
            for p in t.update(&[det_at(x, 200.0)]) {
                if !seen.contains(&p.track_id) {
                    seen.push(p.track_id);
                }
            }
        }
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(seen.len(), 20);
    }

    #[test]
    fn deterministic_across_instances() {
        let frames: Vec<Vec<Detection>> = (0..60)
            .map(|i| {
                let x = i as f32 * 7.0;
                let mut dets = vec![det_at(100.0 + x, 300.0), det_at(600.0 - x, 320.0)];
                if i % 7 == 0 {
                    dets.pop();
                }
                if i % 11 == 0 {
                    dets.push(det_at(900.0, 100.0 + x));
                }
                dets
            })
            .collect();

        let mut a = tracker();
        let mut b = tracker();
        for dets in &frames {
            assert_eq!(a.update(dets), b.update(dets));
        }
    }
}
