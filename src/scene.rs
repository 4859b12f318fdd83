use log::warn;

use crate::config::PipelineConfig;
use crate::detector::{ConfidenceGate, ObjectDetector};
use crate::filter::DetectionFilter;
use crate::frame::Frame;
use crate::track::TrackedPlayer;
use crate::tracker::PlayerTracker;

/// Result of advancing a scene by one frame
#[derive(Debug, Clone, Default)]
pub struct SceneStep {
    pub players: Vec<TrackedPlayer>,
    /// Detector failed; the frame was tracked as if it had no detections
    pub degraded: bool,
}

/// Detection-to-identity state for one traversal of a video: confidence
/// gate, field filter and a tracker instance that no other pass shares.
pub struct Scene {
    gate: ConfidenceGate,
    filter: DetectionFilter,
    tracker: PlayerTracker,
}

impl Scene {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            gate: ConfidenceGate::new(config.detection_confidence),
            filter: DetectionFilter::new(config.filter.clone()),
            tracker: PlayerTracker::new(config.tracker),
        }
    }

    #[inline]
    pub fn tracker(&self) -> &PlayerTracker {
        &self.tracker
    }

    pub fn step<I, D>(&mut self, detector: &mut D, frame: &Frame<I>) -> SceneStep
    where
        D: ObjectDetector<I> + ?Sized,
    {
        let (raw, degraded) = match detector.detect(frame) {
            Ok(dets) => (dets, false),
            Err(err) => {
                warn!("frame #{}: detection failed: {}", frame.index, err);
                (Vec::new(), true)
            }
        };

        let detections = self.filter.apply(&self.gate.apply(raw), frame.dims);
        let players = self.tracker.update(&detections);

        SceneStep { players, degraded }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::Detection;
    use crate::error::Error;
    use crate::frame::BlankImage;

    struct Scripted(Vec<Result<Vec<Detection>, Error>>);

    impl ObjectDetector<BlankImage> for Scripted {
        fn detect(&mut self, frame: &Frame<BlankImage>) -> Result<Vec<Detection>, Error> {
            std::mem::replace(&mut self.0[frame.index], Ok(Vec::new()))
        }
    }

    fn frame(index: usize) -> Frame<BlankImage> {
        Frame::new(
            index,
            25.0,
            BlankImage {
                width: 1280,
                height: 720,
            },
        )
    }

    #[test]
    fn gate_filter_and_track() {
        let player = Detection::new(600.0, 300.0, 630.0, 380.0, 0.9);
        let weak = Detection::new(900.0, 300.0, 930.0, 380.0, 0.2);
        let board = Detection::new(0.0, 600.0, 1280.0, 700.0, 0.9);

        let mut detector = Scripted(vec![Ok(vec![player, weak, board])]);
        let mut scene = Scene::new(&PipelineConfig::default());

        let step = scene.step(&mut detector, &frame(0));
        assert!(!step.degraded);
        assert_eq!(step.players.len(), 1);
        assert_eq!(step.players[0].track_id, 1);
        assert_eq!(step.players[0].bbox, player.bbox);
    }

    #[test]
    fn detector_failure_ages_tracks() {
        let player = Detection::new(600.0, 300.0, 630.0, 380.0, 0.9);
        let mut detector = Scripted(vec![
            Ok(vec![player]),
            Err(Error::Detector("model crashed".into())),
        ]);
        let mut scene = Scene::new(&PipelineConfig::default());

        scene.step(&mut detector, &frame(0));
        let step = scene.step(&mut detector, &frame(1));

        assert!(step.degraded);
        assert!(step.players.is_empty());
        assert_eq!(scene.tracker().registry().get(1).unwrap().frames_lost, 1);
    }
}
