use serde_derive::{Deserialize, Serialize};

use crate::bbox::CropRegion;
use crate::error::Error;

pub const NUM_KEYPOINTS: usize = 17;

/// COCO body joint names, in model output order
pub const KEYPOINT_NAMES: [&str; NUM_KEYPOINTS] = [
    "nose",
    "left_eye",
    "right_eye",
    "left_ear",
    "right_ear",
    "left_shoulder",
    "right_shoulder",
    "left_elbow",
    "right_elbow",
    "left_wrist",
    "right_wrist",
    "left_hip",
    "right_hip",
    "left_knee",
    "right_knee",
    "left_ankle",
    "right_ankle",
];

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PoseConfig {
    /// Keypoints at or below this confidence are reported as missing
    pub min_confidence: f32,
    /// Pixels added on every side of a track box before cropping
    pub crop_margin: u32,
}

impl Default for PoseConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.3,
            crop_margin: 20,
        }
    }
}

/// One body joint in full-frame coordinates. `None` marks a value that
/// could not be obtained; zero is a valid coordinate.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct Keypoint {
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub confidence: Option<f32>,
}

impl Keypoint {
    pub const MISSING: Keypoint = Keypoint {
        x: None,
        y: None,
        confidence: None,
    };

    #[inline]
    pub fn new(x: f32, y: f32, confidence: f32) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            confidence: Some(confidence),
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.x.is_some() && self.y.is_some() && self.confidence.is_some()
    }
}

/// Pose capability output: 17 `(x, y, confidence)` triples in the
/// coordinate frame of the crop it was computed on
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct RawPose(pub [[f32; 3]; NUM_KEYPOINTS]);

/// The 17 keypoints for one (frame, candidate track) pair
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct PoseSample {
    pub keypoints: [Keypoint; NUM_KEYPOINTS],
}

impl PoseSample {
    pub fn missing() -> Self {
        Self {
            keypoints: [Keypoint::MISSING; NUM_KEYPOINTS],
        }
    }

    /// Translates crop-relative keypoints back to the frame by the crop
    /// offset; anything not above `min_confidence` or with a non-finite
    /// value becomes missing.
    pub fn from_raw(raw: &RawPose, region: &CropRegion, min_confidence: f32) -> Self {
        let mut keypoints = [Keypoint::MISSING; NUM_KEYPOINTS];

        for (kp, &[x, y, conf]) in keypoints.iter_mut().zip(raw.0.iter()) {
            if x.is_finite() && y.is_finite() && conf.is_finite() && conf > min_confidence {
                *kp = Keypoint::new(x + region.x as f32, y + region.y as f32, conf);
            }
        }

        Self { keypoints }
    }

    pub fn valid_count(&self) -> usize {
        self.keypoints.iter().filter(|kp| kp.is_valid()).count()
    }
}

/// A single call into the pose capability
#[derive(Debug)]
pub struct PoseRequest<'a, C> {
    pub frame_index: usize,
    pub region: CropRegion,
    pub crop: &'a C,
    pub min_confidence: f32,
}

pub trait PoseEstimator<C> {
    /// Returns at most one pose for the person in `request.crop`, in crop
    /// coordinates
    fn estimate(&mut self, request: PoseRequest<'_, C>) -> Result<Option<RawPose>, Error>;
}

impl<C, P: PoseEstimator<C> + ?Sized> PoseEstimator<C> for &mut P {
    #[inline]
    fn estimate(&mut self, request: PoseRequest<'_, C>) -> Result<Option<RawPose>, Error> {
        (**self).estimate(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_pose_translated_and_thresholded() {
        let mut raw = [[1.0, 2.0, 0.9]; NUM_KEYPOINTS];
        raw[3] = [5.0, 5.0, 0.3];
        raw[4] = [0.0, 0.0, 0.1];

        let region = CropRegion {
            x: 100,
            y: 50,
            width: 80,
            height: 160,
        };
        let sample = PoseSample::from_raw(&RawPose(raw), &region, 0.3);

        assert_eq!(sample.keypoints[0], Keypoint::new(101.0, 52.0, 0.9));
        assert_eq!(sample.keypoints[3], Keypoint::MISSING);
        assert_eq!(sample.keypoints[4], Keypoint::MISSING);
        assert_eq!(sample.valid_count(), 15);
    }

    #[test]
    fn zero_coordinates_are_valid() {
        let raw = RawPose([[0.0, 0.0, 0.8]; NUM_KEYPOINTS]);
        let region = CropRegion {
            x: 0,
            y: 0,
            width: 10,
            height: 10,
        };
        let sample = PoseSample::from_raw(&raw, &region, 0.3);
        assert_eq!(sample.valid_count(), NUM_KEYPOINTS);
        assert_eq!(sample.keypoints[0].x, Some(0.0));
    }

    #[test]
    fn non_finite_coordinates_are_missing() {
        let mut raw = [[1.0, 2.0, 0.9]; NUM_KEYPOINTS];
        raw[0] = [f32::NAN, 2.0, 0.9];
        raw[1] = [1.0, f32::INFINITY, 0.9];
        raw[2] = [1.0, 2.0, f32::NAN];

        let region = CropRegion {
            x: 10,
            y: 10,
            width: 50,
            height: 50,
        };
        let sample = PoseSample::from_raw(&RawPose(raw), &region, 0.3);

        assert_eq!(sample.keypoints[0], Keypoint::MISSING);
        assert_eq!(sample.keypoints[1], Keypoint::MISSING);
        assert_eq!(sample.keypoints[2], Keypoint::MISSING);
        assert_eq!(sample.valid_count(), NUM_KEYPOINTS - 3);
    }

    #[test]
    fn missing_sample_has_no_valid_keypoints() {
        assert_eq!(PoseSample::missing().valid_count(), 0);
    }
}
