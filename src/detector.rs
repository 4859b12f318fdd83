use crate::detection::Detection;
use crate::error::Error;
use crate::frame::Frame;

/// COCO class index of "person"
pub const PERSON_CLASS: i32 = 0;

pub trait ObjectDetector<I> {
    /// Person boxes found in `frame`, in full-frame coordinates
    fn detect(&mut self, frame: &Frame<I>) -> Result<Vec<Detection>, Error>;
}

impl<I, D: ObjectDetector<I> + ?Sized> ObjectDetector<I> for &mut D {
    #[inline]
    fn detect(&mut self, frame: &Frame<I>) -> Result<Vec<Detection>, Error> {
        (**self).detect(frame)
    }
}

/// Drops detections whose confidence is below `threshold`
#[derive(Debug, Clone)]
pub struct ConfidenceGate {
    pub threshold: f32,
}

impl ConfidenceGate {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn apply(&self, detections: Vec<Detection>) -> Vec<Detection> {
        let threshold = self.threshold;

        detections
            .into_iter()
            .filter(|det| det.confidence >= threshold)
            .collect()
    }
}
