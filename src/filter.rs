use serde_derive::{Deserialize, Serialize};

use crate::detection::Detection;

/// Plausibility bounds for field players. Ratios are relative to
/// `min(frame width, frame height)` for height and to the frame height for
/// the top exclusion band.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct FilterConfig {
    pub min_height_ratio: f32,
    pub max_height_ratio: f32,
    pub min_aspect: f32,
    pub max_aspect: f32,
    pub top_exclusion_ratio: f32,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_height_ratio: 0.015,
            max_height_ratio: 0.35,
            min_aspect: 1.2,
            max_aspect: 5.0,
            top_exclusion_ratio: 0.05,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DetectionFilter {
    config: FilterConfig,
}

impl DetectionFilter {
    pub fn new(config: FilterConfig) -> Self {
        Self { config }
    }

    #[inline]
    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    pub fn accepts(&self, det: &Detection, dims: (u32, u32)) -> bool {
        let (fw, fh) = (dims.0 as f32, dims.1 as f32);
        let base = fw.min(fh);

        let height = det.height();
        let min_size = base * self.config.min_height_ratio;
        let max_size = base * self.config.max_height_ratio;

        // rejects background noise and oversized boxes (ad boards)
        if !(min_size < height && height < max_size) {
            return false;
        }

        let aspect = height / det.width();
        if !(self.config.min_aspect < aspect && aspect < self.config.max_aspect) {
            return false;
        }

        // stands
        det.center().y >= fh * self.config.top_exclusion_ratio
    }

    pub fn apply(&self, detections: &[Detection], dims: (u32, u32)) -> Vec<Detection> {
        detections
            .iter()
            .filter(|det| self.accepts(det, dims))
            .copied()
            .collect()
    }
}
