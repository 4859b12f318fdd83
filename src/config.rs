use std::path::Path;

use serde_derive::{Deserialize, Serialize};

use crate::error::Error;
use crate::filter::FilterConfig;
use crate::pose::PoseConfig;
use crate::tracker::TrackerConfig;

impl Default for TrackerConfig {
    fn default() -> Self {
        Self::new(80.0, 15)
    }
}

/// Everything the two passes need, fixed for the duration of a run
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub detection_confidence: f32,
    pub tracker: TrackerConfig,
    pub filter: FilterConfig,
    pub pose: PoseConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            detection_confidence: 0.4,
            tracker: TrackerConfig::default(),
            filter: FilterConfig::default(),
            pose: PoseConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Reads a JSON config; absent fields keep their defaults
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let file = std::fs::File::open(path)?;
        let config: Self = serde_json::from_reader(std::io::BufReader::new(file))?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        fn unit(name: &str, v: f32) -> Result<(), Error> {
            if (0.0..=1.0).contains(&v) {
                Ok(())
            } else {
                Err(Error::Config(format!("{} must be within [0, 1], got {}", name, v)))
            }
        }

        unit("detection_confidence", self.detection_confidence)?;
        unit("pose.min_confidence", self.pose.min_confidence)?;

        if !(self.tracker.max_distance > 0.0) {
            return Err(Error::Config(format!(
                "tracker.max_distance must be positive, got {}",
                self.tracker.max_distance
            )));
        }

        let f = &self.filter;
        if !(f.min_height_ratio < f.max_height_ratio) {
            return Err(Error::Config(format!(
                "filter height ratio bounds are inverted: {} >= {}",
                f.min_height_ratio, f.max_height_ratio
            )));
        }

        if !(f.min_aspect < f.max_aspect) {
            return Err(Error::Config(format!(
                "filter aspect bounds are inverted: {} >= {}",
                f.min_aspect, f.max_aspect
            )));
        }

        unit("filter.top_exclusion_ratio", f.top_exclusion_ratio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tracker.max_distance, 80.0);
        assert_eq!(config.tracker.max_frames_lost, 15);
        assert_eq!(config.pose.crop_margin, 20);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: PipelineConfig = serde_json::from_str(
            r#"{"tracker": {"max_distance": 120.0, "max_frames_lost": 5}, "pose": {"crop_margin": 8}}"#,
        )
        .unwrap();

        assert_eq!(config.tracker, TrackerConfig::new(120.0, 5));
        assert_eq!(config.pose.crop_margin, 8);
        assert_eq!(config.pose.min_confidence, 0.3);
        assert_eq!(config.detection_confidence, 0.4);
        assert_eq!(config.filter, FilterConfig::default());
    }

    #[test]
    fn partial_tracker_block_keeps_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"tracker": {"max_distance": 120.0}}"#).unwrap();
        assert_eq!(config.tracker, TrackerConfig::new(120.0, 15));

        let config: PipelineConfig =
            serde_json::from_str(r#"{"tracker": {"max_frames_lost": 4}}"#).unwrap();
        assert_eq!(config.tracker, TrackerConfig::new(80.0, 4));
    }

    #[test]
    fn rejects_bad_values() {
        let mut config = PipelineConfig::default();
        config.tracker.max_distance = 0.0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = PipelineConfig::default();
        config.filter.min_aspect = 6.0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = PipelineConfig::default();
        config.detection_confidence = 1.5;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn load_from_file() {
        let path = std::env::temp_dir().join(format!("pl-config-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"detection_confidence": 0.25}"#).unwrap();

        let config = PipelineConfig::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.detection_confidence, 0.25);
        assert_eq!(config.tracker, TrackerConfig::default());
    }
}
