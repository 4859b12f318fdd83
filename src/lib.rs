pub mod bbox;
pub mod config;
pub mod detection;
pub mod detector;
pub mod discovery;
pub mod error;
pub mod extraction;
pub mod filter;
pub mod frame;
pub mod landmarks;
pub mod pose;
pub mod replay;
pub mod scene;
pub mod selection;
pub mod stats;
pub mod track;
pub mod tracker;

#[cfg(feature = "opencv")]
pub mod render;
#[cfg(feature = "opencv")]
pub mod video;

pub use config::PipelineConfig;
pub use detection::Detection;
pub use detector::ObjectDetector;
pub use discovery::{discover, Discovery, DiscoveryReport, FrameSink};
pub use error::Error;
pub use extraction::{extract, Extraction, ExtractionReport};
pub use frame::{Frame, FrameImage, FrameReader, VideoInfo, VideoSource};
pub use landmarks::{LandmarkRecord, LandmarkWriter};
pub use pose::{PoseEstimator, PoseRequest, PoseSample, RawPose};
pub use track::{Track, TrackedPlayer};
pub use tracker::{PlayerTracker, TrackerConfig};
