use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Unable to open video {path}: {reason}")]
    VideoOpen { path: String, reason: String },

    #[error("Decode Error: {0}")]
    Decode(String),

    #[error("Detector Error: {0}")]
    Detector(String),

    #[error("Pose Error: {0}")]
    Pose(String),

    #[error("Candidate set is empty")]
    NoCandidates,

    #[error("Config Error: {0}")]
    Config(String),

    #[error("Selection Error: {0}")]
    Selection(String),

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Json Error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "opencv")]
    #[error("OpenCV Error: {0}")]
    OpenCv(#[from] opencv::Error),
}
