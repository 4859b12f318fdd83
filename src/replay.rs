//! Offline capabilities backed by pre-computed model output.
//!
//! Detection logs hold one line per frame, `<timestamp>: <json array>` where
//! every element is a [`LoggedDetection`]. Pose logs hold
//! `<frame index>: <json array of poses>`, each pose being 17 `[x, y, c]`
//! triples in full-frame coordinates.

use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;

use log::warn;

use crate::bbox::CropRegion;
use crate::detection::{Detection, LoggedDetection};
use crate::detector::{ObjectDetector, PERSON_CLASS};
use crate::error::Error;
use crate::frame::{BlankImage, Frame, FrameReader, VideoInfo, VideoSource};
use crate::pose::{PoseEstimator, PoseRequest, RawPose};

fn split_line(line: &str) -> Option<(&str, &str)> {
    let idx = line.find(':')?;
    let (head, tail) = line.split_at(idx);

    Some((head.trim(), &tail[1..]))
}

#[derive(Debug, Clone, Default)]
pub struct DetectionLog {
    frames: Vec<Vec<Detection>>,
}

impl DetectionLog {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let file = std::fs::File::open(path)?;
        Self::parse(std::io::BufReader::new(file))
    }

    /// Malformed lines become empty frames so that line N stays frame N
    pub fn parse<B: BufRead>(reader: B) -> Result<Self, Error> {
        let mut frames = Vec::new();

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;

            let dets = match split_line(&line) {
                Some((_, json)) => match serde_json::from_str::<Vec<LoggedDetection>>(json) {
                    Ok(dets) => dets
                        .iter()
                        .filter(|d| d.class == PERSON_CLASS)
                        .map(Detection::from)
                        .collect(),
                    Err(err) => {
                        warn!("detection log line {}: {}", idx + 1, err);
                        Vec::new()
                    }
                },
                None => {
                    if !line.trim().is_empty() {
                        warn!("detection log line {}: expected `:`", idx + 1);
                    }
                    Vec::new()
                }
            };

            frames.push(dets);
        }

        Ok(Self { frames })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    #[inline]
    pub fn get(&self, frame: usize) -> Option<&[Detection]> {
        self.frames.get(frame).map(Vec::as_slice)
    }

    pub fn detector(&self) -> ReplayDetector<'_> {
        ReplayDetector { log: self }
    }

    /// Blank frames, one per logged line
    pub fn source(&self, dims: (u32, u32), fps: f64) -> ReplaySource {
        ReplaySource::new(self.frames.len(), dims, fps)
    }
}

pub struct ReplayDetector<'a> {
    log: &'a DetectionLog,
}

impl<I> ObjectDetector<I> for ReplayDetector<'_> {
    fn detect(&mut self, frame: &Frame<I>) -> Result<Vec<Detection>, Error> {
        self.log
            .get(frame.index)
            .map(<[Detection]>::to_vec)
            .ok_or_else(|| Error::Detector(format!("no detections logged for frame #{}", frame.index)))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ReplaySource {
    info: VideoInfo,
}

impl ReplaySource {
    pub fn new(total_frames: usize, dims: (u32, u32), fps: f64) -> Self {
        Self {
            info: VideoInfo {
                fps,
                width: dims.0,
                height: dims.1,
                total_frames,
            },
        }
    }
}

impl VideoSource for ReplaySource {
    type Image = BlankImage;
    type Reader = ReplayReader;

    fn open(&self) -> Result<ReplayReader, Error> {
        Ok(ReplayReader {
            info: self.info,
            position: 0,
        })
    }
}

pub struct ReplayReader {
    info: VideoInfo,
    position: usize,
}

impl FrameReader for ReplayReader {
    type Image = BlankImage;

    #[inline]
    fn info(&self) -> VideoInfo {
        self.info
    }

    fn read_frame(&mut self) -> Result<Option<BlankImage>, Error> {
        if self.position >= self.info.total_frames {
            return Ok(None);
        }

        self.position += 1;

        Ok(Some(BlankImage {
            width: self.info.width,
            height: self.info.height,
        }))
    }
}

#[derive(Debug, Clone, Default)]
pub struct PoseLog {
    frames: HashMap<usize, Vec<RawPose>>,
}

impl PoseLog {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let file = std::fs::File::open(path)?;
        Self::parse(std::io::BufReader::new(file))
    }

    pub fn parse<B: BufRead>(reader: B) -> Result<Self, Error> {
        let mut frames = HashMap::new();

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let (head, json) = match split_line(&line) {
                Some(parts) => parts,
                None => {
                    warn!("pose log line {}: expected `:`", idx + 1);
                    continue;
                }
            };

            match (head.parse::<usize>(), serde_json::from_str::<Vec<RawPose>>(json)) {
                (Ok(frame), Ok(poses)) => {
                    frames
                        .entry(frame)
                        .or_insert_with(Vec::new)
                        .extend(poses);
                }
                (Err(err), _) => warn!("pose log line {}: bad frame index: {}", idx + 1, err),
                (_, Err(err)) => warn!("pose log line {}: {}", idx + 1, err),
            }
        }

        Ok(Self { frames })
    }

    #[inline]
    pub fn poses(&self, frame: usize) -> &[RawPose] {
        self.frames.get(&frame).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn estimator(&self) -> ReplayPoseEstimator<'_> {
        ReplayPoseEstimator { log: self }
    }
}

/// Answers with the logged pose that has the most confident keypoints
/// inside the requested region, shifted into region coordinates
pub struct ReplayPoseEstimator<'a> {
    log: &'a PoseLog,
}

impl ReplayPoseEstimator<'_> {
    fn support(pose: &RawPose, region: &CropRegion, min_confidence: f32) -> usize {
        pose.0
            .iter()
            .filter(|&&[x, y, c]| c > min_confidence && region.contains(x, y))
            .count()
    }
}

impl<C> PoseEstimator<C> for ReplayPoseEstimator<'_> {
    fn estimate(&mut self, request: PoseRequest<'_, C>) -> Result<Option<RawPose>, Error> {
        let region = request.region;
        let mut best: Option<(&RawPose, usize)> = None;

        for pose in self.log.poses(request.frame_index) {
            let support = Self::support(pose, &region, request.min_confidence);
            if support > 0 && best.map_or(true, |(_, s)| support > s) {
                best = Some((pose, support));
            }
        }

        Ok(best.map(|(pose, _)| {
            let mut local = *pose;
            for kp in local.0.iter_mut() {
                kp[0] -= region.x as f32;
                kp[1] -= region.y as f32;
            }
            local
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameImage;
    use crate::pose::NUM_KEYPOINTS;

    const DETS: &str = "\
0: [{\"x\":120.0,\"y\":250.0,\"w\":40.0,\"h\":100.0,\"p\":0.8,\"c\":0},{\"x\":500.0,\"y\":250.0,\"w\":40.0,\"h\":100.0,\"p\":0.9,\"c\":2}]
40: []
80: not json
120: [{\"x\":130.0,\"y\":250.0,\"w\":40.0,\"h\":100.0,\"p\":0.7,\"c\":0}]
";

    #[test]
    fn detection_log_keeps_line_alignment() {
        let log = DetectionLog::parse(DETS.as_bytes()).unwrap();
        assert_eq!(log.len(), 4);
        assert_eq!(
            log.get(0).unwrap(),
            &[Detection::new(100.0, 200.0, 140.0, 300.0, 0.8)]
        );
        assert!(log.get(1).unwrap().is_empty());
        assert!(log.get(2).unwrap().is_empty());
        assert_eq!(log.get(3).unwrap().len(), 1);
    }

    #[test]
    fn replay_detector_past_end_is_an_error() {
        let log = DetectionLog::parse(DETS.as_bytes()).unwrap();
        let mut detector = log.detector();
        let frame = Frame::new(
            9,
            25.0,
            BlankImage {
                width: 640,
                height: 480,
            },
        );
        assert!(matches!(detector.detect(&frame), Err(Error::Detector(_))));
    }

    #[test]
    fn replay_source_yields_one_frame_per_line() {
        let log = DetectionLog::parse(DETS.as_bytes()).unwrap();
        let mut reader = log.source((640, 480), 25.0).open().unwrap();
        assert_eq!(reader.info().total_frames, 4);

        let mut n = 0;
        while let Some(img) = reader.read_frame().unwrap() {
            assert_eq!(img.dims(), (640, 480));
            n += 1;
        }
        assert_eq!(n, 4);
    }

    fn pose_json(cx: f32, cy: f32, conf: f32) -> String {
        let kps: Vec<String> = (0..NUM_KEYPOINTS)
            .map(|i| format!("[{},{},{}]", cx, cy - 30.0 + i as f32 * 3.0, conf))
            .collect();
        format!("[{}]", kps.join(","))
    }

    #[test]
    fn replay_pose_picks_pose_inside_region() {
        let text = format!(
            "3: [{}, {}]\n",
            pose_json(100.0, 200.0, 0.9),
            pose_json(400.0, 200.0, 0.9)
        );
        let log = PoseLog::parse(text.as_bytes()).unwrap();
        assert_eq!(log.poses(3).len(), 2);

        let region = CropRegion {
            x: 350,
            y: 150,
            width: 100,
            height: 120,
        };
        let pose = log
            .estimator()
            .estimate(PoseRequest {
                frame_index: 3,
                region,
                crop: &region,
                min_confidence: 0.3,
            })
            .unwrap()
            .unwrap();

        assert_eq!(pose.0[0], [50.0, 20.0, 0.9]);

        let none = log
            .estimator()
            .estimate(PoseRequest {
                frame_index: 4,
                region,
                crop: &region,
                min_confidence: 0.3,
            })
            .unwrap();
        assert!(none.is_none());
    }
}
