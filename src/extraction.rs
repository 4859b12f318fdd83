//! Second pass: re-track the video from scratch and turn the reviewer's
//! candidate ids into one landmark row per frame.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;

use log::{debug, info, warn};
use serde_derive::Serialize;

use crate::config::PipelineConfig;
use crate::detector::ObjectDetector;
use crate::error::Error;
use crate::frame::{Frame, FrameImage, FrameReader, VideoInfo, VideoSource};
use crate::landmarks::{LandmarkRecord, LandmarkWriter};
use crate::pose::{PoseConfig, PoseEstimator, PoseRequest, PoseSample};
use crate::scene::Scene;
use crate::track::TrackedPlayer;

const PROGRESS_EVERY: usize = 50;

#[derive(Serialize, Debug, Clone)]
pub struct ExtractionReport {
    pub total_frames: usize,
    pub player_usage_stats: BTreeMap<u32, usize>,
    pub frames_with_landmarks: usize,
    pub degraded_frames: usize,
    pub truncated: bool,
    pub video: VideoInfo,
}

/// Frame-by-frame second pass yielding exactly one [`LandmarkRecord`] per
/// decoded frame.
pub struct Extraction<R, D, P> {
    reader: R,
    detector: D,
    estimator: P,
    scene: Scene,
    pose: PoseConfig,
    info: VideoInfo,
    candidates: BTreeSet<u32>,
    usage: BTreeMap<u32, usize>,
    frames: usize,
    frames_with_landmarks: usize,
    degraded_frames: usize,
    truncated: bool,
    done: bool,
}

impl<R, D, P> Extraction<R, D, P>
where
    R: FrameReader,
    D: ObjectDetector<R::Image>,
    P: PoseEstimator<<R::Image as FrameImage>::Crop>,
{
    pub fn start<S>(
        source: &S,
        detector: D,
        estimator: P,
        config: &PipelineConfig,
        candidates: &[u32],
    ) -> Result<Self, Error>
    where
        S: VideoSource<Reader = R>,
    {
        let candidates: BTreeSet<u32> = candidates.iter().copied().collect();
        if candidates.is_empty() {
            return Err(Error::NoCandidates);
        }

        let reader = source.open()?;
        let info = reader.info();

        info!(
            "extraction: {} frames, candidates {:?}",
            info.total_frames, candidates
        );

        Ok(Self {
            reader,
            detector,
            estimator,
            scene: Scene::new(config),
            pose: config.pose.clone(),
            info,
            usage: candidates.iter().map(|&id| (id, 0)).collect(),
            candidates,
            frames: 0,
            frames_with_landmarks: 0,
            degraded_frames: 0,
            truncated: false,
            done: false,
        })
    }

    #[inline]
    pub fn info(&self) -> &VideoInfo {
        &self.info
    }

    #[inline]
    pub fn usage(&self) -> &BTreeMap<u32, usize> {
        &self.usage
    }

    /// Pose for one candidate; `None` when its crop is empty
    fn sample(
        &mut self,
        frame: &Frame<R::Image>,
        player: &TrackedPlayer,
    ) -> Result<Option<PoseSample>, Error> {
        let region = player
            .bbox
            .expand_clipped(self.pose.crop_margin, frame.dims);

        if region.is_empty() {
            debug!(
                "frame #{}: track {} crop is empty",
                frame.index, player.track_id
            );
            return Ok(None);
        }

        let crop = frame.image.crop(&region)?;
        let raw = self.estimator.estimate(PoseRequest {
            frame_index: frame.index,
            region,
            crop: &crop,
            min_confidence: self.pose.min_confidence,
        })?;

        Ok(Some(match raw {
            Some(raw) => PoseSample::from_raw(&raw, &region, self.pose.min_confidence),
            None => PoseSample::missing(),
        }))
    }

    fn process(&mut self, frame: Frame<R::Image>) -> LandmarkRecord {
        let step = self.scene.step(&mut self.detector, &frame);
        let mut degraded = step.degraded;

        let mut visible: Vec<&TrackedPlayer> = step
            .players
            .iter()
            .filter(|p| self.candidates.contains(&p.track_id))
            .collect();
        visible.sort_by_key(|p| p.track_id);

        // most valid keypoints wins, ties go to the lowest id
        let mut best: Option<(u32, PoseSample, usize)> = None;

        for player in visible {
            let sample = match self.sample(&frame, player) {
                Ok(Some(sample)) => sample,
                Ok(None) => continue,
                Err(err) => {
                    warn!(
                        "frame #{}: pose failed for track {}: {}",
                        frame.index, player.track_id, err
                    );
                    degraded = true;
                    continue;
                }
            };

            let count = sample.valid_count();
            if best.as_ref().map_or(true, |&(_, _, c)| count > c) {
                best = Some((player.track_id, sample, count));
            }
        }

        if degraded {
            self.degraded_frames += 1;
        }

        let record = match best {
            Some((id, sample, count)) => {
                debug!(
                    "frame #{}: track {} selected with {} keypoints",
                    frame.index, id, count
                );

                *self.usage.entry(id).or_insert(0) += 1;
                if count > 0 {
                    self.frames_with_landmarks += 1;
                }

                LandmarkRecord::from_sample(frame.index, &sample)
            }
            None => LandmarkRecord::missing(frame.index),
        };

        self.frames += 1;
        if self.frames % PROGRESS_EVERY == 0 {
            self.log_progress();
        }

        record
    }

    fn log_progress(&self) {
        let progress = if self.info.total_frames > 0 {
            self.frames as f32 * 100.0 / self.info.total_frames as f32
        } else {
            0.0
        };
        let landmarks = self.frames_with_landmarks as f32 * 100.0 / self.frames as f32;

        if self.usage.len() > 1 {
            let usage: Vec<String> = self
                .usage
                .iter()
                .map(|(id, n)| format!("{}: {:.1}%", id, *n as f32 * 100.0 / self.frames as f32))
                .collect();

            info!(
                "extraction: {:.1}% | usage {} | landmarks {:.1}%",
                progress,
                usage.join(", "),
                landmarks
            );
        } else {
            info!(
                "extraction: {:.1}% | landmarks {:.1}%",
                progress, landmarks
            );
        }
    }

    pub fn finish(self) -> ExtractionReport {
        info!(
            "extraction finished: {} frames, {} with landmarks, usage {:?}",
            self.frames, self.frames_with_landmarks, self.usage
        );

        ExtractionReport {
            total_frames: self.frames,
            player_usage_stats: self.usage,
            frames_with_landmarks: self.frames_with_landmarks,
            degraded_frames: self.degraded_frames,
            truncated: self.truncated,
            video: self.info,
        }
    }

    /// Drains the pass into `writer`; only a write failure aborts it
    pub fn write_all<W: Write>(
        mut self,
        writer: &mut LandmarkWriter<W>,
    ) -> Result<ExtractionReport, Error> {
        for record in self.by_ref() {
            writer.write_record(&record)?;
        }

        Ok(self.finish())
    }
}

impl<R, D, P> Iterator for Extraction<R, D, P>
where
    R: FrameReader,
    D: ObjectDetector<R::Image>,
    P: PoseEstimator<<R::Image as FrameImage>::Crop>,
{
    type Item = LandmarkRecord;

    fn next(&mut self) -> Option<LandmarkRecord> {
        if self.done {
            return None;
        }

        match self.reader.read_frame() {
            Ok(Some(image)) => {
                let frame = Frame::new(self.frames, self.info.fps, image);
                Some(self.process(frame))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                warn!(
                    "extraction: decoding stopped after {} frames: {}",
                    self.frames, err
                );
                self.done = true;
                self.truncated = true;
                None
            }
        }
    }
}

/// Runs the whole second pass, writing one row per frame
pub fn extract<S, D, P, W>(
    source: &S,
    detector: D,
    estimator: P,
    config: &PipelineConfig,
    candidates: &[u32],
    writer: &mut LandmarkWriter<W>,
) -> Result<ExtractionReport, Error>
where
    S: VideoSource,
    D: ObjectDetector<S::Image>,
    P: PoseEstimator<<S::Image as FrameImage>::Crop>,
    W: Write,
{
    Extraction::start(source, detector, estimator, config, candidates)?.write_all(writer)
}
