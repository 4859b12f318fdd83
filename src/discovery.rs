//! First pass: run detection and tracking over the whole video to find
//! every identity a reviewer can choose from.

use std::collections::BTreeSet;

use log::{info, warn};
use serde_derive::Serialize;

use crate::config::PipelineConfig;
use crate::detector::ObjectDetector;
use crate::error::Error;
use crate::frame::{Frame, FrameReader, VideoInfo, VideoSource};
use crate::scene::Scene;
use crate::stats::OccupancyStats;
use crate::track::TrackedPlayer;

const PROGRESS_EVERY: usize = 30;

/// Receives every processed frame of the first pass, e.g. to render a
/// review video
pub trait FrameSink<I> {
    fn write_frame(
        &mut self,
        frame: &Frame<I>,
        players: &[TrackedPlayer],
        info: &VideoInfo,
    ) -> Result<(), Error>;

    fn finish(&mut self) -> Result<(), Error> {
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct FrameSummary {
    pub index: usize,
    pub players: Vec<TrackedPlayer>,
    pub degraded: bool,
}

#[derive(Serialize, Debug, Clone)]
pub struct DiscoveryReport {
    pub detected_player_ids: BTreeSet<u32>,
    pub stats: OccupancyStats,
    #[serde(skip)]
    pub occupancy: Vec<usize>,
    pub degraded_frames: usize,
    pub truncated: bool,
    pub video: VideoInfo,
}

/// Frame-by-frame first pass. Iterating yields one [`FrameSummary`] per
/// decoded frame; dropping the iterator early keeps what was accumulated.
pub struct Discovery<R: FrameReader, D> {
    reader: R,
    detector: D,
    scene: Scene,
    info: VideoInfo,
    sink: Option<Box<dyn FrameSink<R::Image>>>,
    discovered: BTreeSet<u32>,
    occupancy: Vec<usize>,
    degraded_frames: usize,
    truncated: bool,
    done: bool,
}

impl<R, D> Discovery<R, D>
where
    R: FrameReader,
    D: ObjectDetector<R::Image>,
{
    pub fn start<S>(source: &S, detector: D, config: &PipelineConfig) -> Result<Self, Error>
    where
        S: VideoSource<Reader = R>,
    {
        let reader = source.open()?;
        let info = reader.info();

        info!(
            "discovery: {}x{} @ {:.2} fps, {} frames",
            info.width, info.height, info.fps, info.total_frames
        );

        Ok(Self {
            reader,
            detector,
            scene: Scene::new(config),
            info,
            sink: None,
            discovered: BTreeSet::new(),
            occupancy: Vec::with_capacity(info.total_frames),
            degraded_frames: 0,
            truncated: false,
            done: false,
        })
    }

    pub fn with_sink<K>(mut self, sink: K) -> Self
    where
        K: FrameSink<R::Image> + 'static,
    {
        self.sink = Some(Box::new(sink));
        self
    }

    #[inline]
    pub fn info(&self) -> &VideoInfo {
        &self.info
    }

    #[inline]
    pub fn frames_processed(&self) -> usize {
        self.occupancy.len()
    }

    fn process(&mut self, frame: Frame<R::Image>) -> FrameSummary {
        let step = self.scene.step(&mut self.detector, &frame);

        self.discovered
            .extend(step.players.iter().map(|p| p.track_id));
        self.occupancy.push(step.players.len());

        if step.degraded {
            self.degraded_frames += 1;
        }

        if let Some(sink) = self.sink.as_mut() {
            if let Err(err) = sink.write_frame(&frame, &step.players, &self.info) {
                warn!("frame #{}: unable to render: {}", frame.index, err);
            }
        }

        let processed = self.occupancy.len();
        if processed % PROGRESS_EVERY == 0 && self.info.total_frames > 0 {
            info!(
                "discovery: {:.1}% ({}/{}), {} ids so far",
                processed as f32 * 100.0 / self.info.total_frames as f32,
                processed,
                self.info.total_frames,
                self.discovered.len()
            );
        }

        FrameSummary {
            index: frame.index,
            players: step.players,
            degraded: step.degraded,
        }
    }

    pub fn finish(mut self) -> DiscoveryReport {
        if let Some(mut sink) = self.sink.take() {
            if let Err(err) = sink.finish() {
                warn!("unable to finalize rendered video: {}", err);
            }
        }

        let stats = OccupancyStats::compute(&self.occupancy, self.discovered.len());

        info!(
            "discovery finished: {} frames, {} unique ids, {:.1} players/frame",
            stats.total_frames, stats.unique_tracks, stats.mean
        );

        DiscoveryReport {
            detected_player_ids: self.discovered,
            stats,
            occupancy: self.occupancy,
            degraded_frames: self.degraded_frames,
            truncated: self.truncated,
            video: self.info,
        }
    }

    pub fn run(mut self) -> DiscoveryReport {
        for _ in self.by_ref() {}
        self.finish()
    }
}

impl<R, D> Iterator for Discovery<R, D>
where
    R: FrameReader,
    D: ObjectDetector<R::Image>,
{
    type Item = FrameSummary;

    fn next(&mut self) -> Option<FrameSummary> {
        if self.done {
            return None;
        }

        match self.reader.read_frame() {
            Ok(Some(image)) => {
                let frame = Frame::new(self.occupancy.len(), self.info.fps, image);
                Some(self.process(frame))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                warn!(
                    "discovery: decoding stopped after {} frames: {}",
                    self.occupancy.len(),
                    err
                );
                self.done = true;
                self.truncated = true;
                None
            }
        }
    }
}

/// Runs the whole first pass
pub fn discover<S, D>(source: &S, detector: D, config: &PipelineConfig) -> Result<DiscoveryReport, Error>
where
    S: VideoSource,
    D: ObjectDetector<S::Image>,
{
    Ok(Discovery::start(source, detector, config)?.run())
}
