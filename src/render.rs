use std::path::{Path, PathBuf};

use log::{info, warn};
use opencv::{
    core::{self, Mat},
    imgproc,
    prelude::*,
    videoio,
};

use crate::discovery::FrameSink;
use crate::error::Error;
use crate::frame::{Frame, VideoInfo};
use crate::track::TrackedPlayer;

const FALLBACK_FPS: f64 = 24.0;

/// Stable BGR colour for a track id
pub fn track_color(id: u32) -> core::Scalar {
    core::Scalar::new(
        (id.wrapping_mul(37) % 255) as f64,
        (id.wrapping_mul(17) % 255) as f64,
        (id.wrapping_mul(29) % 255) as f64,
        255.0,
    )
}

/// Writes every first-pass frame with its tracks drawn on top. The output
/// takes the size of the first frame; later frames of another size are
/// skipped.
pub struct AnnotatedWriter {
    writer: Option<videoio::VideoWriter>,
    size: Option<(i32, i32)>,
    out_file: PathBuf,
    skipped: usize,
}

impl AnnotatedWriter {
    pub fn new<P: AsRef<Path>>(out_file: P) -> Self {
        Self {
            writer: None,
            size: None,
            out_file: out_file.as_ref().to_path_buf(),
            skipped: 0,
        }
    }

    /// Frames dropped because their size differed from the output
    #[inline]
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn release(&mut self) -> Result<(), Error> {
        if let Some(mut w) = self.writer.take() {
            w.release()?;
        }

        Ok(())
    }

    fn open(&mut self, size: (i32, i32), fps: f64) -> Result<(), Error> {
        let fps = if fps > 0.0 { fps } else { FALLBACK_FPS };
        let writer = videoio::VideoWriter::new(
            &self.out_file.to_string_lossy(),
            videoio::VideoWriter::fourcc(b'm' as _, b'p' as _, b'4' as _, b'v' as _)?,
            fps,
            core::Size::new(size.0, size.1),
            true,
        )?;

        info!(
            "rendering {}x{} @ {:.2} fps to {}",
            size.0,
            size.1,
            fps,
            self.out_file.display()
        );

        self.size = Some(size);
        self.writer = Some(writer);

        Ok(())
    }

    fn feed(&mut self, m: &Mat, fps: f64) -> Result<(), Error> {
        let size = (m.cols(), m.rows());

        match self.size {
            None => self.open(size, fps)?,
            Some(open) if open != size => {
                warn!(
                    "skipping {}x{} frame, output is {}x{}",
                    size.0, size.1, open.0, open.1
                );
                self.skipped += 1;
                return Ok(());
            }
            Some(_) => (),
        }

        if let Some(writer) = self.writer.as_mut() {
            writer.write(m)?;
        }

        Ok(())
    }
}

fn draw_player(frame: &mut Mat, player: &TrackedPlayer) -> opencv::Result<()> {
    let color = track_color(player.track_id);
    let bbox = &player.bbox;

    let rect = core::Rect::new(
        bbox.left() as i32,
        bbox.top() as i32,
        bbox.width() as i32,
        bbox.height() as i32,
    );

    imgproc::rectangle(frame, rect, color, 2, imgproc::LINE_8, 0)?;

    let label = format!("Player {}: {:.2}", player.track_id, player.confidence);
    let mut base_line = 0;
    let label_size = imgproc::get_text_size(
        &label,
        imgproc::FONT_HERSHEY_SIMPLEX,
        0.5,
        1,
        &mut base_line,
    )?;

    let label_rect = core::Rect::new(
        rect.x,
        rect.y - label_size.height - 10,
        label_size.width,
        label_size.height + 10,
    );

    imgproc::rectangle(frame, label_rect, color, imgproc::FILLED, imgproc::LINE_8, 0)?;
    imgproc::put_text(
        frame,
        &label,
        core::Point::new(rect.x, rect.y - 5),
        imgproc::FONT_HERSHEY_SIMPLEX,
        0.5,
        core::Scalar::new(255.0, 255.0, 255.0, 255.0),
        1,
        imgproc::LINE_AA,
        false,
    )?;

    let center = bbox.center();
    imgproc::circle(
        frame,
        core::Point::new(center.x as i32, center.y as i32),
        4,
        color,
        imgproc::FILLED,
        imgproc::LINE_8,
        0,
    )?;

    Ok(())
}

fn draw_header(
    frame: &mut Mat,
    index: usize,
    players: &[TrackedPlayer],
    info: &VideoInfo,
) -> opencv::Result<()> {
    let mut ids: Vec<u32> = players.iter().map(|p| p.track_id).collect();
    ids.sort_unstable();

    let lines = [
        format!(
            "Frame: {}/{} | Players: {}",
            index + 1,
            info.total_frames,
            players.len()
        ),
        format!("Active IDs: {:?}", ids),
    ];

    for (i, line) in lines.iter().enumerate() {
        imgproc::put_text(
            frame,
            line,
            core::Point::new(10, 30 + 30 * i as i32),
            imgproc::FONT_HERSHEY_SIMPLEX,
            0.7,
            core::Scalar::new(255.0, 255.0, 255.0, 255.0),
            2,
            imgproc::LINE_AA,
            false,
        )?;
    }

    Ok(())
}

impl FrameSink<Mat> for AnnotatedWriter {
    fn write_frame(
        &mut self,
        frame: &Frame<Mat>,
        players: &[TrackedPlayer],
        info: &VideoInfo,
    ) -> Result<(), Error> {
        let mut canvas = frame.image.try_clone()?;

        for player in players {
            draw_player(&mut canvas, player)?;
        }

        draw_header(&mut canvas, frame.index, players, info)?;

        self.feed(&canvas, info.fps)
    }

    fn finish(&mut self) -> Result<(), Error> {
        self.release()
    }
}
