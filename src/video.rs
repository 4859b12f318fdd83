use std::path::{Path, PathBuf};

use log::debug;
use opencv::{
    core::{self, Mat},
    prelude::*,
    videoio,
};

use crate::bbox::CropRegion;
use crate::error::Error;
use crate::frame::{FrameImage, FrameReader, VideoInfo, VideoSource};

impl FrameImage for Mat {
    type Crop = Mat;

    #[inline]
    fn dims(&self) -> (u32, u32) {
        (self.cols().max(0) as u32, self.rows().max(0) as u32)
    }

    fn crop(&self, region: &CropRegion) -> Result<Mat, Error> {
        let rect = core::Rect::new(
            region.x as i32,
            region.y as i32,
            region.width as i32,
            region.height as i32,
        );

        Ok(Mat::roi(self, rect)?.try_clone()?)
    }
}

/// Video file decoded with `videoio`; each pass opens its own capture
#[derive(Debug, Clone)]
pub struct OpenCvVideo {
    path: PathBuf,
}

impl OpenCvVideo {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl VideoSource for OpenCvVideo {
    type Image = Mat;
    type Reader = OpenCvReader;

    fn open(&self) -> Result<OpenCvReader, Error> {
        let path = self.path.to_string_lossy().into_owned();
        let open_err = |reason: String| Error::VideoOpen {
            path: path.clone(),
            reason,
        };

        let cam = videoio::VideoCapture::from_file(&path, videoio::CAP_ANY)
            .map_err(|err| open_err(err.to_string()))?;

        let opened = videoio::VideoCapture::is_opened(&cam).map_err(|err| open_err(err.to_string()))?;
        if !opened {
            return Err(open_err("capture is not opened".into()));
        }

        let info = VideoInfo {
            fps: cam.get(videoio::CAP_PROP_FPS)?,
            width: cam.get(videoio::CAP_PROP_FRAME_WIDTH)? as u32,
            height: cam.get(videoio::CAP_PROP_FRAME_HEIGHT)? as u32,
            total_frames: cam.get(videoio::CAP_PROP_FRAME_COUNT)?.max(0.0) as usize,
        };

        debug!("opened {}: {:?}", path, info);

        Ok(OpenCvReader { cam, info })
    }
}

pub struct OpenCvReader {
    cam: videoio::VideoCapture,
    info: VideoInfo,
}

impl FrameReader for OpenCvReader {
    type Image = Mat;

    #[inline]
    fn info(&self) -> VideoInfo {
        self.info
    }

    fn read_frame(&mut self) -> Result<Option<Mat>, Error> {
        let mut frame = Mat::default();

        let grabbed = self
            .cam
            .read(&mut frame)
            .map_err(|err| Error::Decode(err.to_string()))?;

        if !grabbed || frame.cols() == 0 || frame.rows() == 0 {
            return Ok(None);
        }

        Ok(Some(frame))
    }
}
