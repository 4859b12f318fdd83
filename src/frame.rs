use serde_derive::{Deserialize, Serialize};

use crate::bbox::CropRegion;
use crate::error::Error;

pub struct Frame<I> {
    pub index: usize,
    pub dims: (u32, u32),
    pub timestamp: f32, // in seconds
    pub image: I,
}

impl<I: FrameImage> Frame<I> {
    pub fn new(index: usize, fps: f64, image: I) -> Self {
        let timestamp = if fps > 0.0 {
            (index as f64 / fps) as f32
        } else {
            0.0
        };

        Self {
            index,
            dims: image.dims(),
            timestamp,
            image,
        }
    }
}

/// Decoded picture the pipeline can measure and crop
pub trait FrameImage {
    type Crop;

    /// (width, height) in pixels
    fn dims(&self) -> (u32, u32);

    fn crop(&self, region: &CropRegion) -> Result<Self::Crop, Error>;
}

/// Image that carries only its dimensions, for sources whose detections
/// and poses come from elsewhere
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlankImage {
    pub width: u32,
    pub height: u32,
}

impl FrameImage for BlankImage {
    type Crop = CropRegion;

    #[inline]
    fn dims(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[inline]
    fn crop(&self, region: &CropRegion) -> Result<CropRegion, Error> {
        Ok(*region)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct VideoInfo {
    pub fps: f64,
    pub width: u32,
    pub height: u32,
    pub total_frames: usize,
}

/// A video that can be opened once per pass
pub trait VideoSource {
    type Image: FrameImage;
    type Reader: FrameReader<Image = Self::Image>;

    fn open(&self) -> Result<Self::Reader, Error>;
}

pub trait FrameReader {
    type Image: FrameImage;

    fn info(&self) -> VideoInfo;

    /// `Ok(None)` at end of stream
    fn read_frame(&mut self) -> Result<Option<Self::Image>, Error>;
}
