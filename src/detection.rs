use serde_derive::{Deserialize, Serialize};

use crate::bbox::{BBox, Ltrb};
use nalgebra as na;

/// One candidate person box in one frame
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub bbox: BBox<Ltrb>,
    pub confidence: f32,
}

impl Detection {
    #[inline]
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32) -> Self {
        Self {
            bbox: BBox::ltrb(x1, y1, x2, y2),
            confidence,
        }
    }

    #[inline(always)]
    pub fn center(&self) -> na::Point2<f32> {
        self.bbox.center()
    }

    #[inline(always)]
    pub fn width(&self) -> f32 {
        self.bbox.width()
    }

    #[inline(always)]
    pub fn height(&self) -> f32 {
        self.bbox.height()
    }
}

/// Detection as stored in detection logs: (x,y) of the center and
/// (width,height) of bbox
#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub struct LoggedDetection {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    #[serde(rename = "p")]
    pub confidence: f32,
    #[serde(rename = "c")]
    pub class: i32,
}

impl From<&LoggedDetection> for Detection {
    fn from(det: &LoggedDetection) -> Detection {
        Detection {
            bbox: BBox::xywh(det.x, det.y, det.w, det.h).as_ltrb(),
            confidence: det.confidence,
        }
    }
}
