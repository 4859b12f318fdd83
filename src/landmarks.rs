use std::io::Write;

use crate::error::Error;
use crate::pose::{Keypoint, PoseSample, KEYPOINT_NAMES, NUM_KEYPOINTS};

/// The emitted row for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LandmarkRecord {
    pub frame: usize,
    pub keypoints: [Keypoint; NUM_KEYPOINTS],
}

impl LandmarkRecord {
    pub fn from_sample(frame: usize, sample: &PoseSample) -> Self {
        Self {
            frame,
            keypoints: sample.keypoints,
        }
    }

    pub fn missing(frame: usize) -> Self {
        Self {
            frame,
            keypoints: [Keypoint::MISSING; NUM_KEYPOINTS],
        }
    }

    /// The 51 numeric fields in column order
    pub fn values(&self) -> impl Iterator<Item = Option<f32>> + '_ {
        self.keypoints
            .iter()
            .flat_map(|kp| [kp.x, kp.y, kp.confidence])
    }
}

/// `frame` followed by `<joint>_x`, `<joint>_y`, `<joint>_confidence`
/// for every joint
pub fn header() -> Vec<String> {
    let mut columns = Vec::with_capacity(1 + NUM_KEYPOINTS * 3);
    columns.push("frame".to_string());

    for name in KEYPOINT_NAMES.iter() {
        columns.push(format!("{}_x", name));
        columns.push(format!("{}_y", name));
        columns.push(format!("{}_confidence", name));
    }

    columns
}

/// Comma-separated landmark table. Missing values are written as empty
/// fields.
pub struct LandmarkWriter<W: Write> {
    out: W,
    rows: usize,
}

impl<W: Write> LandmarkWriter<W> {
    pub fn new(mut out: W) -> Result<Self, Error> {
        writeln!(out, "{}", header().join(","))?;

        Ok(Self { out, rows: 0 })
    }

    pub fn write_record(&mut self, record: &LandmarkRecord) -> Result<(), Error> {
        write!(self.out, "{}", record.frame)?;

        for value in record.values() {
            match value {
                Some(v) => write!(self.out, ",{}", v)?,
                None => write!(self.out, ",")?,
            }
        }

        writeln!(self.out)?;
        self.rows += 1;

        Ok(())
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn finish(mut self) -> Result<W, Error> {
        self.out.flush()?;

        Ok(self.out)
    }
}
