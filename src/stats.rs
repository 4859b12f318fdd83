use serde_derive::Serialize;

/// Summary of per-frame track occupancy over a pass
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct OccupancyStats {
    pub total_frames: usize,
    pub mean: f32,
    pub median: f32,
    pub min: usize,
    pub max: usize,
    pub unique_tracks: usize,
}

impl OccupancyStats {
    pub fn compute(counts: &[usize], unique_tracks: usize) -> Self {
        if counts.is_empty() {
            return Self {
                unique_tracks,
                ..Default::default()
            };
        }

        let mut sorted = counts.to_vec();
        sorted.sort_unstable();

        let n = sorted.len();
        let median = if n % 2 == 1 {
            sorted[n / 2] as f32
        } else {
            (sorted[n / 2 - 1] + sorted[n / 2]) as f32 / 2.0
        };

        Self {
            total_frames: n,
            mean: sorted.iter().sum::<usize>() as f32 / n as f32,
            median,
            min: sorted[0],
            max: sorted[n - 1],
            unique_tracks,
        }
    }
}
