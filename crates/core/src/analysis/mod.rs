use serde::{Deserialize, Serialize};

/// Loudness of a single capture block. Only the most recent one is ever kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LoudnessSample {
    pub rms: f32,
    pub frames: usize,
}

impl LoudnessSample {
    /// Measures a block of mono samples. Returns `None` for an empty block so
    /// callers keep the previously published value.
    pub fn measure(samples: &[f32]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }

        Some(Self {
            rms: compute_rms(samples),
            frames: samples.len(),
        })
    }
}

/// Root-mean-square amplitude: `sqrt(sum(x^2) / N)`.
///
/// Not clamped; clipping input can push the value above 1.0.
pub fn compute_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples.iter().map(|sample| sample * sample).sum();
    (sum / samples.len() as f32).sqrt()
}
