use std::{
    f32::consts::PI,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use super::{AudioInput, BlockCallback, StreamFormat};
use crate::{ArDancerError, Result};

/// One step of a synthetic microphone script.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Segment {
    Silence {
        seconds: f32,
    },
    Tone {
        amplitude: f32,
        frequency_hz: f32,
        seconds: f32,
    },
}

impl Segment {
    pub fn seconds(&self) -> f32 {
        match self {
            Self::Silence { seconds } | Self::Tone { seconds, .. } => *seconds,
        }
    }
}

/// Renders a script of [`Segment`]s into mono samples. Past the end of the
/// script the generator produces silence.
#[derive(Debug, Clone)]
pub struct SignalGenerator {
    sample_rate: u32,
    /// Segment paired with the absolute sample index where it ends.
    timeline: Vec<(u64, Segment)>,
    position: u64,
}

impl SignalGenerator {
    pub fn new(sample_rate: u32, script: &[Segment]) -> Self {
        let mut end = 0_u64;
        let timeline = script
            .iter()
            .map(|segment| {
                end += (segment.seconds().max(0.0) * sample_rate as f32).round() as u64;
                (end, *segment)
            })
            .collect();

        Self {
            sample_rate,
            timeline,
            position: 0,
        }
    }

    /// Absolute index of the next sample to be produced.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn fill(&mut self, block: &mut [f32]) {
        for slot in block.iter_mut() {
            *slot = self.sample_at(self.position);
            self.position += 1;
        }
    }

    fn sample_at(&self, index: u64) -> f32 {
        let segment = self
            .timeline
            .iter()
            .find(|(end, _)| index < *end)
            .map(|(_, segment)| segment);

        match segment {
            Some(Segment::Tone {
                amplitude,
                frequency_hz,
                ..
            }) => {
                let t = index as f32 / self.sample_rate as f32;
                amplitude * (2.0 * PI * frequency_hz * t).sin()
            }
            Some(Segment::Silence { .. }) | None => 0.0,
        }
    }
}

/// [`AudioInput`] that plays a [`SignalGenerator`] on a background thread,
/// paced at wall-clock speed like a real microphone.
pub struct SignalInput {
    format: StreamFormat,
    script: Vec<Segment>,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl SignalInput {
    pub fn new(format: StreamFormat, script: Vec<Segment>) -> Self {
        Self {
            format,
            script,
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    /// Silent except for short bursts of speech-level tone starting at
    /// each of the given offsets.
    pub fn with_bursts(format: StreamFormat, burst_starts: &[f32], burst_seconds: f32) -> Self {
        let mut starts: Vec<f32> = burst_starts.iter().copied().filter(|s| *s >= 0.0).collect();
        starts.sort_by(|a, b| a.total_cmp(b));

        let mut script = Vec::new();
        let mut cursor = 0.0_f32;
        for start in starts {
            if start > cursor {
                script.push(Segment::Silence {
                    seconds: start - cursor,
                });
                cursor = start;
            }
            let end = start + burst_seconds;
            if end > cursor {
                script.push(Segment::Tone {
                    amplitude: 0.2,
                    frequency_hz: 220.0,
                    seconds: end - cursor,
                });
                cursor = end;
            }
        }

        Self::new(format, script)
    }

    pub fn script(&self) -> &[Segment] {
        &self.script
    }
}

impl AudioInput for SignalInput {
    fn format(&self) -> StreamFormat {
        self.format
    }

    fn start(&mut self, block_size: usize, mut callback: BlockCallback) -> Result<()> {
        if self.worker.is_some() {
            return Err(ArDancerError::audio("signal input is already running"));
        }
        if self.format.channels != 1 {
            return Err(ArDancerError::audio("signal input only renders mono"));
        }

        let mut generator = SignalGenerator::new(self.format.sample_rate, &self.script);
        let pace = Duration::from_secs_f64(block_size as f64 / self.format.sample_rate as f64);
        let running = Arc::clone(&self.running);
        running.store(true, Ordering::SeqCst);

        let worker = thread::Builder::new()
            .name("signal-input".to_string())
            .spawn(move || {
                let mut block = vec![0.0_f32; block_size];
                while running.load(Ordering::SeqCst) {
                    generator.fill(&mut block);
                    callback(&block);
                    thread::sleep(pace);
                }
            })
            .map_err(|err| ArDancerError::audio(format!("failed to spawn capture thread: {err}")))?;

        self.worker = Some(worker);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            worker
                .join()
                .map_err(|_| ArDancerError::msg("signal input thread panicked"))?;
        }
        Ok(())
    }
}

impl Drop for SignalInput {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

impl std::fmt::Debug for SignalInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalInput")
            .field("format", &self.format)
            .field("segments", &self.script.len())
            .field("running", &self.worker.is_some())
            .finish()
    }
}
