use std::{
    fmt,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
};

use serde::{Deserialize, Serialize};

use crate::{ArDancerError, AudioConfig, LoudnessSample, Result};

#[cfg(feature = "microphone")]
mod microphone;
mod signal;

#[cfg(feature = "microphone")]
pub use microphone::MicrophoneInput;
pub use signal::{Segment, SignalGenerator, SignalInput};

/// Sample layout an input device delivers. Samples are always 32-bit floats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl From<&AudioConfig> for StreamFormat {
    fn from(config: &AudioConfig) -> Self {
        Self {
            sample_rate: config.sample_rate,
            channels: config.channels,
        }
    }
}

impl fmt::Display for StreamFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Hz / {} ch / f32", self.sample_rate, self.channels)
    }
}

/// Callback invoked on the capture thread with each block of samples.
pub type BlockCallback = Box<dyn FnMut(&[f32]) + Send + 'static>;

/// Microphone-like device that pushes fixed-size sample blocks to a callback.
pub trait AudioInput: Send {
    /// Format the device will deliver once started.
    fn format(&self) -> StreamFormat;

    /// Begins capture. The callback runs on a device-managed thread.
    fn start(&mut self, block_size: usize, callback: BlockCallback) -> Result<()>;

    /// Stops capture and releases the device.
    fn stop(&mut self) -> Result<()>;
}

/// Regroups device buffers of arbitrary length into blocks of exactly
/// `block_len` samples. A trailing partial block waits for the next push.
#[derive(Debug, Clone)]
pub struct BlockAssembler {
    block_len: usize,
    pending: Vec<f32>,
}

impl BlockAssembler {
    pub fn new(block_len: usize) -> Self {
        Self {
            block_len,
            pending: Vec::with_capacity(block_len),
        }
    }

    /// Samples held back until the current block fills up.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn push(&mut self, mut samples: &[f32], mut emit: impl FnMut(&[f32])) {
        if self.block_len == 0 {
            emit(samples);
            return;
        }

        while !samples.is_empty() {
            let take = (self.block_len - self.pending.len()).min(samples.len());
            self.pending.extend_from_slice(&samples[..take]);
            samples = &samples[take..];

            if self.pending.len() == self.block_len {
                emit(&self.pending);
                self.pending.clear();
            }
        }
    }
}

/// f32 stored as raw bits so the capture thread can publish without locking.
#[derive(Debug, Default)]
struct LevelCell(AtomicU32);

impl LevelCell {
    fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Acquire))
    }

    fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Release);
    }
}

/// Publishes the RMS loudness of the latest microphone block.
///
/// There is no smoothing and no history: every block overwrites the value.
/// Failures while acquiring the input are reported as
/// [`ArDancerError::AudioDevice`], which callers treat as fatal.
pub struct AudioLevelMonitor {
    format: StreamFormat,
    block_size: usize,
    level: Arc<LevelCell>,
    input: Option<Box<dyn AudioInput>>,
}

impl AudioLevelMonitor {
    pub fn new(config: &AudioConfig) -> Self {
        Self {
            format: StreamFormat::from(config),
            block_size: config.block_size,
            level: Arc::new(LevelCell::default()),
            input: None,
        }
    }

    /// Format the monitor requires from its input.
    pub fn format(&self) -> StreamFormat {
        self.format
    }

    pub fn is_running(&self) -> bool {
        self.input.is_some()
    }

    /// Acquires `input` and starts publishing loudness values.
    pub fn start(&mut self, mut input: Box<dyn AudioInput>) -> Result<LevelHandle> {
        if self.input.is_some() {
            return Err(ArDancerError::audio("level monitor is already running"));
        }
        if self.block_size == 0 {
            return Err(ArDancerError::audio("block size must be non-zero"));
        }

        let declared = input.format();
        if declared != self.format {
            return Err(ArDancerError::audio(format!(
                "input delivers {declared}, monitor requires {}",
                self.format
            )));
        }

        let level = Arc::clone(&self.level);
        let callback: BlockCallback = Box::new(move |block| {
            if let Some(sample) = LoudnessSample::measure(block) {
                level.store(sample.rms);
            }
        });

        input.start(self.block_size, callback).map_err(|err| match err {
            err @ ArDancerError::AudioDevice(_) => err,
            other => ArDancerError::audio(format!("failed to start capture: {other}")),
        })?;

        tracing::info!(format = %self.format, block_size = self.block_size, "microphone capture started");
        self.input = Some(input);
        Ok(self.handle())
    }

    /// Stops capture. The last published level stays readable.
    pub fn stop(&mut self) -> Result<()> {
        match self.input.take() {
            Some(mut input) => {
                input.stop()?;
                tracing::info!("microphone capture stopped");
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Latest loudness, 0.0 until the first block arrives.
    pub fn level(&self) -> f32 {
        self.level.load()
    }

    pub fn handle(&self) -> LevelHandle {
        LevelHandle {
            level: Arc::clone(&self.level),
        }
    }
}

impl Drop for AudioLevelMonitor {
    fn drop(&mut self) {
        if let Some(mut input) = self.input.take() {
            if let Err(err) = input.stop() {
                tracing::warn!(%err, "failed to stop microphone capture");
            }
        }
    }
}

impl fmt::Debug for AudioLevelMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioLevelMonitor")
            .field("format", &self.format)
            .field("block_size", &self.block_size)
            .field("level", &self.level.load())
            .field("running", &self.is_running())
            .finish()
    }
}

/// Shared read-only view over the loudness published by [`AudioLevelMonitor`].
#[derive(Clone, Default)]
pub struct LevelHandle {
    level: Arc<LevelCell>,
}

impl LevelHandle {
    pub fn level(&self) -> f32 {
        self.level.load()
    }

    #[cfg(test)]
    pub(crate) fn set(&self, value: f32) {
        self.level.store(value);
    }
}

impl fmt::Debug for LevelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LevelHandle")
            .field("level", &self.level())
            .finish()
    }
}
