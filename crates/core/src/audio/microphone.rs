use std::{
    fmt,
    sync::mpsc,
    thread::{self, JoinHandle},
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use super::{AudioInput, BlockAssembler, BlockCallback, StreamFormat};
use crate::{ArDancerError, Result};

/// Live capture from a host input device through `cpal`.
///
/// `cpal::Stream` is not `Send` on every platform, so the stream is opened,
/// played and dropped on a dedicated thread that lives as long as capture
/// does. Device buffers are regrouped into blocks of the requested size before
/// they reach the callback.
pub struct MicrophoneInput {
    format: StreamFormat,
    device_query: Option<String>,
    stop_tx: Option<mpsc::Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl MicrophoneInput {
    /// Captures from the host's default input device.
    pub fn new(format: StreamFormat) -> Self {
        Self {
            format,
            device_query: None,
            stop_tx: None,
            worker: None,
        }
    }

    /// Captures from the first input device whose name contains `query`.
    pub fn with_device(format: StreamFormat, query: impl Into<String>) -> Self {
        Self {
            device_query: Some(query.into()),
            ..Self::new(format)
        }
    }
}

impl AudioInput for MicrophoneInput {
    fn format(&self) -> StreamFormat {
        self.format
    }

    fn start(&mut self, block_size: usize, callback: BlockCallback) -> Result<()> {
        if self.worker.is_some() {
            return Err(ArDancerError::audio("microphone is already capturing"));
        }

        let format = self.format;
        let query = self.device_query.clone();
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<()>>(1);
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let worker = thread::Builder::new()
            .name("microphone".to_string())
            .spawn(move || {
                let stream = match open_stream(format, query.as_deref(), block_size, callback) {
                    Ok(stream) => stream,
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));
                // Sender dropped or stop requested: either way release the device.
                let _ = stop_rx.recv();
                drop(stream);
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                self.stop_tx = Some(stop_tx);
                self.worker = Some(worker);
                Ok(())
            }
            Ok(Err(err)) => {
                let _ = worker.join();
                Err(err)
            }
            Err(_) => {
                let _ = worker.join();
                Err(ArDancerError::audio(
                    "microphone thread exited before the stream opened",
                ))
            }
        }
    }

    fn stop(&mut self) -> Result<()> {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(worker) = self.worker.take() {
            worker
                .join()
                .map_err(|_| ArDancerError::audio("microphone thread panicked"))?;
        }
        Ok(())
    }
}

impl Drop for MicrophoneInput {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

impl fmt::Debug for MicrophoneInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MicrophoneInput")
            .field("format", &self.format)
            .field("device_query", &self.device_query)
            .field("capturing", &self.worker.is_some())
            .finish()
    }
}

fn device_error(err: impl fmt::Display) -> ArDancerError {
    ArDancerError::audio(err.to_string())
}

fn select_device(host: &cpal::Host, query: Option<&str>) -> Result<cpal::Device> {
    let Some(query) = query else {
        return host
            .default_input_device()
            .ok_or_else(|| ArDancerError::audio("no default input device"));
    };

    let mut available = Vec::new();
    for device in host.input_devices().map_err(device_error)? {
        if let Ok(name) = device.name() {
            if name.contains(query) {
                return Ok(device);
            }
            available.push(name);
        }
    }
    tracing::warn!(query, ?available, "no matching input device");
    Err(ArDancerError::audio(format!("no input device matching `{query}`")))
}

/// Subset of a device's supported configuration range that matters here.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ConfigRange {
    channels: u16,
    min_rate: u32,
    max_rate: u32,
    float: bool,
}

impl From<&cpal::SupportedStreamConfigRange> for ConfigRange {
    fn from(range: &cpal::SupportedStreamConfigRange) -> Self {
        Self {
            channels: range.channels(),
            min_rate: range.min_sample_rate().0,
            max_rate: range.max_sample_rate().0,
            float: range.sample_format() == cpal::SampleFormat::F32,
        }
    }
}

fn supports(format: StreamFormat, ranges: &[ConfigRange]) -> bool {
    ranges.iter().any(|range| {
        range.float
            && range.channels == format.channels
            && (range.min_rate..=range.max_rate).contains(&format.sample_rate)
    })
}

fn open_stream(
    format: StreamFormat,
    query: Option<&str>,
    block_size: usize,
    mut callback: BlockCallback,
) -> Result<cpal::Stream> {
    let host = cpal::default_host();
    let device = select_device(&host, query)?;
    let name = device.name().unwrap_or_else(|_| "unknown".to_string());

    let ranges: Vec<ConfigRange> = device
        .supported_input_configs()
        .map_err(device_error)?
        .map(|range| ConfigRange::from(&range))
        .collect();
    if !supports(format, &ranges) {
        return Err(ArDancerError::audio(format!(
            "input device `{name}` cannot deliver {format}"
        )));
    }

    let config = cpal::StreamConfig {
        channels: format.channels,
        sample_rate: cpal::SampleRate(format.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };
    let mut blocks = BlockAssembler::new(block_size * format.channels as usize);

    let stream = device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                blocks.push(data, |block| callback(block));
            },
            |err| tracing::warn!(%err, "microphone stream error"),
            None,
        )
        .map_err(device_error)?;
    stream.play().map_err(device_error)?;

    tracing::info!(device = %name, %format, block_size, "microphone stream opened");
    Ok(stream)
}
