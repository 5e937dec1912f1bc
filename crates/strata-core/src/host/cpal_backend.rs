//! CPAL output stream construction
//!
//! The stream callback owns the [`AudioEngine`] exclusively. The engine
//! renders into a pre-allocated stereo buffer which is then copied into the
//! device's interleaved frame slice; non-stereo devices get the stereo pair
//! replicated/folded.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize as CpalBufferSize, SampleFormat, StreamConfig};

use crate::engine::{AudioEngine, MAX_BUFFER_SIZE};
use crate::error::{EngineError, EngineResult};
use crate::types::StereoBuffer;

use super::config::{BufferSize, HostConfig};

/// A live output stream plus its negotiated format
pub struct StreamBackend {
    // Dropping the stream stops audio
    _stream: cpal::Stream,
    pub sample_rate: u32,
    pub buffer_size: u32,
}

impl std::fmt::Debug for StreamBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamBackend")
            .field("sample_rate", &self.sample_rate)
            .field("buffer_size", &self.buffer_size)
            .finish_non_exhaustive()
    }
}

/// Pick the output device requested by the config
fn select_device(config: &HostConfig) -> EngineResult<cpal::Device> {
    let host = cpal::default_host();
    match &config.device {
        Some(name_match) => {
            let wanted = name_match.to_lowercase();
            host.output_devices()
                .map_err(|e| EngineError::StreamError(e.to_string()))?
                .find(|d| {
                    d.name()
                        .map(|n| n.to_lowercase().contains(&wanted))
                        .unwrap_or(false)
                })
                .ok_or_else(|| EngineError::StreamError(format!("device '{name_match}' not found")))
        }
        None => host.default_output_device().ok_or(EngineError::NoDevices),
    }
}

/// Query the sample rate the device will run at, so the engine can be built
/// at the right rate before the stream exists
pub fn probe_output_rate(config: &HostConfig) -> EngineResult<u32> {
    let device = select_device(config)?;
    let supported = device
        .default_output_config()
        .map_err(|e| EngineError::StreamError(e.to_string()))?;
    Ok(supported.sample_rate().0)
}

/// Build and start the output stream, moving the engine into the callback
pub fn start_stream(
    config: &HostConfig,
    engine: AudioEngine,
    dropouts: Arc<AtomicU64>,
) -> EngineResult<StreamBackend> {
    let device = select_device(config)?;
    let device_name = device.name().unwrap_or_else(|_| "unknown".into());

    let supported = device
        .default_output_config()
        .map_err(|e| EngineError::StreamError(e.to_string()))?;
    if supported.sample_format() != SampleFormat::F32 {
        return Err(EngineError::StreamError(format!(
            "unsupported sample format {:?}",
            supported.sample_format()
        )));
    }

    let sample_rate = supported.sample_rate().0;
    let channels = supported.channels() as usize;
    let requested = config.buffer_size.frames();
    let buffer_size = requested.unwrap_or(256).min(MAX_BUFFER_SIZE as u32);

    let stream_config = StreamConfig {
        channels: supported.channels(),
        sample_rate: supported.sample_rate(),
        buffer_size: match config.buffer_size {
            BufferSize::DeviceDefault => CpalBufferSize::Default,
            _ => CpalBufferSize::Fixed(buffer_size),
        },
    };

    log::info!(
        "audio output: {device_name}, {channels}ch, {sample_rate}Hz, {} frames (~{:.1}ms)",
        buffer_size,
        buffer_size as f32 / sample_rate as f32 * 1000.0
    );

    let mut engine = engine;
    let mut render_buf = StereoBuffer::silence(MAX_BUFFER_SIZE);

    let err_dropouts = dropouts.clone();
    let stream = device
        .build_output_stream(
            &stream_config,
            move |data: &mut [f32], _info| {
                let frames = data.len() / channels;
                render_buf.set_len_from_capacity(frames.min(MAX_BUFFER_SIZE));
                engine.process(&mut render_buf);

                for (i, frame) in data.chunks_exact_mut(channels).enumerate() {
                    let s = render_buf[i.min(render_buf.len() - 1)];
                    match channels {
                        1 => frame[0] = 0.5 * (s.left + s.right),
                        _ => {
                            frame[0] = s.left;
                            frame[1] = s.right;
                            for extra in frame.iter_mut().skip(2) {
                                *extra = 0.0;
                            }
                        }
                    }
                }
            },
            move |err| {
                log::warn!("audio stream error: {err}");
                err_dropouts.fetch_add(1, Ordering::Relaxed);
            },
            None,
        )
        .map_err(|e| EngineError::StreamError(e.to_string()))?;

    stream
        .play()
        .map_err(|e| EngineError::StreamError(e.to_string()))?;

    Ok(StreamBackend {
        _stream: stream,
        sample_rate,
        buffer_size,
    })
}
