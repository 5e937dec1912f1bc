//! Host configuration

use crate::types::SAMPLE_RATE;

/// Requested buffer sizing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferSize {
    /// Interactive latency target (<20 ms total): small fixed blocks
    Interactive,
    /// Explicit frame count
    Frames(u32),
    /// Whatever the device prefers
    DeviceDefault,
}

impl BufferSize {
    /// Frames to request for this setting
    pub fn frames(&self) -> Option<u32> {
        match self {
            BufferSize::Interactive => Some(256),
            BufferSize::Frames(n) => Some(*n),
            BufferSize::DeviceDefault => None,
        }
    }
}

/// Audio host configuration
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Output device name substring; None = system default
    pub device: Option<String>,
    pub buffer_size: BufferSize,
    /// Offline mode: no device, the caller pumps blocks via `render`
    pub offline: bool,
    /// Sample rate for offline mode (device rate wins otherwise)
    pub sample_rate: u32,
}

impl HostConfig {
    /// Live output on the default device at interactive latency
    pub fn interactive() -> Self {
        Self {
            device: None,
            buffer_size: BufferSize::Interactive,
            offline: false,
            sample_rate: SAMPLE_RATE,
        }
    }

    /// Headless host driven by a caller pump (tests, rendering)
    pub fn offline() -> Self {
        Self {
            device: None,
            buffer_size: BufferSize::Interactive,
            offline: true,
            sample_rate: SAMPLE_RATE,
        }
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self::interactive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interactive_buffer_is_small() {
        let frames = BufferSize::Interactive.frames().unwrap();
        // 256 frames at 48 kHz ≈ 5.3 ms per block, well inside the
        // <20 ms total budget with double buffering
        assert!(frames <= 512);
    }
}
