//! Host statistics snapshot

/// Point-in-time host stats, sampled by the session's 1 Hz performance tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HostStats {
    pub sample_rate: u32,
    pub buffer_size: u32,
    /// Latency of one processing block
    pub base_latency_ms: f32,
    /// End-to-end output latency (double-buffered device path)
    pub output_latency_ms: f32,
    pub active_nodes: u32,
    /// Buffer underruns since initialization
    pub dropouts: u64,
    pub frames_processed: u64,
}

impl HostStats {
    pub fn idle() -> Self {
        Self {
            sample_rate: 0,
            buffer_size: 0,
            base_latency_ms: 0.0,
            output_latency_ms: 0.0,
            active_nodes: 0,
            dropouts: 0,
            frames_processed: 0,
        }
    }
}
