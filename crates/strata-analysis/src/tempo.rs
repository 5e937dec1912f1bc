//! Onset detection and tempo estimation
//!
//! Energy-flux onset picking feeding an inter-onset-interval histogram.
//! Intervals fold octave-wise into the 60–180 BPM range; confidence is the
//! winning bin's share of all votes. Good enough to drive beat-sync, which
//! only needs the tempo ratio between two decks.

/// Analysis frame length in samples
const FRAME: usize = 1024;
/// Hop between frames
const HOP: usize = 512;
/// Minimum separation between picked onsets (seconds)
const MIN_ONSET_GAP: f64 = 0.05;

/// Folded tempo range
const BPM_MIN: f64 = 60.0;
const BPM_MAX: f64 = 180.0;

/// Detect onsets as positive energy-flux peaks
pub fn detect_onsets(samples: &[f32], sample_rate: u32) -> Vec<f64> {
    if samples.len() < FRAME * 2 || sample_rate == 0 {
        return Vec::new();
    }

    // Per-frame RMS energy
    let mut energies = Vec::with_capacity(samples.len() / HOP);
    let mut start = 0;
    while start + FRAME <= samples.len() {
        let frame = &samples[start..start + FRAME];
        let energy: f32 = frame.iter().map(|s| s * s).sum::<f32>() / FRAME as f32;
        energies.push(energy);
        start += HOP;
    }

    // Positive flux only: energy rising marks an attack
    let flux: Vec<f32> = energies
        .windows(2)
        .map(|w| (w[1] - w[0]).max(0.0))
        .collect();
    if flux.is_empty() {
        return Vec::new();
    }

    let mean = flux.iter().sum::<f32>() / flux.len() as f32;
    let variance = flux.iter().map(|f| (f - mean) * (f - mean)).sum::<f32>() / flux.len() as f32;
    let threshold = mean + 1.5 * variance.sqrt();

    let hop_secs = HOP as f64 / sample_rate as f64;
    let mut onsets = Vec::new();
    let mut last_onset = f64::NEG_INFINITY;
    for i in 1..flux.len().saturating_sub(1) {
        let is_peak = flux[i] > threshold && flux[i] >= flux[i - 1] && flux[i] >= flux[i + 1];
        if is_peak {
            // flux[i] compares energies of frames i and i+1; the attack sits
            // at the start of frame i+1
            let t = (i + 1) as f64 * hop_secs;
            if t - last_onset >= MIN_ONSET_GAP {
                onsets.push(t);
                last_onset = t;
            }
        }
    }
    onsets
}

/// Estimate BPM from onset times. Returns (bpm, confidence in [0, 1]).
pub fn estimate_bpm(onsets: &[f64]) -> (f64, f32) {
    if onsets.len() < 4 {
        return (0.0, 0.0);
    }

    // Vote every inter-onset interval (and pairs one apart, catching missed
    // onsets) into 1-BPM bins after octave folding
    let span = (BPM_MAX - BPM_MIN) as usize;
    let mut histogram = vec![0u32; span + 1];
    let mut votes = 0u32;

    let mut vote = |interval: f64, histogram: &mut Vec<u32>, votes: &mut u32| {
        if interval <= 0.0 {
            return;
        }
        let mut bpm = 60.0 / interval;
        while bpm < BPM_MIN {
            bpm *= 2.0;
        }
        while bpm > BPM_MAX {
            bpm /= 2.0;
        }
        let bin = (bpm - BPM_MIN).round() as usize;
        if bin <= span {
            histogram[bin] += 1;
            *votes += 1;
        }
    };

    for pair in onsets.windows(2) {
        vote(pair[1] - pair[0], &mut histogram, &mut votes);
    }
    for triple in onsets.windows(3) {
        vote((triple[2] - triple[0]) / 2.0, &mut histogram, &mut votes);
    }

    if votes == 0 {
        return (0.0, 0.0);
    }

    // Winning bin plus neighbors, weighted center
    let best = histogram
        .iter()
        .enumerate()
        .max_by_key(|(_, &count)| count)
        .map(|(bin, _)| bin)
        .unwrap_or(0);

    let lo = best.saturating_sub(1);
    let hi = (best + 1).min(span);
    let mut mass = 0u32;
    let mut weighted = 0.0f64;
    for bin in lo..=hi {
        mass += histogram[bin];
        weighted += histogram[bin] as f64 * (BPM_MIN + bin as f64);
    }
    if mass == 0 {
        return (0.0, 0.0);
    }

    let bpm = weighted / mass as f64;
    let confidence = (mass as f32 / votes as f32).clamp(0.0, 1.0);
    (bpm, confidence)
}

/// Project a beat grid over the material from the estimated tempo and the
/// first onset. Returns (beats, downbeats); downbeats are every fourth beat.
pub fn beat_grid(bpm: f64, first_onset: f64, duration: f64) -> (Vec<f64>, Vec<f64>) {
    if bpm <= 0.0 || duration <= 0.0 {
        return (Vec::new(), Vec::new());
    }
    let period = 60.0 / bpm;
    // Walk the grid back so it covers material before the first onset
    let mut start = first_onset;
    while start - period >= 0.0 {
        start -= period;
    }

    let mut beats = Vec::new();
    let mut t = start;
    while t < duration {
        beats.push(t);
        t += period;
    }
    let downbeats = beats.iter().step_by(4).copied().collect();
    (beats, downbeats)
}

/// Crude spectral-centroid estimate: the first difference is a high-pass,
/// so the diff-to-signal energy ratio tracks brightness
pub fn spectral_centroid(samples: &[f32], sample_rate: u32) -> f64 {
    if samples.len() < 2 {
        return 0.0;
    }
    let diff_energy: f64 = samples
        .windows(2)
        .map(|w| ((w[1] - w[0]) as f64).abs())
        .sum();
    let signal_energy: f64 = samples.iter().map(|s| (*s as f64).abs()).sum();
    if signal_energy <= f64::EPSILON {
        return 0.0;
    }
    (diff_energy / signal_energy) * sample_rate as f64 / 4.0
}
