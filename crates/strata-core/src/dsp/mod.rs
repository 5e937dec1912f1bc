//! Signal nodes
//!
//! Every node processes `StereoBuffer` blocks in place (or A/B → out for the
//! crossfader), clamps its parameters at the setter boundary, and ramps
//! gain-like parameters over 10 ms (filter cutoff/Q over 5 ms) so parameter
//! changes never click.

mod crossfader;
mod delay;
mod dynamics;
mod eq3;
mod filter;
mod gain;
mod ramp;
mod reverb;

pub use crossfader::{CrossfaderCurve, Crossfader};
pub use delay::Delay;
pub use dynamics::{Compressor, MasterLimiter};
pub use eq3::{Eq3, EqBand, EQ_GAIN_MAX_DB, EQ_GAIN_MIN_DB};
pub use filter::{BiquadFilter, FilterType, FILTER_FREQ_MAX, FILTER_FREQ_MIN, FILTER_Q_MAX, FILTER_Q_MIN};
pub use gain::Gain;
pub use ramp::SmoothedParam;
pub use reverb::Reverb;

/// Default ramp for gain-like parameters
pub const GAIN_RAMP_MS: f32 = 10.0;

/// Shorter ramp for filter cutoff/Q so sweeps stay responsive
pub const FILTER_RAMP_MS: f32 = 5.0;

/// Convert decibels to a linear amplitude factor
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Convert a linear amplitude factor to decibels
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    20.0 * linear.max(1e-10).log10()
}
