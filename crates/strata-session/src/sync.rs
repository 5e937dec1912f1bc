//! Beat-sync state machine
//!
//! At most one master/slave binding. Engaging computes the slave pitch from
//! the tempo ratio; a new `sync` replaces the binding; touching the slave's
//! pitch directly disengages.

use strata_core::deck::{PITCH_MAX, PITCH_MIN};
use strata_core::types::DeckId;

/// The raw tempo-ratio delta is clamped here before the deck's own ±8 clamp
const DELTA_CLAMP: f64 = 100.0;

/// An engaged sync binding
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncBinding {
    pub master: DeckId,
    pub slave: DeckId,
    pub master_bpm: f64,
    pub slave_bpm: f64,
    /// Host clock seconds at engagement
    pub engaged_at: f64,
}

/// What an engage attempt produced
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// Slave pitch to apply, already clamped to the deck range
    Engaged { slave_pitch: f64 },
    /// One of the BPMs is missing; state unchanged
    Skipped { reason: String },
}

/// `None` | `Synced` holder with the engage/disengage rules
#[derive(Debug, Default)]
pub struct SyncEngine {
    binding: Option<SyncBinding>,
}

impl SyncEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn binding(&self) -> Option<&SyncBinding> {
        self.binding.as_ref()
    }

    pub fn is_synced(&self) -> bool {
        self.binding.is_some()
    }

    /// Pitch percent that makes `slave_bpm` match `master_bpm`
    pub fn pitch_delta(master_bpm: f64, slave_bpm: f64) -> f64 {
        let raw = ((master_bpm / slave_bpm) - 1.0) * 100.0;
        raw.clamp(-DELTA_CLAMP, DELTA_CLAMP)
            .clamp(PITCH_MIN, PITCH_MAX)
    }

    /// Engage (or re-engage with a different master). `master_bpm` is the
    /// master's *current* BPM (original × rate); `slave_bpm` is the slave's
    /// original BPM, so the computed pitch lands the slave on the master.
    pub fn engage(
        &mut self,
        master: DeckId,
        master_bpm: Option<f64>,
        slave_bpm: Option<f64>,
        now: f64,
    ) -> SyncOutcome {
        let slave = master.other();
        let (Some(master_bpm), Some(slave_bpm)) = (master_bpm, slave_bpm) else {
            let reason = format!(
                "deck {} BPM unknown",
                if master_bpm.is_none() { master.name() } else { slave.name() }
            );
            return SyncOutcome::Skipped { reason };
        };
        if master_bpm <= 0.0 || slave_bpm <= 0.0 {
            return SyncOutcome::Skipped {
                reason: "BPM must be positive".into(),
            };
        }

        let slave_pitch = Self::pitch_delta(master_bpm, slave_bpm);
        self.binding = Some(SyncBinding {
            master,
            slave,
            master_bpm,
            slave_bpm,
            engaged_at: now,
        });
        SyncOutcome::Engaged { slave_pitch }
    }

    /// The master's tempo moved while synced: recompute the slave pitch
    pub fn retune(&mut self, master_bpm: f64) -> Option<f64> {
        let binding = self.binding.as_mut()?;
        binding.master_bpm = master_bpm;
        Some(Self::pitch_delta(master_bpm, binding.slave_bpm))
    }

    /// Drop the binding; returns true if one existed
    pub fn disengage(&mut self) -> bool {
        self.binding.take().is_some()
    }
}
