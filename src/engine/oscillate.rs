use crate::config::{OSC_AMPLITUDE_SCALE, OSC_TIME_STEP};

/// Per-frame inputs for the depth oscillation pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OscillationFrame {
    /// Shared clock, in [0, 2pi).
    pub time: f32,
    /// World-space amplitude applied to every particle.
    pub amplitude: f32,
}

/// The shared oscillation clock.
///
/// Ticks by a fixed step per rendered frame rather than by wall time.
/// When movement is zero the clock does not advance and no frame is
/// emitted, so the pass is skipped entirely and particles hold their
/// current depth. Raising movement again resumes from the held clock,
/// never from zero.
#[derive(Debug)]
pub struct Oscillation {
    time: f32,
}

impl Oscillation {
    pub fn new() -> Self {
        Self { time: 0.0 }
    }

    /// Advances the clock and yields this frame's pass inputs, or `None`
    /// when movement is zero and the pass should not run.
    pub fn advance(&mut self, movement: f32) -> Option<OscillationFrame> {
        if movement <= 0.0 {
            return None;
        }
        self.time = (self.time + OSC_TIME_STEP) % std::f32::consts::TAU;
        Some(OscillationFrame {
            time: self.time,
            amplitude: movement * OSC_AMPLITUDE_SCALE,
        })
    }
}
