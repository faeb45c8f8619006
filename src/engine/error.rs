use thiserror::Error;

/// Failures surfaced by the field build path.
///
/// Both kinds are recoverable from the engine's point of view: a failed
/// rebuild is logged and dropped while the previously built field keeps
/// rendering. `EmptyImage` at engine creation is the one fatal case and
/// is left to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum BuildError {
    /// A build parameter was outside its documented range
    /// (density in (0, 1], disparity in [0, inf), both finite).
    #[error("invalid {name}: {value} is outside the valid range")]
    InvalidParameter { name: &'static str, value: f32 },

    /// The source image has a zero dimension, so there is nothing to
    /// sample.
    #[error("empty image: {width}x{height}")]
    EmptyImage { width: u32, height: u32 },
}
