use std::time::Duration;

// ============================================
// World
// ============================================

/// World-space width of the particle field. The source image is always
/// scaled to this extent, so changing density never changes the apparent
/// image size.
pub const WORLD_EXTENT: f32 = 100.0;

// ============================================
// Zoom and the zoom -> parameter mapping
// ============================================

/// Valid zoom range. Targets outside it are clamped before they apply.
pub const ZOOM_MIN: f32 = 1.0;
pub const ZOOM_MAX: f32 = 10.0;

/// Zoom at engine creation and after a view reset.
pub const ZOOM_DEFAULT: f32 = 1.0;

/// Sampling density targets at the ends of the zoom range. More zoom
/// means a finer field. Density is the fraction of image pixels that
/// become particles, always in (0, 1].
pub const DENSITY_AT_ZOOM_MIN: f32 = 0.15;
pub const DENSITY_AT_ZOOM_MAX: f32 = 1.0;

/// Depth window targets at the ends of the zoom range, in world units.
/// More zoom widens the window, deepening the pseudo-stereo effect.
pub const DISPARITY_AT_ZOOM_MIN: f32 = 2.0;
pub const DISPARITY_AT_ZOOM_MAX: f32 = 14.0;

/// Zoom target delta per mouse wheel notch / per key press.
pub const ZOOM_WHEEL_STEP: f32 = 0.25;
pub const ZOOM_KEY_STEP: f32 = 0.5;

// ============================================
// Parameter damping
// ============================================

/// Time constant of the exponential easing toward target parameters.
/// Visible convergence (~95%) lands around 3 tau, roughly 200 ms.
pub const PARAM_TAU: f32 = 0.07;

/// Parameters closer to their target than this count as converged.
pub const CONVERGE_EPS: f32 = 1e-3;

// ============================================
// Rebuild policy
// ============================================

/// Density must drift this far from the last built value before a
/// rebuild is considered. Coarse on purpose: a full zoom sweep should
/// trigger a handful of rebuilds, not one per wheel notch.
pub const DENSITY_REBUILD_THRESHOLD: f32 = 0.4;

/// Same idea for the depth window, in world units.
pub const DISPARITY_REBUILD_THRESHOLD: f32 = 3.0;

/// Quiet period after the last target change before a rebuild fires.
/// A burst of zoom input collapses into one build of the final values.
pub const REBUILD_DEBOUNCE: Duration = Duration::from_millis(250);

// ============================================
// Depth oscillation
// ============================================

/// Fixed per-tick time increment for the oscillation phase. Not derived
/// from wall-clock dt, so the motion is identical at any frame rate.
pub const OSC_TIME_STEP: f32 = 0.045;

/// The movement setting is folded into the shader amplitude once per
/// frame: amplitude = movement * OSC_AMPLITUDE_SCALE.
pub const OSC_AMPLITUDE_SCALE: f32 = 2.0;

/// Movement (oscillation depth) at startup and its clamp ceiling.
/// Zero freezes the field.
pub const MOVEMENT_DEFAULT: f32 = 1.0;
pub const MOVEMENT_MAX: f32 = 4.0;

// ============================================
// UI readout
// ============================================

/// Minimum spacing between readout emissions toward the UI layer.
/// Keeps slider/title sync off the per-frame hot path.
pub const READOUT_INTERVAL: Duration = Duration::from_millis(100);

// ============================================
// Camera
// ============================================

/// Camera sits on +Z looking at the field plane; distance shrinks as
/// zoom grows.
pub const CAMERA_BASE_DISTANCE: f32 = 130.0;
pub const CAMERA_FOV_DEG: f32 = 45.0;
pub const CAMERA_NEAR: f32 = 0.1;
pub const CAMERA_FAR: f32 = 400.0;

// ============================================
// GPU
// ============================================

/// Compute shader workgroup size. Must match oscillate.wgsl.
pub const WORKGROUP_SIZE: u32 = 256;
