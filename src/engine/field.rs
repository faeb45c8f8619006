use crate::config::WORLD_EXTENT;
use crate::engine::error::BuildError;

/// Decoded source image, RGBA8, row-major. Shared immutably with the
/// build worker; never mutated after construction.
pub struct SourceImage {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

impl SourceImage {
    /// `rgba` must hold exactly `width * height` RGBA8 pixels.
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Self {
        assert_eq!(
            rgba.len(),
            width as usize * height as usize * 4,
            "pixel buffer size does not match {width}x{height}"
        );
        Self {
            width,
            height,
            rgba,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    fn pixel(&self, index: usize) -> [u8; 4] {
        let at = index * 4;
        [
            self.rgba[at],
            self.rgba[at + 1],
            self.rgba[at + 2],
            self.rgba[at + 3],
        ]
    }
}

/// One particle, in the exact layout the shaders read.
///
/// Layout: 32 bytes.
/// - position: [f32; 3] = 12 bytes - world position; z is the only
///   component the oscillation pass ever rewrites (GPU copy only)
/// - phase:    f32      =  4 bytes - oscillation phase offset, hashed
///   from the source pixel index at build time
/// - color:    [f32; 3] = 12 bytes - linear-space RGB
/// - base_z:   f32      =  4 bytes - build-time z, the oscillation
///   baseline; never mutated
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuParticle {
    pub position: [f32; 3],
    pub phase: f32,
    pub color: [f32; 3],
    pub base_z: f32,
}

/// A complete particle field built from one `{density, disparity}`
/// configuration.
///
/// The CPU copy is immutable after construction: it holds the build-time
/// positions (so `position` doubles as the initial position) and is the
/// upload source whenever the field becomes active. Per-frame depth
/// animation happens only in the GPU copy.
#[derive(Debug)]
pub struct ParticleField {
    particles: Vec<GpuParticle>,
    width: u32,
    density: f32,
    disparity: f32,
}

impl ParticleField {
    pub fn particles(&self) -> &[GpuParticle] {
        &self.particles
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn density(&self) -> f32 {
        self.density
    }

    pub fn disparity(&self) -> f32 {
        self.disparity
    }

    /// Raw bytes for the GPU upload.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.particles)
    }

    /// World-space half extent for rendering one particle as a quad.
    /// Grows as density falls so sparse fields still read as a solid
    /// image.
    pub fn point_half_extent(&self) -> f32 {
        let pixel_world = WORLD_EXTENT / self.width.max(1) as f32;
        0.5 * pixel_world / self.density.sqrt()
    }
}

/// Builds a particle field from the source image.
///
/// Pure and synchronous: no shared mutable state, safe to run on the
/// build worker. Samples `round(width * height * density)` pixels evenly
/// across the grid by index mapping, visiting only the pixels that
/// become particles. Two builds with the same inputs produce
/// byte-identical fields.
pub fn build(
    source: &SourceImage,
    density: f32,
    disparity: f32,
) -> Result<ParticleField, BuildError> {
    if !density.is_finite() || density <= 0.0 || density > 1.0 {
        return Err(BuildError::InvalidParameter {
            name: "density",
            value: density,
        });
    }
    if !disparity.is_finite() || disparity < 0.0 {
        return Err(BuildError::InvalidParameter {
            name: "disparity",
            value: disparity,
        });
    }
    if source.width == 0 || source.height == 0 {
        return Err(BuildError::EmptyImage {
            width: source.width,
            height: source.height,
        });
    }

    let pixel_count = source.pixel_count();
    let count = ((pixel_count as f64 * density as f64).round() as usize).max(1);

    let width = source.width as f32;
    let height = source.height as f32;
    // One scale for both axes keeps the image aspect ratio; the field is
    // WORLD_EXTENT wide no matter what density is.
    let world_per_pixel = WORLD_EXTENT / width;

    let mut particles = Vec::with_capacity(count);
    for i in 0..count {
        // Even deterministic spread: strictly monotone for count <= pixels,
        // the identity when density is 1.
        let pixel_index = (i as u64 * pixel_count as u64 / count as u64) as usize;
        let px = (pixel_index % source.width as usize) as f32;
        let py = (pixel_index / source.width as usize) as f32;

        let [r, g, b, _a] = source.pixel(pixel_index);

        let x = (px + 0.5 - width / 2.0) * world_per_pixel;
        let y = (height / 2.0 - (py + 0.5)) * world_per_pixel;
        let z = (luma(r, g, b) - 0.5) * disparity;

        // Phase comes from the pixel index, not from a random draw, so a
        // pixel keeps its phase across rebuilds and the motion never
        // jumps when a new field swaps in.
        let phase = phase_for_index(pixel_index as u32);

        particles.push(GpuParticle {
            position: [x, y, z],
            phase,
            color: [
                srgb_to_linear(r),
                srgb_to_linear(g),
                srgb_to_linear(b),
            ],
            base_z: z,
        });
    }

    Ok(ParticleField {
        particles,
        width: source.width,
        density,
        disparity,
    })
}

/// Rec.601 luma of gamma-encoded RGB, in [0, 1]. Good enough as a depth
/// estimate; brighter reads as nearer.
fn luma(r: u8, g: u8, b: u8) -> f32 {
    (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32) / 255.0
}

/// One sRGB channel to linear space.
fn srgb_to_linear(c: u8) -> f32 {
    let c = c as f32 / 255.0;
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// Oscillation phase offset in [0, 2pi) for a pixel index.
fn phase_for_index(index: u32) -> f32 {
    pcg_hash(index) as f32 / u32::MAX as f32 * std::f32::consts::TAU
}

/// PCG hash function for generating deterministic seeds.
fn pcg_hash(input: u32) -> u32 {
    let state = input.wrapping_mul(747796405).wrapping_add(2891336453);
    let word = ((state >> ((state >> 28).wrapping_add(4))) ^ state).wrapping_mul(277803737);
    (word >> 22) ^ word
}
