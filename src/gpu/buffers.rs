use glam::Mat4;
use wgpu::{Buffer, BufferUsages, Device, Queue};

use crate::engine::{OscillationFrame, ParticleField};

/// Oscillation pass inputs (16 bytes). Must match oscillate.wgsl.
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct OscParams {
    time: f32,
    amplitude: f32,
    count: u32,
    _padding: f32,
}

/// Render pass inputs (80 bytes, mat4x4 aligned to 16). Must match
/// render.wgsl.
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct ViewParams {
    view_proj: [[f32; 4]; 4],
    point_half_extent: f32,
    _padding: [f32; 3],
}

/// GPU-side copy of the active field plus the two uniform buffers.
///
/// The particle buffer is the only per-particle memory the frame loop
/// touches, and only on a swap: the whole field is uploaded once, then
/// per-frame work is the two small uniform writes. The buffer is
/// recreated when a swap changes the particle count and overwritten in
/// place otherwise.
pub struct FieldBuffers {
    particle_buffer: Buffer,
    particle_count: u32,
    pub osc_buffer: Buffer,
    pub view_buffer: Buffer,
}

impl FieldBuffers {
    pub fn new(device: &Device, queue: &Queue, field: &ParticleField) -> Self {
        let particle_buffer = create_particle_buffer(device, field.as_bytes().len() as u64);
        queue.write_buffer(&particle_buffer, 0, field.as_bytes());

        let osc_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("osc-params-buffer"),
            size: std::mem::size_of::<OscParams>() as u64,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let view_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("view-params-buffer"),
            size: std::mem::size_of::<ViewParams>() as u64,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            particle_buffer,
            particle_count: field.len() as u32,
            osc_buffer,
            view_buffer,
        }
    }

    /// Uploads a freshly swapped-in field. Called only on ticks that
    /// report a swap, never per frame.
    pub fn upload_field(&mut self, device: &Device, queue: &Queue, field: &ParticleField) {
        let bytes = field.as_bytes();
        if field.len() as u32 != self.particle_count {
            log::debug!(
                "particle buffer resized: {} -> {} particles",
                self.particle_count,
                field.len()
            );
            self.particle_buffer = create_particle_buffer(device, bytes.len() as u64);
            self.particle_count = field.len() as u32;
        }
        queue.write_buffer(&self.particle_buffer, 0, bytes);
    }

    /// Per-frame uniform write for the oscillation pass.
    pub fn update_oscillation(&self, queue: &Queue, frame: OscillationFrame) {
        let params = OscParams {
            time: frame.time,
            amplitude: frame.amplitude,
            count: self.particle_count,
            _padding: 0.0,
        };
        queue.write_buffer(&self.osc_buffer, 0, bytemuck::bytes_of(&params));
    }

    /// Per-rendered-frame uniform write for the camera and point size.
    pub fn update_view(&self, queue: &Queue, view_proj: Mat4, point_half_extent: f32) {
        let params = ViewParams {
            view_proj: view_proj.to_cols_array_2d(),
            point_half_extent,
            _padding: [0.0; 3],
        };
        queue.write_buffer(&self.view_buffer, 0, bytemuck::bytes_of(&params));
    }

    pub fn particle_buffer(&self) -> &Buffer {
        &self.particle_buffer
    }

    pub fn particle_count(&self) -> u32 {
        self.particle_count
    }
}

fn create_particle_buffer(device: &Device, size: u64) -> Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("particle-buffer"),
        size,
        usage: BufferUsages::STORAGE | BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}
