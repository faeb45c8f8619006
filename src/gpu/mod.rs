mod buffers;
mod compute;
mod context;
mod render;

pub use buffers::FieldBuffers;
pub use compute::OscillationPipeline;
pub use context::GpuContext;
pub use render::{Camera, PointPipeline};
