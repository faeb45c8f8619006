mod driver;
mod error;
mod field;
mod oscillate;
mod params;
mod scheduler;
mod swap;
mod worker;

pub use driver::{Engine, Readout, TickOutcome};
pub use error::BuildError;
pub use field::{ParticleField, SourceImage};
pub use oscillate::OscillationFrame;
