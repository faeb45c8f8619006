mod app;
mod config;
mod engine;
mod gpu;

use winit::event_loop::{ControlFlow, EventLoop};

use crate::app::App;
use crate::engine::{Engine, SourceImage};

fn main() -> Result<(), winit::error::EventLoopError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let source = match std::env::args().nth(1) {
        Some(path) => load_image(&path),
        None => {
            log::info!("No image given, using the procedural demo card");
            demo_card()
        }
    };

    let engine = match Engine::new(source) {
        Ok(engine) => engine,
        Err(err) => {
            log::error!("Cannot build a field from this image: {err}");
            std::process::exit(1);
        }
    };

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);
    let mut app = App::new(engine);
    event_loop.run_app(&mut app)
}

/// Decodes the image at `path` to the RGBA8 buffer the engine consumes.
fn load_image(path: &str) -> SourceImage {
    let image = match image::open(path) {
        Ok(image) => image.to_rgba8(),
        Err(err) => {
            log::error!("Failed to load {path}: {err}");
            std::process::exit(1);
        }
    };
    let (width, height) = image.dimensions();
    log::info!("Loaded {path}: {width}x{height}");
    SourceImage::new(width, height, image.into_raw())
}

/// A synthetic test card with strong luminance structure, so the depth
/// effect is visible with zero assets on disk.
fn demo_card() -> SourceImage {
    const WIDTH: u32 = 960;
    const HEIGHT: u32 = 540;

    let mut rgba = Vec::with_capacity(WIDTH as usize * HEIGHT as usize * 4);
    for y in 0..HEIGHT {
        for x in 0..WIDTH {
            let u = x as f32 / WIDTH as f32;
            let v = y as f32 / HEIGHT as f32;
            let radius = ((u - 0.5).powi(2) + (v - 0.5).powi(2)).sqrt();
            let rings = (radius * 40.0).sin() * 0.5 + 0.5;
            rgba.extend_from_slice(&[
                (u * 255.0) as u8,
                ((1.0 - v) * 255.0) as u8,
                (rings * 255.0) as u8,
                255,
            ]);
        }
    }
    SourceImage::new(WIDTH, HEIGHT, rgba)
}
