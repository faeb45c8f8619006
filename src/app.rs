use std::sync::Arc;
use std::time::Instant;
use winit::application::ApplicationHandler;
use winit::event::{MouseScrollDelta, WindowEvent};
use winit::event_loop::ActiveEventLoop;
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use crate::config::{MOVEMENT_DEFAULT, ZOOM_DEFAULT, ZOOM_KEY_STEP, ZOOM_WHEEL_STEP};
use crate::engine::{Engine, Readout};
use crate::gpu::{Camera, FieldBuffers, GpuContext, OscillationPipeline, PointPipeline};

/// Application state: the engine plus the window/GPU glue around it.
pub struct App {
    engine: Engine,
    window: Option<Arc<Window>>,
    gpu: Option<GpuContext>,
    buffers: Option<FieldBuffers>,
    oscillation_pipeline: Option<OscillationPipeline>,
    point_pipeline: Option<PointPipeline>,
    last_frame: Instant,
    fps_counter: FpsCounter,
    fps: f64,
    readout: Option<Readout>,
}

impl App {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            window: None,
            gpu: None,
            buffers: None,
            oscillation_pipeline: None,
            point_pipeline: None,
            last_frame: Instant::now(),
            fps_counter: FpsCounter::new(),
            fps: 0.0,
            readout: None,
        }
    }

    /// One frame: tick the engine, then act on what it decided. The
    /// engine keeps ticking even on frames it tells us not to render.
    fn frame(&mut self) {
        let now = Instant::now();
        let dt = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;

        let outcome = self.engine.tick(dt, now);

        if let Some(readout) = outcome.readout {
            self.readout = Some(readout);
            self.update_title();
        }

        let (Some(gpu), Some(buffers), Some(oscillation), Some(points)) = (
            self.gpu.as_ref(),
            self.buffers.as_mut(),
            self.oscillation_pipeline.as_ref(),
            self.point_pipeline.as_ref(),
        ) else {
            return;
        };

        // A swap is the one moment per-particle data crosses to the GPU.
        if outcome.swapped {
            buffers.upload_field(&gpu.device, &gpu.queue, self.engine.active_field());
        }

        if !outcome.needs_render {
            return;
        }

        if let Some(frame) = outcome.oscillation {
            buffers.update_oscillation(&gpu.queue, frame);
        }

        let camera = Camera {
            zoom: self.engine.current().zoom,
            aspect: gpu.aspect(),
        };
        buffers.update_view(
            &gpu.queue,
            camera.view_proj(),
            self.engine.active_field().point_half_extent(),
        );

        let output = match gpu.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                gpu.surface.configure(&gpu.device, &gpu.config);
                return;
            }
            Err(e) => {
                log::error!("Surface error: {:?}", e);
                return;
            }
        };

        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame-encoder"),
            });

        // 1. Oscillation compute pass, only on frames with movement.
        if outcome.oscillation.is_some() {
            let bind_group = oscillation.create_bind_group(
                &gpu.device,
                buffers.particle_buffer(),
                &buffers.osc_buffer,
            );
            oscillation.dispatch(&mut encoder, &bind_group, buffers.particle_count());
        }

        // 2. Draw the field.
        let bind_group =
            points.create_bind_group(&gpu.device, buffers.particle_buffer(), &buffers.view_buffer);
        points.draw(&mut encoder, &view, &bind_group, buffers.particle_count());

        gpu.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        if let Some(fps) = self.fps_counter.tick() {
            self.fps = fps;
            self.update_title();
        }
    }

    fn update_title(&self) {
        let Some(window) = &self.window else { return };
        let movement = if self.engine.movement() > 0.0 { "on" } else { "off" };
        match self.readout {
            Some(r) => window.set_title(&format!(
                "lumafield - {:.0} FPS - zoom {:.2} density {:.2} disparity {:.1} - {} particles - {} rebuilds - movement {}",
                self.fps, r.zoom, r.density, r.disparity, r.particles, r.rebuilds, movement
            )),
            None => window.set_title("lumafield"),
        }
    }

    fn handle_key(&mut self, key_code: KeyCode) {
        match key_code {
            // Zoom (Q/E or -/+)
            KeyCode::KeyQ | KeyCode::Minus => {
                self.engine
                    .set_zoom_target(self.engine.zoom_target() - ZOOM_KEY_STEP);
            }
            KeyCode::KeyE | KeyCode::Equal => {
                self.engine
                    .set_zoom_target(self.engine.zoom_target() + ZOOM_KEY_STEP);
            }

            // Toggle depth movement
            KeyCode::KeyM => {
                let next = if self.engine.movement() > 0.0 {
                    0.0
                } else {
                    MOVEMENT_DEFAULT
                };
                self.engine.set_movement(next);
                log::info!(
                    "Depth movement: {}",
                    if next > 0.0 { "ON" } else { "OFF" }
                );
            }

            // Reset view
            KeyCode::KeyR => {
                self.engine.set_zoom_target(ZOOM_DEFAULT);
                self.engine.set_movement(MOVEMENT_DEFAULT);
                log::info!("View reset");
            }

            _ => {}
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        log::info!("Opening window...");
        let window_attrs = Window::default_attributes()
            .with_title("lumafield")
            .with_inner_size(winit::dpi::LogicalSize::new(1280, 800));

        let window = Arc::new(
            event_loop
                .create_window(window_attrs)
                .expect("Failed to create window"),
        );

        log::info!("Creating GPU context...");
        let gpu = pollster::block_on(GpuContext::new(window.clone()));

        log::info!("Creating GPU buffers and pipelines...");
        let buffers = FieldBuffers::new(&gpu.device, &gpu.queue, self.engine.active_field());
        let oscillation_pipeline = OscillationPipeline::new(&gpu.device);
        let point_pipeline = PointPipeline::new(&gpu.device, gpu.format());

        log::info!("Ready. Controls:");
        log::info!("  Wheel / Q / E: Zoom");
        log::info!("  M: Toggle depth movement");
        log::info!("  R: Reset view");
        log::info!("  Escape: Quit");

        self.last_frame = Instant::now();
        self.window = Some(window);
        self.gpu = Some(gpu);
        self.buffers = Some(buffers);
        self.oscillation_pipeline = Some(oscillation_pipeline);
        self.point_pipeline = Some(point_pipeline);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, exiting...");
                event_loop.exit();
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state.is_pressed() {
                    if let PhysicalKey::Code(key_code) = event.physical_key {
                        if key_code == KeyCode::Escape {
                            log::info!("Escape pressed, exiting...");
                            event_loop.exit();
                        } else {
                            self.handle_key(key_code);
                        }
                    }
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let notches = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(p) => p.y as f32 / 50.0,
                };
                self.engine
                    .set_zoom_target(self.engine.zoom_target() + notches * ZOOM_WHEEL_STEP);
            }
            WindowEvent::Resized(new_size) => {
                if let Some(gpu) = &mut self.gpu {
                    log::info!("Window resized to {}x{}", new_size.width, new_size.height);
                    gpu.resize(new_size);
                }
            }
            WindowEvent::RedrawRequested => {
                self.frame();
                // The engine must tick every frame even when nothing is
                // drawn, so always ask for the next one.
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    }
}

/// Simple FPS counter
struct FpsCounter {
    last_update: Instant,
    frame_count: u32,
}

impl FpsCounter {
    fn new() -> Self {
        Self {
            last_update: Instant::now(),
            frame_count: 0,
        }
    }

    /// Tick the counter, returns Some(fps) every second
    fn tick(&mut self) -> Option<f64> {
        self.frame_count += 1;
        let elapsed = self.last_update.elapsed();

        if elapsed.as_secs_f64() >= 1.0 {
            let fps = self.frame_count as f64 / elapsed.as_secs_f64();
            self.frame_count = 0;
            self.last_update = Instant::now();
            Some(fps)
        } else {
            None
        }
    }
}
