use std::sync::Arc;
use std::time::Instant;

use crate::config::{MOVEMENT_DEFAULT, MOVEMENT_MAX, READOUT_INTERVAL, ZOOM_DEFAULT};
use crate::engine::error::BuildError;
use crate::engine::field::{self, ParticleField, SourceImage};
use crate::engine::oscillate::{Oscillation, OscillationFrame};
use crate::engine::params::{ParameterTracker, Params};
use crate::engine::scheduler::RebuildScheduler;
use crate::engine::swap::DoubleBuffer;
use crate::engine::worker::BuildWorker;

/// Parameter snapshot pushed to the UI layer at a throttled cadence.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Readout {
    pub zoom: f32,
    pub density: f32,
    pub disparity: f32,
    pub particles: usize,
    pub rebuilds: u32,
}

/// What one tick decided, for the render glue to act on.
#[derive(Debug)]
pub struct TickOutcome {
    /// Render this frame. False means nothing moved and the frame can
    /// be skipped entirely.
    pub needs_render: bool,
    /// A new field became active this tick; its GPU buffers must be
    /// re-uploaded before drawing.
    pub swapped: bool,
    /// Uniform inputs for the depth oscillation pass, present exactly
    /// when the pass should run this frame.
    pub oscillation: Option<OscillationFrame>,
    /// Throttled UI readout; None on most ticks.
    pub readout: Option<Readout>,
}

/// The re-parameterization engine behind one per-frame `tick`.
///
/// Owns the parameter tracker, the rebuild scheduler and its worker
/// thread, the double-buffered field, and the oscillation clock. One
/// engine per loaded image; loading a new image means building a new
/// engine. Dropping it joins the worker and releases the field buffers.
#[derive(Debug)]
pub struct Engine {
    tracker: ParameterTracker,
    scheduler: RebuildScheduler,
    worker: BuildWorker,
    buffer: DoubleBuffer,
    oscillation: Oscillation,
    movement: f32,
    rebuilds: u32,
    last_readout: Option<Instant>,
}

impl Engine {
    /// Builds the initial field synchronously so the first frame already
    /// shows the image, then spawns the build worker for every rebuild
    /// after it. Fails only when the image itself is unusable.
    pub fn new(source: SourceImage) -> Result<Self, BuildError> {
        let tracker = ParameterTracker::new(ZOOM_DEFAULT);
        let initial = tracker.current();

        let started = Instant::now();
        let field = field::build(&source, initial.density, initial.disparity)?;
        log::info!(
            "initial field: {} particles from {}x{} in {:?}",
            field.len(),
            source.width(),
            source.height(),
            started.elapsed()
        );

        let worker = BuildWorker::spawn(Arc::new(source));

        Ok(Self {
            tracker,
            scheduler: RebuildScheduler::new(),
            worker,
            buffer: DoubleBuffer::new(field),
            oscillation: Oscillation::new(),
            movement: MOVEMENT_DEFAULT,
            rebuilds: 0,
            last_readout: None,
        })
    }

    /// Sets the zoom the view should ease toward. Safe to call at any
    /// rate; the debounce policy bounds how often fields rebuild.
    pub fn set_zoom_target(&mut self, zoom: f32) {
        self.tracker.set_zoom_target(zoom);
    }

    pub fn zoom_target(&self) -> f32 {
        self.tracker.target().zoom
    }

    /// Sets the depth oscillation amplitude. Zero freezes the field.
    pub fn set_movement(&mut self, movement: f32) {
        self.movement = movement.clamp(0.0, MOVEMENT_MAX);
    }

    pub fn movement(&self) -> f32 {
        self.movement
    }

    /// Current (damped) parameter values, for the camera transform.
    pub fn current(&self) -> Params {
        self.tracker.current()
    }

    /// The field the renderer should draw. Stable between ticks; only a
    /// `tick` reporting `swapped` replaces it.
    pub fn active_field(&self) -> &ParticleField {
        self.buffer.active()
    }

    /// One frame of engine work. Drains finished builds, eases the
    /// parameters, feeds the rebuild state machine, swaps a prepared
    /// field in at this frame boundary, and advances the oscillation
    /// clock. The caller renders only when told to.
    pub fn tick(&mut self, dt: f32, now: Instant) -> TickOutcome {
        // Finished builds first, so this tick's threshold checks compare
        // against the field that is about to become active.
        while let Some(outcome) = self.worker.try_recv() {
            match outcome.result {
                Ok(new_field) => {
                    self.tracker
                        .mark_built(new_field.density(), new_field.disparity());
                    self.scheduler.on_build_complete(now);
                    self.rebuilds += 1;
                    log::info!(
                        "rebuild #{} ready after {:?}: {} particles (density {:.3}, disparity {:.2})",
                        self.rebuilds,
                        outcome.job.requested_at.elapsed(),
                        new_field.len(),
                        new_field.density(),
                        new_field.disparity()
                    );
                    self.buffer.prepare_done(new_field);
                }
                Err(err) => {
                    log::warn!("rebuild discarded: {err}");
                    self.scheduler
                        .on_build_failed(outcome.job.density, outcome.job.disparity);
                }
            }
        }

        let advance = self.tracker.advance(dt);

        if let Some(job) = self.scheduler.update(&advance, now) {
            self.worker.submit(job);
        }

        let swapped = self.buffer.swap_if_ready();
        let oscillation = self.oscillation.advance(self.movement);
        let needs_render = !advance.converged || oscillation.is_some() || swapped;

        let due = self
            .last_readout
            .map_or(true, |at| now.duration_since(at) >= READOUT_INTERVAL);
        let readout = due.then(|| {
            self.last_readout = Some(now);
            Readout {
                zoom: advance.current.zoom,
                density: advance.current.density,
                disparity: advance.current.disparity,
                particles: self.buffer.active().len(),
                rebuilds: self.rebuilds,
            }
        });

        TickOutcome {
            needs_render,
            swapped,
            oscillation,
            readout,
        }
    }
}
