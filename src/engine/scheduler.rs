use std::time::Instant;

use crate::config::{CONVERGE_EPS, REBUILD_DEBOUNCE};
use crate::engine::params::{crossings, AdvanceResult, Params};

/// A rebuild request, carrying the parameter snapshot taken when the
/// debounce window closed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BuildJob {
    pub density: f32,
    pub disparity: f32,
    pub requested_at: Instant,
}

/// Where the rebuild pipeline currently stands.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Phase {
    /// Active field matches the parameters well enough.
    Idle,
    /// Thresholds were crossed; waiting for input to go quiet.
    PendingDebounce { deadline: Instant },
    /// A build is in flight. `dirty` records whether the parameters
    /// drifted a threshold past the in-flight values, which earns
    /// another debounce round once the build lands.
    Building { job: BuildJob, dirty: bool },
}

/// Decides when a parameter drift becomes a background rebuild.
///
/// Crossing a rebuild threshold arms the debounce; every retarget while
/// armed pushes the deadline out. Only when the deadline passes with the
/// thresholds still crossed does a job fire, so a burst of wheel input
/// collapses into a single build of the final values. At most one job is
/// outstanding at a time.
#[derive(Debug)]
pub struct RebuildScheduler {
    phase: Phase,
    last_failed: Option<(f32, f32)>,
}

impl RebuildScheduler {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            last_failed: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Feeds one tick's parameter state through the state machine.
    /// Returns a job exactly when a build should start.
    pub fn update(&mut self, advance: &AdvanceResult, now: Instant) -> Option<BuildJob> {
        if advance.retargeted {
            // A fresh target is a fresh request; failed params may be
            // retried once they change.
            self.last_failed = None;
        }
        let blocked = self.matches_last_failed(advance.current);

        match &mut self.phase {
            Phase::Idle => {
                if advance.crossed.any() && !blocked {
                    let deadline = now + REBUILD_DEBOUNCE;
                    log::debug!(
                        "rebuild threshold crossed at density {:.3} disparity {:.2}, debouncing",
                        advance.current.density,
                        advance.current.disparity
                    );
                    self.phase = Phase::PendingDebounce { deadline };
                }
                None
            }
            Phase::PendingDebounce { deadline } => {
                if advance.retargeted {
                    // Still receiving input; hold the build off.
                    *deadline = now + REBUILD_DEBOUNCE;
                    return None;
                }
                if now < *deadline {
                    return None;
                }
                if !advance.crossed.any() {
                    // Drifted back under the thresholds while waiting.
                    log::debug!("rebuild debounce lapsed below thresholds, disarming");
                    self.phase = Phase::Idle;
                    return None;
                }
                let job = BuildJob {
                    density: advance.current.density,
                    disparity: advance.current.disparity,
                    requested_at: now,
                };
                log::debug!(
                    "debounce elapsed, building density {:.3} disparity {:.2}",
                    job.density,
                    job.disparity
                );
                self.phase = Phase::Building { job, dirty: false };
                Some(job)
            }
            Phase::Building { job, dirty } => {
                // Drift is measured against the in-flight build, not the
                // active field, so a build that is already close enough
                // to the latest parameters does not chain another one.
                if crossings(advance.current, (job.density, job.disparity)).any() {
                    *dirty = true;
                }
                None
            }
        }
    }

    /// Called when the in-flight build has been swapped in.
    pub fn on_build_complete(&mut self, now: Instant) {
        self.phase = match self.phase {
            Phase::Building { dirty: true, .. } => Phase::PendingDebounce {
                deadline: now + REBUILD_DEBOUNCE,
            },
            _ => Phase::Idle,
        };
    }

    /// Called when the in-flight build was rejected. The failed pair is
    /// remembered so the same parameters are not retried in a loop.
    pub fn on_build_failed(&mut self, density: f32, disparity: f32) {
        self.last_failed = Some((density, disparity));
        self.phase = Phase::Idle;
    }

    fn matches_last_failed(&self, current: Params) -> bool {
        match self.last_failed {
            Some((density, disparity)) => {
                (current.density - density).abs() <= CONVERGE_EPS
                    && (current.disparity - disparity).abs() <= CONVERGE_EPS
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DENSITY_AT_ZOOM_MAX, DENSITY_AT_ZOOM_MIN, ZOOM_MAX, ZOOM_MIN};
    use crate::engine::params::{density_for_zoom, ParameterTracker};
    use std::time::Duration;

    const TICK: Duration = Duration::from_millis(16);

    /// Drives tracker and scheduler together over simulated time,
    /// applying `(at_ms, zoom)` retargets (sorted by time) and collecting
    /// emitted jobs. Completions are acked `build_ms` after each job
    /// fires.
    fn run(
        tracker: &mut ParameterTracker,
        scheduler: &mut RebuildScheduler,
        events: &[(u64, f32)],
        total_ms: u64,
        build_ms: u64,
    ) -> Vec<BuildJob> {
        let start = Instant::now();
        let mut jobs = Vec::new();
        let mut in_flight: Option<(Instant, BuildJob)> = None;
        let mut next_event = 0;
        let mut tick_ms = 0u64;
        while tick_ms <= total_ms {
            let now = start + Duration::from_millis(tick_ms);
            while next_event < events.len() && events[next_event].0 <= tick_ms {
                tracker.set_zoom_target(events[next_event].1);
                next_event += 1;
            }
            if let Some((done_at, job)) = in_flight {
                if now >= done_at {
                    tracker.mark_built(job.density, job.disparity);
                    scheduler.on_build_complete(now);
                    in_flight = None;
                }
            }
            let advance = tracker.advance(TICK.as_secs_f32());
            if let Some(job) = scheduler.update(&advance, now) {
                in_flight = Some((now + Duration::from_millis(build_ms), job));
                jobs.push(job);
            }
            tick_ms += TICK.as_millis() as u64;
        }
        jobs
    }

    #[test]
    fn burst_of_retargets_collapses_into_one_build() {
        let mut tracker = ParameterTracker::new(ZOOM_MIN);
        let mut scheduler = RebuildScheduler::new();
        let events = [(0, 2.0), (60, 3.0), (120, 4.0), (180, 5.0), (240, 6.0)];
        let jobs = run(&mut tracker, &mut scheduler, &events, 3000, 30);

        assert_eq!(jobs.len(), 1, "burst must fold into a single build");
        // The job carries the final values, not any intermediate ones.
        let want = density_for_zoom(6.0);
        assert!(
            (jobs[0].density - want).abs() < 0.02,
            "job density {} is not near {want}",
            jobs[0].density
        );
        assert_eq!(scheduler.phase(), Phase::Idle);
    }

    #[test]
    fn sub_threshold_drift_never_builds() {
        let mut tracker = ParameterTracker::new(ZOOM_MIN);
        let mut scheduler = RebuildScheduler::new();
        // Zoom 1 -> 2 moves density by ~0.09 and disparity by ~1.3, both
        // under their thresholds.
        let jobs = run(&mut tracker, &mut scheduler, &[(0, 2.0)], 2000, 30);
        assert!(jobs.is_empty());
        assert_eq!(scheduler.phase(), Phase::Idle);
    }

    #[test]
    fn continuous_drag_collapses_to_one_final_build() {
        let mut tracker = ParameterTracker::new(ZOOM_MIN);
        let mut scheduler = RebuildScheduler::new();
        // Drag deltas every 120 ms, each inside the debounce window, so
        // every one restarts the timer and only the final values build.
        let events: Vec<(u64, f32)> = (0..36)
            .map(|i| (i as u64 * 120, ZOOM_MIN + (i as f32 + 1.0) * 0.25))
            .collect();
        let jobs = run(&mut tracker, &mut scheduler, &events, 8000, 30);

        assert_eq!(jobs.len(), 1, "drag produced {} builds", jobs.len());
        assert!((jobs[0].density - DENSITY_AT_ZOOM_MAX).abs() < 0.02);
    }

    #[test]
    fn spaced_notches_rebuild_in_threshold_steps() {
        let mut tracker = ParameterTracker::new(ZOOM_MIN);
        let mut scheduler = RebuildScheduler::new();
        // Wheel notches slower than the debounce window. Each quiet gap
        // lets the timer elapse, but a build only fires once the drift
        // since the previous build crosses a threshold again.
        let events: Vec<(u64, f32)> = (0..36)
            .map(|i| (i as u64 * 600, ZOOM_MIN + (i as f32 + 1.0) * 0.25))
            .collect();
        let jobs = run(&mut tracker, &mut scheduler, &events, 24_000, 30);

        assert!(
            (2..=5).contains(&jobs.len()),
            "sweep produced {} builds",
            jobs.len()
        );
        let last = jobs.last().unwrap();
        assert!((last.density - DENSITY_AT_ZOOM_MAX).abs() < 0.05);
        // Builds step up through the range instead of repeating.
        assert!(last.density - jobs[0].density > 0.3);
        assert!(jobs[0].density > DENSITY_AT_ZOOM_MIN);
    }

    #[test]
    fn retreat_below_thresholds_disarms_without_building() {
        let mut tracker = ParameterTracker::new(ZOOM_MIN);
        let mut scheduler = RebuildScheduler::new();
        // Out far enough to cross, back before the debounce elapses.
        let jobs = run(
            &mut tracker,
            &mut scheduler,
            &[(0, 4.0), (160, 1.0)],
            2000,
            30,
        );
        assert!(jobs.is_empty());
        assert_eq!(scheduler.phase(), Phase::Idle);
    }

    #[test]
    fn drift_past_the_inflight_build_chains_a_second_one() {
        let mut tracker = ParameterTracker::new(ZOOM_MIN);
        let mut scheduler = RebuildScheduler::new();
        let start = Instant::now();

        // Cross and let the first job fire.
        tracker.set_zoom_target(5.0);
        let mut now = start;
        let mut first = None;
        for _ in 0..100 {
            now += TICK;
            let advance = tracker.advance(TICK.as_secs_f32());
            if let Some(job) = scheduler.update(&advance, now) {
                first = Some(job);
                break;
            }
        }
        let first = first.expect("first job never fired");

        // While it is in flight, push the target far past it.
        tracker.set_zoom_target(10.0);
        for _ in 0..60 {
            now += TICK;
            let advance = tracker.advance(TICK.as_secs_f32());
            assert_eq!(scheduler.update(&advance, now), None, "single flight");
        }
        assert!(matches!(scheduler.phase(), Phase::Building { dirty: true, .. }));

        // Completion re-arms the debounce, which elapses into job two.
        tracker.mark_built(first.density, first.disparity);
        scheduler.on_build_complete(now);
        let mut second = None;
        for _ in 0..60 {
            now += TICK;
            let advance = tracker.advance(TICK.as_secs_f32());
            if let Some(job) = scheduler.update(&advance, now) {
                second = Some(job);
                break;
            }
        }
        let second = second.expect("dirty build never chained");
        assert!((second.density - density_for_zoom(ZOOM_MAX)).abs() < 0.02);
    }

    #[test]
    fn close_enough_inflight_build_does_not_chain() {
        let mut tracker = ParameterTracker::new(ZOOM_MIN);
        let mut scheduler = RebuildScheduler::new();
        let start = Instant::now();

        tracker.set_zoom_target(5.0);
        let mut now = start;
        let mut fired = false;
        for _ in 0..200 {
            now += TICK;
            let advance = tracker.advance(TICK.as_secs_f32());
            if scheduler.update(&advance, now).is_some() {
                fired = true;
                break;
            }
        }
        assert!(fired);
        // Let convergence finish while the build is in flight. The job
        // was captured near the target, so nothing crosses against it.
        for _ in 0..200 {
            now += TICK;
            let advance = tracker.advance(TICK.as_secs_f32());
            scheduler.update(&advance, now);
        }
        assert!(matches!(scheduler.phase(), Phase::Building { dirty: false, .. }));
        scheduler.on_build_complete(now);
        assert_eq!(scheduler.phase(), Phase::Idle);
    }

    #[test]
    fn failed_parameters_are_not_retried_until_retargeted() {
        let mut tracker = ParameterTracker::new(ZOOM_MIN);
        let mut scheduler = RebuildScheduler::new();
        let start = Instant::now();
        let mut now = start;

        tracker.set_zoom_target(4.0);
        let mut job = None;
        for _ in 0..200 {
            now += TICK;
            let advance = tracker.advance(TICK.as_secs_f32());
            if let Some(j) = scheduler.update(&advance, now) {
                job = Some(j);
                break;
            }
        }
        let job = job.expect("no job fired");
        // Let the parameters settle fully before failing, then fail the
        // settled retry too.
        for _ in 0..200 {
            now += TICK;
            let advance = tracker.advance(TICK.as_secs_f32());
            scheduler.update(&advance, now);
        }
        scheduler.on_build_failed(job.density, job.disparity);
        let mut retry = None;
        for _ in 0..200 {
            now += TICK;
            let advance = tracker.advance(TICK.as_secs_f32());
            if let Some(j) = scheduler.update(&advance, now) {
                retry = Some(j);
                break;
            }
        }
        let retry = retry.expect("drifted params should retry once");
        scheduler.on_build_failed(retry.density, retry.disparity);

        // Settled now: same params, no retarget, so the scheduler stays
        // quiet no matter how long we wait.
        for _ in 0..400 {
            now += TICK;
            let advance = tracker.advance(TICK.as_secs_f32());
            assert_eq!(scheduler.update(&advance, now), None);
        }
        assert_eq!(scheduler.phase(), Phase::Idle);

        // A new target lifts the block.
        tracker.set_zoom_target(8.0);
        let mut unblocked = false;
        for _ in 0..200 {
            now += TICK;
            let advance = tracker.advance(TICK.as_secs_f32());
            if scheduler.update(&advance, now).is_some() {
                unblocked = true;
                break;
            }
        }
        assert!(unblocked);
    }
}
