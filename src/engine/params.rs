use crate::config::{
    CONVERGE_EPS, DENSITY_AT_ZOOM_MAX, DENSITY_AT_ZOOM_MIN, DENSITY_REBUILD_THRESHOLD,
    DISPARITY_AT_ZOOM_MAX, DISPARITY_AT_ZOOM_MIN, DISPARITY_REBUILD_THRESHOLD, PARAM_TAU,
    ZOOM_MAX, ZOOM_MIN,
};

/// The three continuously varying view parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Params {
    pub zoom: f32,
    pub density: f32,
    pub disparity: f32,
}

/// Which rebuild thresholds the current values have drifted past,
/// measured against the last built field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Crossings {
    pub density: bool,
    pub disparity: bool,
}

impl Crossings {
    pub fn any(self) -> bool {
        self.density || self.disparity
    }
}

/// Everything a tick needs to know after parameters moved.
#[derive(Clone, Copy, Debug)]
pub struct AdvanceResult {
    pub current: Params,
    /// Threshold levels relative to the last built field. These stay
    /// raised until a rebuild lands, so they arm the scheduler but must
    /// not restart its debounce timer.
    pub crossed: Crossings,
    /// True when a `set_zoom_target` call changed the targets since the
    /// previous advance. This is the debounce-restart signal: it fires
    /// once per user input, not once per tick of damped drift.
    pub retargeted: bool,
    /// True when every current value is within epsilon of its target.
    pub converged: bool,
}

/// Derives the sampling density target for a zoom level. Fixed monotone
/// mapping, linear between the configured endpoints.
pub fn density_for_zoom(zoom: f32) -> f32 {
    DENSITY_AT_ZOOM_MIN + zoom_fraction(zoom) * (DENSITY_AT_ZOOM_MAX - DENSITY_AT_ZOOM_MIN)
}

/// Derives the depth window target for a zoom level.
pub fn disparity_for_zoom(zoom: f32) -> f32 {
    DISPARITY_AT_ZOOM_MIN + zoom_fraction(zoom) * (DISPARITY_AT_ZOOM_MAX - DISPARITY_AT_ZOOM_MIN)
}

fn zoom_fraction(zoom: f32) -> f32 {
    (zoom.clamp(ZOOM_MIN, ZOOM_MAX) - ZOOM_MIN) / (ZOOM_MAX - ZOOM_MIN)
}

/// Threshold levels of `current` against the last built `{density,
/// disparity}` pair.
pub(crate) fn crossings(current: Params, last_built: (f32, f32)) -> Crossings {
    Crossings {
        density: (current.density - last_built.0).abs() > DENSITY_REBUILD_THRESHOLD,
        disparity: (current.disparity - last_built.1).abs() > DISPARITY_REBUILD_THRESHOLD,
    }
}

/// Holds current and target view parameters and eases the currents
/// toward the targets each tick.
///
/// Zoom is the only externally set value; density and disparity targets
/// are always derived from it through the mapping above, so the three
/// currents stay mutually consistent while they converge.
#[derive(Debug)]
pub struct ParameterTracker {
    current: Params,
    target: Params,
    last_built: (f32, f32),
    retargeted: bool,
}

impl ParameterTracker {
    /// Starts fully converged at `zoom`, with the mapped density and
    /// disparity recorded as the last built values.
    pub fn new(zoom: f32) -> Self {
        let zoom = zoom.clamp(ZOOM_MIN, ZOOM_MAX);
        let initial = Params {
            zoom,
            density: density_for_zoom(zoom),
            disparity: disparity_for_zoom(zoom),
        };
        Self {
            current: initial,
            target: initial,
            last_built: (initial.density, initial.disparity),
            retargeted: false,
        }
    }

    /// Sets a new zoom target; density and disparity targets follow the
    /// configured mapping. Clamped, arbitrarily frequent calls are fine.
    pub fn set_zoom_target(&mut self, zoom: f32) {
        let zoom = zoom.clamp(ZOOM_MIN, ZOOM_MAX);
        let next = Params {
            zoom,
            density: density_for_zoom(zoom),
            disparity: disparity_for_zoom(zoom),
        };
        if next != self.target {
            self.target = next;
            self.retargeted = true;
        }
    }

    /// Eases currents toward targets with exponential damping and
    /// reports threshold and convergence state.
    pub fn advance(&mut self, dt: f32) -> AdvanceResult {
        let k = 1.0 - (-dt.max(0.0) / PARAM_TAU).exp();
        self.current.zoom += (self.target.zoom - self.current.zoom) * k;
        self.current.density += (self.target.density - self.current.density) * k;
        self.current.disparity += (self.target.disparity - self.current.disparity) * k;

        let converged = (self.target.zoom - self.current.zoom).abs() <= CONVERGE_EPS
            && (self.target.density - self.current.density).abs() <= CONVERGE_EPS
            && (self.target.disparity - self.current.disparity).abs() <= CONVERGE_EPS;

        AdvanceResult {
            current: self.current,
            crossed: crossings(self.current, self.last_built),
            retargeted: std::mem::take(&mut self.retargeted),
            converged,
        }
    }

    /// Records the parameters of a field that just became active.
    pub fn mark_built(&mut self, density: f32, disparity: f32) {
        self.last_built = (density, disparity);
    }

    pub fn current(&self) -> Params {
        self.current
    }

    pub fn target(&self) -> Params {
        self.target
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ZOOM_DEFAULT;

    const TICK: f32 = 1.0 / 60.0;

    fn settle(tracker: &mut ParameterTracker, seconds: f32) -> AdvanceResult {
        let steps = (seconds / TICK).ceil() as usize;
        let mut last = tracker.advance(TICK);
        for _ in 1..steps {
            last = tracker.advance(TICK);
        }
        last
    }

    #[test]
    fn targets_are_clamped() {
        let mut tracker = ParameterTracker::new(ZOOM_DEFAULT);
        tracker.set_zoom_target(1000.0);
        assert_eq!(tracker.target().zoom, ZOOM_MAX);
        assert_eq!(tracker.target().density, DENSITY_AT_ZOOM_MAX);
        tracker.set_zoom_target(-3.0);
        assert_eq!(tracker.target().zoom, ZOOM_MIN);
        assert_eq!(tracker.target().disparity, DISPARITY_AT_ZOOM_MIN);
    }

    #[test]
    fn mapping_is_monotone_over_the_zoom_range() {
        let mut prev_density = f32::MIN;
        let mut prev_disparity = f32::MIN;
        for step in 0..=100 {
            let zoom = ZOOM_MIN + (ZOOM_MAX - ZOOM_MIN) * step as f32 / 100.0;
            let d = density_for_zoom(zoom);
            let s = disparity_for_zoom(zoom);
            assert!(d >= prev_density, "density must not decrease with zoom");
            assert!(s >= prev_disparity, "disparity must not decrease with zoom");
            assert!(d > 0.0 && d <= 1.0);
            assert!(s >= 0.0);
            prev_density = d;
            prev_disparity = s;
        }
    }

    #[test]
    fn damping_is_eased_not_instant() {
        let mut tracker = ParameterTracker::new(ZOOM_MIN);
        tracker.set_zoom_target(ZOOM_MAX);
        // After 50 ms a healthy ease should still have a good way to go.
        let early = settle(&mut tracker, 0.05);
        let early_remaining = (ZOOM_MAX - early.current.zoom).abs();
        assert!(
            early_remaining > 0.3 * (ZOOM_MAX - ZOOM_MIN),
            "converged too fast: {early_remaining} remaining after 50 ms"
        );
    }

    #[test]
    fn damping_visibly_converges_within_300ms() {
        let mut tracker = ParameterTracker::new(ZOOM_MIN);
        tracker.set_zoom_target(ZOOM_MAX);
        let result = settle(&mut tracker, 0.3);
        let remaining = (ZOOM_MAX - result.current.zoom).abs();
        assert!(
            remaining < 0.02 * (ZOOM_MAX - ZOOM_MIN),
            "still {remaining} away from target after 300 ms"
        );
    }

    #[test]
    fn converged_flag_settles_and_sticks() {
        let mut tracker = ParameterTracker::new(ZOOM_MIN);
        tracker.set_zoom_target(ZOOM_MAX);
        assert!(!tracker.advance(TICK).converged);
        let result = settle(&mut tracker, 2.0);
        assert!(result.converged, "should be converged after two seconds");
        assert!(tracker.advance(TICK).converged);
    }

    #[test]
    fn sub_threshold_drift_never_crosses() {
        // Deltas below the rebuild thresholds must not report a crossing,
        // whatever the base value is.
        for base in [0.1_f32, 0.3, 0.5, 0.6] {
            let current = Params {
                zoom: 1.0,
                density: base + DENSITY_REBUILD_THRESHOLD * 0.99,
                disparity: 5.0,
            };
            let crossed = crossings(current, (base, 5.0));
            assert!(!crossed.any(), "density delta under threshold crossed");
        }
        let current = Params {
            zoom: 1.0,
            density: 0.5,
            disparity: 5.0 + DISPARITY_REBUILD_THRESHOLD * 0.99,
        };
        assert!(!crossings(current, (0.5, 5.0)).any());
    }

    #[test]
    fn crossings_report_independently() {
        let current = Params {
            zoom: 1.0,
            density: 0.9,
            disparity: 4.0,
        };
        let crossed = crossings(current, (0.2, 4.0));
        assert!(crossed.density);
        assert!(!crossed.disparity);

        let crossed = crossings(current, (0.9, 12.0));
        assert!(!crossed.density);
        assert!(crossed.disparity);
    }

    #[test]
    fn retargeted_fires_once_per_change() {
        let mut tracker = ParameterTracker::new(ZOOM_DEFAULT);
        tracker.set_zoom_target(3.0);
        assert!(tracker.advance(TICK).retargeted);
        assert!(!tracker.advance(TICK).retargeted);
        // Setting the identical target again is not a change.
        tracker.set_zoom_target(3.0);
        assert!(!tracker.advance(TICK).retargeted);
    }

    #[test]
    fn density_and_disparity_follow_zoom() {
        let mut tracker = ParameterTracker::new(ZOOM_MIN);
        tracker.set_zoom_target(ZOOM_MAX);
        let result = settle(&mut tracker, 2.0);
        assert!((result.current.density - DENSITY_AT_ZOOM_MAX).abs() < 1e-2);
        assert!((result.current.disparity - DISPARITY_AT_ZOOM_MAX).abs() < 1e-2);
    }
}
