use std::time::Duration;

/// Scale applied to the source frame interval when no override is configured.
pub const DEFAULT_PACING_SCALE: f64 = 0.6;

/// Upper bound on the sleep between frames.
pub const MAX_PACING_INTERVAL: Duration = Duration::from_secs(60);

/// Fixed sleep between frames, derived once per session.
///
/// Detection latency is added on top of the sleep, so a slow engine makes the
/// loop fall behind real time rather than skip frames.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pacing {
    interval: Duration,
}

impl Pacing {
    pub fn new(frame_interval: Duration, scale: f64) -> Self {
        let scale = if scale.is_finite() && scale >= 0.0 {
            scale
        } else {
            DEFAULT_PACING_SCALE
        };
        let interval = Duration::try_from_secs_f64(frame_interval.as_secs_f64() * scale)
            .map_or(MAX_PACING_INTERVAL, |d| d.min(MAX_PACING_INTERVAL));
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}
