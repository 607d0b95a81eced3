use std::thread;
use std::time::{Duration, Instant};

/// Frame rate the producer loop falls back to when no cap is configured.
pub const DEFAULT_FPS: f32 = 60.0;

/// Snapshot of the time state handed to animation drivers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSample {
    /// Elapsed wall-clock or simulated time in seconds.
    pub seconds: f32,
    /// Seconds since the previous sample; zero for the first one.
    pub delta: f32,
    /// Monotonic frame counter for the running session.
    pub frame_index: u64,
    /// Instant the sample corresponds to, for `AnimationState::tick`.
    pub instant: Instant,
}

/// Abstraction over where time values originate from.
pub trait TimeSource: Send {
    /// Produces a time sample for the next frame.
    fn sample(&mut self) -> TimeSample;
}

/// Time source backed by the system monotonic clock.
#[derive(Debug, Clone, Copy)]
pub struct SystemTimeSource {
    origin: Instant,
    last: Option<Instant>,
    frame: u64,
}

impl SystemTimeSource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for SystemTimeSource {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
            last: None,
            frame: 0,
        }
    }
}

impl TimeSource for SystemTimeSource {
    fn sample(&mut self) -> TimeSample {
        let now = Instant::now();
        let delta = self
            .last
            .map(|last| now.saturating_duration_since(last).as_secs_f32())
            .unwrap_or(0.0);
        self.last = Some(now);
        let sample = TimeSample {
            seconds: now.saturating_duration_since(self.origin).as_secs_f32(),
            delta,
            frame_index: self.frame,
            instant: now,
        };
        self.frame = self.frame.saturating_add(1);
        sample
    }
}

/// Deterministic source that advances by a fixed step per sample.
#[derive(Debug, Clone, Copy)]
pub struct FixedStepTimeSource {
    origin: Instant,
    step: Duration,
    frame: u64,
}

impl FixedStepTimeSource {
    pub fn new(step: Duration) -> Self {
        Self {
            origin: Instant::now(),
            step,
            frame: 0,
        }
    }
}

impl TimeSource for FixedStepTimeSource {
    fn sample(&mut self) -> TimeSample {
        let elapsed = self.step.saturating_mul(self.frame.min(u32::MAX as u64) as u32);
        let sample = TimeSample {
            seconds: elapsed.as_secs_f32(),
            delta: if self.frame == 0 {
                0.0
            } else {
                self.step.as_secs_f32()
            },
            frame_index: self.frame,
            instant: self.origin + elapsed,
        };
        self.frame = self.frame.saturating_add(1);
        sample
    }
}

/// Sleeps the producer loop until the next frame deadline.
#[derive(Debug, Clone)]
pub struct FramePacer {
    interval: Duration,
    next_deadline: Option<Instant>,
}

impl FramePacer {
    /// `fps` of `None`, a non-positive cap, or one too small to express as a
    /// frame interval paces at [`DEFAULT_FPS`].
    pub fn new(fps: Option<f32>) -> Self {
        let interval = fps
            .filter(|fps| *fps > 0.0)
            .and_then(|fps| Duration::try_from_secs_f32(fps.recip()).ok())
            .unwrap_or_else(|| Duration::from_secs_f32(1.0 / DEFAULT_FPS));
        Self {
            interval,
            next_deadline: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// How long to wait at `now` before the next frame is due.
    pub fn time_until_next(&mut self, now: Instant) -> Duration {
        let deadline = *self.next_deadline.get_or_insert(now);
        let wait = deadline.saturating_duration_since(now);
        let mut next = deadline + self.interval;
        if next <= now {
            // Fell behind; restart the cadence instead of bursting to catch up.
            next = now + self.interval;
        }
        self.next_deadline = Some(next);
        wait
    }

    pub fn wait(&mut self) {
        let wait = self.time_until_next(Instant::now());
        if !wait.is_zero() {
            thread::sleep(wait);
        }
    }
}
