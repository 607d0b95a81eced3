use std::time::Duration;

/// Easing applied to normalized animation progress.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum TimingCurve {
    Linear,
    Smoothstep,
    EaseInOut,
    /// Material-style decelerating curve, `cubic-bezier(0.4, 0, 0.2, 1)`.
    #[default]
    FastOutSlowIn,
    CubicBezier { x1: f32, y1: f32, x2: f32, y2: f32 },
}

impl TimingCurve {
    pub fn sample(self, t: f32) -> f32 {
        let clamped = t.clamp(0.0, 1.0);
        match self {
            TimingCurve::Linear => clamped,
            TimingCurve::Smoothstep => clamped * clamped * (3.0 - 2.0 * clamped),
            TimingCurve::EaseInOut => {
                if clamped < 0.5 {
                    2.0 * clamped * clamped
                } else {
                    -1.0 + (4.0 - 2.0 * clamped) * clamped
                }
            }
            TimingCurve::FastOutSlowIn => cubic_bezier(0.4, 0.0, 0.2, 1.0, clamped),
            TimingCurve::CubicBezier { x1, y1, x2, y2 } => cubic_bezier(x1, y1, x2, y2, clamped),
        }
    }
}

fn bezier_axis(a: f32, b: f32, s: f32) -> f32 {
    let inv = 1.0 - s;
    3.0 * inv * inv * s * a + 3.0 * inv * s * s * b + s * s * s
}

fn bezier_axis_slope(a: f32, b: f32, s: f32) -> f32 {
    let inv = 1.0 - s;
    3.0 * inv * inv * a + 6.0 * inv * s * (b - a) + 3.0 * s * s * (1.0 - b)
}

/// CSS-style timing function: solve `x(s) = t` for the curve parameter, then
/// return `y(s)`. Newton first, bisection when the slope flattens out.
fn cubic_bezier(x1: f32, y1: f32, x2: f32, y2: f32, t: f32) -> f32 {
    if t <= 0.0 || t >= 1.0 {
        return t;
    }
    let x1 = x1.clamp(0.0, 1.0);
    let x2 = x2.clamp(0.0, 1.0);

    let mut s = t;
    for _ in 0..8 {
        let error = bezier_axis(x1, x2, s) - t;
        if error.abs() < 1e-6 {
            return bezier_axis(y1, y2, s);
        }
        let slope = bezier_axis_slope(x1, x2, s);
        if slope.abs() < 1e-6 {
            break;
        }
        s = (s - error / slope).clamp(0.0, 1.0);
    }

    let (mut lo, mut hi) = (0.0_f32, 1.0_f32);
    s = t;
    for _ in 0..32 {
        let x = bezier_axis(x1, x2, s);
        if (x - t).abs() < 1e-6 {
            break;
        }
        if x < t {
            lo = s;
        } else {
            hi = s;
        }
        s = 0.5 * (lo + hi);
    }
    bezier_axis(y1, y2, s)
}

/// How a point travels to its target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timing {
    pub duration: Duration,
    pub delay: Duration,
    pub curve: TimingCurve,
}

impl Timing {
    pub fn new(duration: Duration, curve: TimingCurve) -> Self {
        Self {
            duration,
            delay: Duration::ZERO,
            curve,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Eased progress after `elapsed`, and whether the animation has finished.
    pub fn progress(&self, elapsed: Duration) -> (f32, bool) {
        let Some(active) = elapsed.checked_sub(self.delay) else {
            return (0.0, false);
        };
        if self.duration.is_zero() {
            return (1.0, true);
        }
        let linear = active.as_secs_f32() / self.duration.as_secs_f32();
        (self.curve.sample(linear), linear >= 1.0)
    }
}

impl Default for Timing {
    fn default() -> Self {
        Self::new(Duration::from_millis(300), TimingCurve::default())
    }
}
